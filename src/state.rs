//! Application state
//!
//! Holds configuration and the shared CategoryRouter

use crate::alert_dedup::AlertDeduplicator;
use crate::category_router::{AlertResetPolicy, CategoryRouter, EndpointMap};
use crate::category_store::{Category, CategoryStore};
use crate::durable_backing::{DurableBacking, FileBacking, MemoryBacking};
use crate::error::{Error, Result};
use crate::model_client::ModelClient;
use crate::notifier::{LogNotifier, Notifier, TelegramNotifier, TELEGRAM_API_BASE};
use crate::spoilage_detector::{SpoilageDetector, DEFAULT_KEYWORDS};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Durable backing medium
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBackend {
    /// One file per record under `state_dir`
    File,
    /// Process memory; lost on exit
    Memory,
}

impl FromStr for StateBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StateBackend::File),
            "memory" => Ok(StateBackend::Memory),
            other => Err(Error::Config(format!("Unknown STATE_BACKEND '{}'", other))),
        }
    }
}

/// Messaging credentials
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub token: String,
    pub chat_id: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Durable backing medium
    pub state_backend: StateBackend,
    /// Directory of the file backing
    pub state_dir: PathBuf,
    /// Category adopted at boot when nothing is persisted
    pub initial_category: Option<Category>,
    /// Category -> model endpoint
    pub endpoints: EndpointMap,
    /// Model endpoint timeout
    pub forward_timeout: Duration,
    /// Messaging credentials; `None` logs notifications instead
    pub telegram: Option<TelegramConfig>,
    /// Messaging timeout
    pub notify_timeout: Duration,
    /// Spoilage keywords
    pub spoilage_keywords: Vec<String>,
    /// Automatic alert re-arm triggers
    pub alert_reset: AlertResetPolicy,
    /// Allow any CORS origin
    pub cors_allow_any: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            state_backend: StateBackend::File,
            state_dir: PathBuf::from("./data"),
            initial_category: None,
            endpoints: EndpointMap::reference(),
            forward_timeout: Duration::from_secs(60),
            telegram: None,
            notify_timeout: Duration::from_secs(5),
            spoilage_keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            alert_reset: AlertResetPolicy::default(),
            cors_allow_any: true,
        }
    }
}

impl AppConfig {
    /// Build from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let endpoints = match env_string("MODEL_ENDPOINTS") {
            Some(raw) => EndpointMap::parse(&raw)?,
            None => defaults.endpoints,
        };

        let telegram = match (env_string("TELEGRAM_TOKEN"), env_string("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                api_base: env_string("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| TELEGRAM_API_BASE.to_string()),
                token,
                chat_id,
            }),
            _ => None,
        };

        let spoilage_keywords = env_string("SPOILAGE_KEYWORDS")
            .map(|v| v.split(',').map(|k| k.trim().to_string()).collect())
            .unwrap_or(defaults.spoilage_keywords);

        Ok(Self {
            host: env_string("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT")?.unwrap_or(defaults.port),
            state_backend: env_parse("STATE_BACKEND")?.unwrap_or(defaults.state_backend),
            state_dir: env_string("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            initial_category: env_string("ACTIVE_CATEGORY")
                .map(|c| Category::parse(&c))
                .transpose()?,
            endpoints,
            forward_timeout: env_parse("FORWARD_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.forward_timeout),
            telegram,
            notify_timeout: env_parse("NOTIFY_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.notify_timeout),
            spoilage_keywords,
            alert_reset: AlertResetPolicy {
                on_clear: env_parse("ALERT_RESET_ON_CLEAR")?
                    .unwrap_or(defaults.alert_reset.on_clear),
                on_category_change: env_parse("ALERT_RESET_ON_CATEGORY_CHANGE")?
                    .unwrap_or(defaults.alert_reset.on_category_change),
            },
            cors_allow_any: env_parse("CORS_ALLOW_ANY")?.unwrap_or(defaults.cors_allow_any),
        })
    }
}

/// Non-empty, trimmed environment variable
fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    env_string(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| Error::Config(format!("Invalid value for {}: '{}'", name, raw)))
        })
        .transpose()
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: Arc<AppConfig>,
    /// CategoryRouter (category state, forwarding, alerts)
    pub router: Arc<CategoryRouter>,
}

impl AppState {
    /// Wire every component from configuration
    pub async fn build(config: AppConfig) -> Result<Self> {
        let backing: Arc<dyn DurableBacking> = match config.state_backend {
            StateBackend::File => Arc::new(FileBacking::open(&config.state_dir).await?),
            StateBackend::Memory => {
                tracing::warn!("Memory state backend selected, state will not survive restarts");
                Arc::new(MemoryBacking::new())
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.telegram {
            Some(telegram) => Arc::new(TelegramNotifier::new(
                telegram.api_base.clone(),
                telegram.token.clone(),
                telegram.chat_id.clone(),
                config.notify_timeout,
            )?),
            None => {
                tracing::info!("Messaging not configured (TELEGRAM_TOKEN/TELEGRAM_CHAT_ID), notifications are logged only");
                Arc::new(LogNotifier)
            }
        };

        Self::with_components(config, backing, notifier).await
    }

    /// Wire with an explicit backing and notifier
    pub async fn with_components(
        config: AppConfig,
        backing: Arc<dyn DurableBacking>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let store = Arc::new(
            CategoryStore::load(backing.clone(), config.initial_category.clone()).await,
        );
        let alerts = Arc::new(AlertDeduplicator::new(backing));
        let model_client = ModelClient::with_timeout(config.forward_timeout)?;

        let router = CategoryRouter::new(
            store,
            alerts,
            notifier,
            model_client,
            config.endpoints.clone(),
        )
        .with_detector(SpoilageDetector::new(&config.spoilage_keywords))
        .with_reset_policy(config.alert_reset);

        Ok(Self {
            config: Arc::new(config),
            router: Arc::new(router),
        })
    }
}

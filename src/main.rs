//! Category Router
//!
//! Main entry point for the category router service.

use category_router::{
    state::{AppConfig, AppState},
    web_api,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "category_router=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting category router v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::from_env()?;
    let categories: Vec<&str> = config.endpoints.categories().map(|c| c.as_str()).collect();
    tracing::info!(
        state_backend = ?config.state_backend,
        state_dir = %config.state_dir.display(),
        categories = ?categories,
        forward_timeout_secs = config.forward_timeout.as_secs(),
        messaging = config.telegram.is_some(),
        "Configuration loaded"
    );

    let state = AppState::build(config).await?;
    match state.router.active_category().await {
        Some(category) => tracing::info!(category = %category, "Active category restored"),
        None => tracing::info!("No active category set"),
    }

    let mut app = web_api::create_router(state.clone()).layer(TraceLayer::new_for_http());
    if state.config.cors_allow_any {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

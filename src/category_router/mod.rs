//! CategoryRouter - control component
//!
//! ## Responsibilities
//!
//! - Get/set the active category through the CategoryStore
//! - Notify once per category transition
//! - Forward sensor payloads to the active category's model endpoint
//! - Gate spoilage notifications through the AlertDeduplicator
//!
//! Every operation first reconciles the store with its backing record so
//! changes made by another instance or before a restart are honoured.
//! Notifications run on background tasks; no lock is held while the model
//! endpoint or the messaging API is in flight.

mod types;

pub use types::*;

use crate::alert_dedup::{AlertDeduplicator, AlertKind, AlertState};
use crate::category_store::{Category, CategoryStore};
use crate::error::{Error, Result};
use crate::model_client::ModelClient;
use crate::notifier::{self, Notification, Notifier};
use crate::spoilage_detector::SpoilageDetector;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Category router
pub struct CategoryRouter {
    store: Arc<CategoryStore>,
    alerts: Arc<AlertDeduplicator>,
    notifier: Arc<dyn Notifier>,
    model_client: ModelClient,
    endpoints: EndpointMap,
    detector: SpoilageDetector,
    reset_policy: AlertResetPolicy,
}

impl CategoryRouter {
    pub fn new(
        store: Arc<CategoryStore>,
        alerts: Arc<AlertDeduplicator>,
        notifier: Arc<dyn Notifier>,
        model_client: ModelClient,
        endpoints: EndpointMap,
    ) -> Self {
        Self {
            store,
            alerts,
            notifier,
            model_client,
            endpoints,
            detector: SpoilageDetector::default(),
            reset_policy: AlertResetPolicy::default(),
        }
    }

    pub fn with_detector(mut self, detector: SpoilageDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_reset_policy(mut self, reset_policy: AlertResetPolicy) -> Self {
        self.reset_policy = reset_policy;
        self
    }

    pub fn endpoints(&self) -> &EndpointMap {
        &self.endpoints
    }

    /// Active category without reconciling. Backing errors read as unset.
    pub async fn active_category(&self) -> Option<Category> {
        self.store.get().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read persisted category");
            None
        })
    }

    /// Active category, or `NotFound` when unset
    pub async fn get_category(&self) -> Result<Category> {
        self.refresh().await;

        self.store
            .get()
            .await?
            .ok_or_else(|| Error::NotFound("No active category set".to_string()))
    }

    /// Normalize and activate a category, notifying on change
    pub async fn set_category(&self, input: &str) -> Result<SetOutcome> {
        let category = Category::parse(input)?;

        self.refresh().await;
        let transition = self.store.set(category).await;
        let changed = transition.changed();

        if changed {
            tracing::info!(
                previous = ?transition.previous.as_ref().map(Category::as_str),
                category = %transition.current,
                persisted = transition.is_persisted(),
                "Active category changed"
            );

            notifier::dispatch(
                self.notifier.clone(),
                Notification::category_changed(&transition.current),
            );

            if self.reset_policy.on_category_change {
                if let Some(previous) = &transition.previous {
                    if let Err(e) = self.alerts.reset_category(previous).await {
                        tracing::warn!(
                            category = %previous,
                            error = %e,
                            "Could not re-arm alerts of previous category"
                        );
                    }
                }
            }
        } else {
            tracing::debug!(category = %transition.current, "Active category unchanged");
        }

        Ok(SetOutcome {
            persisted: transition.is_persisted(),
            category: transition.current,
            changed,
        })
    }

    /// Forward a sensor payload to the active category's model
    pub async fn forward(&self, payload: Map<String, Value>) -> Result<ForwardOutcome> {
        self.refresh().await;

        let category = self.store.get().await?.ok_or(Error::NoActiveCategory)?;
        let endpoint = self
            .endpoints
            .get(&category)
            .ok_or_else(|| Error::UnmappedCategory(category.to_string()))?;

        tracing::info!(category = %category, endpoint = %endpoint, "Forwarding data to model");
        tracing::debug!(payload = ?payload, "Forward payload");

        let payload = Value::Object(payload);
        let reply = match self.model_client.forward(endpoint, &payload).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(category = %category, error = %e, "Forward error");
                return Err(e);
            }
        };

        tracing::info!(category = %category, status = reply.status, "Model responded");

        let spoiled = self.detector.is_spoiled(&reply.body);
        let alert_dispatched = self
            .gate_spoilage_alert(&category, reply.status, spoiled)
            .await;

        Ok(ForwardOutcome {
            category,
            status: reply.status,
            body: reply.body,
            spoiled,
            alert_dispatched,
        })
    }

    /// Manually re-arm an alert. Defaults to the active category.
    pub async fn reset_alert(
        &self,
        category: Option<&str>,
        kind: AlertKind,
    ) -> Result<(Category, AlertState)> {
        let category = match category {
            Some(raw) => Category::parse(raw)?,
            None => {
                self.refresh().await;
                self.store.get().await?.ok_or(Error::NoActiveCategory)?
            }
        };

        let was_sent = self.alerts.reset(&category, kind).await?;
        tracing::info!(category = %category, kind = %kind, was_sent, "Alert reset requested");

        let state = self.alerts.state(&category, kind).await;
        Ok((category, state))
    }

    /// Claim and dispatch a spoilage alert, or re-arm on a clear result.
    ///
    /// Only a successful reply counts as clear; a downstream failure says
    /// nothing about the condition. Returns whether a notification was
    /// dispatched.
    async fn gate_spoilage_alert(&self, category: &Category, status: u16, spoiled: bool) -> bool {
        let kind = AlertKind::Spoiled;

        if !spoiled {
            let clear = (200..300).contains(&status);
            if clear && self.reset_policy.on_clear {
                if let Err(e) = self.alerts.reset(category, kind).await {
                    tracing::warn!(category = %category, error = %e, "Could not re-arm alert");
                }
            }
            return false;
        }

        let Some(claim) = self.alerts.claim(category, kind).await else {
            tracing::debug!(category = %category, "Spoilage alert already sent");
            return false;
        };

        tracing::warn!(category = %category, "Spoilage detected, dispatching alert");

        let notifier = self.notifier.clone();
        let alerts = self.alerts.clone();
        let category = category.clone();
        tokio::spawn(async move {
            let message = Notification::spoiled(&category);
            if notifier::send_logged(notifier.as_ref(), &message).await.is_err() {
                // Undelivered, so the next spoiled result should try again
                if let Err(e) = alerts.release(&category, kind, claim).await {
                    tracing::warn!(category = %category, error = %e, "Could not re-arm alert");
                }
            }
        });

        true
    }

    async fn refresh(&self) {
        if let Err(e) = self.store.refresh().await {
            tracing::warn!(error = %e, "Category refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category_store::tests::FlakyBacking;
    use crate::durable_backing::{DurableBacking, MemoryBacking, ACTIVE_CATEGORY_KEY};
    use crate::notifier::tests::RecordingNotifier;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        router: CategoryRouter,
        backing: MemoryBacking,
        notifier: Arc<RecordingNotifier>,
        rx: mpsc::UnboundedReceiver<Notification>,
    }

    fn harness(endpoints: EndpointMap) -> Harness {
        let backing = MemoryBacking::new();
        let store = Arc::new(CategoryStore::new(Arc::new(backing.clone())));
        let alerts = Arc::new(AlertDeduplicator::new(Arc::new(backing.clone())));
        let (notifier, rx) = RecordingNotifier::new();
        let router = CategoryRouter::new(
            store,
            alerts,
            notifier.clone(),
            ModelClient::with_timeout(Duration::from_secs(5)).unwrap(),
            endpoints,
        );
        Harness {
            router,
            backing,
            notifier,
            rx,
        }
    }

    async fn next_message(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("notification not delivered")
            .expect("channel closed")
    }

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    async fn spoiled_model(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/fruit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prediction": "spoiled"})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_category_unset_is_not_found() {
        let h = harness(EndpointMap::new());
        assert!(matches!(h.router.get_category().await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_category_normalizes_and_notifies_once() {
        let mut h = harness(EndpointMap::new());

        let first = h.router.set_category(" Fruit ").await.unwrap();
        assert_eq!(first.category.as_str(), "fruit");
        assert!(first.changed);
        assert!(first.persisted);

        let second = h.router.set_category("fruit").await.unwrap();
        assert_eq!(second.category.as_str(), "fruit");
        assert!(!second.changed);

        let message = next_message(&mut h.rx).await;
        assert_eq!(message.text, "Category changed to *Fruit* - Model Active");
        assert!(h.rx.try_recv().is_err());

        assert_eq!(h.router.get_category().await.unwrap().as_str(), "fruit");
    }

    #[tokio::test]
    async fn test_set_category_rejects_blank() {
        let h = harness(EndpointMap::new());
        assert!(matches!(
            h.router.set_category("   ").await,
            Err(Error::Validation(_))
        ));
        assert!(h.backing.is_empty().await);
    }

    #[tokio::test]
    async fn test_notify_failure_does_not_fail_set() {
        let h = harness(EndpointMap::new());
        h.notifier.fail.store(true, Ordering::SeqCst);

        let outcome = h.router.set_category("meat").await.unwrap();
        assert!(outcome.changed);
    }

    #[tokio::test]
    async fn test_forward_without_category() {
        let h = harness(EndpointMap::new());
        assert!(matches!(
            h.router.forward(Map::new()).await,
            Err(Error::NoActiveCategory)
        ));
    }

    #[tokio::test]
    async fn test_forward_unmapped_category() {
        let h = harness(EndpointMap::from_pairs([("fruit", "http://e1"), ("meat", "http://e2")]).unwrap());
        h.router.set_category("dairy").await.unwrap();

        match h.router.forward(Map::new()).await {
            Err(Error::UnmappedCategory(c)) => assert_eq!(c, "dairy"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forward_routes_to_active_endpoint() {
        let server = MockServer::start().await;
        let body = json!({"temperature": 7.1, "gas_ppm": 410});

        Mock::given(method("POST"))
            .and(path("/fruit"))
            .and(body_json(body.clone()))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({"prediction": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/meat"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let endpoints = EndpointMap::from_pairs([
            ("fruit", format!("{}/fruit", server.uri())),
            ("meat", format!("{}/meat", server.uri())),
        ])
        .unwrap();
        let h = harness(endpoints);
        h.router.set_category("fruit").await.unwrap();

        let outcome = h.router.forward(payload(body)).await.unwrap();
        assert_eq!(outcome.status, 202);
        assert_eq!(outcome.body, json!({"prediction": "fresh"}));
        assert!(!outcome.spoiled);
        assert!(!outcome.alert_dispatched);
    }

    #[tokio::test]
    async fn test_spoilage_alert_deduplicated_until_reset() {
        let server = MockServer::start().await;
        spoiled_model(&server).await;

        let endpoints =
            EndpointMap::from_pairs([("fruit", format!("{}/fruit", server.uri()))]).unwrap();
        let mut h = harness(endpoints);
        h.router.set_category("fruit").await.unwrap();
        next_message(&mut h.rx).await;

        let first = h.router.forward(Map::new()).await.unwrap();
        assert!(first.spoiled);
        assert!(first.alert_dispatched);
        let alert = next_message(&mut h.rx).await;
        assert_eq!(alert.text, "ALERT(Fruit): FOOD SPOILED! Dispose immediately.");

        let second = h.router.forward(Map::new()).await.unwrap();
        assert!(second.spoiled);
        assert!(!second.alert_dispatched);
        assert!(h.rx.try_recv().is_err());

        let (category, state) = h.router.reset_alert(None, AlertKind::Spoiled).await.unwrap();
        assert_eq!(category.as_str(), "fruit");
        assert_eq!(state, AlertState::Armed);

        let third = h.router.forward(Map::new()).await.unwrap();
        assert!(third.alert_dispatched);
        next_message(&mut h.rx).await;
    }

    #[tokio::test]
    async fn test_clear_result_rearms_alert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fruit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prediction": "spoiled"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/fruit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prediction": "fresh"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        spoiled_model(&server).await;

        let endpoints =
            EndpointMap::from_pairs([("fruit", format!("{}/fruit", server.uri()))]).unwrap();
        let h = harness(endpoints);
        h.router.set_category("fruit").await.unwrap();

        assert!(h.router.forward(Map::new()).await.unwrap().alert_dispatched);
        assert!(!h.router.forward(Map::new()).await.unwrap().spoiled);
        assert!(h.router.forward(Map::new()).await.unwrap().alert_dispatched);
    }

    #[tokio::test]
    async fn test_clear_result_keeps_flag_when_policy_off() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fruit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prediction": "spoiled"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/fruit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prediction": "fresh"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        spoiled_model(&server).await;

        let endpoints =
            EndpointMap::from_pairs([("fruit", format!("{}/fruit", server.uri()))]).unwrap();
        let mut h = harness(endpoints);
        h.router = h.router.with_reset_policy(AlertResetPolicy {
            on_clear: false,
            on_category_change: false,
        });
        h.router.set_category("fruit").await.unwrap();

        assert!(h.router.forward(Map::new()).await.unwrap().alert_dispatched);
        assert!(!h.router.forward(Map::new()).await.unwrap().spoiled);
        assert!(!h.router.forward(Map::new()).await.unwrap().alert_dispatched);
    }

    #[tokio::test]
    async fn test_category_change_rearms_previous_category() {
        let server = MockServer::start().await;
        spoiled_model(&server).await;

        let endpoints = EndpointMap::from_pairs([
            ("fruit", format!("{}/fruit", server.uri())),
            ("meat", format!("{}/meat", server.uri())),
        ])
        .unwrap();
        let h = harness(endpoints);
        h.router.set_category("fruit").await.unwrap();
        assert!(h.router.forward(Map::new()).await.unwrap().alert_dispatched);

        h.router.set_category("meat").await.unwrap();
        h.router.set_category("fruit").await.unwrap();
        assert!(h.router.forward(Map::new()).await.unwrap().alert_dispatched);
    }

    #[tokio::test]
    async fn test_failed_alert_is_rearmed() {
        let server = MockServer::start().await;
        spoiled_model(&server).await;

        let endpoints =
            EndpointMap::from_pairs([("fruit", format!("{}/fruit", server.uri()))]).unwrap();
        let mut h = harness(endpoints);
        h.router.set_category("fruit").await.unwrap();
        next_message(&mut h.rx).await;

        h.notifier.fail.store(true, Ordering::SeqCst);
        assert!(h.router.forward(Map::new()).await.unwrap().alert_dispatched);
        next_message(&mut h.rx).await;

        // The re-arm happens on the alert task after delivery fails
        let fruit = Category::parse("fruit").unwrap();
        let mut rearmed = false;
        for _ in 0..50 {
            if h.router.alerts.is_armed(&fruit, AlertKind::Spoiled).await {
                rearmed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(rearmed);
    }

    #[tokio::test]
    async fn test_out_of_band_change_is_followed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/meat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prediction": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;

        let endpoints = EndpointMap::from_pairs([
            ("fruit", format!("{}/fruit", server.uri())),
            ("meat", format!("{}/meat", server.uri())),
        ])
        .unwrap();
        let h = harness(endpoints);
        h.router.set_category("fruit").await.unwrap();

        // Another instance switched the shared record
        h.backing.store(ACTIVE_CATEGORY_KEY, "meat").await.unwrap();

        let outcome = h.router.forward(Map::new()).await.unwrap();
        assert_eq!(outcome.category.as_str(), "meat");
    }

    #[tokio::test]
    async fn test_forward_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoints =
            EndpointMap::from_pairs([("fruit", format!("http://{}/predict", addr))]).unwrap();
        let h = harness(endpoints);
        h.router.set_category("fruit").await.unwrap();

        assert!(matches!(
            h.router.forward(Map::new()).await,
            Err(Error::Forward { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_alert_explicit_category() {
        let h = harness(EndpointMap::new());
        let (category, state) = h
            .router
            .reset_alert(Some(" Meat "), AlertKind::Spoiled)
            .await
            .unwrap();
        assert_eq!(category.as_str(), "meat");
        assert_eq!(state, AlertState::Armed);

        assert!(matches!(
            h.router.reset_alert(None, AlertKind::Spoiled).await,
            Err(Error::NoActiveCategory)
        ));
    }

    #[tokio::test]
    async fn test_downstream_failure_does_not_rearm_alert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fruit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prediction": "spoiled"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/fruit"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        spoiled_model(&server).await;

        let endpoints =
            EndpointMap::from_pairs([("fruit", format!("{}/fruit", server.uri()))]).unwrap();
        let mut h = harness(endpoints);
        h.router.set_category("fruit").await.unwrap();
        next_message(&mut h.rx).await;

        let first = h.router.forward(Map::new()).await.unwrap();
        assert!(first.alert_dispatched);
        next_message(&mut h.rx).await;

        let outage = h.router.forward(Map::new()).await.unwrap();
        assert_eq!(outage.status, 503);
        assert!(!outage.spoiled);

        let third = h.router.forward(Map::new()).await.unwrap();
        assert!(third.spoiled);
        assert!(!third.alert_dispatched);
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_backing_read_failure_is_storage_error() {
        let backing = FlakyBacking::default();
        let store = Arc::new(CategoryStore::new(Arc::new(backing.clone())));
        let alerts = Arc::new(AlertDeduplicator::new(Arc::new(backing.clone())));
        let (notifier, _rx) = RecordingNotifier::new();
        let router = CategoryRouter::new(
            store,
            alerts,
            notifier,
            ModelClient::with_timeout(Duration::from_secs(5)).unwrap(),
            EndpointMap::new(),
        );

        backing.fail_reads.store(true, Ordering::SeqCst);
        assert!(matches!(router.get_category().await, Err(Error::Storage(_))));
        assert!(matches!(router.forward(Map::new()).await, Err(Error::Storage(_))));
        assert_eq!(router.active_category().await, None);
    }
}

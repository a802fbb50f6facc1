//! Notifier - outbound alert messages
//!
//! ## Responsibilities
//!
//! - Deliver one message per call to the messaging collaborator
//! - Bounded timeout, no retry
//! - Failures are logged and handed back, never surfaced to HTTP callers
//!
//! [`dispatch`] runs a send on its own task so request handlers never wait
//! on the messaging API.

mod telegram;

pub use telegram::{TelegramNotifier, DEFAULT_API_BASE as TELEGRAM_API_BASE};

use crate::category_store::Category;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Notification failure
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Transport failure or timeout
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Messaging API answered with a non-success status
    #[error("Messaging API rejected message: {status} - {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    /// Render `text` as Markdown
    pub markdown: bool,
}

impl Notification {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
        }
    }

    /// Active category switched
    pub fn category_changed(category: &Category) -> Self {
        Self::markdown(format!(
            "Category changed to *{}* - Model Active",
            category.display_name()
        ))
    }

    /// Spoilage detected for the active category
    pub fn spoiled(category: &Category) -> Self {
        Self::plain(format!(
            "ALERT({}): FOOD SPOILED! Dispose immediately.",
            category.display_name()
        ))
    }
}

/// Messaging collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &Notification) -> Result<(), NotifyError>;
}

/// Notifier used when no messaging credentials are configured
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &Notification) -> Result<(), NotifyError> {
        tracing::info!(text = %message.text, "Notification (messaging not configured)");
        Ok(())
    }
}

/// Send and log the outcome
pub async fn send_logged(notifier: &dyn Notifier, message: &Notification) -> Result<(), NotifyError> {
    match notifier.notify(message).await {
        Ok(()) => {
            tracing::debug!(text = %message.text, "Notification sent");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(text = %message.text, error = %e, "Notification failed");
            Err(e)
        }
    }
}

/// Send on a background task
pub fn dispatch(
    notifier: Arc<dyn Notifier>,
    message: Notification,
) -> JoinHandle<Result<(), NotifyError>> {
    tokio::spawn(async move { send_logged(notifier.as_ref(), &message).await })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::sync::mpsc;

    /// Notifier that forwards messages to a channel and can be told to fail
    pub(crate) struct RecordingNotifier {
        tx: mpsc::UnboundedSender<Notification>,
        pub fail: std::sync::atomic::AtomicBool,
    }

    impl RecordingNotifier {
        pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Notification>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    tx,
                    fail: std::sync::atomic::AtomicBool::new(false),
                }),
                rx,
            )
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &Notification) -> Result<(), NotifyError> {
            let _ = self.tx.send(message.clone());
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(NotifyError::Rejected {
                    status: 500,
                    body: "unavailable".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_message_texts() {
        let fruit = Category::parse("fruit").unwrap();

        let changed = Notification::category_changed(&fruit);
        assert_eq!(changed.text, "Category changed to *Fruit* - Model Active");
        assert!(changed.markdown);

        let spoiled = Notification::spoiled(&fruit);
        assert_eq!(spoiled.text, "ALERT(Fruit): FOOD SPOILED! Dispose immediately.");
        assert!(!spoiled.markdown);
    }

    #[tokio::test]
    async fn test_dispatch_delivers_and_reports() {
        let (notifier, mut rx) = RecordingNotifier::new();

        let handle = dispatch(notifier.clone(), Notification::plain("hello"));
        assert!(handle.await.unwrap().is_ok());
        assert_eq!(rx.recv().await.unwrap().text, "hello");

        notifier.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let handle = dispatch(notifier, Notification::plain("again"));
        assert!(matches!(
            handle.await.unwrap(),
            Err(NotifyError::Rejected { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        assert!(LogNotifier.notify(&Notification::plain("x")).await.is_ok());
    }
}

use async_trait::async_trait;
use tracing::{info, warn};

/// Outbound notification delivery. Template rendering and transport live
/// behind this seam; the core only ever hands over a recipient list and a
/// finished subject/body.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Default delivery used when no real transport is configured: the send is
/// recorded in the log and reported as successful.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> anyhow::Result<()> {
        info!(
            recipients = recipients.len(),
            subject,
            body_bytes = body.len(),
            "notification delivered to log"
        );
        Ok(())
    }
}

/// Fire-and-forget variant for request handlers: delivery failures are
/// logged and never surface into the request outcome.
pub async fn try_send(notifier: &dyn Notifier, recipients: &[String], subject: &str, body: &str) {
    if recipients.is_empty() {
        return;
    }
    if let Err(err) = notifier.send(recipients, subject, body).await {
        warn!(error = %err, subject, "notification delivery failed");
    }
}

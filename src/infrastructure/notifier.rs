//! Denial notifier adapters.

use crate::application::ports::DenialNotifier;
use crate::domain::decision::DenialNotice;
use crate::error::NotifierError;
use crate::infrastructure::config;

/// Notification target used when no configuration names one.
pub const DEFAULT_NOTIFICATION_TARGET: &str = "asdf@asdf.org";

/// Reports denials as `warn` events on the `safetynet::denial` target.
///
/// Route that target to e-mail, paging or a log sink with whatever
/// subscriber the application installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogNotifier {
    target: String,
}

impl LogNotifier {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// The operator address carried on every event.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Default for LogNotifier {
    /// Target from the installed configuration, else
    /// [`DEFAULT_NOTIFICATION_TARGET`].
    fn default() -> Self {
        let target = config::installed()
            .and_then(|config| config.notification_email.clone())
            .unwrap_or_else(|| DEFAULT_NOTIFICATION_TARGET.to_string());
        Self::new(target)
    }
}

impl DenialNotifier for LogNotifier {
    fn notify(&self, notice: &DenialNotice) -> Result<(), NotifierError> {
        let envelope = notice.envelope(&self.target);
        tracing::warn!(
            target: "safetynet::denial",
            notify = %envelope.to,
            subject = %envelope.subject,
            address = %notice.address,
            channel = %notice.channel,
            action = %notice.action,
            limit = %notice.limit,
            timeframe = %notice.timeframe,
            "{}",
            notice.message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channel::Channel;
    use crate::domain::policy::{Limit, Timeframe};
    use crate::infrastructure::mocks::MockCaptureLayer;
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_log_notifier_emits_warn_event() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let notifier = LogNotifier::new("ops@asdf.org");
        let notice = DenialNotice::new(
            "u@x.com",
            Channel::Sms,
            "send_sms",
            Limit::Max(1),
            Timeframe::from_secs(1),
        );

        tracing::subscriber::with_default(subscriber, || {
            notifier.notify(&notice).unwrap();
        });

        let events = capture.get_captured();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::WARN);
        assert_eq!(events[0].target, "safetynet::denial");
        assert_eq!(events[0].message, "Safetynet has caught a method!");
        assert_eq!(events[0].field("notify"), Some("ops@asdf.org"));
        assert_eq!(events[0].field("channel"), Some("sms"));
        assert_eq!(events[0].field("limit"), Some("1"));
    }

    #[test]
    fn test_explicit_target() {
        assert_eq!(LogNotifier::new("ops@example.org").target(), "ops@example.org");
    }
}

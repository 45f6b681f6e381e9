use tracing::warn;

/// Localized message key shown to the user when microphone access is
/// denied.
pub const AUDIO_PERMISSION_MESSAGE: &str = "audio__permission_message";

/// User-facing notification surface.
///
/// The session reports a failed device acquisition exactly once per
/// attempt. Implementations route the message key to whatever
/// presentation layer is in use (toast, dialog, log line).
pub trait Notifier: Send + Sync {
    fn notify(&self, message_key: &str);
}

/// Default notifier that writes the message key to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message_key: &str) {
        warn!("user notification: {}", message_key);
    }
}

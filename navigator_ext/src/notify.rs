//! User-facing notifications.

/// Message shown when the analysis package is missing.
pub const INSTALL_HINT: &str = "ffi-navigator package not found. \
    Install it with `pip install ffi-navigator` and reload the editor.";

/// Sink for user-visible error notifications.
pub trait Notifier {
    fn error(&self, message: &str);
}

/// Notifier that writes to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn error(&self, message: &str) {
        log::error!("{}", message);
    }
}

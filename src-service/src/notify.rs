//! User-facing notifications.

use crate::persist::SaveSummary;
use tracing::info;

/// Receives the aggregate result of each saved burst.
pub trait Notifier: Send + Sync {
    fn burst_saved(&self, summary: &SaveSummary);
}

/// [`Notifier`] that writes to the service log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn burst_saved(&self, summary: &SaveSummary) {
        info!("Screenshot: {}", summary);
    }
}

pub mod terminal;

use crate::model::AnnotatedCandle;

/// Sink for zone-retest signals.
pub trait Notifier: Send + Sync {
    fn notify(&self, symbol: &str, signal: &AnnotatedCandle);
}

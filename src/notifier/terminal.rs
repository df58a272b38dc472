use crate::model::AnnotatedCandle;
use crate::notifier::Notifier;

pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, symbol: &str, signal: &AnnotatedCandle) {
        let Some(retest) = &signal.annotation.retest else {
            return;
        };
        let zone = signal.annotation.zone.as_ref();

        tracing::warn!(
            symbol = symbol,
            timestamp = %signal.candle.timestamp,
            retest = %retest.retest,
            retest_date = %retest.retest_date,
            close = signal.candle.close,
            level_high = ?zone.map(|z| z.level_high),
            level_low = ?zone.map(|z| z.level_low),
            "SIGNAL: {} on {} at {}",
            retest.retest,
            symbol,
            signal.candle.close,
        );
    }
}

use crate::model::AnnotatedCandle;

/// Most recent valid retest among the last `look_back` candles, newest first.
pub fn scan(candles: &[AnnotatedCandle], look_back: usize) -> Option<&AnnotatedCandle> {
    let start = candles.len().saturating_sub(look_back);
    candles[start..].iter().rev().find(|c| c.is_signal())
}

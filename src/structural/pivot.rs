use crate::model::{Candle, CloseType, Direction, Pivot};

/// Classify every candle as an up/down fractal using a symmetric window of
/// `strength` candles on each side.
///
/// Candles without a full window on both sides are never pivots. The
/// preceding window allows ties and the following window requires strict
/// dominance, so a flat top is credited to its first candle.
pub fn detect_pivots(
    candles: &[Candle],
    strength: usize,
    close_type: CloseType,
) -> Vec<Option<Pivot>> {
    let len = candles.len();
    (0..len)
        .map(|i| {
            if strength == 0 || i < strength || i + strength >= len {
                return None;
            }
            let before = &candles[i - strength..i];
            let after = &candles[i + 1..=i + strength];
            classify(&candles[i], before, after, close_type)
        })
        .collect()
}

fn classify(
    current: &Candle,
    before: &[Candle],
    after: &[Candle],
    close_type: CloseType,
) -> Option<Pivot> {
    let high = cmp_high(current, close_type);
    let low = cmp_low(current, close_type);

    let is_up = before.iter().all(|c| high >= cmp_high(c, close_type))
        && after.iter().all(|c| high > cmp_high(c, close_type));
    let is_down = before.iter().all(|c| low <= cmp_low(c, close_type))
        && after.iter().all(|c| low < cmp_low(c, close_type));

    match (is_up, is_down) {
        (true, true) => Some(Pivot::Both),
        (true, false) => Some(Pivot::Up),
        (false, true) => Some(Pivot::Down),
        (false, false) => None,
    }
}

fn cmp_high(candle: &Candle, close_type: CloseType) -> f64 {
    match close_type {
        CloseType::Hl => candle.high,
        CloseType::Close => candle.close,
    }
}

fn cmp_low(candle: &Candle, close_type: CloseType) -> f64 {
    match close_type {
        CloseType::Hl => candle.low,
        CloseType::Close => candle.close,
    }
}

/// Direction and tracked value of every pending pivot `pivot` contributes.
pub fn tracked_values(
    candle: &Candle,
    pivot: Pivot,
    close_type: CloseType,
) -> impl Iterator<Item = (Direction, f64)> + '_ {
    directions(pivot)
        .iter()
        .map(move |&direction| {
            (direction, tracked_value(candle, direction, close_type))
        })
}

/// Price level a pending pivot is later broken against.
fn tracked_value(candle: &Candle, direction: Direction, close_type: CloseType) -> f64 {
    match (close_type, direction) {
        (CloseType::Hl, Direction::Up) => candle.high,
        (CloseType::Hl, Direction::Down) => candle.low,
        (CloseType::Close, _) => candle.close,
    }
}

/// Pending-pivot directions a tagged candle contributes, in enqueue order.
fn directions(pivot: Pivot) -> &'static [Direction] {
    match pivot {
        Pivot::Up => &[Direction::Up],
        Pivot::Down => &[Direction::Down],
        Pivot::Both => &[Direction::Up, Direction::Down],
    }
}

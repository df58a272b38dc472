use std::path::Path;

use error_stack::{Report, ResultExt, bail};

use crate::error::InputError;
use crate::model::Candle;

/// Load candles from a JSON file holding an array of candle objects,
/// oldest first.
pub fn load(path: &Path) -> Result<Vec<Candle>, Report<InputError>> {
    let content = std::fs::read_to_string(path)
        .change_context(InputError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    parse_candles(&content).attach_with(|| format!("path: {}", path.display()))
}

/// Parse and validate a JSON candle array.
///
/// Any malformed candle fails the whole batch; nothing is skipped.
pub fn parse_candles(content: &str) -> Result<Vec<Candle>, Report<InputError>> {
    let candles: Vec<Candle> = serde_json::from_str(content).change_context(InputError::Parse)?;
    validate(&candles)?;
    Ok(candles)
}

fn validate(candles: &[Candle]) -> Result<(), Report<InputError>> {
    for (index, candle) in candles.iter().enumerate() {
        let prices = [candle.open, candle.high, candle.low, candle.close];
        if prices.iter().any(|p| !p.is_finite()) {
            bail!(InputError::Malformed {
                index,
                reason: "non-finite price".into(),
            });
        }
        if candle.high < candle.low {
            bail!(InputError::Malformed {
                index,
                reason: format!("high {} below low {}", candle.high, candle.low),
            });
        }
    }

    if let Some(index) = candles
        .windows(2)
        .position(|w| w[1].timestamp < w[0].timestamp)
    {
        bail!(InputError::Malformed {
            index: index + 1,
            reason: "timestamp earlier than previous candle".into(),
        });
    }

    Ok(())
}

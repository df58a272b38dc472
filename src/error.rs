use derive_more::{Display, Error};

use crate::model::Direction;

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum InputError {
    #[display("failed to read candle file")]
    ReadFile,
    #[display("failed to parse candles")]
    Parse,
    #[display("malformed candle at index {index}: {reason}")]
    Malformed { index: usize, reason: String },
}

#[derive(Debug, Display, Error)]
pub enum AnalysisError {
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
    #[display("degenerate zone at index {index}: high {high} <= low {low}")]
    DegenerateZone { index: usize, high: f64, low: f64 },
    #[display("breakout at index {index} has no previous candle")]
    MissingPreviousCandle { index: usize },
    #[display("pivot at index {index} has no usable {direction} value")]
    UndefinedPivotValue { index: usize, direction: Direction },
}

#[derive(Debug, Display, Error)]
pub enum ReportError {
    #[display("failed to serialize report")]
    Serialize,
}

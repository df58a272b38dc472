use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price used for pivot comparison and pivot tracked values.
///
/// `HL` compares highs for up pivots and lows for down pivots; `CLOSE`
/// compares closes in both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloseType {
    #[default]
    #[serde(rename = "HL", alias = "hl")]
    Hl,
    #[serde(rename = "CLOSE", alias = "close")]
    Close,
}

impl fmt::Display for CloseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hl => write!(f, "HL"),
            Self::Close => write!(f, "CLOSE"),
        }
    }
}

/// Fractal classification of a single candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pivot {
    Up,
    Down,
    Both,
}

impl fmt::Display for Pivot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
            Self::Both => write!(f, "BOTH"),
        }
    }
}

/// Direction of a pending pivot. A `BOTH` candle contributes one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Zone kind formed when a pivot in this direction is broken.
    pub fn zone_kind(self) -> ZoneKind {
        match self {
            Self::Up => ZoneKind::Support,
            Self::Down => ZoneKind::Resistance,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneKind {
    Support,
    Resistance,
}

impl ZoneKind {
    pub fn retest_kind(self) -> RetestKind {
        match self {
            Self::Support => RetestKind::Support,
            Self::Resistance => RetestKind::Resistance,
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Support => write!(f, "SUPPORT"),
            Self::Resistance => write!(f, "RESISTANCE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Validity {
    Valid,
    Invalid,
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "VALID"),
            Self::Invalid => write!(f, "INVALID"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetestKind {
    #[serde(rename = "RETEST_SUPPORT")]
    Support,
    #[serde(rename = "RETEST_RESISTANCE")]
    Resistance,
}

impl fmt::Display for RetestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Support => write!(f, "RETEST_SUPPORT"),
            Self::Resistance => write!(f, "RETEST_RESISTANCE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Zone fields written onto the candle whose close broke a pending pivot.
///
/// `valid` and `invalid_date` are later rewritten when another candle closes
/// through the zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStamp {
    pub zone_type: ZoneKind,
    pub range: f64,
    pub pivot_date: DateTime<Utc>,
    pub valid: Validity,
    pub level_high: f64,
    pub level_low: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetestStamp {
    pub retest: RetestKind,
    /// Formation timestamp of the retested zone.
    pub retest_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot: Option<Pivot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<ZoneStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retest: Option<RetestStamp>,
}

impl Annotation {
    pub fn validity(&self) -> Option<Validity> {
        self.zone.as_ref().map(|z| z.valid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedCandle {
    #[serde(flatten)]
    pub candle: Candle,
    #[serde(flatten)]
    pub annotation: Annotation,
}

impl AnnotatedCandle {
    /// A row counts as a signal when it retested a zone and the zone it formed
    /// itself is still valid.
    pub fn is_signal(&self) -> bool {
        self.annotation.retest.is_some() && self.annotation.validity() == Some(Validity::Valid)
    }
}

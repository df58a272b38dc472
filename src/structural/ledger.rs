use chrono::{DateTime, Utc};
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::model::{
    Candle, CloseType, Direction, Pivot, RetestStamp, Validity, ZoneKind, ZoneStamp,
};
use crate::structural::pivot::tracked_values;

/// A pivot waiting for a close beyond its tracked value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPivot {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub value: f64,
}

impl PendingPivot {
    fn is_broken_by(&self, close: f64) -> bool {
        match self.direction {
            Direction::Up => close > self.value,
            Direction::Down => close < self.value,
        }
    }

    /// Whether this pivot is superseded by the breakout of `consumed`.
    ///
    /// An up breakout supersedes every down pivot and every up pivot that is
    /// not strictly higher; a down breakout is the mirror.
    fn outranked_by_breakout_of(&self, consumed: &PendingPivot) -> bool {
        match consumed.direction {
            Direction::Up => self.direction == Direction::Down || self.value <= consumed.value,
            Direction::Down => self.direction == Direction::Up || self.value >= consumed.value,
        }
    }

    fn same_slot(&self, other: &PendingPivot) -> bool {
        self.index == other.index && self.direction == other.direction
    }
}

/// An active supply or demand level. `high > low` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub formed_at_index: usize,
    pub formed_at_timestamp: DateTime<Utc>,
    pub kind: ZoneKind,
    pub high: f64,
    pub low: f64,
    pub valid: Validity,
}

impl Zone {
    fn is_closed_through(&self, close: f64) -> bool {
        match self.kind {
            ZoneKind::Support => close < self.low,
            ZoneKind::Resistance => close > self.high,
        }
    }

    fn is_retested_by(&self, candle: &Candle) -> bool {
        match self.kind {
            ZoneKind::Support => candle.close > self.low && candle.low <= self.high,
            ZoneKind::Resistance => candle.close < self.high && candle.high >= self.low,
        }
    }
}

/// Unconfirmed pivots in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingPivots(Vec<PendingPivot>);

impl PendingPivots {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingPivot> {
        self.0.iter()
    }

    pub fn push(&mut self, pivot: PendingPivot) {
        self.0.push(pivot);
    }

    fn contains(&self, pivot: &PendingPivot) -> bool {
        self.0.iter().any(|p| p.same_slot(pivot))
    }

    /// Drop the consumed pivot and everything its breakout supersedes.
    fn prune(&mut self, consumed: &PendingPivot) {
        self.0.retain(|p| !p.outranked_by_breakout_of(consumed));
    }
}

/// Active zones in formation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneLedger(Vec<Zone>);

impl ZoneLedger {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.0.iter()
    }

    fn push(&mut self, zone: Zone) {
        self.0.push(zone);
    }

    /// Remove every zone the candle closes through. Each zone is judged
    /// against the ledger as it stood before the candle.
    fn invalidate(&mut self, candle: &Candle) -> Vec<Invalidation> {
        let (broken, kept): (Vec<Zone>, Vec<Zone>) = std::mem::take(&mut self.0)
            .into_iter()
            .partition(|zone| zone.is_closed_through(candle.close));
        self.0 = kept;

        broken
            .into_iter()
            .map(|mut zone| {
                zone.valid = Validity::Invalid;
                Invalidation {
                    zone,
                    invalid_date: candle.timestamp,
                }
            })
            .collect()
    }

    /// Retest of the candle against the surviving zones. When several zones
    /// match, the last one in ledger order is reported.
    fn retest(&self, candle: &Candle) -> Option<RetestStamp> {
        self.0
            .iter()
            .rev()
            .find(|zone| zone.is_retested_by(candle))
            .map(|zone| RetestStamp {
                retest: zone.kind.retest_kind(),
                retest_date: zone.formed_at_timestamp,
            })
    }
}

/// What one candle sees while it is processed.
#[derive(Debug, Clone, Copy)]
pub struct CandleContext<'a> {
    pub index: usize,
    pub current: &'a Candle,
    pub previous: Option<&'a Candle>,
    pub pivot: Option<Pivot>,
    pub close_type: CloseType,
}

/// A zone closed through by the current candle. The zone carries
/// `Validity::Invalid`; its formation candle record must be updated.
#[derive(Debug, Clone, PartialEq)]
pub struct Invalidation {
    pub zone: Zone,
    pub invalid_date: DateTime<Utc>,
}

/// Effects of one candle on the annotated sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    /// Stamp for the current candle when it broke at least one pivot.
    pub zone: Option<ZoneStamp>,
    pub retest: Option<RetestStamp>,
    pub invalidations: Vec<Invalidation>,
    pub formed: Vec<Zone>,
}

/// State threaded from one candle to the next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneState {
    pub pending: PendingPivots,
    pub zones: ZoneLedger,
}

impl ZoneState {
    /// Apply one candle: invalidation, retest, breakout, then enqueue.
    ///
    /// The order matters. A zone invalidated by this candle cannot be retested
    /// by it, a zone formed by this candle is not checked against it, and a
    /// pivot tagged on this candle can only be broken by later candles.
    pub fn step(
        mut self,
        ctx: &CandleContext<'_>,
    ) -> Result<(Self, Transition), Report<AnalysisError>> {
        let invalidations = self.zones.invalidate(ctx.current);
        for invalidation in &invalidations {
            tracing::debug!(
                index = ctx.index,
                formed_at = invalidation.zone.formed_at_index,
                kind = %invalidation.zone.kind,
                "zone invalidated"
            );
        }

        let retest = self.zones.retest(ctx.current);
        if let Some(retest) = &retest {
            tracing::debug!(
                index = ctx.index,
                retest = %retest.retest,
                zone_date = %retest.retest_date,
                "zone retested"
            );
        }

        let formed = self.break_pivots(ctx)?;
        self.enqueue(ctx)?;

        let zone = formed.last().map(|(zone, stamp)| {
            tracing::debug!(
                index = ctx.index,
                kind = %zone.kind,
                high = zone.high,
                low = zone.low,
                pivot_date = %stamp.pivot_date,
                "zone formed"
            );
            stamp.clone()
        });

        Ok((
            self,
            Transition {
                zone,
                retest,
                invalidations,
                formed: formed.into_iter().map(|(zone, _)| zone).collect(),
            },
        ))
    }

    fn break_pivots(
        &mut self,
        ctx: &CandleContext<'_>,
    ) -> Result<Vec<(Zone, ZoneStamp)>, Report<AnalysisError>> {
        let snapshot: Vec<PendingPivot> = self.pending.iter().cloned().collect();
        let mut formed = Vec::new();

        for pivot in snapshot {
            // Pruned by an earlier breakout on this same candle.
            if !self.pending.contains(&pivot) || !pivot.is_broken_by(ctx.current.close) {
                continue;
            }

            let (zone, stamp) = form_zone(&pivot, ctx)?;
            self.zones.push(zone.clone());
            self.pending.prune(&pivot);
            formed.push((zone, stamp));
        }

        Ok(formed)
    }

    fn enqueue(&mut self, ctx: &CandleContext<'_>) -> Result<(), Report<AnalysisError>> {
        let Some(pivot) = ctx.pivot else {
            return Ok(());
        };

        for (direction, value) in tracked_values(ctx.current, pivot, ctx.close_type) {
            if !value.is_finite() {
                bail!(AnalysisError::UndefinedPivotValue {
                    index: ctx.index,
                    direction,
                });
            }
            self.pending.push(PendingPivot {
                index: ctx.index,
                timestamp: ctx.current.timestamp,
                direction,
                value,
            });
        }
        Ok(())
    }
}

fn form_zone(
    pivot: &PendingPivot,
    ctx: &CandleContext<'_>,
) -> Result<(Zone, ZoneStamp), Report<AnalysisError>> {
    let Some(previous) = ctx.previous else {
        bail!(AnalysisError::MissingPreviousCandle { index: ctx.index });
    };
    let current = ctx.current;

    // Boundaries are the two prices framing the gap; a negative range means
    // the candles overlap.
    let (range, edge_a, edge_b) = match pivot.direction {
        Direction::Up => (current.low - previous.high, previous.high, current.low),
        Direction::Down => (previous.low - current.high, current.high, previous.low),
    };
    let high = edge_a.max(edge_b);
    let low = edge_a.min(edge_b);

    if !(high > low) {
        bail!(AnalysisError::DegenerateZone {
            index: ctx.index,
            high,
            low,
        });
    }

    let kind = pivot.direction.zone_kind();
    let zone = Zone {
        formed_at_index: ctx.index,
        formed_at_timestamp: current.timestamp,
        kind,
        high,
        low,
        valid: Validity::Valid,
    };
    let stamp = ZoneStamp {
        zone_type: kind,
        range,
        pivot_date: pivot.timestamp,
        valid: Validity::Valid,
        level_high: high,
        level_low: low,
        invalid_date: None,
    };
    Ok((zone, stamp))
}

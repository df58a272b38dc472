pub mod ledger;
pub mod pivot;
pub mod signal;

use error_stack::{Report, bail};

use crate::config::StructuralSdConfig;
use crate::error::AnalysisError;
use crate::model::{AnnotatedCandle, Annotation, Candle, CloseType, Validity};
use crate::structural::ledger::{CandleContext, Transition, ZoneState};

/// Structural supply/demand detector.
///
/// Pivots are tagged over the whole series first, then one forward pass
/// threads a [`ZoneState`] through every candle and records what each candle
/// did in its [`Annotation`].
#[derive(Debug, Clone)]
pub struct StructuralSd {
    pivot_strength: usize,
    close_type: CloseType,
    look_back: usize,
}

/// Annotated output of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub candles: Vec<AnnotatedCandle>,
    /// Pending pivots and active zones after the last candle.
    pub state: ZoneState,
    pub zones_formed: usize,
    pub zones_invalidated: usize,
    look_back: usize,
}

impl Analysis {
    /// Latest valid retest within the look-back window, if any.
    pub fn signal(&self) -> Option<&AnnotatedCandle> {
        signal::scan(&self.candles, self.look_back)
    }
}

impl StructuralSd {
    pub fn new(config: &StructuralSdConfig) -> Result<Self, Report<AnalysisError>> {
        if config.pivot_strength == 0 {
            bail!(AnalysisError::InvalidParameter {
                name: "pivot_strength must be > 0".into(),
            });
        }
        if config.look_back_candles_for_signal == 0 {
            bail!(AnalysisError::InvalidParameter {
                name: "look_back_candles_for_signal must be > 0".into(),
            });
        }
        Ok(Self {
            pivot_strength: config.pivot_strength,
            close_type: config.close_type,
            look_back: config.look_back_candles_for_signal,
        })
    }

    /// Minimum series length that can produce a pivot.
    pub fn required_candles(&self) -> usize {
        2 * self.pivot_strength + 1
    }

    /// Annotate the series and pick out the latest signal, if any.
    pub fn apply(
        &self,
        candles: &[Candle],
    ) -> Result<(Analysis, Option<AnnotatedCandle>), Report<AnalysisError>> {
        let analysis = self.annotate(candles)?;
        let signal = analysis.signal().cloned();
        Ok((analysis, signal))
    }

    /// Tag pivots, run the zone state machine over every candle and return
    /// the annotated series. Shorter series than [`required_candles`] come
    /// back unannotated.
    ///
    /// [`required_candles`]: Self::required_candles
    pub fn annotate(&self, candles: &[Candle]) -> Result<Analysis, Report<AnalysisError>> {
        let pivots = pivot::detect_pivots(candles, self.pivot_strength, self.close_type);

        let mut rows: Vec<AnnotatedCandle> = candles
            .iter()
            .zip(&pivots)
            .map(|(candle, &pivot)| AnnotatedCandle {
                candle: candle.clone(),
                annotation: Annotation {
                    pivot,
                    ..Annotation::default()
                },
            })
            .collect();

        let mut state = ZoneState::default();
        let mut zones_formed = 0;
        let mut zones_invalidated = 0;

        for (index, current) in candles.iter().enumerate() {
            let ctx = CandleContext {
                index,
                current,
                previous: index.checked_sub(1).map(|i| &candles[i]),
                pivot: pivots[index],
                close_type: self.close_type,
            };
            let (next, transition) = state.step(&ctx)?;
            state = next;

            zones_formed += transition.formed.len();
            zones_invalidated += transition.invalidations.len();
            record(&mut rows, index, transition);
        }

        let analysis = Analysis {
            candles: rows,
            state,
            zones_formed,
            zones_invalidated,
            look_back: self.look_back,
        };

        tracing::info!(
            candles = candles.len(),
            pivots = pivots.iter().filter(|p| p.is_some()).count(),
            zones_formed,
            zones_invalidated,
            active_zones = analysis.state.zones.len(),
            pending_pivots = analysis.state.pending.len(),
            signal = analysis.signal().is_some(),
            "structural analysis complete"
        );

        Ok(analysis)
    }
}

fn record(rows: &mut [AnnotatedCandle], index: usize, transition: Transition) {
    let annotation = &mut rows[index].annotation;
    annotation.zone = transition.zone;
    annotation.retest = transition.retest;

    for invalidation in transition.invalidations {
        let formed_at = invalidation.zone.formed_at_index;
        if let Some(stamp) = rows[formed_at].annotation.zone.as_mut() {
            stamp.valid = Validity::Invalid;
            stamp.invalid_date = Some(invalidation.invalid_date);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Pivot, RetestKind, ZoneKind};
    use crate::structural::test_util::{candle, flat, series, ts};

    fn engine(pivot_strength: usize, look_back: usize) -> StructuralSd {
        engine_with(pivot_strength, CloseType::Hl, look_back)
    }

    fn engine_with(
        pivot_strength: usize,
        close_type: CloseType,
        look_back: usize,
    ) -> StructuralSd {
        StructuralSd::new(&StructuralSdConfig {
            pivot_strength,
            close_type,
            look_back_candles_for_signal: look_back,
        })
        .unwrap()
    }

    /// Up pivot at 3 broken at 6 into support [102, 104], retested at 7,
    /// closed through at 8.
    fn support_lifecycle() -> Vec<Candle> {
        series(&[
            (100.0, 98.0, 99.0),
            (101.0, 99.0, 100.0),
            (103.0, 100.0, 102.0),
            (106.0, 102.0, 105.0),
            (104.0, 100.0, 101.0),
            (102.0, 97.0, 98.0),
            (108.0, 104.0, 107.0),
            (105.0, 101.0, 103.0),
            (103.0, 99.0, 100.0),
            (101.0, 99.5, 100.5),
        ])
    }

    /// Support [103, 105] formed at 3; candle 5 retests it while breaking
    /// the pivot at 3, forming support [104.5, 106] on itself.
    fn retest_signal() -> Vec<Candle> {
        series(&[
            (100.0, 98.0, 99.0),
            (104.0, 99.0, 103.0),
            (103.0, 100.0, 101.0),
            (107.0, 105.0, 106.0),
            (106.0, 104.0, 104.5),
            (109.0, 104.5, 108.5),
            (108.0, 106.5, 107.0),
        ])
    }

    fn wave(len: usize) -> Vec<Candle> {
        let hlc: Vec<_> = (0..len)
            .map(|i| {
                let x = i as f64;
                let mid = 100.0 + 8.0 * (x * 0.37).sin() + 3.0 * (x * 1.91).sin();
                let high = mid + 0.7 + 0.4 * (x * 2.71).cos().abs();
                let low = mid - 0.6 - 0.5 * (x * 3.13).sin().abs();
                let close = low + (high - low) * (0.5 + 0.45 * (x * 0.83).sin());
                (high, low, close)
            })
            .collect();
        series(&hlc)
    }

    #[test]
    fn zero_pivot_strength_rejected() {
        let config = StructuralSdConfig {
            pivot_strength: 0,
            ..StructuralSdConfig::default()
        };
        assert!(StructuralSd::new(&config).is_err());
    }

    #[test]
    fn zero_look_back_rejected() {
        let config = StructuralSdConfig {
            look_back_candles_for_signal: 0,
            ..StructuralSdConfig::default()
        };
        assert!(StructuralSd::new(&config).is_err());
    }

    #[test]
    fn flat_series_yields_nothing() {
        let sd = StructuralSd::new(&StructuralSdConfig::default()).unwrap();
        let candles: Vec<Candle> = (0..10).map(|i| flat(i, 100.0)).collect();

        let analysis = sd.annotate(&candles).unwrap();

        assert!(analysis.candles.iter().all(|c| c.annotation == Annotation::default()));
        assert_eq!(analysis.zones_formed, 0);
        assert!(analysis.signal().is_none());
    }

    #[test]
    fn empty_series_is_valid() {
        let analysis = engine(5, 3).annotate(&[]).unwrap();
        assert!(analysis.candles.is_empty());
        assert!(analysis.signal().is_none());
    }

    #[test]
    fn support_forms_retests_and_invalidates() {
        let analysis = engine(2, 3).annotate(&support_lifecycle()).unwrap();
        let rows = &analysis.candles;

        assert_eq!(rows[3].annotation.pivot, Some(Pivot::Up));
        assert_eq!(rows[5].annotation.pivot, Some(Pivot::Down));
        assert_eq!(rows[6].annotation.pivot, Some(Pivot::Up));

        let zone = rows[6].annotation.zone.as_ref().unwrap();
        assert_eq!(zone.zone_type, ZoneKind::Support);
        assert_eq!(zone.pivot_date, ts(3));
        assert_eq!((zone.level_low, zone.level_high), (102.0, 104.0));
        assert!((zone.range - 2.0).abs() < 1e-9);

        let retest = rows[7].annotation.retest.as_ref().unwrap();
        assert_eq!(retest.retest, RetestKind::Support);
        assert_eq!(retest.retest_date, ts(6));

        assert_eq!(zone.valid, Validity::Invalid);
        assert_eq!(zone.invalid_date, Some(ts(8)));
        assert!(rows[8].annotation.retest.is_none());

        assert_eq!(analysis.zones_formed, 1);
        assert_eq!(analysis.zones_invalidated, 1);
        assert!(analysis.state.zones.is_empty());
        // The down pivot at 5 was superseded by the up breakout at 6.
        let pending: Vec<_> = analysis.state.pending.iter().map(|p| p.index).collect();
        assert_eq!(pending, vec![6]);
        // Row 7 retested but formed no zone of its own.
        assert!(analysis.signal().is_none());
    }

    #[test]
    fn retest_on_breakout_candle_is_a_signal() {
        let analysis = engine(1, 3).annotate(&retest_signal()).unwrap();
        let rows = &analysis.candles;

        assert_eq!(rows[3].annotation.zone.as_ref().unwrap().pivot_date, ts(1));
        assert!(rows[4].annotation.retest.is_some());
        assert_eq!(rows[4].annotation.pivot, Some(Pivot::Down));

        let signal = analysis.signal().unwrap();
        assert_eq!(signal.candle.timestamp, ts(5));
        let zone = signal.annotation.zone.as_ref().unwrap();
        assert_eq!(zone.pivot_date, ts(3));
        assert_eq!((zone.level_low, zone.level_high), (104.5, 106.0));
        assert_eq!(signal.annotation.retest.as_ref().unwrap().retest_date, ts(3));
    }

    #[test]
    fn apply_returns_latest_signal() {
        let sd = engine(1, 3);
        let (analysis, signal) = sd.apply(&retest_signal()).unwrap();

        let signal = signal.unwrap();
        assert_eq!(signal.candle.timestamp, ts(5));
        assert_eq!(Some(&signal), analysis.signal());
        assert_eq!(analysis, sd.annotate(&retest_signal()).unwrap());
    }

    #[test]
    fn apply_without_signal_returns_none() {
        let candles: Vec<Candle> = (0..10).map(|i| flat(i, 100.0)).collect();
        let (analysis, signal) = engine(5, 3).apply(&candles).unwrap();
        assert!(signal.is_none());
        assert_eq!(analysis.candles.len(), 10);
    }

    #[test]
    fn signal_outside_look_back_is_dropped() {
        let analysis = engine(1, 1).annotate(&retest_signal()).unwrap();
        assert!(analysis.signal().is_none());
    }

    #[test]
    fn invalidation_clears_signal() {
        let mut candles = retest_signal();
        candles.push(candle(7, 105.0, 106.0, 100.0, 102.0));

        let analysis = engine(1, 3).annotate(&candles).unwrap();

        assert!(analysis.signal().is_none());
        assert_eq!(analysis.zones_invalidated, 2);
        let zone = analysis.candles[5].annotation.zone.as_ref().unwrap();
        assert_eq!(zone.valid, Validity::Invalid);
        assert_eq!(zone.invalid_date, Some(ts(7)));
    }

    #[test]
    fn close_mode_tracks_closes_end_to_end() {
        // Candle 1 tops on close but not on high, then candle 3 gaps above 2.
        let candles = series(&[
            (101.0, 99.0, 100.0),
            (106.0, 100.0, 104.0),
            (107.0, 101.0, 102.0),
            (109.0, 107.5, 108.5),
            (109.0, 107.2, 108.0),
        ]);

        let close = engine_with(1, CloseType::Close, 3);
        let analysis = close.annotate(&candles).unwrap();
        let rows = &analysis.candles;

        assert_eq!(rows[1].annotation.pivot, Some(Pivot::Up));
        assert_eq!(rows[2].annotation.pivot, Some(Pivot::Down));
        assert_eq!(rows[3].annotation.pivot, Some(Pivot::Up));

        let zone = rows[3].annotation.zone.as_ref().unwrap();
        assert_eq!(zone.zone_type, ZoneKind::Support);
        assert_eq!(zone.pivot_date, ts(1));
        assert_eq!((zone.level_low, zone.level_high), (107.0, 107.5));
        assert!((zone.range - 0.5).abs() < 1e-9);
        assert_eq!(zone.valid, Validity::Valid);

        let retest = rows[4].annotation.retest.as_ref().unwrap();
        assert_eq!(retest.retest, RetestKind::Support);
        assert_eq!(retest.retest_date, ts(3));

        assert_eq!(analysis.zones_formed, 1);
        let pending: Vec<_> = analysis.state.pending.iter().map(|p| p.index).collect();
        assert_eq!(pending, vec![3]);

        let hl = engine_with(1, CloseType::Hl, 3);
        let hl = hl.annotate(&candles).unwrap();
        assert!(hl.candles.iter().all(|c| c.annotation.pivot.is_none()));
        assert_eq!(hl.zones_formed, 0);
    }

    #[test]
    fn runs_are_deterministic() {
        let sd = engine(3, 3);
        let candles = wave(200);
        let first = sd.annotate(&candles).unwrap();
        assert_eq!(first, sd.annotate(&candles).unwrap());
    }

    #[test]
    fn zone_stamps_are_consistent() {
        let analysis = engine(3, 3).annotate(&wave(300)).unwrap();
        assert!(analysis.zones_formed > 0);

        for row in &analysis.candles {
            let Some(zone) = &row.annotation.zone else {
                continue;
            };
            assert!(zone.level_high > zone.level_low);
            assert!(zone.pivot_date < row.candle.timestamp);
            match zone.valid {
                Validity::Valid => assert!(zone.invalid_date.is_none()),
                Validity::Invalid => {
                    assert!(zone.invalid_date.unwrap() > row.candle.timestamp)
                }
            }
        }
        for row in &analysis.candles {
            if let Some(retest) = &row.annotation.retest {
                assert!(retest.retest_date < row.candle.timestamp);
            }
        }
    }

    #[test]
    fn active_zones_match_valid_stamps() {
        let analysis = engine(2, 3).annotate(&wave(250)).unwrap();
        let valid_rows = analysis
            .candles
            .iter()
            .filter(|c| c.annotation.validity() == Some(Validity::Valid))
            .count();
        let active_rows: std::collections::BTreeSet<_> = analysis
            .state
            .zones
            .iter()
            .map(|z| z.formed_at_index)
            .collect();
        assert_eq!(valid_rows, active_rows.len());
        assert_eq!(
            analysis.zones_formed - analysis.zones_invalidated,
            analysis.state.zones.len()
        );
    }
}

use chrono::{Duration, Local, NaiveDateTime, NaiveTime, Timelike};
use error_stack::{Report, bail};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ScheduleConfig;
use crate::error::ConfigError;

/// Wall-clock cadence for re-running the analysis.
///
/// Runs are aligned to `interval_minutes` boundaries counted from a daily
/// anchor time and fire thirty seconds past the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    anchor: NaiveTime,
    interval_minutes: u32,
}

impl Schedule {
    pub fn new(config: &ScheduleConfig) -> Result<Self, Report<ConfigError>> {
        if config.interval_minutes == 0 {
            bail!(ConfigError::Validation {
                field: "interval_minutes must be > 0".into(),
            });
        }
        let Some(anchor) = NaiveTime::from_hms_opt(config.initial_hour, config.initial_minute, 0)
        else {
            bail!(ConfigError::Validation {
                field: format!(
                    "initial time {:02}:{:02} is not a valid time of day",
                    config.initial_hour, config.initial_minute
                ),
            });
        };
        Ok(Self {
            anchor,
            interval_minutes: config.interval_minutes,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes))
    }

    /// First planned run at or after `now` (local wall-clock time).
    pub fn next_run_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let anchor_today = now.date().and_time(self.anchor);
        if now < anchor_today {
            return anchor_today;
        }

        let interval = i64::from(self.interval_minutes);
        let elapsed = (now - anchor_today).num_minutes();
        let to_next = interval - elapsed % interval;
        let next = now + Duration::minutes(to_next);
        let to_mark = Duration::seconds(30 - i64::from(next.second()));
        next.with_nanosecond(0).unwrap_or(next) + to_mark
    }
}

/// Invoke `job` at every planned run until `cancel` fires.
pub async fn run<F>(schedule: Schedule, cancel: CancellationToken, mut job: F)
where
    F: FnMut(),
{
    let mut next = schedule.next_run_after(Local::now().naive_local());

    loop {
        info!(next_run = %next, "next job scheduled");
        let wait = (next - Local::now().naive_local())
            .to_std()
            .unwrap_or_default();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("schedule cancelled");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        info!(at = %Local::now().naive_local(), "job running");
        job();
        next += schedule.interval();
    }
}

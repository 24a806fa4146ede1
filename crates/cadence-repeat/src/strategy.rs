//! Occurrence strategy: when does a repeat definition fire next?

use std::str::FromStr;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;

use crate::error::{RepeatError, Result};
use crate::types::RepeatOptions;

/// Computes the next absolute timestamp at which a repeat definition
/// should fire.
///
/// Implementations must be pure with respect to their inputs: no shared
/// mutable state, callable concurrently from any number of schedulers.
/// `Ok(None)` means the definition has no further occurrence and the chain
/// terminates silently.
pub trait RepeatStrategy: Send + Sync {
    /// Next occurrence strictly derived from `now` (epoch ms) and `opts`.
    fn next_millis(&self, now: i64, opts: &RepeatOptions) -> Result<Option<i64>>;
}

/// Default strategy: fixed-interval grids and cron expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CronIntervalStrategy;

impl RepeatStrategy for CronIntervalStrategy {
    fn next_millis(&self, now: i64, opts: &RepeatOptions) -> Result<Option<i64>> {
        if opts.pattern.is_some() && opts.every.is_some() {
            return Err(RepeatError::ConflictingSchedule);
        }

        if let Some(every) = opts.every {
            if every <= 0 {
                return Err(RepeatError::InvalidEvery(every));
            }
            // Snap to a grid aligned to epoch 0, not to `now` itself, so
            // jitter in `now` never shifts the schedule.
            let slot = now.div_euclid(every) * every;
            return Ok(Some(slot + if opts.immediately { 0 } else { every }));
        }

        let Some(pattern) = opts.pattern.as_deref() else {
            return Ok(None);
        };

        // A start date in the future anchors the iteration; one in the past
        // is ignored.
        let millis = match opts.start_date {
            Some(start) if start > now => start,
            _ => now,
        };
        Ok(cron_next(pattern, opts.tz.as_deref(), millis))
    }
}

/// First cron-computed time strictly after `after_millis`, honoring `tz`.
///
/// A malformed expression, an unknown timezone, and an exhausted schedule
/// all yield `None`. The three cases are deliberately indistinguishable:
/// the engine's policy is to skip rather than abort the caller.
fn cron_next(pattern: &str, tz: Option<&str>, after_millis: i64) -> Option<i64> {
    let schedule = Schedule::from_str(pattern).ok()?;
    let tz: Tz = match tz {
        Some(name) => name.parse().ok()?,
        None => chrono_tz::UTC,
    };
    let after = Utc
        .timestamp_millis_opt(after_millis)
        .single()?
        .with_timezone(&tz);
    schedule.after(&after).next().map(|dt| dt.timestamp_millis())
}

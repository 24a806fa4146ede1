//! `cadence-repeat` — recurring-job scheduling engine.
//!
//! # Overview
//!
//! Given a job definition that repeats on a cron expression or a fixed
//! interval, [`Repeat`] computes the next occurrence, derives a
//! deterministic identifier for it, and materializes the next job
//! instance while keeping a durable registry of all active repeat
//! definitions ordered by next-due time.
//!
//! The engine owns no persistent state. Its two collaborators are trait
//! seams ([`RegistryStore`], [`JobCreator`]); `cadence-store` provides a
//! SQLite-backed implementation of both. Any number of processes may
//! schedule concurrently for the same queue: identical occurrences
//! collapse at the job store because their identifiers are identical.
//!
//! # Silent termination
//!
//! Occurrence limit reached, end date passed, schedule exhausted, and a
//! concurrently removed definition all return `Ok(None)` from
//! [`Repeat::schedule_next`]: normal ends of a finite chain, not errors.

pub mod error;
pub mod key;
pub mod repeat;
pub mod store;
pub mod strategy;
pub mod types;

pub use error::{RepeatError, Result};
pub use key::{key_digest, occurrence_id, RepeatKey};
pub use repeat::Repeat;
pub use store::{JobCreator, RegistryStore};
pub use strategy::{CronIntervalStrategy, RepeatStrategy};
pub use types::{
    Clock, CreatedJob, NextJobRequest, RepeatOptions, RepeatableJob, ScheduleOpts, SystemClock,
};

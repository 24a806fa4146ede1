use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Configuration attached to a job that makes it repeat.
///
/// `pattern` (a cron expression) and `every` (a fixed interval in
/// milliseconds) are mutually exclusive; setting both is a configuration
/// error reported by the strategy, never retried.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatOptions {
    /// Cron expression (seconds-first, 6 or 7 fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Fixed interval in milliseconds, aligned to a grid from epoch 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every: Option<i64>,
    /// Epoch milliseconds before which no occurrence may fire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    /// Epoch milliseconds after which the chain terminates silently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<i64>,
    /// IANA timezone name for cron evaluation (e.g. "Europe/Paris").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
    /// Maximum number of occurrences to produce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Fire the first occurrence without delay. Consumed by the first
    /// occurrence only; subsequent iterations carry `false`.
    #[serde(default)]
    pub immediately: bool,
    /// Caller-supplied disambiguator, part of the repeat key identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Computed delay offset from an immediate first occurrence.
    /// Never caller-supplied; persisted across the chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Number of occurrences produced so far in this chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// Per-call inputs to [`Repeat::schedule_next`](crate::Repeat::schedule_next).
#[derive(Debug, Clone, Default)]
pub struct ScheduleOpts {
    /// The repeat definition.
    pub repeat: RepeatOptions,
    /// Timestamp of the previously scheduled occurrence; 0 on the very
    /// first invocation of a chain.
    pub prev_millis: i64,
    /// Caller disambiguator, merged into the repeat options only when
    /// `prev_millis == 0`.
    pub job_id: Option<String>,
}

/// Everything the job-creation collaborator needs to enqueue one occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextJobRequest {
    /// Job name.
    pub name: String,
    /// Opaque payload forwarded to the job handler.
    pub data: serde_json::Value,
    /// Deterministic occurrence identifier (`repeat:<digest>:<millis>`).
    /// `None` means the collaborator assigns a fresh id.
    pub job_id: Option<String>,
    /// Milliseconds to hold the job before it becomes runnable.
    pub delay: i64,
    /// Creation timestamp (epoch ms).
    pub timestamp: i64,
    /// Due timestamp of this occurrence, fed back as `prev_millis` on the
    /// next scheduling call.
    pub prev_millis: i64,
    /// Back-reference to the registry member, needed for removal-by-key.
    pub repeat_key: String,
    /// Repeat options for the next iteration (count advanced).
    pub repeat: RepeatOptions,
}

/// A job instance handed back by the job-creation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedJob {
    pub id: String,
    pub name: String,
    pub delay: i64,
    pub timestamp: i64,
    pub prev_millis: i64,
    pub repeat_key: String,
    pub repeat: RepeatOptions,
}

/// One decoded registry entry, as returned by enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatableJob {
    /// The raw registry member string.
    pub key: String,
    pub name: String,
    pub id: Option<String>,
    pub end_date: Option<i64>,
    pub tz: Option<String>,
    /// Pattern-or-interval suffix. An `every`-based definition shows up
    /// here as its stringified interval, indistinguishable from a
    /// one-token cron pattern.
    pub pattern: Option<String>,
    /// Next-due timestamp (the registry score).
    pub next: i64,
}

/// Injectable wall clock so schedule arithmetic is testable at fixed instants.
pub trait Clock: Send + Sync {
    /// Current time as epoch milliseconds.
    fn now_millis(&self) -> i64;
}

/// Production clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

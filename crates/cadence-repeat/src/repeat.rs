//! Next-job materializer: turns "next occurrence due" into an enqueued
//! job instance, and removes repeat definitions safely.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::key::{key_digest, occurrence_id, RepeatKey};
use crate::store::{JobCreator, RegistryStore};
use crate::strategy::{CronIntervalStrategy, RepeatStrategy};
use crate::types::{
    Clock, CreatedJob, NextJobRequest, RepeatOptions, RepeatableJob, ScheduleOpts, SystemClock,
};

/// The scheduling engine for one logical queue.
///
/// Owns no persistent state; everything durable lives in the
/// [`RegistryStore`], which is shared across every process running a
/// scheduler for the same queue. Identifier determinism, not locking,
/// is what keeps concurrent schedulers from double-enqueueing an
/// occurrence.
pub struct Repeat {
    registry: Arc<dyn RegistryStore>,
    jobs: Arc<dyn JobCreator>,
    strategy: Arc<dyn RepeatStrategy>,
    clock: Arc<dyn Clock>,
    /// Registry resource name, e.g. `"cadence:{queue}:repeat"`.
    registry_name: String,
}

impl Repeat {
    /// Build an engine with the default cron/interval strategy and the
    /// system clock.
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        jobs: Arc<dyn JobCreator>,
        registry_name: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            jobs,
            strategy: Arc::new(CronIntervalStrategy),
            clock: Arc::new(SystemClock),
            registry_name: registry_name.into(),
        }
    }

    /// Replace the occurrence strategy. The replacement must honor the
    /// [`RepeatStrategy`] contract: pure, concurrently callable.
    pub fn with_strategy(mut self, strategy: Arc<dyn RepeatStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the wall clock (tests schedule at fixed instants).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Compute and enqueue the next occurrence of a repeat chain.
    ///
    /// Returns `Ok(None)` on silent termination: occurrence limit reached,
    /// end date passed, schedule exhausted, or the definition was removed
    /// out of band. `skip_check` bypasses the registry membership check;
    /// the very first scheduling of a definition uses it, before its entry
    /// exists.
    pub async fn schedule_next(
        &self,
        name: &str,
        data: serde_json::Value,
        opts: &ScheduleOpts,
        skip_check: bool,
    ) -> Result<Option<CreatedJob>> {
        let mut repeat = opts.repeat.clone();
        let prev_millis = opts.prev_millis;

        let current_count = repeat.count.unwrap_or(0) + 1;
        if repeat.limit.is_some_and(|limit| current_count > limit) {
            debug!(%name, count = current_count, "occurrence limit reached; chain terminates");
            return Ok(None);
        }

        let mut now = self.clock.now_millis();
        if repeat.end_date.is_some_and(|end| now > end) {
            debug!(%name, "end date passed; chain terminates");
            return Ok(None);
        }

        // Monotonic forward progress even when the scheduler runs late or
        // prev_millis sits in the future due to an offset.
        now = now.max(prev_millis);

        let Some(next_millis) = self.strategy.next_millis(now, &repeat)? else {
            debug!(%name, "schedule exhausted; chain terminates");
            return Ok(None);
        };

        let has_immediately =
            (repeat.every.is_some() || repeat.pattern.is_some()) && repeat.immediately;
        let offset = has_immediately.then(|| now - next_millis);

        // The caller disambiguator becomes part of the key identity, but
        // only the very first invocation of a chain may set it.
        if prev_millis == 0 {
            if let Some(id) = &opts.job_id {
                repeat.job_id = Some(id.clone());
            }
        }

        let key = RepeatKey::from_options(name, &repeat).encode();

        if !skip_check
            && self
                .registry
                .score_of(&self.registry_name, &key)
                .await?
                .is_none()
        {
            // Removed concurrently between occurrences. Best-effort check: a
            // removal racing past this point still produces one extra job.
            debug!(%name, %key, "repeat definition no longer registered; skipping");
            return Ok(None);
        }

        self.create_next_job(
            name,
            data,
            next_millis,
            key,
            repeat,
            offset,
            current_count,
            has_immediately,
        )
        .await
        .map(Some)
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_next_job(
        &self,
        name: &str,
        data: serde_json::Value,
        next_millis: i64,
        key: String,
        repeat: RepeatOptions,
        offset: Option<i64>,
        current_count: u32,
        has_immediately: bool,
    ) -> Result<CreatedJob> {
        let job_id = occurrence_id(
            name,
            Some(next_millis),
            &key_digest(&key),
            repeat.job_id.as_deref(),
        );

        let now = self.clock.now_millis();
        // A freshly computed offset wins on the first occurrence; afterwards
        // the one persisted in the options keeps the whole chain shifted.
        let offset = offset.or(repeat.offset);
        let mut delay = next_millis + offset.unwrap_or(0) - now;
        if delay < 0 || has_immediately {
            delay = 0;
        }

        let mut next_repeat = repeat;
        next_repeat.count = Some(current_count);
        next_repeat.offset = offset;
        // An immediate start fires once; the rest of the chain waits.
        next_repeat.immediately = false;

        // Upsert before job creation so an enumeration never observes a job
        // without a corresponding registry entry.
        self.registry
            .upsert(&self.registry_name, &key, next_millis)
            .await?;

        info!(%name, %job_id, next = next_millis, delay, count = current_count,
              "scheduling next occurrence");

        self.jobs
            .create(NextJobRequest {
                name: name.to_string(),
                data,
                job_id: Some(job_id),
                delay,
                timestamp: now,
                prev_millis: next_millis,
                repeat_key: key,
                repeat: next_repeat,
            })
            .await
    }

    /// Remove a repeat definition given its options, together with any
    /// pending not-yet-fired instance. Returns the affected count (0 or 1).
    pub async fn remove_repeatable(
        &self,
        name: &str,
        repeat: &RepeatOptions,
        job_id: Option<&str>,
    ) -> Result<u64> {
        let mut opts = repeat.clone();
        if let Some(id) = job_id {
            opts.job_id = Some(id.to_string());
        }
        let key = RepeatKey::from_options(name, &opts).encode();
        self.remove(name, &key, opts.job_id.as_deref()).await
    }

    /// Remove a repeat definition given its raw registry key.
    pub async fn remove_repeatable_by_key(&self, key: &str) -> Result<u64> {
        let decoded = RepeatKey::decode(key)?;
        self.remove(&decoded.name, key, decoded.job_id.as_deref())
            .await
    }

    async fn remove(&self, name: &str, key: &str, job_id: Option<&str>) -> Result<u64> {
        // Empty timestamp placeholder: removal targets the registry entry
        // and the pending instance, not one specific past occurrence.
        let identifier = occurrence_id(name, None, &key_digest(key), job_id);
        let removed = self
            .registry
            .atomic_remove(&identifier, &self.registry_name, key)
            .await?;
        info!(%name, %key, removed, "repeat definition removal");
        Ok(removed)
    }

    /// Decoded repeat definitions whose next-due time falls in
    /// `start..=end`, ordered by next-due time.
    ///
    /// Read-only; pass `i64::MAX` as `end` for an unbounded range.
    pub async fn repeatables(
        &self,
        start: i64,
        end: i64,
        ascending: bool,
    ) -> Result<Vec<RepeatableJob>> {
        let rows = self
            .registry
            .range_by_score(&self.registry_name, start, end, ascending)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(member, score)| {
                let decoded = RepeatKey::decode(&member).ok()?;
                Some(RepeatableJob {
                    key: member,
                    name: decoded.name,
                    id: decoded.job_id,
                    end_date: decoded.end_date,
                    tz: decoded.tz,
                    pattern: (!decoded.suffix.is_empty()).then_some(decoded.suffix),
                    next: score,
                })
            })
            .collect())
    }

    /// Number of active repeat definitions. Read-only.
    pub async fn repeatable_count(&self) -> Result<u64> {
        self.registry.cardinality(&self.registry_name).await
    }
}

//! Trait seams for the two external collaborators: the score-ordered
//! registry and the job store that actually enqueues instances.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CreatedJob, NextJobRequest};

/// A durable, shared, score-ordered set of repeat definitions.
///
/// One registry resource is shared by every process scheduling for the
/// same logical queue; a definition is active iff its member is present.
/// Every method is a single bounded request/response to the backing
/// store; nothing here blocks indefinitely.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Score (next-due timestamp) of `member`, or `None` if absent.
    async fn score_of(&self, registry: &str, member: &str) -> Result<Option<i64>>;

    /// Insert `member` or replace its score.
    async fn upsert(&self, registry: &str, member: &str, score: i64) -> Result<()>;

    /// Members with `start <= score <= end`, ordered by score.
    async fn range_by_score(
        &self,
        registry: &str,
        start: i64,
        end: i64,
        ascending: bool,
    ) -> Result<Vec<(String, i64)>>;

    /// Number of members in the registry.
    async fn cardinality(&self, registry: &str) -> Result<u64>;

    /// Atomically remove `member` from the registry AND cancel the pending
    /// not-yet-fired instance whose id is `identifier` (the empty-timestamp
    /// placeholder) followed by the stored score.
    ///
    /// Must be indivisible: a partial application would leave either an
    /// orphaned scheduled job or an orphaned registry entry. Returns the
    /// number of affected entries (0 or 1); removing a missing member is
    /// not an error.
    async fn atomic_remove(&self, identifier: &str, registry: &str, member: &str) -> Result<u64>;
}

/// Enqueues one job instance. Creation must be idempotent on the job id:
/// a second request carrying the same identifier overwrites rather than
/// duplicates, which is what lets concurrent schedulers computing the same
/// occurrence collapse into a single job.
#[async_trait]
pub trait JobCreator: Send + Sync {
    async fn create(&self, req: NextJobRequest) -> Result<CreatedJob>;
}

//! SQLite implementation of the registry and job-creation collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cadence_repeat::{CreatedJob, JobCreator, NextJobRequest, RegistryStore};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::db::init_db;
use crate::error::Result;

/// Shared-connection store backing one logical queue.
///
/// The registry and the job table live in the same database so removal of
/// a repeat definition and cancellation of its pending instance commit as
/// one transaction.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, for tests and ephemeral queues.
    pub fn in_memory() -> Result<Self> {
        Self::open(&StoreConfig::default())
    }

    fn score_of_sync(&self, registry: &str, member: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let score = conn
            .query_row(
                "SELECT score FROM repeat_registry WHERE registry = ?1 AND member = ?2",
                [registry, member],
                |row| row.get(0),
            )
            .optional()?;
        Ok(score)
    }

    fn upsert_sync(&self, registry: &str, member: &str, score: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO repeat_registry (registry, member, score) VALUES (?1, ?2, ?3)
             ON CONFLICT (registry, member) DO UPDATE SET score = excluded.score",
            rusqlite::params![registry, member, score],
        )?;
        debug!(%member, score, "registry upsert");
        Ok(())
    }

    fn range_sync(
        &self,
        registry: &str,
        start: i64,
        end: i64,
        ascending: bool,
    ) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().unwrap();
        let sql = if ascending {
            "SELECT member, score FROM repeat_registry
             WHERE registry = ?1 AND score BETWEEN ?2 AND ?3 ORDER BY score ASC"
        } else {
            "SELECT member, score FROM repeat_registry
             WHERE registry = ?1 AND score BETWEEN ?2 AND ?3 ORDER BY score DESC"
        };
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(rusqlite::params![registry, start, end], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn cardinality_sync(&self, registry: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM repeat_registry WHERE registry = ?1",
            [registry],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Registry-entry deletion and pending-instance cancellation in one
    /// transaction; partial application would leave an orphan on one side.
    fn atomic_remove_sync(&self, identifier: &str, registry: &str, member: &str) -> Result<u64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let score: Option<i64> = tx
            .query_row(
                "SELECT score FROM repeat_registry WHERE registry = ?1 AND member = ?2",
                [registry, member],
                |row| row.get(0),
            )
            .optional()?;

        let affected = match score {
            Some(score) => {
                tx.execute(
                    "DELETE FROM repeat_registry WHERE registry = ?1 AND member = ?2",
                    [registry, member],
                )?;
                // The stored score completes the placeholder identifier into
                // the id of the one not-yet-fired instance.
                let job_id = format!("{identifier}{score}");
                let cancelled = tx.execute(
                    "DELETE FROM jobs WHERE id = ?1 AND state IN ('delayed', 'waiting')",
                    [&job_id],
                )?;
                info!(%member, %job_id, cancelled, "repeat definition removed");
                1
            }
            None => 0,
        };

        tx.commit()?;
        Ok(affected)
    }

    fn create_sync(&self, req: NextJobRequest) -> Result<CreatedJob> {
        let conn = self.conn.lock().unwrap();
        let id = req
            .job_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let data = serde_json::to_string(&req.data)?;
        let repeat = serde_json::to_string(&req.repeat)?;
        let state = if req.delay > 0 { "delayed" } else { "waiting" };

        // Idempotent on id: recomputing the same occurrence overwrites the
        // existing row instead of enqueueing a duplicate.
        conn.execute(
            "INSERT OR REPLACE INTO jobs
             (id, name, data, delay_ms, timestamp_ms, prev_millis, repeat_key, repeat, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                id,
                req.name,
                data,
                req.delay,
                req.timestamp,
                req.prev_millis,
                req.repeat_key,
                repeat,
                state
            ],
        )?;
        info!(job_id = %id, name = %req.name, delay = req.delay, %state, "job created");

        Ok(CreatedJob {
            id,
            name: req.name,
            delay: req.delay,
            timestamp: req.timestamp,
            prev_millis: req.prev_millis,
            repeat_key: req.repeat_key,
            repeat: req.repeat,
        })
    }

    /// Number of rows in `jobs` still waiting to fire. Test/introspection
    /// helper.
    pub fn pending_jobs(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE state IN ('delayed', 'waiting')",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[async_trait]
impl RegistryStore for SqliteStore {
    async fn score_of(
        &self,
        registry: &str,
        member: &str,
    ) -> cadence_repeat::Result<Option<i64>> {
        Ok(self.score_of_sync(registry, member)?)
    }

    async fn upsert(&self, registry: &str, member: &str, score: i64) -> cadence_repeat::Result<()> {
        Ok(self.upsert_sync(registry, member, score)?)
    }

    async fn range_by_score(
        &self,
        registry: &str,
        start: i64,
        end: i64,
        ascending: bool,
    ) -> cadence_repeat::Result<Vec<(String, i64)>> {
        Ok(self.range_sync(registry, start, end, ascending)?)
    }

    async fn cardinality(&self, registry: &str) -> cadence_repeat::Result<u64> {
        Ok(self.cardinality_sync(registry)?)
    }

    async fn atomic_remove(
        &self,
        identifier: &str,
        registry: &str,
        member: &str,
    ) -> cadence_repeat::Result<u64> {
        Ok(self.atomic_remove_sync(identifier, registry, member)?)
    }
}

#[async_trait]
impl JobCreator for SqliteStore {
    async fn create(&self, req: NextJobRequest) -> cadence_repeat::Result<CreatedJob> {
        Ok(self.create_sync(req)?)
    }
}

#[cfg(test)]
mod tests {
    use cadence_repeat::RepeatOptions;

    use super::*;

    const REG: &str = "cadence:test:repeat";

    fn store() -> SqliteStore {
        SqliteStore::in_memory().expect("open in-memory store")
    }

    fn request(id: &str, delay: i64) -> NextJobRequest {
        NextJobRequest {
            name: "report".to_string(),
            data: serde_json::json!({"n": 1}),
            job_id: Some(id.to_string()),
            delay,
            timestamp: 12000,
            prev_millis: 15000,
            repeat_key: "report::::5000".to_string(),
            repeat: RepeatOptions {
                every: Some(5000),
                count: Some(1),
                ..Default::default()
            },
        }
    }

    #[test]
    fn upsert_inserts_then_replaces_score() {
        let store = store();
        store.upsert_sync(REG, "a::::5000", 1000).unwrap();
        store.upsert_sync(REG, "a::::5000", 2000).unwrap();
        assert_eq!(store.score_of_sync(REG, "a::::5000").unwrap(), Some(2000));
        assert_eq!(store.cardinality_sync(REG).unwrap(), 1);
    }

    #[test]
    fn score_of_missing_member_is_none() {
        assert_eq!(store().score_of_sync(REG, "nope").unwrap(), None);
    }

    #[test]
    fn range_orders_are_exact_reverses() {
        let store = store();
        for (member, score) in [("a::::1", 3000), ("b::::1", 1000), ("c::::1", 2000)] {
            store.upsert_sync(REG, member, score).unwrap();
        }
        let asc = store.range_sync(REG, 0, i64::MAX, true).unwrap();
        let mut desc = store.range_sync(REG, 0, i64::MAX, false).unwrap();
        assert_eq!(
            asc.iter().map(|(_, s)| *s).collect::<Vec<_>>(),
            vec![1000, 2000, 3000]
        );
        desc.reverse();
        assert_eq!(asc, desc);
    }

    #[test]
    fn range_respects_score_bounds() {
        let store = store();
        for (member, score) in [("a::::1", 1000), ("b::::1", 2000), ("c::::1", 3000)] {
            store.upsert_sync(REG, member, score).unwrap();
        }
        let rows = store.range_sync(REG, 1500, 2500, true).unwrap();
        assert_eq!(rows, vec![("b::::1".to_string(), 2000)]);
    }

    #[test]
    fn registries_are_isolated() {
        let store = store();
        store.upsert_sync(REG, "a::::1", 1000).unwrap();
        store.upsert_sync("cadence:other:repeat", "a::::1", 1000).unwrap();
        assert_eq!(store.cardinality_sync(REG).unwrap(), 1);
    }

    #[test]
    fn create_assigns_uuid_when_no_id_given() {
        let store = store();
        let mut req = request("x", 0);
        req.job_id = None;
        let job = store.create_sync(req).unwrap();
        assert!(!job.id.is_empty());
        assert_eq!(store.pending_jobs().unwrap(), 1);
    }

    #[test]
    fn create_is_idempotent_on_id() {
        let store = store();
        store.create_sync(request("repeat:abc:15000", 3000)).unwrap();
        store.create_sync(request("repeat:abc:15000", 3000)).unwrap();
        assert_eq!(store.pending_jobs().unwrap(), 1);
    }

    #[test]
    fn atomic_remove_deletes_entry_and_pending_instance() {
        let store = store();
        store.upsert_sync(REG, "report::::5000", 15000).unwrap();
        store.create_sync(request("repeat:abc:15000", 3000)).unwrap();

        let removed = store.atomic_remove_sync("repeat:abc:", REG, "report::::5000").unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.cardinality_sync(REG).unwrap(), 0);
        assert_eq!(store.pending_jobs().unwrap(), 0);
    }

    #[test]
    fn atomic_remove_is_idempotent() {
        let store = store();
        store.upsert_sync(REG, "report::::5000", 15000).unwrap();
        assert_eq!(
            store.atomic_remove_sync("repeat:abc:", REG, "report::::5000").unwrap(),
            1
        );
        assert_eq!(
            store.atomic_remove_sync("repeat:abc:", REG, "report::::5000").unwrap(),
            0
        );
    }

    #[test]
    fn atomic_remove_leaves_unrelated_jobs_alone() {
        let store = store();
        store.upsert_sync(REG, "report::::5000", 15000).unwrap();
        store.create_sync(request("repeat:other:99", 0)).unwrap();

        store.atomic_remove_sync("repeat:abc:", REG, "report::::5000").unwrap();
        assert_eq!(store.pending_jobs().unwrap(), 1);
    }
}

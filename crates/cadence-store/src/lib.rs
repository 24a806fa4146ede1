//! `cadence-store` — SQLite-backed collaborators for the repeat engine.
//!
//! [`SqliteStore`] implements both seams consumed by
//! [`cadence_repeat::Repeat`]: the score-ordered registry of repeat
//! definitions and the job store that enqueues instances. Both live in
//! one database so the removal contract (registry entry + pending
//! instance, indivisibly) is a single transaction.

pub mod config;
pub mod db;
pub mod error;
pub mod store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use store::SqliteStore;

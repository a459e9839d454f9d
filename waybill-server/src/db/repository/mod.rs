//! Repository Module
//!
//! Provides query access to the SurrealDB tables. Writes that must be
//! atomic per entity go through explicit BEGIN/COMMIT query batches.

pub mod order;
pub mod tour;

pub use order::OrderRepository;
pub use tour::TourRepository;

use std::sync::Arc;

use dashmap::DashMap;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transaction rejected: {0}")]
    Transaction(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}

/// Per-entity write serialization.
///
/// Edits and snapshot merges targeting the same entity id must not
/// interleave: each read-merge-write runs under that entity's lock so a
/// merge can never observe stale protection state.
#[derive(Clone, Default)]
pub struct EntityLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one entity id, creating it on first use.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

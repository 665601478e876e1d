//! Storage traits and error types

use crate::model::ProductDocument;
use crate::output::FailureRecord;
use crate::storage::{RunRecord, RunStatus};
use crate::FailureKind;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent store of product documents and step failures
pub trait ProductStore {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Products =====

    /// Inserts or replaces the document for its identity
    ///
    /// # Returns
    ///
    /// `true` when the identity had not been stored before
    fn upsert_product(&mut self, run_id: Option<i64>, doc: &ProductDocument)
        -> StorageResult<bool>;

    fn get_product(&self, identity: &str) -> StorageResult<Option<ProductDocument>>;

    fn count_products(&self) -> StorageResult<u64>;

    fn count_products_by_site(&self) -> StorageResult<HashMap<String, u64>>;

    // ===== Failures =====

    fn record_failure(&mut self, run_id: Option<i64>, failure: &FailureRecord)
        -> StorageResult<()>;

    fn count_failures_by_kind(&self) -> StorageResult<HashMap<FailureKind, u64>>;

    /// Most recent failures, newest first
    fn recent_failures(&self, limit: usize) -> StorageResult<Vec<FailureRecord>>;
}

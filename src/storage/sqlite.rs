//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ProductStore trait.

use crate::model::ProductDocument;
use crate::output::FailureRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ProductStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::FailureKind;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl ProductStore for SqliteStore {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
        )?;

        stmt.query_row(params![run_id], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                config_hash: row.get(3)?,
                status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                    .unwrap_or(RunStatus::Running),
            })
        })
        .map_err(|_| StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let latest: Option<i64> = self
            .conn
            .query_row("SELECT MAX(id) FROM runs", [], |row| row.get(0))
            .optional()?
            .flatten();

        match latest {
            Some(id) => self.get_run(id).map(Some),
            None => Ok(None),
        }
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Products =====

    fn upsert_product(
        &mut self,
        run_id: Option<i64>,
        doc: &ProductDocument,
    ) -> StorageResult<bool> {
        let document =
            serde_json::to_string(doc).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let seen_at = doc.crawled_at.to_rfc3339();
        let ordinal = doc.ordinal.and_then(|o| i64::try_from(o).ok());

        let existed: Option<String> = self
            .conn
            .query_row(
                "SELECT identity FROM products WHERE identity = ?1",
                params![doc.product.identity],
                |row| row.get(0),
            )
            .optional()?;

        self.conn.execute(
            "INSERT INTO products (identity, site, session_id, ordinal, source_url,
                                   schema_version, config_hash, document,
                                   first_seen_at, last_seen_at, last_run)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10)
             ON CONFLICT(identity) DO UPDATE SET
                site = excluded.site,
                session_id = excluded.session_id,
                ordinal = excluded.ordinal,
                source_url = excluded.source_url,
                schema_version = excluded.schema_version,
                config_hash = excluded.config_hash,
                document = excluded.document,
                last_seen_at = excluded.last_seen_at,
                last_run = excluded.last_run",
            params![
                doc.product.identity,
                doc.site,
                doc.session_id,
                ordinal,
                doc.source_url,
                doc.schema_version,
                doc.config_hash,
                document,
                seen_at,
                run_id,
            ],
        )?;

        Ok(existed.is_none())
    }

    fn get_product(&self, identity: &str) -> StorageResult<Option<ProductDocument>> {
        let document: Option<String> = self
            .conn
            .query_row(
                "SELECT document FROM products WHERE identity = ?1",
                params![identity],
                |row| row.get(0),
            )
            .optional()?;

        document
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .transpose()
    }

    fn count_products(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_products_by_site(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT site, COUNT(*) FROM products GROUP BY site")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (site, count) = row?;
            counts.insert(site, count);
        }
        Ok(counts)
    }

    // ===== Failures =====

    fn record_failure(
        &mut self,
        run_id: Option<i64>,
        failure: &FailureRecord,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO failures
                 (run_id, site, session_id, kind, url, parent_url, status, message, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run_id,
                failure.site,
                failure.session_id,
                failure.kind.as_str(),
                failure.url,
                failure.parent_url,
                failure.status,
                failure.message,
                failure.occurred_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn count_failures_by_kind(&self) -> StorageResult<HashMap<FailureKind, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT kind, COUNT(*) FROM failures GROUP BY kind")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (kind, count) = row?;
            if let Some(kind) = FailureKind::from_db_string(&kind) {
                counts.insert(kind, count);
            }
        }
        Ok(counts)
    }

    fn recent_failures(&self, limit: usize) -> StorageResult<Vec<FailureRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT site, session_id, kind, url, parent_url, status, message, occurred_at
             FROM failures ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<u16>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut failures = Vec::new();
        for row in rows {
            let (site, session_id, kind, url, parent_url, status, message, occurred_at) = row?;
            let Some(kind) = FailureKind::from_db_string(&kind) else {
                continue;
            };
            let occurred_at = occurred_at
                .parse::<DateTime<Utc>>()
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            failures.push(FailureRecord {
                site,
                session_id,
                kind,
                url,
                parent_url,
                status,
                message,
                occurred_at,
            });
        }
        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Product, Stock, SCHEMA_VERSION};

    fn document(identity: &str, title: &str) -> ProductDocument {
        ProductDocument {
            schema_version: SCHEMA_VERSION,
            site: "shop".to_string(),
            session_id: "s-1".to_string(),
            ordinal: Some(3),
            group_index: 0,
            source_url: format!("https://shop.example{}", identity),
            crawled_at: Utc::now(),
            config_hash: "abc".to_string(),
            product: Product {
                identity: identity.to_string(),
                title: title.to_string(),
                brand_name: String::new(),
                description: String::new(),
                category: vec![],
                crowd_type: String::new(),
                rating: 0.0,
                review_count: 0,
                stock: Stock::out_of_stock(),
                sku_items: vec![],
                media: vec![],
            },
        }
    }

    fn failure(kind: FailureKind) -> FailureRecord {
        FailureRecord {
            site: "shop".to_string(),
            session_id: "s-1".to_string(),
            kind,
            url: "https://shop.example/api/images/9/030".to_string(),
            parent_url: Some("https://shop.example/p/9".to_string()),
            status: Some(403),
            message: "blocked".to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_run_lifecycle() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        assert!(store.get_latest_run().unwrap().is_none());

        let run_id = store.create_run("hash").unwrap();
        assert_eq!(store.get_run(run_id).unwrap().status, RunStatus::Running);

        store.finish_run(run_id, RunStatus::Completed).unwrap();
        let run = store.get_latest_run().unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
        assert!(matches!(
            store.finish_run(999, RunStatus::Failed),
            Err(StorageError::RunNotFound(999))
        ));
    }

    #[test]
    fn test_upsert_keys_on_identity() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        assert!(store.upsert_product(None, &document("/p/1", "Parka")).unwrap());
        assert!(!store
            .upsert_product(None, &document("/p/1", "Parka II"))
            .unwrap());
        assert!(store.upsert_product(None, &document("/p/2", "Vest")).unwrap());

        assert_eq!(store.count_products().unwrap(), 2);
        let stored = store.get_product("/p/1").unwrap().unwrap();
        assert_eq!(stored.product.title, "Parka II");
        assert_eq!(stored.ordinal, Some(3));
        assert_eq!(store.count_products_by_site().unwrap()["shop"], 2);
    }

    #[test]
    fn test_failures_by_kind() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store
            .record_failure(None, &failure(FailureKind::TransientFetch))
            .unwrap();
        store
            .record_failure(None, &failure(FailureKind::TransientFetch))
            .unwrap();
        store
            .record_failure(None, &failure(FailureKind::Parse))
            .unwrap();

        let counts = store.count_failures_by_kind().unwrap();
        assert_eq!(counts[&FailureKind::TransientFetch], 2);
        assert_eq!(counts[&FailureKind::Parse], 1);

        let recent = store.recent_failures(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, FailureKind::Parse);
        assert_eq!(recent[0].status, Some(403));
        assert_eq!(recent[0].parent_url.as_deref(), Some("https://shop.example/p/9"));
    }
}

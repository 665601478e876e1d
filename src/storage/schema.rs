//! Database schema definitions
//!
//! Products are keyed by their canonical identity, so re-crawling a product
//! updates its row instead of adding one.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Latest document per canonical product identity
CREATE TABLE IF NOT EXISTS products (
    identity TEXT PRIMARY KEY,
    site TEXT NOT NULL,
    session_id TEXT NOT NULL,
    ordinal INTEGER,
    source_url TEXT NOT NULL,
    schema_version INTEGER NOT NULL,
    config_hash TEXT NOT NULL,
    document TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    last_run INTEGER REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS idx_products_site ON products(site);

-- Terminal step failures, by kind
CREATE TABLE IF NOT EXISTS failures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER REFERENCES runs(id),
    site TEXT NOT NULL,
    session_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    url TEXT NOT NULL,
    parent_url TEXT,
    status INTEGER,
    message TEXT NOT NULL,
    occurred_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_failures_kind ON failures(kind);
CREATE INDEX IF NOT EXISTS idx_failures_url ON failures(url);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    add_missing_column(conn, "failures", "parent_url", "TEXT")?;
    Ok(())
}

/// Adds a column that databases created by older builds lack
fn add_missing_column(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(());
        }
    }

    conn.execute_batch(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["runs", "products", "failures"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_old_failures_table_gains_parent_url() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE failures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER,
                site TEXT NOT NULL,
                session_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER,
                message TEXT NOT NULL,
                occurred_at TEXT NOT NULL
            );",
        )
        .unwrap();

        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('failures') WHERE name = 'parent_url'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}

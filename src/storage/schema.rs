//! Database schema definitions
//!
//! This module contains the SQL schema for the SQLite job store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per job; state follows pending -> running -> completed|failed
CREATE TABLE IF NOT EXISTS jobs (
    job_id TEXT PRIMARY KEY,
    target TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    stats_json TEXT,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs(state);
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
    Ok(())
}

//! Versioned schema changes, recorded in `schema_version`.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

/// Ordered schema steps. Versions are contiguous from 1.
const STEPS: &[(u32, &str, &str)] = &[
    (1, "files", include_str!("sql/001_create_files.sql")),
    (2, "payments", include_str!("sql/002_create_payments.sql")),
    (3, "invoices", include_str!("sql/003_create_invoices.sql")),
];

/// Highest applied version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?)
}

/// Applies every step above the current version, each in its own
/// transaction. Returns how many steps ran.
pub fn run_all(conn: &Connection) -> Result<usize, DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );",
    )?;

    let current = schema_version(conn)?;
    let mut applied = 0;

    for &(version, name, sql) in STEPS.iter().filter(|(v, _, _)| *v > current) {
        log::debug!("Applying schema v{} ({})", version, name);

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql).map_err(|e| DatabaseError::Migration {
            version,
            reason: e.to_string(),
        })?;
        tx.execute(
            "INSERT INTO schema_version (version, name) VALUES (?1, ?2)",
            params![version, name],
        )?;
        tx.commit()?;

        applied += 1;
    }

    Ok(applied)
}

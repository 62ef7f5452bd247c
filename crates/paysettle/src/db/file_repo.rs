//! Metadata rows for uploaded CSVs.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::model::FileRecord;

fn from_row(row: &Row<'_>) -> Result<FileRecord, rusqlite::Error> {
    Ok(FileRecord {
        id: row.get("id")?,
        path: row.get("path")?,
        file_type: row.get("file_type")?,
        file_size: row.get("file_size")?,
    })
}

/// Inserts a file metadata row. Ids are client-supplied UUIDs, so a repeat
/// insert of the same id is rejected.
pub fn insert(db: &Database, file: &FileRecord) -> Result<(), DatabaseError> {
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO files (id, path, file_type, file_size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                file.id,
                file.path,
                file.file_type,
                file.file_size,
                created_at
            ],
        )?;
        Ok(())
    })
}

/// Finds a file by its id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM files WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

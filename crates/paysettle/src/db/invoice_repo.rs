//! Invoice repository.
//!
//! Invoices are only ever created together with the payment updates that
//! attach payments to them, so the write paths here run in one transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::payment_repo::{self, format_timestamp};
use super::{Database, DatabaseError};
use crate::model::Invoice;

fn from_row(row: &Row<'_>) -> Result<Invoice, rusqlite::Error> {
    let ids_idx = row.as_ref().column_index("payment_ids")?;
    let raw_ids: String = row.get(ids_idx)?;
    let payment_ids: Vec<i64> = serde_json::from_str(&raw_ids).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            ids_idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })?;

    let created_idx = row.as_ref().column_index("created_at")?;
    let raw_created: String = row.get(created_idx)?;
    let created_at = DateTime::parse_from_rfc3339(&raw_created)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                created_idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

    Ok(Invoice {
        id: row.get("id")?,
        payment_ids,
        created_at,
    })
}

/// Creates an invoice for `payment_ids` and marks those payments processed,
/// atomically. Fails without side effects if any payment is missing.
pub fn settle(
    db: &Database,
    payment_ids: &[i64],
    at: DateTime<Utc>,
) -> Result<Invoice, DatabaseError> {
    let invoice = Invoice {
        id: uuid::Uuid::new_v4().to_string(),
        payment_ids: payment_ids.to_vec(),
        created_at: at,
    };
    let ids_json = serde_json::to_string(&invoice.payment_ids)
        .map_err(|e| DatabaseError::Rejected(e.to_string()))?;

    db.in_transaction(|tx| {
        tx.execute(
            "INSERT INTO invoices (id, payment_ids, created_at) VALUES (?1, ?2, ?3)",
            params![invoice.id, ids_json, format_timestamp(at)],
        )?;
        let updated = payment_repo::mark_invoiced(tx, payment_ids, &invoice.id, at)?;
        if updated != payment_ids.len() {
            return Err(DatabaseError::Rejected(format!(
                "expected to settle {} payments, found {}",
                payment_ids.len(),
                updated
            )));
        }
        Ok(())
    })?;

    Ok(invoice)
}

/// Undoes [`settle`]: detaches the payments and deletes the invoice.
pub fn unsettle(db: &Database, invoice: &Invoice) -> Result<(), DatabaseError> {
    db.in_transaction(|tx| {
        payment_repo::release(tx, &invoice.payment_ids, &invoice.id)?;
        tx.execute("DELETE FROM invoices WHERE id = ?1", params![invoice.id])?;
        Ok(())
    })
}

/// Finds an invoice by its id.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Invoice>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM invoices WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Counts all invoices.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM invoices", [], |r| r.get(0))?;
        Ok(count)
    })
}

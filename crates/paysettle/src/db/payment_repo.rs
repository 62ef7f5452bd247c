//! Reads and writes for the `payments` table.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

use super::{Database, DatabaseError};
use crate::model::{NewPayment, Payment};

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_decimal(row: &Row<'_>, column: &str) -> Result<Decimal, rusqlite::Error> {
    let idx = row.as_ref().column_index(column)?;
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn get_timestamp(row: &Row<'_>, column: &str) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let idx = row.as_ref().column_index(column)?;
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn from_row(row: &Row<'_>) -> Result<Payment, rusqlite::Error> {
    let date_idx = row.as_ref().column_index("payment_date")?;
    let payment_date: String = row.get(date_idx)?;
    let payment_date = NaiveDate::parse_from_str(&payment_date, "%Y-%m-%d")
        .map_err(|e| conversion_error(date_idx, e))?;

    let created_idx = row.as_ref().column_index("created_at")?;
    let created_at = get_timestamp(row, "created_at")?.ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(created_idx, "created_at".into(), Type::Null)
    })?;

    Ok(Payment {
        id: row.get("id")?,
        customer_id: row.get("customer_id")?,
        customer_email: row.get("customer_email")?,
        reference_no: row.get("reference_no")?,
        payment_date,
        currency: row.get("currency")?,
        amount: get_decimal(row, "amount")?,
        exchange_rate: get_decimal(row, "exchange_rate")?,
        usd_amount: get_decimal(row, "usd_amount")?,
        processed: row.get("processed")?,
        invoice_id: row.get("invoice_id")?,
        file_id: row.get("file_id")?,
        processed_at: get_timestamp(row, "processed_at")?,
        created_at,
    })
}

/// Query filter parameters for payment listing.
#[derive(Debug, Default, Clone)]
pub struct PaymentFilter {
    pub customer_email: Option<String>,
    pub file_id: Option<String>,
    pub processed: Option<bool>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new payment row, returning its id.
pub fn insert(
    db: &Database,
    payment: &NewPayment,
    created_at: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO payments (customer_id, customer_email, reference_no, payment_date,
             currency, amount, exchange_rate, usd_amount, processed, file_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10)",
            params![
                payment.customer_id,
                payment.customer_email,
                payment.reference_no,
                payment.payment_date.format("%Y-%m-%d").to_string(),
                payment.currency,
                payment.amount.to_string(),
                payment.exchange_rate.to_string(),
                payment.usd_amount.to_string(),
                payment.file_id,
                format_timestamp(created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Finds a payment by its id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<Payment>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM payments WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// True if a payment with this reference already exists for the file.
pub fn exists_reference(
    db: &Database,
    file_id: &str,
    reference_no: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM payments WHERE file_id = ?1 AND reference_no = ?2",
            params![file_id, reference_no],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Queries payments with filters, returning (rows, total_count).
pub fn query(
    db: &Database,
    filter: &PaymentFilter,
) -> Result<(Vec<Payment>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref email) = filter.customer_email {
            conditions.push(format!("customer_email = ?{}", param_values.len() + 1));
            param_values.push(Box::new(email.clone()));
        }
        if let Some(ref file_id) = filter.file_id {
            conditions.push(format!("file_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(file_id.clone()));
        }
        if let Some(processed) = filter.processed {
            conditions.push(format!("processed = ?{}", param_values.len() + 1));
            param_values.push(Box::new(processed));
        }
        if let Some(from_date) = filter.from_date {
            conditions.push(format!("payment_date >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(from_date.format("%Y-%m-%d").to_string()));
        }
        if let Some(to_date) = filter.to_date {
            conditions.push(format!("payment_date <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(to_date.format("%Y-%m-%d").to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM payments {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM payments {} ORDER BY id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<Payment> = stmt
            .query_map(params_ref.as_slice(), from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Unprocessed payments whose `created_at` falls on `date` (UTC), oldest first.
pub fn unprocessed_created_on(
    db: &Database,
    date: NaiveDate,
) -> Result<Vec<Payment>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM payments
             WHERE processed = 0 AND substr(created_at, 1, 10) = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![date.format("%Y-%m-%d").to_string()], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Flags the given payments as processed and attaches them to an invoice.
pub(crate) fn mark_invoiced(
    conn: &Connection,
    ids: &[i64],
    invoice_id: &str,
    at: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let processed_at = format_timestamp(at);
    let mut stmt = conn.prepare(
        "UPDATE payments SET processed = 1, processed_at = ?2, invoice_id = ?3 WHERE id = ?1",
    )?;
    let mut updated = 0;
    for id in ids {
        updated += stmt.execute(params![id, processed_at, invoice_id])?;
    }
    Ok(updated)
}

/// Reverts [`mark_invoiced`] for payments still attached to `invoice_id`.
pub(crate) fn release(
    conn: &Connection,
    ids: &[i64],
    invoice_id: &str,
) -> Result<usize, DatabaseError> {
    let mut stmt = conn.prepare(
        "UPDATE payments SET processed = 0, processed_at = NULL, invoice_id = NULL
         WHERE id = ?1 AND invoice_id = ?2",
    )?;
    let mut released = 0;
    for id in ids {
        released += stmt.execute(params![id, invoice_id])?;
    }
    Ok(released)
}

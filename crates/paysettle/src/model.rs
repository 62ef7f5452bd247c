//! Persisted records: uploaded files, payments and invoices.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Metadata of an uploaded source CSV. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// UUID assigned at upload time.
    pub id: String,
    /// Storage key of the uploaded bytes (e.g. `payments/<uuid>.csv`).
    pub path: String,
    /// MIME type reported by the client or guessed from the file name.
    pub file_type: String,
    /// Size in bytes.
    pub file_size: i64,
}

/// A payment as stored, including server-assigned fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payment {
    pub id: i64,
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub reference_no: String,
    pub payment_date: NaiveDate,
    pub currency: String,
    pub amount: Decimal,
    pub exchange_rate: Decimal,
    pub usd_amount: Decimal,
    pub processed: bool,
    pub invoice_id: Option<String>,
    pub file_id: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A payment that has not been written yet.
///
/// `usd_amount` is expected to equal `amount * exchange_rate`; both ingestion
/// paths compute it before building this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub reference_no: String,
    pub payment_date: NaiveDate,
    pub currency: String,
    pub amount: Decimal,
    pub exchange_rate: Decimal,
    pub usd_amount: Decimal,
    pub file_id: Option<String>,
}

/// A settlement document covering one customer's batch of payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub id: String,
    /// Payment ids in the order they were listed on the invoice.
    pub payment_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

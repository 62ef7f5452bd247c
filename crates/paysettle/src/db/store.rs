//! Repository seams used by the ingestion pipeline and the invoice job.
//!
//! `Database` is the production implementation; tests substitute fakes
//! that fail on demand.

use chrono::{DateTime, NaiveDate, Utc};

use super::{invoice_repo, payment_repo, Database, DatabaseError};
use crate::model::{Invoice, NewPayment, Payment};

pub trait PaymentStore: Send + Sync {
    /// Writes one payment and returns its id.
    fn insert_payment(
        &self,
        payment: &NewPayment,
        created_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError>;

    /// True if `reference_no` was already stored for `file_id`.
    fn reference_exists(&self, file_id: &str, reference_no: &str) -> Result<bool, DatabaseError>;

    /// Unprocessed payments created on `date`, oldest first.
    fn unprocessed_created_on(&self, date: NaiveDate) -> Result<Vec<Payment>, DatabaseError>;
}

pub trait InvoiceStore: Send + Sync {
    /// Creates the invoice and marks its payments processed in one step.
    fn settle(&self, payment_ids: &[i64], at: DateTime<Utc>) -> Result<Invoice, DatabaseError>;

    /// Reverses a previous [`InvoiceStore::settle`].
    fn unsettle(&self, invoice: &Invoice) -> Result<(), DatabaseError>;
}

impl PaymentStore for Database {
    fn insert_payment(
        &self,
        payment: &NewPayment,
        created_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        payment_repo::insert(self, payment, created_at)
    }

    fn reference_exists(&self, file_id: &str, reference_no: &str) -> Result<bool, DatabaseError> {
        payment_repo::exists_reference(self, file_id, reference_no)
    }

    fn unprocessed_created_on(&self, date: NaiveDate) -> Result<Vec<Payment>, DatabaseError> {
        payment_repo::unprocessed_created_on(self, date)
    }
}

impl InvoiceStore for Database {
    fn settle(&self, payment_ids: &[i64], at: DateTime<Utc>) -> Result<Invoice, DatabaseError> {
        invoice_repo::settle(self, payment_ids, at)
    }

    fn unsettle(&self, invoice: &Invoice) -> Result<(), DatabaseError> {
        invoice_repo::unsettle(self, invoice)
    }
}

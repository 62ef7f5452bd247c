//! Invoice job error types.

use thiserror::Error;

use crate::db::DatabaseError;

/// Failures delivering one invoice email.
#[derive(Error, Debug)]
pub enum MailError {
    /// The relay could not be reached or timed out.
    #[error("Mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The relay answered with a non-2xx status.
    #[error("Mail relay returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Error, Debug)]
pub enum InvoiceError {
    /// Loading the day's unprocessed payments failed. Fatal to the run.
    #[error("Failed to load unprocessed payments: {0}")]
    Load(#[source] DatabaseError),

    #[error("Failed to send invoice: {0}")]
    Mail(#[from] MailError),

    #[error("Failed to settle payments: {0}")]
    Settle(#[source] DatabaseError),

    /// Sending failed after the payments were marked, and unmarking them
    /// failed too. The payments stay settled without an email.
    #[error("Failed to send invoice ({mail}) and to release payments ({release})")]
    Compensation {
        mail: MailError,
        release: DatabaseError,
    },

    #[error("Invoice total for {payments} payments does not fit in a decimal")]
    TotalOutOfRange { payments: usize },

    #[error("Invalid run time '{0}', expected HH:MM")]
    InvalidRunAt(String),
}

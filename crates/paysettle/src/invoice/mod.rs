//! Daily invoice aggregation: group, render, send, settle.

pub mod error;
pub mod job;
pub mod mailer;
pub mod render;
pub mod scheduler;

pub use error::{InvoiceError, MailError};
pub use job::{group_by_email, ConsistencyMode, InvoiceJob, InvoiceRunReport, InvoiceSettings};
pub use mailer::{HttpMailer, InvoiceEmail, LogMailer, Mailer};
pub use render::{invoice_total, render_invoice};
pub use scheduler::{next_run_after, parse_run_at, InvoiceScheduler};

//! Row-level processing: typed records, cleaning, validation.

pub mod cleaner;
pub mod record;
pub mod validator;

pub use cleaner::{clean, parse_amount, parse_timestamp, TIMESTAMP_FORMAT};
pub use record::{Header, RawRow, KNOWN_COLUMNS};
pub use validator::{validate, SkipReason, ValidatedRow, Verdict, ALLOWED_CURRENCIES};

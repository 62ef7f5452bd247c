//! Acceptance rules for cleaned rows.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use super::cleaner::{parse_amount, parse_timestamp};
use super::RawRow;

/// Currencies accepted for ingestion.
pub const ALLOWED_CURRENCIES: [&str; 12] = [
    "USD", "EUR", "AUD", "CAD", "CHF", "INR", "JPY", "CNY", "LKR", "SGD", "GBP", "HKD",
];

const MAX_EMAIL_LEN: usize = 254;
const MAX_LOCAL_PART_LEN: usize = 64;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@([a-z0-9]([a-z0-9-]*[a-z0-9])?\.)+[a-z0-9]([a-z0-9-]*[a-z0-9])?$",
    )
    .unwrap()
});

static REPEATED_DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());

/// Why a row was left out of persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingColumns { expected: usize, found: usize },
    MissingField { field: &'static str },
    InvalidEmail,
    InvalidAmount,
    UnknownCurrency { code: String },
    InvalidDate,
    NoExchangeRate { code: String },
    AmountOutOfRange,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingColumns { .. } => write!(f, "missing columns"),
            SkipReason::MissingField { field } => write!(f, "missing field {}", field),
            SkipReason::InvalidEmail => write!(f, "invalid email"),
            SkipReason::InvalidAmount => write!(f, "invalid amount"),
            SkipReason::UnknownCurrency { code } => write!(f, "unknown currency {}", code),
            SkipReason::InvalidDate => write!(f, "invalid date"),
            SkipReason::NoExchangeRate { code } => write!(f, "no exchange rate for {}", code),
            SkipReason::AmountOutOfRange => write!(f, "amount out of range"),
        }
    }
}

/// A row that passed every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedRow {
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub reference_no: String,
    pub payment_date: NaiveDate,
    pub currency: String,
    pub amount: Decimal,
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(ValidatedRow),
    Skipped(SkipReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }
}

/// Checks a cleaned row. Never touches shared state.
pub fn validate(row: &RawRow) -> Verdict {
    match check(row) {
        Ok(valid) => Verdict::Accepted(valid),
        Err(reason) => Verdict::Skipped(reason),
    }
}

fn check(row: &RawRow) -> Result<ValidatedRow, SkipReason> {
    let email = required(&row.customer_email, "customer_email")?;
    let reference_no = required(&row.reference_no, "reference_no")?;
    let date_time = required(&row.date_time, "date_time")?;
    let currency = required(&row.currency, "currency")?;
    let amount = required(&row.amount, "amount")?;

    let customer_email = accept_email(email).ok_or(SkipReason::InvalidEmail)?;

    let amount = parse_amount(amount).ok_or(SkipReason::MissingField { field: "amount" })?;
    if amount <= Decimal::ZERO {
        return Err(SkipReason::InvalidAmount);
    }

    if !ALLOWED_CURRENCIES.contains(&currency) {
        return Err(SkipReason::UnknownCurrency {
            code: currency.to_string(),
        });
    }

    let payment_date = parse_timestamp(date_time)
        .ok_or(SkipReason::InvalidDate)?
        .date();

    Ok(ValidatedRow {
        customer_id: row.customer_id.clone().filter(|id| !id.is_empty()),
        customer_email,
        reference_no: reference_no.to_string(),
        payment_date,
        currency: currency.to_string(),
        amount,
    })
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, SkipReason> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(SkipReason::MissingField { field })
}

/// Returns the address as accepted, repairing runs of dots once.
fn accept_email(email: &str) -> Option<String> {
    if is_valid_email(email) {
        return Some(email.to_string());
    }
    let repaired = REPEATED_DOTS.replace_all(email, ".");
    if is_valid_email(&repaired) {
        return Some(repaired.into_owned());
    }
    None
}

/// Address syntax check.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN {
        return false;
    }
    match email.rsplit_once('@') {
        Some((local, _)) if local.len() <= MAX_LOCAL_PART_LEN => EMAIL_PATTERN.is_match(email),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::clean;
    use rust_decimal_macros::dec;

    fn cleaned_row() -> RawRow {
        RawRow {
            customer_id: Some("CUS-1".into()),
            customer_email: Some("a@x.com".into()),
            reference_no: Some("R-1".into()),
            date_time: Some("2025-06-01 10:00:00".into()),
            currency: Some("LKR".into()),
            amount: Some("100".into()),
        }
    }

    fn skipped(row: &RawRow) -> SkipReason {
        match validate(row) {
            Verdict::Skipped(reason) => reason,
            Verdict::Accepted(valid) => panic!("expected skip, got {:?}", valid),
        }
    }

    #[test]
    fn test_valid_row_is_accepted() {
        let Verdict::Accepted(valid) = validate(&cleaned_row()) else {
            panic!("row should be accepted");
        };
        assert_eq!(valid.customer_id.as_deref(), Some("CUS-1"));
        assert_eq!(valid.customer_email, "a@x.com");
        assert_eq!(valid.payment_date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(valid.amount, dec!(100));
    }

    #[test]
    fn test_customer_id_is_optional() {
        let row = RawRow {
            customer_id: None,
            ..cleaned_row()
        };
        assert!(validate(&row).is_accepted());
    }

    #[test]
    fn test_every_missing_required_field_is_skipped() {
        let blankers: [(&str, fn(&mut RawRow)); 5] = [
            ("customer_email", |r| r.customer_email = None),
            ("reference_no", |r| r.reference_no = None),
            ("date_time", |r| r.date_time = None),
            ("currency", |r| r.currency = None),
            ("amount", |r| r.amount = None),
        ];
        for (field, blank) in blankers {
            let mut row = cleaned_row();
            blank(&mut row);
            assert_eq!(skipped(&row), SkipReason::MissingField { field });
        }
    }

    #[test]
    fn test_repeated_dots_in_email_are_repaired() {
        let row = RawRow {
            customer_email: Some("john..doe@mail...example.com".into()),
            ..cleaned_row()
        };
        let Verdict::Accepted(valid) = validate(&row) else {
            panic!("repairable email should be accepted");
        };
        assert_eq!(valid.customer_email, "john.doe@mail.example.com");
    }

    #[test]
    fn test_unrepairable_email_is_skipped() {
        for email in ["not-an-email", "a@b", "@x.com", ".a@x.com", "a@-x.com"] {
            let row = RawRow {
                customer_email: Some(email.into()),
                ..cleaned_row()
            };
            assert_eq!(skipped(&row), SkipReason::InvalidEmail, "email {email:?}");
        }
    }

    #[test]
    fn test_non_positive_amount_is_skipped() {
        for amount in ["0", "-5", "0.00"] {
            let row = RawRow {
                amount: Some(amount.into()),
                ..cleaned_row()
            };
            assert_eq!(skipped(&row), SkipReason::InvalidAmount);
        }
    }

    #[test]
    fn test_currency_outside_allow_list_is_skipped() {
        for code in ["XYZ", "BTC", "usd"] {
            let row = RawRow {
                currency: Some(code.into()),
                ..cleaned_row()
            };
            assert_eq!(
                skipped(&row),
                SkipReason::UnknownCurrency { code: code.into() }
            );
        }
    }

    #[test]
    fn test_unparseable_date_is_skipped() {
        let row = RawRow {
            date_time: Some("someday".into()),
            ..cleaned_row()
        };
        assert_eq!(skipped(&row), SkipReason::InvalidDate);
    }

    #[test]
    fn test_clean_then_validate_is_stable() {
        let raw = RawRow {
            customer_id: Some(" cus-1".into()),
            customer_email: Some(" A..B@X.com ".into()),
            reference_no: Some("R-1 ".into()),
            date_time: Some("01/06/2025 10:00:00".into()),
            currency: Some("eur".into()),
            amount: Some("2,500".into()),
        };
        let once = clean(&raw);
        let twice = clean(&once);
        assert_eq!(once, twice);
        assert_eq!(validate(&once), validate(&twice));
        assert!(validate(&once).is_accepted());
    }

    #[test]
    fn test_skip_reason_messages() {
        assert_eq!(
            SkipReason::MissingField { field: "amount" }.to_string(),
            "missing field amount"
        );
        assert_eq!(
            SkipReason::UnknownCurrency { code: "XYZ".into() }.to_string(),
            "unknown currency XYZ"
        );
        assert_eq!(
            SkipReason::MissingColumns { expected: 5, found: 3 }.to_string(),
            "missing columns"
        );
    }
}

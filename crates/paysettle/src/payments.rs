//! Single-record payment entry and paginated listing.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::clock::Clock;
use crate::db::{payment_repo, Database, DatabaseError, PaymentFilter};
use crate::model::{NewPayment, Payment};
use crate::row::validator::is_valid_email;
use crate::row::{parse_amount, parse_timestamp};
use crate::sanitize::redact_email;

/// Default page size for [`PaymentService::list`].
pub const DEFAULT_PER_PAGE: u32 = 15;
const MAX_PER_PAGE: u32 = 100;

/// Largest accepted gap between `usd_amount` and `amount * exchange_rate`.
const USD_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid payment: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("Failed to save payment: {0}")]
    Database(#[from] DatabaseError),
}

/// Loosely-typed request body for one payment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPaymentRequest {
    pub customer_id: String,
    pub customer_email: String,
    pub reference_no: String,
    pub payment_date: String,
    pub currency: String,
    pub amount: String,
    pub exchange_rate: String,
    pub usd_amount: String,
    #[serde(default)]
    pub file_id: Option<String>,
}

impl NewPaymentRequest {
    /// Checks every field and reports all problems at once.
    pub fn validate(&self) -> Result<NewPayment, PaymentError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("customer_id", &self.customer_id),
            ("customer_email", &self.customer_email),
            ("reference_no", &self.reference_no),
            ("payment_date", &self.payment_date),
            ("currency", &self.currency),
            ("amount", &self.amount),
            ("exchange_rate", &self.exchange_rate),
            ("usd_amount", &self.usd_amount),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("The {} field is required.", field));
            }
        }
        if !errors.is_empty() {
            return Err(PaymentError::Validation { errors });
        }

        let email = self.customer_email.trim().to_lowercase();
        if !is_valid_email(&email) {
            errors.push("The customer_email field must be a valid email address.".to_string());
        }

        let payment_date = parse_timestamp(self.payment_date.trim()).map(|dt| dt.date());
        if payment_date.is_none() {
            errors.push("The payment_date field must be a valid date.".to_string());
        }

        let currency = self.currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push("The currency field must be a 3-letter code.".to_string());
        }

        let numeric = |field: &str, value: &str, errors: &mut Vec<String>| {
            let parsed = parse_amount(value.trim());
            if parsed.is_none() {
                errors.push(format!("The {} field must be a number.", field));
            }
            parsed
        };
        let amount = numeric("amount", &self.amount, &mut errors);
        let exchange_rate = numeric("exchange_rate", &self.exchange_rate, &mut errors);
        let usd_amount = numeric("usd_amount", &self.usd_amount, &mut errors);

        if let (Some(amount), Some(rate), Some(usd)) = (amount, exchange_rate, usd_amount) {
            let gap = amount
                .checked_mul(rate)
                .and_then(|converted| converted.checked_sub(usd))
                .map(|gap| gap.abs());
            match gap {
                None => errors.push("The amount field is out of range.".to_string()),
                Some(gap) if gap > USD_TOLERANCE => errors.push(
                    "The usd_amount field must equal amount * exchange_rate.".to_string(),
                ),
                Some(_) => {}
            }
        }

        let file_id = match self.file_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match uuid::Uuid::parse_str(raw) {
                Ok(id) => Some(id.to_string()),
                Err(_) => {
                    errors.push("The file_id field must be a valid UUID.".to_string());
                    None
                }
            },
        };

        match (payment_date, amount, exchange_rate, usd_amount) {
            (Some(payment_date), Some(amount), Some(exchange_rate), Some(usd_amount))
                if errors.is_empty() =>
            {
                Ok(NewPayment {
                    customer_id: Some(self.customer_id.trim().to_uppercase()),
                    customer_email: email,
                    reference_no: self.reference_no.trim().to_string(),
                    payment_date,
                    currency,
                    amount,
                    exchange_rate,
                    usd_amount,
                    file_id,
                })
            }
            _ => Err(PaymentError::Validation { errors }),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
}

pub struct PaymentService {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Validates and stores a single payment.
    pub fn record(&self, request: &NewPaymentRequest) -> Result<Payment, PaymentError> {
        let payment = request.validate()?;
        let id = payment_repo::insert(&self.db, &payment, self.clock.now())?;
        info!(
            id,
            reference = %payment.reference_no,
            customer = %redact_email(&payment.customer_email),
            "Payment recorded"
        );

        payment_repo::find_by_id(&self.db, id)?.ok_or_else(|| {
            PaymentError::Database(DatabaseError::Rejected(format!(
                "payment {} vanished after insert",
                id
            )))
        })
    }

    /// Newest payments first. `page` is 1-based.
    pub fn list(&self, page: u32, per_page: Option<u32>) -> Result<Page<Payment>, PaymentError> {
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let page = page.max(1);

        let filter = PaymentFilter {
            limit: Some(per_page as u64),
            offset: Some(u64::from(page - 1) * u64::from(per_page)),
            ..PaymentFilter::default()
        };
        let (data, total) = payment_repo::query(&self.db, &filter)?;
        let last_page = total.div_ceil(u64::from(per_page)).max(1) as u32;

        Ok(Page {
            data,
            current_page: page,
            per_page,
            total,
            last_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use rust_decimal_macros::dec;

    fn request() -> NewPaymentRequest {
        NewPaymentRequest {
            customer_id: "cus-1".into(),
            customer_email: "Jane@Example.com".into(),
            reference_no: "INV-7".into(),
            payment_date: "2025-06-01".into(),
            currency: "lkr".into(),
            amount: "100".into(),
            exchange_rate: "300".into(),
            usd_amount: "30000".into(),
            file_id: None,
        }
    }

    fn service() -> PaymentService {
        PaymentService::new(Database::open_in_memory().unwrap(), Arc::new(SystemClock))
    }

    #[test]
    fn test_record_normalizes_and_stores() {
        let payment = service().record(&request()).unwrap();

        assert_eq!(payment.customer_id.as_deref(), Some("CUS-1"));
        assert_eq!(payment.customer_email, "jane@example.com");
        assert_eq!(payment.currency, "LKR");
        assert_eq!(payment.usd_amount, dec!(30000));
        assert!(!payment.processed);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let req = NewPaymentRequest {
            customer_email: String::new(),
            amount: "  ".into(),
            ..request()
        };
        let Err(PaymentError::Validation { errors }) = req.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("customer_email"));
        assert!(errors[1].contains("amount"));
    }

    #[test]
    fn test_inconsistent_usd_amount_is_rejected() {
        let req = NewPaymentRequest {
            usd_amount: "29000".into(),
            ..request()
        };
        assert!(matches!(req.validate(), Err(PaymentError::Validation { .. })));

        let rounded = NewPaymentRequest {
            amount: "1.005".into(),
            exchange_rate: "3".into(),
            usd_amount: "3.02".into(),
            ..request()
        };
        assert!(rounded.validate().is_ok());
    }

    #[test]
    fn test_unconvertible_amount_is_a_validation_error() {
        let req = NewPaymentRequest {
            amount: "79228162514264337593543950335".into(),
            exchange_rate: "300".into(),
            ..request()
        };
        let Err(PaymentError::Validation { errors }) = req.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(errors, vec!["The amount field is out of range."]);
    }

    #[test]
    fn test_file_id_must_be_uuid() {
        let bad = NewPaymentRequest {
            file_id: Some("not-a-uuid".into()),
            ..request()
        };
        assert!(bad.validate().is_err());

        let good = NewPaymentRequest {
            file_id: Some("67e55044-10b1-426f-9247-bb680e5fe0c8".into()),
            ..request()
        };
        assert_eq!(
            good.validate().unwrap().file_id.as_deref(),
            Some("67e55044-10b1-426f-9247-bb680e5fe0c8")
        );
    }

    #[test]
    fn test_list_paginates_newest_first() {
        let service = service();
        for n in 1..=20 {
            let req = NewPaymentRequest {
                reference_no: format!("R{n}"),
                ..request()
            };
            service.record(&req).unwrap();
        }

        let first = service.list(1, None).unwrap();
        assert_eq!(first.per_page, DEFAULT_PER_PAGE);
        assert_eq!(first.data.len(), 15);
        assert_eq!(first.total, 20);
        assert_eq!(first.last_page, 2);
        assert_eq!(first.data[0].reference_no, "R20");

        let second = service.list(2, None).unwrap();
        assert_eq!(second.data.len(), 5);
        assert_eq!(second.data[4].reference_no, "R1");
    }
}

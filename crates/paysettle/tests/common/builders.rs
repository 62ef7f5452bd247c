//! Builders for CSV payloads and rate tables.

#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;

use paysettle::rates::RateTable;

pub const DEFAULT_HEADER: &[&str] = &[
    "customer_id",
    "customer_email",
    "reference_no",
    "date_time",
    "currency",
    "amount",
];

/// Builds CSV text row by row.
pub struct CsvBuilder {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    line_ending: &'static str,
}

impl CsvBuilder {
    /// Starts with the full default header.
    pub fn new() -> Self {
        Self::with_header(DEFAULT_HEADER)
    }

    pub fn with_header(columns: &[&str]) -> Self {
        Self {
            header: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            line_ending: "\n",
        }
    }

    /// Uses `\r\n` between lines.
    pub fn crlf(mut self) -> Self {
        self.line_ending = "\r\n";
        self
    }

    /// Adds a raw row; fields are written as given.
    pub fn row(mut self, fields: &[&str]) -> Self {
        self.rows.push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Adds a well-formed payment row for the default header.
    pub fn payment(self, email: &str, reference: &str, currency: &str, amount: &str) -> Self {
        self.row(&["CUS-1", email, reference, "2025-06-01 10:00:00", currency, amount])
    }

    pub fn build(&self) -> String {
        let mut out = self.header.join(",");
        out.push_str(self.line_ending);
        for row in &self.rows {
            out.push_str(&row.join(","));
            out.push_str(self.line_ending);
        }
        out
    }
}

impl Default for CsvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn rate_table(pairs: &[(&str, Decimal)]) -> RateTable {
    RateTable {
        base_code: "USD".to_string(),
        conversion_rates: pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
        fetched_at: Utc::now(),
    }
}

/// USD 1, LKR 300, EUR 0.5.
pub fn standard_rates() -> RateTable {
    rate_table(&[
        ("USD", Decimal::ONE),
        ("LKR", Decimal::new(300, 0)),
        ("EUR", Decimal::new(5, 1)),
    ])
}

//! Typed CSV rows.
//!
//! Field names are resolved against the header once per file; every data
//! line then becomes a [`RawRow`] with an optional value per known column.

use csv::StringRecord;
use serde::Serialize;

/// Column names recognized in an upload header. Others are ignored.
pub const KNOWN_COLUMNS: [&str; 6] = [
    "customer_id",
    "customer_email",
    "reference_no",
    "date_time",
    "currency",
    "amount",
];

/// One data line, keyed by the known columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawRow {
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub reference_no: Option<String>,
    pub date_time: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<String>,
}

/// Column positions taken from the header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    width: usize,
    positions: [Option<usize>; KNOWN_COLUMNS.len()],
}

impl Header {
    /// Builds a header from already-split field names. Names are trimmed;
    /// the first occurrence of a repeated name wins.
    pub fn from_record(record: &StringRecord) -> Self {
        let mut positions = [None; KNOWN_COLUMNS.len()];
        for (idx, name) in record.iter().enumerate() {
            let name = name.trim();
            if let Some(slot) = KNOWN_COLUMNS.iter().position(|known| *known == name) {
                if positions[slot].is_none() {
                    positions[slot] = Some(idx);
                }
            }
        }
        Self {
            width: record.len(),
            positions,
        }
    }

    /// Number of fields in the header line.
    pub fn width(&self) -> usize {
        self.width
    }

    /// True if the header names `column`.
    pub fn has(&self, column: &str) -> bool {
        KNOWN_COLUMNS
            .iter()
            .position(|known| *known == column)
            .and_then(|slot| self.positions[slot])
            .is_some()
    }

    /// Maps a data record onto the header.
    pub fn row(&self, record: &StringRecord) -> RawRow {
        let field = |slot: usize| -> Option<String> {
            self.positions[slot]
                .and_then(|idx| record.get(idx))
                .map(str::to_string)
        };
        RawRow {
            customer_id: field(0),
            customer_email: field(1),
            reference_no: field(2),
            date_time: field(3),
            currency: field(4),
            amount: field(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_maps_known_columns_in_any_order() {
        let header = Header::from_record(&StringRecord::from(vec![
            " amount", "note", "customer_email ", "currency",
        ]));
        assert_eq!(header.width(), 4);
        assert!(header.has("amount"));
        assert!(!header.has("reference_no"));

        let row = header.row(&StringRecord::from(vec!["10", "hi", "a@x.com", "USD"]));
        assert_eq!(row.amount.as_deref(), Some("10"));
        assert_eq!(row.customer_email.as_deref(), Some("a@x.com"));
        assert_eq!(row.currency.as_deref(), Some("USD"));
        assert_eq!(row.reference_no, None);
    }

    #[test]
    fn test_repeated_column_uses_first_occurrence() {
        let header = Header::from_record(&StringRecord::from(vec!["amount", "amount"]));
        let row = header.row(&StringRecord::from(vec!["1", "2"]));
        assert_eq!(row.amount.as_deref(), Some("1"));
    }
}

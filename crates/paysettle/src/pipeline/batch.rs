//! Writes enriched rows in fixed-size batches.
//!
//! A batch is a throughput unit, not a transaction: each row is written on
//! its own, so one rejected row does not stop the rest of its batch. Only a
//! storage outage aborts.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::db::PaymentStore;
use crate::model::NewPayment;
use crate::row::ValidatedRow;
use crate::sanitize::redact_email;

use super::error::{PipelineError, PipelineWarning};

/// A validated row with its conversion attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRow {
    pub row: ValidatedRow,
    pub exchange_rate: Decimal,
    pub usd_amount: Decimal,
    pub file_id: String,
}

impl EnrichedRow {
    /// Converts `row` at `rate` USD per unit of its currency. `None` when
    /// the product does not fit in a `Decimal`.
    pub fn enrich(row: ValidatedRow, rate: Decimal, file_id: &str) -> Option<Self> {
        let usd_amount = rate.checked_mul(row.amount)?;
        Some(Self {
            row,
            exchange_rate: rate,
            usd_amount,
            file_id: file_id.to_string(),
        })
    }

    fn to_new_payment(&self) -> NewPayment {
        NewPayment {
            customer_id: self.row.customer_id.clone(),
            customer_email: self.row.customer_email.clone(),
            reference_no: self.row.reference_no.clone(),
            payment_date: self.row.payment_date,
            currency: self.row.currency.clone(),
            amount: self.row.amount,
            exchange_rate: self.exchange_rate,
            usd_amount: self.usd_amount,
            file_id: Some(self.file_id.clone()),
        }
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batch_number: u32,
    pub size: usize,
    pub written: usize,
    /// Reference numbers in batch order, for audit logging.
    pub references: Vec<String>,
    pub warnings: Vec<PipelineWarning>,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, PipelineWarning::RowNotPersisted { .. }))
            .count()
    }

    pub fn duplicates(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, PipelineWarning::DuplicateReference { .. }))
            .count()
    }
}

pub struct BatchPersister {
    store: Arc<dyn PaymentStore>,
    clock: Arc<dyn Clock>,
    deduplicate: bool,
}

impl BatchPersister {
    pub fn new(store: Arc<dyn PaymentStore>, clock: Arc<dyn Clock>, deduplicate: bool) -> Self {
        Self {
            store,
            clock,
            deduplicate,
        }
    }

    pub fn persist(
        &self,
        batch: &[EnrichedRow],
        batch_number: u32,
    ) -> Result<BatchOutcome, PipelineError> {
        let mut outcome = BatchOutcome {
            batch_number,
            size: batch.len(),
            ..BatchOutcome::default()
        };

        for enriched in batch {
            let reference_no = &enriched.row.reference_no;
            outcome.references.push(reference_no.clone());

            if self.deduplicate {
                let exists = self
                    .store
                    .reference_exists(&enriched.file_id, reference_no)
                    .map_err(|e| self.classify(e, batch_number, reference_no, &mut outcome));
                match exists {
                    Ok(true) => {
                        debug!(reference = %reference_no, "Reference already stored for file");
                        outcome.warnings.push(PipelineWarning::DuplicateReference {
                            reference_no: reference_no.clone(),
                        });
                        continue;
                    }
                    Ok(false) => {}
                    Err(Some(fatal)) => return Err(fatal),
                    Err(None) => continue,
                }
            }

            match self
                .store
                .insert_payment(&enriched.to_new_payment(), self.clock.now())
            {
                Ok(id) => {
                    outcome.written += 1;
                    debug!(
                        id,
                        reference = %reference_no,
                        customer = %redact_email(&enriched.row.customer_email),
                        "Payment saved"
                    );
                }
                Err(e) => {
                    if let Some(fatal) = self.classify(e, batch_number, reference_no, &mut outcome)
                    {
                        return Err(fatal);
                    }
                }
            }
        }

        info!(
            batch = batch_number,
            size = outcome.size,
            written = outcome.written,
            references = ?outcome.references,
            "Batch persisted"
        );
        Ok(outcome)
    }

    /// Records a row-level failure on `outcome`, or returns the fatal error.
    fn classify(
        &self,
        err: crate::db::DatabaseError,
        batch_number: u32,
        reference_no: &str,
        outcome: &mut BatchOutcome,
    ) -> Option<PipelineError> {
        if err.is_row_level() {
            warn!(
                batch = batch_number,
                reference = %reference_no,
                error = %err,
                "Failed to persist payment row"
            );
            outcome.warnings.push(PipelineWarning::RowNotPersisted {
                reference_no: reference_no.to_string(),
                error: err.to_string(),
            });
            None
        } else {
            Some(PipelineError::StorageOutage {
                batch: batch_number,
                source: err,
            })
        }
    }
}

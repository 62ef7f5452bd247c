//! Daily per-customer invoice run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn, Instrument};

use super::error::InvoiceError;
use super::mailer::{InvoiceEmail, Mailer};
use super::render::render_invoice;
use crate::clock::Clock;
use crate::config::Config;
use crate::db::{InvoiceStore, PaymentStore};
use crate::model::{Invoice, Payment};
use crate::sanitize::redact_email;

/// Ordering of the email send and the processed-mark within one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Send, then settle. A crash in between resends the invoice next run.
    #[default]
    SendThenMark,
    /// Settle, then send; a failed send releases the payments again.
    /// A crash in between means the invoice is never sent.
    MarkThenSend,
}

#[derive(Debug, Clone)]
pub struct InvoiceSettings {
    pub subject: String,
    pub company_name: String,
    pub from: String,
    pub consistency: ConsistencyMode,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        Self {
            subject: "Your Daily Invoice".to_string(),
            company_name: "IPOSG".to_string(),
            from: "billing@localhost".to_string(),
            consistency: ConsistencyMode::default(),
        }
    }
}

impl InvoiceSettings {
    pub fn from_config(config: &Config) -> Self {
        let invoice = &config.invoice;
        Self {
            subject: invoice.subject.clone(),
            company_name: invoice.company_name.clone(),
            from: invoice.from.clone(),
            consistency: invoice.consistency,
        }
    }
}

/// Outcome of one invoice run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvoiceRunReport {
    pub customers_invoiced: usize,
    pub payments_settled: usize,
    /// `(customer email, error)` for every group that was not invoiced.
    pub failures: Vec<(String, String)>,
}

/// Groups payments by customer email exactly as stored, keeping first-seen
/// order for groups and input order within each group.
pub fn group_by_email(payments: Vec<Payment>) -> Vec<(String, Vec<Payment>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<Payment>)> = Vec::new();

    for payment in payments {
        match index.get(&payment.customer_email) {
            Some(&i) => groups[i].1.push(payment),
            None => {
                index.insert(payment.customer_email.clone(), groups.len());
                groups.push((payment.customer_email.clone(), vec![payment]));
            }
        }
    }

    groups
}

pub struct InvoiceJob {
    payments: Arc<dyn PaymentStore>,
    invoices: Arc<dyn InvoiceStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    settings: InvoiceSettings,
}

impl InvoiceJob {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        invoices: Arc<dyn InvoiceStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        settings: InvoiceSettings,
    ) -> Self {
        Self {
            payments,
            invoices,
            mailer,
            clock,
            settings,
        }
    }

    /// Invoices today's unprocessed payments (UTC date of the clock).
    pub async fn run(&self) -> Result<InvoiceRunReport, InvoiceError> {
        self.run_for(self.clock.now().date_naive()).await
    }

    /// Invoices the unprocessed payments created on `date`.
    ///
    /// Only loading the payments can fail the whole run. A failing customer
    /// group is logged and recorded in the report; the other groups still run.
    pub async fn run_for(&self, date: NaiveDate) -> Result<InvoiceRunReport, InvoiceError> {
        let span = info_span!("invoice_run", %date, mode = ?self.settings.consistency);

        async {
            let payments = self
                .payments
                .unprocessed_created_on(date)
                .map_err(InvoiceError::Load)?;
            let groups = group_by_email(payments);
            info!(groups = groups.len(), "Unprocessed payments loaded");

            let mut report = InvoiceRunReport::default();
            for (email, group) in groups {
                let customer = redact_email(&email);
                match self
                    .invoice_group(&email, &group, date)
                    .instrument(info_span!("invoice_group", %customer, payments = group.len()))
                    .await
                {
                    Ok(invoice) => {
                        info!(%customer, invoice_id = %invoice.id, "Invoice sent");
                        report.customers_invoiced += 1;
                        report.payments_settled += invoice.payment_ids.len();
                    }
                    Err(e) => {
                        error!(%customer, error = %e, "Invoice failed");
                        report.failures.push((email, e.to_string()));
                    }
                }
            }

            info!(
                customers = report.customers_invoiced,
                payments = report.payments_settled,
                failures = report.failures.len(),
                "Invoices sent to {} customers.",
                report.customers_invoiced
            );
            Ok::<_, InvoiceError>(report)
        }
        .instrument(span)
        .await
    }

    async fn invoice_group(
        &self,
        email: &str,
        payments: &[Payment],
        as_of: NaiveDate,
    ) -> Result<Invoice, InvoiceError> {
        let message = InvoiceEmail {
            from: self.settings.from.clone(),
            to: email.to_string(),
            subject: self.settings.subject.clone(),
            html: render_invoice(email, payments, as_of, &self.settings.company_name)?,
        };
        let ids: Vec<i64> = payments.iter().map(|p| p.id).collect();

        match self.settings.consistency {
            ConsistencyMode::SendThenMark => {
                self.mailer.send(&message).await?;
                self.invoices
                    .settle(&ids, self.clock.now())
                    .map_err(InvoiceError::Settle)
            }
            ConsistencyMode::MarkThenSend => {
                let invoice = self
                    .invoices
                    .settle(&ids, self.clock.now())
                    .map_err(InvoiceError::Settle)?;

                if let Err(mail) = self.mailer.send(&message).await {
                    warn!(invoice_id = %invoice.id, "Send failed, releasing payments");
                    return match self.invoices.unsettle(&invoice) {
                        Ok(()) => Err(InvoiceError::Mail(mail)),
                        Err(release) => Err(InvoiceError::Compensation { mail, release }),
                    };
                }
                Ok(invoice)
            }
        }
    }
}

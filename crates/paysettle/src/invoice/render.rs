//! HTML body of the daily invoice email.

use std::fmt::Write;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::model::Payment;

use super::error::InvoiceError;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sum of the USD amounts, rounded to cents. `None` on overflow.
pub fn invoice_total(payments: &[Payment]) -> Option<Decimal> {
    payments
        .iter()
        .try_fold(Decimal::ZERO, |total, p| total.checked_add(p.usd_amount))
        .map(|total| total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Renders one customer's invoice.
///
/// Payments are listed in the order given. Every interpolated value is
/// HTML-escaped.
pub fn render_invoice(
    customer_email: &str,
    payments: &[Payment],
    as_of: NaiveDate,
    company: &str,
) -> Result<String, InvoiceError> {
    let total = invoice_total(payments).ok_or(InvoiceError::TotalOutOfRange {
        payments: payments.len(),
    })?;
    let company = escape(company);
    let mut html = String::new();

    // write! into a String cannot fail
    let _ = write!(
        html,
        "<p>\n    Dear Valued Customer,<br><br>\n    \
         Please find below the summary of payments received for {company} as of {as_of}.<br>\n    \
         The table includes the payment date, reference number, original amount, and the equivalent amount in USD.<br><br>\n    \
         If you have any questions or require further details regarding any of the transactions listed,<br>\n    \
         please do not hesitate to contact us.<br><br>\n    \
         Thank you for your continued partnership.<br><br>\n    \
         Best regards,<br>\n    Support Team,<br>\n    {company}\n</p>\n\n",
        company = company,
        as_of = as_of.format("%Y-%m-%d"),
    );

    let _ = write!(
        html,
        "<table border=\"1\" cellpadding=\"8\" cellspacing=\"0\" width=\"100%\" data-customer=\"{}\">\n",
        escape(customer_email)
    );
    html.push_str(
        "    <thead>\n    <tr>\n        <th>Payment Date</th>\n        <th>Reference</th>\n        \
         <th>Amount (Original)</th>\n        <th>Amount (USD)</th>\n    </tr>\n    </thead>\n    <tbody>\n",
    );

    for payment in payments {
        let _ = write!(
            html,
            "    <tr>\n        <td>{}</td>\n        <td>{}</td>\n        <td>{} {}</td>\n        <td>USD {}</td>\n    </tr>\n",
            payment.payment_date.format("%Y-%m-%d"),
            escape(&payment.reference_no),
            escape(&payment.currency),
            payment.amount,
            payment.usd_amount,
        );
    }

    let _ = write!(
        html,
        "    </tbody>\n    <tfoot>\n    <tr>\n        <td colspan=\"3\"><strong>Total</strong></td>\n        \
         <td><strong>USD {:.2}</strong></td>\n    </tr>\n    </tfoot>\n</table>\n",
        total
    );

    Ok(html)
}

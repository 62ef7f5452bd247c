//! Helpers for sanitizing data before it enters log fields and span attributes.
//!
//! Ingestion logs are shipped to shared sinks, so customer emails, API keys
//! and full storage paths are masked before being recorded.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks every occurrence of `secret` inside `url`.
///
/// The exchange-rate provider carries its API key as a path segment, so the
/// request URL must never be logged verbatim.
pub fn redact_secret_in_url(url: &str, secret: &str) -> String {
    if secret.is_empty() {
        return url.to_string();
    }
    url.replace(secret, "****")
}

/// Keeps the first character of the local part and the full domain.
///
/// - `john.doe@example.com` -> `j***@example.com`
/// - `not-an-email` -> `***`
pub fn redact_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        _ => "***".to_string(),
    }
}

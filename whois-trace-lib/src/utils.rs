//! Utility functions for domain processing and validation.
//!
//! This module contains helper functions for domain name normalization,
//! suffix enumeration and hostname checks used throughout the library.

use crate::error::WhoisTraceError;
use regex::Regex;

lazy_static::lazy_static! {
    // One DNS label: alphanumeric at both ends, hyphens allowed inside.
    static ref HOSTNAME_RE: Regex = Regex::new(
        r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)+$"
    )
    .expect("hostname pattern is valid");
}

/// Normalize and validate a domain name.
///
/// The input is trimmed and lowercased, and a single trailing root dot is
/// dropped. The result must contain at least one `.` with a non-empty label
/// on each side of every separator.
///
/// # Arguments
///
/// * `domain` - The domain name as typed by the user
///
/// # Returns
///
/// The normalized domain, or `WhoisTraceError::InvalidDomain`.
pub fn normalize_domain(domain: &str) -> Result<String, WhoisTraceError> {
    let trimmed = domain.trim();
    let lowered = trimmed.to_lowercase();
    let normalized = lowered.strip_suffix('.').unwrap_or(&lowered);

    if normalized.is_empty() {
        return Err(WhoisTraceError::invalid_domain(
            trimmed,
            "Domain name cannot be empty",
        ));
    }

    if normalized.len() > 253 {
        return Err(WhoisTraceError::invalid_domain(
            trimmed,
            "Domain name longer than 253 characters",
        ));
    }

    if !normalized.contains('.') {
        return Err(WhoisTraceError::invalid_domain(
            trimmed,
            "missing '.' separator",
        ));
    }

    for label in normalized.split('.') {
        if label.is_empty() {
            return Err(WhoisTraceError::invalid_domain(trimmed, "empty label"));
        }
        if label.len() > 63 {
            return Err(WhoisTraceError::invalid_domain(
                trimmed,
                format!("label '{}' longer than 63 characters", label),
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(WhoisTraceError::invalid_domain(
                trimmed,
                format!("label '{}' starts or ends with '-'", label),
            ));
        }
        // Unicode letters are allowed so IDNs typed natively pass through
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return Err(WhoisTraceError::invalid_domain(
                trimmed,
                format!("label '{}' contains invalid characters", label),
            ));
        }
    }

    Ok(normalized.to_string())
}

/// Extract the top-level label from a normalized domain.
///
/// ```rust
/// use whois_trace_lib::extract_tld;
///
/// assert_eq!(extract_tld("example.co.uk"), Some("uk"));
/// assert_eq!(extract_tld("localhost"), None);
/// ```
pub fn extract_tld(domain: &str) -> Option<&str> {
    let (rest, tld) = domain.rsplit_once('.')?;
    if rest.is_empty() || tld.is_empty() {
        None
    } else {
        Some(tld)
    }
}

/// Every label-boundary suffix of a domain, longest first.
///
/// `"a.b.co.uk"` yields `["a.b.co.uk", "b.co.uk", "co.uk", "uk"]`.
pub fn domain_suffixes(domain: &str) -> Vec<&str> {
    let mut suffixes = vec![domain];
    let mut rest = domain;
    while let Some((_, tail)) = rest.split_once('.') {
        suffixes.push(tail);
        rest = tail;
    }
    suffixes
}

/// Check if a string looks like a DNS hostname with at least two labels.
pub fn is_plausible_hostname(host: &str) -> bool {
    host.len() <= 253 && HOSTNAME_RE.is_match(host)
}

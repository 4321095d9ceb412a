//! Referral detection in raw WHOIS responses.
//!
//! Registries point at the registrar's server with a handful of field names
//! (`Registrar WHOIS Server:`, `Whois Server:`, `ReferralServer:`, IANA's
//! `refer:`). The set is an evolving convention, so it is a table rather than
//! fixed logic, and config files may replace it.

use crate::utils::is_plausible_hostname;

/// Field names recognized out of the box, compared case-insensitively.
pub const DEFAULT_REFERRAL_FIELDS: &[&str] = &[
    "registrar whois server",
    "whois server",
    "referralserver",
    "refer",
    "whois",
];

/// Table of field names that announce a delegated WHOIS server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralRules {
    fields: Vec<String>,
}

impl Default for ReferralRules {
    fn default() -> Self {
        Self::new(DEFAULT_REFERRAL_FIELDS.iter().copied())
    }
}

impl ReferralRules {
    /// Build rules from field names. Blank names are dropped.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = fields
            .into_iter()
            .map(|f| f.as_ref().trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Find the next server announced in `response`.
    ///
    /// Lines are scanned in document order; the first line whose key matches
    /// a known field and whose value normalizes to a plausible hostname is
    /// the candidate. A candidate equal to `current_server` is a
    /// self-referral and yields `None`.
    ///
    /// ```rust
    /// use whois_trace_lib::ReferralRules;
    ///
    /// let rules = ReferralRules::default();
    /// let response = "Domain Name: EXAMPLE.COM\r\nRegistrar WHOIS Server: whois.markmonitor.com\r\n";
    /// assert_eq!(
    ///     rules.extract(response, "whois.verisign-grs.com"),
    ///     Some("whois.markmonitor.com".to_string())
    /// );
    /// assert_eq!(rules.extract(response, "whois.markmonitor.com"), None);
    /// ```
    pub fn extract(&self, response: &str, current_server: &str) -> Option<String> {
        let candidate = response
            .lines()
            .filter_map(|line| self.match_line(line))
            .next()?;

        if candidate.eq_ignore_ascii_case(current_server.trim()) {
            None
        } else {
            Some(candidate)
        }
    }

    fn match_line(&self, line: &str) -> Option<String> {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_lowercase();
        if !self.fields.iter().any(|f| *f == key) {
            return None;
        }

        let host = normalize_referral_host(value);
        if is_plausible_hostname(&host) {
            Some(host)
        } else {
            None
        }
    }
}

/// Reduce a referral value to a bare lowercase hostname.
///
/// `" rwhois://RWhois.Example.NET:4321/path "` becomes `"rwhois.example.net"`.
pub fn normalize_referral_host(value: &str) -> String {
    let value = value.trim().to_lowercase();
    let without_scheme = match value.split_once("://") {
        Some((_, rest)) => rest,
        None => value.as_str(),
    };
    let host = without_scheme.split('/').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host.trim().trim_end_matches('.').to_string()
}

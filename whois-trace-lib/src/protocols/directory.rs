//! WHOIS server directory and IANA discovery.
//!
//! This module maps domain suffixes to their default WHOIS servers. Lookups
//! use the longest matching suffix, so second-level registries such as
//! `ac.uk` win over the bare `uk` entry.

use crate::utils::domain_suffixes;
use std::collections::{BTreeMap, HashMap};

/// IANA's root WHOIS server, used for TLD discovery.
pub const IANA_WHOIS_SERVER: &str = "whois.iana.org";

lazy_static::lazy_static! {
    // Built once per process and never mutated.
    static ref BUILTIN_SERVERS: HashMap<&'static str, &'static str> = HashMap::from([
        // Popular gTLDs (Generic Top-Level Domains)
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.publicinterestregistry.org"),
        ("info", "whois.identitydigital.services"),
        ("biz", "whois.nic.biz"),
        ("mobi", "whois.identitydigital.services"),
        ("name", "whois.nic.name"),
        ("pro", "whois.identitydigital.services"),
        // Google TLDs
        ("app", "whois.nic.google"),
        ("dev", "whois.nic.google"),
        ("page", "whois.nic.google"),
        // CentralNic managed gTLDs
        ("xyz", "whois.nic.xyz"),
        ("tech", "whois.nic.tech"),
        ("online", "whois.nic.online"),
        ("site", "whois.nic.site"),
        ("website", "whois.nic.website"),
        // Other popular gTLDs
        ("blog", "whois.nic.blog"),
        ("shop", "whois.nic.shop"),
        ("cloud", "whois.nic.cloud"),
        // Identity Digital managed ccTLDs
        ("ai", "whois.nic.ai"), // Anguilla
        ("io", "whois.nic.io"), // British Indian Ocean Territory
        ("me", "whois.nic.me"), // Montenegro
        // Country Code TLDs (ccTLDs)
        ("us", "whois.nic.us"),         // United States
        ("uk", "whois.nic.uk"),         // United Kingdom
        ("de", "whois.denic.de"),       // Germany
        ("ca", "whois.cira.ca"),        // Canada
        ("au", "whois.auda.org.au"),    // Australia
        ("fr", "whois.nic.fr"),         // France
        ("nl", "whois.domain-registry.nl"), // Netherlands
        ("br", "whois.registro.br"),    // Brazil
        ("in", "whois.registry.in"),    // India
        ("eu", "whois.eu"),             // European Union
        ("it", "whois.nic.it"),         // Italy
        ("jp", "whois.jprs.jp"),        // Japan
        ("cn", "whois.cnnic.cn"),       // China
        ("co", "whois.registry.co"),    // Colombia
        ("id", "whois.id"),             // Indonesia
        ("tv", "whois.nic.tv"),         // Tuvalu
        ("cc", "ccwhois.verisign-grs.com"), // Cocos Islands
        // Second-level suffixes with their own registries
        ("ac.uk", "whois.ja.net"),
        ("gov.uk", "whois.ja.net"),
        ("sch.id", "whois.pandi.or.id"),
    ]);
}

/// Immutable mapping from domain suffixes to WHOIS servers.
///
/// Build it once at startup and share it (behind an `Arc`) with every
/// resolution; there is no way to mutate it afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerDirectory {
    entries: HashMap<String, String>,
}

impl ServerDirectory {
    /// The built-in directory.
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN_SERVERS.iter().map(|(s, h)| (*s, *h)))
    }

    /// A directory holding exactly the given entries.
    ///
    /// Suffixes and hosts are lowercased and stripped of surrounding dots;
    /// pairs with an empty side are ignored. Later duplicates win.
    pub fn from_entries<I, S, H>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, H)>,
        S: AsRef<str>,
        H: AsRef<str>,
    {
        Self::default().with_entries(entries)
    }

    /// Layer additional entries over this directory, replacing duplicates.
    pub fn with_entries<I, S, H>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, H)>,
        S: AsRef<str>,
        H: AsRef<str>,
    {
        for (suffix, host) in entries {
            let suffix = clean(suffix.as_ref());
            let host = clean(host.as_ref());
            if !suffix.is_empty() && !host.is_empty() {
                self.entries.insert(suffix, host);
            }
        }
        self
    }

    /// Find the server for a normalized domain by longest suffix match.
    ///
    /// ```rust
    /// use whois_trace_lib::ServerDirectory;
    ///
    /// let directory = ServerDirectory::from_entries([
    ///     ("uk", "whois.nic.uk"),
    ///     ("ac.uk", "whois.ja.net"),
    /// ]);
    /// assert_eq!(directory.lookup("ox.ac.uk"), Some("whois.ja.net"));
    /// assert_eq!(directory.lookup("bbc.co.uk"), Some("whois.nic.uk"));
    /// assert_eq!(directory.lookup("example.zz"), None);
    /// ```
    pub fn lookup(&self, domain: &str) -> Option<&str> {
        domain_suffixes(domain)
            .into_iter()
            .find_map(|suffix| self.entries.get(suffix))
            .map(String::as_str)
    }

    /// All entries sorted by suffix.
    pub fn entries(&self) -> BTreeMap<&str, &str> {
        self.entries
            .iter()
            .map(|(s, h)| (s.as_str(), h.as_str()))
            .collect()
    }

    /// Known suffixes, sorted.
    pub fn suffixes(&self) -> Vec<&str> {
        self.entries().into_keys().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn clean(value: &str) -> String {
    value.trim().trim_matches('.').to_lowercase()
}

/// Parse an IANA WHOIS response for the authoritative WHOIS server.
///
/// The IANA WHOIS response may use either `refer:` or `whois:` to indicate
/// the authoritative WHOIS server for a TLD. We check both fields, preferring
/// `refer:` when present.
///
/// ```text
/// whois:        whois.verisign-grs.com
/// refer:        whois.verisign-grs.com
/// ```
pub fn parse_iana_refer_response(response: &str) -> Option<String> {
    let mut whois_server = None;

    for line in response.lines() {
        let line_trimmed = line.trim();
        if let Some(server) = line_trimmed.strip_prefix("refer:") {
            let server = server.trim();
            if !server.is_empty() {
                // `refer:` is the canonical field — return immediately
                return Some(server.to_lowercase());
            }
        } else if let Some(server) = line_trimmed.strip_prefix("whois:") {
            let server = server.trim();
            if !server.is_empty() && whois_server.is_none() {
                whois_server = Some(server.to_lowercase());
            }
        }
    }

    whois_server
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_contains_common_tlds() {
        let directory = ServerDirectory::builtin();
        assert_eq!(directory.lookup("example.com"), Some("whois.verisign-grs.com"));
        assert_eq!(directory.lookup("example.net"), Some("whois.verisign-grs.com"));
        assert!(directory.lookup("example.org").is_some());
        assert!(directory.len() > 30);
    }

    #[test]
    fn test_longest_suffix_wins() {
        let directory = ServerDirectory::builtin();
        assert_eq!(directory.lookup("ox.ac.uk"), Some("whois.ja.net"));
        assert_eq!(directory.lookup("bbc.co.uk"), Some("whois.nic.uk"));
        assert_eq!(directory.lookup("smk1.sch.id"), Some("whois.pandi.or.id"));
        assert_eq!(directory.lookup("example.id"), Some("whois.id"));
    }

    #[test]
    fn test_longest_suffix_independent_of_insertion_order() {
        let a = ServerDirectory::from_entries([("uk", "generic"), ("ac.uk", "specific")]);
        let b = ServerDirectory::from_entries([("ac.uk", "specific"), ("uk", "generic")]);
        assert_eq!(a.lookup("cam.ac.uk"), Some("specific"));
        assert_eq!(b.lookup("cam.ac.uk"), Some("specific"));
    }

    #[test]
    fn test_unknown_suffix() {
        let directory = ServerDirectory::from_entries([("com", "whois.verisign-grs.com")]);
        assert_eq!(directory.lookup("example.zz"), None);
        // label boundaries only: "xcom" must not match "com"
        assert_eq!(directory.lookup("example.xcom"), None);
    }

    #[test]
    fn test_with_entries_overrides_and_cleans() {
        let directory = ServerDirectory::builtin()
            .with_entries([(".COM.", " WHOIS.Example.NET "), ("zz", "whois.nic.zz"), ("", "x")]);
        assert_eq!(directory.lookup("example.com"), Some("whois.example.net"));
        assert_eq!(directory.lookup("example.zz"), Some("whois.nic.zz"));
        assert!(!directory.entries().contains_key(""));
    }

    #[test]
    fn test_entries_sorted() {
        let directory = ServerDirectory::from_entries([("org", "b"), ("com", "a")]);
        let suffixes: Vec<&str> = directory.entries().keys().copied().collect();
        assert_eq!(suffixes, vec!["com", "org"]);
        assert_eq!(directory.suffixes(), vec!["com", "org"]);
    }

    #[test]
    fn test_parse_iana_refer_response() {
        // Standard IANA response with refer line
        let response = "% IANA WHOIS server\n% for more information on IANA, visit http://www.iana.org\n\nrefer:        whois.verisign-grs.com\n\ndomain:       COM\n";
        assert_eq!(
            parse_iana_refer_response(response),
            Some("whois.verisign-grs.com".to_string())
        );

        // Response without refer line
        let no_refer = "% IANA WHOIS server\ndomain: TEST\nstatus: ACTIVE\n";
        assert_eq!(parse_iana_refer_response(no_refer), None);

        // Empty refer line
        let empty_refer = "refer:        \ndomain: COM\n";
        assert_eq!(parse_iana_refer_response(empty_refer), None);

        // whois: field instead of refer:
        let whois_field = "% IANA WHOIS server\n\nwhois:        whois.nic.zz\n\ndomain:       ZZ\n";
        assert_eq!(
            parse_iana_refer_response(whois_field),
            Some("whois.nic.zz".to_string())
        );

        // Both fields — refer: takes precedence
        let both_fields = "whois:        whois.old-server.com\nrefer:        whois.correct-server.com\n";
        assert_eq!(
            parse_iana_refer_response(both_fields),
            Some("whois.correct-server.com".to_string())
        );
    }
}

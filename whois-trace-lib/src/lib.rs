//! # WHOIS Trace Library
//!
//! Finds the authoritative WHOIS server for a domain and follows referrals
//! down to the registrar, returning the final raw response together with the
//! path that led to it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whois_trace_lib::{TraceConfig, WhoisResolver};
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = WhoisResolver::new(TraceConfig::default()).await;
//!     let resolution = resolver.resolve("example.com").await;
//!
//!     println!("{} via {:?}", resolution.status, resolution.servers());
//!     if let Some(raw) = &resolution.raw {
//!         println!("{}", raw);
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Suffix Directory**: Longest-suffix match over a built-in server table
//! - **Referral Chasing**: Bounded hops with cycle detection
//! - **Batch Resolution**: Bounded concurrency with results in input order
//! - **Pluggable Transports**: Raw sockets or the system `whois` command

// Re-export main public API types and functions
// This makes them available as whois_trace_lib::TypeName
pub use concurrent::ConcurrentProcessor;
pub use config::{
    env_config_from, load_env_config, parse_timeout_string, ConfigManager, DefaultsConfig,
    EnvConfig, FileConfig, ReferralsConfig, OUTPUT_FORMATS,
};
pub use error::{ErrorKind, WhoisTraceError};
pub use protocols::{
    normalize_referral_host, parse_iana_refer_response, select_transport, ReferralRules,
    ServerDirectory, SocketTransport, WhoisTransport, DEFAULT_REFERRAL_FIELDS, IANA_WHOIS_SERVER,
};
#[cfg(feature = "system-whois")]
pub use protocols::{get_whois_version, is_whois_available, SystemWhoisTransport};
pub use resolver::{ResolverBuilder, WhoisResolver};
pub use types::{
    BatchEntry, BatchResult, Hop, HopOutcome, QueryTarget, RawResponse, Resolution,
    ResolutionStatus, StopReason, TraceConfig, TransportKind, DEFAULT_MAX_HOPS, DEFAULT_PORT,
    DEFAULT_TIMEOUT, MAX_HOPS_LIMIT,
};
pub use utils::{domain_suffixes, extract_tld, is_plausible_hostname, normalize_domain};

// Internal modules - these are not part of the public API
mod concurrent;
mod config;
mod error;
mod protocols;
mod resolver;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, WhoisTraceError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Get library information for debugging or display purposes.
pub fn info() -> LibraryInfo {
    LibraryInfo {
        version: VERSION,
        author: AUTHOR,
        features: get_enabled_features(),
    }
}

/// Information about the library build and features
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub version: &'static str,
    pub author: &'static str,
    pub features: Vec<&'static str>,
}

/// Get list of enabled features at compile time
#[allow(clippy::vec_init_then_push)]
fn get_enabled_features() -> Vec<&'static str> {
    let mut features = Vec::new();

    #[cfg(feature = "system-whois")]
    features.push("system-whois");

    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_info() {
        let info = info();
        assert_eq!(info.version, VERSION);
        #[cfg(feature = "system-whois")]
        assert!(info.features.contains(&"system-whois"));
    }
}

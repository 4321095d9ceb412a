//! Protocol implementations for WHOIS resolution.
//!
//! This module contains the server directory, the referral extractor and
//! the transports that perform the actual port-43 exchange.

use crate::error::WhoisTraceError;
use crate::types::{QueryTarget, RawResponse, TransportKind};
use async_trait::async_trait;
use std::sync::Arc;

/// Suffix → server mappings and IANA discovery
pub mod directory;

/// Referral field table and extraction
pub mod referral;

/// Raw TCP transport
pub mod socket;

/// Transport backed by the system `whois` command
#[cfg(feature = "system-whois")]
pub mod system;

// Re-export commonly used functions and types
pub use directory::{parse_iana_refer_response, ServerDirectory, IANA_WHOIS_SERVER};
pub use referral::{normalize_referral_host, ReferralRules, DEFAULT_REFERRAL_FIELDS};
pub use socket::SocketTransport;
#[cfg(feature = "system-whois")]
pub use system::{get_whois_version, is_whois_available, SystemWhoisTransport};

/// Capability to perform one WHOIS exchange.
///
/// Implementations send `query_line` (without terminator) to the target and
/// return everything the server sent back. They never retry; a failed
/// exchange surfaces as `ConnectionError` or `Timeout`.
#[async_trait]
pub trait WhoisTransport: Send + Sync {
    async fn query(
        &self,
        target: &QueryTarget,
        query_line: &str,
    ) -> Result<RawResponse, WhoisTraceError>;

    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Pick the transport for a run. Called once per resolver.
pub async fn select_transport(kind: TransportKind) -> Arc<dyn WhoisTransport> {
    match kind {
        TransportKind::Socket => Arc::new(SocketTransport::new()),
        #[cfg(feature = "system-whois")]
        TransportKind::System => Arc::new(SystemWhoisTransport::new()),
        #[cfg(feature = "system-whois")]
        TransportKind::Auto => {
            if is_whois_available().await {
                tracing::debug!("system whois found, using it as transport");
                Arc::new(SystemWhoisTransport::new())
            } else {
                tracing::debug!("no system whois, falling back to raw sockets");
                Arc::new(SocketTransport::new())
            }
        }
        #[cfg(not(feature = "system-whois"))]
        TransportKind::System | TransportKind::Auto => {
            tracing::warn!("built without the system-whois feature, using raw sockets");
            Arc::new(SocketTransport::new())
        }
    }
}

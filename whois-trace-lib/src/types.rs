//! Core data types for WHOIS resolution.
//!
//! This module defines the main data structures used throughout the library:
//! query targets, hops, resolutions, batch results and the resolver
//! configuration.

use crate::error::WhoisTraceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Well-known WHOIS port.
pub const DEFAULT_PORT: u16 = 43;

/// Default per-hop timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Default bound on the number of servers queried for one domain.
pub const DEFAULT_MAX_HOPS: usize = 5;

/// Hard ceiling for `max_hops`.
pub const MAX_HOPS_LIMIT: usize = 20;

/// Where and how to send one WHOIS query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTarget {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl QueryTarget {
    pub fn new<H: Into<String>>(host: H, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }
}

impl fmt::Display for QueryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Bytes returned by a server for one query, decoded as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub text: String,
    /// `false` when the read was cut short by the timeout or the size cap
    pub complete: bool,
}

impl RawResponse {
    pub fn complete<T: Into<String>>(text: T) -> Self {
        Self {
            text: text.into(),
            complete: true,
        }
    }

    pub fn truncated<T: Into<String>>(text: T) -> Self {
        Self {
            text: text.into(),
            complete: false,
        }
    }
}

/// What happened on one hop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HopOutcome {
    /// The server answered; `complete` is false for truncated reads
    Response { text: String, complete: bool },
    /// The exchange failed before any data arrived
    Failed { error: WhoisTraceError },
}

/// One request/response exchange with a single WHOIS server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hop {
    pub server: String,
    pub port: u16,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub outcome: HopOutcome,
}

impl Hop {
    /// Response text, if the hop produced any.
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            HopOutcome::Response { text, .. } => Some(text),
            HopOutcome::Failed { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, HopOutcome::Response { complete: true, .. })
    }

    pub fn error(&self) -> Option<&WhoisTraceError> {
        match &self.outcome {
            HopOutcome::Failed { error } => Some(error),
            HopOutcome::Response { .. } => None,
        }
    }
}

/// Terminal status of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// The last server contacted returned a complete response
    Success,
    /// Some data was obtained, but a later hop failed or was truncated
    Partial,
    /// No server returned any data
    Failed,
}

/// Why the referral loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Rejected before the first query (bad input, no server)
    NotStarted,
    /// The last response carried no usable referral
    NoReferral,
    /// Referral following was turned off
    ReferralsDisabled,
    /// The referral pointed at a server already queried
    ReferralCycle { server: String },
    /// A referral was pending but the hop budget was spent
    MaxHopsReached { limit: usize },
    /// A hop failed outright
    HopFailed { server: String },
    /// The run-wide deadline passed between hops
    DeadlineExceeded,
}

impl StopReason {
    /// The taxonomy error matching a terminal condition, if it has one.
    pub fn as_error(&self) -> Option<WhoisTraceError> {
        match self {
            StopReason::ReferralCycle { server } => Some(WhoisTraceError::referral_cycle(server)),
            StopReason::MaxHopsReached { limit } => Some(WhoisTraceError::max_hops(*limit)),
            StopReason::DeadlineExceeded => Some(WhoisTraceError::deadline("next referral hop")),
            _ => None,
        }
    }
}

/// The outcome of resolving one domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// Normalized domain, or the raw input when it failed validation
    pub domain: String,
    pub status: ResolutionStatus,
    /// Hops in the order the servers were contacted
    pub hops: Vec<Hop>,
    /// Text of the last hop that returned data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WhoisTraceError>,
    pub stop_reason: StopReason,
    pub elapsed_ms: u64,
}

impl Resolution {
    /// A resolution that never reached the network.
    pub fn rejected<D: Into<String>>(domain: D, error: WhoisTraceError) -> Self {
        Self {
            domain: domain.into(),
            status: ResolutionStatus::Failed,
            hops: Vec::new(),
            raw: None,
            error: Some(error),
            stop_reason: StopReason::NotStarted,
            elapsed_ms: 0,
        }
    }

    /// Servers in contact order.
    pub fn servers(&self) -> Vec<&str> {
        self.hops.iter().map(|h| h.server.as_str()).collect()
    }

    /// Server whose text is in `raw`.
    pub fn final_server(&self) -> Option<&str> {
        self.hops
            .iter()
            .rev()
            .find(|h| h.text().is_some())
            .map(|h| h.server.as_str())
    }

    /// First hop that failed, if any.
    pub fn failed_hop(&self) -> Option<&Hop> {
        self.hops.iter().find(|h| h.error().is_some())
    }

    pub fn is_success(&self) -> bool {
        self.status == ResolutionStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == ResolutionStatus::Failed
    }
}

/// One input domain paired with its resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub input: String,
    pub resolution: Resolution,
}

/// Resolutions for a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter()
    }

    /// Number of resolutions with the given status.
    pub fn count(&self, status: ResolutionStatus) -> usize {
        self.entries
            .iter()
            .filter(|e| e.resolution.status == status)
            .count()
    }

    /// Whether any domain failed entirely (drives the CLI exit status).
    pub fn any_failed(&self) -> bool {
        self.count(ResolutionStatus::Failed) > 0
    }
}

/// Which implementation performs WHOIS exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Raw TCP client speaking the port-43 protocol directly
    #[default]
    Socket,
    /// The host's `whois` command
    System,
    /// `System` when a working `whois` binary is found, `Socket` otherwise
    Auto,
}

impl FromStr for TransportKind {
    type Err = WhoisTraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "socket" => Ok(TransportKind::Socket),
            "system" => Ok(TransportKind::System),
            "auto" => Ok(TransportKind::Auto),
            other => Err(WhoisTraceError::config(format!(
                "Unknown backend '{}'. Use socket, system or auto",
                other
            ))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Socket => write!(f, "socket"),
            TransportKind::System => write!(f, "system"),
            TransportKind::Auto => write!(f, "auto"),
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStatus::Success => write!(f, "success"),
            ResolutionStatus::Partial => write!(f, "partial"),
            ResolutionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Configuration options for resolutions.
///
/// One value applies to a whole run: the server and port overrides only
/// affect the first hop of each domain, while referral hops always use the
/// default port with the same timeout.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Explicit first server, bypassing the directory
    pub server: Option<String>,

    /// Port for the first hop
    /// Default: 43
    pub port: u16,

    /// Timeout for each hop (connect + send + receive)
    /// Default: 8 seconds
    pub timeout: Duration,

    /// Whether to chase referrals after the first hop
    /// Default: true
    pub follow_referrals: bool,

    /// Maximum number of servers queried per domain
    /// Default: 5, Range: 1-20
    pub max_hops: usize,

    /// Maximum number of domains resolved at once in a batch
    /// Default: 4, Range: 1-100
    pub concurrency: usize,

    /// Ask whois.iana.org for TLDs missing from the directory
    /// Default: false
    pub iana_discovery: bool,

    /// Transport backend, chosen once when the resolver is built
    pub transport: TransportKind,

    /// Absolute point after which no new hop or domain is started
    pub deadline: Option<Instant>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            follow_referrals: true,
            max_hops: DEFAULT_MAX_HOPS,
            concurrency: 4,
            iana_discovery: false,
            transport: TransportKind::Socket,
            deadline: None,
        }
    }
}

impl TraceConfig {
    /// Query this server first instead of consulting the directory.
    pub fn with_server<S: Into<String>>(mut self, server: S) -> Self {
        let server = server.into();
        let server = server.trim().to_lowercase();
        self.server = if server.is_empty() { None } else { Some(server) };
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_follow_referrals(mut self, enabled: bool) -> Self {
        self.follow_referrals = enabled;
        self
    }

    /// Set the hop bound, clamped to 1..=20.
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops.clamp(1, MAX_HOPS_LIMIT);
        self
    }

    /// Set batch concurrency, clamped to 1..=100.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 100);
        self
    }

    pub fn with_iana_discovery(mut self, enabled: bool) -> Self {
        self.iana_discovery = enabled;
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Stop starting new work once `budget` has elapsed from now.
    pub fn with_deadline_in(mut self, budget: Duration) -> Self {
        self.deadline = Some(Instant::now() + budget);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub(crate) fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

//! Error handling for WHOIS resolution.
//!
//! This module defines the error type that covers all the different ways a
//! resolution can fail or stop early, from malformed input to unreachable
//! servers and exhausted referral budgets.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Main error type for WHOIS resolution operations.
///
/// Per-domain errors are recorded inside a `Resolution` rather than returned,
/// so a batch never aborts because one domain failed.
#[derive(Debug, Clone, PartialEq)]
pub enum WhoisTraceError {
    /// Malformed domain input, rejected before any network activity
    InvalidDomain { domain: String, reason: String },

    /// No directory entry for the domain's suffix and no server override
    NoServerFound { domain: String, tld: String },

    /// DNS resolution, TCP connect or I/O failure while talking to a server
    ConnectionError { server: String, message: String },

    /// No data arrived before the hop timeout elapsed
    Timeout { server: String, duration: Duration },

    /// A referral pointed back to a server already visited
    ReferralCycle { server: String },

    /// The hop budget ran out while referrals were still pending
    MaxHopsExceeded { limit: usize },

    /// The run-wide deadline passed before the work could be done
    DeadlineExceeded { stage: String },

    /// Configuration errors (invalid settings, unreadable config files, etc.)
    ConfigError { message: String },

    /// File I/O errors when reading domain lists or config files
    FileError { path: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

/// Coarse error category, stable across versions and used in JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidDomain,
    NoServerFound,
    ConnectionError,
    Timeout,
    ReferralCycle,
    MaxHopsExceeded,
    DeadlineExceeded,
    ConfigError,
    FileError,
    Internal,
}

impl WhoisTraceError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new "no server" error for a domain and its TLD.
    pub fn no_server<D: Into<String>, T: Into<String>>(domain: D, tld: T) -> Self {
        Self::NoServerFound {
            domain: domain.into(),
            tld: tld.into(),
        }
    }

    /// Create a new connection error.
    pub fn connection<S: Into<String>, M: Into<String>>(server: S, message: M) -> Self {
        Self::ConnectionError {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(server: S, duration: Duration) -> Self {
        Self::Timeout {
            server: server.into(),
            duration,
        }
    }

    pub fn referral_cycle<S: Into<String>>(server: S) -> Self {
        Self::ReferralCycle {
            server: server.into(),
        }
    }

    pub fn max_hops(limit: usize) -> Self {
        Self::MaxHopsExceeded { limit }
    }

    pub fn deadline<S: Into<String>>(stage: S) -> Self {
        Self::DeadlineExceeded {
            stage: stage.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDomain { .. } => ErrorKind::InvalidDomain,
            Self::NoServerFound { .. } => ErrorKind::NoServerFound,
            Self::ConnectionError { .. } => ErrorKind::ConnectionError,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ReferralCycle { .. } => ErrorKind::ReferralCycle,
            Self::MaxHopsExceeded { .. } => ErrorKind::MaxHopsExceeded,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::ConfigError { .. } => ErrorKind::ConfigError,
            Self::FileError { .. } => ErrorKind::FileError,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error came from the network rather than the input.
    ///
    /// Only network errors can happen on a hop; everything else is decided
    /// before the first query is sent.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError { .. } | Self::Timeout { .. }
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidDomain => "invalid domain",
            ErrorKind::NoServerFound => "no server found",
            ErrorKind::ConnectionError => "connection error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ReferralCycle => "referral cycle",
            ErrorKind::MaxHopsExceeded => "max hops exceeded",
            ErrorKind::DeadlineExceeded => "deadline exceeded",
            ErrorKind::ConfigError => "configuration error",
            ErrorKind::FileError => "file error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(name)
    }
}

impl fmt::Display for WhoisTraceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::NoServerFound { domain, tld } => {
                write!(
                    f,
                    "No WHOIS server known for '{}' (TLD '{}'); pass an explicit server",
                    domain, tld
                )
            }
            Self::ConnectionError { server, message } => {
                write!(f, "Connection to {} failed: {}", server, message)
            }
            Self::Timeout { server, duration } => {
                write!(f, "Timeout after {:?} waiting for {}", duration, server)
            }
            Self::ReferralCycle { server } => {
                write!(f, "Referral cycle: {} was already queried", server)
            }
            Self::MaxHopsExceeded { limit } => {
                write!(f, "Referral chain exceeded {} hops", limit)
            }
            Self::DeadlineExceeded { stage } => {
                write!(f, "Deadline exceeded before {}", stage)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for WhoisTraceError {}

// Errors travel inside serialized resolutions as { kind, message }.
impl Serialize for WhoisTraceError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("WhoisTraceError", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl From<std::io::Error> for WhoisTraceError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<toml::de::Error> for WhoisTraceError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML configuration: {}", err),
        }
    }
}

impl From<regex::Error> for WhoisTraceError {
    fn from(err: regex::Error) -> Self {
        Self::Internal {
            message: format!("Regex error: {}", err),
        }
    }
}

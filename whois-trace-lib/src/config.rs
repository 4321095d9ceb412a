//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and environment
//! variables, and merging configurations with proper precedence rules.

use crate::error::WhoisTraceError;
use crate::protocols::{ReferralRules, ServerDirectory};
use crate::types::{TransportKind, MAX_HOPS_LIMIT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Output formats understood by the CLI.
pub const OUTPUT_FORMATS: &[&str] = &["text", "json"];

/// Configuration loaded from TOML files.
///
/// ```toml
/// [defaults]
/// timeout = "5s"
/// max_hops = 3
///
/// [servers]
/// "ac.uk" = "whois.ja.net"
///
/// [referrals]
/// fields = ["registrar whois server", "whois server"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Extra suffix → server entries, layered over the built-in directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<HashMap<String, String>>,

    /// Referral field names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrals: Option<ReferralsConfig>,
}

/// Default configuration values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Server queried first, bypassing the directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Port for the first hop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Per-hop timeout (as string, e.g., "8s", "500ms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_referrals: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hops: Option<usize>,

    /// Default concurrency level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iana_discovery: Option<bool>,

    /// "socket", "system" or "auto"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// "text" or "json"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Referral extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReferralsConfig {
    /// Field names that announce the next server, replacing the defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl FileConfig {
    /// Built-in directory with the `[servers]` entries layered on top.
    pub fn directory(&self) -> ServerDirectory {
        let directory = ServerDirectory::builtin();
        match &self.servers {
            Some(servers) => directory.with_entries(servers.iter()),
            None => directory,
        }
    }

    /// Referral rules from `[referrals]`, or the defaults.
    pub fn referral_rules(&self) -> ReferralRules {
        match self.referrals.as_ref().and_then(|r| r.fields.as_ref()) {
            Some(fields) => ReferralRules::new(fields),
            None => ReferralRules::default(),
        }
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which config files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error if reading, parsing or
    /// validation fails.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, WhoisTraceError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(WhoisTraceError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            WhoisTraceError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            WhoisTraceError::config(format!(
                "Failed to parse TOML configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "loaded config file");

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is lowest, then the global file in `$HOME`, then a local
    /// file in the current directory. Files that fail to load are skipped
    /// with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, WhoisTraceError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping config file"),
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            let files: Vec<String> = loaded_files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            info!(files = ?files, "multiple config files merged, later ones win");
        }

        Ok(merged_config)
    }

    /// Looks for configuration files in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./whois-trace.toml", "./.whois-trace.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Looks for configuration files in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".whois-trace.toml", "whois-trace.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("whois-trace").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower_defaults), Some(higher_defaults)) => Some(DefaultsConfig {
                    server: higher_defaults.server.or(lower_defaults.server),
                    port: higher_defaults.port.or(lower_defaults.port),
                    timeout: higher_defaults.timeout.or(lower_defaults.timeout),
                    follow_referrals: higher_defaults
                        .follow_referrals
                        .or(lower_defaults.follow_referrals),
                    max_hops: higher_defaults.max_hops.or(lower_defaults.max_hops),
                    concurrency: higher_defaults.concurrency.or(lower_defaults.concurrency),
                    iana_discovery: higher_defaults
                        .iana_discovery
                        .or(lower_defaults.iana_discovery),
                    backend: higher_defaults.backend.or(lower_defaults.backend),
                    output: higher_defaults.output.or(lower_defaults.output),
                }),
                (lower_defaults, higher_defaults) => higher_defaults.or(lower_defaults),
            },
            servers: match (lower.servers, higher.servers) {
                (Some(mut lower_servers), Some(higher_servers)) => {
                    // Same suffix in both files: higher wins
                    lower_servers.extend(higher_servers);
                    Some(lower_servers)
                }
                (lower_servers, higher_servers) => higher_servers.or(lower_servers),
            },
            referrals: match (lower.referrals, higher.referrals) {
                (Some(lower_referrals), Some(higher_referrals)) => Some(ReferralsConfig {
                    fields: higher_referrals.fields.or(lower_referrals.fields),
                }),
                (lower_referrals, higher_referrals) => higher_referrals.or(lower_referrals),
            },
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), WhoisTraceError> {
        if let Some(defaults) = &config.defaults {
            if defaults.port == Some(0) {
                return Err(WhoisTraceError::config("Port must be between 1 and 65535"));
            }

            if let Some(max_hops) = defaults.max_hops {
                if max_hops == 0 || max_hops > MAX_HOPS_LIMIT {
                    return Err(WhoisTraceError::config(format!(
                        "max_hops must be between 1 and {}",
                        MAX_HOPS_LIMIT
                    )));
                }
            }

            if let Some(concurrency) = defaults.concurrency {
                if concurrency == 0 || concurrency > 100 {
                    return Err(WhoisTraceError::config(
                        "Concurrency must be between 1 and 100",
                    ));
                }
            }

            if let Some(timeout_str) = &defaults.timeout {
                if parse_timeout_string(timeout_str).is_none() {
                    return Err(WhoisTraceError::config(format!(
                        "Invalid timeout format '{}'. Use format like '500ms', '8s', '2m'",
                        timeout_str
                    )));
                }
            }

            if let Some(backend) = &defaults.backend {
                backend.parse::<TransportKind>()?;
            }

            if let Some(output) = &defaults.output {
                if !OUTPUT_FORMATS.contains(&output.trim().to_lowercase().as_str()) {
                    return Err(WhoisTraceError::config(format!(
                        "Unknown output format '{}'. Use text or json",
                        output
                    )));
                }
            }

            if let Some(server) = &defaults.server {
                if server.trim().is_empty() {
                    return Err(WhoisTraceError::config("Default server cannot be empty"));
                }
            }
        }

        if let Some(servers) = &config.servers {
            for (suffix, host) in servers {
                if suffix.trim_matches(|c: char| c == '.' || c.is_whitespace()).is_empty() {
                    return Err(WhoisTraceError::config("Server suffixes cannot be empty"));
                }
                if host.trim().is_empty() {
                    return Err(WhoisTraceError::config(format!(
                        "Server for suffix '{}' cannot be empty",
                        suffix
                    )));
                }
            }
        }

        if let Some(fields) = config.referrals.as_ref().and_then(|r| r.fields.as_ref()) {
            if fields.is_empty() {
                return Err(WhoisTraceError::config(
                    "Referral field list cannot be empty",
                ));
            }
            if fields.iter().any(|f| f.trim().is_empty()) {
                return Err(WhoisTraceError::config(
                    "Referral field names cannot be empty",
                ));
            }
        }

        Ok(())
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via WT_* environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub timeout: Option<String>,
    pub no_referral: Option<bool>,
    pub max_hops: Option<usize>,
    pub concurrency: Option<usize>,
    pub output: Option<String>,
    pub backend: Option<String>,
    pub iana: Option<bool>,
    pub config: Option<String>,
}

/// Load configuration from environment variables.
///
/// Parses all WT_* environment variables. Invalid values are logged as
/// warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    env_config_from(|name| env::var(name).ok())
}

/// Build an `EnvConfig` from any variable source.
pub fn env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    // WT_SERVER - first server override
    if let Some(server) = non_empty(lookup("WT_SERVER")) {
        debug!(WT_SERVER = %server, "using environment");
        env_config.server = Some(server);
    }

    // WT_PORT - port for the first hop
    if let Some(val) = lookup("WT_PORT") {
        match val.trim().parse::<u16>() {
            Ok(port) if port > 0 => {
                debug!(WT_PORT = port, "using environment");
                env_config.port = Some(port);
            }
            _ => warn!("Invalid WT_PORT='{}', must be 1-65535", val),
        }
    }

    // WT_TIMEOUT - per-hop timeout
    if let Some(timeout_str) = lookup("WT_TIMEOUT") {
        if parse_timeout_string(&timeout_str).is_some() {
            debug!(WT_TIMEOUT = %timeout_str, "using environment");
            env_config.timeout = Some(timeout_str);
        } else {
            warn!(
                "Invalid WT_TIMEOUT='{}', use format like '500ms', '8s', '2m'",
                timeout_str
            );
        }
    }

    // WT_NO_REFERRAL - stop after the first server
    if let Some(val) = lookup("WT_NO_REFERRAL") {
        env_config.no_referral = parse_bool("WT_NO_REFERRAL", &val);
    }

    // WT_MAX_HOPS - hop bound
    if let Some(val) = lookup("WT_MAX_HOPS") {
        match val.trim().parse::<usize>() {
            Ok(max_hops) if (1..=MAX_HOPS_LIMIT).contains(&max_hops) => {
                debug!(WT_MAX_HOPS = max_hops, "using environment");
                env_config.max_hops = Some(max_hops);
            }
            _ => warn!("Invalid WT_MAX_HOPS='{}', must be 1-{}", val, MAX_HOPS_LIMIT),
        }
    }

    // WT_CONCURRENCY - concurrent resolutions
    if let Some(val) = lookup("WT_CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(concurrency) if concurrency > 0 && concurrency <= 100 => {
                debug!(WT_CONCURRENCY = concurrency, "using environment");
                env_config.concurrency = Some(concurrency);
            }
            _ => warn!("Invalid WT_CONCURRENCY='{}', must be 1-100", val),
        }
    }

    // WT_OUTPUT - text or json
    if let Some(output) = non_empty(lookup("WT_OUTPUT")) {
        let output = output.to_lowercase();
        if OUTPUT_FORMATS.contains(&output.as_str()) {
            debug!(WT_OUTPUT = %output, "using environment");
            env_config.output = Some(output);
        } else {
            warn!("Invalid WT_OUTPUT='{}', use text or json", output);
        }
    }

    // WT_BACKEND - transport backend
    if let Some(backend) = non_empty(lookup("WT_BACKEND")) {
        match backend.parse::<TransportKind>() {
            Ok(kind) => {
                debug!(WT_BACKEND = %kind, "using environment");
                env_config.backend = Some(kind.to_string());
            }
            Err(e) => warn!("Invalid WT_BACKEND: {}", e),
        }
    }

    // WT_IANA - IANA discovery for unknown suffixes
    if let Some(val) = lookup("WT_IANA") {
        env_config.iana = parse_bool("WT_IANA", &val);
    }

    // WT_CONFIG - explicit config file
    if let Some(config_path) = non_empty(lookup("WT_CONFIG")) {
        debug!(WT_CONFIG = %config_path, "using environment");
        env_config.config = Some(config_path);
    }

    env_config
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            warn!("Invalid {}='{}', use true/false", name, value);
            None
        }
    }
}

/// Parse a timeout string like "500ms", "8s", "2m" or "10".
///
/// A bare number is taken as seconds. Zero is rejected.
///
/// ```rust
/// use std::time::Duration;
/// use whois_trace_lib::parse_timeout_string;
///
/// assert_eq!(parse_timeout_string("8s"), Some(Duration::from_secs(8)));
/// assert_eq!(parse_timeout_string("250ms"), Some(Duration::from_millis(250)));
/// assert_eq!(parse_timeout_string("soon"), None);
/// ```
pub fn parse_timeout_string(timeout_str: &str) -> Option<Duration> {
    let timeout_str = timeout_str.trim().to_lowercase();

    let duration = if let Some(ms) = timeout_str.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        // Assume seconds if no unit
        timeout_str.parse::<u64>().ok().map(Duration::from_secs)
    }?;

    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}

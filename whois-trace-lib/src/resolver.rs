//! Main WHOIS resolver implementation.
//!
//! This module provides the `WhoisResolver` struct that picks the first
//! server for a domain, performs the query and chases referrals down to the
//! most specific server, plus the batch entry points built on top of it.

use crate::concurrent::ConcurrentProcessor;
use crate::error::WhoisTraceError;
use crate::protocols::{
    parse_iana_refer_response, select_transport, ReferralRules, ServerDirectory, WhoisTransport,
    IANA_WHOIS_SERVER,
};
use crate::types::{
    BatchEntry, BatchResult, Hop, HopOutcome, QueryTarget, Resolution, ResolutionStatus,
    StopReason, TraceConfig, DEFAULT_PORT,
};
use crate::utils::{extract_tld, is_plausible_hostname, normalize_domain};
use futures::stream::{Stream, StreamExt};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Resolves domains to their most specific WHOIS server.
///
/// The directory, referral rules and transport are fixed at construction and
/// shared read-only by every resolution, so one resolver can serve many
/// concurrent lookups.
///
/// # Example
///
/// ```rust,no_run
/// use whois_trace_lib::{TraceConfig, WhoisResolver};
///
/// #[tokio::main]
/// async fn main() {
///     let resolver = WhoisResolver::new(TraceConfig::default()).await;
///     let resolution = resolver.resolve("example.com").await;
///     println!("{}: {:?} via {:?}", resolution.domain, resolution.status, resolution.servers());
/// }
/// ```
pub struct WhoisResolver {
    /// Configuration settings for this resolver instance
    config: TraceConfig,
    directory: Arc<ServerDirectory>,
    rules: Arc<ReferralRules>,
    transport: Arc<dyn WhoisTransport>,
}

/// Assembles a `WhoisResolver` from optional parts.
///
/// Anything left unset falls back to the built-in directory, the default
/// referral fields and the transport named by `TraceConfig::transport`.
pub struct ResolverBuilder {
    config: TraceConfig,
    directory: Option<ServerDirectory>,
    rules: Option<ReferralRules>,
    transport: Option<Arc<dyn WhoisTransport>>,
}

impl ResolverBuilder {
    pub fn directory(mut self, directory: ServerDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn referral_rules(mut self, rules: ReferralRules) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Use this transport instead of the one named in the config.
    pub fn transport(mut self, transport: Arc<dyn WhoisTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub async fn build(self) -> WhoisResolver {
        let transport = match self.transport {
            Some(transport) => transport,
            None => select_transport(self.config.transport).await,
        };
        debug!(transport = transport.name(), "resolver ready");

        WhoisResolver {
            config: self.config,
            directory: Arc::new(self.directory.unwrap_or_else(ServerDirectory::builtin)),
            rules: Arc::new(self.rules.unwrap_or_default()),
            transport,
        }
    }
}

impl WhoisResolver {
    /// Create a resolver with the built-in directory and default referral rules.
    pub async fn new(config: TraceConfig) -> Self {
        Self::builder(config).build().await
    }

    pub fn builder(config: TraceConfig) -> ResolverBuilder {
        ResolverBuilder {
            config,
            directory: None,
            rules: None,
            transport: None,
        }
    }

    /// Get the current configuration for this resolver.
    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn directory(&self) -> &ServerDirectory {
        &self.directory
    }

    /// Name of the transport in use ("socket" or "system").
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Resolve one domain.
    ///
    /// The process:
    /// 1. Normalizes and validates the domain (no network on failure)
    /// 2. Picks the first server: override, directory, then IANA if enabled
    /// 3. Queries it and follows referrals, at most `max_hops` servers,
    ///    never revisiting a server
    ///
    /// Never returns an error: failures are recorded in the `Resolution`.
    #[instrument(skip_all, fields(domain = %domain))]
    pub async fn resolve(&self, domain: &str) -> Resolution {
        let started = Instant::now();

        let domain = match normalize_domain(domain) {
            Ok(domain) => domain,
            Err(e) => {
                debug!(error = %e, "rejected before any query");
                return Resolution::rejected(domain.trim(), e);
            }
        };

        if self.config.deadline_passed() {
            return Resolution::rejected(domain, WhoisTraceError::deadline("first query"));
        }

        let first_server = match self.initial_server(&domain).await {
            Ok(server) => server,
            Err(e) => {
                debug!(error = %e, "no starting server");
                return Resolution::rejected(domain, e);
            }
        };

        let mut resolution = self.chase(&domain, first_server).await;
        resolution.elapsed_ms = started.elapsed().as_millis() as u64;
        resolution
    }

    /// Resolve several domains, one `BatchEntry` per input in input order.
    ///
    /// Up to `concurrency` domains are in flight at once. A failing domain
    /// only affects its own entry.
    pub async fn resolve_batch(&self, domains: &[String]) -> BatchResult {
        let entries = self.resolve_stream(domains).collect().await;
        BatchResult { entries }
    }

    /// Resolve several domains, yielding entries in input order as soon as
    /// each one (and everything before it) is done.
    pub fn resolve_stream(
        &self,
        domains: &[String],
    ) -> Pin<Box<dyn Stream<Item = BatchEntry> + Send + '_>> {
        let processor = ConcurrentProcessor::new(self.config.concurrency);
        debug!(
            total = domains.len(),
            concurrency = processor.max_concurrency(),
            "starting batch"
        );

        let stream = processor.run_ordered(domains.to_vec(), move |input| async move {
            // Checked when the domain starts, not when the batch was queued
            let resolution = if self.config.deadline_passed() {
                Resolution::rejected(input.trim(), WhoisTraceError::deadline("domain started"))
            } else {
                self.resolve(&input).await
            };
            BatchEntry { input, resolution }
        });

        Box::pin(stream)
    }

    async fn initial_server(&self, domain: &str) -> Result<String, WhoisTraceError> {
        if let Some(server) = &self.config.server {
            return Ok(server.trim().to_lowercase());
        }

        if let Some(server) = self.directory.lookup(domain) {
            return Ok(server.to_string());
        }

        let tld = extract_tld(domain).unwrap_or(domain);

        if self.config.iana_discovery {
            if let Some(server) = self.discover(tld).await {
                return Ok(server);
            }
        }

        Err(WhoisTraceError::no_server(domain, tld))
    }

    /// Ask IANA which server handles `tld`.
    async fn discover(&self, tld: &str) -> Option<String> {
        let target = QueryTarget::new(IANA_WHOIS_SERVER, DEFAULT_PORT, self.config.timeout);
        match self.transport.query(&target, tld).await {
            Ok(response) => {
                let server = parse_iana_refer_response(&response.text)
                    .filter(|s| is_plausible_hostname(s));
                debug!(tld = %tld, server = ?server, "IANA discovery");
                server
            }
            Err(e) => {
                warn!(tld = %tld, error = %e, "IANA discovery failed");
                None
            }
        }
    }

    /// The referral state machine: one iteration per hop.
    async fn chase(&self, domain: &str, first_server: String) -> Resolution {
        let max_hops = self.config.max_hops.max(1);
        let mut hops: Vec<Hop> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut target = QueryTarget::new(first_server, self.config.port, self.config.timeout);

        let stop_reason = loop {
            if !hops.is_empty() && self.config.deadline_passed() {
                warn!(server = %target.host, "deadline passed before referral hop");
                break StopReason::DeadlineExceeded;
            }

            visited.insert(target.host.clone());
            debug!(server = %target, hop = hops.len() + 1, "querying WHOIS server");

            let hop_started = Instant::now();
            let outcome = match self.transport.query(&target, domain).await {
                Ok(response) => HopOutcome::Response {
                    text: response.text,
                    complete: response.complete,
                },
                Err(error) => {
                    warn!(server = %target, error = %error, "hop failed");
                    HopOutcome::Failed { error }
                }
            };
            hops.push(Hop {
                server: target.host.clone(),
                port: target.port,
                elapsed_ms: hop_started.elapsed().as_millis() as u64,
                outcome,
            });

            let referral = match hops.last().and_then(Hop::text) {
                None => {
                    break StopReason::HopFailed {
                        server: target.host.clone(),
                    }
                }
                Some(_) if !self.config.follow_referrals => break StopReason::ReferralsDisabled,
                Some(text) => self.rules.extract(text, &target.host),
            };

            let next = match referral {
                Some(next) => next,
                None => break StopReason::NoReferral,
            };

            if visited.contains(&next) {
                debug!(server = %next, "referral already visited");
                break StopReason::ReferralCycle { server: next };
            }

            if hops.len() >= max_hops {
                debug!(server = %next, limit = max_hops, "hop budget spent");
                break StopReason::MaxHopsReached { limit: max_hops };
            }

            debug!(from = %target.host, to = %next, "following referral");
            target = QueryTarget::new(next, DEFAULT_PORT, self.config.timeout);
        };

        self.finalize(domain, hops, stop_reason)
    }

    fn finalize(&self, domain: &str, hops: Vec<Hop>, stop_reason: StopReason) -> Resolution {
        let last_with_data = hops.iter().rposition(|h| h.text().is_some());

        let (status, error) = match (last_with_data, hops.last()) {
            (_, None) => (
                ResolutionStatus::Failed,
                Some(WhoisTraceError::internal("resolution ended without a hop")),
            ),
            (None, Some(last)) => (ResolutionStatus::Failed, last.error().cloned()),
            (Some(index), Some(last)) if index + 1 == hops.len() => {
                if last.is_complete() {
                    (ResolutionStatus::Success, None)
                } else {
                    (
                        ResolutionStatus::Partial,
                        Some(WhoisTraceError::timeout(&last.server, self.config.timeout)),
                    )
                }
            }
            (Some(_), Some(last)) => (ResolutionStatus::Partial, last.error().cloned()),
        };

        let raw = last_with_data.and_then(|i| hops[i].text()).map(str::to_string);

        Resolution {
            domain: domain.to_string(),
            status,
            hops,
            raw,
            error,
            stop_reason,
            elapsed_ms: 0,
        }
    }
}

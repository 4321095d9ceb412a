//! Text-mode display logic for the whois-trace CLI.
//!
//! This module handles the human-readable output: the banner, one block per
//! resolution (server chain, status, notes, raw text) and the batch summary.
//! Uses only the `console` crate.

use console::{style, StyledObject};
use std::time::Duration;
use whois_trace_lib::{ErrorKind, Hop, Resolution, ResolutionStatus, WhoisTraceError};

const RULE_WIDTH: usize = 60;

// ── Banner ───────────────────────────────────────────────────────────────────

/// Print a styled banner at the start of a text run.
pub fn print_banner(domain_count: usize, concurrency: usize, transport: &str) {
    println!(
        "{} {} {}",
        style("whois-trace").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "| Tracing {} domain{}",
            domain_count,
            plural(domain_count)
        ))
        .dim(),
    );

    let mut meta_parts = vec![format!("Backend: {}", transport)];
    if domain_count > 1 {
        meta_parts.push(format!("Concurrency: {}", concurrency));
    }
    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── One resolution ───────────────────────────────────────────────────────────

/// Print one resolution: header, chain, status, note and the raw text.
pub fn print_resolution(resolution: &Resolution, verbose: bool) {
    println!(
        "{} {} {}",
        style("──").dim(),
        style(&resolution.domain).bold(),
        style("─".repeat(RULE_WIDTH.saturating_sub(resolution.domain.len() + 4))).dim(),
    );

    if !resolution.hops.is_empty() {
        println!("  {} {}", style("Servers:").dim(), format_chain(resolution));
    }
    println!(
        "  {} {}",
        style("Status: ").dim(),
        status_label(resolution.status)
    );

    if let Some(note) = resolution_note(resolution) {
        println!("  {} {}", style("Note:   ").dim(), style(note).yellow());
    }

    if verbose {
        for hop in &resolution.hops {
            println!(
                "    {} {}:{} in {}ms",
                style("└─").dim(),
                hop.server,
                hop.port,
                hop.elapsed_ms,
            );
        }
    }

    let sections = hop_sections(resolution);
    if sections.len() > 1 {
        // Registry and referral answers each under their own server
        for (heading, text) in sections {
            println!();
            println!("  {}", style(format!("── {} ──", heading)).cyan());
            println!("{}", text.trim_end());
        }
    } else if let Some(raw) = &resolution.raw {
        println!();
        println!("{}", raw.trim_end());
    }
    println!();
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(
    total: usize,
    success: usize,
    partial: usize,
    failed: usize,
    duration: Duration,
) {
    println!("  {}", style("─".repeat(RULE_WIDTH - 8)).dim());
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        plural(total),
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} resolved", success)).green(),
        style("|").dim(),
        style(format!("{} partial", partial)).yellow(),
        style("|").dim(),
        style(format!("{} failed", failed)).red(),
    );
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Servers in contact order, failed hops marked.
pub fn format_chain(resolution: &Resolution) -> String {
    resolution
        .hops
        .iter()
        .map(|hop| {
            if hop.error().is_some() {
                format!("{} (failed)", hop.server)
            } else if !hop.is_complete() {
                format!("{} (truncated)", hop.server)
            } else {
                hop.server.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Heading and text for every hop that returned data, in contact order.
pub fn hop_sections(resolution: &Resolution) -> Vec<(String, &str)> {
    resolution
        .hops
        .iter()
        .enumerate()
        .filter_map(|(index, hop)| hop.text().map(|text| (section_heading(index, hop), text)))
        .collect()
}

fn section_heading(index: usize, hop: &Hop) -> String {
    let role = if index == 0 { "" } else { " (referral)" };
    let truncated = if hop.is_complete() { "" } else { " (truncated)" };
    format!("{}{}{}", hop.server, role, truncated)
}

fn status_label(status: ResolutionStatus) -> StyledObject<&'static str> {
    match status {
        ResolutionStatus::Success => style("RESOLVED").green().bold(),
        ResolutionStatus::Partial => style("PARTIAL").yellow().bold(),
        ResolutionStatus::Failed => style("FAILED").red().bold(),
    }
}

/// Why the result is not a clean success, or why the chain stopped early.
pub fn resolution_note(resolution: &Resolution) -> Option<String> {
    if let Some(error) = &resolution.error {
        let detail = format!("{} {}", brief_error(error), error);
        return Some(match resolution.failed_hop() {
            Some(hop) if resolution.status == ResolutionStatus::Partial => {
                format!("showing data from before {} failed: {}", hop.server, detail)
            }
            _ => detail,
        });
    }

    // Clean stops that still cut the chain short carry their own error kind
    let error = resolution.stop_reason.as_error()?;
    Some(format!("{} {}, stopped", brief_error(&error), error))
}

/// Short category tag for an error.
fn brief_error(error: &WhoisTraceError) -> &'static str {
    match error.kind() {
        ErrorKind::InvalidDomain => "(invalid domain)",
        ErrorKind::NoServerFound => "(unknown suffix)",
        ErrorKind::ConnectionError => "(network error)",
        ErrorKind::Timeout => "(timeout)",
        ErrorKind::DeadlineExceeded => "(deadline)",
        ErrorKind::ReferralCycle => "(referral loop)",
        ErrorKind::MaxHopsExceeded => "(hop limit)",
        _ => "(error)",
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

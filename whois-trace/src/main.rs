//! whois-trace CLI Application
//!
//! A command-line interface that finds the authoritative WHOIS server for
//! each domain, follows referrals and prints the final response. This CLI
//! application is a thin layer over the whois-trace-lib library.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use futures::StreamExt;
use serde::Serialize;
use std::process;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use whois_trace_lib::{
    load_env_config, parse_timeout_string, ConfigManager, FileConfig, ReferralRules, Resolution,
    ResolutionStatus, ServerDirectory, TraceConfig, TransportKind, WhoisResolver,
    MAX_HOPS_LIMIT,
};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for whois-trace
#[derive(Parser, Debug)]
#[command(name = "whois-trace")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Sai Dutt G.V <gvs46@protonmail.com>")]
#[command(about = "Find the authoritative WHOIS server for a domain and follow referrals")]
#[command(
    long_about = "Find the authoritative WHOIS server for a domain, query it over port 43 and follow registrar referrals.\n\nSupports batches with bounded concurrency, config files, and text or JSON output."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domain names to resolve
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Input file with domains (one per line, # for comments)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub file: Option<String>,

    /// Query this server first instead of the built-in directory
    #[arg(
        short = 's',
        long = "server",
        value_name = "HOST",
        help_heading = "Query"
    )]
    pub server: Option<String>,

    /// Port for the first server (default: 43)
    #[arg(short = 'p', long = "port", value_name = "PORT", help_heading = "Query")]
    pub port: Option<u16>,

    /// Per-server timeout, e.g. 8s, 500ms, 2m (default: 8s)
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "DURATION",
        help_heading = "Query"
    )]
    pub timeout: Option<String>,

    /// Stop at the first server, do not follow referrals
    #[arg(long = "no-referral", help_heading = "Query")]
    pub no_referral: bool,

    /// Maximum number of servers queried per domain (default: 5, max: 20)
    #[arg(long = "max-hops", value_name = "N", help_heading = "Query")]
    pub max_hops: Option<usize>,

    /// Ask whois.iana.org for suffixes missing from the directory
    #[arg(long = "iana", help_heading = "Query")]
    pub iana: bool,

    /// How to talk to WHOIS servers
    #[arg(
        long = "backend",
        value_name = "BACKEND",
        value_parser = ["socket", "system", "auto"],
        help_heading = "Query"
    )]
    pub backend: Option<String>,

    /// Max concurrent resolutions (default: 4, max: 100)
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub concurrency: Option<usize>,

    /// Budget for the whole run; no new query starts after it
    #[arg(long = "deadline", value_name = "DURATION", help_heading = "Performance")]
    pub deadline: Option<String>,

    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FORMAT",
        value_parser = ["text", "json"],
        help_heading = "Output Format"
    )]
    pub output: Option<String>,

    /// Print only the raw WHOIS text
    #[arg(short = 'q', long = "quiet", help_heading = "Output Format")]
    pub quiet: bool,

    /// Do not print the banner
    #[arg(long = "no-banner", help_heading = "Output Format")]
    pub no_banner: bool,

    /// List the suffix → server directory and exit
    #[arg(long = "list-servers", help_heading = "Output Format")]
    pub list_servers: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Debug logging on stderr
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Everything a run needs after config files, environment and flags are merged.
struct RunSettings {
    trace: TraceConfig,
    directory: ServerDirectory,
    rules: ReferralRules,
    output: OutputFormat,
}

/// One JSON output record.
#[derive(Serialize)]
struct JsonRecord<'a> {
    input: &'a str,
    #[serde(flatten)]
    resolution: &'a Resolution,
    servers: Vec<&'a str>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(args.verbose);

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

/// Install the tracing subscriber on stderr so stdout stays clean.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("whois_trace=debug,whois_trace_lib=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn validate_args(args: &Args) -> Result<(), String> {
    // --list-servers is self-contained, skip other validation
    if args.list_servers {
        return Ok(());
    }

    if args.domains.is_empty() && args.file.is_none() {
        return Err("You must specify domain names or a file with --file".to_string());
    }

    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > 100 {
            return Err("Concurrency must be between 1 and 100".to_string());
        }
    }

    if let Some(max_hops) = args.max_hops {
        if max_hops == 0 || max_hops > MAX_HOPS_LIMIT {
            return Err(format!("--max-hops must be between 1 and {}", MAX_HOPS_LIMIT));
        }
    }

    if args.port == Some(0) {
        return Err("Port must be between 1 and 65535".to_string());
    }

    if let Some(server) = &args.server {
        if server.trim().is_empty() {
            return Err("--server cannot be empty".to_string());
        }
    }

    if args.quiet && args.output.as_deref() == Some("json") {
        return Err("Cannot combine --quiet with --output json".to_string());
    }

    Ok(())
}

async fn run(args: Args) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = build_settings(&args)?;

    if args.list_servers {
        print_servers(&settings.directory);
        return Ok(0);
    }

    let domains = collect_domains(&args)?;

    let resolver = WhoisResolver::builder(settings.trace.clone())
        .directory(settings.directory)
        .referral_rules(settings.rules)
        .build()
        .await;

    let any_failed = match settings.output {
        OutputFormat::Json => run_json(&resolver, &domains).await?,
        OutputFormat::Text => run_text(&resolver, &domains, &args).await,
    };

    Ok(if any_failed { 1 } else { 0 })
}

/// Resolve everything, then print one pretty JSON array.
async fn run_json(
    resolver: &WhoisResolver,
    domains: &[String],
) -> Result<bool, Box<dyn std::error::Error>> {
    let batch = resolver.resolve_batch(domains).await;

    let records: Vec<JsonRecord> = batch
        .iter()
        .map(|entry| JsonRecord {
            input: &entry.input,
            resolution: &entry.resolution,
            servers: entry.resolution.servers(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(batch.any_failed())
}

/// Print each resolution as soon as it and everything before it is done.
async fn run_text(resolver: &WhoisResolver, domains: &[String], args: &Args) -> bool {
    let started = Instant::now();

    if !args.quiet && !args.no_banner {
        ui::print_banner(
            domains.len(),
            resolver.config().concurrency,
            resolver.transport_name(),
        );
    }

    let (mut success, mut partial, mut failed) = (0usize, 0usize, 0usize);
    let mut stream = resolver.resolve_stream(domains);

    while let Some(entry) = stream.next().await {
        let resolution = &entry.resolution;
        match resolution.status {
            ResolutionStatus::Success => success += 1,
            ResolutionStatus::Partial => partial += 1,
            ResolutionStatus::Failed => failed += 1,
        }

        if args.quiet {
            print_quiet(resolution);
        } else {
            ui::print_resolution(resolution, args.verbose);
        }
    }

    if !args.quiet && domains.len() > 1 {
        ui::print_summary(domains.len(), success, partial, failed, started.elapsed());
    }

    failed > 0
}

fn print_quiet(resolution: &Resolution) {
    if let Some(raw) = &resolution.raw {
        println!("{}", raw.trim_end());
    }
    if let Some(error) = &resolution.error {
        eprintln!("Error: {}: {}", resolution.domain, error);
    }
}

fn print_servers(directory: &ServerDirectory) {
    use console::Style;

    let heading = Style::new().yellow().bold();
    println!("{}", heading.apply_to(format!("{} known suffixes:", directory.len())));
    for (suffix, server) in directory.entries() {
        println!("  {:<12} {}", suffix, server);
    }
}

/// Merge built-in defaults, config files, WT_* variables and flags, in that
/// order of increasing precedence.
fn build_settings(args: &Args) -> Result<RunSettings, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config();

    // Step 1: Config file (explicit --config, then WT_CONFIG, then discovery)
    let file_config = if let Some(explicit_config_path) = &args.config {
        tracing::debug!(path = %explicit_config_path, "using config file from --config");
        config_manager
            .load_file(explicit_config_path)
            .map_err(|e| format!("Failed to load config file '{}': {}", explicit_config_path, e))?
    } else if let Some(env_config_path) = &env_config.config {
        tracing::debug!(path = %env_config_path, "using config file from WT_CONFIG");
        config_manager
            .load_file(env_config_path)
            .map_err(|e| format!("Failed to load config file '{}': {}", env_config_path, e))?
    } else {
        config_manager.discover_and_load()?
    };

    let mut trace = TraceConfig::default();
    let mut output = OutputFormat::Text;

    apply_file_config(&mut trace, &mut output, &file_config)?;

    // Step 2: Environment variables (WT_*), already validated by the library
    if let Some(server) = &env_config.server {
        trace = trace.with_server(server.as_str());
    }
    if let Some(port) = env_config.port {
        trace = trace.with_port(port);
    }
    if let Some(timeout) = env_config.timeout.as_deref().and_then(parse_timeout_string) {
        trace = trace.with_timeout(timeout);
    }
    if let Some(no_referral) = env_config.no_referral {
        trace = trace.with_follow_referrals(!no_referral);
    }
    if let Some(max_hops) = env_config.max_hops {
        trace = trace.with_max_hops(max_hops);
    }
    if let Some(concurrency) = env_config.concurrency {
        trace = trace.with_concurrency(concurrency);
    }
    if let Some(iana) = env_config.iana {
        trace = trace.with_iana_discovery(iana);
    }
    if let Some(backend) = &env_config.backend {
        trace = trace.with_transport(backend.parse::<TransportKind>()?);
    }
    if let Some(format) = env_config.output.as_deref().and_then(OutputFormat::parse) {
        output = format;
    }

    // Step 3: CLI arguments (highest precedence)
    // Boolean flags only override when actually passed
    if let Some(server) = &args.server {
        trace = trace.with_server(server.as_str());
    }
    if let Some(port) = args.port {
        trace = trace.with_port(port);
    }
    if let Some(timeout) = &args.timeout {
        trace = trace.with_timeout(parse_duration_arg("--timeout", timeout)?);
    }
    if args.no_referral {
        trace = trace.with_follow_referrals(false);
    }
    if let Some(max_hops) = args.max_hops {
        trace = trace.with_max_hops(max_hops);
    }
    if let Some(concurrency) = args.concurrency {
        trace = trace.with_concurrency(concurrency);
    }
    if args.iana {
        trace = trace.with_iana_discovery(true);
    }
    if let Some(backend) = &args.backend {
        trace = trace.with_transport(backend.parse::<TransportKind>()?);
    }
    if let Some(format) = args.output.as_deref().and_then(OutputFormat::parse) {
        output = format;
    }

    // JSON may come from a config file or WT_OUTPUT, not only from -o
    if args.quiet && !args.list_servers && output == OutputFormat::Json {
        return Err("Cannot combine --quiet with JSON output (set by -o, config file or WT_OUTPUT)".into());
    }

    // The deadline clock starts once configuration is settled
    if let Some(deadline) = &args.deadline {
        trace = trace.with_deadline_in(parse_duration_arg("--deadline", deadline)?);
    }

    Ok(RunSettings {
        trace,
        directory: file_config.directory(),
        rules: file_config.referral_rules(),
        output,
    })
}

/// Apply `[defaults]` from the merged config files.
fn apply_file_config(
    trace: &mut TraceConfig,
    output: &mut OutputFormat,
    file_config: &FileConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(defaults) = &file_config.defaults else {
        return Ok(());
    };

    let mut config = trace.clone();
    if let Some(server) = &defaults.server {
        config = config.with_server(server.as_str());
    }
    if let Some(port) = defaults.port {
        config = config.with_port(port);
    }
    if let Some(timeout) = &defaults.timeout {
        config = config.with_timeout(parse_duration_arg("timeout", timeout)?);
    }
    if let Some(follow) = defaults.follow_referrals {
        config = config.with_follow_referrals(follow);
    }
    if let Some(max_hops) = defaults.max_hops {
        config = config.with_max_hops(max_hops);
    }
    if let Some(concurrency) = defaults.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(iana) = defaults.iana_discovery {
        config = config.with_iana_discovery(iana);
    }
    if let Some(backend) = &defaults.backend {
        config = config.with_transport(backend.parse::<TransportKind>()?);
    }
    if let Some(format) = defaults.output.as_deref().and_then(OutputFormat::parse) {
        *output = format;
    }

    *trace = config;
    Ok(())
}

fn parse_duration_arg(name: &str, value: &str) -> Result<Duration, String> {
    parse_timeout_string(value).ok_or_else(|| {
        format!(
            "Invalid {} '{}'. Use format like '500ms', '8s', '2m'",
            name, value
        )
    })
}

/// Domains from positional arguments followed by those from --file.
fn collect_domains(args: &Args) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut domains: Vec<String> = args
        .domains
        .iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();

    if let Some(file_path) = &args.file {
        domains.extend(read_domains_from_file(file_path)?);
    }

    if domains.is_empty() {
        return Err("No domains to resolve".into());
    }

    Ok(domains)
}

/// Read one domain per line, skipping blank lines and `#` comments.
fn read_domains_from_file(file_path: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};
    use std::path::Path;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {}", file_path).into());
    }

    let file = File::open(path).map_err(|e| format!("Cannot open {}: {}", file_path, e))?;
    let reader = BufReader::new(file);
    let mut domains = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("{}:{}: {}", file_path, index + 1, e))?;
        let trimmed = line.trim();

        // Skip empty lines and comments
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        // Handle inline comments
        let domain_part = trimmed.split('#').next().unwrap_or("").trim();
        if domain_part.is_empty() {
            continue;
        }

        domains.push(domain_part.to_string());
    }

    if domains.is_empty() {
        return Err(format!("No domains found in {}", file_path).into());
    }

    tracing::debug!(count = domains.len(), path = %file_path, "read domains from file");
    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("whois-trace").chain(argv.iter().copied()))
    }

    #[test]
    fn test_validate_requires_input() {
        assert!(validate_args(&parse(&[])).is_err());
        assert!(validate_args(&parse(&["example.com"])).is_ok());
        assert!(validate_args(&parse(&["--list-servers"])).is_ok());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(validate_args(&parse(&["example.com", "-c", "0"])).is_err());
        assert!(validate_args(&parse(&["example.com", "-c", "101"])).is_err());
        assert!(validate_args(&parse(&["example.com", "--max-hops", "21"])).is_err());
        assert!(validate_args(&parse(&["example.com", "-p", "0"])).is_err());
        assert!(validate_args(&parse(&["example.com", "-q", "-o", "json"])).is_err());
    }

    #[test]
    fn test_backend_value_is_checked_by_clap() {
        let result = Args::try_parse_from(["whois-trace", "example.com", "--backend", "telnet"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_flags_reach_trace_config() {
        let args = parse(&[
            "example.com",
            "--config",
            "/nonexistent/ignored.toml",
        ]);
        // An explicit config file that does not exist is an error
        assert!(build_settings(&args).is_err());

        let mut config_file = NamedTempFile::new().unwrap();
        writeln!(config_file, "[defaults]\ntimeout = \"3s\"\nmax_hops = 2\noutput = \"json\"").unwrap();
        let path = config_file.path().to_string_lossy().to_string();

        let args = parse(&[
            "example.com",
            "--config",
            path.as_str(),
            "-s",
            "Whois.Example.Net",
            "-p",
            "4343",
            "--max-hops",
            "7",
            "--no-referral",
            "-o",
            "text",
        ]);
        let settings = build_settings(&args).unwrap();

        assert_eq!(settings.trace.server.as_deref(), Some("whois.example.net"));
        assert_eq!(settings.trace.port, 4343);
        // file value survives where the CLI is silent
        assert_eq!(settings.trace.timeout, Duration::from_secs(3));
        // CLI wins where both speak
        assert_eq!(settings.trace.max_hops, 7);
        assert!(!settings.trace.follow_referrals);
        assert_eq!(settings.output, OutputFormat::Text);
    }

    #[test]
    fn test_quiet_conflicts_with_json_from_config_file() {
        let mut config_file = NamedTempFile::new().unwrap();
        writeln!(config_file, "[defaults]\noutput = \"json\"").unwrap();
        let path = config_file.path().to_string_lossy().to_string();

        let args = parse(&["example.com", "-q", "--config", path.as_str()]);
        assert!(validate_args(&args).is_ok());
        let err = build_settings(&args).err().unwrap();
        assert!(err.to_string().contains("Cannot combine --quiet"));

        // An explicit -o text wins over the file and lifts the conflict
        let args = parse(&["example.com", "-q", "-o", "text", "--config", path.as_str()]);
        assert!(build_settings(&args).is_ok());
    }

    #[test]
    fn test_invalid_timeout_flag() {
        let args = parse(&["example.com", "-t", "soon"]);
        assert!(build_settings(&args).is_err());
    }

    #[test]
    fn test_read_domains_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# registry test list").unwrap();
        writeln!(file, "example.com").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  example.org   # inline comment").unwrap();
        writeln!(file, "   ").unwrap();
        writeln!(file, "bad domain").unwrap();

        let domains = read_domains_from_file(&file.path().to_string_lossy()).unwrap();
        assert_eq!(domains, vec!["example.com", "example.org", "bad domain"]);
    }

    #[test]
    fn test_read_domains_missing_or_empty_file() {
        assert!(read_domains_from_file("/nonexistent/domains.txt").is_err());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# nothing here").unwrap();
        assert!(read_domains_from_file(&file.path().to_string_lossy()).is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("csv"), None);
    }
}

//! WHOIS transport backed by the system's `whois` command.
//!
//! This backend hands the exchange to the host's `whois` tool, which some
//! environments prefer (corporate proxies, patched server lists). Only the
//! single targeted query is delegated; referral chasing stays with the
//! resolver so hops are recorded the same way for both backends.
//!
//! Output is read as it arrives under the same single deadline as the socket
//! transport, so text printed before a timeout comes back as a truncated
//! response instead of being lost.

use super::socket::MAX_RESPONSE_SIZE;
use super::WhoisTransport;
use crate::error::WhoisTraceError;
use crate::types::{QueryTarget, RawResponse};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

const READ_CHUNK: usize = 4096;

/// Transport that runs `whois -h <host> -p <port> <query>`.
///
/// Some host clients (the common Linux `whois` among them) chase thin-registry
/// referrals on their own, even with `-h`, and there is no portable flag to
/// stop them. A hop from this transport may therefore already include the
/// registrar's answer after the registry's, and the resolver still queries
/// the registrar itself as the next hop. Use the socket backend when each hop
/// must hold exactly one server's text.
#[derive(Debug, Clone)]
pub struct SystemWhoisTransport {
    program: String,
}

impl SystemWhoisTransport {
    pub fn new() -> Self {
        Self {
            program: "whois".to_string(),
        }
    }

    /// Use a different executable (absolute path or name on `PATH`).
    pub fn with_program<P: Into<String>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, target: &QueryTarget, query_line: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-h")
            .arg(&target.host)
            .arg("-p")
            .arg(target.port.to_string())
            .arg(query_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Default for SystemWhoisTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhoisTransport for SystemWhoisTransport {
    async fn query(
        &self,
        target: &QueryTarget,
        query_line: &str,
    ) -> Result<RawResponse, WhoisTraceError> {
        let deadline = Instant::now() + target.timeout;
        let server = target.host.as_str();

        let mut child = self.command(target, query_line).spawn().map_err(|e| {
            WhoisTraceError::connection(
                server,
                format!(
                    "Failed to execute {} command: {}. Make sure 'whois' is installed.",
                    self.program, e
                ),
            )
        })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| WhoisTraceError::internal("child stdout was not captured"))?;
        // stderr drains on its own task while stdout is read here
        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });

        let mut response = Vec::new();
        let mut buf = [0u8; READ_CHUNK];

        // kill_on_drop reaps the child on every early return below
        loop {
            match timeout_at(deadline, stdout.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    response.extend_from_slice(&buf[..n]);
                    if response.len() >= MAX_RESPONSE_SIZE {
                        warn!(server = %server, limit = MAX_RESPONSE_SIZE, "response too large, truncating");
                        response.truncate(MAX_RESPONSE_SIZE);
                        return Ok(RawResponse::truncated(decode(&response)));
                    }
                }
                Ok(Err(e)) => {
                    if response.is_empty() {
                        return Err(WhoisTraceError::connection(
                            server,
                            format!("Failed to read {} output: {}", self.program, e),
                        ));
                    }
                    debug!(server = %server, error = %e, "read error after partial data");
                    return Ok(RawResponse::truncated(decode(&response)));
                }
                Err(_) => {
                    if response.is_empty() {
                        return Err(WhoisTraceError::timeout(server, target.timeout));
                    }
                    debug!(server = %server, bytes = response.len(), "timed out with partial data");
                    return Ok(RawResponse::truncated(decode(&response)));
                }
            }
        }

        let status = match timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(WhoisTraceError::connection(
                    server,
                    format!("Failed to wait for {}: {}", self.program, e),
                ))
            }
            Err(_) if response.is_empty() => {
                return Err(WhoisTraceError::timeout(server, target.timeout))
            }
            Err(_) => return Ok(RawResponse::truncated(decode(&response))),
        };

        let text = decode(&response);
        if !status.success() && text.trim().is_empty() {
            let stderr = match stderr {
                Some(handle) => handle.await.unwrap_or_default(),
                None => Vec::new(),
            };
            return Err(WhoisTraceError::connection(
                server,
                format!(
                    "{} exited with {}: {}",
                    self.program,
                    status,
                    String::from_utf8_lossy(&stderr).trim()
                ),
            ));
        }

        Ok(RawResponse::complete(text))
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Check if the system has a working whois command.
///
/// Used once at startup when the backend is `auto`.
pub async fn is_whois_available() -> bool {
    match Command::new("whois")
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Get the version of the system's whois command.
///
/// This is useful for debugging and ensuring compatibility.
pub async fn get_whois_version() -> Result<String, WhoisTraceError> {
    let output = Command::new("whois")
        .arg("--version")
        .output()
        .await
        .map_err(|e| WhoisTraceError::internal(format!("Failed to get whois version: {}", e)))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Ok("Unknown whois version".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;

    #[test]
    fn test_command_arguments() {
        let transport = SystemWhoisTransport::new();
        let target = QueryTarget::new("whois.verisign-grs.com", 4343, Duration::from_secs(1));
        let command = transport.command(&target, "example.com");
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["-h", "whois.verisign-grs.com", "-p", "4343", "example.com"]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_connection_error() {
        let transport = SystemWhoisTransport::with_program("whois-trace-definitely-missing-binary");
        let target = QueryTarget::new("whois.example.com", 43, Duration::from_secs(2));

        let err = transport.query(&target, "example.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionError);
    }

    #[tokio::test]
    async fn test_auto_selection_matches_availability() {
        let transport = crate::protocols::select_transport(crate::types::TransportKind::Auto).await;
        let expected = if is_whois_available().await {
            "system"
        } else {
            "socket"
        };
        assert_eq!(transport.name(), expected);
    }

    /// Write an executable shell script standing in for `whois`.
    #[cfg(unix)]
    fn fake_whois(dir: &tempfile::TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("whois");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_before_timeout_is_kept() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = fake_whois(
            &dir,
            "printf 'Domain Name: EXAMPLE.COM\\nRegistrar: Example Registrar\\n'\nexec sleep 5",
        );
        let transport = SystemWhoisTransport::with_program(program);
        let target = QueryTarget::new("whois.verisign-grs.com", 43, Duration::from_millis(500));

        let response = transport.query(&target, "example.com").await.unwrap();
        assert!(!response.complete);
        assert!(response.text.contains("Domain Name: EXAMPLE.COM"));
        assert!(response.text.contains("Registrar: Example Registrar"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_program_times_out() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = fake_whois(&dir, "exec sleep 5");
        let transport = SystemWhoisTransport::with_program(program);
        let target = QueryTarget::new("whois.verisign-grs.com", 43, Duration::from_millis(300));

        let err = transport.query(&target, "example.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finished_program_is_complete() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = fake_whois(&dir, "echo \"query for $5 via $2:$4\"");
        let transport = SystemWhoisTransport::with_program(program);
        let target = QueryTarget::new("whois.nic.test", 4343, Duration::from_secs(5));

        let response = transport.query(&target, "example.test").await.unwrap();
        assert!(response.complete);
        assert_eq!(response.text, "query for example.test via whois.nic.test:4343\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_program_without_output_is_connection_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let program = fake_whois(&dir, "echo 'no route' >&2\nexit 2");
        let transport = SystemWhoisTransport::with_program(program);
        let target = QueryTarget::new("whois.nic.test", 43, Duration::from_secs(5));

        let err = transport.query(&target, "example.test").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionError);
        assert!(err.to_string().contains("no route"));
    }
}

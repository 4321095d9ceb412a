//! Raw port-43 WHOIS client.
//!
//! Connects, writes one CRLF-terminated query line, half-closes the
//! connection and reads until the server hangs up. The whole exchange shares
//! a single deadline so no step can block past the configured timeout.

use super::WhoisTransport;
use crate::error::WhoisTraceError;
use crate::types::{QueryTarget, RawResponse};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

/// Responses larger than this are cut off and reported as truncated.
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB

const READ_CHUNK: usize = 4096;

/// WHOIS transport speaking the protocol over a plain TCP socket.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    max_response_size: usize,
}

impl SocketTransport {
    pub fn new() -> Self {
        Self {
            max_response_size: MAX_RESPONSE_SIZE,
        }
    }

    /// Override the response size cap.
    pub fn with_max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes.max(1);
        self
    }
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WhoisTransport for SocketTransport {
    async fn query(
        &self,
        target: &QueryTarget,
        query_line: &str,
    ) -> Result<RawResponse, WhoisTraceError> {
        let deadline = Instant::now() + target.timeout;
        let server = target.host.as_str();

        let mut stream = match timeout_at(deadline, TcpStream::connect((server, target.port))).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(WhoisTraceError::connection(server, e.to_string())),
            Err(_) => return Err(WhoisTraceError::timeout(server, target.timeout)),
        };

        let line = format!("{}\r\n", query_line);
        match timeout_at(deadline, stream.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(WhoisTraceError::connection(
                    server,
                    format!("Failed to send query: {}", e),
                ))
            }
            Err(_) => return Err(WhoisTraceError::timeout(server, target.timeout)),
        }

        // Half-close: nothing more will be sent on this direction
        if let Ok(Err(e)) = timeout_at(deadline, stream.shutdown()).await {
            debug!(server = %server, error = %e, "write shutdown failed");
        }

        let mut response = Vec::new();
        let mut buf = [0u8; READ_CHUNK];

        loop {
            match timeout_at(deadline, stream.read(&mut buf)).await {
                Ok(Ok(0)) => return Ok(RawResponse::complete(decode(&response))),
                Ok(Ok(n)) => {
                    response.extend_from_slice(&buf[..n]);
                    if response.len() >= self.max_response_size {
                        warn!(server = %server, limit = self.max_response_size, "response too large, truncating");
                        response.truncate(self.max_response_size);
                        return Ok(RawResponse::truncated(decode(&response)));
                    }
                }
                Ok(Err(e)) => {
                    if response.is_empty() {
                        return Err(WhoisTraceError::connection(
                            server,
                            format!("Read error: {}", e),
                        ));
                    }
                    debug!(server = %server, error = %e, "read error after partial data");
                    return Ok(RawResponse::truncated(decode(&response)));
                }
                Err(_) => {
                    // Timeout on read - if we have data, return it
                    if response.is_empty() {
                        return Err(WhoisTraceError::timeout(server, target.timeout));
                    }
                    debug!(server = %server, bytes = response.len(), "timed out with partial data");
                    return Ok(RawResponse::truncated(decode(&response)));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "socket"
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    /// Accept one connection, read the query line, send `reply` and
    /// optionally keep the socket open for `linger` before closing.
    async fn serve_once(reply: &'static str, linger: Duration) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let mut socket = reader.into_inner();
            socket.write_all(reply.as_bytes()).await.unwrap();
            tokio::time::sleep(linger).await;
            line
        });
        (port, handle)
    }

    fn target(port: u16, timeout: Duration) -> QueryTarget {
        QueryTarget::new("127.0.0.1", port, timeout)
    }

    #[tokio::test]
    async fn test_complete_response() {
        let (port, server) = serve_once("Domain Name: EXAMPLE.COM\r\n", Duration::ZERO).await;
        let transport = SocketTransport::new();

        let response = transport
            .query(&target(port, Duration::from_secs(2)), "example.com")
            .await
            .unwrap();

        assert!(response.complete);
        assert_eq!(response.text, "Domain Name: EXAMPLE.COM\r\n");
        assert_eq!(server.await.unwrap(), "example.com\r\n");
    }

    #[tokio::test]
    async fn test_partial_data_on_timeout_is_kept() {
        let (port, _server) = serve_once("partial line", Duration::from_secs(3)).await;
        let transport = SocketTransport::new();

        let response = transport
            .query(&target(port, Duration::from_millis(300)), "example.com")
            .await
            .unwrap();

        assert!(!response.complete);
        assert_eq!(response.text, "partial line");
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let (port, _server) = serve_once("", Duration::from_secs(3)).await;
        let transport = SocketTransport::new();

        let err = transport
            .query(&target(port, Duration::from_millis(300)), "example.com")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = SocketTransport::new()
            .query(&target(port, Duration::from_secs(2)), "example.com")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConnectionError);
    }

    #[tokio::test]
    async fn test_size_cap_truncates() {
        let (port, _server) = serve_once("0123456789abcdef", Duration::ZERO).await;
        let transport = SocketTransport::new().with_max_response_size(10);

        let response = transport
            .query(&target(port, Duration::from_secs(2)), "example.com")
            .await
            .unwrap();

        assert!(!response.complete);
        assert_eq!(response.text, "0123456789");
    }

    #[test]
    fn test_decode_is_lossy() {
        assert_eq!(decode(b"caf\xc3\xa9"), "café");
        assert_eq!(decode(b"bad \xff byte"), "bad \u{fffd} byte");
    }
}

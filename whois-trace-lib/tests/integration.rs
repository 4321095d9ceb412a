// whois-trace-lib/tests/integration.rs

//! Integration tests for whois-trace-lib exports and core functionality

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use whois_trace_lib::{
    ErrorKind, QueryTarget, RawResponse, ResolutionStatus, ServerDirectory, SocketTransport,
    StopReason, TraceConfig, WhoisResolver, WhoisTraceError, WhoisTransport,
};

/// In-memory WHOIS network: host → response.
#[derive(Default)]
struct FakeNetwork {
    hosts: HashMap<String, String>,
    contacted: Mutex<Vec<String>>,
}

impl FakeNetwork {
    fn host(mut self, name: &str, response: &str) -> Self {
        self.hosts.insert(name.to_string(), response.to_string());
        self
    }

    fn contacted(&self) -> Vec<String> {
        self.contacted.lock().unwrap().clone()
    }
}

#[async_trait]
impl WhoisTransport for FakeNetwork {
    async fn query(
        &self,
        target: &QueryTarget,
        _query_line: &str,
    ) -> Result<RawResponse, WhoisTraceError> {
        self.contacted.lock().unwrap().push(target.host.clone());
        match self.hosts.get(&target.host) {
            Some(text) => Ok(RawResponse::complete(text.clone())),
            None => Err(WhoisTraceError::connection(&target.host, "no route to host")),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

async fn resolver_for(config: TraceConfig, network: Arc<FakeNetwork>) -> WhoisResolver {
    WhoisResolver::builder(config)
        .directory(ServerDirectory::from_entries([
            ("com", "whois.registry.test"),
            ("aa", "whois.a.test"),
            ("bb", "whois.b.test"),
            ("cc", "whois.c.test"),
        ]))
        .transport(network)
        .build()
        .await
}

#[test]
fn test_builtin_directory_longest_suffix() {
    let directory = ServerDirectory::builtin();
    assert_eq!(directory.lookup("google.com"), Some("whois.verisign-grs.com"));
    assert_eq!(directory.lookup("ox.ac.uk"), Some("whois.ja.net"));
    assert_eq!(directory.lookup("bbc.co.uk"), Some("whois.nic.uk"));
    assert!(directory.suffixes().contains(&"ac.uk"));
}

#[tokio::test]
async fn test_three_level_referral_chain() {
    let network = Arc::new(
        FakeNetwork::default()
            .host(
                "whois.registry.test",
                "Domain Name: EXAMPLE.COM\r\nRegistrar WHOIS Server: whois.registrar.test\r\n",
            )
            .host(
                "whois.registrar.test",
                "Domain Name: example.com\r\nReferralServer: rwhois://whois.reseller.test:4321/\r\n",
            )
            .host("whois.reseller.test", "Registrant Name: Example Holder\r\n"),
    );
    let resolver = resolver_for(TraceConfig::default(), network.clone()).await;

    let resolution = resolver.resolve("Example.COM.").await;

    assert_eq!(resolution.status, ResolutionStatus::Success);
    assert_eq!(
        resolution.servers(),
        vec![
            "whois.registry.test",
            "whois.registrar.test",
            "whois.reseller.test"
        ]
    );
    assert_eq!(network.contacted(), resolution.servers());
    assert!(resolution.raw.unwrap().contains("Example Holder"));
}

#[tokio::test]
async fn test_resolution_json_shape() {
    let network = Arc::new(FakeNetwork::default().host("whois.registry.test", "plain data"));
    let resolver = resolver_for(TraceConfig::default(), network).await;

    let resolution = resolver.resolve("example.com").await;
    let json = serde_json::to_value(&resolution).unwrap();

    assert_eq!(json["domain"], "example.com");
    assert_eq!(json["status"], "success");
    assert_eq!(json["raw"], "plain data");
    assert_eq!(json["stop_reason"]["reason"], "no_referral");
    assert_eq!(json["hops"][0]["server"], "whois.registry.test");
    assert_eq!(json["hops"][0]["outcome"], "response");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_failed_resolution_json_has_error_kind() {
    let network = Arc::new(FakeNetwork::default());
    let resolver = resolver_for(TraceConfig::default(), network).await;

    let json = serde_json::to_value(resolver.resolve("example.com").await).unwrap();

    assert_eq!(json["status"], "failed");
    assert_eq!(json["error"]["kind"], "connection_error");
    assert!(json["error"]["message"].as_str().unwrap().contains("no route"));
}

#[tokio::test]
async fn test_batch_order_and_isolation_any_concurrency() {
    let network = Arc::new(
        FakeNetwork::default()
            .host("whois.a.test", "A")
            .host("whois.c.test", "C"),
    );
    let domains: Vec<String> = ["one.aa", "two.bb", "three.cc", "not a domain"]
        .iter()
        .map(|d| d.to_string())
        .collect();

    for concurrency in [1, 2, 8] {
        let config = TraceConfig::default().with_concurrency(concurrency);
        let resolver = resolver_for(config, network.clone()).await;
        let batch = resolver.resolve_batch(&domains).await;

        let summary: Vec<(&str, ResolutionStatus)> = batch
            .iter()
            .map(|e| (e.input.as_str(), e.resolution.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("one.aa", ResolutionStatus::Success),
                ("two.bb", ResolutionStatus::Failed),
                ("three.cc", ResolutionStatus::Success),
                ("not a domain", ResolutionStatus::Failed),
            ]
        );
        assert_eq!(batch.count(ResolutionStatus::Failed), 2);
    }
}

#[tokio::test]
async fn test_stream_yields_in_input_order() {
    let network = Arc::new(
        FakeNetwork::default()
            .host("whois.a.test", "A")
            .host("whois.b.test", "B"),
    );
    let resolver = resolver_for(TraceConfig::default(), network).await;
    let domains = vec!["x.bb".to_string(), "y.aa".to_string(), "z.bb".to_string()];

    let raws: Vec<Option<String>> = resolver
        .resolve_stream(&domains)
        .map(|entry| entry.resolution.raw)
        .collect()
        .await;

    assert_eq!(
        raws,
        vec![Some("B".to_string()), Some("A".to_string()), Some("B".to_string())]
    );
}

#[tokio::test]
async fn test_batch_after_deadline_makes_no_calls() {
    let network = Arc::new(FakeNetwork::default().host("whois.a.test", "A"));
    let config = TraceConfig::default().with_deadline(Instant::now());
    let resolver = resolver_for(config, network.clone()).await;

    let batch = resolver
        .resolve_batch(&["one.aa".to_string(), "two.aa".to_string()])
        .await;

    assert!(batch.iter().all(|e| {
        e.resolution.is_failed()
            && e.resolution.error.as_ref().map(|err| err.kind()) == Some(ErrorKind::DeadlineExceeded)
    }));
    assert!(network.contacted().is_empty());
}

/// Loopback WHOIS server answering every connection with `reply`, then
/// holding the socket open for `linger`.
async fn loopback_server(reply: &'static str, linger: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut line = String::new();
                let _ = reader.read_line(&mut line).await;
                let mut socket = reader.into_inner();
                let _ = socket.write_all(reply.as_bytes()).await;
                tokio::time::sleep(linger).await;
            });
        }
    });
    port
}

async fn socket_resolver(port: u16, timeout: Duration) -> WhoisResolver {
    let config = TraceConfig::default()
        .with_server("127.0.0.1")
        .with_port(port)
        .with_timeout(timeout);
    WhoisResolver::builder(config)
        .transport(Arc::new(SocketTransport::new()))
        .build()
        .await
}

#[tokio::test]
async fn test_socket_end_to_end_success() {
    let port = loopback_server("Domain Name: EXAMPLE.TEST\r\n", Duration::ZERO).await;
    let resolver = socket_resolver(port, Duration::from_secs(3)).await;

    let resolution = resolver.resolve("example.test").await;

    assert_eq!(resolution.status, ResolutionStatus::Success);
    assert_eq!(resolution.hops.len(), 1);
    assert_eq!(resolution.hops[0].port, port);
    assert_eq!(resolution.raw.as_deref(), Some("Domain Name: EXAMPLE.TEST\r\n"));
}

#[tokio::test]
async fn test_socket_referral_to_dead_server_is_partial() {
    // Nothing listens on 127.0.0.2:43
    let port = loopback_server("Whois Server: 127.0.0.2\r\n", Duration::ZERO).await;
    let resolver = socket_resolver(port, Duration::from_secs(2)).await;

    let resolution = resolver.resolve("example.test").await;

    assert_eq!(resolution.status, ResolutionStatus::Partial);
    assert_eq!(resolution.servers(), vec!["127.0.0.1", "127.0.0.2"]);
    assert_eq!(resolution.hops[1].port, 43);
    assert_eq!(resolution.raw.as_deref(), Some("Whois Server: 127.0.0.2\r\n"));
    assert!(resolution.error.as_ref().unwrap().is_network());
    assert!(matches!(resolution.stop_reason, StopReason::HopFailed { .. }));
}

#[tokio::test]
async fn test_socket_silent_server_is_failed_timeout() {
    let port = loopback_server("", Duration::from_secs(5)).await;
    let resolver = socket_resolver(port, Duration::from_millis(300)).await;

    let resolution = resolver.resolve("example.test").await;

    assert_eq!(resolution.status, ResolutionStatus::Failed);
    assert_eq!(
        resolution.error.as_ref().map(|e| e.kind()),
        Some(ErrorKind::Timeout)
    );
}

#[tokio::test]
async fn test_socket_slow_server_keeps_partial_text() {
    let port = loopback_server("Domain Name: EXAMPLE.TEST\r\nStat", Duration::from_secs(5)).await;
    let resolver = socket_resolver(port, Duration::from_millis(300)).await;

    let resolution = resolver.resolve("example.test").await;

    assert_eq!(resolution.status, ResolutionStatus::Partial);
    assert_eq!(
        resolution.raw.as_deref(),
        Some("Domain Name: EXAMPLE.TEST\r\nStat")
    );
    assert_eq!(
        resolution.error.as_ref().map(|e| e.kind()),
        Some(ErrorKind::Timeout)
    );
}

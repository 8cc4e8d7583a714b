//! End-to-end pipeline tests.
//!
//! Validates: local-file and GitHub sources through extraction, probing and
//! aggregation; the worker-pool concurrency bound; empty reports.
//! Probes only target 127.0.0.1 listeners opened by the tests themselves.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vpn_checker::accounts::{extract, Account};
use vpn_checker::config::GithubConfig;
use vpn_checker::cycle::Orchestrator;
use vpn_checker::probe::{Connector, ProbeConfig, ProbeError, ProbeStatus, Prober};
use vpn_checker::report::summary_message;
use vpn_checker::sources::{GithubSource, LocalDirSource};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn open_port() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn prober(max_concurrency: usize, timeout: Duration) -> Prober {
    Prober::new(ProbeConfig {
        max_concurrency,
        timeout,
    })
}

/// Connector whose connects never complete.
struct Blackhole;

#[async_trait]
impl Connector for Blackhole {
    async fn connect(&self, _host: &str, _port: u16) -> Result<Duration, ProbeError> {
        std::future::pending().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction + probing
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn structured_account_on_closed_port_is_unreachable() {
    let port = closed_port();
    let doc = serde_json::json!({"accounts": [{"tag": "a1", "server": "127.0.0.1", "port": port}]});
    let extraction = extract(&doc);
    assert_eq!(extraction.accounts.len(), 1);
    assert_eq!(extraction.accounts[0].host, "127.0.0.1");

    let outcomes = prober(1, Duration::from_secs(1))
        .probe(&extraction.accounts)
        .await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].status, ProbeStatus::Unreachable);
    assert_eq!(outcomes[0].latency_ms, None);
    let detail = outcomes[0].detail.as_deref().unwrap();
    assert!(detail == "timeout" || detail == "connection refused", "{detail}");
}

#[tokio::test]
async fn worker_pool_bounds_wall_clock_time() {
    let accounts: Vec<Account> = (0..10)
        .map(|i| Account {
            tag: format!("n{i}"),
            protocol: "vless".into(),
            host: "10.255.255.1".into(),
            port: 443,
            transport: None,
            path: None,
            raw: serde_json::Value::Null,
        })
        .collect();
    let prober = Prober::with_connector(
        ProbeConfig {
            max_concurrency: 2,
            timeout: Duration::from_millis(200),
        },
        Arc::new(Blackhole),
    );

    let start = Instant::now();
    let outcomes = prober.probe(&accounts).await;
    let elapsed = start.elapsed();

    assert_eq!(outcomes.len(), 10);
    assert!(outcomes.iter().all(|o| o.detail.as_deref() == Some("timeout")));
    // Five waves of two 200 ms timeouts.
    assert!(elapsed >= Duration::from_millis(950), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1800), "{elapsed:?}");
}

// ─────────────────────────────────────────────────────────────────────────────
// Full cycles
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cycle_over_local_files_totals_sources() {
    let (_l1, p1) = open_port().await;
    let (_l2, p2) = open_port().await;
    let (_l3, p3) = open_port().await;
    let (d1, d2) = (closed_port(), closed_port());

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("1-live.json"),
        serde_json::json!({"outbounds": [
            {"type": "vless", "tag": "a", "server": "127.0.0.1", "server_port": p1},
            {"type": "trojan", "tag": "b", "server": "127.0.0.1", "server_port": p2},
            {"type": "selector", "tag": "proxy", "outbounds": ["a", "b"]},
            {"type": "ss", "tag": "c", "server": "127.0.0.1", "server_port": p3}
        ]})
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("2-dead.txt"),
        format!("trojan://pw@127.0.0.1:{d1}#x\nvless://id@127.0.0.1:{d2}?type=ws#y\n"),
    )
    .unwrap();

    let orchestrator = Orchestrator::new(
        Arc::new(LocalDirSource::new(dir.path())),
        prober(3, Duration::from_secs(1)),
    );
    let report = orchestrator.run_cycle().await.unwrap();

    assert_eq!(report.sources.len(), 2);
    let (live, dead) = (&report.sources[0], &report.sources[1]);
    assert_eq!(live.source_id, "1-live.json");
    assert_eq!((live.successful, live.failed, live.total), (3, 0, 3));
    assert_eq!(live.success_rate, 1.0);
    assert_eq!(live.ranked_accounts.len(), 3);
    assert_eq!((dead.successful, dead.failed, dead.total), (0, 2, 2));
    assert_eq!(dead.success_rate, 0.0);
    assert_eq!(dead.failures[1].account.path.as_deref(), Some("/"));

    assert_eq!(report.totals.successful, 3);
    assert_eq!(report.totals.failed, 2);
    assert_eq!(report.totals.total, 5);
    assert!(!report.interrupted);
}

#[tokio::test]
async fn empty_directory_reports_nothing_to_check() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.md"), "not a config").unwrap();

    let orchestrator = Orchestrator::new(
        Arc::new(LocalDirSource::new(dir.path())),
        prober(3, Duration::from_secs(1)),
    );
    let report = orchestrator.run_cycle().await.unwrap();
    assert!(report.sources.is_empty());
    assert!(report.is_empty());
    assert!(summary_message(&report, Some(60)).contains("Nothing to check"));
}

#[tokio::test]
async fn cycle_over_github_contents() {
    let (_listener, port) = open_port().await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/vpn/contents/configs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"type": "file", "path": "configs/nodes.json"},
            {"type": "file", "path": "configs/missing.json"}
        ])))
        .mount(&server)
        .await;
    let document = format!(r#"["vless://id@127.0.0.1:{port}#local"]"#);
    Mock::given(method("GET"))
        .and(path("/repos/acme/vpn/contents/configs/nodes.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "encoding": "base64",
            "content": STANDARD.encode(document)
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/vpn/contents/configs/missing.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = GithubSource::new(&GithubConfig {
        owner: "acme".into(),
        repo: "vpn".into(),
        path: "configs".into(),
        branch: None,
        token: Some("ghp_test".into()),
        api_base: server.uri(),
    })
    .unwrap();
    let orchestrator = Orchestrator::new(Arc::new(source), prober(2, Duration::from_secs(1)));
    let report = orchestrator.run_cycle().await.unwrap();

    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.sources[0].successful, 1);
    assert_eq!(report.sources[0].ranked_accounts[0].account.tag, "local");
    assert_eq!(report.sources[1].total, 0);
    assert!(report.sources[1]
        .note
        .as_deref()
        .unwrap()
        .contains("not found"));
}

//! Integration tests for the throughput probe against a mocked speed server.

use std::time::Duration;
use whatsmyip_tui::config::SpeedTestConfig;
use whatsmyip_tui::speedtest::{ProbeStatus, SpeedTester, LATENCY_SAMPLES};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAYLOAD_BYTES: u64 = 64_000;

fn tester(server: &MockServer) -> SpeedTester {
    let config = SpeedTestConfig {
        trace_url: format!("{}/cdn-cgi/trace", server.uri()),
        download_url: format!("{}/__down", server.uri()),
        download_bytes: PAYLOAD_BYTES,
        server_label: "MOCK SPEED".to_string(),
    };
    SpeedTester::new(reqwest::Client::new(), config)
}

async fn mount_trace(server: &MockServer, response: ResponseTemplate, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/cdn-cgi/trace"))
        .and(header("cache-control", "no-store"))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_download(server: &MockServer, response: ResponseTemplate, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/__down"))
        .and(query_param("bytes", PAYLOAD_BYTES.to_string()))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn completed_probe_reports_all_figures() {
    let server = MockServer::start().await;
    mount_trace(
        &server,
        ResponseTemplate::new(200).set_body_string("fl=1\n"),
        LATENCY_SAMPLES as u64,
    )
    .await;
    mount_download(
        &server,
        ResponseTemplate::new(200).set_body_bytes(vec![0u8; PAYLOAD_BYTES as usize]),
        1,
    )
    .await;

    let tester = tester(&server);
    let result = tester.run().await.expect("probe should run");

    assert_eq!(result.status, ProbeStatus::Completed);
    assert!(result.status_label.starts_with("DONE / "));
    assert!(result.status_label.ends_with(" MBPS"));
    assert_eq!(result.bytes, Some(PAYLOAD_BYTES));
    assert!(result.latency_ms.is_some());
    assert!(result.download_mbps.is_some());
    assert!(result.total_ms >= result.download_ms);
    assert_eq!(result.server.as_deref(), Some("MOCK SPEED"));
    assert!(result.error.is_none());
    assert!(!tester.is_busy());
}

#[tokio::test]
async fn overlapping_requests_run_once() {
    let server = MockServer::start().await;
    mount_trace(
        &server,
        ResponseTemplate::new(200).set_delay(Duration::from_millis(50)),
        LATENCY_SAMPLES as u64,
    )
    .await;
    mount_download(&server, ResponseTemplate::new(200).set_body_bytes(vec![1u8; 1024]), 1).await;

    let tester = tester(&server);
    let (first, second) = tokio::join!(tester.run(), tester.run());

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(first.map(|r| r.bytes), Some(Some(1024)));
}

#[tokio::test]
async fn flag_clears_after_a_failed_run() {
    let server = MockServer::start().await;
    mount_trace(&server, ResponseTemplate::new(503), 2).await;
    mount_download(&server, ResponseTemplate::new(200), 0).await;

    let tester = tester(&server);
    let result = tester.run().await.expect("probe should run");

    assert_eq!(result.status, ProbeStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("LATENCY HTTP 503"));
    assert_eq!(result.status_label, "TEST FAILED: LATENCY HTTP 503");
    assert!(!tester.is_busy());

    // A second request is honoured once the first has finished.
    assert!(tester.run().await.is_some());
}

#[tokio::test]
async fn download_failure_drops_partial_figures() {
    let server = MockServer::start().await;
    mount_trace(&server, ResponseTemplate::new(200), LATENCY_SAMPLES as u64).await;
    mount_download(&server, ResponseTemplate::new(500), 1).await;

    let result = tester(&server).run().await.expect("probe should run");

    assert_eq!(result.status, ProbeStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("DOWNLOAD HTTP 500"));
    assert_eq!(result.latency_ms, None);
    assert_eq!(result.bytes, None);
    assert_eq!(result.server, None);
}

#[tokio::test]
async fn empty_download_body_counts_nominal_size() {
    let server = MockServer::start().await;
    mount_trace(&server, ResponseTemplate::new(200), LATENCY_SAMPLES as u64).await;
    mount_download(&server, ResponseTemplate::new(200), 1).await;

    let result = tester(&server).run().await.expect("probe should run");

    assert_eq!(result.status, ProbeStatus::Completed);
    assert_eq!(result.bytes, Some(PAYLOAD_BYTES));
}

//! Reporter selection and delivery through the full application.

use std::time::Duration;

use iplocate::config::AppConfig;
use iplocate::lifecycle::{self, Shutdown};
use iplocate::observability::{MetricsProvider, ReporterFactory, Tags};
use serde_json::json;
use tokio::net::UdpSocket;

mod common;

async fn receive_lines(socket: &UdpSocket, wanted: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut buf = vec![0u8; 65_536];
    while lines.len() < wanted {
        let n = tokio::time::timeout(Duration::from_secs(5), socket.recv(&mut buf))
            .await
            .expect("timed out waiting for datagram")
            .unwrap();
        let datagram = String::from_utf8_lossy(&buf[..n]).into_owned();
        lines.extend(datagram.lines().map(str::to_string));
    }
    lines
}

#[tokio::test]
async fn test_dogstatsd_receives_activity_metrics() {
    let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let upstream = common::start_programmable_upstream(|path| async move {
        match path.as_str() {
            "/ip" => (200, "3.80.0.1".to_string()),
            _ => (200, common::GEO_SUCCESS.to_string()),
        }
    })
    .await;

    let mut config = common::test_config(upstream);
    config.metrics.provider = "dogstatsd".to_string();
    config.metrics.dogstatsd.host_port = agent.local_addr().unwrap().to_string();
    config.metrics.dogstatsd.flush_interval_ms = 50;

    let shutdown = Shutdown::new();
    let app = lifecycle::build(&config, shutdown.clone()).await.unwrap();
    assert_eq!(app.sink().provider(), "dogstatsd");
    let addr = app.local_addr().unwrap();
    let server = tokio::spawn(app.run());

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api"))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // 3 activities x (schedule_to_start, started, latency, succeeded)
    let lines = receive_lines(&agent, 12).await;
    let started: Vec<_> = lines
        .iter()
        .filter(|l| l.starts_with("iplocate.activity_started:1|c|#"))
        .collect();
    assert_eq!(started.len(), 3);
    assert!(started.iter().any(|l| l.contains("operation:activity.get_ip") && l.contains("stage:GetIP")));

    for line in &lines {
        let tags = line.split("|#").nth(1).unwrap();
        let keys: Vec<_> = tags.split(',').map(|pair| pair.split(':').next().unwrap()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "tags must be key-sorted: {line}");
    }

    shutdown.trigger();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unknown_provider_serves_prometheus() {
    let mut config = AppConfig::default();
    config.metrics.provider = "xyz".to_string();
    config.metrics.prometheus.listen_address = "127.0.0.1:0".to_string();

    let factory = ReporterFactory::new(config.metrics.clone());
    assert_eq!(factory.provider(), MetricsProvider::Prometheus);

    let sink = factory.build().await.unwrap();
    assert_eq!(sink.provider(), "prometheus");

    let tags = Tags::new().with("stage", "GetIP").with("operation", "activity.get_ip");
    sink.report_counter("activity_started", &tags, 2).unwrap();
    sink.report_timer("activity_latency", &tags, Duration::from_millis(250)).unwrap();
    sink.flush().unwrap();

    lifecycle::startup::teardown(sink.as_ref());
    assert!(sink.report_counter("activity_started", &tags, 1).is_err());
}

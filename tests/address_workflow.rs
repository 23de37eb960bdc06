//! End-to-end tests: HTTP API → workflow → lookup activities → mock upstream.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use iplocate::lifecycle::{self, Shutdown};
use iplocate::lookup::ReqwestGetter;
use iplocate::observability::MemorySink;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_api_resolves_address_after_transient_failures() {
    let ip_calls = Arc::new(AtomicU32::new(0));
    let calls = ip_calls.clone();
    let upstream = common::start_programmable_upstream(move |path| {
        let calls = calls.clone();
        async move {
            match path.as_str() {
                "/ip" => {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        (503, "Service Unavailable".to_string())
                    } else {
                        (200, "3.80.0.1\n".to_string())
                    }
                }
                "/json/3.80.0.1" => (200, common::GEO_SUCCESS.to_string()),
                _ => (404, "not found".to_string()),
            }
        }
    })
    .await;

    let config = common::test_config(upstream);
    let sink = Arc::new(MemorySink::new());
    let getter = Arc::new(ReqwestGetter::new(&config.lookup).unwrap());
    let shutdown = Shutdown::new();
    let app = lifecycle::build_with(&config, sink.clone(), getter, shutdown.clone()).await.unwrap();
    let addr = app.local_addr().unwrap();
    let server = tokio::spawn(app.run());

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api"))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["result"],
        "Hello, Ada. Your IP is 3.80.0.1 (Amazon.com, Inc.) and your location is Ashburn, Virginia, United States"
    );

    assert_eq!(ip_calls.load(Ordering::SeqCst), 3);
    // 3 GetIP attempts, 1 GetLocationInfo, 1 GetInternetServiceProvider
    assert_eq!(sink.counter_total("activity_started"), 5);
    assert_eq!(sink.counter_total("activity_failed"), 2);
    assert_eq!(sink.counter_total("activity_succeeded"), 3);

    let get_ip_failures: Vec<_> = sink
        .named("activity_failed")
        .into_iter()
        .filter(|e| e.tags.get("operation") == Some("activity.get_ip"))
        .collect();
    assert_eq!(get_ip_failures.len(), 2);
    for event in &get_ip_failures {
        assert_eq!(event.tags.get("stage"), Some("GetIP"));
        assert_eq!(event.tags.get("workflow_type"), Some("GetAddressFromIP"));
        assert_eq!(event.tags.get("task_queue"), Some("ip-address"));
    }

    shutdown.trigger();
    server.await.unwrap().unwrap();
    assert!(sink.is_closed());
}

#[tokio::test]
async fn test_rejected_lookup_fails_fast_with_generic_error() {
    let requested = Arc::new(Mutex::new(Vec::new()));
    let log = requested.clone();
    let upstream = common::start_programmable_upstream(move |path| {
        log.lock().unwrap().push(path.clone());
        async move {
            match path.as_str() {
                "/ip" => (200, "10.0.0.1".to_string()),
                _ => (200, r#"{"status":"fail","message":"private range","query":"10.0.0.1"}"#.to_string()),
            }
        }
    })
    .await;

    let config = common::test_config(upstream);
    let sink = Arc::new(MemorySink::new());
    let getter = Arc::new(ReqwestGetter::new(&config.lookup).unwrap());
    let shutdown = Shutdown::new();
    let app = lifecycle::build_with(&config, sink.clone(), getter, shutdown.clone()).await.unwrap();
    let addr = app.local_addr().unwrap();
    let server = tokio::spawn(app.run());

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api"))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    let error = body["error"].as_str().unwrap();
    assert!(!error.contains("private range"));

    // The location lookup is not retried and the ISP step never runs.
    assert_eq!(*requested.lock().unwrap(), vec!["/ip", "/json/10.0.0.1"]);
    assert_eq!(sink.counter_total("activity_started"), 2);
    assert_eq!(sink.counter_total("activity_failed"), 1);

    shutdown.trigger();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_workflow_timeout_renders_json_error_before_request_timeout() {
    let upstream =
        common::start_programmable_upstream(|_| async { (503, "Service Unavailable".to_string()) }).await;

    let mut config = common::test_config(upstream);
    config.activity.retry.maximum_attempts = 0;
    config.workflow.execution_timeout_secs = 1;
    config.server.request_timeout_secs = 3;
    assert!(iplocate::config::validation::validate_config(&config).is_ok());

    let sink = Arc::new(MemorySink::new());
    let getter = Arc::new(ReqwestGetter::new(&config.lookup).unwrap());
    let shutdown = Shutdown::new();
    let app = lifecycle::build_with(&config, sink.clone(), getter, shutdown.clone()).await.unwrap();
    let addr = app.local_addr().unwrap();
    let server = tokio::spawn(app.run());

    let started = std::time::Instant::now();
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api"))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert!(started.elapsed() < Duration::from_secs(3));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], iplocate::http::response::GENERIC_FAILURE);

    // The attempt cut off by the deadline is still recorded as failed.
    let attempts = sink.counter_total("activity_started");
    assert!(attempts > 1);
    assert_eq!(sink.counter_total("activity_failed"), attempts);
    assert_eq!(sink.counter_total("activity_succeeded"), 0);

    shutdown.trigger();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_submit_form_and_validation() {
    let upstream = common::start_programmable_upstream(|path| async move {
        match path.as_str() {
            "/ip" => (200, "3.80.0.1".to_string()),
            _ => (200, common::GEO_SUCCESS.to_string()),
        }
    })
    .await;

    let config = common::test_config(upstream);
    let getter = Arc::new(ReqwestGetter::new(&config.lookup).unwrap());
    let shutdown = Shutdown::new();
    let app = lifecycle::build_with(&config, Arc::new(MemorySink::new()), getter, shutdown.clone())
        .await
        .unwrap();
    let addr = app.local_addr().unwrap();
    let server = tokio::spawn(app.run());
    let client = reqwest::Client::new();

    let html = client
        .post(format!("http://{addr}/submit"))
        .form(&[("name", "Ada & Bob")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.starts_with(r#"<p class="success">Hello, Ada &amp; Bob."#));

    let response = client
        .post(format!("http://{addr}/api"))
        .json(&json!({ "name": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Name is required" }));

    let response = client
        .post(format!("http://{addr}/api"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Invalid request body" }));

    shutdown.trigger();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_workflow() {
    let upstream = common::start_programmable_upstream(|_path| async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        (200, String::new())
    })
    .await;

    let mut config = common::test_config(upstream);
    config.activity.start_to_close_timeout_secs = 3600;
    let sink = Arc::new(MemorySink::new());
    let getter = Arc::new(ReqwestGetter::new(&config.lookup).unwrap());
    let shutdown = Shutdown::new();
    let app = lifecycle::build_with(&config, sink.clone(), getter, shutdown.clone()).await.unwrap();
    let addr = app.local_addr().unwrap();
    let server = tokio::spawn(app.run());

    let request = tokio::spawn(async move {
        reqwest::Client::new()
            .post(format!("http://{addr}/api"))
            .json(&json!({ "name": "Ada" }))
            .send()
            .await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.trigger();

    let response = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(response.status(), 500);

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(sink.counter_total("activity_started"), 1);
    assert_eq!(sink.counter_total("activity_failed"), 1);
    assert!(sink.is_closed());
}

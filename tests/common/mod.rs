//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use iplocate::config::AppConfig;

pub const GEO_SUCCESS: &str = r#"{"status":"success","country":"United States","countryCode":"US","regionName":"Virginia","city":"Ashburn","isp":"Amazon.com, Inc.","org":"AWS EC2","as":"AS14618 Amazon.com, Inc.","query":"3.80.0.1"}"#;

/// Start a programmable mock upstream on an ephemeral port.
///
/// `f` receives the request path and returns the status and body to send.
pub async fn start_programmable_upstream<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read request headers and return the path of the request line.
async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

/// Config pointing lookups at `upstream`, serving on an ephemeral port,
/// with fast retries.
pub fn test_config(upstream: SocketAddr) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.lookup.ip_url = format!("http://{upstream}/ip");
    config.lookup.geo_url = format!("http://{upstream}/json/");
    config.activity.start_to_close_timeout_secs = 5;
    config.activity.retry.initial_interval_ms = 10;
    config.activity.retry.maximum_interval_ms = 100;
    config.activity.retry.backoff_coefficient = 2.0;
    config.activity.retry.maximum_attempts = 5;
    config.metrics.prometheus.listen_address = "127.0.0.1:0".to_string();
    config
}

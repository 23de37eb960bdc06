//! DogStatsD push reporter.
//!
//! # Responsibilities
//! - Format events as DogStatsD lines: `ns.name:value|type|#k:v,k:v`
//! - Buffer lines and send them as UDP datagrams of at most `flush_bytes`
//! - Flush on a background timer, independent of activity lifecycles
//!
//! # Design Decisions
//! - Histogram samples are not supported by this reporter and are dropped
//! - Tags are rendered sorted by key so output is stable
//! - Send failures surface as `SinkError`; the caller decides to log them
//! - Datagrams that fail to send are kept and retried on the next flush,
//!   up to `MAX_UNSENT_DATAGRAMS`
//! - The socket is a connected blocking `std` socket so emits never race
//!   readiness; a UDP send only blocks while the kernel buffer drains

use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, DogStatsdConfig};
use crate::observability::sink::{drop_unsupported, MetricEvent, MetricKind, MetricSink, MetricValue, SinkError};

pub const DEFAULT_HOST_PORT: &str = "127.0.0.1:8125";
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_FLUSH_BYTES: usize = 1432;
pub const MAX_UNSENT_DATAGRAMS: usize = 64;

pub struct DogStatsdSink {
    inner: Arc<Inner>,
    target: SocketAddr,
    flush_interval: Duration,
    shutdown: CancellationToken,
}

struct Inner {
    socket: UdpSocket,
    batch: Mutex<Batch>,
    flush_bytes: usize,
    namespace: String,
}

struct Batch {
    current: Vec<u8>,
    unsent: VecDeque<Vec<u8>>,
}

impl DogStatsdSink {
    /// Resolve the agent address, connect a UDP socket and start the flush timer.
    pub async fn connect(config: &DogStatsdConfig, namespace: &str) -> Result<Self, ConfigError> {
        let host_port = match config.host_port.trim() {
            "" => DEFAULT_HOST_PORT,
            other => other,
        };
        let flush_interval = match config.flush_interval_ms {
            0 => DEFAULT_FLUSH_INTERVAL,
            ms => Duration::from_millis(ms),
        };
        let flush_bytes = match config.flush_bytes {
            0 => DEFAULT_FLUSH_BYTES,
            n => n,
        };

        let resolve_err = |reason: String| ConfigError::Resolve {
            target: host_port.to_string(),
            reason,
        };
        let target = tokio::net::lookup_host(host_port)
            .await
            .map_err(|e| resolve_err(e.to_string()))?
            .next()
            .ok_or_else(|| resolve_err("no addresses found".to_string()))?;

        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).map_err(|source| ConfigError::Bind {
            address: local.to_string(),
            source,
        })?;
        socket.connect(target).map_err(|e| resolve_err(e.to_string()))?;

        let inner = Arc::new(Inner {
            socket,
            batch: Mutex::new(Batch {
                current: Vec::with_capacity(flush_bytes),
                unsent: VecDeque::new(),
            }),
            flush_bytes,
            namespace: namespace.to_string(),
        });
        let shutdown = CancellationToken::new();
        spawn_flusher(inner.clone(), flush_interval, shutdown.clone());

        tracing::info!(
            agent = %target,
            flush_interval = ?flush_interval,
            flush_bytes,
            "DogStatsD reporter connected"
        );

        Ok(Self {
            inner,
            target,
            flush_interval,
            shutdown,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }
}

fn spawn_flusher(inner: Arc<Inner>, interval: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = inner.flush() {
                        tracing::error!(error = %e, "Failed to flush DogStatsD metrics");
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    });
}

impl Inner {
    fn batch(&self) -> MutexGuard<'_, Batch> {
        self.batch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_line(&self, line: &[u8]) -> Result<(), SinkError> {
        let mut batch = self.batch();
        // +1 for the newline separator
        let full = !batch.current.is_empty() && batch.current.len() + 1 + line.len() > self.flush_bytes;
        let sent = if full {
            let payload = std::mem::take(&mut batch.current);
            self.deliver(&mut batch, payload)
        } else {
            Ok(())
        };
        if !batch.current.is_empty() {
            batch.current.push(b'\n');
        }
        batch.current.extend_from_slice(line);
        sent
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut batch = self.batch();
        let payload = std::mem::take(&mut batch.current);
        self.deliver(&mut batch, payload)
    }

    /// Send retained datagrams in order, then `payload`. Whatever is not sent
    /// stays queued for the next flush.
    fn deliver(&self, batch: &mut Batch, payload: Vec<u8>) -> Result<(), SinkError> {
        if !payload.is_empty() {
            batch.unsent.push_back(payload);
        }
        while let Some(datagram) = batch.unsent.front() {
            if let Err(e) = self.socket.send(datagram) {
                let overflow = batch.unsent.len().saturating_sub(MAX_UNSENT_DATAGRAMS);
                if overflow > 0 {
                    batch.unsent.drain(..overflow);
                    tracing::warn!(dropped = overflow, "DogStatsD backlog full, dropping oldest datagrams");
                }
                return Err(SinkError::Unreachable(e));
            }
            batch.unsent.pop_front();
        }
        Ok(())
    }
}

/// Render one event as a DogStatsD line, or `None` for unsupported kinds.
pub fn format_line(namespace: &str, event: &MetricEvent) -> Option<String> {
    let (value, kind) = match event.value {
        MetricValue::Counter(v) => (v.to_string(), "c"),
        MetricValue::Gauge(v) => (v.to_string(), "g"),
        MetricValue::Timer(d) => ((d.as_nanos() as f64 / 1_000_000.0).to_string(), "ms"),
        MetricValue::Histogram(_) => return None,
    };

    let mut line = format!("{}.{}:{}|{}", namespace, event.name, value, kind);
    if !event.tags.is_empty() {
        line.push_str("|#");
        line.push_str(&event.tags.to_pairs().join(","));
    }
    Some(line)
}

impl MetricSink for DogStatsdSink {
    fn provider(&self) -> &'static str {
        "dogstatsd"
    }

    fn supports(&self, kind: MetricKind) -> bool {
        kind != MetricKind::Histogram
    }

    fn emit(&self, event: MetricEvent) -> Result<(), SinkError> {
        if self.shutdown.is_cancelled() {
            return Err(SinkError::Closed);
        }
        match format_line(&self.inner.namespace, &event) {
            Some(line) => self.inner.push_line(line.as_bytes()),
            None => {
                drop_unsupported(self.provider(), &event);
                Ok(())
            }
        }
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.inner.flush()
    }

    fn close(&self) {
        self.shutdown.cancel();
    }
}

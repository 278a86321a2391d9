//! Metrics and tracing setup for quorumkv.
//!
//! Provides a global [`ClientMetrics`] singleton backed by the `prometheus`
//! crate, plus an optional lightweight HTTP server for Prometheus scraping.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

/// Global metrics instance.
static METRICS: OnceLock<ClientMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static ClientMetrics {
    METRICS.get_or_init(ClientMetrics::new)
}

/// All Prometheus metrics for a quorumkv client.
pub struct ClientMetrics {
    pub registry: Registry,

    // ── Client operation counters ──
    pub gets: IntCounter,
    pub sets: IntCounter,
    pub deletes: IntCounter,

    // ── Quorum / self-healing counters ──
    pub quorum_failures: IntCounter,
    pub read_repairs: IntCounter,
    pub evictions: IntCounter,
    pub queue_rejections: IntCounter,

    // ── Operation latency ──
    pub op_latency_secs: HistogramVec,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics").finish_non_exhaustive()
    }
}

/// Default histogram buckets (seconds) for operation latency.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];

impl ClientMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let gets = IntCounter::with_opts(Opts::new("quorumkv_gets_total", "GET operations"))
            .expect("gets counter");
        let sets = IntCounter::with_opts(Opts::new("quorumkv_sets_total", "SET operations"))
            .expect("sets counter");
        let deletes =
            IntCounter::with_opts(Opts::new("quorumkv_deletes_total", "DELETE operations"))
                .expect("deletes counter");

        let quorum_failures = IntCounter::with_opts(Opts::new(
            "quorumkv_quorum_failures_total",
            "Calls that failed to reach quorum",
        ))
        .expect("quorum_failures counter");
        let read_repairs = IntCounter::with_opts(Opts::new(
            "quorumkv_read_repairs_total",
            "Read repair operations submitted",
        ))
        .expect("read_repairs counter");
        let evictions = IntCounter::with_opts(Opts::new(
            "quorumkv_evictions_total",
            "Nodes evicted after repeated errors",
        ))
        .expect("evictions counter");
        let queue_rejections = IntCounter::with_opts(Opts::new(
            "quorumkv_queue_rejections_total",
            "Operation submissions rejected by backpressure",
        ))
        .expect("queue_rejections counter");

        let op_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "quorumkv_op_latency_seconds",
                "Client operation latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["op_type"],
        )
        .expect("op_latency_secs histogram");

        registry
            .register(Box::new(gets.clone()))
            .expect("register gets");
        registry
            .register(Box::new(sets.clone()))
            .expect("register sets");
        registry
            .register(Box::new(deletes.clone()))
            .expect("register deletes");
        registry
            .register(Box::new(quorum_failures.clone()))
            .expect("register quorum_failures");
        registry
            .register(Box::new(read_repairs.clone()))
            .expect("register read_repairs");
        registry
            .register(Box::new(evictions.clone()))
            .expect("register evictions");
        registry
            .register(Box::new(queue_rejections.clone()))
            .expect("register queue_rejections");
        registry
            .register(Box::new(op_latency_secs.clone()))
            .expect("register op_latency_secs");

        Self {
            registry,
            gets,
            sets,
            deletes,
            quorum_failures,
            read_repairs,
            evictions,
            queue_rejections,
            op_latency_secs,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

/// Helper: start an operation latency timer. Returns a guard that records
/// elapsed time on drop.
pub fn start_op_timer(op_type: &str) -> prometheus::HistogramTimer {
    metrics()
        .op_latency_secs
        .with_label_values(&[op_type])
        .start_timer()
}

// ────────────────────────── Metrics HTTP server ──────────────────────────

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

async fn metrics_handler(
    _req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let body = encode_metrics();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .expect("valid HTTP response"))
}

/// Serve Prometheus metrics on the given address (`GET /metrics`).
///
/// This spawns a lightweight HTTP/1.1 server. Call from a `tokio::spawn`.
pub async fn serve_metrics(
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(metrics_handler))
                .await
            {
                tracing::debug!("metrics connection error: {}", e);
            }
        });
    }
}

// ────────────────────────── Tests ──────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init_and_increment() {
        let m = metrics();

        let before = m.gets.get();
        m.gets.inc();
        m.gets.inc();
        assert_eq!(m.gets.get(), before + 2);

        m.sets.inc();
        m.deletes.inc();
        m.read_repairs.inc();
        m.evictions.inc();
    }

    #[test]
    fn test_encode_metrics_format() {
        metrics().quorum_failures.inc();

        let output = encode_metrics();
        assert!(output.contains("quorumkv_gets_total"));
        assert!(output.contains("quorumkv_quorum_failures_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_latency_histogram_records() {
        let m = metrics();
        m.op_latency_secs.with_label_values(&["get"]).observe(0.002);

        let h = m.op_latency_secs.with_label_values(&["get"]);
        assert!(h.get_sample_count() >= 1);
    }
}

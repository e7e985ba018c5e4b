//! Prometheus metrics for the Gather service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `gather_events_created_total` - Events created
//! - `gather_rsvps_total{outcome}` - RSVP attempts by outcome
//!   (`accepted`, `duplicate`, `full`, `not_found`, `error`)
//! - `gather_notifications_total{kind,status}` - Notification sends by kind and
//!   status (`delivered`, `failed`, `timeout`, `unresolved`)
//! - `gather_reminder_runs_total{status}` - Reminder firings (`ok`, `error`)
//! - `gather_dispatch_queue_rejected_total` - Jobs dropped because the dispatch
//!   queue was full or closed
//!
//! ## Histograms
//! - `gather_dispatch_duration_seconds` - Time to fan out one notification job
//!
//! # Example
//!
//! ```rust,no_run
//! use gather_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Installs the global recorder and serves the scrape endpoint on its own
/// listener, separate from the API port.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe all metrics, install the recorder, and spawn the HTTP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., by another test), this logs a
    /// warning and returns `Ok` without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        let handle = recorder.handle();
        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                register_metrics();
                tokio::spawn(async move {
                    // `ExporterError` implements neither `Debug` nor `Display`.
                    if let Err(_e) = exporter.await {
                        tracing::error!("Metrics exporter stopped");
                    }
                });
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!("gather_events_created_total", "Total number of events created");
    describe_counter!(
        "gather_rsvps_total",
        "Total number of RSVP attempts by outcome (accepted, duplicate, full, not_found, error)"
    );
    describe_counter!(
        "gather_notifications_total",
        "Total number of notification sends by kind and status"
    );
    describe_counter!(
        "gather_reminder_runs_total",
        "Total number of reminder firings by status (ok, error)"
    );
    describe_counter!(
        "gather_dispatch_queue_rejected_total",
        "Total number of notification jobs dropped by the dispatch queue"
    );
    describe_histogram!(
        "gather_dispatch_duration_seconds",
        "Time taken to fan out one notification job"
    );

    tracing::debug!("Gather metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a created event.
pub fn record_event_created() {
    counter!("gather_events_created_total").increment(1);
}

/// Record an RSVP attempt.
pub fn record_rsvp(outcome: &'static str) {
    counter!("gather_rsvps_total", "outcome" => outcome).increment(1);
}

/// Record `count` notification sends of `kind` ending in `status`.
pub fn record_notifications(kind: &'static str, status: &'static str, count: usize) {
    if count > 0 {
        counter!("gather_notifications_total", "kind" => kind, "status" => status)
            .increment(count as u64);
    }
}

/// Record a reminder firing.
pub fn record_reminder_run(status: &'static str) {
    counter!("gather_reminder_runs_total", "status" => status).increment(1);
}

/// Record a job the dispatch queue refused.
pub fn record_queue_rejected() {
    counter!("gather_dispatch_queue_rejected_total").increment(1);
}

/// Record how long a dispatch job took.
pub fn record_dispatch_duration(duration: Duration) {
    histogram!("gather_dispatch_duration_seconds").record(duration.as_secs_f64());
}

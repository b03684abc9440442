// ABOUTME: Prometheus-style counters and histograms for the bridge.
// ABOUTME: Recording is a no-op until init_metrics installs an exporter.

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter, serving `/metrics` on `addr`
pub fn init_metrics(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    tracing::info!(addr = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_event_received() {
    counter!("threadbridge_events_received_total").increment(1);
}

pub fn record_event_duplicate() {
    counter!("threadbridge_events_duplicate_total").increment(1);
}

pub fn record_event_rejected(reason: &'static str) {
    counter!("threadbridge_events_rejected_total", "reason" => reason).increment(1);
}

pub fn record_assistant_run(outcome: &'static str, duration_secs: f64) {
    counter!("threadbridge_assistant_runs_total", "outcome" => outcome).increment(1);
    histogram!("threadbridge_assistant_duration_seconds").record(duration_secs);
}

pub fn record_reply_posted() {
    counter!("threadbridge_replies_posted_total").increment(1);
}

pub fn record_post_failure() {
    counter!("threadbridge_post_failures_total").increment(1);
}

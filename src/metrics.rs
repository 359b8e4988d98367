//! Request metrics served at `/metrics`.

use std::collections::HashMap;

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use once_cell::sync::Lazy;

/// Per-route request counters and latency histograms. Probe and scrape
/// traffic is not counted.
pub static METRICS: Lazy<PrometheusMetrics> = Lazy::new(|| {
    let labels = HashMap::from([(
        "version".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    )]);
    PrometheusMetricsBuilder::new("clutch_vault")
        .endpoint("/metrics")
        .exclude("/healthz")
        .exclude("/metrics")
        .const_labels(labels)
        .build()
        .expect("metrics builder")
});

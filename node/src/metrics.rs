//! # Prometheus Metrics
//!
//! Operational metrics for the mint, scraped from `/metrics` on the metrics
//! port. Everything lives in a dedicated [`prometheus::Registry`] with the
//! `ecash` prefix.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct MintMetrics {
    registry: Registry,
    /// Blind signatures issued, across `/sign`, `/split` and `/combine`.
    pub signatures_issued_total: IntCounter,
    /// Proofs marked spent.
    pub proofs_redeemed_total: IntCounter,
    /// Refused requests, by rejection code.
    pub rejections_total: IntCounterVec,
    /// Handler latency, by endpoint.
    pub request_latency_seconds: HistogramVec,
}

impl MintMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("ecash".into()), None)?;

        let signatures_issued_total = IntCounter::new(
            "signatures_issued_total",
            "Total number of blind signatures issued",
        )?;
        registry.register(Box::new(signatures_issued_total.clone()))?;

        let proofs_redeemed_total =
            IntCounter::new("proofs_redeemed_total", "Total number of proofs marked spent")?;
        registry.register(Box::new(proofs_redeemed_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("rejections_total", "Requests refused by the mint, by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let request_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "request_latency_seconds",
                "Mint API handler latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["endpoint"],
        )?;
        registry.register(Box::new(request_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            signatures_issued_total,
            proofs_redeemed_total,
            rejections_total,
            request_latency_seconds,
        })
    }

    /// All registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<MintMetrics>;

/// `GET /metrics`.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

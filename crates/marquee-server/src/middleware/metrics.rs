//! Request counters, kept in a Prometheus registry.

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub struct HttpMetrics {
    registry: Registry,
    requests_received: IntCounter,
    responses_sent: IntCounter,
    processing_time_us: IntCounter,
    responses_by_status: IntCounterVec,
}

/// Point-in-time counter values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    pub total_processing_time_us: u64,
    pub total_responses_sent_by_status: BTreeMap<String, u64>,
}

impl HttpMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_received = IntCounter::new(
            "marquee_http_requests_received_total",
            "Requests received",
        )?;
        registry.register(Box::new(requests_received.clone()))?;

        let responses_sent =
            IntCounter::new("marquee_http_responses_sent_total", "Responses sent")?;
        registry.register(Box::new(responses_sent.clone()))?;

        let processing_time_us = IntCounter::new(
            "marquee_http_processing_time_microseconds_total",
            "Time spent producing responses, in microseconds",
        )?;
        registry.register(Box::new(processing_time_us.clone()))?;

        let responses_by_status = IntCounterVec::new(
            Opts::new(
                "marquee_http_responses_sent_by_status_total",
                "Responses sent, by status code",
            ),
            &["status"],
        )?;
        registry.register(Box::new(responses_by_status.clone()))?;

        Ok(Self {
            registry,
            requests_received,
            responses_sent,
            processing_time_us,
            responses_by_status,
        })
    }

    pub fn observe_request(&self) {
        self.requests_received.inc();
    }

    pub fn observe_response(&self, status: StatusCode, elapsed: Duration) {
        self.responses_sent.inc();
        self.processing_time_us
            .inc_by(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
        self.responses_by_status
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut by_status = BTreeMap::new();
        for family in self.responses_by_status.collect() {
            for metric in family.get_metric() {
                let Some(label) = metric.get_label().first() else {
                    continue;
                };
                // Counter values are whole numbers stored as f64.
                by_status.insert(
                    label.get_value().to_string(),
                    metric.get_counter().get_value() as u64,
                );
            }
        }

        MetricsSnapshot {
            total_requests_received: self.requests_received.get(),
            total_responses_sent: self.responses_sent.get(),
            total_processing_time_us: self.processing_time_us.get(),
            total_responses_sent_by_status: by_status,
        }
    }

    /// The registry in the Prometheus text exposition format.
    pub fn render_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Count the request on the way in and the response on the way out.
pub async fn track(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let metrics = state.metrics();
    let started = Instant::now();
    metrics.observe_request();

    let response = next.run(req).await;
    metrics.observe_response(response.status(), started.elapsed());
    response
}

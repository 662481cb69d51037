//! Prometheus-kompatible Metriken fuer handoff
//!
//! Registrierte Metriken:
//! - `handoff_items_stored_total` – Counter: Angenommene Uploads
//! - `handoff_items_expired_total` – Counter: Per Sweep oder beim Zugriff entfernte Items
//! - `handoff_items_live` – Gauge: Nicht abgelaufene Items
//! - `handoff_signals_posted_total` – Counter: Abgelegte Signal-Nachrichten
//! - `handoff_key_rotations_total` – Counter: Schluesselrotationen
//! - `handoff_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `handoff_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle handoff-Prometheus-Metriken
#[derive(Clone)]
pub struct HandoffMetriken {
    pub registry: Arc<Registry>,

    // Ablage und Relay
    pub items_stored_total: IntCounter,
    pub items_expired_total: IntCounter,
    pub items_live: IntGauge,
    pub signals_posted_total: IntCounter,
    pub key_rotations_total: IntCounter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl HandoffMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let items_stored_total = IntCounter::with_opts(Opts::new(
            "handoff_items_stored_total",
            "Anzahl angenommener Uploads",
        ))?;
        registry.register(Box::new(items_stored_total.clone()))?;

        let items_expired_total = IntCounter::with_opts(Opts::new(
            "handoff_items_expired_total",
            "Anzahl abgelaufener und entfernter Items",
        ))?;
        registry.register(Box::new(items_expired_total.clone()))?;

        let items_live = IntGauge::with_opts(Opts::new(
            "handoff_items_live",
            "Anzahl nicht abgelaufener Items",
        ))?;
        registry.register(Box::new(items_live.clone()))?;

        let signals_posted_total = IntCounter::with_opts(Opts::new(
            "handoff_signals_posted_total",
            "Anzahl abgelegter Signal-Nachrichten",
        ))?;
        registry.register(Box::new(signals_posted_total.clone()))?;

        let key_rotations_total = IntCounter::with_opts(Opts::new(
            "handoff_key_rotations_total",
            "Anzahl Schluesselrotationen",
        ))?;
        registry.register(Box::new(key_rotations_total.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("handoff_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "handoff_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            items_stored_total,
            items_expired_total,
            items_live,
            signals_posted_total,
            key_rotations_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: HandoffMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<HandoffMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

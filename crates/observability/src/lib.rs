//! # handoff-observability
//!
//! Observability-Crate fuer den handoff-Server:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`) mit Speicherstatus
//! - Structured Logging via tracing-subscriber (Text oder JSON)
//! - Request-Timing Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, HandoffMetriken};
pub use middleware::{request_timing_layer, timing_middleware};

use axum::Router;

/// Router mit `GET /metrics` und `GET /health`, zum Einhaengen in den API-Router
pub fn observability_router(metriken: HandoffMetriken, health: HealthState) -> Router {
    Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(health))
}

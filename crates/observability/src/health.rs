//! Health-Check-Endpunkt
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Speicherstatus

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage_ok: bool,
}

/// Geteilter Zustand fuer den Health-Check-Handler
///
/// Der Sweeper meldet nach jedem Durchlauf, ob das Speicher-Backend
/// fehlerfrei arbeitet.
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    speicher_ok: Arc<AtomicBool>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            speicher_ok: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn speicher_ok(&self) -> bool {
        self.speicher_ok.load(Ordering::Relaxed)
    }

    pub fn speicher_status_setzen(&self, ok: bool) {
        self.speicher_ok.store(ok, Ordering::Relaxed);
    }

    pub fn bericht(&self) -> HealthResponse {
        let storage_ok = self.speicher_ok();
        HealthResponse {
            status: if storage_ok {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            storage_ok,
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – 200 auch bei degraded (Probe soll nicht failen)
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.bericht()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn speicherstatus_umschalten() {
        let state = HealthState::neu();
        assert!(state.speicher_ok());
        assert_eq!(state.bericht().status, HealthStatus::Healthy);

        state.speicher_status_setzen(false);
        let bericht = state.bericht();
        assert_eq!(bericht.status, HealthStatus::Degraded);
        assert!(!bericht.storage_ok);
    }

    #[test]
    fn antwort_format() {
        let response = HealthResponse {
            status: HealthStatus::Degraded,
            version: "0.1.0".to_string(),
            uptime_seconds: 120,
            storage_ok: false,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"degraded\""));
        assert!(json.contains("\"storage_ok\":false"));
    }

    #[tokio::test]
    async fn health_endpunkt_bei_speicherfehler() {
        let state = HealthState::neu();
        state.speicher_status_setzen(false);
        let antwort = health_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(antwort.into_body(), usize::MAX).await.unwrap();
        let bericht: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(bericht.status, HealthStatus::Degraded);
        assert_eq!(bericht.version, env!("CARGO_PKG_VERSION"));
    }
}

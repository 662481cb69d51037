//! REST-Interface des handoff-Servers (`/v1/...`)

pub mod handlers;
pub mod routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use handoff_core::HandoffError;
use handoff_crypto::CryptoError;
use serde_json::json;

pub use routes::router;

/// Fehlerantwort der REST-API
///
/// Body: `{ "error": { "code": <http>, "message": <text> } }`. Interne
/// Details (Pfade, OS-Meldungen) landen nur im Log.
#[derive(Debug)]
pub enum ApiFehler {
    Handoff(HandoffError),
    ZuGross { max: usize },
}

impl From<HandoffError> for ApiFehler {
    fn from(e: HandoffError) -> Self {
        Self::Handoff(e)
    }
}

impl From<CryptoError> for ApiFehler {
    fn from(e: CryptoError) -> Self {
        Self::Handoff(e.into())
    }
}

impl ApiFehler {
    pub fn validierung(msg: impl Into<String>) -> Self {
        Self::Handoff(HandoffError::validierung(msg))
    }
}

impl IntoResponse for ApiFehler {
    fn into_response(self) -> Response {
        let (status, meldung) = match &self {
            Self::Handoff(e) => {
                let status = StatusCode::from_u16(e.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    tracing::error!(fehler = %e, "Anfrage fehlgeschlagen");
                }
                (status, e.oeffentliche_meldung())
            }
            Self::ZuGross { max } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Datei ist groesser als {max} Bytes"),
            ),
        };
        fehler_antwort(status, &meldung)
    }
}

/// Fehlerantwort im einheitlichen Format
pub fn fehler_antwort(status: StatusCode, nachricht: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": status.as_u16(),
                "message": nachricht
            }
        })),
    )
        .into_response()
}

pub type ApiResult<T> = Result<T, ApiFehler>;

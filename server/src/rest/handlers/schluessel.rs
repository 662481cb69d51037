//! REST-Handler fuer die Schluesselverteilung

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::rest::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SchluesselAntwort {
    pub current_key: String,
    pub previous_key: Option<String>,
}

/// `GET /v1/keys` – rotiert bei Faelligkeit und liefert `[current, previous?]`
pub async fn verteilen(State(state): State<AppState>) -> ApiResult<Json<SchluesselAntwort>> {
    let mut keys = state.schluessel.all_valid_keys().await?.into_iter();
    let current = keys
        .next()
        .ok_or_else(|| handoff_core::HandoffError::Krypto("Schluesselring leer".into()))?;

    Ok(Json(SchluesselAntwort {
        current_key: current.schluessel.als_base64(),
        previous_key: keys.next().map(|k| k.schluessel.als_base64()),
    }))
}

//! REST-Handler fuer das Signal-Relay

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Json,
};
use handoff_core::{HandoffError, PeerId};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::rest::{ApiFehler, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignalAnfrage {
    #[serde(rename = "peerId")]
    peer_id: Option<String>,
    #[serde(rename = "signalData", default)]
    signal_data: Value,
}

#[derive(Deserialize)]
pub struct PollParameter {
    #[serde(rename = "peerId")]
    peer_id: Option<String>,
}

/// `null`, `""`, `{}` und `[]` gelten als fehlend
fn signal_leer(wert: &Value) -> bool {
    match wert {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// `POST /v1/signal` – legt `signalData` in der Mailbox von `peerId` ab
pub async fn ablegen(
    State(state): State<AppState>,
    anfrage: Result<Json<SignalAnfrage>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(anfrage) =
        anfrage.map_err(|_| ApiFehler::validierung("Erwartet JSON mit peerId und signalData"))?;
    let peer_id = anfrage
        .peer_id
        .ok_or_else(|| ApiFehler::validierung("peerId ist ein Pflichtfeld"))?;
    if signal_leer(&anfrage.signal_data) {
        return Err(ApiFehler::validierung("signalData ist ein Pflichtfeld"));
    }

    let peer = PeerId::parse(&peer_id)?;
    let payload = serde_json::to_vec(&anfrage.signal_data)
        .map_err(|e| HandoffError::validierung(format!("signalData: {e}")))?;
    state.relay.post(&peer, payload).await?;
    state.metriken.signals_posted_total.inc();

    Ok(Json(json!({ "success": true })))
}

/// `GET /v1/signal?peerId=` – liest die Mailbox, ohne sie zu leeren
pub async fn abholen(
    State(state): State<AppState>,
    Query(parameter): Query<PollParameter>,
) -> ApiResult<Json<Value>> {
    let peer_id = parameter
        .peer_id
        .ok_or_else(|| ApiFehler::validierung("peerId ist ein Pflichtfeld"))?;
    let peer = PeerId::parse(&peer_id)?;

    let payload = state.relay.poll(&peer).await?;
    let wert = serde_json::from_slice(&payload)
        .map_err(|e| HandoffError::speicher(format!("Mailbox von {peer} nicht lesbar: {e}")))?;
    Ok(Json(wert))
}

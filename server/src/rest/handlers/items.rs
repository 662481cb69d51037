//! REST-Handler fuer Items: Upload, Liste, Fallback-Download, Besitzer

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use handoff_core::{ItemId, PeerId, DATEINAME_HEADER};
use handoff_crypto::{versiegeln, VersiegelterBlob};
use handoff_store::ItemUebersicht;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::rest::{ApiFehler, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct UploadAntwort {
    pub id: ItemId,
}

#[derive(Serialize)]
pub struct ListenAntwort {
    pub items: Vec<ItemUebersicht>,
}

#[derive(Serialize)]
pub struct ItemAntwort {
    pub id: ItemId,
    pub display_name: String,
    pub mime_type: String,
    pub blob: VersiegelterBlob,
}

#[derive(Deserialize)]
pub struct MetadatenAnfrage {
    filename: Option<String>,
    #[serde(rename = "peerId")]
    peer_id: Option<String>,
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /v1/items` – Rohdaten annehmen, pruefen, unter dem aktuellen Schluessel ablegen
pub async fn hochladen(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<impl IntoResponse> {
    let body = body.map_err(|e| {
        tracing::debug!(fehler = %e, "Upload-Body abgewiesen");
        ApiFehler::ZuGross {
            max: state.richtlinie.max_groesse,
        }
    })?;
    let name = header_text(&headers, DATEINAME_HEADER).unwrap_or_default();
    let mime = header_text(&headers, header::CONTENT_TYPE.as_str()).unwrap_or_default();

    let upload = state.richtlinie.pruefen(name, mime, body.len())?;
    let schluessel = state.schluessel.current_key().await?;
    let blob = versiegeln(&schluessel.schluessel, &body)?;

    let id = state
        .ablage
        .put(&upload.display_name, &upload.mime_type, blob)
        .await?;
    state.metriken.items_stored_total.inc();
    state.bestand_melden().await;

    Ok((StatusCode::CREATED, Json(UploadAntwort { id })))
}

/// `GET /v1/items` – lebende Items mit Restlaufzeit
pub async fn auflisten(State(state): State<AppState>) -> Json<ListenAntwort> {
    let items = state.ablage.list(state.uhr.jetzt()).await;
    Json(ListenAntwort { items })
}

/// `GET /v1/items/:id` – Chiffrat fuer den Server-Fallback
pub async fn abrufen(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ItemAntwort>> {
    let id = ItemId::parse(&id)?;
    let item = state.ablage.get(&id).await;
    if item.is_err() {
        state.bestand_melden().await;
    }
    let item = item?;
    Ok(Json(ItemAntwort {
        id: item.id,
        display_name: item.display_name,
        mime_type: item.mime_type,
        blob: item.blob,
    }))
}

/// `POST /v1/metadata` – Besitzer (lebende Sitzung) eintragen
pub async fn besitzer_setzen(
    State(state): State<AppState>,
    anfrage: Result<Json<MetadatenAnfrage>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(anfrage) =
        anfrage.map_err(|_| ApiFehler::validierung("Erwartet JSON mit filename und peerId"))?;
    let (Some(filename), Some(peer_id)) = (anfrage.filename, anfrage.peer_id) else {
        return Err(ApiFehler::validierung("filename und peerId sind Pflichtfelder"));
    };

    let id = ItemId::parse(&filename)?;
    let peer = PeerId::parse(&peer_id)?;
    state.ablage.attach_owner(&id, &peer).await?;

    Ok(Json(json!({ "success": true })))
}

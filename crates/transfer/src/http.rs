//! HttpGegenstelle – REST-Client gegen den handoff-Server
//!
//! Implementiert Schluesselverteilung, Signal-Relay, Fallback-Download und
//! Item-Verwaltung ueber die `/v1`-Endpunkte.

use std::time::Duration;

use async_trait::async_trait;
use handoff_core::{ItemId, PeerId, DATEINAME_HEADER};
use handoff_crypto::Schluessel;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{TransferError, TransferResult};
use crate::kollaborateure::{
    ItemInfo, ItemVerzeichnis, SchluesselQuelle, ServerAbruf, ServerItem, SignalKanal,
};

#[derive(Deserialize)]
struct SchluesselAntwort {
    current_key: String,
    previous_key: Option<String>,
}

#[derive(Serialize)]
struct SignalAnfrage<'a> {
    #[serde(rename = "peerId")]
    peer_id: &'a PeerId,
    #[serde(rename = "signalData")]
    signal_data: serde_json::Value,
}

#[derive(Serialize)]
struct MetadatenAnfrage<'a> {
    filename: &'a ItemId,
    #[serde(rename = "peerId")]
    peer_id: &'a PeerId,
}

#[derive(Deserialize)]
struct UploadAntwort {
    id: ItemId,
}

#[derive(Deserialize)]
struct ListenAntwort {
    items: Vec<ItemInfo>,
}

#[derive(Deserialize)]
struct FehlerAntwort {
    error: FehlerDetails,
}

#[derive(Deserialize)]
struct FehlerDetails {
    message: String,
}

/// HTTP-Client fuer einen handoff-Server
#[derive(Debug, Clone)]
pub struct HttpGegenstelle {
    basis: Url,
    http: Client,
}

impl HttpGegenstelle {
    /// Client fuer `basis` (z.B. `http://127.0.0.1:8080/`)
    pub fn neu(basis: &str) -> TransferResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Self::mit_client(basis, http)
    }

    /// Nutzt einen vorhandenen reqwest-Client
    pub fn mit_client(basis: &str, http: Client) -> TransferResult<Self> {
        let mut url = Url::parse(basis)
            .map_err(|e| TransferError::Ungueltig(format!("Basis-URL {basis}: {e}")))?;
        if !url.path().ends_with('/') {
            let pfad = format!("{}/", url.path().trim_end_matches('/'));
            url.set_path(&pfad);
        }
        Ok(Self { basis: url, http })
    }

    pub fn basis(&self) -> &Url {
        &self.basis
    }

    fn url(&self, pfad: &str) -> TransferResult<Url> {
        self.basis
            .join(pfad)
            .map_err(|e| TransferError::Ungueltig(format!("Pfad {pfad}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, pfad: &str) -> TransferResult<T> {
        let antwort = self.http.get(self.url(pfad)?).send().await?;
        Self::antwort_auswerten(antwort).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        pfad: &str,
        body: &B,
    ) -> TransferResult<T> {
        let antwort = self.http.post(self.url(pfad)?).json(body).send().await?;
        Self::antwort_auswerten(antwort).await
    }

    async fn antwort_auswerten<T: DeserializeOwned>(antwort: Response) -> TransferResult<T> {
        if !antwort.status().is_success() {
            return Err(Self::fehler_auswerten(antwort).await);
        }
        Ok(antwort.json::<T>().await?)
    }

    async fn fehler_auswerten(antwort: Response) -> TransferError {
        let status = antwort.status();
        let bytes = antwort.bytes().await.unwrap_or_default();
        let meldung = serde_json::from_slice::<FehlerAntwort>(&bytes)
            .map(|f| f.error.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());

        match status {
            StatusCode::NOT_FOUND => TransferError::NichtGefunden(meldung),
            StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
                TransferError::Ungueltig(meldung)
            }
            s => TransferError::Server(format!("HTTP {}: {meldung}", s.as_u16())),
        }
    }
}

#[async_trait]
impl SchluesselQuelle for HttpGegenstelle {
    async fn gueltige_schluessel(&self) -> TransferResult<Vec<Schluessel>> {
        let antwort: SchluesselAntwort = self.get_json("v1/keys").await?;
        let mut schluessel = vec![Schluessel::aus_base64(&antwort.current_key)?];
        if let Some(vorher) = antwort.previous_key {
            schluessel.push(Schluessel::aus_base64(&vorher)?);
        }
        Ok(schluessel)
    }
}

#[async_trait]
impl SignalKanal for HttpGegenstelle {
    async fn senden(&self, an: &PeerId, daten: Vec<u8>) -> TransferResult<()> {
        let signal_data: serde_json::Value = serde_json::from_slice(&daten)?;
        let _: serde_json::Value = self
            .post_json(
                "v1/signal",
                &SignalAnfrage {
                    peer_id: an,
                    signal_data,
                },
            )
            .await?;
        Ok(())
    }

    async fn abholen(&self, peer: &PeerId) -> TransferResult<Option<Vec<u8>>> {
        let mut url = self.url("v1/signal")?;
        url.query_pairs_mut().append_pair("peerId", peer.as_str());
        let antwort = self.http.get(url).send().await?;
        if antwort.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let wert: serde_json::Value = Self::antwort_auswerten(antwort).await?;
        Ok(Some(serde_json::to_vec(&wert)?))
    }
}

#[async_trait]
impl ServerAbruf for HttpGegenstelle {
    async fn item_laden(&self, id: &ItemId) -> TransferResult<ServerItem> {
        self.get_json(&format!("v1/items/{id}")).await
    }
}

#[async_trait]
impl ItemVerzeichnis for HttpGegenstelle {
    async fn hochladen(&self, name: &str, mime_type: &str, daten: Vec<u8>) -> TransferResult<ItemId> {
        let antwort = self
            .http
            .post(self.url("v1/items")?)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .header(DATEINAME_HEADER, name)
            .body(daten)
            .send()
            .await?;
        let upload: UploadAntwort = Self::antwort_auswerten(antwort).await?;
        Ok(upload.id)
    }

    async fn besitzer_setzen(&self, id: &ItemId, peer: &PeerId) -> TransferResult<()> {
        let _: serde_json::Value = self
            .post_json(
                "v1/metadata",
                &MetadatenAnfrage {
                    filename: id,
                    peer_id: peer,
                },
            )
            .await?;
        Ok(())
    }

    async fn items(&self) -> TransferResult<Vec<ItemInfo>> {
        let liste: ListenAntwort = self.get_json("v1/items").await?;
        Ok(liste.items)
    }
}

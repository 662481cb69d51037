//! Schnittstellen zu Server und Echtzeit-Transport
//!
//! Uploader und Downloader kennen ihre Gegenstellen nur ueber diese Traits.
//! `HttpGegenstelle` implementiert die HTTP-Seite, `testing::SpeicherNetz`
//! den Direkttransport im Speicher.

use async_trait::async_trait;
use handoff_core::{ItemId, PeerId};
use handoff_crypto::{Schluessel, VersiegelterBlob};
use serde::{Deserialize, Serialize};

use crate::error::TransferResult;

/// Listeneintrag eines Items auf dem Server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub id: ItemId,
    pub display_name: String,
    pub mime_type: String,
    pub owner_peer_id: Option<PeerId>,
    pub expires_in_secs: i64,
}

/// Vom Server geladenes Item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerItem {
    pub id: ItemId,
    pub display_name: String,
    pub mime_type: String,
    pub blob: VersiegelterBlob,
}

/// Schluesselverteilung: `[current, previous?]`
#[async_trait]
pub trait SchluesselQuelle: Send + Sync {
    async fn gueltige_schluessel(&self) -> TransferResult<Vec<Schluessel>>;
}

/// Zugang zum Signal-Relay
#[async_trait]
pub trait SignalKanal: Send + Sync {
    /// Legt `daten` in der Mailbox von `an` ab
    async fn senden(&self, an: &PeerId, daten: Vec<u8>) -> TransferResult<()>;

    /// Liest die eigene Mailbox; `None` wenn leer oder abgelaufen
    async fn abholen(&self, peer: &PeerId) -> TransferResult<Option<Vec<u8>>>;
}

/// Server-Fallback: Chiffrat samt Metadaten laden
#[async_trait]
pub trait ServerAbruf: Send + Sync {
    async fn item_laden(&self, id: &ItemId) -> TransferResult<ServerItem>;
}

/// Item-Verwaltung auf dem Server (Upload, Besitzer, Liste)
#[async_trait]
pub trait ItemVerzeichnis: Send + Sync {
    async fn hochladen(&self, name: &str, mime_type: &str, daten: Vec<u8>) -> TransferResult<ItemId>;

    async fn besitzer_setzen(&self, id: &ItemId, peer: &PeerId) -> TransferResult<()>;

    async fn items(&self) -> TransferResult<Vec<ItemInfo>>;
}

/// Echtzeit-Transport zwischen zwei Browser-Sitzungen
#[async_trait]
pub trait DirektTransport: Send + Sync {
    /// Anfragende Seite: neues Angebot erzeugen
    async fn angebot(&self) -> TransferResult<Box<dyn DirektAngebot>>;

    /// Haltende Seite: Angebot beantworten.
    ///
    /// Liefert die Antwortdaten fuer das Relay und die Verbindung, die
    /// zustande kommt, sobald die Gegenseite die Antwort verarbeitet.
    async fn annehmen(&self, angebot: &[u8]) -> TransferResult<(Vec<u8>, Box<dyn DirektVerbindung>)>;
}

/// Halboffene Verbindung der anfragenden Seite
#[async_trait]
pub trait DirektAngebot: Send {
    /// Angebotsdaten fuer das Relay
    fn daten(&self) -> Vec<u8>;

    /// Verbindung mit der Antwort der Gegenseite herstellen
    async fn verbinden(self: Box<Self>, antwort: &[u8]) -> TransferResult<Box<dyn DirektVerbindung>>;
}

/// Aufgebaute Datenverbindung
#[async_trait]
pub trait DirektVerbindung: Send {
    async fn senden(&mut self, daten: Vec<u8>) -> TransferResult<()>;

    /// Naechste Nachricht; `None` wenn die Gegenseite geschlossen hat
    async fn empfangen(&mut self) -> TransferResult<Option<Vec<u8>>>;

    async fn schliessen(&mut self);
}

/// Anfrage ueber die Datenverbindung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirektAnfrage {
    pub item_id: ItemId,
}

//! Gemeinsame Bezeichner fuer handoff
//!
//! Beide IDs landen in Speicherpfaden (`<id>.enc`, `signals/<peer>.json`),
//! deshalb wird jede Eingabe von aussen ueber `parse` validiert.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HandoffError, Result};

/// Maximale Laenge eines Bezeichners
pub const MAX_ID_LAENGE: usize = 64;

/// HTTP-Header mit dem Anzeigenamen beim Upload (Client und Server)
pub const DATEINAME_HEADER: &str = "x-file-name";

fn zeichen_erlaubt(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn pruefen(art: &str, wert: &str) -> Result<()> {
    if wert.is_empty() {
        return Err(HandoffError::validierung(format!("{art} darf nicht leer sein")));
    }
    if wert.len() > MAX_ID_LAENGE {
        return Err(HandoffError::validierung(format!(
            "{art} ist laenger als {MAX_ID_LAENGE} Zeichen"
        )));
    }
    if !wert.chars().all(zeichen_erlaubt) {
        return Err(HandoffError::validierung(format!(
            "{art} enthaelt unzulaessige Zeichen"
        )));
    }
    Ok(())
}

/// Bezeichner eines abgelegten Items (vom Store erzeugt)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Erzeugt eine neue, eindeutige ItemId
    pub fn neu() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validiert eine ItemId aus einer Anfrage
    pub fn parse(wert: &str) -> Result<Self> {
        pruefen("ItemId", wert)?;
        Ok(Self(wert.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ItemId {
    type Error = HandoffError;

    fn try_from(wert: String) -> Result<Self> {
        pruefen("ItemId", &wert)?;
        Ok(Self(wert))
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bezeichner einer Browser-Sitzung (Peer)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Erzeugt eine zufaellige PeerId fuer eine neue Sitzung
    pub fn zufaellig() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(uuid[..13].to_string())
    }

    pub fn parse(wert: &str) -> Result<Self> {
        pruefen("peerId", wert)?;
        Ok(Self(wert.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PeerId {
    type Error = HandoffError;

    fn try_from(wert: String) -> Result<Self> {
        pruefen("peerId", &wert)?;
        Ok(Self(wert))
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ergebnis eines Sweep-Durchlaufs (Ablage oder Mailboxen)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepBericht {
    /// Vollstaendig entfernte Datensaetze
    pub entfernt: usize,
    /// Abgelaufen, aber nicht loeschbar (naechster Lauf versucht es erneut)
    pub fehlgeschlagen: usize,
    /// Lebende Datensaetze nach dem Durchlauf
    pub verbleibend: usize,
}

//! Signal-Umschlag der Clients
//!
//! Das Relay transportiert nur Bytes. Clients verpacken ihr Handshake-Paket
//! in eine `SignalNachricht`: Absender (damit die Antwort in dessen Mailbox
//! landet) und Sitzungs-Id (damit Antworten auf aufgegebene Versuche
//! verworfen werden koennen).

use handoff_core::{HandoffError, PeerId, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Art der Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalArt {
    Angebot,
    Antwort,
}

/// Handshake-Paket mit Absender und Sitzung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalNachricht {
    pub von: PeerId,
    pub sitzung: Uuid,
    pub art: SignalArt,
    #[serde(with = "handoff_core::b64")]
    pub daten: Vec<u8>,
}

impl SignalNachricht {
    pub fn angebot(von: PeerId, sitzung: Uuid, daten: Vec<u8>) -> Self {
        Self {
            von,
            sitzung,
            art: SignalArt::Angebot,
            daten,
        }
    }

    pub fn antwort(von: PeerId, sitzung: Uuid, daten: Vec<u8>) -> Self {
        Self {
            von,
            sitzung,
            art: SignalArt::Antwort,
            daten,
        }
    }

    /// Serialisiert als JSON fuer das Relay
    pub fn als_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| HandoffError::validierung(format!("Signal nicht serialisierbar: {e}")))
    }

    /// Liest eine Nachricht aus einem Mailbox-Inhalt
    pub fn aus_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| HandoffError::validierung(format!("Kein gueltiges Signal: {e}")))
    }

    /// Antwort auf genau diese Sitzung?
    pub fn beantwortet(&self, sitzung: Uuid) -> bool {
        self.art == SignalArt::Antwort && self.sitzung == sitzung
    }
}

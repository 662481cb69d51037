//! Oeffentliche Typen der Ablage

use chrono::{DateTime, Utc};
use handoff_core::{ItemId, PeerId};
use handoff_crypto::{KeyFingerprint, VersiegelterBlob};
use serde::{Deserialize, Serialize};

/// Ein abgelegtes Item inkl. Chiffrat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub id: ItemId,
    pub display_name: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub owner_peer_id: Option<PeerId>,
    pub blob: VersiegelterBlob,
}

/// Eintrag der Listenansicht (ohne Chiffrat)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUebersicht {
    pub id: ItemId,
    pub display_name: String,
    pub mime_type: String,
    pub owner_peer_id: Option<PeerId>,
    pub expires_in_secs: i64,
}

/// Metadaten eines Items, wie sie in `files.json` stehen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ItemRecord {
    pub display_name: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub owner_peer_id: Option<PeerId>,
    pub key_fingerprint: KeyFingerprint,
    #[serde(with = "handoff_core::b64")]
    pub nonce: Vec<u8>,
}

impl ItemRecord {
    pub(crate) fn uebersicht(&self, id: &ItemId, expires_in_secs: i64) -> ItemUebersicht {
        ItemUebersicht {
            id: id.clone(),
            display_name: self.display_name.clone(),
            mime_type: self.mime_type.clone(),
            owner_peer_id: self.owner_peer_id.clone(),
            expires_in_secs,
        }
    }
}

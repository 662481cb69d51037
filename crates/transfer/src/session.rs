//! TransferSession – Blobs, die diese Seite fuer Direktabrufe bereithaelt

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use handoff_core::{abgelaufen, ItemId, PeerId, Uhr};
use handoff_crypto::VersiegelterBlob;
use parking_lot::Mutex;

use crate::konfig::TransferKonfig;

#[derive(Debug, Clone)]
struct GehaltenerBlob {
    blob: VersiegelterBlob,
    mime_type: String,
    erzeugt_am: DateTime<Utc>,
}

/// Sitzungszustand einer Seite (nur im Speicher)
pub struct TransferSession {
    lokal: PeerId,
    blobs: Mutex<HashMap<ItemId, GehaltenerBlob>>,
    uhr: Arc<dyn Uhr>,
    ttl: chrono::Duration,
}

impl TransferSession {
    pub fn neu(lokal: PeerId, uhr: Arc<dyn Uhr>, ttl: Duration) -> Self {
        Self {
            lokal,
            blobs: Mutex::new(HashMap::new()),
            uhr,
            ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::weeks(52_000)),
        }
    }

    /// Sitzung mit `blob_ttl` aus der Konfiguration
    pub fn aus_konfig(lokal: PeerId, uhr: Arc<dyn Uhr>, konfig: &TransferKonfig) -> Self {
        Self::neu(lokal, uhr, konfig.blob_ttl)
    }

    pub fn lokal(&self) -> &PeerId {
        &self.lokal
    }

    pub fn ablegen(&self, id: ItemId, blob: VersiegelterBlob, mime_type: &str) {
        let eintrag = GehaltenerBlob {
            blob,
            mime_type: mime_type.to_string(),
            erzeugt_am: self.uhr.jetzt(),
        };
        self.blobs.lock().insert(id, eintrag);
    }

    /// Gehaltener, nicht abgelaufener Blob
    pub fn blob(&self, id: &ItemId) -> Option<VersiegelterBlob> {
        let jetzt = self.uhr.jetzt();
        self.blobs
            .lock()
            .get(id)
            .filter(|e| !abgelaufen(e.erzeugt_am, jetzt, self.ttl))
            .map(|e| e.blob.clone())
    }

    pub fn mime_type(&self, id: &ItemId) -> Option<String> {
        self.blobs.lock().get(id).map(|e| e.mime_type.clone())
    }

    /// Verwirft Blobs, die aelter als die TTL sind
    pub fn sweep(&self, jetzt: DateTime<Utc>) -> usize {
        let mut blobs = self.blobs.lock();
        let vorher = blobs.len();
        blobs.retain(|_, e| !abgelaufen(e.erzeugt_am, jetzt, self.ttl));
        let entfernt = vorher - blobs.len();
        if entfernt > 0 {
            tracing::debug!(entfernt, verbleibend = blobs.len(), "Sitzungs-Blobs verworfen");
        }
        entfernt
    }

    /// `sweep` mit der Zeit der Sitzungsuhr
    pub fn aufraeumen(&self) -> usize {
        self.sweep(self.uhr.jetzt())
    }

    pub fn anzahl(&self) -> usize {
        self.blobs.lock().len()
    }
}

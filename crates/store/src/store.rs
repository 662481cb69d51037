//! EphemeralStore – verschluesselte Items mit globaler TTL
//!
//! Layout im Storage:
//! ```text
//! files.json   Index: id -> Metadaten (Name, Typ, Zeit, Besitzer, Fingerprint, Nonce)
//! <id>.enc     Chiffrat
//! ```
//!
//! Der Index liegt im Speicher hinter einem `RwLock`. Schreibende Operationen
//! halten den Write-Guard bis `files.json` geschrieben ist. `get` haelt den
//! Read-Guard waehrend das Chiffrat gelesen wird, ein Sweep kann die Datei
//! also nicht unter einem laufenden Lesevorgang entfernen.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use handoff_core::{
    abgelaufen, HandoffError, ItemId, PeerId, Result, StorageBackend, SweepBericht, Uhr,
};
use handoff_crypto::VersiegelterBlob;
use tokio::sync::RwLock;

use crate::types::{ItemRecord, ItemUebersicht, StoredItem};

/// Dateiname des Index im Storage
pub const INDEX_DATEI: &str = "files.json";

const BLOB_ENDUNG: &str = ".enc";

type Index = BTreeMap<ItemId, ItemRecord>;

fn blob_pfad(id: &ItemId) -> String {
    format!("{id}{BLOB_ENDUNG}")
}

/// Kurzlebige Ablage fuer versiegelte Blobs
pub struct EphemeralStore {
    index: RwLock<Index>,
    storage: Arc<dyn StorageBackend>,
    uhr: Arc<dyn Uhr>,
    ttl: chrono::Duration,
    /// Beim Zugriff entfernte Items seit dem letzten `beim_zugriff_entfernt`
    zugriff_entfernt: AtomicUsize,
}

impl EphemeralStore {
    pub fn neu(storage: Arc<dyn StorageBackend>, uhr: Arc<dyn Uhr>, ttl: Duration) -> Self {
        Self {
            index: RwLock::new(BTreeMap::new()),
            storage,
            uhr,
            ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::weeks(52_000)),
            zugriff_entfernt: AtomicUsize::new(0),
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Baut den Index aus `files.json` neu auf.
    ///
    /// Chiffrat-Dateien ohne Index-Eintrag werden dabei entfernt.
    pub async fn laden(&self) -> Result<usize> {
        let geladen: Index = match self.storage.retrieve(INDEX_DATEI).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(HandoffError::NichtGefunden(_)) => BTreeMap::new(),
            Err(e) => return Err(e),
        };

        let mut index = self.index.write().await;
        *index = geladen;

        for datei in self.storage.list("").await? {
            let Some(stamm) = datei.strip_suffix(BLOB_ENDUNG) else {
                continue;
            };
            let verwaist = match ItemId::parse(stamm) {
                Ok(id) => !index.contains_key(&id),
                Err(_) => true,
            };
            if verwaist {
                if let Err(e) = self.storage.delete(&datei).await {
                    tracing::warn!(datei = %datei, fehler = %e, "Verwaistes Chiffrat nicht loeschbar");
                } else {
                    tracing::debug!(datei = %datei, "Verwaistes Chiffrat entfernt");
                }
            }
        }

        tracing::info!(items = index.len(), "Ablage-Index geladen");
        Ok(index.len())
    }

    /// Legt ein versiegeltes Item ab und liefert die neue Id
    pub async fn put(
        &self,
        display_name: &str,
        mime_type: &str,
        blob: VersiegelterBlob,
    ) -> Result<ItemId> {
        let id = ItemId::neu();
        let record = ItemRecord {
            display_name: display_name.to_string(),
            mime_type: mime_type.to_string(),
            created_at: self.uhr.jetzt(),
            owner_peer_id: None,
            key_fingerprint: blob.key_fingerprint,
            nonce: blob.nonce,
        };

        // Chiffrat zuerst, der Index-Eintrag macht das Item erst sichtbar
        self.storage.store(&blob_pfad(&id), &blob.ciphertext).await?;

        let mut index = self.index.write().await;
        index.insert(id.clone(), record);
        if let Err(e) = self.index_schreiben(&index).await {
            index.remove(&id);
            drop(index);
            if let Err(del) = self.storage.delete(&blob_pfad(&id)).await {
                tracing::warn!(item_id = %id, fehler = %del, "Chiffrat nach Fehler nicht entfernt");
            }
            return Err(e);
        }

        tracing::info!(
            item_id = %id,
            mime_type = %mime_type,
            bytes = blob.ciphertext.len(),
            "Item abgelegt"
        );
        Ok(id)
    }

    /// Liefert ein lebendes Item.
    ///
    /// Abgelaufene Items gelten als nicht vorhanden und werden dabei entfernt.
    pub async fn get(&self, id: &ItemId) -> Result<StoredItem> {
        let jetzt = self.uhr.jetzt();
        {
            let index = self.index.read().await;
            let record = index
                .get(id)
                .ok_or_else(|| HandoffError::nicht_gefunden(format!("Item {id}")))?;

            if !abgelaufen(record.created_at, jetzt, self.ttl) {
                let ciphertext = self.storage.retrieve(&blob_pfad(id)).await?;
                return Ok(StoredItem {
                    id: id.clone(),
                    display_name: record.display_name.clone(),
                    mime_type: record.mime_type.clone(),
                    created_at: record.created_at,
                    owner_peer_id: record.owner_peer_id.clone(),
                    blob: VersiegelterBlob {
                        key_fingerprint: record.key_fingerprint.clone(),
                        nonce: record.nonce.clone(),
                        ciphertext,
                    },
                });
            }
        }

        self.abgelaufen_entfernen(id, jetzt).await;
        Err(HandoffError::nicht_gefunden(format!("Item {id}")))
    }

    /// Setzt den Besitzer eines lebenden Items (letzter Schreiber gewinnt)
    pub async fn attach_owner(&self, id: &ItemId, peer: &PeerId) -> Result<()> {
        let jetzt = self.uhr.jetzt();
        let mut index = self.index.write().await;

        let record = match index.get_mut(id) {
            Some(r) if !abgelaufen(r.created_at, jetzt, self.ttl) => r,
            _ => return Err(HandoffError::nicht_gefunden(format!("Item {id}"))),
        };
        if record.owner_peer_id.as_ref() == Some(peer) {
            return Ok(());
        }
        let vorher = record.owner_peer_id.replace(peer.clone());

        if let Err(e) = self.index_schreiben(&index).await {
            if let Some(r) = index.get_mut(id) {
                r.owner_peer_id = vorher;
            }
            return Err(e);
        }

        tracing::info!(item_id = %id, peer_id = %peer, "Besitzer gesetzt");
        Ok(())
    }

    /// Alle lebenden Items, nach Erstellungszeit sortiert
    pub async fn list(&self, jetzt: DateTime<Utc>) -> Vec<ItemUebersicht> {
        let index = self.index.read().await;
        let mut lebend: Vec<(&ItemId, &ItemRecord)> = index
            .iter()
            .filter(|(_, r)| !abgelaufen(r.created_at, jetzt, self.ttl))
            .collect();
        lebend.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then(a.0.cmp(b.0)));
        lebend
            .into_iter()
            .map(|(id, r)| {
                let rest = self.ttl - (jetzt - r.created_at);
                r.uebersicht(id, rest.num_seconds().max(0))
            })
            .collect()
    }

    /// Entfernt alle abgelaufenen Items. Gibt nie einen Fehler zurueck.
    ///
    /// Kann ein Chiffrat nicht geloescht werden, bleibt der (unsichtbare)
    /// Index-Eintrag stehen und der naechste Lauf versucht es erneut.
    pub async fn sweep(&self, jetzt: DateTime<Utc>) -> SweepBericht {
        let mut index = self.index.write().await;
        let faellig: Vec<ItemId> = index
            .iter()
            .filter(|(_, r)| abgelaufen(r.created_at, jetzt, self.ttl))
            .map(|(id, _)| id.clone())
            .collect();

        let mut bericht = SweepBericht::default();
        for id in faellig {
            match self.storage.delete(&blob_pfad(&id)).await {
                Ok(()) => {
                    index.remove(&id);
                    bericht.entfernt += 1;
                    tracing::info!(item_id = %id, "Item abgelaufen");
                }
                Err(e) => {
                    bericht.fehlgeschlagen += 1;
                    tracing::warn!(item_id = %id, fehler = %e, "Chiffrat nicht loeschbar, naechster Lauf");
                }
            }
        }

        if bericht.entfernt > 0 {
            if let Err(e) = self.index_schreiben(&index).await {
                tracing::warn!(fehler = %e, "Index nach Sweep nicht geschrieben");
            }
        }
        bericht.verbleibend = index.len() - bericht.fehlgeschlagen;
        bericht
    }

    /// Anzahl der Index-Eintraege (inkl. noch nicht entfernter abgelaufener)
    pub async fn anzahl(&self) -> usize {
        self.index.read().await.len()
    }

    /// Anzahl der zum Zeitpunkt `jetzt` nicht abgelaufenen Items
    pub async fn lebend(&self, jetzt: DateTime<Utc>) -> usize {
        self.index
            .read()
            .await
            .values()
            .filter(|r| !abgelaufen(r.created_at, jetzt, self.ttl))
            .count()
    }

    /// Liefert die seit dem letzten Aufruf per Lazy-Expiry entfernten Items
    /// und setzt den Zaehler zurueck
    pub fn beim_zugriff_entfernt(&self) -> usize {
        self.zugriff_entfernt.swap(0, Ordering::Relaxed)
    }

    async fn abgelaufen_entfernen(&self, id: &ItemId, jetzt: DateTime<Utc>) {
        let mut index = self.index.write().await;
        let noch_abgelaufen = index
            .get(id)
            .is_some_and(|r| abgelaufen(r.created_at, jetzt, self.ttl));
        if !noch_abgelaufen {
            return;
        }

        if let Err(e) = self.storage.delete(&blob_pfad(id)).await {
            tracing::warn!(item_id = %id, fehler = %e, "Abgelaufenes Chiffrat nicht loeschbar");
            return;
        }
        index.remove(id);
        self.zugriff_entfernt.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.index_schreiben(&index).await {
            tracing::warn!(fehler = %e, "Index nach Lazy-Expiry nicht geschrieben");
        }
        tracing::info!(item_id = %id, "Item abgelaufen (beim Zugriff)");
    }

    async fn index_schreiben(&self, index: &Index) -> Result<()> {
        let json = serde_json::to_vec_pretty(index)?;
        self.storage.store(INDEX_DATEI, &json).await
    }
}

impl std::fmt::Debug for EphemeralStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

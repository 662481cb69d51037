//! Test-Hilfen: In-Memory-Transport und einfache Gegenstellen
//!
//! Verfuegbar hinter dem Feature `test-util` oder in `#[cfg(test)]`.
//! `SpeicherNetz` verbindet Sitzungen im selben Prozess ueber tokio-mpsc.
//! Mit `erreichbar_setzen(false)` kommt keine Verbindung mehr zustande, der
//! Downloader laeuft dann in sein Zeitlimit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use handoff_core::{HandoffError, ItemId, PeerId};
use handoff_crypto::{versiegeln, Schluessel};
use handoff_signaling::SignalingRelay;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{TransferError, TransferResult};
use crate::kollaborateure::{
    DirektAngebot, DirektTransport, DirektVerbindung, ItemInfo, ItemVerzeichnis, SchluesselQuelle,
    ServerAbruf, ServerItem, SignalKanal,
};

const KANAL_GROESSE: usize = 16;

#[derive(Serialize, Deserialize)]
struct Handshake {
    verbindung: Uuid,
}

#[derive(Default)]
struct NetzInner {
    /// Von `annehmen` erzeugte Enden der anfragenden Seite
    wartend: Mutex<HashMap<Uuid, SpeicherVerbindung>>,
    unerreichbar: AtomicBool,
    verbindungen: AtomicUsize,
}

/// Transport im Speicher; Klone teilen dasselbe Netz
#[derive(Clone, Default)]
pub struct SpeicherNetz {
    inner: Arc<NetzInner>,
}

impl SpeicherNetz {
    pub fn neu() -> Self {
        Self::default()
    }

    /// `false`: Angebote werden beantwortet, aber keine Verbindung kommt zustande
    pub fn erreichbar_setzen(&self, erreichbar: bool) {
        self.inner.unerreichbar.store(!erreichbar, Ordering::SeqCst);
    }

    /// Anzahl erfolgreich aufgebauter Verbindungen
    pub fn verbindungen(&self) -> usize {
        self.inner.verbindungen.load(Ordering::SeqCst)
    }

    /// Angenommene Angebote, deren Anfrager sich noch nicht verbunden hat
    pub fn wartende(&self) -> usize {
        self.inner.wartend.lock().len()
    }
}

#[async_trait]
impl DirektTransport for SpeicherNetz {
    async fn angebot(&self) -> TransferResult<Box<dyn DirektAngebot>> {
        Ok(Box::new(SpeicherAngebot {
            id: Uuid::new_v4(),
            netz: self.inner.clone(),
        }))
    }

    async fn annehmen(&self, angebot: &[u8]) -> TransferResult<(Vec<u8>, Box<dyn DirektVerbindung>)> {
        let Handshake { verbindung } = serde_json::from_slice(angebot)?;
        let (a_tx, a_rx) = mpsc::channel(KANAL_GROESSE);
        let (b_tx, b_rx) = mpsc::channel(KANAL_GROESSE);

        self.inner.wartend.lock().insert(
            verbindung,
            SpeicherVerbindung {
                tx: Some(a_tx),
                rx: b_rx,
                wartend_eintrag: None,
            },
        );
        let antwort = serde_json::to_vec(&Handshake { verbindung })?;
        Ok((
            antwort,
            Box::new(SpeicherVerbindung {
                tx: Some(b_tx),
                rx: a_rx,
                wartend_eintrag: Some((self.inner.clone(), verbindung)),
            }),
        ))
    }
}

struct SpeicherAngebot {
    id: Uuid,
    netz: Arc<NetzInner>,
}

#[async_trait]
impl DirektAngebot for SpeicherAngebot {
    fn daten(&self) -> Vec<u8> {
        serde_json::to_vec(&Handshake { verbindung: self.id }).unwrap_or_default()
    }

    async fn verbinden(self: Box<Self>, antwort: &[u8]) -> TransferResult<Box<dyn DirektVerbindung>> {
        let Handshake { verbindung } = serde_json::from_slice(antwort)?;
        if verbindung != self.id {
            return Err(TransferError::Transport("Antwort gehoert zu anderem Angebot".into()));
        }
        if self.netz.unerreichbar.load(Ordering::SeqCst) {
            // Wie ein ICE-Aufbau, der nie fertig wird
            std::future::pending::<()>().await;
        }
        let ende = self
            .netz
            .wartend
            .lock()
            .remove(&verbindung)
            .ok_or_else(|| TransferError::Transport("Gegenseite nicht bereit".into()))?;
        self.netz.verbindungen.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ende))
    }
}

/// Ein Ende einer Speicher-Verbindung
pub struct SpeicherVerbindung {
    tx: Option<mpsc::Sender<Vec<u8>>>,
    rx: mpsc::Receiver<Vec<u8>>,
    /// Nur auf der annehmenden Seite: das geparkte Gegenstueck in `wartend`
    wartend_eintrag: Option<(Arc<NetzInner>, Uuid)>,
}

#[async_trait]
impl DirektVerbindung for SpeicherVerbindung {
    async fn senden(&mut self, daten: Vec<u8>) -> TransferResult<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| TransferError::Transport("Verbindung geschlossen".into()))?;
        tx.send(daten)
            .await
            .map_err(|_| TransferError::Transport("Gegenseite getrennt".into()))
    }

    async fn empfangen(&mut self) -> TransferResult<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }

    async fn schliessen(&mut self) {
        self.tx = None;
        self.rx.close();
        if let Some((netz, verbindung)) = self.wartend_eintrag.take() {
            netz.wartend.lock().remove(&verbindung);
        }
    }
}

/// Signal-Kanal direkt auf einem `SignalingRelay` im selben Prozess
#[derive(Clone)]
pub struct LokalesRelay(pub Arc<SignalingRelay>);

#[async_trait]
impl SignalKanal for LokalesRelay {
    async fn senden(&self, an: &PeerId, daten: Vec<u8>) -> TransferResult<()> {
        Ok(self.0.post(an, daten).await?)
    }

    async fn abholen(&self, peer: &PeerId) -> TransferResult<Option<Vec<u8>>> {
        match self.0.poll(peer).await {
            Ok(daten) => Ok(Some(daten)),
            Err(HandoffError::NichtGefunden(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Feste Schluesselliste `[current, previous?]`
#[derive(Clone)]
pub struct FesteSchluessel(pub Arc<Mutex<Vec<Schluessel>>>);

impl FesteSchluessel {
    pub fn neu(schluessel: Vec<Schluessel>) -> Self {
        Self(Arc::new(Mutex::new(schluessel)))
    }

    /// Simuliert eine Rotation: neuer Schluessel vorne, nur ein Vorgaenger
    pub fn rotieren(&self) -> Schluessel {
        let neu = Schluessel::zufaellig();
        let mut liste = self.0.lock();
        liste.insert(0, neu.clone());
        liste.truncate(2);
        neu
    }
}

#[async_trait]
impl SchluesselQuelle for FesteSchluessel {
    async fn gueltige_schluessel(&self) -> TransferResult<Vec<Schluessel>> {
        Ok(self.0.lock().clone())
    }
}

/// Minimaler Server im Speicher: versiegelt Uploads mit dem aktuellen Schluessel
pub struct SpeicherServer {
    schluessel: FesteSchluessel,
    items: Mutex<HashMap<ItemId, (ServerItem, Option<PeerId>)>>,
    abrufe: AtomicUsize,
}

impl SpeicherServer {
    pub fn neu(schluessel: FesteSchluessel) -> Self {
        Self {
            schluessel,
            items: Mutex::new(HashMap::new()),
            abrufe: AtomicUsize::new(0),
        }
    }

    /// Wie oft der Fallback-Download aufgerufen wurde
    pub fn abrufe(&self) -> usize {
        self.abrufe.load(Ordering::SeqCst)
    }

    pub fn entfernen(&self, id: &ItemId) {
        self.items.lock().remove(id);
    }
}

#[async_trait]
impl ServerAbruf for SpeicherServer {
    async fn item_laden(&self, id: &ItemId) -> TransferResult<ServerItem> {
        self.abrufe.fetch_add(1, Ordering::SeqCst);
        self.items
            .lock()
            .get(id)
            .map(|(item, _)| item.clone())
            .ok_or_else(|| TransferError::NichtGefunden(format!("Item {id}")))
    }
}

#[async_trait]
impl ItemVerzeichnis for SpeicherServer {
    async fn hochladen(&self, name: &str, mime_type: &str, daten: Vec<u8>) -> TransferResult<ItemId> {
        let aktuell = self
            .schluessel
            .gueltige_schluessel()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TransferError::Server("keine Schluessel".into()))?;
        let id = ItemId::neu();
        let item = ServerItem {
            id: id.clone(),
            display_name: name.to_string(),
            mime_type: mime_type.to_string(),
            blob: versiegeln(&aktuell, &daten)?,
        };
        self.items.lock().insert(id.clone(), (item, None));
        Ok(id)
    }

    async fn besitzer_setzen(&self, id: &ItemId, peer: &PeerId) -> TransferResult<()> {
        let mut items = self.items.lock();
        let eintrag = items
            .get_mut(id)
            .ok_or_else(|| TransferError::NichtGefunden(format!("Item {id}")))?;
        eintrag.1 = Some(peer.clone());
        Ok(())
    }

    async fn items(&self) -> TransferResult<Vec<ItemInfo>> {
        Ok(self
            .items
            .lock()
            .values()
            .map(|(item, besitzer)| ItemInfo {
                id: item.id.clone(),
                display_name: item.display_name.clone(),
                mime_type: item.mime_type.clone(),
                owner_peer_id: besitzer.clone(),
                expires_in_secs: 300,
            })
            .collect())
    }
}

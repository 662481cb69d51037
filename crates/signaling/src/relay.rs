//! SignalingRelay – eine Mailbox pro Peer
//!
//! Jede Mailbox haelt genau einen Eintrag (letzter Schreiber gewinnt) und
//! wird unter `signals/<peerId>.json` persistiert. `poll` liest, ohne zu
//! verbrauchen. Abgelaufene Eintraege verhalten sich wie fehlende.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use handoff_core::{
    abgelaufen, HandoffError, PeerId, Result, StorageBackend, SweepBericht, Uhr,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Unterverzeichnis der Mailboxen im Storage
pub const SIGNAL_VERZEICHNIS: &str = "signals";

/// Standard-Obergrenze fuer ein Handshake-Paket (64 KiB)
pub const STANDARD_MAX_PAYLOAD: usize = 64 * 1024;

fn mailbox_pfad(peer: &PeerId) -> String {
    format!("{SIGNAL_VERZEICHNIS}/{peer}.json")
}

/// Inhalt einer Mailbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub peer_id: PeerId,
    #[serde(with = "handoff_core::b64")]
    pub payload: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

/// Mailbox-Relay fuer Handshake-Pakete
pub struct SignalingRelay {
    mailboxen: RwLock<HashMap<PeerId, MailboxEntry>>,
    storage: Arc<dyn StorageBackend>,
    uhr: Arc<dyn Uhr>,
    ttl: chrono::Duration,
    max_payload: usize,
}

impl SignalingRelay {
    pub fn neu(storage: Arc<dyn StorageBackend>, uhr: Arc<dyn Uhr>, ttl: Duration) -> Self {
        Self {
            mailboxen: RwLock::new(HashMap::new()),
            storage,
            uhr,
            ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::weeks(52_000)),
            max_payload: STANDARD_MAX_PAYLOAD,
        }
    }

    /// Setzt die maximale Paketgroesse
    pub fn mit_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Liest alle persistierten Mailboxen ein
    pub async fn laden(&self) -> Result<usize> {
        let mut mailboxen = self.mailboxen.write().await;
        mailboxen.clear();

        for datei in self.storage.list(SIGNAL_VERZEICHNIS).await? {
            let Some(stamm) = datei.strip_suffix(".json") else {
                continue;
            };
            let pfad = format!("{SIGNAL_VERZEICHNIS}/{datei}");
            let eintrag = match self.storage.retrieve(&pfad).await {
                Ok(bytes) => serde_json::from_slice::<MailboxEntry>(&bytes).ok(),
                Err(e) => {
                    tracing::warn!(datei = %pfad, fehler = %e, "Mailbox nicht lesbar");
                    continue;
                }
            };

            match eintrag {
                Some(e) if e.peer_id.as_str() == stamm => {
                    mailboxen.insert(e.peer_id.clone(), e);
                }
                _ => {
                    tracing::warn!(datei = %pfad, "Ungueltige Mailbox-Datei wird entfernt");
                    if let Err(e) = self.storage.delete(&pfad).await {
                        tracing::warn!(datei = %pfad, fehler = %e, "Mailbox-Datei nicht loeschbar");
                    }
                }
            }
        }

        tracing::info!(mailboxen = mailboxen.len(), "Signal-Mailboxen geladen");
        Ok(mailboxen.len())
    }

    /// Legt ein Paket in der Mailbox von `peer` ab (ueberschreibt)
    pub async fn post(&self, peer: &PeerId, payload: Vec<u8>) -> Result<()> {
        if payload.is_empty() {
            return Err(HandoffError::validierung("signalData darf nicht leer sein"));
        }
        if payload.len() > self.max_payload {
            return Err(HandoffError::validierung(format!(
                "signalData zu gross: {} Bytes (Maximum {})",
                payload.len(),
                self.max_payload
            )));
        }

        let eintrag = MailboxEntry {
            peer_id: peer.clone(),
            payload,
            stored_at: self.uhr.jetzt(),
        };
        let json = serde_json::to_vec(&eintrag)?;

        let mut mailboxen = self.mailboxen.write().await;
        self.storage.store(&mailbox_pfad(peer), &json).await?;
        let bytes = eintrag.payload.len();
        let vorher = mailboxen.insert(peer.clone(), eintrag);

        tracing::info!(
            peer_id = %peer,
            bytes,
            ueberschrieben = vorher.is_some(),
            "Signal abgelegt"
        );
        Ok(())
    }

    /// Liest das Paket fuer `peer`, ohne es zu entfernen
    pub async fn poll(&self, peer: &PeerId) -> Result<Vec<u8>> {
        let jetzt = self.uhr.jetzt();
        {
            let mailboxen = self.mailboxen.read().await;
            let eintrag = mailboxen
                .get(peer)
                .ok_or_else(|| HandoffError::nicht_gefunden(format!("Kein Signal fuer {peer}")))?;
            if !abgelaufen(eintrag.stored_at, jetzt, self.ttl) {
                return Ok(eintrag.payload.clone());
            }
        }

        self.abgelaufen_entfernen(peer, jetzt).await;
        Err(HandoffError::nicht_gefunden(format!("Kein Signal fuer {peer}")))
    }

    /// Entfernt alle abgelaufenen Mailbox-Eintraege. Gibt nie einen Fehler zurueck.
    pub async fn sweep(&self, jetzt: DateTime<Utc>) -> SweepBericht {
        let mut mailboxen = self.mailboxen.write().await;
        let faellig: Vec<PeerId> = mailboxen
            .values()
            .filter(|e| abgelaufen(e.stored_at, jetzt, self.ttl))
            .map(|e| e.peer_id.clone())
            .collect();

        let mut bericht = SweepBericht::default();
        for peer in faellig {
            match self.storage.delete(&mailbox_pfad(&peer)).await {
                Ok(()) => {
                    mailboxen.remove(&peer);
                    bericht.entfernt += 1;
                    tracing::debug!(peer_id = %peer, "Signal abgelaufen");
                }
                Err(e) => {
                    bericht.fehlgeschlagen += 1;
                    tracing::warn!(peer_id = %peer, fehler = %e, "Mailbox nicht loeschbar, naechster Lauf");
                }
            }
        }
        bericht.verbleibend = mailboxen.len() - bericht.fehlgeschlagen;
        bericht
    }

    pub async fn anzahl(&self) -> usize {
        self.mailboxen.read().await.len()
    }

    async fn abgelaufen_entfernen(&self, peer: &PeerId, jetzt: DateTime<Utc>) {
        let mut mailboxen = self.mailboxen.write().await;
        let noch_abgelaufen = mailboxen
            .get(peer)
            .is_some_and(|e| abgelaufen(e.stored_at, jetzt, self.ttl));
        if !noch_abgelaufen {
            return;
        }
        match self.storage.delete(&mailbox_pfad(peer)).await {
            Ok(()) => {
                mailboxen.remove(peer);
            }
            Err(e) => {
                tracing::warn!(peer_id = %peer, fehler = %e, "Abgelaufene Mailbox nicht loeschbar");
            }
        }
    }
}

impl std::fmt::Debug for SignalingRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingRelay")
            .field("ttl", &self.ttl)
            .field("max_payload", &self.max_payload)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::{DiskStorage, RamStorage, TestUhr};

    const TTL: u64 = 300;

    fn relay() -> (SignalingRelay, Arc<RamStorage>, Arc<TestUhr>) {
        let storage = Arc::new(RamStorage::new());
        let uhr = Arc::new(TestUhr::fest());
        let relay = SignalingRelay::neu(storage.clone(), uhr.clone(), Duration::from_secs(TTL));
        (relay, storage, uhr)
    }

    fn peer(s: &str) -> PeerId {
        PeerId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn letzter_schreiber_gewinnt() {
        let (relay, _storage, _uhr) = relay();
        relay.post(&peer("peerY"), b"X".to_vec()).await.unwrap();
        relay.post(&peer("peerY"), b"Y".to_vec()).await.unwrap();
        assert_eq!(relay.poll(&peer("peerY")).await.unwrap(), b"Y");
    }

    #[tokio::test]
    async fn poll_verbraucht_nicht() {
        let (relay, _storage, _uhr) = relay();
        relay.post(&peer("peerY"), b"offer".to_vec()).await.unwrap();
        assert_eq!(relay.poll(&peer("peerY")).await.unwrap(), b"offer");
        assert_eq!(relay.poll(&peer("peerY")).await.unwrap(), b"offer");
    }

    #[tokio::test]
    async fn angebot_innerhalb_und_nach_ttl() {
        let dir = tempfile::tempdir().expect("Temp-Verzeichnis konnte nicht erstellt werden");
        let uhr = Arc::new(TestUhr::fest());
        let relay = SignalingRelay::neu(
            Arc::new(DiskStorage::new(dir.path())),
            uhr.clone(),
            Duration::from_secs(TTL),
        );

        relay.post(&peer("peerY"), b"offer".to_vec()).await.unwrap();
        assert!(dir.path().join("signals/peerY.json").exists());

        uhr.vorstellen(TTL as i64);
        assert_eq!(relay.poll(&peer("peerY")).await.unwrap(), b"offer");

        uhr.vorstellen(1);
        assert!(matches!(
            relay.poll(&peer("peerY")).await,
            Err(HandoffError::NichtGefunden(_))
        ));
        assert!(!dir.path().join("signals/peerY.json").exists());
    }

    #[tokio::test]
    async fn leere_oder_zu_grosse_pakete() {
        let (relay, _storage, _uhr) = relay();
        let relay = relay.mit_max_payload(4);
        assert!(matches!(
            relay.post(&peer("p"), Vec::new()).await,
            Err(HandoffError::Validierung(_))
        ));
        assert!(matches!(
            relay.post(&peer("p"), vec![0; 5]).await,
            Err(HandoffError::Validierung(_))
        ));
        assert!(relay.post(&peer("p"), vec![0; 4]).await.is_ok());
    }

    #[tokio::test]
    async fn unbekannter_peer() {
        let (relay, _storage, _uhr) = relay();
        assert!(matches!(
            relay.poll(&peer("niemand")).await,
            Err(HandoffError::NichtGefunden(_))
        ));
    }

    #[tokio::test]
    async fn speicherfehler_laesst_mailbox_unveraendert() {
        let (relay, storage, _uhr) = relay();
        relay.post(&peer("p"), b"alt".to_vec()).await.unwrap();
        storage.fehler_simulieren(true);
        assert!(matches!(
            relay.post(&peer("p"), b"neu".to_vec()).await,
            Err(HandoffError::Speicher(_))
        ));
        assert_eq!(relay.poll(&peer("p")).await.unwrap(), b"alt");
    }

    #[tokio::test]
    async fn sweep_entfernt_abgelaufene() {
        let (relay, storage, uhr) = relay();
        relay.post(&peer("alt"), b"1".to_vec()).await.unwrap();
        uhr.vorstellen(250);
        relay.post(&peer("neu"), b"2".to_vec()).await.unwrap();
        uhr.vorstellen(51);

        let bericht = relay.sweep(uhr.jetzt()).await;
        assert_eq!(bericht.entfernt, 1);
        assert_eq!(bericht.verbleibend, 1);
        assert!(!storage.enthaelt("signals/alt.json"));
        assert!(storage.enthaelt("signals/neu.json"));
    }

    #[tokio::test]
    async fn sweep_wiederholt_fehlgeschlagene_loeschung() {
        let (relay, storage, uhr) = relay();
        relay.post(&peer("p"), b"1".to_vec()).await.unwrap();
        uhr.vorstellen(TTL as i64 + 1);

        storage.fehler_simulieren(true);
        assert_eq!(relay.sweep(uhr.jetzt()).await.fehlgeschlagen, 1);
        storage.fehler_simulieren(false);
        assert_eq!(relay.sweep(uhr.jetzt()).await.entfernt, 1);
        assert_eq!(relay.anzahl().await, 0);
    }

    #[tokio::test]
    async fn laden_nach_neustart() {
        let (relay, storage, uhr) = relay();
        relay.post(&peer("peerA"), b"angebot".to_vec()).await.unwrap();
        storage.store("signals/kaputt.json", b"{").await.unwrap();

        let neu = SignalingRelay::neu(storage.clone(), uhr, Duration::from_secs(TTL));
        assert_eq!(neu.laden().await.unwrap(), 1);
        assert_eq!(neu.poll(&peer("peerA")).await.unwrap(), b"angebot");
        assert!(!storage.enthaelt("signals/kaputt.json"));
    }
}

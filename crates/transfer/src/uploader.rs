//! Uploader – teilt Dateien und bedient Direktanfragen
//!
//! Solange die Seite offen ist, liest der Uploader im festen Takt seine
//! Mailbox, beantwortet neue Angebote ueber den Transport und liefert
//! angefragte Chiffrate ueber die Datenverbindung aus.

use std::sync::Arc;
use std::time::Duration;

use handoff_core::ItemId;
use handoff_crypto::versiegeln;
use handoff_signaling::{SignalArt, SignalNachricht};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{TransferError, TransferResult};
use crate::kollaborateure::{
    DirektAnfrage, DirektTransport, DirektVerbindung, ItemVerzeichnis, SchluesselQuelle,
    SignalKanal,
};
use crate::konfig::TransferKonfig;
use crate::session::TransferSession;

/// Haltende Seite einer Uebergabe
pub struct Uploader {
    session: Arc<TransferSession>,
    konfig: TransferKonfig,
    schluessel: Arc<dyn SchluesselQuelle>,
    signal: Arc<dyn SignalKanal>,
    verzeichnis: Arc<dyn ItemVerzeichnis>,
    transport: Arc<dyn DirektTransport>,
    letzte_sitzung: Mutex<Option<Uuid>>,
}

impl Uploader {
    pub fn neu(
        session: Arc<TransferSession>,
        konfig: TransferKonfig,
        schluessel: Arc<dyn SchluesselQuelle>,
        signal: Arc<dyn SignalKanal>,
        verzeichnis: Arc<dyn ItemVerzeichnis>,
        transport: Arc<dyn DirektTransport>,
    ) -> Self {
        Self {
            session,
            konfig,
            schluessel,
            signal,
            verzeichnis,
            transport,
            letzte_sitzung: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<TransferSession> {
        &self.session
    }

    /// Teilt eine Datei.
    ///
    /// Versiegelt eine lokale Kopie unter dem aktuellen Schluessel, laedt die
    /// Rohdaten hoch und traegt die eigene Peer-Id als Besitzer ein.
    pub async fn datei_teilen(
        &self,
        name: &str,
        mime_type: &str,
        daten: Vec<u8>,
    ) -> TransferResult<ItemId> {
        let schluessel = self.schluessel.gueltige_schluessel().await?;
        let aktuell = schluessel
            .first()
            .ok_or_else(|| TransferError::Server("keine Schluessel verteilt".into()))?;
        let blob = versiegeln(aktuell, &daten)?;

        let id = self.verzeichnis.hochladen(name, mime_type, daten).await?;
        self.session.ablegen(id.clone(), blob, mime_type);
        self.verzeichnis
            .besitzer_setzen(&id, self.session.lokal())
            .await?;

        tracing::info!(item_id = %id, peer_id = %self.session.lokal(), "Datei geteilt");
        Ok(id)
    }

    /// Ein Durchlauf: Sitzung aufraeumen, Mailbox lesen, neues Angebot beantworten.
    ///
    /// Liefert `true`, wenn ein Angebot beantwortet wurde.
    pub async fn einmal_pruefen(&self) -> TransferResult<bool> {
        self.session.aufraeumen();

        let lokal = self.session.lokal();
        let Some(bytes) = self.signal.abholen(lokal).await? else {
            return Ok(false);
        };
        let angebot = match SignalNachricht::aus_bytes(&bytes) {
            Ok(n) if n.art == SignalArt::Angebot => n,
            Ok(_) => return Ok(false),
            Err(e) => {
                tracing::debug!(fehler = %e, "Unlesbare Nachricht in der Mailbox");
                return Ok(false);
            }
        };

        // Poll verbraucht nicht: dasselbe Angebot nur einmal beantworten
        {
            let mut letzte = self.letzte_sitzung.lock();
            if *letzte == Some(angebot.sitzung) {
                return Ok(false);
            }
            *letzte = Some(angebot.sitzung);
        }

        let (antwort, verbindung) = self.transport.annehmen(&angebot.daten).await?;
        let antwort = SignalNachricht::antwort(lokal.clone(), angebot.sitzung, antwort);
        self.signal.senden(&angebot.von, antwort.als_bytes()?).await?;
        tracing::debug!(von = %angebot.von, sitzung = %angebot.sitzung, "Angebot beantwortet");

        tokio::spawn(bedienen(
            self.session.clone(),
            verbindung,
            self.konfig.direkt_timeout,
        ));
        Ok(true)
    }

    /// Startet die Poll-Schleife bis `abbruch` ausgeloest wird
    pub fn starten(self: Arc<Self>, abbruch: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut takt = tokio::time::interval(self.konfig.poll_intervall);
            loop {
                tokio::select! {
                    _ = abbruch.cancelled() => break,
                    _ = takt.tick() => {
                        if let Err(e) = self.einmal_pruefen().await {
                            tracing::debug!(fehler = %e, "Mailbox-Durchlauf fehlgeschlagen");
                        }
                    }
                }
            }
            tracing::info!(peer_id = %self.session.lokal(), "Uploader beendet");
        })
    }
}

/// Beantwortet Anfragen auf einer Datenverbindung, bis die Gegenseite
/// schliesst oder `leerlauf` lang keine Anfrage kommt
async fn bedienen(
    session: Arc<TransferSession>,
    mut verbindung: Box<dyn DirektVerbindung>,
    leerlauf: Duration,
) {
    loop {
        let bytes = match tokio::time::timeout(leerlauf, verbindung.empfangen()).await {
            Err(_) => {
                tracing::debug!("Keine Anfrage auf der Datenverbindung, wird geschlossen");
                break;
            }
            Ok(Ok(Some(b))) => b,
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                tracing::debug!(fehler = %e, "Datenverbindung abgebrochen");
                break;
            }
        };

        let anfrage: DirektAnfrage = match serde_json::from_slice(&bytes) {
            Ok(a) => a,
            Err(e) => {
                tracing::debug!(fehler = %e, "Ungueltige Direktanfrage");
                continue;
            }
        };

        let Some(blob) = session.blob(&anfrage.item_id) else {
            tracing::warn!(item_id = %anfrage.item_id, "Angefragtes Item wird hier nicht gehalten");
            continue;
        };
        let json = match serde_json::to_vec(&blob) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(fehler = %e, "Blob nicht serialisierbar");
                continue;
            }
        };
        if let Err(e) = verbindung.senden(json).await {
            tracing::debug!(fehler = %e, "Senden ueber Datenverbindung fehlgeschlagen");
            break;
        }
        tracing::info!(
            item_id = %anfrage.item_id,
            mime_type = %session.mime_type(&anfrage.item_id).unwrap_or_default(),
            "Chiffrat direkt ausgeliefert"
        );
    }
    verbindung.schliessen().await;
}

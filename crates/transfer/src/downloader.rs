//! Downloader – Direktversuch mit Zeitlimit, danach Server-Fallback
//!
//! Der Ablauf wird vom `DownloadAutomat` bestimmt; diese Datei fuehrt nur
//! die Seiteneffekte des jeweiligen Zustands aus und meldet das Ergebnis
//! als Ereignis zurueck.

use std::sync::Arc;

use handoff_core::{ItemId, PeerId};
use handoff_crypto::{oeffnen_mit_schluesseln, VersiegelterBlob};
use handoff_signaling::SignalNachricht;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::automat::{DownloadAutomat, DownloadZustand, Ereignis, Weg};
use crate::error::{TransferError, TransferResult};
use crate::kollaborateure::{
    DirektAnfrage, DirektTransport, DirektVerbindung, ItemInfo, SchluesselQuelle, ServerAbruf,
    SignalKanal,
};
use crate::konfig::TransferKonfig;

/// Was heruntergeladen werden soll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadAuftrag {
    pub item_id: ItemId,
    /// Lebender Besitzer laut Liste, falls bekannt
    pub besitzer: Option<PeerId>,
}

impl From<&ItemInfo> for DownloadAuftrag {
    fn from(info: &ItemInfo) -> Self {
        Self {
            item_id: info.id.clone(),
            besitzer: info.owner_peer_id.clone(),
        }
    }
}

/// Ergebnis eines Downloads samt durchlaufener Zustaende
#[derive(Debug)]
pub struct DownloadBericht {
    pub item_id: ItemId,
    pub verlauf: Vec<DownloadZustand>,
    pub fallbacks: usize,
    pub ergebnis: TransferResult<Vec<u8>>,
}

impl DownloadBericht {
    /// Weg, ueber den das Chiffrat geliefert wurde (nur bei Erfolg)
    pub fn weg(&self) -> Option<Weg> {
        self.verlauf.iter().rev().find_map(|z| match z {
            DownloadZustand::Geliefert { weg } => Some(*weg),
            _ => None,
        })
    }

    pub fn klartext(&self) -> Option<&[u8]> {
        self.ergebnis.as_deref().ok()
    }
}

/// Fuehrt Downloads fuer eine lokale Sitzung aus
pub struct Downloader {
    lokal: PeerId,
    konfig: TransferKonfig,
    schluessel: Arc<dyn SchluesselQuelle>,
    signal: Arc<dyn SignalKanal>,
    server: Arc<dyn ServerAbruf>,
    transport: Arc<dyn DirektTransport>,
}

impl Downloader {
    pub fn neu(
        lokal: PeerId,
        konfig: TransferKonfig,
        schluessel: Arc<dyn SchluesselQuelle>,
        signal: Arc<dyn SignalKanal>,
        server: Arc<dyn ServerAbruf>,
        transport: Arc<dyn DirektTransport>,
    ) -> Self {
        Self {
            lokal,
            konfig,
            schluessel,
            signal,
            server,
            transport,
        }
    }

    pub async fn herunterladen(&self, auftrag: &DownloadAuftrag) -> DownloadBericht {
        self.herunterladen_mit_abbruch(auftrag, CancellationToken::new())
            .await
    }

    /// Wie `herunterladen`; `abbruch` beendet nur den Direktversuch vorzeitig.
    pub async fn herunterladen_mit_abbruch(
        &self,
        auftrag: &DownloadAuftrag,
        abbruch: CancellationToken,
    ) -> DownloadBericht {
        let mut automat = DownloadAutomat::neu();
        let besitzer = auftrag.besitzer.as_ref().filter(|b| **b != self.lokal);
        automat.verarbeiten(Ereignis::Ausgewaehlt {
            direkt_moeglich: besitzer.is_some(),
        });

        let mut blob: Option<VersiegelterBlob> = None;
        let mut ergebnis: TransferResult<Vec<u8>> = Err(TransferError::Abgebrochen);

        loop {
            let ereignis = match automat.zustand() {
                DownloadZustand::DirektVersuch { versuch } => {
                    let Some(besitzer) = besitzer else {
                        automat.verarbeiten(Ereignis::DirektGescheitert { versuch });
                        continue;
                    };
                    match self
                        .direkt_versuchen(besitzer, &auftrag.item_id, &abbruch)
                        .await
                    {
                        Ok(b) => {
                            blob = Some(b);
                            Ereignis::DirektGeliefert { versuch }
                        }
                        Err(e) => {
                            tracing::info!(
                                item_id = %auftrag.item_id,
                                besitzer = %besitzer,
                                grund = %e,
                                "Direktversuch gescheitert, Server-Fallback"
                            );
                            Ereignis::DirektGescheitert { versuch }
                        }
                    }
                }
                DownloadZustand::ServerFallback => {
                    match self.server.item_laden(&auftrag.item_id).await {
                        Ok(item) => {
                            blob = Some(item.blob);
                            Ereignis::ServerGeliefert
                        }
                        Err(e) => {
                            tracing::warn!(item_id = %auftrag.item_id, fehler = %e, "Server-Abruf fehlgeschlagen");
                            ergebnis = Err(e);
                            Ereignis::ServerGescheitert
                        }
                    }
                }
                DownloadZustand::Entschluesseln { weg } => match self.entschluesseln(blob.take()).await {
                    Ok(klartext) => {
                        tracing::info!(
                            item_id = %auftrag.item_id,
                            weg = ?weg,
                            bytes = klartext.len(),
                            "Item geliefert"
                        );
                        ergebnis = Ok(klartext);
                        Ereignis::Entschluesselt
                    }
                    Err(e) => {
                        tracing::warn!(item_id = %auftrag.item_id, fehler = %e, "Entschluesselung fehlgeschlagen");
                        ergebnis = Err(e);
                        Ereignis::EntschluesselungFehlgeschlagen
                    }
                },
                DownloadZustand::Auswahl
                | DownloadZustand::Geliefert { .. }
                | DownloadZustand::Fehlgeschlagen => break,
            };
            automat.verarbeiten(ereignis);
        }

        DownloadBericht {
            item_id: auftrag.item_id.clone(),
            verlauf: automat.verlauf().to_vec(),
            fallbacks: automat.fallbacks(),
            ergebnis,
        }
    }

    /// Direktversuch mit harter Obergrenze. Zeitlimit und Abbruch verwerfen
    /// den Versuch samt halboffener Verbindung.
    async fn direkt_versuchen(
        &self,
        besitzer: &PeerId,
        id: &ItemId,
        abbruch: &CancellationToken,
    ) -> TransferResult<VersiegelterBlob> {
        let ablauf = tokio::time::timeout(self.konfig.direkt_timeout, self.direkt_ablauf(besitzer, id));
        tokio::select! {
            ergebnis = ablauf => match ergebnis {
                Ok(r) => r,
                Err(_) => {
                    tracing::info!(
                        item_id = %id,
                        timeout_ms = self.konfig.direkt_timeout.as_millis() as u64,
                        "Direktversuch: Zeitlimit erreicht"
                    );
                    Err(TransferError::Abgebrochen)
                }
            },
            _ = abbruch.cancelled() => Err(TransferError::Abgebrochen),
        }
    }

    async fn direkt_ablauf(&self, besitzer: &PeerId, id: &ItemId) -> TransferResult<VersiegelterBlob> {
        let sitzung = Uuid::new_v4();
        let angebot = self.transport.angebot().await?;

        let nachricht = SignalNachricht::angebot(self.lokal.clone(), sitzung, angebot.daten());
        self.signal.senden(besitzer, nachricht.als_bytes()?).await?;
        tracing::debug!(item_id = %id, besitzer = %besitzer, %sitzung, "Angebot gesendet");

        let antwort = self.antwort_abwarten(sitzung).await?;
        let mut verbindung = angebot.verbinden(&antwort).await?;
        tracing::debug!(item_id = %id, %sitzung, "Direktverbindung aufgebaut");

        let ergebnis = blob_anfordern(verbindung.as_mut(), id).await;
        verbindung.schliessen().await;
        ergebnis
    }

    /// Liest die eigene Mailbox, bis die Antwort zu `sitzung` vorliegt
    async fn antwort_abwarten(&self, sitzung: Uuid) -> TransferResult<Vec<u8>> {
        let mut takt = tokio::time::interval(self.konfig.antwort_poll_intervall);
        loop {
            takt.tick().await;
            let Some(bytes) = self.signal.abholen(&self.lokal).await? else {
                continue;
            };
            match SignalNachricht::aus_bytes(&bytes) {
                Ok(n) if n.beantwortet(sitzung) => return Ok(n.daten),
                Ok(_) => tracing::trace!(%sitzung, "Fremde oder veraltete Nachricht in der Mailbox"),
                Err(e) => tracing::debug!(fehler = %e, "Unlesbare Nachricht in der Mailbox"),
            }
        }
    }

    async fn entschluesseln(&self, blob: Option<VersiegelterBlob>) -> TransferResult<Vec<u8>> {
        let blob = blob.ok_or_else(|| TransferError::Ungueltig("kein Chiffrat".into()))?;
        let schluessel = self.schluessel.gueltige_schluessel().await?;
        Ok(oeffnen_mit_schluesseln(schluessel.iter(), &blob)?)
    }
}

async fn blob_anfordern(
    verbindung: &mut dyn DirektVerbindung,
    id: &ItemId,
) -> TransferResult<VersiegelterBlob> {
    let anfrage = serde_json::to_vec(&DirektAnfrage { item_id: id.clone() })?;
    verbindung.senden(anfrage).await?;
    let antwort = verbindung
        .empfangen()
        .await?
        .ok_or_else(|| TransferError::Transport("Verbindung ohne Antwort geschlossen".into()))?;
    Ok(serde_json::from_slice(&antwort)?)
}

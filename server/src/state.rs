//! Geteilter Anwendungszustand der REST-Handler

use std::sync::Arc;

use anyhow::Result;
use handoff_core::{StorageBackend, Uhr};
use handoff_crypto::KeyRingManager;
use handoff_observability::{HandoffMetriken, HealthState};
use handoff_signaling::SignalingRelay;
use handoff_store::{EphemeralStore, UploadRichtlinie};

use crate::config::ServerConfig;

/// Axum-State: alle Komponenten hinter `Arc`, billig klonbar
#[derive(Clone)]
pub struct AppState {
    pub schluessel: Arc<KeyRingManager>,
    pub ablage: Arc<EphemeralStore>,
    pub relay: Arc<SignalingRelay>,
    pub richtlinie: Arc<UploadRichtlinie>,
    pub metriken: HandoffMetriken,
    pub health: HealthState,
    pub uhr: Arc<dyn Uhr>,
}

impl AppState {
    /// Baut alle Komponenten ueber einem gemeinsamen Speicher-Backend auf
    pub fn neu(
        config: &ServerConfig,
        storage: Arc<dyn StorageBackend>,
        uhr: Arc<dyn Uhr>,
    ) -> Result<Self> {
        let metriken = HandoffMetriken::neu()?;

        let rotationen = metriken.key_rotations_total.clone();
        let schluessel = KeyRingManager::neu(
            storage.clone(),
            uhr.clone(),
            config.rotations_intervall(),
        )
        .mit_rotations_beobachter(move |_| rotationen.inc());

        let ablage = EphemeralStore::neu(storage.clone(), uhr.clone(), config.item_ttl());
        let relay = SignalingRelay::neu(storage, uhr.clone(), config.mailbox_ttl())
            .mit_max_payload(config.upload.max_signal_bytes);

        Ok(Self {
            schluessel: Arc::new(schluessel),
            ablage: Arc::new(ablage),
            relay: Arc::new(relay),
            richtlinie: Arc::new(config.richtlinie()),
            metriken,
            health: HealthState::neu(),
            uhr,
        })
    }

    /// Gleicht `items_live` mit der Ablage ab und zaehlt beim Zugriff
    /// abgelaufene Items in `items_expired_total`
    pub async fn bestand_melden(&self) {
        let entfernt = self.ablage.beim_zugriff_entfernt();
        if entfernt > 0 {
            self.metriken.items_expired_total.inc_by(entfernt as u64);
        }
        let lebend = self.ablage.lebend(self.uhr.jetzt()).await;
        self.metriken.items_live.set(lebend as i64);
    }

    /// Stellt Index und Mailboxen aus dem Speicher wieder her
    pub async fn wiederherstellen(&self) -> Result<()> {
        let items = self.ablage.laden().await?;
        let mailboxen = self.relay.laden().await?;
        self.bestand_melden().await;
        tracing::info!(items, mailboxen, "Zustand wiederhergestellt");
        Ok(())
    }
}

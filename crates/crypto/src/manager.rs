//! Persistierter Schluesselring fuer den Server
//!
//! Laden, Rotieren und Speichern laufen unter einem einzigen async Mutex.
//! Gleichzeitige Aufrufer, die eine faellige Rotation bemerken, erzeugen
//! daher hoechstens eine neue Generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use handoff_core::{HandoffError, StorageBackend, Uhr};
use tokio::sync::Mutex;

use crate::error::CryptoResult;
use crate::keyring::{KeyMaterial, KeyRing};
use crate::types::KeyFingerprint;

/// Dateiname des Schluesselrings im Storage
pub const SCHLUESSEL_DATEI: &str = "keys.json";

type RotationsBeobachter = Box<dyn Fn(&KeyFingerprint) + Send + Sync>;

/// Verwaltet den Schluesselring und rotiert ihn bei Bedarf
pub struct KeyRingManager {
    ring: Mutex<Option<KeyRing>>,
    storage: Arc<dyn StorageBackend>,
    uhr: Arc<dyn Uhr>,
    intervall: chrono::Duration,
    rotationen: AtomicU64,
    beobachter: Option<RotationsBeobachter>,
}

impl KeyRingManager {
    pub fn neu(storage: Arc<dyn StorageBackend>, uhr: Arc<dyn Uhr>, intervall: Duration) -> Self {
        Self {
            ring: Mutex::new(None),
            storage,
            uhr,
            intervall: chrono::Duration::from_std(intervall)
                .unwrap_or_else(|_| chrono::Duration::weeks(52_000)),
            rotationen: AtomicU64::new(0),
            beobachter: None,
        }
    }

    /// Registriert einen Callback, der nach jeder persistierten Rotation laeuft
    pub fn mit_rotations_beobachter(
        mut self,
        f: impl Fn(&KeyFingerprint) + Send + Sync + 'static,
    ) -> Self {
        self.beobachter = Some(Box::new(f));
        self
    }

    /// Aktueller Schluessel (rotiert vorher, falls faellig)
    pub async fn current_key(&self) -> CryptoResult<KeyMaterial> {
        Ok(self.gueltiger_ring().await?.current)
    }

    /// `[current, previous?]` (rotiert vorher, falls faellig)
    pub async fn all_valid_keys(&self) -> CryptoResult<Vec<KeyMaterial>> {
        Ok(self.gueltiger_ring().await?.all_valid_keys())
    }

    /// Anzahl der Rotationen seit Prozessstart
    pub fn rotationen(&self) -> u64 {
        self.rotationen.load(Ordering::Relaxed)
    }

    async fn gueltiger_ring(&self) -> CryptoResult<KeyRing> {
        let mut guard = self.ring.lock().await;
        let jetzt = self.uhr.jetzt();

        let ring = match guard.as_ref() {
            Some(r) => r.clone(),
            None => self.laden_oder_erzeugen(jetzt).await?,
        };

        if !ring.faellig(jetzt, self.intervall) {
            *guard = Some(ring.clone());
            return Ok(ring);
        }

        let rotiert = ring.rotate(jetzt, self.intervall);
        if let Err(e) = self.speichern(&rotiert).await {
            // Alter Ring bleibt gueltig
            tracing::error!(fehler = %e, "Schluesselrotation konnte nicht gespeichert werden");
            *guard = Some(ring);
            return Err(e);
        }

        let fingerprint = rotiert.current.fingerprint();
        self.rotationen.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            fingerprint = %fingerprint,
            vorheriger = %ring.current.fingerprint(),
            "Schluessel rotiert"
        );
        if let Some(f) = &self.beobachter {
            f(&fingerprint);
        }

        *guard = Some(rotiert.clone());
        Ok(rotiert)
    }

    async fn laden_oder_erzeugen(&self, jetzt: chrono::DateTime<chrono::Utc>) -> CryptoResult<KeyRing> {
        match self.storage.retrieve(SCHLUESSEL_DATEI).await {
            Ok(bytes) => {
                let ring: KeyRing = serde_json::from_slice(&bytes).map_err(|e| {
                    HandoffError::speicher(format!("{SCHLUESSEL_DATEI} unlesbar: {e}"))
                })?;
                tracing::info!(
                    fingerprint = %ring.current.fingerprint(),
                    mit_vorgaenger = ring.previous.is_some(),
                    "Schluesselring geladen"
                );
                Ok(ring)
            }
            Err(HandoffError::NichtGefunden(_)) => {
                let ring = KeyRing::neu(jetzt);
                self.speichern(&ring).await?;
                tracing::info!(
                    fingerprint = %ring.current.fingerprint(),
                    "Neuer Schluesselring erzeugt"
                );
                Ok(ring)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn speichern(&self, ring: &KeyRing) -> CryptoResult<()> {
        let json = serde_json::to_vec_pretty(ring).map_err(HandoffError::from)?;
        self.storage.store(SCHLUESSEL_DATEI, &json).await?;
        Ok(())
    }
}

impl std::fmt::Debug for KeyRingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRingManager")
            .field("intervall", &self.intervall)
            .field("rotationen", &self.rotationen())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aead::{oeffnen_mit_schluesseln, versiegeln};
    use crate::error::CryptoError;
    use handoff_core::{RamStorage, TestUhr};

    fn aufbau(intervall_sek: u64) -> (Arc<RamStorage>, Arc<TestUhr>, KeyRingManager) {
        let storage = Arc::new(RamStorage::new());
        let uhr = Arc::new(TestUhr::fest());
        let manager = KeyRingManager::neu(
            storage.clone(),
            uhr.clone(),
            Duration::from_secs(intervall_sek),
        );
        (storage, uhr, manager)
    }

    #[tokio::test]
    async fn erster_zugriff_erzeugt_schluesseldatei() {
        let (storage, _uhr, manager) = aufbau(3600);
        let k = manager.current_key().await.unwrap();
        assert!(storage.enthaelt(SCHLUESSEL_DATEI));
        assert_eq!(manager.all_valid_keys().await.unwrap(), vec![k]);
        assert_eq!(manager.rotationen(), 0);
    }

    #[tokio::test]
    async fn neuer_manager_liest_bestehende_datei() {
        let (storage, uhr, manager) = aufbau(3600);
        let k = manager.current_key().await.unwrap();

        let zweiter = KeyRingManager::neu(storage, uhr, Duration::from_secs(3600));
        assert_eq!(zweiter.current_key().await.unwrap(), k);
    }

    #[tokio::test]
    async fn lazy_rotation_beim_naechsten_zugriff() {
        let (_storage, uhr, manager) = aufbau(3600);
        let alt = manager.current_key().await.unwrap();

        uhr.vorstellen(3599);
        assert_eq!(manager.current_key().await.unwrap(), alt);

        uhr.vorstellen(1);
        let neu = manager.current_key().await.unwrap();
        assert_ne!(neu, alt);
        assert_eq!(manager.all_valid_keys().await.unwrap(), vec![neu, alt]);
        assert_eq!(manager.rotationen(), 1);
    }

    #[tokio::test]
    async fn entschluesselbar_nach_einer_rotation_nicht_nach_zweien() {
        let (_storage, uhr, manager) = aufbau(60);
        let k = manager.current_key().await.unwrap();
        let blob = versiegeln(&k.schluessel, b"hand-off").unwrap();

        uhr.vorstellen(60);
        let schluessel = manager.all_valid_keys().await.unwrap();
        let klar =
            oeffnen_mit_schluesseln(schluessel.iter().map(|k| &k.schluessel), &blob).unwrap();
        assert_eq!(klar, b"hand-off");

        uhr.vorstellen(60);
        let schluessel = manager.all_valid_keys().await.unwrap();
        let e = oeffnen_mit_schluesseln(schluessel.iter().map(|k| &k.schluessel), &blob)
            .unwrap_err();
        assert!(matches!(e, CryptoError::UnbekannterSchluessel(_)));
    }

    #[tokio::test]
    async fn gleichzeitige_rotation_erzeugt_eine_generation() {
        let (_storage, uhr, manager) = aufbau(10);
        let alt = manager.current_key().await.unwrap();
        uhr.vorstellen(10);

        let manager = Arc::new(manager);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let m = manager.clone();
            handles.push(tokio::spawn(async move { m.current_key().await.unwrap() }));
        }
        let mut ergebnisse = Vec::new();
        for h in handles {
            ergebnisse.push(h.await.unwrap());
        }

        assert!(ergebnisse.iter().all(|k| k == &ergebnisse[0]));
        assert_ne!(ergebnisse[0], alt);
        assert_eq!(manager.rotationen(), 1);
    }

    #[tokio::test]
    async fn speicherfehler_laesst_alten_ring_stehen() {
        let (storage, uhr, manager) = aufbau(10);
        let alt = manager.current_key().await.unwrap();

        uhr.vorstellen(10);
        storage.fehler_simulieren(true);
        let e = manager.current_key().await.unwrap_err();
        assert!(matches!(
            HandoffError::from(e),
            HandoffError::Speicher(_)
        ));

        storage.fehler_simulieren(false);
        let persistiert: KeyRing =
            serde_json::from_slice(&storage.retrieve(SCHLUESSEL_DATEI).await.unwrap()).unwrap();
        assert_eq!(persistiert.current, alt);

        let neu = manager.current_key().await.unwrap();
        assert_ne!(neu, alt);
    }

    #[tokio::test]
    async fn beobachter_sieht_rotation() {
        let gezaehlt = Arc::new(AtomicU64::new(0));
        let z = gezaehlt.clone();
        let (_storage, uhr, manager) = aufbau(5);
        let manager = manager.mit_rotations_beobachter(move |_| {
            z.fetch_add(1, Ordering::SeqCst);
        });

        manager.current_key().await.unwrap();
        uhr.vorstellen(5);
        manager.current_key().await.unwrap();
        assert_eq!(gezaehlt.load(Ordering::SeqCst), 1);
    }
}

//! Speicher-Backends fuer Datensaetze und Chiffrate
//!
//! Das `StorageBackend`-Trait abstrahiert das Medium (Disk, RAM). Pfade sind
//! immer relativ zum Basisverzeichnis; `..` und absolute Pfade werden
//! abgewiesen.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{HandoffError, Result};

/// Abstraktes Speicher-Backend
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Datei unter dem angegebenen Pfad speichern (ueberschreibt)
    async fn store(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Datei laden. Fehlende Dateien ergeben `NichtGefunden`.
    async fn retrieve(&self, path: &str) -> Result<Vec<u8>>;

    /// Datei loeschen. Bereits fehlende Dateien sind kein Fehler.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Dateinamen direkt unter `verzeichnis` auflisten
    async fn list(&self, verzeichnis: &str) -> Result<Vec<String>>;

    /// Prueft ob eine Datei existiert
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.retrieve(path).await {
            Ok(_) => Ok(true),
            Err(HandoffError::NichtGefunden(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn relativer_pfad(path: &str) -> Result<PathBuf> {
    let p = Path::new(path);
    if path.is_empty() || p.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(HandoffError::validierung("ungueltiger Speicherpfad"));
    }
    Ok(p.to_path_buf())
}

/// Disk-basiertes Storage-Backend
///
/// Speichert Dateien unter `base_dir/<path>`.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    base_dir: PathBuf,
}

impl DiskStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        Ok(self.base_dir.join(relativer_pfad(path)?))
    }
}

#[async_trait]
impl StorageBackend for DiskStorage {
    async fn store(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.full_path(path)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Erst in eine Temp-Datei, dann umbenennen: Leser sehen nie halbe Dateien
        let mut tmp = full.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &full).await?;
        tracing::debug!(path = %full.display(), bytes = data.len(), "Datei gespeichert");
        Ok(())
    }

    async fn retrieve(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.full_path(path)?;
        match tokio::fs::read(&full).await {
            Ok(data) => {
                tracing::debug!(path = %full.display(), bytes = data.len(), "Datei gelesen");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(HandoffError::nicht_gefunden(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                tracing::debug!(path = %full.display(), "Datei geloescht");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, verzeichnis: &str) -> Result<Vec<String>> {
        let dir = if verzeichnis.is_empty() {
            self.base_dir.clone()
        } else {
            self.full_path(verzeichnis)?
        };

        let mut eintraege = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut namen = Vec::new();
        while let Some(eintrag) = eintraege.next_entry().await? {
            if eintrag.file_type().await?.is_file() {
                namen.push(eintrag.file_name().to_string_lossy().into_owned());
            }
        }
        namen.sort();
        Ok(namen)
    }
}

/// RAM-Backend fuer Tests und kurzlebige Instanzen
///
/// Mit `fehler_simulieren(true)` schlagen alle schreibenden Operationen fehl.
#[derive(Debug, Default)]
pub struct RamStorage {
    dateien: Mutex<HashMap<String, Vec<u8>>>,
    defekt: AtomicBool,
}

impl RamStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fehler_simulieren(&self, defekt: bool) {
        self.defekt.store(defekt, Ordering::SeqCst);
    }

    pub fn anzahl(&self) -> usize {
        self.dateien.lock().len()
    }

    pub fn enthaelt(&self, path: &str) -> bool {
        self.dateien.lock().contains_key(path)
    }

    fn pruefe_defekt(&self) -> Result<()> {
        if self.defekt.load(Ordering::SeqCst) {
            return Err(HandoffError::speicher("simulierter Schreibfehler"));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for RamStorage {
    async fn store(&self, path: &str, data: &[u8]) -> Result<()> {
        relativer_pfad(path)?;
        self.pruefe_defekt()?;
        self.dateien.lock().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn retrieve(&self, path: &str) -> Result<Vec<u8>> {
        self.dateien
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| HandoffError::nicht_gefunden(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.pruefe_defekt()?;
        self.dateien.lock().remove(path);
        Ok(())
    }

    async fn list(&self, verzeichnis: &str) -> Result<Vec<String>> {
        let praefix = if verzeichnis.is_empty() {
            String::new()
        } else {
            format!("{}/", verzeichnis.trim_end_matches('/'))
        };
        let mut namen: Vec<String> = self
            .dateien
            .lock()
            .keys()
            .filter_map(|k| k.strip_prefix(&praefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect();
        namen.sort();
        Ok(namen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> (DiskStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Temp-Verzeichnis konnte nicht erstellt werden");
        let storage = DiskStorage::new(dir.path());
        (storage, dir)
    }

    #[tokio::test]
    async fn store_und_retrieve() {
        let (storage, _dir) = temp_storage();
        storage.store("a.enc", b"chiffrat").await.unwrap();
        assert_eq!(storage.retrieve("a.enc").await.unwrap(), b"chiffrat");
    }

    #[tokio::test]
    async fn store_erstellt_verzeichnis() {
        let (storage, dir) = temp_storage();
        storage.store("signals/peerX.json", b"{}").await.unwrap();
        assert!(dir.path().join("signals/peerX.json").exists());
        assert!(!dir.path().join("signals/peerX.json.tmp").exists());
    }

    #[tokio::test]
    async fn retrieve_fehlend_ist_nicht_gefunden() {
        let (storage, _dir) = temp_storage();
        let e = storage.retrieve("fehlt.enc").await.unwrap_err();
        assert!(matches!(e, HandoffError::NichtGefunden(_)));
        assert!(!storage.exists("fehlt.enc").await.unwrap());
    }

    #[tokio::test]
    async fn delete_fehlend_ist_kein_fehler() {
        let (storage, _dir) = temp_storage();
        assert!(storage.delete("existiert_nicht.enc").await.is_ok());
    }

    #[tokio::test]
    async fn pfad_ausbruch_wird_abgewiesen() {
        let (storage, _dir) = temp_storage();
        assert!(storage.store("../boese", b"x").await.is_err());
        assert!(storage.store("/etc/passwd", b"x").await.is_err());
        assert!(storage.retrieve("signals/../../x").await.is_err());
    }

    #[tokio::test]
    async fn list_unterverzeichnis() {
        let (storage, _dir) = temp_storage();
        storage.store("signals/a.json", b"1").await.unwrap();
        storage.store("signals/b.json", b"2").await.unwrap();
        storage.store("files.json", b"{}").await.unwrap();

        assert_eq!(
            storage.list("signals").await.unwrap(),
            vec!["a.json".to_string(), "b.json".to_string()]
        );
        assert!(storage.list("leer").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ram_storage_verhaelt_sich_wie_disk() {
        let storage = RamStorage::new();
        storage.store("signals/a.json", b"1").await.unwrap();
        storage.store("x.enc", b"2").await.unwrap();
        assert_eq!(storage.list("signals").await.unwrap(), vec!["a.json".to_string()]);
        assert_eq!(storage.list("").await.unwrap(), vec!["x.enc".to_string()]);
        storage.delete("x.enc").await.unwrap();
        assert!(!storage.enthaelt("x.enc"));
    }

    #[tokio::test]
    async fn ram_storage_simulierter_defekt() {
        let storage = RamStorage::new();
        storage.fehler_simulieren(true);
        let e = storage.store("a.enc", b"x").await.unwrap_err();
        assert!(matches!(e, HandoffError::Speicher(_)));
        storage.fehler_simulieren(false);
        assert!(storage.store("a.enc", b"x").await.is_ok());
    }
}

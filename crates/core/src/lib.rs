//! handoff-core – Gemeinsame Typen, Fehler und Speicher-Abstraktionen
//!
//! Dieses Crate stellt die Bausteine bereit, die Schluesselring, Ablage,
//! Signal-Relay und Transfer-Seite gemeinsam nutzen:
//! - `error` – Fehler-Taxonomie mit HTTP-Zuordnung
//! - `types` – validierte Bezeichner (`ItemId`, `PeerId`)
//! - `uhr` – injizierbare Zeitquelle (System oder Test)
//! - `storage` – `StorageBackend`-Trait mit Disk- und RAM-Implementierung
//! - `b64` – Serde-Hilfe fuer Bytes als Base64

pub mod b64;
pub mod error;
pub mod storage;
pub mod types;
pub mod uhr;

// Re-Exporte fuer bequemen Zugriff
pub use error::{HandoffError, Result};
pub use storage::{DiskStorage, RamStorage, StorageBackend};
pub use types::{ItemId, PeerId, SweepBericht, DATEINAME_HEADER};
pub use uhr::{abgelaufen, SystemUhr, TestUhr, Uhr};

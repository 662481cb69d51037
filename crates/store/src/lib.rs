//! handoff-store – Kurzlebige Ablage verschluesselter Items
//!
//! Dieses Crate implementiert:
//! - EphemeralStore: Items mit globaler TTL, Lazy-Expiry und Sweep
//! - UploadRichtlinie: Groessen- und MIME-Pruefung fuer die Upload-Annahme
//!
//! Der Store kennt nur versiegelte Blobs und Schluessel-Fingerprints, er
//! verschluesselt und entschluesselt selbst nichts.
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use handoff_core::{DiskStorage, SystemUhr};
//! use handoff_store::EphemeralStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(DiskStorage::new("gallery"));
//!     let store = EphemeralStore::neu(storage, Arc::new(SystemUhr), Duration::from_secs(300));
//!     store.laden().await.unwrap();
//! }
//! ```

pub mod richtlinie;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use richtlinie::{GepruefterUpload, UploadRichtlinie};
pub use store::{EphemeralStore, INDEX_DATEI};
pub use handoff_core::SweepBericht;
pub use types::{ItemUebersicht, StoredItem};

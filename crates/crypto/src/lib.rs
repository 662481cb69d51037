//! # handoff-crypto
//!
//! Schluesselverwaltung und Verschluesselung fuer die Ablage.
//!
//! ## Module
//! - `types` - Schluessel, Fingerprint, versiegelter Blob
//! - `keyring` - Schluesselring mit reiner Rotationsfunktion
//! - `manager` - serialisierter, persistierter Schluesselring fuer den Server
//! - `aead` - AES-256-GCM Versiegeln/Oeffnen mit Fingerprint-Zuordnung
//! - `error` - Fehlertypen

pub mod aead;
pub mod error;
pub mod keyring;
pub mod manager;
pub mod types;

// Bequeme Re-Exports
pub use aead::{oeffnen, oeffnen_mit_schluesseln, versiegeln};
pub use error::{CryptoError, CryptoResult};
pub use keyring::{KeyMaterial, KeyRing};
pub use manager::KeyRingManager;
pub use types::{KeyFingerprint, Schluessel, VersiegelterBlob, SCHLUESSEL_LAENGE};

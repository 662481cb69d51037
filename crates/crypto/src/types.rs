//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

/// Laenge eines AES-256-Schluessels in Bytes
pub const SCHLUESSEL_LAENGE: usize = 32;

/// Laenge der AES-GCM-Nonce in Bytes
pub const NONCE_LAENGE: usize = 12;

const FINGERPRINT_KONTEXT: &[u8] = b"handoff-key-fingerprint-v1";

/// Symmetrischer Schluessel (wird beim Drop genullt)
#[derive(Clone, PartialEq, Eq)]
pub struct Schluessel([u8; SCHLUESSEL_LAENGE]);

impl Drop for Schluessel {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl fmt::Debug for Schluessel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Schluessel([REDACTED] {})", self.fingerprint())
    }
}

impl Schluessel {
    /// Frischer Schluessel aus dem Betriebssystem-CSPRNG
    pub fn zufaellig() -> Self {
        let mut bytes = [0u8; SCHLUESSEL_LAENGE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn aus_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; SCHLUESSEL_LAENGE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::UngueltigeSchluesselLaenge {
                    erwartet: SCHLUESSEL_LAENGE,
                    erhalten: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    pub fn aus_base64(text: &str) -> CryptoResult<Self> {
        let mut bytes = STANDARD.decode(text)?;
        let ergebnis = Self::aus_bytes(&bytes);
        bytes.iter_mut().for_each(|b| *b = 0);
        ergebnis
    }

    pub fn als_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; SCHLUESSEL_LAENGE] {
        &self.0
    }

    /// Nicht-geheimer Bezeichner dieses Schluessels
    pub fn fingerprint(&self) -> KeyFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_KONTEXT);
        hasher.update(self.0);
        let digest = hasher.finalize();
        KeyFingerprint(digest[..16].iter().map(|b| format!("{b:02x}")).collect())
    }
}

/// Hex-kodierter Fingerprint eines Schluessels (32 Zeichen)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyFingerprint(String);

impl KeyFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for KeyFingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for KeyFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Verschluesselter Inhalt samt Schluessel-Fingerprint und Nonce
///
/// Wird sowohl auf dem Direktweg als auch ueber den Server uebertragen.
/// In JSON sind `nonce` und `ciphertext` Base64-kodiert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersiegelterBlob {
    pub key_fingerprint: KeyFingerprint,
    #[serde(with = "handoff_core::b64")]
    pub nonce: Vec<u8>,
    /// Chiffrat inkl. 16 Byte Auth-Tag (angehaengt)
    #[serde(with = "handoff_core::b64")]
    pub ciphertext: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ist_stabil_und_kurz() {
        let k = Schluessel::aus_bytes(&[7u8; 32]).unwrap();
        let f1 = k.fingerprint();
        let f2 = k.clone().fingerprint();
        assert_eq!(f1, f2);
        assert_eq!(f1.as_str().len(), 32);
        assert_ne!(f1, Schluessel::aus_bytes(&[8u8; 32]).unwrap().fingerprint());
    }

    #[test]
    fn debug_zeigt_kein_schluesselmaterial() {
        let k = Schluessel::aus_bytes(&[0xAB; 32]).unwrap();
        let text = format!("{k:?}");
        assert!(text.contains("REDACTED"));
        assert!(!text.contains(&k.als_base64()));
    }

    #[test]
    fn falsche_laenge_wird_abgewiesen() {
        assert!(matches!(
            Schluessel::aus_bytes(&[1u8; 16]),
            Err(CryptoError::UngueltigeSchluesselLaenge { erhalten: 16, .. })
        ));
    }

    #[test]
    fn base64_hin_und_zurueck() {
        let k = Schluessel::zufaellig();
        assert_eq!(Schluessel::aus_base64(&k.als_base64()).unwrap(), k);
        assert!(Schluessel::aus_base64("kein base64!").is_err());
    }

    #[test]
    fn blob_json_nutzt_base64() {
        let blob = VersiegelterBlob {
            key_fingerprint: KeyFingerprint::from("ab".to_string()),
            nonce: vec![0u8; 12],
            ciphertext: vec![1, 2, 3],
        };
        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json["ciphertext"], "AQID");
        assert_eq!(json["key_fingerprint"], "ab");
    }
}

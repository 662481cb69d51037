//! AES-256-GCM Versiegelung
//!
//! ## Format
//! ```text
//! nonce:      12 Bytes, zufaellig pro Blob
//! ciphertext: Chiffrat + Auth-Tag(16)
//! AAD:        Fingerprint des Schluessels (ASCII-Hex)
//! ```
//!
//! Der Fingerprint steht im Blob und ist per AAD gebunden. Beim Oeffnen wird
//! der passende Schluessel ueber den Fingerprint gewaehlt, es gibt keine
//! Probe-Entschluesselung mit allen Schluesseln.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::types::{Schluessel, VersiegelterBlob, NONCE_LAENGE};

/// Verschluesselt `klartext` unter `schluessel`
pub fn versiegeln(schluessel: &Schluessel, klartext: &[u8]) -> CryptoResult<VersiegelterBlob> {
    let fingerprint = schluessel.fingerprint();

    let mut nonce_bytes = [0u8; NONCE_LAENGE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(schluessel.as_bytes()));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: klartext,
                aad: fingerprint.as_str().as_bytes(),
            },
        )
        .map_err(|e| CryptoError::Verschluesselung(format!("AES-256-GCM: {e}")))?;

    Ok(VersiegelterBlob {
        key_fingerprint: fingerprint,
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Entschluesselt `blob` mit genau diesem Schluessel
///
/// Passt der Fingerprint nicht, wird gar nicht erst entschluesselt.
pub fn oeffnen(schluessel: &Schluessel, blob: &VersiegelterBlob) -> CryptoResult<Vec<u8>> {
    if schluessel.fingerprint() != blob.key_fingerprint {
        return Err(CryptoError::UnbekannterSchluessel(
            blob.key_fingerprint.to_string(),
        ));
    }
    if blob.nonce.len() != NONCE_LAENGE {
        return Err(CryptoError::UngueltigeNonce {
            erwartet: NONCE_LAENGE,
            erhalten: blob.nonce.len(),
        });
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(schluessel.as_bytes()));
    cipher
        .decrypt(
            Nonce::from_slice(&blob.nonce),
            Payload {
                msg: &blob.ciphertext,
                aad: blob.key_fingerprint.as_str().as_bytes(),
            },
        )
        .map_err(|e| CryptoError::Entschluesselung(format!("AES-256-GCM: {e}")))
}

/// Waehlt aus `schluessel` den Schluessel mit passendem Fingerprint und oeffnet
pub fn oeffnen_mit_schluesseln<'a>(
    schluessel: impl IntoIterator<Item = &'a Schluessel>,
    blob: &VersiegelterBlob,
) -> CryptoResult<Vec<u8>> {
    let passend = schluessel
        .into_iter()
        .find(|k| k.fingerprint() == blob.key_fingerprint)
        .ok_or_else(|| CryptoError::UnbekannterSchluessel(blob.key_fingerprint.to_string()))?;
    oeffnen(passend, blob)
}

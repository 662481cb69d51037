//! Fehlertypen fuer das Kryptografie-Subsystem

use handoff_core::HandoffError;
use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),

    #[error("Kein gueltiger Schluessel fuer Fingerprint {0}")]
    UnbekannterSchluessel(String),

    #[error("Ungueltige Nonce-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeNonce { erwartet: usize, erhalten: usize },

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Base64-Dekodierung fehlgeschlagen: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Backend(#[from] HandoffError),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for HandoffError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::Backend(inner) => inner,
            other => HandoffError::Krypto(other.to_string()),
        }
    }
}

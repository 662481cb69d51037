//! Fehlertypen der Transfer-Seite

use handoff_core::HandoffError;
use handoff_crypto::CryptoError;
use thiserror::Error;

/// Fehler beim Teilen oder Abholen eines Items
#[derive(Debug, Error)]
pub enum TransferError {
    /// Kein gueltiger Schluessel passt oder das Chiffrat ist manipuliert
    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Krypto(String),

    /// Item oder Signal existiert nicht (oder ist abgelaufen)
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Direktverbindung gescheitert; loest den Server-Fallback aus
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Server antwortet mit Fehler oder ist nicht erreichbar
    #[error("Serverfehler: {0}")]
    Server(String),

    /// Zeitlimit oder Abbruch des Direktversuchs
    #[error("Abgebrochen")]
    Abgebrochen,

    /// Ungueltige Eingabe oder Nachricht
    #[error("Ungueltig: {0}")]
    Ungueltig(String),
}

pub type TransferResult<T> = Result<T, TransferError>;

impl From<CryptoError> for TransferError {
    fn from(e: CryptoError) -> Self {
        Self::Krypto(e.to_string())
    }
}

impl From<HandoffError> for TransferError {
    fn from(e: HandoffError) -> Self {
        match e {
            HandoffError::Validierung(m) => Self::Ungueltig(m),
            HandoffError::NichtGefunden(m) => Self::NichtGefunden(m),
            HandoffError::Krypto(m) => Self::Krypto(m),
            HandoffError::Transport(m) => Self::Transport(m),
            other => Self::Server(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(e: reqwest::Error) -> Self {
        Self::Server(e.to_string())
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(e: serde_json::Error) -> Self {
        Self::Ungueltig(e.to_string())
    }
}

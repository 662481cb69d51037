//! Fehlertypen fuer handoff
//!
//! Zentrale Taxonomie, auf die alle Komponenten ihre Fehler abbilden.
//! `NichtGefunden` deckt absichtlich auch abgelaufene Datensaetze ab:
//! Aufrufer koennen "abgelaufen" und "nie vorhanden" nicht unterscheiden.

use thiserror::Error;

/// Globaler Result-Alias fuer handoff
pub type Result<T> = std::result::Result<T, HandoffError>;

/// Alle Fehlerzustaende des Kerns
#[derive(Debug, Error)]
pub enum HandoffError {
    /// Fehlende oder ungueltige Eingabe (4xx, nie wiederholt)
    #[error("Ungueltige Eingabe: {0}")]
    Validierung(String),

    /// Datensatz fehlt oder ist abgelaufen
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// IO-Fehler im Speicher-Backend (wird nicht automatisch wiederholt)
    #[error("Speicherfehler: {0}")]
    Speicher(String),

    /// Entschluesselung mit allen verfuegbaren Schluesseln fehlgeschlagen
    #[error("Kryptofehler: {0}")]
    Krypto(String),

    /// Direktverbindung fehlgeschlagen oder Zeitlimit erreicht
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Ungueltige Konfiguration
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl HandoffError {
    pub fn validierung(msg: impl Into<String>) -> Self {
        Self::Validierung(msg.into())
    }

    pub fn nicht_gefunden(msg: impl Into<String>) -> Self {
        Self::NichtGefunden(msg.into())
    }

    pub fn speicher(msg: impl Into<String>) -> Self {
        Self::Speicher(msg.into())
    }

    /// HTTP-Statuscode fuer REST-Antworten
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validierung(_) => 400,
            Self::NichtGefunden(_) => 404,
            Self::Krypto(_) => 422,
            Self::Transport(_) => 502,
            Self::Speicher(_) | Self::Konfiguration(_) => 500,
        }
    }

    /// Meldung, die nach aussen gegeben werden darf.
    ///
    /// Speicher- und Konfigurationsfehler enthalten Pfade und OS-Meldungen;
    /// sie werden nur geloggt, der Client sieht einen generischen Text.
    pub fn oeffentliche_meldung(&self) -> String {
        match self {
            Self::Speicher(_) => "Interner Speicherfehler".to_string(),
            Self::Konfiguration(_) => "Interner Fehler".to_string(),
            Self::Krypto(_) => "Entschluesselung fehlgeschlagen".to_string(),
            Self::Transport(_) => "Direktverbindung fehlgeschlagen".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for HandoffError {
    fn from(e: std::io::Error) -> Self {
        Self::Speicher(e.to_string())
    }
}

impl From<serde_json::Error> for HandoffError {
    fn from(e: serde_json::Error) -> Self {
        Self::Speicher(format!("Datensatz nicht lesbar: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = HandoffError::validierung("peerId fehlt");
        assert_eq!(e.to_string(), "Ungueltige Eingabe: peerId fehlt");
    }

    #[test]
    fn http_status_zuordnung() {
        assert_eq!(HandoffError::validierung("x").http_status(), 400);
        assert_eq!(HandoffError::nicht_gefunden("x").http_status(), 404);
        assert_eq!(HandoffError::speicher("x").http_status(), 500);
    }

    #[test]
    fn speicherfehler_verraten_keinen_pfad() {
        let e = HandoffError::speicher("/var/lib/handoff/gallery/files.json: Permission denied");
        let meldung = e.oeffentliche_meldung();
        assert!(!meldung.contains("/var/lib"));
        assert!(!meldung.contains("files.json"));
    }

    #[test]
    fn io_fehler_wird_speicherfehler() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let e: HandoffError = io.into();
        assert!(matches!(e, HandoffError::Speicher(_)));
    }
}

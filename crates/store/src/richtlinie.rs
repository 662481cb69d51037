//! Upload-Annahme: Groesse, MIME-Typ und Anzeigename pruefen

use handoff_core::{HandoffError, Result};

/// Standard-Obergrenze fuer Uploads (10 MiB)
pub const STANDARD_MAX_GROESSE: usize = 10 * 1024 * 1024;

/// Standard-Liste erlaubter MIME-Typen
pub const STANDARD_TYPEN: &[&str] = &["image/jpeg", "image/png", "image/gif", "application/pdf"];

/// Regeln fuer angenommene Uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRichtlinie {
    pub max_groesse: usize,
    pub erlaubte_typen: Vec<String>,
}

impl Default for UploadRichtlinie {
    fn default() -> Self {
        Self {
            max_groesse: STANDARD_MAX_GROESSE,
            erlaubte_typen: STANDARD_TYPEN.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Gepruefter Upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GepruefterUpload {
    pub display_name: String,
    pub mime_type: String,
}

impl UploadRichtlinie {
    /// Prueft einen Upload und liefert bereinigten Namen und MIME-Typ
    pub fn pruefen(&self, name: &str, mime: &str, groesse: usize) -> Result<GepruefterUpload> {
        let display_name = anzeigename(name);
        if display_name.is_empty() {
            return Err(HandoffError::validierung("Dateiname darf nicht leer sein"));
        }

        if groesse == 0 {
            return Err(HandoffError::validierung("Datei ist leer"));
        }
        if groesse > self.max_groesse {
            return Err(HandoffError::validierung(format!(
                "Datei zu gross: {groesse} Bytes (Maximum {})",
                self.max_groesse
            )));
        }

        let mime_type = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !self.erlaubte_typen.iter().any(|t| t.eq_ignore_ascii_case(&mime_type)) {
            return Err(HandoffError::validierung(format!(
                "Dateityp nicht erlaubt: {mime_type}"
            )));
        }

        Ok(GepruefterUpload {
            display_name,
            mime_type,
        })
    }
}

/// Letzte Pfadkomponente, Steuerzeichen entfernt
fn anzeigename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

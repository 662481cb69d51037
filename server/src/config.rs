//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Einzelne Werte lassen sich per `HANDOFF_*`-Variable
//! ueberschreiben.

use std::time::Duration;

use anyhow::{bail, Context};
use handoff_store::UploadRichtlinie;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Ablageort fuer Schluessel, Items und Mailboxen
    pub speicher: SpeicherEinstellungen,
    /// Lebensdauern und Rotationsintervall
    pub ablauf: AblaufEinstellungen,
    /// Upload-Regeln
    pub upload: UploadEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "handoff".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port fuer die REST-API
    pub port: u16,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
            cors_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeicherEinstellungen {
    /// Basisverzeichnis (`keys.json`, `files.json`, `<id>.enc`, `signals/`)
    pub verzeichnis: String,
}

impl Default for SpeicherEinstellungen {
    fn default() -> Self {
        Self {
            verzeichnis: "./gallery".into(),
        }
    }
}

/// Lebensdauern in Sekunden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AblaufEinstellungen {
    pub item_ttl_sek: u64,
    pub mailbox_ttl_sek: u64,
    pub schluessel_rotation_sek: u64,
    /// Abstand zwischen zwei Sweep-Durchlaeufen
    pub sweep_intervall_sek: u64,
}

impl Default for AblaufEinstellungen {
    fn default() -> Self {
        Self {
            item_ttl_sek: 300,
            mailbox_ttl_sek: 300,
            schluessel_rotation_sek: 3600,
            sweep_intervall_sek: 30,
        }
    }
}

/// Upload-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadEinstellungen {
    pub max_groesse_bytes: usize,
    pub erlaubte_typen: Vec<String>,
    /// Obergrenze fuer eine Signal-Nachricht
    pub max_signal_bytes: usize,
}

impl Default for UploadEinstellungen {
    fn default() -> Self {
        let richtlinie = UploadRichtlinie::default();
        Self {
            max_groesse_bytes: richtlinie.max_groesse,
            erlaubte_typen: richtlinie.erlaubte_typen,
            max_signal_bytes: handoff_signaling::STANDARD_MAX_PAYLOAD,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Haengt `/metrics` und `/health` an den API-Router
    pub aktiviert: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self { aktiviert: true }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Uebernimmt `HANDOFF_*`-Overrides aus der Prozessumgebung
    pub fn umgebung_anwenden(&mut self) -> anyhow::Result<()> {
        self.overrides_anwenden(|name| std::env::var(name).ok())
    }

    /// Uebernimmt Overrides aus einer beliebigen Quelle (testbar ohne Prozessumgebung)
    pub fn overrides_anwenden(
        &mut self,
        lesen: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        fn zahl<T: std::str::FromStr>(name: &str, wert: &str) -> anyhow::Result<T>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            wert.trim()
                .parse()
                .with_context(|| format!("{name}={wert} ist keine gueltige Zahl"))
        }

        if let Some(w) = lesen("HANDOFF_ITEM_TTL_SEK") {
            self.ablauf.item_ttl_sek = zahl("HANDOFF_ITEM_TTL_SEK", &w)?;
        }
        if let Some(w) = lesen("HANDOFF_MAILBOX_TTL_SEK") {
            self.ablauf.mailbox_ttl_sek = zahl("HANDOFF_MAILBOX_TTL_SEK", &w)?;
        }
        if let Some(w) = lesen("HANDOFF_ROTATION_SEK") {
            self.ablauf.schluessel_rotation_sek = zahl("HANDOFF_ROTATION_SEK", &w)?;
        }
        if let Some(w) = lesen("HANDOFF_MAX_GROESSE") {
            self.upload.max_groesse_bytes = zahl("HANDOFF_MAX_GROESSE", &w)?;
        }
        if let Some(w) = lesen("HANDOFF_PORT") {
            self.netzwerk.port = zahl("HANDOFF_PORT", &w)?;
        }
        if let Some(w) = lesen("HANDOFF_ERLAUBTE_TYPEN") {
            self.upload.erlaubte_typen = w
                .split(',')
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
        }
        Ok(())
    }

    /// Weist Konfigurationen ab, mit denen der Server nicht sinnvoll laufen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        let a = &self.ablauf;
        for (name, wert) in [
            ("ablauf.item_ttl_sek", a.item_ttl_sek),
            ("ablauf.mailbox_ttl_sek", a.mailbox_ttl_sek),
            ("ablauf.schluessel_rotation_sek", a.schluessel_rotation_sek),
            ("ablauf.sweep_intervall_sek", a.sweep_intervall_sek),
        ] {
            if wert == 0 {
                bail!("{name} muss groesser als 0 sein");
            }
        }
        if self.upload.max_groesse_bytes == 0 {
            bail!("upload.max_groesse_bytes muss groesser als 0 sein");
        }
        if self.upload.max_signal_bytes == 0 {
            bail!("upload.max_signal_bytes muss groesser als 0 sein");
        }
        if self.upload.erlaubte_typen.is_empty() {
            bail!("upload.erlaubte_typen darf nicht leer sein");
        }
        if !handoff_observability::logging::log_level_gueltig(&self.logging.level) {
            bail!("logging.level '{}' ist ungueltig", self.logging.level);
        }
        if !handoff_observability::logging::log_format_gueltig(&self.logging.format) {
            bail!("logging.format '{}' ist ungueltig", self.logging.format);
        }
        Ok(())
    }

    /// Gibt die Bind-Adresse fuer die REST-API zurueck
    pub fn api_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    pub fn richtlinie(&self) -> UploadRichtlinie {
        UploadRichtlinie {
            max_groesse: self.upload.max_groesse_bytes,
            erlaubte_typen: self
                .upload
                .erlaubte_typen
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn item_ttl(&self) -> Duration {
        Duration::from_secs(self.ablauf.item_ttl_sek)
    }

    pub fn mailbox_ttl(&self) -> Duration {
        Duration::from_secs(self.ablauf.mailbox_ttl_sek)
    }

    pub fn rotations_intervall(&self) -> Duration {
        Duration::from_secs(self.ablauf.schluessel_rotation_sek)
    }

    pub fn sweep_intervall(&self) -> Duration {
        Duration::from_secs(self.ablauf.sweep_intervall_sek)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.port, 8080);
        assert_eq!(cfg.ablauf.item_ttl_sek, 300);
        assert_eq!(cfg.ablauf.schluessel_rotation_sek, 3600);
        assert_eq!(cfg.upload.max_groesse_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.speicher.verzeichnis, "./gallery");
        assert_eq!(cfg.api_bind_adresse(), "0.0.0.0:8080");
        cfg.validieren().unwrap();
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            port = 9000

            [ablauf]
            item_ttl_sek = 60

            [upload]
            erlaubte_typen = ["image/png"]
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.port, 9000);
        assert_eq!(cfg.item_ttl(), Duration::from_secs(60));
        assert_eq!(cfg.richtlinie().erlaubte_typen, vec!["image/png"]);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.ablauf.mailbox_ttl_sek, 300);
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
    }

    #[test]
    fn fehlende_datei_ergibt_standard() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("gibt-es-nicht.toml");
        let cfg = ServerConfig::laden(pfad.to_str().unwrap()).unwrap();
        assert_eq!(cfg.netzwerk.port, 8080);
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("config.toml");
        std::fs::write(&pfad, "[ablauf\nitem_ttl_sek = ").unwrap();
        assert!(ServerConfig::laden(pfad.to_str().unwrap()).is_err());
    }

    #[test]
    fn overrides_aus_umgebung() {
        let env: HashMap<&str, &str> = [
            ("HANDOFF_ITEM_TTL_SEK", "120"),
            ("HANDOFF_ROTATION_SEK", "7200"),
            ("HANDOFF_PORT", "9999"),
            ("HANDOFF_ERLAUBTE_TYPEN", "image/png, Application/PDF,"),
        ]
        .into_iter()
        .collect();

        let mut cfg = ServerConfig::default();
        cfg.overrides_anwenden(|n| env.get(n).map(|s| s.to_string()))
            .unwrap();
        assert_eq!(cfg.ablauf.item_ttl_sek, 120);
        assert_eq!(cfg.ablauf.schluessel_rotation_sek, 7200);
        assert_eq!(cfg.netzwerk.port, 9999);
        assert_eq!(cfg.upload.erlaubte_typen, vec!["image/png", "application/pdf"]);
        assert_eq!(cfg.ablauf.mailbox_ttl_sek, 300);
    }

    #[test]
    fn override_keine_zahl() {
        let mut cfg = ServerConfig::default();
        let fehler = cfg
            .overrides_anwenden(|n| (n == "HANDOFF_MAX_GROESSE").then(|| "zehn".to_string()))
            .unwrap_err();
        assert!(fehler.to_string().contains("HANDOFF_MAX_GROESSE"));
    }

    #[test]
    fn validieren_weist_null_und_leer_ab() {
        let mut cfg = ServerConfig::default();
        cfg.ablauf.item_ttl_sek = 0;
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.ablauf.sweep_intervall_sek = 0;
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.upload.erlaubte_typen.clear();
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.logging.format = "xml".into();
        assert!(cfg.validieren().is_err());
    }
}

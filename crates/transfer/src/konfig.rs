//! Zeitparameter der Transfer-Seite

use std::time::Duration;

/// Konfiguration fuer Uploader und Downloader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferKonfig {
    /// Harte Obergrenze fuer den gesamten Direktversuch, zugleich
    /// Leerlauf-Grenze einer bedienten Datenverbindung
    pub direkt_timeout: Duration,
    /// Takt, in dem der Uploader seine Mailbox liest und die Sitzung aufraeumt
    pub poll_intervall: Duration,
    /// Lebensdauer gehaltener Blobs in der Sitzung
    pub blob_ttl: Duration,
    /// Takt, in dem der Downloader auf die Antwort wartet
    pub antwort_poll_intervall: Duration,
}

impl Default for TransferKonfig {
    fn default() -> Self {
        Self {
            direkt_timeout: Duration::from_secs(10),
            poll_intervall: Duration::from_secs(1),
            blob_ttl: Duration::from_secs(300),
            antwort_poll_intervall: Duration::from_millis(250),
        }
    }
}

//! Zeitquelle
//!
//! Alle TTL- und Rotationsentscheidungen lesen die Zeit ueber `Uhr`, damit
//! Tests Ablauf simulieren koennen, ohne zu schlafen.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Liefert die aktuelle Zeit
pub trait Uhr: Send + Sync {
    fn jetzt(&self) -> DateTime<Utc>;
}

/// Systemuhr (Produktion)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUhr;

impl Uhr for SystemUhr {
    fn jetzt(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manuell vorstellbare Uhr fuer Tests
#[derive(Debug)]
pub struct TestUhr {
    zeit: Mutex<DateTime<Utc>>,
}

impl TestUhr {
    pub fn neu(start: DateTime<Utc>) -> Self {
        Self {
            zeit: Mutex::new(start),
        }
    }

    /// Startet bei einem festen, sekundengenauen Zeitpunkt
    pub fn fest() -> Self {
        Self::neu(DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default())
    }

    /// Stellt die Uhr um die angegebene Anzahl Sekunden vor
    pub fn vorstellen(&self, sekunden: i64) {
        let mut zeit = self.zeit.lock();
        *zeit += Duration::seconds(sekunden);
    }
}

impl Uhr for TestUhr {
    fn jetzt(&self) -> DateTime<Utc> {
        *self.zeit.lock()
    }
}

/// Ablaufregel fuer Items und Mailbox-Eintraege: `jetzt - erstellt > ttl`.
///
/// Genau bei `ttl` ist ein Datensatz noch gueltig.
pub fn abgelaufen(erstellt: DateTime<Utc>, jetzt: DateTime<Utc>, ttl: Duration) -> bool {
    jetzt - erstellt > ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uhr_vorstellen() {
        let uhr = TestUhr::fest();
        let start = uhr.jetzt();
        uhr.vorstellen(301);
        assert_eq!((uhr.jetzt() - start).num_seconds(), 301);
    }

    #[test]
    fn ablauf_grenze() {
        let uhr = TestUhr::fest();
        let erstellt = uhr.jetzt();
        let ttl = Duration::seconds(300);

        uhr.vorstellen(300);
        assert!(!abgelaufen(erstellt, uhr.jetzt(), ttl));

        uhr.vorstellen(1);
        assert!(abgelaufen(erstellt, uhr.jetzt(), ttl));
    }
}

//! Schluesselring mit aktuellem und vorherigem Schluessel
//!
//! `KeyRing::rotate` ist eine reine Funktion: sie liefert den Ring, der zum
//! Zeitpunkt `jetzt` gelten soll. Persistenz und Serialisierung der Aufrufer
//! uebernimmt `KeyRingManager`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::types::{KeyFingerprint, Schluessel};

/// Ein Schluessel mit Erstellungszeitpunkt
///
/// JSON-Form: `{"key": "<base64>", "created_at": <unix-sekunden>}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeyMaterialJson", into = "KeyMaterialJson")]
pub struct KeyMaterial {
    pub schluessel: Schluessel,
    pub erstellt_am: DateTime<Utc>,
}

impl KeyMaterial {
    /// Frischer Zufallsschluessel, sekundengenau gestempelt
    pub fn neu(jetzt: DateTime<Utc>) -> Self {
        Self {
            schluessel: Schluessel::zufaellig(),
            erstellt_am: sekundengenau(jetzt),
        }
    }

    pub fn fingerprint(&self) -> KeyFingerprint {
        self.schluessel.fingerprint()
    }
}

fn sekundengenau(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

#[derive(Serialize, Deserialize)]
struct KeyMaterialJson {
    key: String,
    created_at: i64,
}

impl TryFrom<KeyMaterialJson> for KeyMaterial {
    type Error = CryptoError;

    fn try_from(j: KeyMaterialJson) -> CryptoResult<Self> {
        let erstellt_am = DateTime::<Utc>::from_timestamp(j.created_at, 0)
            .ok_or_else(|| CryptoError::UngueltigeDaten("created_at ausserhalb".into()))?;
        Ok(Self {
            schluessel: Schluessel::aus_base64(&j.key)?,
            erstellt_am,
        })
    }
}

impl From<KeyMaterial> for KeyMaterialJson {
    fn from(k: KeyMaterial) -> Self {
        Self {
            key: k.schluessel.als_base64(),
            created_at: k.erstellt_am.timestamp(),
        }
    }
}

/// Aktueller Schluessel plus genau eine Generation Historie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRing {
    pub current: KeyMaterial,
    pub previous: Option<KeyMaterial>,
}

impl KeyRing {
    /// Neuer Ring mit frischem Schluessel und ohne Vorgaenger
    pub fn neu(jetzt: DateTime<Utc>) -> Self {
        Self {
            current: KeyMaterial::neu(jetzt),
            previous: None,
        }
    }

    /// Ist eine Rotation zum Zeitpunkt `jetzt` faellig?
    pub fn faellig(&self, jetzt: DateTime<Utc>, intervall: Duration) -> bool {
        jetzt - self.current.erstellt_am >= intervall
    }

    /// Liefert den Ring, der zum Zeitpunkt `jetzt` gilt.
    ///
    /// Bei faelliger Rotation wird `current` zu `previous` und ein frischer
    /// Schluessel mit `erstellt_am = jetzt` wird `current`. Sonst bleibt der
    /// Ring unveraendert.
    pub fn rotate(&self, jetzt: DateTime<Utc>, intervall: Duration) -> KeyRing {
        if !self.faellig(jetzt, intervall) {
            return self.clone();
        }
        KeyRing {
            current: KeyMaterial::neu(jetzt),
            previous: Some(self.current.clone()),
        }
    }

    /// `[current, previous?]` in dieser Reihenfolge
    pub fn all_valid_keys(&self) -> Vec<KeyMaterial> {
        std::iter::once(self.current.clone())
            .chain(self.previous.clone())
            .collect()
    }

    /// Sucht den Schluessel mit passendem Fingerprint (current zuerst)
    pub fn finde(&self, fingerprint: &KeyFingerprint) -> Option<&KeyMaterial> {
        std::iter::once(&self.current)
            .chain(self.previous.as_ref())
            .find(|k| &k.fingerprint() == fingerprint)
    }
}

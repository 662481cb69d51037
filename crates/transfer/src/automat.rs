//! Zustandsautomat eines Downloads
//!
//! ```text
//! Auswahl --besitzer erreichbar--> DirektVersuch --geliefert--> Entschluesseln(Direkt)
//!    |                                  |
//!    |                            gescheitert/Zeitlimit
//!    v                                  v
//! ServerFallback <----------------------+
//!    |--geliefert--> Entschluesseln(Server)
//!    '--gescheitert--> Fehlgeschlagen
//!
//! Entschluesseln --ok--> Geliefert
//!                '--fehler--> Fehlgeschlagen
//! ```
//!
//! `verarbeiten` ist eine reine Uebergangsfunktion. Ereignisse eines
//! aufgegebenen Direktversuchs (andere Versuchsnummer) und Ereignisse, die
//! im aktuellen Zustand nicht vorgesehen sind, werden ignoriert.

use serde::Serialize;

/// Woher das Chiffrat kam
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Weg {
    Direkt,
    Server,
}

/// Zustaende eines Downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadZustand {
    Auswahl,
    DirektVersuch { versuch: u32 },
    ServerFallback,
    Entschluesseln { weg: Weg },
    Geliefert { weg: Weg },
    Fehlgeschlagen,
}

impl DownloadZustand {
    pub fn ist_endzustand(&self) -> bool {
        matches!(self, Self::Geliefert { .. } | Self::Fehlgeschlagen)
    }
}

/// Eingaben des Automaten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ereignis {
    /// Ergebnis der Auswahl: lebender, fremder Besitzer bekannt?
    Ausgewaehlt { direkt_moeglich: bool },
    DirektGeliefert { versuch: u32 },
    /// Zeitlimit, Abbruch oder Transportfehler
    DirektGescheitert { versuch: u32 },
    ServerGeliefert,
    ServerGescheitert,
    Entschluesselt,
    EntschluesselungFehlgeschlagen,
}

/// Reiner Zustandsautomat
#[derive(Debug, Clone)]
pub struct DownloadAutomat {
    zustand: DownloadZustand,
    versuche: u32,
    verlauf: Vec<DownloadZustand>,
}

impl Default for DownloadAutomat {
    fn default() -> Self {
        Self::neu()
    }
}

impl DownloadAutomat {
    pub fn neu() -> Self {
        Self {
            zustand: DownloadZustand::Auswahl,
            versuche: 0,
            verlauf: vec![DownloadZustand::Auswahl],
        }
    }

    pub fn zustand(&self) -> DownloadZustand {
        self.zustand
    }

    /// Alle besuchten Zustaende in Reihenfolge
    pub fn verlauf(&self) -> &[DownloadZustand] {
        &self.verlauf
    }

    /// Verarbeitet ein Ereignis. Liefert `true`, wenn sich der Zustand geaendert hat.
    pub fn verarbeiten(&mut self, ereignis: Ereignis) -> bool {
        use DownloadZustand as Z;
        use Ereignis as E;

        let naechster = match (self.zustand, ereignis) {
            (Z::Auswahl, E::Ausgewaehlt { direkt_moeglich: true }) => {
                self.versuche += 1;
                Z::DirektVersuch {
                    versuch: self.versuche,
                }
            }
            (Z::Auswahl, E::Ausgewaehlt { direkt_moeglich: false }) => Z::ServerFallback,

            (Z::DirektVersuch { versuch }, E::DirektGeliefert { versuch: v }) if v == versuch => {
                Z::Entschluesseln { weg: Weg::Direkt }
            }
            (Z::DirektVersuch { versuch }, E::DirektGescheitert { versuch: v }) if v == versuch => {
                Z::ServerFallback
            }

            (Z::ServerFallback, E::ServerGeliefert) => Z::Entschluesseln { weg: Weg::Server },
            (Z::ServerFallback, E::ServerGescheitert) => Z::Fehlgeschlagen,

            (Z::Entschluesseln { weg }, E::Entschluesselt) => Z::Geliefert { weg },
            (Z::Entschluesseln { .. }, E::EntschluesselungFehlgeschlagen) => Z::Fehlgeschlagen,

            (zustand, ereignis) => {
                tracing::trace!(?zustand, ?ereignis, "Ereignis ignoriert");
                return false;
            }
        };

        self.zustand = naechster;
        self.verlauf.push(naechster);
        true
    }

    /// Wie oft wurde auf den Server ausgewichen (0 oder 1)
    pub fn fallbacks(&self) -> usize {
        self.verlauf
            .iter()
            .filter(|z| **z == DownloadZustand::ServerFallback)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direkter_weg() {
        let mut a = DownloadAutomat::neu();
        assert!(a.verarbeiten(Ereignis::Ausgewaehlt { direkt_moeglich: true }));
        assert_eq!(a.zustand(), DownloadZustand::DirektVersuch { versuch: 1 });
        assert!(a.verarbeiten(Ereignis::DirektGeliefert { versuch: 1 }));
        assert!(a.verarbeiten(Ereignis::Entschluesselt));
        assert_eq!(a.zustand(), DownloadZustand::Geliefert { weg: Weg::Direkt });
        assert_eq!(a.fallbacks(), 0);
    }

    #[test]
    fn ohne_besitzer_direkt_zum_server() {
        let mut a = DownloadAutomat::neu();
        a.verarbeiten(Ereignis::Ausgewaehlt { direkt_moeglich: false });
        assert_eq!(a.zustand(), DownloadZustand::ServerFallback);
        a.verarbeiten(Ereignis::ServerGeliefert);
        a.verarbeiten(Ereignis::Entschluesselt);
        assert_eq!(a.zustand(), DownloadZustand::Geliefert { weg: Weg::Server });
    }

    #[test]
    fn zeitlimit_fuehrt_genau_einmal_zum_fallback() {
        let mut a = DownloadAutomat::neu();
        a.verarbeiten(Ereignis::Ausgewaehlt { direkt_moeglich: true });
        assert!(a.verarbeiten(Ereignis::DirektGescheitert { versuch: 1 }));
        // Doppeltes Ereignis und verspaetete Lieferung werden ignoriert
        assert!(!a.verarbeiten(Ereignis::DirektGescheitert { versuch: 1 }));
        assert!(!a.verarbeiten(Ereignis::DirektGeliefert { versuch: 1 }));
        assert_eq!(a.zustand(), DownloadZustand::ServerFallback);
        assert_eq!(a.fallbacks(), 1);
    }

    #[test]
    fn fremde_versuchsnummer_wird_ignoriert() {
        let mut a = DownloadAutomat::neu();
        a.verarbeiten(Ereignis::Ausgewaehlt { direkt_moeglich: true });
        assert!(!a.verarbeiten(Ereignis::DirektGeliefert { versuch: 7 }));
        assert_eq!(a.zustand(), DownloadZustand::DirektVersuch { versuch: 1 });
    }

    #[test]
    fn entschluesselungsfehler_ist_endgueltig() {
        let mut a = DownloadAutomat::neu();
        a.verarbeiten(Ereignis::Ausgewaehlt { direkt_moeglich: false });
        a.verarbeiten(Ereignis::ServerGeliefert);
        a.verarbeiten(Ereignis::EntschluesselungFehlgeschlagen);
        assert_eq!(a.zustand(), DownloadZustand::Fehlgeschlagen);
        assert!(a.zustand().ist_endzustand());
        assert!(!a.verarbeiten(Ereignis::Entschluesselt));
        assert_eq!(
            a.verlauf(),
            &[
                DownloadZustand::Auswahl,
                DownloadZustand::ServerFallback,
                DownloadZustand::Entschluesseln { weg: Weg::Server },
                DownloadZustand::Fehlgeschlagen,
            ]
        );
    }

    #[test]
    fn server_fehler_ist_endgueltig() {
        let mut a = DownloadAutomat::neu();
        a.verarbeiten(Ereignis::Ausgewaehlt { direkt_moeglich: false });
        a.verarbeiten(Ereignis::ServerGescheitert);
        assert_eq!(a.zustand(), DownloadZustand::Fehlgeschlagen);
    }
}

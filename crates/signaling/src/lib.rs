//! handoff-signaling – Rendezvous ueber den Server
//!
//! Zwei Peers, die sich (noch) nicht direkt erreichen, tauschen ueber das
//! Relay ein kleines Handshake-Paket aus. Das Relay versteht den Inhalt nicht.
//!
//! ## Architektur
//!
//! ```text
//! Peer A                 SignalingRelay                 Peer B
//!   | post(B, Angebot) ---> Mailbox[B]                    |
//!   |                       Mailbox[B] <--- poll(B) ------|
//!   |                       Mailbox[A] <--- post(A, Antwort)
//!   | poll(A) ------------> Mailbox[A]                    |
//! ```
//!
//! `SignalingRelay` – eine Mailbox pro Peer, letzter Schreiber gewinnt, TTL
//! `SignalNachricht` – Umschlag der Clients (Angebot/Antwort mit Sitzungs-Id)

pub mod nachricht;
pub mod relay;

// Bequeme Re-Exporte
pub use nachricht::{SignalArt, SignalNachricht};
pub use relay::{MailboxEntry, SignalingRelay, SIGNAL_VERZEICHNIS, STANDARD_MAX_PAYLOAD};

//! handoff-transfer – Client-seitige Koordination einer Uebergabe
//!
//! Dieses Crate implementiert:
//! - Uploader: Datei teilen, Mailbox im Takt lesen, Direktanfragen bedienen
//! - Downloader: Direktversuch mit Zeitlimit, Server-Fallback, Entschluesselung
//! - DownloadAutomat: reine Zustandsuebergaenge mit Versuchsnummern
//! - HttpGegenstelle: reqwest-Client fuer die REST-Schnittstelle des Servers
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use handoff_core::PeerId;
//! use handoff_transfer::{
//!     DirektTransport, DownloadAuftrag, Downloader, HttpGegenstelle, ItemVerzeichnis,
//!     TransferKonfig,
//! };
//!
//! async fn alle_laden(transport: Arc<dyn DirektTransport>) -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Arc::new(HttpGegenstelle::neu("http://127.0.0.1:8080/")?);
//!     let downloader = Downloader::neu(
//!         PeerId::zufaellig(),
//!         TransferKonfig::default(),
//!         server.clone(),
//!         server.clone(),
//!         server.clone(),
//!         transport,
//!     );
//!     for item in server.items().await? {
//!         let bericht = downloader.herunterladen(&DownloadAuftrag::from(&item)).await;
//!         println!("{}: {:?}", item.display_name, bericht.weg());
//!     }
//!     Ok(())
//! }
//! ```

pub mod automat;
pub mod downloader;
pub mod error;
pub mod http;
pub mod kollaborateure;
pub mod konfig;
pub mod session;
pub mod uploader;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;


// Bequeme Re-Exporte
pub use automat::{DownloadAutomat, DownloadZustand, Ereignis, Weg};
pub use downloader::{DownloadAuftrag, DownloadBericht, Downloader};
pub use error::{TransferError, TransferResult};
pub use http::HttpGegenstelle;
pub use kollaborateure::{
    DirektAngebot, DirektAnfrage, DirektTransport, DirektVerbindung, ItemInfo, ItemVerzeichnis,
    SchluesselQuelle, ServerAbruf, ServerItem, SignalKanal,
};
pub use konfig::TransferKonfig;
pub use session::TransferSession;
pub use uploader::Uploader;

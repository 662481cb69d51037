//! handoff-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod rest;
pub mod state;
pub mod sweeper;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use config::ServerConfig;
use handoff_core::{DiskStorage, SystemUhr};
use state::AppState;
use tokio_util::sync::CancellationToken;

/// Haelt den Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    pub state: AppState,
}

impl Server {
    /// Erstellt einen Server ueber dem konfigurierten Speicherverzeichnis
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let storage = Arc::new(DiskStorage::new(&config.speicher.verzeichnis));
        let state = AppState::neu(&config, storage, Arc::new(SystemUhr))?;
        Ok(Self { config, state })
    }

    /// Router mit allen Endpunkten und Middleware
    pub fn router(&self) -> Router {
        rest::router(
            self.state.clone(),
            &self.config.netzwerk.cors_origins,
            self.config.observability.aktiviert,
        )
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Index und Mailboxen aus dem Speicher wiederherstellen
    /// 2. Schluesselring laden oder anlegen
    /// 3. Sweeper starten
    /// 4. REST-API starten
    /// 5. Auf Ctrl-C warten, dann geordnet beenden
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            api = %self.config.api_bind_adresse(),
            speicher = %self.config.speicher.verzeichnis,
            "Server startet"
        );

        self.state.wiederherstellen().await?;
        let aktuell = self
            .state
            .schluessel
            .current_key()
            .await
            .context("Schluesselring nicht verfuegbar")?;
        tracing::info!(fingerprint = %aktuell.fingerprint(), "Schluesselring bereit");

        let abbruch = CancellationToken::new();
        let sweeper = sweeper::sweeper_starten(
            self.state.clone(),
            self.config.sweep_intervall(),
            abbruch.clone(),
        );

        let adresse = self.config.api_bind_adresse();
        let listener = tokio::net::TcpListener::bind(&adresse)
            .await
            .with_context(|| format!("Bind auf {adresse} fehlgeschlagen"))?;
        tracing::info!(addr = %adresse, "REST-API bereit");

        let shutdown = abbruch.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen");
                }
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                shutdown.cancel();
            })
            .await?;

        abbruch.cancel();
        sweeper.await?;
        Ok(())
    }
}

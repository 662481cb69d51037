//! Periodischer Sweep ueber Ablage und Mailboxen

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Ein Durchlauf: entfernt Abgelaufenes, pflegt Metriken und Health-Status
pub async fn einmal_sweepen(state: &AppState) {
    let jetzt = state.uhr.jetzt();
    let items = state.ablage.sweep(jetzt).await;
    let signale = state.relay.sweep(jetzt).await;

    state.metriken.items_expired_total.inc_by(items.entfernt as u64);
    state.bestand_melden().await;
    state
        .health
        .speicher_status_setzen(items.fehlgeschlagen == 0 && signale.fehlgeschlagen == 0);

    if items.entfernt + signale.entfernt > 0 {
        tracing::debug!(
            items = items.entfernt,
            mailboxen = signale.entfernt,
            "Sweep abgeschlossen"
        );
    }
}

/// Startet den Sweeper bis `abbruch` ausgeloest wird
pub fn sweeper_starten(
    state: AppState,
    intervall: Duration,
    abbruch: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(intervall);
        takt.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = abbruch.cancelled() => break,
                _ = takt.tick() => einmal_sweepen(&state).await,
            }
        }
        tracing::info!("Sweeper beendet");
    })
}

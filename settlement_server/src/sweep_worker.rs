use log::*;
use settlement_engine::{events::EventProducers, SettlementApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;

/// Starts the settlement sweep worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_sweep_worker(db: SqliteDatabase, producers: EventProducers, config: &ServerConfig) -> JoinHandle<()> {
    let interval = std::time::Duration::from_secs(config.sweep_interval_secs);
    let api = SettlementApi::new(db, producers, config.risk.clone(), config.tiers.clone());
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Settlement sweep worker started (every {}s)", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running scheduled settlement sweep");
            match api.run_sweep().await {
                Ok(summary) => {
                    info!(
                        "🕰️ Sweep complete: {} processed, {} released, {} held for review, {} tier upgrades, {} \
                         failures",
                        summary.processed_total,
                        summary.released,
                        summary.held_for_review,
                        summary.tier_upgrades,
                        summary.failures
                    );
                },
                Err(e) => {
                    error!("🕰️ Error running settlement sweep: {e}");
                },
            }
        }
    })
}

//! Background sweep that retires completed immigrations (spec §4.7).

use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::debug;

use crate::migration::config::MigrationConfig;
use crate::migration::immigration::ImmigrationHash;

/// Periodically retires immigrations whose `DONE` was processed at least
/// `migrate_rx_lifetime_ms` ago. Runs for the lifetime of the
/// `tokio::spawn`ed task it's handed to — grounded on the `tokio::spawn`
/// plus `tokio::time::interval` background-task shape used to drive
/// deferred-startup services elsewhere in this crate.
pub async fn run(hash: Arc<ImmigrationHash>, config: Arc<MigrationConfig>) {
    let mut ticker = interval(Duration::from_millis(config.reaper_interval_ms.max(1)));
    loop {
        ticker.tick().await;
        debug!("immigration reaper sweep");
        hash.reap_expired(config.migrate_rx_lifetime_ms).await;
    }
}

//! Tunables for the partition migration subsystem.

/// Configuration for the emigration/immigration engine.
///
/// Defaults match the documented values in the migration subsystem's
/// design: a single worker by default, a 32 MiB in-flight window per
/// emigration, and retransmit intervals tied to the transaction retry
/// interval.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Number of emigration worker threads.
    pub n_migrate_threads: u32,
    /// Per-emigration in-flight byte window before the producer blocks.
    pub max_bytes_emigrating: u64,
    /// Insert resend interval, in milliseconds.
    pub retransmit_ms: u64,
    /// START/DONE control message resend interval, in milliseconds.
    pub retransmit_startdone_ms: u64,
    /// How long (ms) an immigration is remembered after DONE before the
    /// reaper retires it. `<= 0` (represented as `0`) means retire
    /// immediately on the winning DONE.
    pub migrate_rx_lifetime_ms: u64,
    /// Per-record outbound throttle, in milliseconds. `0` disables throttling.
    pub migrate_sleep_ms: u64,
    /// Default `migrate_order` for namespaces that don't set one explicitly.
    /// Lower values pop first from the scheduler's priority queue.
    pub default_migrate_order: u32,
    /// Interval between reinsert-table retransmit sweeps, in milliseconds.
    pub reinsert_sweep_interval_ms: u64,
    /// Backoff after a `QUEUE_FULL` fabric send, in milliseconds.
    pub queue_full_backoff_ms: u64,
    /// Poll interval while blocked on the backpressure window, in milliseconds.
    pub backpressure_poll_ms: u64,
    /// Interval the immigration reaper wakes at, in milliseconds.
    pub reaper_interval_ms: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            n_migrate_threads: 1,
            max_bytes_emigrating: 32 * 1024 * 1024,
            retransmit_ms: 1000,
            retransmit_startdone_ms: 1000,
            migrate_rx_lifetime_ms: 0,
            migrate_sleep_ms: 0,
            default_migrate_order: 0,
            reinsert_sweep_interval_ms: 50,
            queue_full_backoff_ms: 10,
            backpressure_poll_ms: 1,
            reaper_interval_ms: 1000,
        }
    }
}

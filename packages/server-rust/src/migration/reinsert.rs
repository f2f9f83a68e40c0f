//! The reinsert table (spec §4.3): tracks in-flight `INSERT` messages for
//! one emigration so unacked sends are retransmitted, and bounds the
//! in-flight byte window so a fast sender cannot outrun a slow receiver.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::wire::{InsertPayload, MigrationMessage};

struct PendingInsert {
    msg: InsertPayload,
    size: u64,
    /// Milliseconds since epoch this insert was last (re)sent.
    last_sent_ms: i64,
}

/// Tracks unacked `INSERT`s for a single emigration and the bytes
/// currently in flight for its backpressure window.
pub struct ReinsertTable {
    pending: DashMap<u64, PendingInsert>,
    bytes_emigrating: AtomicU64,
}

impl ReinsertTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            bytes_emigrating: AtomicU64::new(0),
        }
    }

    /// Current in-flight byte count, for the backpressure check.
    #[must_use]
    pub fn bytes_emigrating(&self) -> u64 {
        self.bytes_emigrating.load(Ordering::Acquire)
    }

    /// Record an outbound insert awaiting ack. `now_ms` is the send time.
    pub fn put(&self, payload: InsertPayload, size: u64, now_ms: i64) {
        self.bytes_emigrating.fetch_add(size, Ordering::AcqRel);
        self.pending.insert(
            payload.insert_id,
            PendingInsert {
                msg: payload,
                size,
                last_sent_ms: now_ms,
            },
        );
    }

    /// Acknowledge `insert_id`, freeing its bytes from the window.
    /// Returns `true` if it was actually pending (a duplicate or
    /// unexpected ack is a harmless no-op, matching spec §4.5 point 1).
    pub fn ack(&self, insert_id: u64) -> bool {
        if let Some((_, entry)) = self.pending.remove(&insert_id) {
            self.bytes_emigrating.fetch_sub(entry.size, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    /// `true` once every in-flight insert has been acked — the precondition
    /// for sending `DONE` (spec §4.4).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Entries whose last send is older than `retransmit_ms`, due for
    /// resend. Updates their `last_sent_ms` to `now_ms` as a side effect,
    /// matching the source's "retransmit sweep owns the clock" behavior.
    pub fn due_for_retransmit(&self, now_ms: i64, retransmit_ms: i64) -> Vec<MigrationMessage> {
        let mut due = Vec::new();
        for mut entry in self.pending.iter_mut() {
            if now_ms - entry.last_sent_ms >= retransmit_ms {
                entry.last_sent_ms = now_ms;
                due.push(MigrationMessage::Insert(entry.msg.clone()));
            }
        }
        due
    }
}

impl Default for ReinsertTable {
    fn default() -> Self {
        Self::new()
    }
}

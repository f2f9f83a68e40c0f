//! The replica-write / migration merge interlock (spec §4.8, Testable
//! Property 1).
//!
//! A record can arrive at a destination node two ways during a migration:
//! as a pickled record off the wire, or as a concurrent ordinary
//! replica write. Both paths funnel through [`merge_record`] so they
//! converge on the same winner regardless of arrival order.

use crate::migration::record::PickledRecord;
use crate::storage::record::RecordMetadata;

/// What happened when a candidate record was merged against local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No local record existed; the candidate was not applied because the
    /// caller asked for update-only semantics (spec §9 drop-pickle case).
    NotFound,
    /// The candidate was newer and was applied.
    Applied,
    /// The candidate was not newer than what's already stored; discarded.
    Superseded,
}

/// Compare two records' (generation, last_update_time) pairs the way the
/// source's replica-write path does: generation is the primary order,
/// wall-clock last-update-time breaks ties on equal generation (this can
/// happen when a replica write and a migrated copy both stamp the
/// generation the emigrating side last saw).
fn is_newer(candidate_generation: u32, candidate_time: i64, local_generation: u32, local_time: i64) -> bool {
    match candidate_generation.cmp(&local_generation) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate_time > local_time,
    }
}

/// Merge `candidate` against `local`, the metadata of whatever (if
/// anything) is currently stored at `candidate.digest`. `local` is `None`
/// when there is no local record and the caller's path requires one to
/// exist already — e.g. the drop-pickle XDR-shipping path of spec §4.8,
/// which must not fabricate a record that was never truly written.
#[must_use]
pub fn merge_record(candidate: &PickledRecord, local: Option<&RecordMetadata>, require_existing: bool) -> MergeOutcome {
    match local {
        None => {
            if require_existing {
                MergeOutcome::NotFound
            } else {
                MergeOutcome::Applied
            }
        }
        Some(meta) => {
            if is_newer(
                candidate.generation,
                candidate.last_update_time,
                meta.version,
                meta.last_update_time,
            ) {
                MergeOutcome::Applied
            } else {
                MergeOutcome::Superseded
            }
        }
    }
}

/// Coerce a generation of `0` to `1`, the wire-arrival normalization spec
/// §9 calls out explicitly (a `0` generation must never be stored as-is).
#[must_use]
pub fn normalize_generation(generation: u32) -> u32 {
    if generation == 0 {
        1
    } else {
        generation
    }
}

//! The migration unit: a pickled record plus its sub-record linkage.
//!
//! A [`PickledRecord`] is an immutable value produced by the emigration
//! tree sweep and consumed once by immigration's merge step. Kind is
//! carried as a tagged [`RecordKind`] rather than a bit-flag bag (see
//! `DESIGN.md`).

use serde::{Deserialize, Serialize};

/// What role a pickled record plays with respect to a parent/sub-record group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    /// An ordinary top-level record with no sub-record linkage.
    Normal,
    /// A top-level record that owns one or more sub-records.
    Parent,
    /// A dependent sub-record associated with a parent.
    SubRecord,
    /// The existence-marker sub-record for a parent's sub-record set.
    Esr,
}

impl RecordKind {
    /// Sub-records and ESRs must cross the wire before their parent (spec
    /// invariant 4: `tx_state` only transitions SUBRECORD -> RECORD).
    #[must_use]
    pub fn is_sub_record_tree(self) -> bool {
        matches!(self, RecordKind::SubRecord | RecordKind::Esr)
    }
}

/// Sub-record linkage, present only for `RecordKind::SubRecord`/`Esr` records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubRecordLinkage {
    /// Digest of the owning parent record.
    pub parent_digest: Vec<u8>,
    /// Digest of the set's existence-marker sub-record.
    pub esr_digest: Vec<u8>,
    /// Per-migration version token stamped by the emigrating side, used to
    /// detect and drop sub-records orphaned by a concurrent migration.
    pub version: u64,
    /// Parent's generation at the time of linkage capture.
    pub parent_generation: u32,
    /// Parent's void-time at the time of linkage capture.
    pub parent_void_time: u32,
}

/// An immutable, already-serialized record payload plus the metadata
/// needed to merge it on the receiving side (spec §3 "Pickled record").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickledRecord {
    /// Fixed-width content-addressed key.
    pub digest: Vec<u8>,
    /// Monotone write counter. `0` is coerced to `1` on receipt (spec §9).
    pub generation: u32,
    /// Absolute expiry; `0` means never.
    pub void_time: u32,
    /// Wall-clock time of the write that produced this value, used for
    /// newest-wins dedup on merge (spec §4.3, Testable Property 1).
    pub last_update_time: i64,
    /// Opaque serialized bins. Empty means "drop, never store" (spec §4.5.4).
    pub record_buf: Vec<u8>,
    /// Optional serialized properties bag (set name, stored key, ...).
    pub rec_props: Option<Vec<u8>>,
    /// What role this record plays in a parent/sub-record group.
    pub kind: RecordKind,
    /// Present only when `kind` is `SubRecord` or `Esr`.
    pub linkage: Option<SubRecordLinkage>,
}

impl PickledRecord {
    /// `true` if this record must be sent/merged before its tree's parents
    /// (spec invariant 4).
    #[must_use]
    pub fn is_sub_record_tree(&self) -> bool {
        self.kind.is_sub_record_tree()
    }

    /// Estimated on-wire size, used for `bytes_emigrating` accounting.
    #[must_use]
    pub fn estimated_size(&self) -> u64 {
        let props_len = self.rec_props.as_ref().map_or(0, Vec::len);
        let linkage_len = self.linkage.as_ref().map_or(0, |l| {
            l.parent_digest.len() + l.esr_digest.len() + 16
        });
        (self.digest.len() + self.record_buf.len() + props_len + linkage_len + 24) as u64
    }

    /// `true` if this record's bins are empty and it must be dropped
    /// rather than stored (spec §4.5.4).
    #[must_use]
    pub fn has_empty_bins(&self) -> bool {
        self.record_buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: RecordKind) -> PickledRecord {
        PickledRecord {
            digest: vec![1, 2, 3],
            generation: 1,
            void_time: 0,
            last_update_time: 1000,
            record_buf: vec![0xAB; 10],
            rec_props: None,
            kind,
            linkage: None,
        }
    }

    #[test]
    fn sub_record_tree_classification() {
        assert!(!sample(RecordKind::Normal).is_sub_record_tree());
        assert!(!sample(RecordKind::Parent).is_sub_record_tree());
        assert!(sample(RecordKind::SubRecord).is_sub_record_tree());
        assert!(sample(RecordKind::Esr).is_sub_record_tree());
    }

    #[test]
    fn empty_bins_detected() {
        let mut r = sample(RecordKind::Normal);
        r.record_buf.clear();
        assert!(r.has_empty_bins());
    }

    #[test]
    fn estimated_size_accounts_for_props_and_linkage() {
        let base = sample(RecordKind::Normal);
        let base_size = base.estimated_size();

        let mut with_props = base.clone();
        with_props.rec_props = Some(vec![0u8; 20]);
        assert!(with_props.estimated_size() > base_size);

        let mut with_linkage = base.clone();
        with_linkage.kind = RecordKind::SubRecord;
        with_linkage.linkage = Some(SubRecordLinkage {
            parent_digest: vec![9; 20],
            esr_digest: vec![8; 20],
            version: 42,
            parent_generation: 1,
            parent_void_time: 0,
        });
        assert!(with_linkage.estimated_size() > base_size);
    }

    #[test]
    fn serde_round_trip() {
        let record = sample(RecordKind::SubRecord);
        let mut record = record;
        record.linkage = Some(SubRecordLinkage {
            parent_digest: vec![1; 20],
            esr_digest: vec![2; 20],
            version: 7,
            parent_generation: 3,
            parent_void_time: 0,
        });

        let bytes = rmp_serde::to_vec_named(&record).unwrap();
        let decoded: PickledRecord = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(record, decoded);
    }
}

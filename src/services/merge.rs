// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Merge freshly fetched club activities into the stored collection.
//!
//! Club activities have no ID, so novelty is decided by scanning the whole
//! stored collection with [`ActivityRecord::same_activity`]. This is
//! O(n·m), which is fine for a feed page against a few hundred records.

use crate::models::ActivityRecord;

/// Result of a merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Stored collection with novel records at the head
    pub records: Vec<ActivityRecord>,
    /// Number of incoming records that were novel
    pub inserted: usize,
}

/// Returns true if no record in `existing` matches `candidate` on all identity fields.
pub fn is_novel(candidate: &ActivityRecord, existing: &[ActivityRecord]) -> bool {
    !existing.iter().any(|r| r.same_activity(candidate))
}

/// Merge `incoming` into `existing`.
///
/// Each novel record is inserted at index 0 as it is encountered, so several
/// novel records end up in reverse feed order. Later incoming records are
/// also checked against ones inserted earlier in the same merge. Afterwards
/// every record without a `timestamp` gets `ingested_at`; existing
/// timestamps are left alone.
pub fn merge_records(
    incoming: Vec<ActivityRecord>,
    mut existing: Vec<ActivityRecord>,
    ingested_at: &str,
) -> MergeOutcome {
    let mut inserted = 0;

    for record in incoming {
        if is_novel(&record, &existing) {
            existing.insert(0, record);
            inserted += 1;
        }
    }

    stamp_missing_timestamps(&mut existing, ingested_at);

    MergeOutcome {
        records: existing,
        inserted,
    }
}

/// Set `timestamp` on every record that lacks one.
pub fn stamp_missing_timestamps(records: &mut [ActivityRecord], ingested_at: &str) {
    for record in records.iter_mut().filter(|r| r.timestamp.is_none()) {
        record.timestamp = Some(ingested_at.to_string());
    }
}

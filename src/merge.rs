// 🔀 Merge Engine - Deterministic merge with provenance precedence
//
// Precedence rule: immutable provenance always wins over mutable.
// Canon imports never clobber other canon imports; a disagreement between two
// immutable records is reported as a conflict and the stored record is kept.
//
// Records are applied one at a time, in input order. There is no rollback:
// a conflict on one record never stops the records that follow it.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// CANON RECORD
// ============================================================================

/// A keyed record that carries the immutability flag (entities, anchors).
pub trait CanonRecord: Clone + PartialEq {
    /// Human-readable record kind, used in logs
    const KIND: &'static str;

    /// Unique key within its store (entity name, anchor id)
    fn key(&self) -> &str;

    fn is_immutable(&self) -> bool;

    /// Check the record's own invariants (non-empty name, anchor id format)
    fn validate(&self) -> Result<()>;
}

// ============================================================================
// MERGE DECISION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeDecision {
    /// No record with this key exists yet
    Add,

    /// Immutable import replaces a mutable stored record
    Promote,

    /// Mutable import replaces a mutable stored record (deduplicate = true)
    Overwrite,

    /// Two immutable records disagree; stored record is kept
    Conflict,

    /// Stored record is left untouched
    Skip,
}

/// Decide what happens to one imported record. Pure: no store access.
pub fn decide<T: CanonRecord>(existing: Option<&T>, imported: &T, deduplicate: bool) -> MergeDecision {
    let existing = match existing {
        Some(e) => e,
        None => return MergeDecision::Add,
    };

    match (existing.is_immutable(), imported.is_immutable()) {
        (false, true) => MergeDecision::Promote,
        (true, true) if existing == imported => MergeDecision::Skip,
        (true, true) => MergeDecision::Conflict,
        (true, false) => MergeDecision::Skip,
        (false, false) if deduplicate => MergeDecision::Overwrite,
        (false, false) => MergeDecision::Skip,
    }
}

// ============================================================================
// MERGE REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub added: usize,
    pub updated: usize,
    pub conflicts: usize,

    /// Records left unchanged (including invalid imports)
    pub skipped: usize,

    /// Keys that produced a conflict, in input order
    pub conflicting_keys: Vec<String>,
}

impl MergeReport {
    /// Fold one decision into the running totals
    pub fn record(&mut self, decision: MergeDecision, key: &str) {
        match decision {
            MergeDecision::Add => self.added += 1,
            MergeDecision::Promote | MergeDecision::Overwrite => self.updated += 1,
            MergeDecision::Conflict => {
                self.conflicts += 1;
                self.conflicting_keys.push(key.to_string());
            }
            MergeDecision::Skip => self.skipped += 1,
        }
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicts > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Merge: {} added, {} updated, {} conflicts, {} skipped",
            self.added, self.updated, self.conflicts, self.skipped
        )
    }
}

// ============================================================================
// MERGE FOLD
// ============================================================================

/// Merge `imported` into an insertion-ordered store keyed by `CanonRecord::key`.
///
/// New records are appended; replaced records keep their position.
pub fn merge_into<T: CanonRecord>(store: &mut Vec<T>, imported: Vec<T>, deduplicate: bool) -> MergeReport {
    let mut report = MergeReport::default();

    for record in imported {
        if let Err(e) = record.validate() {
            warn!("Skipping invalid imported {}: {}", T::KIND, e);
            report.skipped += 1;
            continue;
        }

        let position = store.iter().position(|r| r.key() == record.key());
        let decision = decide(position.map(|i| &store[i]), &record, deduplicate);
        report.record(decision, record.key());

        match (decision, position) {
            (MergeDecision::Add, _) => {
                debug!("Merge added {} {}", T::KIND, record.key());
                store.push(record);
            }
            (MergeDecision::Promote, Some(i)) | (MergeDecision::Overwrite, Some(i)) => {
                debug!("Merge {:?} {} {}", decision, T::KIND, record.key());
                store[i] = record;
            }
            (MergeDecision::Conflict, _) => {
                warn!(
                    "Merge conflict: immutable {} {} differs from stored canon, keeping stored record",
                    T::KIND,
                    record.key()
                );
            }
            _ => {}
        }
    }

    info!("{} ({})", report.summary(), T::KIND);
    report
}

// ============================================================================
// TESTS
// ============================================================================

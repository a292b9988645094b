// Canon Consistency Engine - Core Library
// Authoritative world state for a narrative pipeline: entities, timeline, conflict screening

pub mod error;
pub mod merge;      // Provenance-aware merge fold
pub mod registry;   // Entity Registry
pub mod timeline;   // Timeline Manager - anchors and chronology
pub mod conflicts;  // Conflict Detector - opposition rules
pub mod store;      // SQLite snapshot persistence

// Re-export commonly used types
pub use error::{CanonError, Result};
pub use merge::{
    CanonRecord, MergeDecision, MergeReport,
    decide, merge_into,
};
pub use registry::{
    Entity, EntityType, EntityUpdate, EntityRegistry, RegistrySnapshot,
};
pub use timeline::{
    AnchorKind, AnchorUpdate, ChronologyReport,
    TimelineAnchor, TimelineConfig, TimelineManager, TimelineSnapshot,
    ORIGIN_ANCHOR,
};
pub use conflicts::{
    CanonConflict, ConflictDetector, ConflictReport, ConflictResolution,
    ConflictSeverity, ConflictSummary, IdeaMatcher, OppositionRule,
    default_rules,
};
pub use store::{
    CanonState, CanonStore, SaveOutcome, SnapshotInfo,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

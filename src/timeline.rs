// ⏳ Timeline Manager - Historical anchors with chronology validation
//
// Two kinds of anchors:
// 1. Baseline:  "T0", "T1", ... carry an absolute year
// 2. Extension: "T3-REVOLT", ... carry an offset in years relative to T0
//
// Offsets are stored as declared. Resolving them to absolute years is a
// read-time convenience: an extension anchor may exist before T0 does, and
// validate_chronology() is the only place a missing T0 is reported.

use crate::error::{CanonError, Result};
use crate::merge::{self, CanonRecord, MergeReport};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static BASELINE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^T(\d+)$").expect("valid regex"));
static EXTENSION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^T(\d+)-([A-Za-z0-9_]+(?:-[A-Za-z0-9_]+)*)$").expect("valid regex"));

/// Id of the anchor every extension offset is relative to
pub const ORIGIN_ANCHOR: &str = "T0";

// ============================================================================
// ANCHOR KIND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorKind {
    Baseline { index: u64 },
    Extension { index: u64, label: String },
}

impl AnchorKind {
    /// Parse an anchor id, failing with `InvalidAnchorFormat`
    pub fn parse(anchor_id: &str) -> Result<AnchorKind> {
        if let Some(caps) = BASELINE_ID.captures(anchor_id) {
            return Ok(AnchorKind::Baseline {
                index: parse_index(anchor_id, &caps[1])?,
            });
        }

        if let Some(caps) = EXTENSION_ID.captures(anchor_id) {
            return Ok(AnchorKind::Extension {
                index: parse_index(anchor_id, &caps[1])?,
                label: caps[2].to_string(),
            });
        }

        Err(CanonError::InvalidAnchorFormat(anchor_id.to_string()))
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, AnchorKind::Baseline { .. })
    }

    pub fn index(&self) -> u64 {
        match self {
            AnchorKind::Baseline { index } | AnchorKind::Extension { index, .. } => *index,
        }
    }
}

fn parse_index(anchor_id: &str, digits: &str) -> Result<u64> {
    // Digit runs too long for u64 are not a usable ordering key
    digits
        .parse()
        .map_err(|_| CanonError::InvalidAnchorFormat(anchor_id.to_string()))
}

// ============================================================================
// TIMELINE ANCHOR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineAnchor {
    pub anchor_id: String,
    pub event: String,

    /// Absolute year (baseline anchors)
    #[serde(default)]
    pub year: Option<i64>,

    /// Years relative to T0 (extension anchors)
    #[serde(default)]
    pub offset: Option<i64>,

    #[serde(default)]
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub immutable: bool,
}

impl TimelineAnchor {
    /// Create a new mutable anchor. Fails if `anchor_id` is malformed.
    pub fn new(anchor_id: impl Into<String>, event: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let anchor = TimelineAnchor {
            anchor_id: anchor_id.into(),
            event: event.into(),
            year: None,
            offset: None,
            description: String::new(),
            source: source.into(),
            immutable: false,
        };
        anchor.kind()?;
        Ok(anchor)
    }

    pub fn with_year(mut self, year: i64) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    pub fn kind(&self) -> Result<AnchorKind> {
        AnchorKind::parse(&self.anchor_id)
    }

    pub fn is_baseline(&self) -> bool {
        !self.anchor_id.contains('-')
    }
}

impl CanonRecord for TimelineAnchor {
    const KIND: &'static str = "anchor";

    fn key(&self) -> &str {
        &self.anchor_id
    }

    fn is_immutable(&self) -> bool {
        self.immutable
    }

    fn validate(&self) -> Result<()> {
        self.kind().map(|_| ())
    }
}

// ============================================================================
// ANCHOR UPDATE
// ============================================================================

/// Partial anchor update: only `Some` fields are applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnchorUpdate {
    pub event: Option<String>,
    pub year: Option<i64>,
    pub offset: Option<i64>,
    pub description: Option<String>,
    pub source: Option<String>,
}

impl AnchorUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn year(mut self, year: i64) -> Self {
        self.year = Some(year);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    fn apply_to(self, anchor: &mut TimelineAnchor) {
        if let Some(event) = self.event {
            anchor.event = event;
        }
        if self.year.is_some() {
            anchor.year = self.year;
        }
        if self.offset.is_some() {
            anchor.offset = self.offset;
        }
        if let Some(description) = self.description {
            anchor.description = description;
        }
        if let Some(source) = self.source {
            anchor.source = source;
        }
    }
}

// ============================================================================
// CONFIG & REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Gaps between consecutive baseline years above this are advisory warnings
    #[serde(default = "default_gap_warning_years")]
    pub gap_warning_years: i64,
}

fn default_gap_warning_years() -> i64 {
    1000
}

impl Default for TimelineConfig {
    fn default() -> Self {
        TimelineConfig {
            gap_warning_years: default_gap_warning_years(),
        }
    }
}

/// Result of a chronology pass. Only `errors` affect validity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChronologyReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ChronologyReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Serializable projection of a timeline: `{"anchors": [...]}` in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub anchors: Vec<TimelineAnchor>,
}

// ============================================================================
// TIMELINE MANAGER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TimelineManager {
    /// Insertion-ordered, unique by anchor_id
    anchors: Vec<TimelineAnchor>,
    config: TimelineConfig,
}

impl TimelineManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TimelineConfig) -> Self {
        TimelineManager {
            anchors: Vec::new(),
            config,
        }
    }

    /// Rebuild a timeline from a persisted snapshot (duplicate checks bypassed,
    /// id format still enforced)
    pub fn from_snapshot(snapshot: TimelineSnapshot) -> Result<Self> {
        let mut timeline = TimelineManager::new();
        for anchor in snapshot.anchors {
            anchor.kind()?;
            match timeline.position(&anchor.anchor_id) {
                Some(i) => timeline.anchors[i] = anchor,
                None => timeline.anchors.push(anchor),
            }
        }
        Ok(timeline)
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    fn position(&self, anchor_id: &str) -> Option<usize> {
        self.anchors.iter().position(|a| a.anchor_id == anchor_id)
    }

    /// Insert an anchor after checking its id format and uniqueness
    pub fn add_anchor(&mut self, anchor: TimelineAnchor) -> Result<&TimelineAnchor> {
        anchor.kind()?;
        if self.position(&anchor.anchor_id).is_some() {
            return Err(CanonError::DuplicateAnchor(anchor.anchor_id));
        }

        debug!(
            "Added anchor {} ({}, source: {}, immutable: {})",
            anchor.anchor_id, anchor.event, anchor.source, anchor.immutable
        );
        self.anchors.push(anchor);
        Ok(&self.anchors[self.anchors.len() - 1])
    }

    pub fn get_anchor(&self, anchor_id: &str) -> Option<&TimelineAnchor> {
        self.anchors.iter().find(|a| a.anchor_id == anchor_id)
    }

    /// Anchors with a bare `T<n>` id, in insertion order
    pub fn get_baseline_anchors(&self) -> Vec<&TimelineAnchor> {
        self.anchors.iter().filter(|a| a.is_baseline()).collect()
    }

    /// Anchors with a `T<n>-<LABEL>` id, in insertion order
    pub fn get_extension_anchors(&self) -> Vec<&TimelineAnchor> {
        self.anchors.iter().filter(|a| !a.is_baseline()).collect()
    }

    pub fn update_anchor(&mut self, anchor_id: &str, update: AnchorUpdate) -> Result<&TimelineAnchor> {
        let i = self
            .position(anchor_id)
            .ok_or_else(|| CanonError::not_found("Anchor", anchor_id))?;

        if self.anchors[i].immutable {
            return Err(CanonError::immutable("update", "anchor", anchor_id));
        }

        update.apply_to(&mut self.anchors[i]);
        debug!("Updated anchor {}", anchor_id);
        Ok(&self.anchors[i])
    }

    /// Remove a mutable anchor. Returns false if no such anchor exists.
    pub fn delete_anchor(&mut self, anchor_id: &str) -> Result<bool> {
        let i = match self.position(anchor_id) {
            Some(i) => i,
            None => return Ok(false),
        };

        if self.anchors[i].immutable {
            return Err(CanonError::immutable("delete", "anchor", anchor_id));
        }

        self.anchors.remove(i);
        debug!("Deleted anchor {}", anchor_id);
        Ok(true)
    }

    /// Absolute year of an anchor: baseline year, or T0 year + offset
    pub fn resolve_year(&self, anchor_id: &str) -> Option<i64> {
        let anchor = self.get_anchor(anchor_id)?;
        if anchor.is_baseline() {
            return anchor.year;
        }

        let origin = self.get_anchor(ORIGIN_ANCHOR)?.year?;
        // Out-of-range years do not resolve
        anchor.offset.and_then(|offset| origin.checked_add(offset))
    }

    /// Chronology errors only; an empty list means the timeline is valid
    pub fn validate_chronology(&self) -> Vec<String> {
        self.chronology_report().errors
    }

    /// Full chronology pass: blocking errors plus advisory warnings
    pub fn chronology_report(&self) -> ChronologyReport {
        let mut report = ChronologyReport::default();

        if self.get_anchor(ORIGIN_ANCHOR).is_none() {
            report
                .errors
                .push(format!("Baseline anchor {} is missing", ORIGIN_ANCHOR));
        }

        // Baseline anchors ordered by numeric index: T0 < T1 < T2 < T10
        let mut baseline: Vec<(u64, &TimelineAnchor)> = self
            .anchors
            .iter()
            .filter_map(|a| match a.kind() {
                Ok(AnchorKind::Baseline { index }) => Some((index, a)),
                _ => None,
            })
            .collect();
        baseline.sort_by_key(|(index, _)| *index);

        let mut previous: Option<(&TimelineAnchor, i64)> = None;
        for (_, anchor) in baseline {
            let year = match anchor.year {
                Some(year) => year,
                None => {
                    report
                        .errors
                        .push(format!("Baseline anchor {} is missing a year", anchor.anchor_id));
                    continue;
                }
            };

            if let Some((prev, prev_year)) = previous {
                if year <= prev_year {
                    report.errors.push(format!(
                        "{} (year {}) must come after {} (year {})",
                        anchor.anchor_id, year, prev.anchor_id, prev_year
                    ));
                } else {
                    // Widened: the span between any two i64 years fits in i128
                    let gap = i128::from(year) - i128::from(prev_year);
                    if gap > i128::from(self.config.gap_warning_years) {
                        report.warnings.push(format!(
                            "Large gap of {} years between {} and {}",
                            gap, prev.anchor_id, anchor.anchor_id
                        ));
                    }
                }
            }
            previous = Some((anchor, year));
        }

        report
    }

    /// Merge imported anchors; immutable provenance wins over mutable.
    pub fn merge(&mut self, imported: Vec<TimelineAnchor>, deduplicate: bool) -> MergeReport {
        merge::merge_into(&mut self.anchors, imported, deduplicate)
    }

    pub fn count(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn all(&self) -> &[TimelineAnchor] {
        &self.anchors
    }

    pub fn to_snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            anchors: self.anchors.clone(),
        }
    }

    /// JSON form of `to_snapshot`: `{"anchors": [...]}`
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({ "anchors": self.anchors })
    }
}

// ============================================================================
// TESTS
// ============================================================================

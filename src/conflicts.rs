// ⚔️ Conflict Detection - Opposition rules as data
//
// Screens proposed narrative ideas against invariant canon statements.
// Each rule pairs a canon-side pattern family (negations: "cannot", "extinct",
// "indestructible", ...) with the idea-side family that would violate it
// ("resurrect", "appears", "destroys", ...).
//
// Matching is case-insensitive keyword matching at word starts, not parsing.
// For every (canon, idea) pair the first matching rule wins, so the rule table
// order is part of the contract: identical inputs always give identical reports.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// SEVERITY & RESOLUTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictSeverity {
    /// Violates an absolute or foundational negation (non-existence, extinction, impossibility)
    Critical,

    /// Violates a soft constraint (frequency, degree, historical state)
    Major,
}

impl ConflictSeverity {
    /// REJECT for critical conflicts, REVISE for major ones
    pub fn default_resolution(&self) -> ConflictResolution {
        match self {
            ConflictSeverity::Critical => ConflictResolution::Reject,
            ConflictSeverity::Major => ConflictResolution::Revise,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictResolution {
    Reject,
    Revise,
}

// ============================================================================
// CANON CONFLICT
// ============================================================================

/// One canon statement / seed idea pair found to be in opposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonConflict {
    pub canon_statement: String,
    pub seed_idea: String,
    pub severity: ConflictSeverity,
    pub recommended_resolution: ConflictResolution,
    pub fix_suggestion: String,
    pub canon_source: String,

    /// Id of the rule that fired
    pub rule_id: String,
}

// ============================================================================
// CONFLICT REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// Detection order: canon outer loop, idea inner loop
    pub conflicts: Vec<CanonConflict>,
    pub canon_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub total_conflicts: usize,
    pub critical_count: usize,
    pub major_count: usize,
    pub reject_count: usize,
    pub canon_source: String,
}

impl ConflictReport {
    pub fn new(canon_source: impl Into<String>) -> Self {
        ConflictReport {
            conflicts: Vec::new(),
            canon_source: canon_source.into(),
        }
    }

    pub fn has_critical_conflicts(&self) -> bool {
        self.conflicts
            .iter()
            .any(|c| c.severity == ConflictSeverity::Critical)
    }

    pub fn by_severity(&self, severity: ConflictSeverity) -> Vec<&CanonConflict> {
        self.conflicts
            .iter()
            .filter(|c| c.severity == severity)
            .collect()
    }

    pub fn critical(&self) -> Vec<&CanonConflict> {
        self.by_severity(ConflictSeverity::Critical)
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn to_summary(&self) -> ConflictSummary {
        ConflictSummary {
            total_conflicts: self.conflicts.len(),
            critical_count: self.critical().len(),
            major_count: self.by_severity(ConflictSeverity::Major).len(),
            reject_count: self
                .conflicts
                .iter()
                .filter(|c| c.recommended_resolution == ConflictResolution::Reject)
                .count(),
            canon_source: self.canon_source.clone(),
        }
    }
}

// ============================================================================
// OPPOSITION RULE
// ============================================================================

/// How a rule recognizes the violating idea
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "keywords", rename_all = "snake_case")]
pub enum IdeaMatcher {
    /// Idea contains any of these keywords (at a word start)
    Keywords(Vec<String>),

    /// Idea performs the action the canon negates: "X cannot <verb>"
    NegatedAction,

    /// Idea features the canon statement's subject at all
    Subject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OppositionRule {
    /// Rule ID for tracking
    pub id: String,

    /// Canon statement must contain one of these
    pub canon_patterns: Vec<String>,

    /// ...and, when non-empty, one of these as well
    #[serde(default)]
    pub canon_requires: Vec<String>,

    pub idea: IdeaMatcher,

    /// Idea must mention the subject the canon statement is about
    #[serde(default)]
    pub shared_subject: bool,

    pub severity: ConflictSeverity,

    /// Defaults to the severity's resolution
    #[serde(default)]
    pub resolution: Option<ConflictResolution>,

    /// Offending idea element; empty means "use the matched word"
    #[serde(default)]
    pub element: String,

    /// What canon establishes, e.g. "death is permanent"
    pub constraint: String,

    /// Placeholders: {element} {constraint} {canon} {idea}
    #[serde(default = "default_fix_template")]
    pub fix_template: String,

    /// Priority (higher = tested first, ties keep table order)
    #[serde(default)]
    pub priority: i32,
}

fn default_fix_template() -> String {
    "Remove or rework the {element}: canon establishes that {constraint}".to_string()
}

/// Words that never identify what a canon statement is about
const STOPWORDS: &[&str] = &[
    "the", "and", "are", "was", "were", "this", "that", "these", "those", "with", "from", "into",
    "their", "its", "has", "have", "had", "been", "for", "all", "any", "who", "which", "world",
    "universe", "realm", "age", "now", "once", "our", "there", "here", "not", "but",
];

/// Canon phrases that introduce a negated action
const NEGATION_MARKERS: &[&str] = &["cannot ", "can not ", "can't ", "can never ", "could never ", "must never "];

/// Filler words skipped between the negation and its verb
const NEGATION_FILLERS: &[&str] = &["be", "ever", "truly", "really"];

impl OppositionRule {
    /// Test one (canon, idea) pair. Both inputs must already be lowercased.
    ///
    /// Returns the offending idea element on a match.
    pub fn matches(&self, canon: &str, idea: &str) -> Option<String> {
        let (pattern_pos, _) = first_match(canon, &self.canon_patterns)?;
        if !self.canon_requires.is_empty() && first_match(canon, &self.canon_requires).is_none() {
            return None;
        }

        let subject = subject_terms(&canon[..pattern_pos], canon);
        if self.shared_subject && !shares_subject(&subject, idea) {
            return None;
        }

        match &self.idea {
            IdeaMatcher::Keywords(keywords) => {
                let (_, keyword) = first_match(idea, keywords)?;
                Some(keyword.to_string())
            }
            IdeaMatcher::NegatedAction => {
                let verb = negated_verb(canon)?;
                let stem = stem(&verb);
                if words(idea).any(|w| w.starts_with(stem)) {
                    Some(verb)
                } else {
                    None
                }
            }
            IdeaMatcher::Subject => words(idea)
                .find(|w| subject.iter().any(|term| mentions(term, w)))
                .map(|w| w.to_string()),
        }
    }

    pub fn resolution(&self) -> ConflictResolution {
        self.resolution
            .unwrap_or_else(|| self.severity.default_resolution())
    }

    /// Render the fix suggestion for a matched pair
    pub fn fix_suggestion(&self, matched: &str, canon: &str, idea: &str) -> String {
        let element = if self.element.is_empty() {
            matched
        } else {
            self.element.as_str()
        };

        self.fix_template
            .replace("{element}", element)
            .replace("{constraint}", &self.constraint)
            .replace("{canon}", canon)
            .replace("{idea}", idea)
    }
}

// ============================================================================
// MATCHING HELPERS
// ============================================================================

/// Position of `pattern` in `text` where it begins a word
fn find_at_word_start(text: &str, pattern: &str) -> Option<usize> {
    if pattern.is_empty() {
        return None;
    }
    text.match_indices(pattern)
        .map(|(pos, _)| pos)
        .find(|&pos| {
            text[..pos]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric())
        })
}

/// First pattern (in list order) found in `text`, with its position
fn first_match<'a>(text: &str, patterns: &'a [String]) -> Option<(usize, &'a str)> {
    patterns
        .iter()
        .find_map(|p| find_at_word_start(text, &p.to_lowercase()).map(|pos| (pos, p.as_str())))
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
}

/// Content word folded to its singular: "dragons" -> "dragon", "elves" -> "elf"
fn subject_term(word: &str) -> Option<String> {
    if word.len() < 3 || STOPWORDS.contains(&word) {
        return None;
    }
    Some(singular(word))
}

fn singular(word: &str) -> String {
    if let Some(base) = word.strip_suffix("ves") {
        if base.len() >= 2 && base.ends_with('l') {
            return format!("{}f", base);
        }
    }
    if let Some(base) = word.strip_suffix("ies") {
        if base.len() >= 2 {
            return format!("{}y", base);
        }
    }
    for suffix in ["sses", "ches", "shes", "xes"] {
        if let Some(base) = word.strip_suffix(suffix) {
            return format!("{}{}", base, &suffix[..suffix.len() - 2]);
        }
    }
    match word.strip_suffix('s') {
        Some(base) if base.len() >= 3 && !base.ends_with('s') => base.to_string(),
        _ => word.to_string(),
    }
}

/// What the canon statement is about: content words before the matched
/// pattern, or the whole statement when that prefix has none
fn subject_terms(prefix: &str, canon: &str) -> Vec<String> {
    let subject: Vec<String> = words(prefix).filter_map(subject_term).collect();
    if subject.is_empty() {
        return words(canon).filter_map(subject_term).collect();
    }
    subject
}

fn shares_subject(subject: &[String], idea: &str) -> bool {
    words(idea)
        .filter_map(subject_term)
        .any(|term| subject.contains(&term))
}

/// Looser than `shares_subject`: also accepts derived forms,
/// "teleports" for "teleportation" and "flies" for "flight"
fn mentions(term: &str, word: &str) -> bool {
    let folded = match subject_term(word) {
        Some(folded) => folded,
        None => return false,
    };
    if folded == term || term.starts_with(folded.as_str()) || folded.starts_with(term) {
        return true;
    }
    let stem = stem(word);
    stem.len() >= 3 && term.starts_with(stem)
}

/// Verb following a negation marker: "cannot be restored" -> "restored"
fn negated_verb(canon: &str) -> Option<String> {
    NEGATION_MARKERS.iter().find_map(|marker| {
        let pos = find_at_word_start(canon, marker)?;
        words(&canon[pos + marker.len()..])
            .find(|w| !NEGATION_FILLERS.contains(w))
            .filter(|w| w.len() >= 3)
            .map(|w| w.to_string())
    })
}

/// Strip common inflections: "restored" -> "restor", "flying" -> "fly"
fn stem(verb: &str) -> &str {
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(stem) = verb.strip_suffix(suffix) {
            if stem.len() >= 3 {
                return stem;
            }
        }
    }
    verb
}

// ============================================================================
// DEFAULT RULE TABLE
// ============================================================================

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn keywords(items: &[&str]) -> IdeaMatcher {
    IdeaMatcher::Keywords(list(items))
}

fn rule(
    id: &str,
    canon_patterns: &[&str],
    idea: IdeaMatcher,
    severity: ConflictSeverity,
    element: &str,
    constraint: &str,
) -> OppositionRule {
    OppositionRule {
        id: id.to_string(),
        canon_patterns: list(canon_patterns),
        canon_requires: Vec::new(),
        idea,
        shared_subject: false,
        severity,
        resolution: None,
        element: element.to_string(),
        constraint: constraint.to_string(),
        fix_template: default_fix_template(),
        priority: 0,
    }
}

/// Built-in opposition rules, in evaluation order.
///
/// Specific rules come first; the generic "cannot <verb>" rule is last.
pub fn default_rules() -> Vec<OppositionRule> {
    use ConflictSeverity::{Critical, Major};

    vec![
        OppositionRule {
            canon_requires: list(&["magic"]),
            ..rule(
                "magic-nonexistence",
                &["does not exist", "doesn't exist", "do not exist", "is not real", "never existed", "no magic"],
                keywords(&["magic", "spell", "sorcer", "wizard", "witch", "enchant", "casts", "incantation", "conjur"]),
                Critical,
                "use of magic",
                "magic does not exist",
            )
        },
        OppositionRule {
            canon_requires: list(&["time travel", "time-travel", "travel through time", "travel in time"]),
            ..rule(
                "time-travel-impossible",
                &["impossible", "does not exist", "doesn't exist", "cannot", "is forbidden", "never"],
                keywords(&[
                    "back in time", "travels in time", "travel in time", "time travel", "time-travel",
                    "through time", "into the past", "to the past", "from the future",
                ]),
                Critical,
                "time travel",
                "time travel is impossible",
            )
        },
        rule(
            "death-permanent",
            &[
                "cannot resurrect", "can't resurrect", "cannot be resurrected", "cannot revive",
                "cannot be revived", "cannot raise the dead", "death is permanent", "death is final",
                "dead stay dead", "dead cannot return", "no resurrection",
            ],
            keywords(&[
                "resurrect", "revive", "raise the dead", "raises the dead", "raised from the dead",
                "brought back to life", "brings back to life", "back from the dead",
                "returns from the dead", "reanimat",
            ]),
            Critical,
            "resurrection",
            "death is permanent",
        ),
        OppositionRule {
            shared_subject: true,
            ..rule(
                "extinction",
                &["extinct", "died out", "wiped out", "no longer exist", "are gone forever", "is gone forever"],
                keywords(&[
                    "appear", "alive", "surviv", "live", "hatch", "return", "sighted", "encounter",
                    "discover", "meet", "ride", "tame", "emerge", "awaken",
                ]),
                Critical,
                "reappearance",
                "they are extinct",
            )
        },
        OppositionRule {
            shared_subject: true,
            ..rule(
                "indestructible",
                &["indestructible", "cannot be destroyed", "can't be destroyed", "unbreakable", "cannot be broken"],
                keywords(&["destroy", "destruction", "shatter", "break", "broke", "smash", "crush", "obliterat", "melt"]),
                Critical,
                "destruction",
                "it is indestructible",
            )
        },
        OppositionRule {
            shared_subject: true,
            ..rule(
                "irrecoverable-loss",
                &[
                    "cannot be restored", "can never be restored", "cannot be rebuilt", "can never return",
                    "is lost forever", "lost forever", "cannot be undone",
                ],
                keywords(&["restor", "rebuild", "rebuilt", "reunit", "reform", "re-establish", "reestablish", "return", "undo"]),
                Critical,
                "restoration",
                "the loss is permanent",
            )
        },
        OppositionRule {
            shared_subject: true,
            ..rule(
                "historical-destruction",
                &[
                    "was destroyed", "were destroyed", "has been destroyed", "have been destroyed",
                    "was shattered", "was broken", "were broken", "is broken", "lies in ruins",
                    "collapsed", "fell apart", "has fallen",
                ],
                keywords(&["repair", "restor", "rebuild", "rebuilt", "reforg", "mend", "fix", "remake", "reassembl", "intact", "unbroken"]),
                Major,
                "repair",
                "it was destroyed and remains so",
            )
        },
        OppositionRule {
            shared_subject: true,
            ..rule(
                "rarity",
                &[
                    "for decades", "for centuries", "for years", "rarely", "seldom", "once a century",
                    "once every", "hibernat", "slumber", "only once",
                ],
                keywords(&[
                    "every day", "every week", "every night", "every month", "daily", "weekly", "nightly",
                    "constantly", "frequently", "often", "all the time", "always", "everywhere", "regularly",
                ]),
                Major,
                "frequency",
                "this happens only rarely",
            )
        },
        OppositionRule {
            shared_subject: true,
            ..rule(
                "limited-power",
                &[
                    "has limit", "have limit", "is limited", "are limited", "has a cost", "comes at a cost",
                    "has a price", "exacts a price",
                ],
                keywords(&["unlimited", "limitless", "infinite", "without limit", "without cost", "no cost", "effortless", "at will", "endless"]),
                Major,
                "unlimited power",
                "it has limits",
            )
        },
        OppositionRule {
            fix_template: "Remove or rework the {element}: canon states \"{canon}\"".to_string(),
            ..rule(
                "nonexistence",
                &[
                    "does not exist", "do not exist", "doesn't exist", "don't exist", "never existed",
                    "is impossible", "are impossible",
                ],
                IdeaMatcher::Subject,
                Critical,
                "",
                "it does not exist",
            )
        },
        OppositionRule {
            fix_template: "Rework the idea so nothing is able to {element}: canon states \"{canon}\"".to_string(),
            ..rule(
                "negated-action",
                NEGATION_MARKERS,
                IdeaMatcher::NegatedAction,
                Critical,
                "",
                "this is impossible",
            )
        },
    ]
}

// ============================================================================
// CONFLICT DETECTOR
// ============================================================================

pub struct ConflictDetector {
    rules: Vec<OppositionRule>,
}

impl ConflictDetector {
    /// Create a detector with the built-in rule table
    pub fn new() -> Self {
        ConflictDetector::from_rules(default_rules())
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read opposition rules file: {:?}", path.as_ref()))?;

        let rules: Vec<OppositionRule> =
            serde_json::from_str(&content).context("Failed to parse opposition rules JSON")?;

        Ok(ConflictDetector::from_rules(rules))
    }

    /// Create detector from a list of rules (stable sort: ties keep list order)
    pub fn from_rules(mut rules: Vec<OppositionRule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        ConflictDetector { rules }
    }

    pub fn add_rule(&mut self, rule: OppositionRule) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    pub fn rules(&self) -> &[OppositionRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// First rule matching a (canon, idea) pair, with the matched idea element
    fn first_rule(&self, canon: &str, idea: &str) -> Option<(&OppositionRule, String)> {
        let canon = canon.to_lowercase();
        let idea = idea.to_lowercase();
        self.rules
            .iter()
            .find_map(|rule| rule.matches(&canon, &idea).map(|m| (rule, m)))
    }

    /// Screen every seed idea against every invariant canon statement.
    ///
    /// Total: empty inputs give an empty report. At most one conflict per pair.
    pub fn detect_conflicts<S, T>(&self, invariant_canon: &[S], seed_ideas: &[T], canon_source: &str) -> ConflictReport
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut report = ConflictReport::new(canon_source);

        for canon in invariant_canon {
            let canon = canon.as_ref();
            for idea in seed_ideas {
                let idea = idea.as_ref();
                let (rule, matched) = match self.first_rule(canon, idea) {
                    Some(hit) => hit,
                    None => continue,
                };

                debug!(
                    "Conflict [{}] {:?}: \"{}\" vs \"{}\"",
                    rule.id, rule.severity, canon, idea
                );
                report.conflicts.push(CanonConflict {
                    canon_statement: canon.to_string(),
                    seed_idea: idea.to_string(),
                    severity: rule.severity,
                    recommended_resolution: rule.resolution(),
                    fix_suggestion: rule.fix_suggestion(&matched, canon, idea),
                    canon_source: canon_source.to_string(),
                    rule_id: rule.id.clone(),
                });
            }
        }

        let summary = report.to_summary();
        info!(
            "Screened {} ideas against {} canon statements from {}: {} conflicts ({} critical)",
            seed_ideas.len(),
            invariant_canon.len(),
            canon_source,
            summary.total_conflicts,
            summary.critical_count
        );
        report
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(canon: &[&str], ideas: &[&str]) -> ConflictReport {
        ConflictDetector::new().detect_conflicts(canon, ideas, "test")
    }

    #[test]
    fn test_conflict_creation() {
        let conflict = CanonConflict {
            canon_statement: "Dragons are extinct".to_string(),
            seed_idea: "A dragon appears in the story".to_string(),
            severity: ConflictSeverity::Critical,
            recommended_resolution: ConflictResolution::Reject,
            fix_suggestion: "Remove dragon appearance".to_string(),
            canon_source: "Dragon's Quest I".to_string(),
            rule_id: "extinction".to_string(),
        };

        assert_eq!(conflict.severity.default_resolution(), conflict.recommended_resolution);
        assert!(conflict.canon_statement.contains("extinct"));
    }

    #[test]
    fn test_no_conflicts() {
        let report = detect(
            &["Dragons sleep for decades between hunts", "Magic cannot resurrect the dead"],
            &["Hero trains to become a dragon rider", "Villain seeks forbidden knowledge"],
        );

        assert!(report.is_empty());
        assert!(!report.has_critical_conflicts());
    }

    #[test]
    fn test_resurrection_conflict() {
        let report = detect(
            &["Magic cannot resurrect the dead"],
            &["The protagonist resurrects their dead mentor using ancient magic"],
        );

        assert_eq!(report.len(), 1);
        let conflict = &report.conflicts[0];
        assert!(conflict.seed_idea.to_lowercase().contains("resurrect"));
        assert!(conflict.canon_statement.to_lowercase().contains("dead"));
        assert_eq!(conflict.severity, ConflictSeverity::Critical);
        assert_eq!(
            conflict.fix_suggestion,
            "Remove or rework the resurrection: canon establishes that death is permanent"
        );
    }

    #[test]
    fn test_destruction_conflict() {
        let report = detect(
            &["Ancient dragon artifacts are indestructible"],
            &["Hero destroys an ancient dragon artifact to save the kingdom"],
        );

        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts[0].rule_id, "indestructible");
    }

    #[test]
    fn test_repair_conflict_is_major() {
        let report = detect(
            &["The Great Seal was destroyed in the ancient war"],
            &["Characters repair the Great Seal to imprison the demon"],
        );

        assert_eq!(report.len(), 1);
        let conflict = &report.conflicts[0];
        assert!(conflict.seed_idea.contains("repair"));
        assert_eq!(conflict.severity, ConflictSeverity::Major);
        assert_eq!(conflict.recommended_resolution, ConflictResolution::Revise);
    }

    #[test]
    fn test_repair_of_unrelated_subject_is_not_a_conflict() {
        let report = detect(
            &["The Great Seal was destroyed in the ancient war"],
            &["The blacksmith repairs a plough"],
        );
        assert!(report.is_empty());
    }

    #[test]
    fn test_multiple_conflicts_one_per_pair() {
        let report = detect(
            &[
                "Magic cannot resurrect the dead",
                "Dragons are extinct in this age",
                "The ancient empire collapsed and cannot be restored",
            ],
            &[
                "Hero resurrects their mentor",
                "A dragon appears in the mountains",
                "Protagonist restores the ancient empire",
            ],
        );

        assert_eq!(report.len(), 3);
        let pairs: Vec<(&str, &str)> = report
            .conflicts
            .iter()
            .map(|c| (c.canon_statement.as_str(), c.seed_idea.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Magic cannot resurrect the dead", "Hero resurrects their mentor"),
                ("Dragons are extinct in this age", "A dragon appears in the mountains"),
                (
                    "The ancient empire collapsed and cannot be restored",
                    "Protagonist restores the ancient empire"
                ),
            ]
        );
    }

    #[test]
    fn test_time_travel_rejected() {
        let report = detect(
            &["Time travel does not exist in this universe"],
            &["Hero travels back in time to prevent the disaster"],
        );

        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts[0].severity, ConflictSeverity::Critical);
        assert_eq!(report.conflicts[0].recommended_resolution, ConflictResolution::Reject);
    }

    #[test]
    fn test_frequency_conflict_suggests_revise() {
        let report = detect(
            &["Dragons hibernate for decades between hunts"],
            &["Dragons appear every week in the story"],
        );

        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts[0].severity, ConflictSeverity::Major);
        assert_eq!(report.conflicts[0].recommended_resolution, ConflictResolution::Revise);
    }

    #[test]
    fn test_case_insensitive() {
        let report = detect(&["MAGIC CANNOT RESURRECT THE DEAD"], &["hero resurrects their mentor using magic"]);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_magic_nonexistence_is_critical() {
        let report = detect(&["Magic does not exist in this world"], &["Hero casts a fireball spell"]);
        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts[0].severity, ConflictSeverity::Critical);

        let report = detect(&["Magic does not exist"], &["Hero uses magic"]);
        assert!(report.has_critical_conflicts());
    }

    #[test]
    fn test_negated_action_fallback() {
        let report = detect(
            &["Dragons cannot fly in this world due to high gravity"],
            &["Hero rides a flying dragon across the continent"],
        );

        assert_eq!(report.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.rule_id, "negated-action");
        assert!(!conflict.fix_suggestion.is_empty());
        assert!(conflict.fix_suggestion.contains("fly"));
    }

    #[test]
    fn test_summary() {
        let report = ConflictDetector::new().detect_conflicts(
            &["Dragons are extinct", "Magic cannot resurrect the dead", "Time travel is impossible"],
            &["A dragon appears", "Hero resurrects mentor", "Villain travels back in time"],
            "Dragon's Quest I",
        );

        assert_eq!(report.len(), 3);
        let summary = report.to_summary();
        assert_eq!(summary.total_conflicts, 3);
        assert_eq!(summary.critical_count + summary.major_count, 3);
        assert_eq!(summary.canon_source, "Dragon's Quest I");
        assert!(report.conflicts.iter().all(|c| c.canon_source == "Dragon's Quest I"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["canon_source"], "Dragon's Quest I");
        assert_eq!(json["total_conflicts"], 3);
    }

    #[test]
    fn test_filter_by_severity() {
        let report = detect(
            &["Dragons are extinct", "Ancient empire collapsed", "Magic has limitations"],
            &["Dragons appear everywhere", "Empire is restored", "Character uses slightly different magic"],
        );

        assert_eq!(report.critical().len(), 1);
        assert_eq!(report.by_severity(ConflictSeverity::Major).len(), 1);
        assert_eq!(report.to_summary().reject_count, 1);
    }

    #[test]
    fn test_empty_inputs() {
        let none: [&str; 0] = [];
        let detector = ConflictDetector::new();

        assert!(detector.detect_conflicts(&none, &none, "test").is_empty());
        assert!(detector
            .detect_conflicts(&["Dragons are extinct", "Magic has limits"], &none, "test")
            .is_empty());
        assert!(detector
            .detect_conflicts(&none, &["Hero does something", "Villain plots something"], "test")
            .is_empty());
    }

    #[test]
    fn test_deterministic_across_runs() {
        let canon = vec!["Dragons are extinct".to_string(), "Magic cannot resurrect the dead".to_string()];
        let ideas = vec!["A dragon hatches".to_string(), "Necromancer revives the dead king".to_string()];

        let first = ConflictDetector::new().detect_conflicts(&canon, &ideas, "run");
        let second = ConflictDetector::new().detect_conflicts(&canon, &ideas, "run");
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_word_start_matching() {
        // "ride" must not fire inside "pride"
        let report = detect(&["Dragons are extinct"], &["The dragon banner is a symbol of pride"]);
        assert!(report.is_empty());
    }

    #[test]
    fn test_nonexistent_subject_appears() {
        let report = detect(&["Elves do not exist in this world"], &["An elf appears at the city gate"]);
        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts[0].rule_id, "nonexistence");
        assert_eq!(report.conflicts[0].severity, ConflictSeverity::Critical);
        assert_eq!(report.conflicts[0].recommended_resolution, ConflictResolution::Reject);

        let report = detect(&["Gods do not exist"], &["A god appears to the hero"]);
        assert_eq!(report.len(), 1);

        let report = detect(&["Teleportation does not exist"], &["The mage teleports across the sea"]);
        assert_eq!(report.len(), 1);
        assert!(report.conflicts[0].fix_suggestion.contains("teleports"));
    }

    #[test]
    fn test_impossible_action_performed() {
        let report = detect(&["Flight is impossible"], &["The hero flies over the wall"]);
        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts[0].rule_id, "nonexistence");
        assert!(report.has_critical_conflicts());
    }

    #[test]
    fn test_nonexistence_ignores_other_subjects() {
        let report = detect(
            &["Elves do not exist in this world", "Flight is impossible"],
            &["The dwarves forge a sword", "The hero walks to the capital"],
        );
        assert!(report.is_empty());
    }

    #[test]
    fn test_plural_folding() {
        assert_eq!(singular("elves"), "elf");
        assert_eq!(singular("flies"), "fly");
        assert_eq!(singular("dragons"), "dragon");
        assert_eq!(singular("witches"), "witch");
        assert_eq!(singular("glass"), "glass");
    }

    #[test]
    fn test_custom_rule_priority() {
        let mut detector = ConflictDetector::new();
        let before = detector.rule_count();

        detector.add_rule(OppositionRule {
            priority: 10,
            resolution: Some(ConflictResolution::Revise),
            ..rule(
                "no-gunpowder",
                &["no gunpowder"],
                keywords(&["cannon", "musket", "gun"]),
                ConflictSeverity::Critical,
                "firearm",
                "gunpowder was never invented",
            )
        });

        assert_eq!(detector.rule_count(), before + 1);
        assert_eq!(detector.rules()[0].id, "no-gunpowder");

        let report = detector.detect_conflicts(&["There is no gunpowder"], &["Pirates fire a cannon"], "test");
        assert_eq!(report.len(), 1);
        assert_eq!(report.conflicts[0].recommended_resolution, ConflictResolution::Revise);
        assert_eq!(
            report.conflicts[0].fix_suggestion,
            "Remove or rework the firearm: canon establishes that gunpowder was never invented"
        );
    }

    #[test]
    fn test_rules_round_trip_through_json_file() {
        let path = std::env::temp_dir().join(format!("opposition-rules-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, serde_json::to_string(&default_rules()).unwrap()).unwrap();

        let detector = ConflictDetector::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(detector.rule_count(), default_rules().len());
        let report = detector.detect_conflicts(&["Dragons are extinct"], &["A dragon appears"], "file");
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_from_file_missing() {
        let err = ConflictDetector::from_file("/nonexistent/rules.json").err().unwrap();
        assert!(err.to_string().contains("Failed to read opposition rules file"));
    }
}

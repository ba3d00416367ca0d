//! Report records and run summary (stable v1)
//!
//! The CSV row shapes and the JSON run report are STABLE and VERSIONED.
//! Breaking changes require a new version.

use crate::identity::ComparisonKey;
use crate::outcome::{ComparisonOutcome, Direction, ObjectDiff};
use serde::{Deserialize, Serialize};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The four output streams of a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    OnlyInLeft,
    OnlyInRight,
    Mismatches,
    Errors,
}

impl StreamKind {
    pub const ALL: [StreamKind; 4] = [
        StreamKind::OnlyInLeft,
        StreamKind::OnlyInRight,
        StreamKind::Mismatches,
        StreamKind::Errors,
    ];

    /// Header row of the stream's tabular artifact
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Self::OnlyInLeft | Self::OnlyInRight => &["object_name", "description"],
            Self::Mismatches => &["object_name", "direction", "mismatch_rows_count", "query"],
            Self::Errors => &["object_name", "direction", "query", "error"],
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnlyInLeft => write!(f, "only-in-left"),
            Self::OnlyInRight => write!(f, "only-in-right"),
            Self::Mismatches => write!(f, "mismatches"),
            Self::Errors => write!(f, "errors"),
        }
    }
}

/// Row of the only-in-left / only-in-right artifacts
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogOnlyRecord {
    pub object_name: String,
    pub description: String,
}

impl CatalogOnlyRecord {
    pub fn new(key: &ComparisonKey, container: &str) -> Self {
        Self {
            object_name: key.to_string(),
            description: format!("present only in {}", container),
        }
    }
}

/// Row of the mismatches artifact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MismatchRecord {
    pub object_name: String,
    pub direction: Direction,
    pub mismatch_rows_count: u64,
    pub query: String,
}

/// Row of the errors artifact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub object_name: String,
    pub direction: Direction,
    pub query: String,
    pub error: String,
}

/// A single append-only row destined for one of the four streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportRecord {
    CatalogOnly(CatalogOnlyRecord),
    Mismatch(MismatchRecord),
    Error(ErrorRecord),
}

impl ReportRecord {
    /// Convert a comparison outcome into a record; `Matched` produces none
    pub fn from_outcome(key: &ComparisonKey, outcome: &ComparisonOutcome) -> Option<Self> {
        match outcome {
            ComparisonOutcome::Matched => None,
            ComparisonOutcome::Mismatched { direction, row_count, query } => {
                Some(Self::Mismatch(MismatchRecord {
                    object_name: key.to_string(),
                    direction: *direction,
                    mismatch_rows_count: *row_count,
                    query: query.clone(),
                }))
            }
            ComparisonOutcome::Errored { direction, query, error } => {
                Some(Self::Error(ErrorRecord {
                    object_name: key.to_string(),
                    direction: *direction,
                    query: query.clone(),
                    error: error.clone(),
                }))
            }
        }
    }

    pub fn object_name(&self) -> &str {
        match self {
            Self::CatalogOnly(r) => &r.object_name,
            Self::Mismatch(r) => &r.object_name,
            Self::Error(r) => &r.object_name,
        }
    }

    /// Field values in header order
    pub fn fields(&self) -> Vec<String> {
        match self {
            Self::CatalogOnly(r) => vec![r.object_name.clone(), r.description.clone()],
            Self::Mismatch(r) => vec![
                r.object_name.clone(),
                r.direction.to_string(),
                r.mismatch_rows_count.to_string(),
                r.query.clone(),
            ],
            Self::Error(r) => vec![
                r.object_name.clone(),
                r.direction.to_string(),
                r.query.clone(),
                r.error.clone(),
            ],
        }
    }
}

/// Terminal counts of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Left container name
    pub left: String,

    /// Right container name
    pub right: String,

    pub only_left: usize,
    pub only_right: usize,
    pub common: usize,

    /// Objects whose rows are identical on both sides
    pub matched: usize,

    /// Objects with at least one nonzero directional count
    pub mismatched: usize,

    /// Objects with at least one failed directional query
    pub errored: usize,

    /// Common objects never compared because the run was cancelled
    pub skipped: usize,

    /// Rows written to the mismatches stream
    pub mismatch_records: usize,

    /// Rows written to the errors stream
    pub error_records: usize,

    /// Whether the run stopped early on cancellation or deadline
    pub cancelled: bool,

    /// Timestamp (ISO 8601)
    pub started_at: String,

    /// Timestamp (ISO 8601)
    pub finished_at: String,
}

impl RunSummary {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            started_at: chrono::Utc::now().to_rfc3339(),
            ..Self::default()
        }
    }

    /// Fold one object's outcomes into the counts
    pub fn record(&mut self, diff: &ObjectDiff) {
        if diff.is_matched() {
            self.matched += 1;
            return;
        }
        if diff.has_mismatches() {
            self.mismatched += 1;
        }
        if diff.has_errors() {
            self.errored += 1;
        }
        for outcome in &diff.outcomes {
            match outcome {
                ComparisonOutcome::Mismatched { .. } => self.mismatch_records += 1,
                ComparisonOutcome::Errored { .. } => self.error_records += 1,
                ComparisonOutcome::Matched => {}
            }
        }
    }

    /// Number of common objects that were compared
    pub fn compared(&self) -> usize {
        self.common - self.skipped
    }

    /// Check if the two containers reconcile completely
    pub fn is_clean(&self) -> bool {
        self.only_left == 0
            && self.only_right == 0
            && self.mismatched == 0
            && self.errored == 0
            && !self.cancelled
    }

    pub fn finish(&mut self) {
        self.finished_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Run report (run_report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Schema version
    pub version: ReportVersion,

    /// Summary statistics
    pub summary: RunSummary,

    /// Artifact paths by stream
    #[serde(default)]
    pub artifacts: Vec<ArtifactEntry>,
}

/// Location of one stream's artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub stream: StreamKind,
    pub path: String,
    pub records: usize,
}

impl RunReport {
    pub fn new(summary: RunSummary, artifacts: Vec<ArtifactEntry>) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            summary,
            artifacts,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

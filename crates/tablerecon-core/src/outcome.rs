//! Per-object content comparison outcomes

use crate::identity::ComparisonKey;
use serde::{Deserialize, Serialize};

/// Which side's rows are subtracted from which
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Rows in the left object that are absent from the right object
    LeftMinusRight,

    /// Rows in the right object that are absent from the left object
    RightMinusLeft,
}

impl Direction {
    /// Both directions, in the order they are checked
    pub const BOTH: [Direction; 2] = [Direction::LeftMinusRight, Direction::RightMinusLeft];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftMinusRight => "left_minus_right",
            Self::RightMinusLeft => "right_minus_left",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one content check for an object present on both sides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    /// Both directional counts were zero
    Matched,

    /// One direction returned a nonzero count
    Mismatched {
        direction: Direction,
        row_count: u64,
        query: String,
    },

    /// A directional query could not be executed
    Errored {
        direction: Direction,
        query: String,
        error: String,
    },
}

impl ComparisonOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched)
    }

    pub fn is_mismatched(&self) -> bool {
        matches!(self, Self::Mismatched { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Self::Errored { .. })
    }
}

/// All outcomes produced for a single comparison key
///
/// Either exactly `[Matched]`, or one to two `Mismatched`/`Errored` outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDiff {
    pub key: ComparisonKey,
    pub outcomes: Vec<ComparisonOutcome>,
}

impl ObjectDiff {
    pub fn new(key: ComparisonKey, outcomes: Vec<ComparisonOutcome>) -> Self {
        Self { key, outcomes }
    }

    /// Object whose rows are identical on both sides
    pub fn matched(key: ComparisonKey) -> Self {
        Self::new(key, vec![ComparisonOutcome::Matched])
    }

    pub fn is_matched(&self) -> bool {
        self.outcomes.iter().all(ComparisonOutcome::is_matched)
    }

    pub fn has_mismatches(&self) -> bool {
        self.outcomes.iter().any(ComparisonOutcome::is_mismatched)
    }

    pub fn has_errors(&self) -> bool {
        self.outcomes.iter().any(ComparisonOutcome::is_errored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_strings() {
        assert_eq!(Direction::LeftMinusRight.to_string(), "left_minus_right");
        assert_eq!(Direction::RightMinusLeft.as_str(), "right_minus_left");
    }

    #[test]
    fn test_object_diff_classification() {
        let key = ComparisonKey::new("SALES", "ORDERS");

        let matched = ObjectDiff::matched(key.clone());
        assert!(matched.is_matched());
        assert!(!matched.has_mismatches());
        assert!(!matched.has_errors());

        let mixed = ObjectDiff::new(
            key,
            vec![
                ComparisonOutcome::Mismatched {
                    direction: Direction::LeftMinusRight,
                    row_count: 3,
                    query: "q1".to_string(),
                },
                ComparisonOutcome::Errored {
                    direction: Direction::RightMinusLeft,
                    query: "q2".to_string(),
                    error: "boom".to_string(),
                },
            ],
        );
        assert!(!mixed.is_matched());
        assert!(mixed.has_mismatches());
        assert!(mixed.has_errors());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ComparisonOutcome::Mismatched {
            direction: Direction::RightMinusLeft,
            row_count: 1,
            query: "select 1".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"outcome\":\"mismatched\""));
        assert!(json.contains("\"direction\":\"right_minus_left\""));
    }
}

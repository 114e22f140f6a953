//! Suggestion data types

use serde::{Deserialize, Serialize};

/// Area a suggestion is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Memory,
    Performance,
    Cache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionPriority {
    Low,
    Medium,
    High,
}

/// Action the engine can carry out on behalf of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remediation {
    /// Evict this percentage of current memory usage
    EvictPercentage(u8),
}

/// A human-readable observation, optionally actionable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub priority: SuggestionPriority,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_operations: Option<Vec<String>>,
}

impl Suggestion {
    pub fn new(
        kind: SuggestionKind,
        priority: SuggestionPriority,
        title: impl Into<String>,
        description: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            priority,
            title: title.into(),
            description: description.into(),
            recommendation: recommendation.into(),
            remediation: None,
            affected_operations: None,
        }
    }

    pub fn with_remediation(mut self, remediation: Remediation) -> Self {
        self.remediation = Some(remediation);
        self
    }

    pub fn with_affected_operations(mut self, operations: Vec<String>) -> Self {
        self.affected_operations = Some(operations);
        self
    }

    /// Whether the engine can act on this suggestion
    pub fn is_actionable(&self) -> bool {
        self.remediation.is_some()
    }
}

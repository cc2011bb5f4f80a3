//! AnalyticsRecord - decoded audit event
//!
//! One record per authorization decision written upstream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoded analytics event
///
/// Every field defaults when absent so partially populated producer
/// records still decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsRecord {
    /// Event time (unix seconds)
    pub timestamp: i64,

    /// Subject the decision was made for
    pub username: String,

    /// Request method
    pub method: String,

    /// Request path / resource
    pub path: String,

    /// Decision outcome (e.g. "allow", "deny")
    #[serde(alias = "effect")]
    pub outcome: String,

    /// Human-readable conclusion
    pub conclusion: String,

    /// Serialized original request
    pub request: String,

    /// Policy trace (sensitive)
    pub policies: String,

    /// Decision trace (sensitive)
    pub deciders: String,
}

impl AnalyticsRecord {
    /// Clear the policy and decision traces.
    ///
    /// Applying it more than once has no further effect.
    pub fn redact_details(&mut self) {
        self.policies.clear();
        self.deciders.clear();
    }

    /// Whether the sensitive traces are both empty
    pub fn is_redacted(&self) -> bool {
        self.policies.is_empty() && self.deciders.is_empty()
    }

    /// Read a filterable field
    pub fn field(&self, field: RecordField) -> &str {
        match field {
            RecordField::Username => &self.username,
            RecordField::Method => &self.method,
            RecordField::Path => &self.path,
            RecordField::Outcome => &self.outcome,
            RecordField::Conclusion => &self.conclusion,
        }
    }
}

/// Record fields usable in filter rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Username,
    Method,
    Path,
    #[serde(alias = "effect")]
    Outcome,
    Conclusion,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Username => "username",
            Self::Method => "method",
            Self::Path => "path",
            Self::Outcome => "outcome",
            Self::Conclusion => "conclusion",
        };
        f.write_str(name)
    }
}

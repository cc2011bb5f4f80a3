//! Per-sink record filters
//!
//! An ordered list of include/exclude rules evaluated against record fields.

use serde::{Deserialize, Serialize};

use crate::{AnalyticsRecord, RecordField};

/// Rule action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    /// Keep only records whose field value is listed
    Include,
    /// Drop records whose field value is listed
    Exclude,
}

/// Single filter rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// Field the rule inspects
    pub field: RecordField,

    /// Include or exclude
    pub action: FilterAction,

    /// Matched values (exact, case-sensitive)
    #[serde(default)]
    pub values: Vec<String>,
}

impl FilterRule {
    /// Include-rule shorthand
    pub fn include<I, S>(field: RecordField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field,
            action: FilterAction::Include,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Exclude-rule shorthand
    pub fn exclude<I, S>(field: RecordField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field,
            action: FilterAction::Exclude,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn is_active(&self) -> bool {
        !self.values.is_empty()
    }

    /// Whether this rule drops the record
    fn rejects(&self, record: &AnalyticsRecord) -> bool {
        if !self.is_active() {
            return false;
        }
        let value = record.field(self.field);
        let listed = self.values.iter().any(|v| v == value);
        match self.action {
            FilterAction::Include => !listed,
            FilterAction::Exclude => listed,
        }
    }
}

/// Filter attached to one sink
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Rules, evaluated in order
    #[serde(default)]
    pub rules: Vec<FilterRule>,
}

impl Filter {
    /// Build from rules
    pub fn new(rules: Vec<FilterRule>) -> Self {
        Self { rules }
    }

    /// Whether any rule with a non-empty value set is configured
    pub fn has_filter(&self) -> bool {
        self.rules.iter().any(FilterRule::is_active)
    }

    /// Returns true when the record must be excluded for this sink
    pub fn should_filter(&self, record: &AnalyticsRecord) -> bool {
        self.rules.iter().any(|rule| rule.rejects(record))
    }
}

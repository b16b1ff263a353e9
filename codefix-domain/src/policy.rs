//! Which categories may be applied one diagnostic at a time.

use codefix_types::Diagnostic;
use serde::{Deserialize, Serialize};

/// Category fallback-eligible when diagnostics carry `property` (equal to `value`, if set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRule {
    pub category: String,
    pub property: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FallbackRule {
    pub fn new(category: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            property: property.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// True when `diagnostic` carries this rule's marker.
    pub fn matches(&self, diagnostic: &Diagnostic) -> bool {
        match (diagnostic.property(&self.property), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }
}

/// Explicit classification of fallback-eligible categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FallbackPolicy {
    rules: Vec<FallbackRule>,
}

impl Default for FallbackPolicy {
    /// Private-field naming is the only category known to be safe by default.
    fn default() -> Self {
        Self::new(vec![
            FallbackRule::new("naming", "private_field").with_value("true"),
        ])
    }
}

impl FallbackPolicy {
    pub fn new(rules: Vec<FallbackRule>) -> Self {
        Self { rules }
    }

    /// No category is fallback-eligible.
    pub fn none() -> Self {
        Self::new(vec![])
    }

    pub fn with_rule(mut self, rule: FallbackRule) -> Self {
        self.rules.retain(|r| r.category != rule.category);
        self.rules.push(rule);
        self
    }

    pub fn rule_for(&self, category: &str) -> Option<&FallbackRule> {
        self.rules.iter().find(|r| r.category == category)
    }

    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }
}

//! User-defined classification rules.
//!
//! Rules live in a JSON object mapping a filename substring to a category
//! label:
//!
//! ```json
//! {
//!     "invoice": "Finance",
//!     "screenshot": "Images"
//! }
//! ```
//!
//! Match order decides precedence, so the object is read with its key order
//! preserved (`serde_json`'s `preserve_order` feature) and kept as a `Vec`.
//! The first rule whose pattern occurs in the lowercased file name wins.
//!
//! A missing or malformed file means "no custom rules", never an error.

use crate::file_category::DUPLICATES_LABEL;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// One (substring pattern, category label) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    /// Lowercased substring matched against the lowercased file name.
    pub pattern: String,
    /// Category label the file is assigned on a match.
    pub label: String,
}

impl ClassificationRule {
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into().to_lowercase(),
            label: label.into(),
        }
    }

    /// `lowercased_name` must already be lowercased.
    pub fn matches(&self, lowercased_name: &str) -> bool {
        lowercased_name.contains(&self.pattern)
    }
}

/// Ordered list of custom rules. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    /// Builds a rule set from (pattern, label) pairs, keeping their order and
    /// dropping unusable rules.
    pub fn from_pairs<I, P, L>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, L)>,
        P: Into<String>,
        L: Into<String>,
    {
        let rules = pairs
            .into_iter()
            .map(|(p, l)| ClassificationRule::new(p, l))
            .filter(is_usable)
            .collect();
        Self { rules }
    }

    /// Loads rules from `path`. Missing, unreadable or malformed files yield
    /// an empty set.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!("no custom rules at {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match Self::parse(&content) {
            Some(rules) => {
                debug!("loaded {} custom rules from {}", rules.len(), path.display());
                rules
            }
            None => {
                warn!(
                    "custom rules file {} is not a JSON object of strings, ignoring it",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Parses the JSON text of a rules file. Returns `None` when the document
    /// is not a JSON object. Entries whose value is not a string are skipped.
    pub fn parse(content: &str) -> Option<Self> {
        let object: Map<String, Value> = serde_json::from_str(content).ok()?;
        let pairs = object.into_iter().filter_map(|(pattern, value)| match value {
            Value::String(label) => Some((pattern, label)),
            other => {
                warn!("ignoring rule '{}': label {} is not a string", pattern, other);
                None
            }
        });
        Some(Self::from_pairs(pairs))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassificationRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule matching `file_name`, in stored order.
    pub fn first_match(&self, file_name: &str) -> Option<&ClassificationRule> {
        let lowered = file_name.to_lowercase();
        self.rules.iter().find(|rule| rule.matches(&lowered))
    }
}

/// A label becomes a folder name directly under the root, so it has to be a
/// single normal path component and must not collide with the quarantine.
fn is_usable(rule: &ClassificationRule) -> bool {
    if rule.pattern.is_empty() {
        warn!("ignoring rule with empty pattern (label '{}')", rule.label);
        return false;
    }
    let label = rule.label.as_str();
    let single_component = !label.is_empty()
        && label != "."
        && label != ".."
        && !label.contains(['/', '\\']);
    if !single_component {
        warn!(
            "ignoring rule '{}': label '{}' is not a plain folder name",
            rule.pattern, label
        );
        return false;
    }
    if label == DUPLICATES_LABEL {
        warn!(
            "ignoring rule '{}': '{}' is reserved for duplicates",
            rule.pattern, DUPLICATES_LABEL
        );
        return false;
    }
    true
}

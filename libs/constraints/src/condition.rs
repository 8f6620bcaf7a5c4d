//! Constraint and condition types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Key under which descriptions keep their placement constraint.
pub const PLACEMENT_CONSTRAINT_KEY: &str = "placement";

/// How strictly a condition is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Enforcement {
    /// Violation disqualifies the candidate.
    Hard,
    /// Only contributes to the ranking score.
    Soft,
}

/// Whether the tag must or must not be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Occurrence {
    /// Affinity.
    MustOccur,
    /// Anti-affinity.
    MustNotOccur,
}

/// A single tag condition.
///
/// `tag_value == None` means "a tag with this key, any value".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub tag_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_value: Option<String>,
    pub enforcement: Enforcement,
    pub occurrence: Occurrence,
}

impl Condition {
    pub fn for_tag(
        key: impl Into<String>,
        value: Option<&str>,
        enforcement: Enforcement,
        occurrence: Occurrence,
    ) -> Self {
        Self {
            tag_key: key.into(),
            tag_value: value.map(str::to_string),
            enforcement,
            occurrence,
        }
    }

    /// Hard affinity on `key=value`.
    pub fn require(key: impl Into<String>, value: &str) -> Self {
        Self::for_tag(key, Some(value), Enforcement::Hard, Occurrence::MustOccur)
    }

    /// Hard anti-affinity on `key=value`.
    pub fn exclude(key: impl Into<String>, value: &str) -> Self {
        Self::for_tag(key, Some(value), Enforcement::Hard, Occurrence::MustNotOccur)
    }

    /// Soft affinity on `key=value`.
    pub fn prefer(key: impl Into<String>, value: &str) -> Self {
        Self::for_tag(key, Some(value), Enforcement::Soft, Occurrence::MustOccur)
    }

    /// Soft anti-affinity on `key=value`.
    pub fn avoid(key: impl Into<String>, value: &str) -> Self {
        Self::for_tag(key, Some(value), Enforcement::Soft, Occurrence::MustNotOccur)
    }

    pub fn is_hard(&self) -> bool {
        matches!(self.enforcement, Enforcement::Hard)
    }

    /// Human readable `key=value` / `key=*`, used in error messages.
    pub fn describe(&self) -> String {
        let op = match self.occurrence {
            Occurrence::MustOccur => "=",
            Occurrence::MustNotOccur => "!=",
        };
        format!(
            "{}{}{}",
            self.tag_key,
            op,
            self.tag_value.as_deref().unwrap_or("*")
        )
    }
}

/// A named bag of conditions attached to a description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Constraint {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// A condition together with every tag link that satisfies its key/value.
///
/// An empty `matching` set means no such tag exists: a hard affinity can then
/// never be satisfied, a hard anti-affinity is always satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCondition<L> {
    pub condition: Condition,
    pub matching: BTreeSet<L>,
}

impl<L: Ord> ResolvedCondition<L> {
    pub fn new(condition: Condition, matching: BTreeSet<L>) -> Self {
        Self {
            condition,
            matching,
        }
    }

    /// True if any of `tags` is one of the matching tag links.
    pub fn present_in(&self, tags: &BTreeSet<L>) -> bool {
        // Iterate the smaller side.
        if self.matching.len() <= tags.len() {
            self.matching.iter().any(|l| tags.contains(l))
        } else {
            tags.iter().any(|l| self.matching.contains(l))
        }
    }
}

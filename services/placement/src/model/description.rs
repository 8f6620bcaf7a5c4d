use std::collections::BTreeMap;

use berth_constraints::{Condition, Constraint, PLACEMENT_CONSTRAINT_KEY};
use berth_id::DocumentLink;
use serde::{Deserialize, Serialize};

/// Anything carrying named constraint bags.
pub trait Constrained {
    fn constraints(&self) -> &BTreeMap<String, Constraint>;

    /// Conditions of the `placement` constraint, if any.
    fn placement_conditions(&self) -> &[Condition] {
        self.constraints()
            .get(PLACEMENT_CONSTRAINT_KEY)
            .map(|c| c.conditions.as_slice())
            .unwrap_or(&[])
    }
}

/// Template for the computes a reservation provisions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeDescription {
    pub name: String,
    #[serde(default)]
    pub tenant_links: Vec<String>,
    /// Memory per instance in bytes, 0 when unknown.
    #[serde(default)]
    pub memory_bytes: u64,
    #[serde(default)]
    pub constraints: BTreeMap<String, Constraint>,
    #[serde(default)]
    pub disk_description_links: Vec<DocumentLink>,
    #[serde(default)]
    pub network_description_links: Vec<DocumentLink>,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, String>,
}

impl ComputeDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_placement(mut self, conditions: Vec<Condition>) -> Self {
        self.constraints.insert(
            PLACEMENT_CONSTRAINT_KEY.to_string(),
            Constraint::new(conditions),
        );
        self
    }
}

impl Constrained for ComputeDescription {
    fn constraints(&self) -> &BTreeMap<String, Constraint> {
        &self.constraints
    }
}

/// Storage requirements of a compute description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDescription {
    pub name: String,
    #[serde(default)]
    pub constraints: BTreeMap<String, Constraint>,
}

impl DiskDescription {
    pub fn new(name: impl Into<String>, conditions: Vec<Condition>) -> Self {
        let mut constraints = BTreeMap::new();
        if !conditions.is_empty() {
            constraints.insert(
                PLACEMENT_CONSTRAINT_KEY.to_string(),
                Constraint::new(conditions),
            );
        }
        Self {
            name: name.into(),
            constraints,
        }
    }
}

impl Constrained for DiskDescription {
    fn constraints(&self) -> &BTreeMap<String, Constraint> {
        &self.constraints
    }
}

/// Network requirements of a compute description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescription {
    pub name: String,
    #[serde(default)]
    pub constraints: BTreeMap<String, Constraint>,
}

impl NetworkDescription {
    pub fn new(name: impl Into<String>, conditions: Vec<Condition>) -> Self {
        let mut constraints = BTreeMap::new();
        if !conditions.is_empty() {
            constraints.insert(
                PLACEMENT_CONSTRAINT_KEY.to_string(),
                Constraint::new(conditions),
            );
        }
        Self {
            name: name.into(),
            constraints,
        }
    }
}

impl Constrained for NetworkDescription {
    fn constraints(&self) -> &BTreeMap<String, Constraint> {
        &self.constraints
    }
}

//! Schema Records
//!
//! Per-type stat layouts and default traits for agents and relationships.

use serde::{Deserialize, Serialize};

/// Declares one stat installed on every entity of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSchema {
    pub name: String,
    /// Starting base value
    #[serde(default)]
    pub base: f64,
    /// Lower clamp; the engine default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper clamp; the engine default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Floor the computed value before rounding
    #[serde(default)]
    pub discrete: bool,
}

impl StatSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: 0.0,
            min: None,
            max: None,
            discrete: false,
        }
    }

    pub fn with_base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn discrete(mut self) -> Self {
        self.discrete = true;
        self
    }
}

/// Layout of one agent type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSchema {
    pub agent_type: String,
    #[serde(default)]
    pub stats: Vec<StatSchema>,
    /// Traits attached to every new agent of this type, in order
    #[serde(default)]
    pub default_traits: Vec<String>,
}

impl AgentSchema {
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            stats: Vec::new(),
            default_traits: Vec::new(),
        }
    }

    pub fn with_stat(mut self, stat: StatSchema) -> Self {
        self.stats.push(stat);
        self
    }

    pub fn with_default_trait(mut self, trait_id: impl Into<String>) -> Self {
        self.default_traits.push(trait_id.into());
        self
    }
}

/// Layout of a relationship between an owner type and a target type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub owner_type: String,
    pub target_type: String,
    #[serde(default)]
    pub stats: Vec<StatSchema>,
    #[serde(default)]
    pub default_traits: Vec<String>,
}

impl RelationshipSchema {
    pub fn new(owner_type: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            target_type: target_type.into(),
            stats: Vec::new(),
            default_traits: Vec::new(),
        }
    }

    pub fn with_stat(mut self, stat: StatSchema) -> Self {
        self.stats.push(stat);
        self
    }

    pub fn with_default_trait(mut self, trait_id: impl Into<String>) -> Self {
        self.default_traits.push(trait_id.into());
        self
    }

    /// Key used to look the schema up: `owner_type->target_type`
    pub fn key(&self) -> String {
        relationship_schema_key(&self.owner_type, &self.target_type)
    }
}

/// Builds the lookup key for a relationship schema.
pub fn relationship_schema_key(owner_type: &str, target_type: &str) -> String {
    format!("{}->{}", owner_type, target_type)
}

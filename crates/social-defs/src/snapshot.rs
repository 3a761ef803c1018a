//! Snapshot Types
//!
//! Serialization structs for exporting and restoring a social graph.
//!
//! A snapshot records what cannot be re-derived from content: which traits are
//! attached (with remaining durations), stat base values, and modifiers that no
//! live trait or rule owns. Everything a trait or rule produces is rebuilt by
//! re-attaching the trait on import.

use serde::{Deserialize, Serialize};

use crate::definition::ModifierKind;
use crate::library::LoadError;

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

/// Attached trait and its remaining duration (`None` = indefinite)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitSnapshot {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

/// Stat modifier not owned by any trait or rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierSnapshot {
    pub value: f64,
    pub order: i32,
    pub kind: ModifierKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

/// Stat base value and free modifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSnapshot {
    pub name: String,
    pub base_value: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<ModifierSnapshot>,
}

/// Full agent snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub uid: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    #[serde(default)]
    pub traits: Vec<TraitSnapshot>,
    #[serde(default)]
    pub stats: Vec<StatSnapshot>,
}

/// Relationship snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSnapshot {
    pub owner: String,
    pub target: String,
    #[serde(default)]
    pub traits: Vec<TraitSnapshot>,
    #[serde(default)]
    pub stats: Vec<StatSnapshot>,
}

/// Complete graph snapshot, agents and relationships in registration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub format_version: u32,
    #[serde(default)]
    pub agents: Vec<AgentSnapshot>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSnapshot>,
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphSnapshot {
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            agents: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses JSON and rejects unknown format versions.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    pub fn check_version(&self) -> Result<(), LoadError> {
        if self.format_version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion {
                found: self.format_version,
                expected: FORMAT_VERSION,
            });
        }
        Ok(())
    }

    pub fn agent(&self, uid: &str) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.uid == uid)
    }

    pub fn relationship(&self, owner: &str, target: &str) -> Option<&RelationshipSnapshot> {
        self.relationships
            .iter()
            .find(|r| r.owner == owner && r.target == target)
    }
}

//! Content Library
//!
//! The bundle of definitions an external loader hands to the engine at startup,
//! plus an optional starting population.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::definition::{SocialEventDefinition, SocialRuleDefinition, TraitDefinition};
use crate::schema::{AgentSchema, RelationshipSchema};

/// Errors that can occur while loading content or snapshots.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported content file extension: {0:?}")]
    UnsupportedExtension(String),
    #[error("unsupported snapshot format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// An agent to create when a scenario starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAgent {
    pub id: String,
    pub agent_type: String,
    /// Extra traits beyond the schema defaults
    #[serde(default)]
    pub traits: Vec<String>,
}

/// A relationship to create when a scenario starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRelationship {
    pub owner: String,
    pub target: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

/// Starting population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scenario {
    #[serde(default)]
    pub agents: Vec<ScenarioAgent>,
    #[serde(default)]
    pub relationships: Vec<ScenarioRelationship>,
}

impl Scenario {
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.relationships.is_empty()
    }
}

/// Every definition record the engine consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContentLibrary {
    #[serde(default)]
    pub agent_schemas: Vec<AgentSchema>,
    #[serde(default)]
    pub relationship_schemas: Vec<RelationshipSchema>,
    #[serde(default)]
    pub traits: Vec<TraitDefinition>,
    /// Global rules not owned by any trait
    #[serde(default)]
    pub social_rules: Vec<SocialRuleDefinition>,
    #[serde(default)]
    pub events: Vec<SocialEventDefinition>,
    #[serde(default, skip_serializing_if = "Scenario::is_empty")]
    pub scenario: Scenario,
}

impl ContentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a library from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(LoadError::UnsupportedExtension(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Parses a library from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, LoadError> {
        Ok(toml::from_str(content)?)
    }

    /// Parses a library from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Appends every definition of `other`; later definitions win on id clashes
    /// once registered.
    pub fn merge(&mut self, other: ContentLibrary) {
        self.agent_schemas.extend(other.agent_schemas);
        self.relationship_schemas.extend(other.relationship_schemas);
        self.traits.extend(other.traits);
        self.social_rules.extend(other.social_rules);
        self.events.extend(other.events);
        self.scenario.agents.extend(other.scenario.agents);
        self.scenario
            .relationships
            .extend(other.scenario.relationships);
    }

    pub fn trait_definition(&self, trait_id: &str) -> Option<&TraitDefinition> {
        self.traits.iter().find(|t| t.id == trait_id)
    }

    pub fn event(&self, key: &str) -> Option<&SocialEventDefinition> {
        self.events.iter().find(|e| e.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LIBRARY: &str = r#"
        [[agent_schemas]]
        agent_type = "character"
        [[agent_schemas.stats]]
        name = "Confidence"

        [[relationship_schemas]]
        owner_type = "character"
        target_type = "character"
        [[relationship_schemas.stats]]
        name = "Friendship"

        [[traits]]
        id = "human"

        [[events]]
        name = "compliment"
        roles = ["initiator", "target"]
        [[events.responses]]
        effects = ["AddAgentTrait ?target recently-complimented 3"]

        [[scenario.agents]]
        id = "liza"
        agent_type = "character"
    "#;

    #[test]
    fn test_parse_library() {
        let library = ContentLibrary::from_toml_str(LIBRARY).unwrap();

        assert_eq!(library.agent_schemas.len(), 1);
        assert_eq!(library.relationship_schemas[0].stats[0].name, "Friendship");
        assert!(library.trait_definition("human").is_some());
        assert_eq!(library.event("compliment/2").unwrap().responses.len(), 1);
        assert_eq!(library.scenario.agents[0].id, "liza");
    }

    #[test]
    fn test_load_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(LIBRARY.as_bytes()).unwrap();

        let library = ContentLibrary::from_file(&path).unwrap();
        assert_eq!(library.traits.len(), 1);

        let bad = dir.path().join("content.yaml");
        std::fs::write(&bad, "").unwrap();
        assert!(matches!(
            ContentLibrary::from_file(&bad),
            Err(LoadError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_merge_appends() {
        let mut a = ContentLibrary::from_toml_str(LIBRARY).unwrap();
        let b = ContentLibrary::from_toml_str(LIBRARY).unwrap();
        a.merge(b);
        assert_eq!(a.traits.len(), 2);
        assert_eq!(a.scenario.agents.len(), 2);
    }

    #[test]
    fn test_json_round_trip() {
        let library = ContentLibrary::from_toml_str(LIBRARY).unwrap();
        let json = serde_json::to_string(&library).unwrap();
        let back = ContentLibrary::from_json_str(&json).unwrap();
        assert_eq!(library, back);
    }
}

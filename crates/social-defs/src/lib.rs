//! Shared definition records and snapshot types for the social simulation.
//!
//! This crate contains pure data structures with no simulation logic: the
//! schemas, traits, social rules and events an external loader supplies, and the
//! snapshot format used to persist a social graph. It is a dependency for all
//! other crates in the workspace.

pub mod definition;
pub mod library;
pub mod schema;
pub mod snapshot;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

// Re-export schema types
pub use schema::{relationship_schema_key, AgentSchema, RelationshipSchema, StatSchema};

// Re-export definition types
pub use definition::{
    event_key, AppliesTo, ModifierKind, ResponseDefinition, RuleDirection,
    SocialEventDefinition, SocialRuleDefinition, StatModifierDefinition, TraitDefinition,
};

// Re-export library types
pub use library::{ContentLibrary, LoadError, Scenario, ScenarioAgent, ScenarioRelationship};

// Re-export snapshot types
pub use snapshot::{
    AgentSnapshot, GraphSnapshot, ModifierSnapshot, RelationshipSnapshot, StatSnapshot,
    TraitSnapshot, FORMAT_VERSION,
};

//! Sample content fixtures for testing.
//!
//! This module provides a ready-made content library for other crates to use.
//! Enable the `test-fixtures` feature to access these helpers.
//!
//! # Example
//!
//! ```ignore
//! // In your Cargo.toml:
//! // [dev-dependencies]
//! // social-defs = { path = "../social-defs", features = ["test-fixtures"] }
//!
//! use social_defs::fixtures;
//!
//! let library = fixtures::sample_library();
//! ```

use crate::{ContentLibrary, TraitDefinition};

/// Raw TOML of the sample library.
pub const SAMPLE_LIBRARY_TOML: &str = include_str!("../tests/fixtures/sample_library.toml");

/// Returns the sample content library.
///
/// Contains:
/// - 1 agent schema (`character`: Confidence, discrete Energy)
/// - 1 relationship schema (`character->character`: Friendship)
/// - 8 traits, including `friendly` (unconditional outgoing rule), `suspicious`
///   (query-gated rule), `vampirism`/`human` (conflict pair) and `crush`
///   (relationship trait with a percent modifier)
/// - 1 global rule and 2 events (`compliment/2`, `insult/2`)
/// - a scenario with liza, zim, jose and lisa
pub fn sample_library() -> ContentLibrary {
    ContentLibrary::from_toml_str(SAMPLE_LIBRARY_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse sample_library.toml: {}", e))
}

/// Returns the sample library without its starting population.
pub fn sample_definitions() -> ContentLibrary {
    let mut library = sample_library();
    library.scenario = Default::default();
    library
}

/// Returns a trait definition from the sample library.
pub fn sample_trait(trait_id: &str) -> Option<TraitDefinition> {
    sample_library()
        .traits
        .into_iter()
        .find(|t| t.id == trait_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_library_parses() {
        let library = sample_library();
        assert_eq!(library.agent_schemas.len(), 1);
        assert_eq!(library.events.len(), 2);
        assert_eq!(library.scenario.agents.len(), 4);
    }

    #[test]
    fn test_sample_definitions_drop_scenario() {
        assert!(sample_definitions().scenario.is_empty());
        assert!(sample_trait("vampirism").is_some());
        assert!(sample_trait("werewolf").is_none());
    }
}

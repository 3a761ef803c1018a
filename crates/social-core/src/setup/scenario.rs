//! Scenario Setup
//!
//! Builds a graph from a content library and spawns its starting population.

use social_defs::{ContentLibrary, Scenario};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::error::GraphError;
use crate::graph::SocialGraph;

/// Registers every definition of `library` in a fresh graph.
pub fn build_graph(library: &ContentLibrary, config: EngineConfig) -> Result<SocialGraph, GraphError> {
    SocialGraph::new(config).with_library(library)
}

/// Creates the scenario's agents, then its relationships, attaching the extra
/// traits each one lists. Traits rejected as duplicates or conflicts are
/// counted, not treated as errors.
pub fn spawn_scenario(graph: &mut SocialGraph, scenario: &Scenario) -> Result<SpawnSummary, GraphError> {
    let mut summary = SpawnSummary::default();

    for agent in &scenario.agents {
        graph.add_agent(&agent.agent_type, &agent.id)?;
        summary.total_agents += 1;
        *summary.by_type.entry(agent.agent_type.clone()).or_insert(0) += 1;
        for trait_id in &agent.traits {
            if graph.add_agent_trait(&agent.id, trait_id, None)? {
                summary.traits_attached += 1;
            } else {
                tracing::warn!(agent = %agent.id, trait_id = %trait_id, "Scenario trait rejected");
                summary.traits_rejected += 1;
            }
        }
    }

    for relationship in &scenario.relationships {
        graph.add_relationship(&relationship.owner, &relationship.target)?;
        summary.total_relationships += 1;
        for trait_id in &relationship.traits {
            if graph.add_relationship_trait(&relationship.owner, &relationship.target, trait_id, None)? {
                summary.traits_attached += 1;
            } else {
                tracing::warn!(
                    owner = %relationship.owner,
                    target = %relationship.target,
                    trait_id = %trait_id,
                    "Scenario trait rejected"
                );
                summary.traits_rejected += 1;
            }
        }
    }

    tracing::info!(
        agents = summary.total_agents,
        relationships = summary.total_relationships,
        rule_instances = graph.rule_instance_count(),
        "Spawned scenario"
    );
    Ok(summary)
}

/// Summary of a spawned scenario
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnSummary {
    pub total_agents: u32,
    pub total_relationships: u32,
    pub traits_attached: u32,
    pub traits_rejected: u32,
    pub by_type: BTreeMap<String, u32>,
}

impl std::fmt::Display for SpawnSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Total agents: {}", self.total_agents)?;
        for (agent_type, count) in &self.by_type {
            writeln!(f, "  {}: {}", agent_type, count)?;
        }
        writeln!(f, "Total relationships: {}", self.total_relationships)?;
        write!(
            f,
            "Scenario traits: {} attached, {} rejected",
            self.traits_attached, self.traits_rejected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use social_defs::{fixtures, ScenarioAgent};

    #[test]
    fn test_spawn_sample_scenario() {
        let library = fixtures::sample_library();
        let mut graph = build_graph(&library, EngineConfig::default()).unwrap();
        let summary = spawn_scenario(&mut graph, &library.scenario).unwrap();

        assert_eq!(summary.total_agents, 4);
        assert_eq!(summary.total_relationships, 3);
        assert_eq!(summary.by_type.get("character"), Some(&4));
        assert!(graph.has_agent_trait("zim", "human"));
        assert!(graph.relationship("lisa", "jose").is_some());
    }

    #[test]
    fn test_conflicting_scenario_trait_is_counted() {
        let library = fixtures::sample_library();
        let mut graph = build_graph(&library, EngineConfig::default()).unwrap();
        let mut scenario = Scenario::default();
        scenario.agents.push(ScenarioAgent {
            id: "vlad".into(),
            agent_type: "character".into(),
            traits: vec!["human".into(), "vampirism".into()],
        });

        let summary = spawn_scenario(&mut graph, &scenario).unwrap();
        assert_eq!(summary.traits_attached, 1);
        assert_eq!(summary.traits_rejected, 1);
        assert!(!graph.has_agent_trait("vlad", "vampirism"));
    }

    #[test]
    fn test_unknown_agent_type_fails() {
        let library = fixtures::sample_library();
        let mut graph = build_graph(&library, EngineConfig::default()).unwrap();
        let mut scenario = Scenario::default();
        scenario.agents.push(ScenarioAgent {
            id: "casper".into(),
            agent_type: "ghost".into(),
            traits: Vec::new(),
        });

        assert!(matches!(
            spawn_scenario(&mut graph, &scenario),
            Err(GraphError::UnknownSchema(_))
        ));
    }

    #[test]
    fn test_summary_display() {
        let mut summary = SpawnSummary {
            total_agents: 2,
            total_relationships: 1,
            traits_attached: 3,
            ..SpawnSummary::default()
        };
        summary.by_type.insert("character".into(), 2);

        let text = summary.to_string();
        assert!(text.contains("Total agents: 2"));
        assert!(text.contains("  character: 2"));
        assert!(text.contains("3 attached, 0 rejected"));
    }
}

//! Agent and relationship lifecycle.

use social_defs::{relationship_schema_key, AgentSchema, RelationshipSchema};
use std::sync::Arc;

use super::{Propagation, SocialGraph};
use crate::components::{
    Agent, AgentKey, EntityRef, Relationship, RelationshipKey, RuleSource, SocialEntity,
    SocialRule,
};
use crate::error::{GraphError, StatError};
use crate::observer::GraphEvent;

impl SocialGraph {
    /// Creates an agent of a registered type, installs its schema stats and
    /// attaches the schema's default traits.
    pub fn add_agent(&mut self, agent_type: &str, id: &str) -> Result<AgentKey, GraphError> {
        let schema = self.agent_schema(agent_type)?;
        if self.agent_ids.contains_key(id) {
            return Err(GraphError::DuplicateAgent(id.to_string()));
        }
        let key = self.spawn_agent(&schema, id);
        for trait_id in &schema.default_traits {
            self.add_trait_internal(EntityRef::Agent(key), trait_id, None, Propagation::Around)?;
        }
        Ok(key)
    }

    /// Removes an agent, every relationship touching it and everything its
    /// traits and rules applied.
    pub fn remove_agent(&mut self, id: &str) -> Result<(), GraphError> {
        let key = self.agent_key(id)?;
        let (edges, peers) = match self.agents.get(&key) {
            Some(agent) => {
                let peers: Vec<AgentKey> = agent
                    .outgoing
                    .keys()
                    .chain(agent.incoming.keys())
                    .copied()
                    .filter(|peer| *peer != key)
                    .collect();
                (agent.incident_edges(), peers)
            }
            None => return Err(GraphError::Unexpected(format!("agent {} has no entry", id))),
        };

        for edge in edges {
            self.unlink(edge)?;
        }
        for instance in self.rules.keys_touching(key) {
            self.remove_rule_instance(&instance)?;
        }
        let entity = EntityRef::Agent(key);
        let trait_ids = self
            .entity(entity)
            .map(|e| e.traits().ids())
            .unwrap_or_default();
        for trait_id in trait_ids.iter().rev() {
            self.remove_trait_internal(entity, trait_id, Propagation::OwnRulesOnly)?;
        }
        let sources = self
            .entity(entity)
            .map(|e| e.rule_sources().to_vec())
            .unwrap_or_default();
        for source in sources {
            self.remove_rule_source(source)?;
        }

        if let Some(agent) = self.agents.remove(&key) {
            self.agent_ids.remove(agent.id());
            self.facts.delete(&agent.fact_path());
        }
        tracing::debug!(agent = %id, "Removed agent");
        self.emit(GraphEvent::AgentRemoved {
            agent: id.to_string(),
        });

        let mut around: Vec<RelationshipKey> = peers
            .iter()
            .filter_map(|peer| self.agents.get(peer))
            .flat_map(|agent| agent.incident_edges())
            .collect();
        around.sort();
        around.dedup();
        self.reevaluate_edges(&around)
    }

    /// Creates the directed relationship `owner -> target`. An existing pair is
    /// returned unchanged.
    pub fn add_relationship(&mut self, owner: &str, target: &str) -> Result<RelationshipKey, GraphError> {
        let owner_key = self.agent_key(owner)?;
        let target_key = self.agent_key(target)?;
        if let Some(existing) = self.relationship_index.get(&(owner_key, target_key)) {
            return Ok(*existing);
        }
        let schema = self.relationship_schema(owner_key, target_key)?;
        let key = self.link(owner_key, target_key, &schema);
        for trait_id in &schema.default_traits {
            self.add_trait_internal(
                EntityRef::Relationship(key),
                trait_id,
                None,
                Propagation::OwnRulesOnly,
            )?;
        }
        self.reevaluate_edges(&[key])?;
        Ok(key)
    }

    /// Returns false if the pair has no relationship.
    pub fn remove_relationship(&mut self, owner: &str, target: &str) -> Result<bool, GraphError> {
        let owner_key = self.agent_key(owner)?;
        let target_key = self.agent_key(target)?;
        let Some(&key) = self.relationship_index.get(&(owner_key, target_key)) else {
            return Ok(false);
        };
        self.unlink(key)?;
        let around = self.edges_around_agents(&[owner_key, target_key]);
        self.reevaluate_edges(&around)?;
        Ok(true)
    }

    /// Sets the base value of an agent stat.
    pub fn set_agent_stat_base(&mut self, id: &str, stat: &str, value: f64) -> Result<(), GraphError> {
        let key = self.agent_key(id)?;
        self.set_stat_base(EntityRef::Agent(key), stat, value)
    }

    /// Sets the base value of a relationship stat.
    pub fn set_relationship_stat_base(
        &mut self,
        owner: &str,
        target: &str,
        stat: &str,
        value: f64,
    ) -> Result<(), GraphError> {
        let key = self.existing_relationship(owner, target)?;
        self.set_stat_base(EntityRef::Relationship(key), stat, value)
    }

    fn set_stat_base(&mut self, entity: EntityRef, stat: &str, value: f64) -> Result<(), GraphError> {
        let updated = self
            .entity_mut(entity)
            .map_or(false, |e| e.stats_mut().set_base(stat, value));
        if !updated {
            let label = self
                .entity_id(entity)
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(StatError::UnknownStat {
                entity: label,
                stat: stat.to_string(),
            }
            .into());
        }
        if self.flush_stats(entity) {
            self.propagate_around(entity)?;
        }
        Ok(())
    }

    pub(super) fn agent_schema(&self, agent_type: &str) -> Result<AgentSchema, GraphError> {
        self.agent_schemas
            .get(agent_type)
            .cloned()
            .ok_or_else(|| GraphError::UnknownSchema(agent_type.to_string()))
    }

    pub(super) fn relationship_schema(&self, owner: AgentKey, target: AgentKey) -> Result<RelationshipSchema, GraphError> {
        let type_of = |key: AgentKey| {
            self.agents
                .get(&key)
                .map(|a| a.agent_type().to_string())
                .unwrap_or_default()
        };
        let schema_key = relationship_schema_key(&type_of(owner), &type_of(target));
        self.relationship_schemas
            .get(&schema_key)
            .cloned()
            .ok_or(GraphError::UnknownSchema(schema_key))
    }

    /// Creates the agent entry with schema stats and global rules, without
    /// default traits.
    pub(super) fn spawn_agent(&mut self, schema: &AgentSchema, id: &str) -> AgentKey {
        let key = AgentKey(self.next_agent_key);
        self.next_agent_key += 1;

        let mut agent = Agent::new(key, id, schema.agent_type.clone());
        for stat in &schema.stats {
            agent.stats.install(self.stat_from_schema(stat));
        }

        let rules: Vec<Arc<SocialRule>> = self
            .global_rules
            .iter()
            .filter(|rule| rule.applies_to_type(&schema.agent_type))
            .cloned()
            .collect();
        if !rules.is_empty() {
            let source = self.next_source();
            self.rules.add_source(RuleSource {
                source,
                holder: EntityRef::Agent(key),
                rules,
            });
            agent.rule_sources.push(source);
        }

        self.facts.insert(&agent.fact_path());
        self.agents.insert(key, agent);
        self.agent_ids.insert(id.to_string(), key);
        self.flush_stats(EntityRef::Agent(key));

        tracing::debug!(agent = %id, agent_type = %schema.agent_type, "Added agent");
        self.emit(GraphEvent::AgentAdded {
            agent: id.to_string(),
        });
        key
    }

    /// Creates the edge with schema stats, without default traits or rule
    /// evaluation.
    pub(super) fn link(&mut self, owner: AgentKey, target: AgentKey, schema: &RelationshipSchema) -> RelationshipKey {
        let key = RelationshipKey(self.next_relationship_key);
        self.next_relationship_key += 1;

        let owner_id = self.agent_id_of(owner).unwrap_or_default().to_string();
        let target_id = self.agent_id_of(target).unwrap_or_default().to_string();
        let mut relationship = Relationship::new(key, (owner, &owner_id), (target, &target_id));
        for stat in &schema.stats {
            relationship.stats.install(self.stat_from_schema(stat));
        }

        self.facts.insert(&relationship.fact_path());
        self.relationships.insert(key, relationship);
        self.relationship_index.insert((owner, target), key);
        if let Some(agent) = self.agents.get_mut(&owner) {
            agent.outgoing.insert(target, key);
        }
        if let Some(agent) = self.agents.get_mut(&target) {
            agent.incoming.insert(owner, key);
        }
        self.flush_stats(EntityRef::Relationship(key));

        tracing::debug!(owner = %owner_id, target = %target_id, "Added relationship");
        self.emit(GraphEvent::RelationshipAdded {
            owner: owner_id,
            target: target_id,
        });
        key
    }

    /// Tears down one edge: rule instances bound to its pair, its traits, then
    /// the edge itself and its facts.
    fn unlink(&mut self, key: RelationshipKey) -> Result<(), GraphError> {
        let Some(relationship) = self.relationships.get(&key) else {
            return Ok(());
        };
        let (owner, target) = (relationship.owner(), relationship.target());

        for instance in self.rules.keys_for_pair(owner, target) {
            self.remove_rule_instance(&instance)?;
        }
        let entity = EntityRef::Relationship(key);
        let trait_ids = self
            .entity(entity)
            .map(|e| e.traits().ids())
            .unwrap_or_default();
        for trait_id in trait_ids.iter().rev() {
            self.remove_trait_internal(entity, trait_id, Propagation::OwnRulesOnly)?;
        }

        let Some(relationship) = self.relationships.remove(&key) else {
            return Ok(());
        };
        for source in relationship.rule_sources() {
            self.remove_rule_source(*source)?;
        }
        self.relationship_index.remove(&(owner, target));
        if let Some(agent) = self.agents.get_mut(&owner) {
            agent.outgoing.remove(&target);
        }
        if let Some(agent) = self.agents.get_mut(&target) {
            agent.incoming.remove(&owner);
        }
        self.facts.delete(&relationship.fact_path());

        tracing::debug!(
            owner = %relationship.owner_id(),
            target = %relationship.target_id(),
            "Removed relationship"
        );
        self.emit(GraphEvent::RelationshipRemoved {
            owner: relationship.owner_id,
            target: relationship.target_id,
        });
        Ok(())
    }

    /// Every edge touching any of `agents`, sorted.
    pub(super) fn edges_around_agents(&self, agents: &[AgentKey]) -> Vec<RelationshipKey> {
        let mut edges: Vec<RelationshipKey> = agents
            .iter()
            .filter_map(|key| self.agents.get(key))
            .flat_map(|agent| agent.incident_edges())
            .collect();
        edges.sort();
        edges.dedup();
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_graph;
    use super::*;
    use crate::facts::FactDatabase;

    #[test]
    fn test_add_agent_installs_stats_and_facts() {
        let mut graph = sample_graph();
        graph.add_agent("character", "liza").unwrap();

        assert_eq!(graph.agent_stat("liza", "Confidence"), Some(0.0));
        assert_eq!(graph.agent_stat("liza", "Energy"), Some(10.0));
        assert!(graph.facts().contains("liza"));
        assert!(graph.facts().contains("liza.stats.Energy!10"));
    }

    #[test]
    fn test_add_agent_errors() {
        let mut graph = sample_graph();
        assert!(matches!(
            graph.add_agent("ghost", "casper"),
            Err(GraphError::UnknownSchema(_))
        ));
        graph.add_agent("character", "liza").unwrap();
        assert!(matches!(
            graph.add_agent("character", "liza"),
            Err(GraphError::DuplicateAgent(_))
        ));
    }

    #[test]
    fn test_add_relationship_is_idempotent() {
        let mut graph = sample_graph();
        graph.add_agent("character", "liza").unwrap();
        graph.add_agent("character", "zim").unwrap();

        let first = graph.add_relationship("liza", "zim").unwrap();
        let second = graph.add_relationship("liza", "zim").unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.relationship_count(), 1);
        assert_eq!(graph.relationship("liza", "zim").unwrap().stats().len(), 1);
        assert!(graph.facts().contains("liza.relationships.zim.stats.Friendship!0"));
    }

    #[test]
    fn test_add_relationship_requires_agents() {
        let mut graph = sample_graph();
        graph.add_agent("character", "liza").unwrap();
        assert!(matches!(
            graph.add_relationship("liza", "nobody"),
            Err(GraphError::UnknownAgent(_))
        ));
    }

    #[test]
    fn test_missing_relationship_schema() {
        let mut library = social_defs::fixtures::sample_definitions();
        library
            .agent_schemas
            .push(social_defs::AgentSchema::new("ghost"));
        let mut graph = SocialGraph::default().with_library(&library).unwrap();
        graph.add_agent("character", "liza").unwrap();
        graph.add_agent("ghost", "casper").unwrap();

        assert!(matches!(
            graph.add_relationship("liza", "casper"),
            Err(GraphError::UnknownSchema(key)) if key == "character->ghost"
        ));
    }

    #[test]
    fn test_remove_agent_cascades() {
        let mut graph = sample_graph();
        graph.add_agent("character", "liza").unwrap();
        graph.add_agent("character", "zim").unwrap();
        graph.add_relationship("liza", "zim").unwrap();
        graph.add_relationship("zim", "liza").unwrap();

        graph.remove_agent("zim").unwrap();

        assert_eq!(graph.relationship_count(), 0);
        assert!(graph.agent("zim").is_none());
        assert!(graph.agent("liza").unwrap().incident_edges().is_empty());
        assert!(!graph.facts().contains("zim"));
        assert!(!graph.facts().contains("liza.relationships.zim"));
        assert!(matches!(graph.remove_agent("zim"), Err(GraphError::UnknownAgent(_))));
    }

    #[test]
    fn test_remove_relationship() {
        let mut graph = sample_graph();
        graph.add_agent("character", "liza").unwrap();
        graph.add_agent("character", "zim").unwrap();
        graph.add_relationship("liza", "zim").unwrap();

        assert!(graph.remove_relationship("liza", "zim").unwrap());
        assert!(!graph.remove_relationship("liza", "zim").unwrap());
        assert!(graph.relationship("liza", "zim").is_none());
    }

    #[test]
    fn test_set_stat_base() {
        let mut graph = sample_graph();
        graph.add_agent("character", "liza").unwrap();

        graph.set_agent_stat_base("liza", "Confidence", 150.0).unwrap();
        assert_eq!(graph.agent_stat("liza", "Confidence"), Some(100.0));
        assert!(graph.facts().contains("liza.stats.Confidence!100"));
        assert!(matches!(
            graph.set_agent_stat_base("liza", "Charisma", 1.0),
            Err(GraphError::Stat(_))
        ));
    }
}

//! Entity Components
//!
//! Agents and the directed relationships between them. Both carry a trait set
//! and a stat map; the graph reaches them through [`SocialEntity`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stat::{SourceId, StatManager};
use super::traits::TraitManager;
use crate::facts;

/// Arena key of an agent; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentKey(pub u32);

/// Arena key of a relationship; never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipKey(pub u32);

/// Either kind of entity that can carry traits and stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Agent(AgentKey),
    Relationship(RelationshipKey),
}

/// Capabilities shared by agents and relationships
pub trait SocialEntity {
    fn traits(&self) -> &TraitManager;
    fn traits_mut(&mut self) -> &mut TraitManager;
    fn stats(&self) -> &StatManager;
    fn stats_mut(&mut self) -> &mut StatManager;

    /// Rule sources held by this entity, in attach order
    fn rule_sources(&self) -> &[SourceId];
    fn rule_sources_mut(&mut self) -> &mut Vec<SourceId>;

    /// Fact path of the entity itself
    fn fact_path(&self) -> String;
    fn trait_fact_path(&self, trait_id: &str) -> String;
    fn stat_fact_path(&self, stat: &str) -> String;
}

/// A character in the social graph
#[derive(Debug, Clone)]
pub struct Agent {
    pub(crate) key: AgentKey,
    pub(crate) id: String,
    pub(crate) agent_type: String,
    pub(crate) traits: TraitManager,
    pub(crate) stats: StatManager,
    pub(crate) rule_sources: Vec<SourceId>,
    /// Peer -> relationship this agent owns
    pub(crate) outgoing: BTreeMap<AgentKey, RelationshipKey>,
    /// Peer -> relationship pointing at this agent
    pub(crate) incoming: BTreeMap<AgentKey, RelationshipKey>,
}

impl Agent {
    pub(crate) fn new(key: AgentKey, id: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            key,
            id: id.into(),
            agent_type: agent_type.into(),
            traits: TraitManager::new(),
            stats: StatManager::new(),
            rule_sources: Vec::new(),
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> AgentKey {
        self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }

    pub fn outgoing(&self) -> impl Iterator<Item = (AgentKey, RelationshipKey)> + '_ {
        self.outgoing.iter().map(|(peer, edge)| (*peer, *edge))
    }

    pub fn incoming(&self) -> impl Iterator<Item = (AgentKey, RelationshipKey)> + '_ {
        self.incoming.iter().map(|(peer, edge)| (*peer, *edge))
    }

    /// Every relationship touching this agent, deduplicated and sorted.
    pub fn incident_edges(&self) -> Vec<RelationshipKey> {
        let mut edges: Vec<RelationshipKey> = self
            .outgoing
            .values()
            .chain(self.incoming.values())
            .copied()
            .collect();
        edges.sort();
        edges.dedup();
        edges
    }
}

impl SocialEntity for Agent {
    fn traits(&self) -> &TraitManager {
        &self.traits
    }

    fn traits_mut(&mut self) -> &mut TraitManager {
        &mut self.traits
    }

    fn stats(&self) -> &StatManager {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut StatManager {
        &mut self.stats
    }

    fn rule_sources(&self) -> &[SourceId] {
        &self.rule_sources
    }

    fn rule_sources_mut(&mut self) -> &mut Vec<SourceId> {
        &mut self.rule_sources
    }

    fn fact_path(&self) -> String {
        facts::agent_path(&self.id)
    }

    fn trait_fact_path(&self, trait_id: &str) -> String {
        facts::agent_trait_path(&self.id, trait_id)
    }

    fn stat_fact_path(&self, stat: &str) -> String {
        facts::agent_stat_path(&self.id, stat)
    }
}

/// A directed edge from `owner` to `target`
#[derive(Debug, Clone)]
pub struct Relationship {
    pub(crate) key: RelationshipKey,
    pub(crate) owner: AgentKey,
    pub(crate) target: AgentKey,
    pub(crate) owner_id: String,
    pub(crate) target_id: String,
    pub(crate) traits: TraitManager,
    pub(crate) stats: StatManager,
    pub(crate) rule_sources: Vec<SourceId>,
}

impl Relationship {
    pub(crate) fn new(
        key: RelationshipKey,
        (owner, owner_id): (AgentKey, &str),
        (target, target_id): (AgentKey, &str),
    ) -> Self {
        Self {
            key,
            owner,
            target,
            owner_id: owner_id.to_string(),
            target_id: target_id.to_string(),
            traits: TraitManager::new(),
            stats: StatManager::new(),
            rule_sources: Vec::new(),
        }
    }

    pub fn key(&self) -> RelationshipKey {
        self.key
    }

    pub fn owner(&self) -> AgentKey {
        self.owner
    }

    pub fn target(&self) -> AgentKey {
        self.target
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }
}

impl SocialEntity for Relationship {
    fn traits(&self) -> &TraitManager {
        &self.traits
    }

    fn traits_mut(&mut self) -> &mut TraitManager {
        &mut self.traits
    }

    fn stats(&self) -> &StatManager {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut StatManager {
        &mut self.stats
    }

    fn rule_sources(&self) -> &[SourceId] {
        &self.rule_sources
    }

    fn rule_sources_mut(&mut self) -> &mut Vec<SourceId> {
        &mut self.rule_sources
    }

    fn fact_path(&self) -> String {
        facts::relationship_path(&self.owner_id, &self.target_id)
    }

    fn trait_fact_path(&self, trait_id: &str) -> String {
        facts::relationship_trait_path(&self.owner_id, &self.target_id, trait_id)
    }

    fn stat_fact_path(&self, stat: &str) -> String {
        facts::relationship_stat_path(&self.owner_id, &self.target_id, stat)
    }
}

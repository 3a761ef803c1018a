//! Social Rule Components
//!
//! Parsed social rules, the sources that hold them, and the instances created
//! when a rule's precondition holds for an ordered pair of agents.

use social_defs::{RuleDirection, SocialRuleDefinition};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::entity::{AgentKey, EntityRef};
use super::stat::SourceId;
use crate::effects::Effect;
use crate::facts::{Bindings, Query, QueryError};

/// A rule with its precondition parsed
#[derive(Debug, Clone)]
pub struct SocialRule {
    id: String,
    description: String,
    query: Query,
    effects: Vec<String>,
    direction: RuleDirection,
    agent_types: Vec<String>,
}

impl SocialRule {
    pub fn from_definition(
        definition: &SocialRuleDefinition,
        default_id: impl Into<String>,
    ) -> Result<Self, QueryError> {
        Ok(Self {
            id: definition.id.clone().unwrap_or_else(|| default_id.into()),
            description: definition.description.clone(),
            query: Query::parse(&definition.preconditions)?,
            effects: definition.effects.clone(),
            direction: definition.direction,
            agent_types: definition.agent_types.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn effects(&self) -> &[String] {
        &self.effects
    }

    pub fn direction(&self) -> RuleDirection {
        self.direction
    }

    /// Global rules only: whether agents of `agent_type` receive this rule.
    pub fn applies_to_type(&self, agent_type: &str) -> bool {
        self.agent_types.is_empty() || self.agent_types.iter().any(|t| t == agent_type)
    }
}

/// A set of rules attached to one entity by one trait instance (or the global
/// rule set of an agent)
#[derive(Debug, Clone)]
pub struct RuleSource {
    pub source: SourceId,
    pub holder: EntityRef,
    pub rules: Vec<Arc<SocialRule>>,
}

/// Identity of a rule instance. `source` records which holder created it;
/// the graph keeps at most one instance per (rule, owner, other).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleInstanceKey {
    pub source: SourceId,
    pub rule: String,
    pub owner: AgentKey,
    pub other: AgentKey,
}

/// A rule bound to an ordered pair of agents
#[derive(Debug, Clone)]
pub struct SocialRuleInstance {
    rule: Arc<SocialRule>,
    /// Source of the modifiers this instance's effects create
    source: SourceId,
    bindings: Bindings,
    description: String,
    pub(crate) effects: Vec<Effect>,
}

impl SocialRuleInstance {
    pub fn new(
        rule: Arc<SocialRule>,
        source: SourceId,
        bindings: Bindings,
        description: impl Into<String>,
    ) -> Self {
        Self {
            rule,
            source,
            bindings,
            description: description.into(),
            effects: Vec::new(),
        }
    }

    pub fn rule(&self) -> &Arc<SocialRule> {
        &self.rule
    }

    pub fn rule_id(&self) -> &str {
        self.rule.id()
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }
}

/// Every rule source and live rule instance in the graph
#[derive(Debug, Clone, Default)]
pub struct RuleManager {
    sources: BTreeMap<SourceId, RuleSource>,
    instances: BTreeMap<RuleInstanceKey, SocialRuleInstance>,
}

impl RuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source: RuleSource) {
        self.sources.insert(source.source, source);
    }

    pub fn remove_source(&mut self, source: SourceId) -> Option<RuleSource> {
        self.sources.remove(&source)
    }

    pub fn source(&self, source: SourceId) -> Option<&RuleSource> {
        self.sources.get(&source)
    }

    pub fn contains(&self, key: &RuleInstanceKey) -> bool {
        self.instances.contains_key(key)
    }

    pub fn get(&self, key: &RuleInstanceKey) -> Option<&SocialRuleInstance> {
        self.instances.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &RuleInstanceKey) -> Option<&mut SocialRuleInstance> {
        self.instances.get_mut(key)
    }

    /// Returns false if an instance with this key already exists.
    pub fn insert(&mut self, key: RuleInstanceKey, instance: SocialRuleInstance) -> bool {
        if self.instances.contains_key(&key) {
            return false;
        }
        self.instances.insert(key, instance);
        true
    }

    pub fn remove(&mut self, key: &RuleInstanceKey) -> Option<SocialRuleInstance> {
        self.instances.remove(key)
    }

    pub fn keys_for_source(&self, source: SourceId) -> Vec<RuleInstanceKey> {
        self.instances
            .keys()
            .filter(|k| k.source == source)
            .cloned()
            .collect()
    }

    pub fn keys_for_pair(&self, owner: AgentKey, other: AgentKey) -> Vec<RuleInstanceKey> {
        self.instances
            .keys()
            .filter(|k| k.owner == owner && k.other == other)
            .cloned()
            .collect()
    }

    /// Instances where `agent` is either side of the pair.
    pub fn keys_touching(&self, agent: AgentKey) -> Vec<RuleInstanceKey> {
        self.instances
            .keys()
            .filter(|k| k.owner == agent || k.other == agent)
            .cloned()
            .collect()
    }

    /// Whether any source has an instance of `rule_id` for the pair.
    pub fn has_instance(&self, rule_id: &str, owner: AgentKey, other: AgentKey) -> bool {
        self.instances
            .keys()
            .any(|k| k.rule == rule_id && k.owner == owner && k.other == other)
    }

    pub fn instances_for(&self, owner: AgentKey, other: AgentKey) -> Vec<&SocialRuleInstance> {
        self.instances
            .iter()
            .filter(|(k, _)| k.owner == owner && k.other == other)
            .map(|(_, instance)| instance)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RuleInstanceKey, &SocialRuleInstance)> {
        self.instances.iter()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

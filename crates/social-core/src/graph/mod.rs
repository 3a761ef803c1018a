//! Social Graph
//!
//! Owns agents, relationships, registries and the fact database, and keeps
//! trait effects and social rule instances consistent as the graph changes.
//!
//! The graph is the only writer of facts. Every mutation goes through it:
//!
//! 1. entity managers are updated (traits, stats, rule sources)
//! 2. stat changes are mirrored into facts and reported to observers
//! 3. rules touching the affected relationships are re-evaluated once

mod dispatch;
mod lifecycle;
mod propagation;
mod snapshot;
mod tick;
mod traits;

pub use dispatch::{DispatchReport, ResponseReport};

use social_defs::{
    AgentSchema, AppliesTo, ContentLibrary, RelationshipSchema, SocialEventDefinition,
    SocialRuleDefinition, StatSchema, TraitDefinition,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::components::{
    Agent, AgentKey, EntityRef, Relationship, RelationshipKey, RuleManager, SocialEntity,
    SocialRule, SocialRuleInstance, SourceId, Stat, Trait, TraitRegistry,
};
use crate::config::EngineConfig;
use crate::effects::{EffectLibrary, EffectTargets};
use crate::error::GraphError;
use crate::facts::{self, FactDatabase, MemoryFactDb, Query};
use crate::observer::{EntityId, GraphEvent, ObserverHandle, Observers};

/// How far a mutation re-evaluates social rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Propagation {
    /// Every relationship touching the mutated entity
    Around,
    /// Only rules the mutation itself attached
    OwnRulesOnly,
}

/// A registered event with its response preconditions parsed
#[derive(Debug, Clone)]
pub(crate) struct RegisteredEvent {
    definition: SocialEventDefinition,
    preconditions: Vec<Query>,
}

/// The social simulation state
pub struct SocialGraph {
    config: EngineConfig,
    agent_schemas: BTreeMap<String, AgentSchema>,
    relationship_schemas: BTreeMap<String, RelationshipSchema>,
    traits: TraitRegistry,
    global_rules: Vec<Arc<SocialRule>>,
    events: BTreeMap<String, Arc<RegisteredEvent>>,
    effects: EffectLibrary,

    agents: BTreeMap<AgentKey, Agent>,
    agent_ids: HashMap<String, AgentKey>,
    relationships: BTreeMap<RelationshipKey, Relationship>,
    relationship_index: HashMap<(AgentKey, AgentKey), RelationshipKey>,
    rules: RuleManager,

    facts: Box<dyn FactDatabase + Send>,
    observers: Observers<GraphEvent>,

    next_agent_key: u32,
    next_relationship_key: u32,
    next_source: u64,
}

impl std::fmt::Debug for SocialGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialGraph")
            .field("agents", &self.agents.len())
            .field("relationships", &self.relationships.len())
            .field("rule_instances", &self.rules.instance_count())
            .finish()
    }
}

impl Default for SocialGraph {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SocialGraph {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            agent_schemas: BTreeMap::new(),
            relationship_schemas: BTreeMap::new(),
            traits: TraitRegistry::new(),
            global_rules: Vec::new(),
            events: BTreeMap::new(),
            effects: EffectLibrary::with_builtins(),
            agents: BTreeMap::new(),
            agent_ids: HashMap::new(),
            relationships: BTreeMap::new(),
            relationship_index: HashMap::new(),
            rules: RuleManager::new(),
            facts: Box::new(MemoryFactDb::new()),
            observers: Observers::new(),
            next_agent_key: 0,
            next_relationship_key: 0,
            next_source: 0,
        }
    }

    /// Replaces the fact database. Only meaningful before any entity exists.
    pub fn with_fact_database(mut self, facts: impl FactDatabase + Send + 'static) -> Self {
        self.facts = Box::new(facts);
        self
    }

    pub fn with_effect_library(mut self, effects: EffectLibrary) -> Self {
        self.effects = effects;
        self
    }

    /// Registers every definition of a content library.
    pub fn with_library(mut self, library: &ContentLibrary) -> Result<Self, GraphError> {
        self.register_library(library)?;
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Registers schemas, traits, global rules and events, then checks that
    /// every schema default trait exists.
    pub fn register_library(&mut self, library: &ContentLibrary) -> Result<(), GraphError> {
        for definition in &library.traits {
            self.register_trait(definition.clone())?;
        }
        for schema in &library.agent_schemas {
            self.register_agent_schema(schema.clone())?;
        }
        for schema in &library.relationship_schemas {
            self.register_relationship_schema(schema.clone())?;
        }
        for rule in &library.social_rules {
            self.register_social_rule(rule)?;
        }
        for event in &library.events {
            self.register_event(event.clone())?;
        }

        let defaults = self
            .agent_schemas
            .values()
            .flat_map(|s| s.default_traits.iter())
            .chain(
                self.relationship_schemas
                    .values()
                    .flat_map(|s| s.default_traits.iter()),
            );
        for trait_id in defaults {
            if !self.traits.contains(trait_id) {
                return Err(GraphError::UnknownTrait(trait_id.clone()));
            }
        }

        tracing::info!(
            traits = self.traits.len(),
            events = self.events.len(),
            global_rules = self.global_rules.len(),
            "Registered content library"
        );
        Ok(())
    }

    pub fn register_agent_schema(&mut self, schema: AgentSchema) -> Result<(), GraphError> {
        self.check_stat_bounds(&schema.agent_type, &schema.stats)?;
        self.agent_schemas.insert(schema.agent_type.clone(), schema);
        Ok(())
    }

    pub fn register_relationship_schema(&mut self, schema: RelationshipSchema) -> Result<(), GraphError> {
        let key = schema.key();
        self.check_stat_bounds(&key, &schema.stats)?;
        self.relationship_schemas.insert(key, schema);
        Ok(())
    }

    /// Bounds are resolved against the configured defaults, so a schema that
    /// only sets `min` can still end up above the default `max`.
    fn check_stat_bounds(&self, schema: &str, stats: &[StatSchema]) -> Result<(), GraphError> {
        for stat in stats {
            let min = stat.min.unwrap_or(self.config.default_stat_min);
            let max = stat.max.unwrap_or(self.config.default_stat_max);
            if min.is_nan() || max.is_nan() || min > max {
                return Err(GraphError::InvalidStatBounds {
                    schema: schema.to_string(),
                    stat: stat.name.clone(),
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    pub fn register_trait(&mut self, definition: TraitDefinition) -> Result<(), GraphError> {
        let id = definition.id.clone();
        self.traits
            .register(definition)
            .map_err(|error| GraphError::query(id, error))?;
        Ok(())
    }

    /// Registers a rule owned by no trait. It attaches to agents created
    /// afterwards whose type it names.
    pub fn register_social_rule(&mut self, definition: &SocialRuleDefinition) -> Result<(), GraphError> {
        let default_id = format!("global#{}", self.global_rules.len());
        let rule = SocialRule::from_definition(definition, default_id.clone())
            .map_err(|error| GraphError::query(definition.id.clone().unwrap_or(default_id), error))?;
        self.global_rules.push(Arc::new(rule));
        Ok(())
    }

    pub fn register_event(&mut self, definition: SocialEventDefinition) -> Result<(), GraphError> {
        let key = definition.key();
        let preconditions = definition
            .responses
            .iter()
            .map(|r| Query::parse(&r.preconditions))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| GraphError::query(key.clone(), error))?;
        self.events.insert(
            key,
            Arc::new(RegisteredEvent {
                definition,
                preconditions,
            }),
        );
        Ok(())
    }

    pub fn effect_library_mut(&mut self) -> &mut EffectLibrary {
        &mut self.effects
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self, callback: impl FnMut(&GraphEvent) + Send + 'static) -> ObserverHandle {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, handle: ObserverHandle) -> bool {
        self.observers.unsubscribe(handle)
    }

    fn emit(&mut self, event: GraphEvent) {
        self.observers.notify(&event);
    }

    // ------------------------------------------------------------------
    // Read API
    // ------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn trait_registry(&self) -> &TraitRegistry {
        &self.traits
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agent_ids.get(id).and_then(|key| self.agents.get(key))
    }

    pub fn relationship(&self, owner: &str, target: &str) -> Option<&Relationship> {
        self.relationship_key(owner, target)
            .and_then(|key| self.relationships.get(&key))
    }

    /// Agents in registration order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Relationships in registration order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn agent_stat(&self, id: &str, stat: &str) -> Option<f64> {
        self.agent(id).and_then(|a| a.stats().value(stat))
    }

    pub fn relationship_stat(&self, owner: &str, target: &str, stat: &str) -> Option<f64> {
        self.relationship(owner, target)
            .and_then(|r| r.stats().value(stat))
    }

    pub fn has_agent_trait(&self, id: &str, trait_id: &str) -> bool {
        self.agent(id).map_or(false, |a| a.traits().has_trait(trait_id))
    }

    pub fn has_relationship_trait(&self, owner: &str, target: &str, trait_id: &str) -> bool {
        self.relationship(owner, target)
            .map_or(false, |r| r.traits().has_trait(trait_id))
    }

    /// Resolved description of a trait attached to an agent.
    pub fn trait_description(&self, id: &str, trait_id: &str) -> Option<&str> {
        self.agent(id)
            .and_then(|a| a.traits().get_trait(trait_id))
            .map(|t| t.description())
    }

    pub fn relationship_trait_description(&self, owner: &str, target: &str, trait_id: &str) -> Option<&str> {
        self.relationship(owner, target)
            .and_then(|r| r.traits().get_trait(trait_id))
            .map(|t| t.description())
    }

    /// Whether an instance of `rule_id` exists for the ordered pair.
    pub fn has_social_rule_instance(&self, rule_id: &str, owner: &str, other: &str) -> bool {
        match (self.agent_ids.get(owner), self.agent_ids.get(other)) {
            (Some(&o), Some(&t)) => self.rules.has_instance(rule_id, o, t),
            _ => false,
        }
    }

    pub fn social_rule_instances_for(&self, owner: &str, other: &str) -> Vec<&SocialRuleInstance> {
        match (self.agent_ids.get(owner), self.agent_ids.get(other)) {
            (Some(&o), Some(&t)) => self.rules.instances_for(o, t),
            _ => Vec::new(),
        }
    }

    pub fn rule_instance_count(&self) -> usize {
        self.rules.instance_count()
    }

    pub fn facts(&self) -> &dyn FactDatabase {
        self.facts.as_ref()
    }

    /// Registered events in key order.
    pub fn events(&self) -> impl Iterator<Item = &SocialEventDefinition> {
        self.events.values().map(|e| &e.definition)
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn next_source(&mut self) -> SourceId {
        let source = SourceId(self.next_source);
        self.next_source += 1;
        source
    }

    fn relationship_key(&self, owner: &str, target: &str) -> Option<RelationshipKey> {
        let owner = self.agent_ids.get(owner)?;
        let target = self.agent_ids.get(target)?;
        self.relationship_index.get(&(*owner, *target)).copied()
    }

    fn agent_key(&self, id: &str) -> Result<AgentKey, GraphError> {
        self.agent_ids
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownAgent(id.to_string()))
    }

    fn existing_relationship(&self, owner: &str, target: &str) -> Result<RelationshipKey, GraphError> {
        self.agent_key(owner)?;
        self.agent_key(target)?;
        self.relationship_key(owner, target)
            .ok_or_else(|| GraphError::UnknownRelationship {
                owner: owner.to_string(),
                target: target.to_string(),
            })
    }

    fn entity(&self, entity: EntityRef) -> Option<&dyn SocialEntity> {
        match entity {
            EntityRef::Agent(key) => self.agents.get(&key).map(|a| a as &dyn SocialEntity),
            EntityRef::Relationship(key) => self
                .relationships
                .get(&key)
                .map(|r| r as &dyn SocialEntity),
        }
    }

    fn entity_mut(&mut self, entity: EntityRef) -> Option<&mut dyn SocialEntity> {
        match entity {
            EntityRef::Agent(key) => self
                .agents
                .get_mut(&key)
                .map(|a| a as &mut dyn SocialEntity),
            EntityRef::Relationship(key) => self
                .relationships
                .get_mut(&key)
                .map(|r| r as &mut dyn SocialEntity),
        }
    }

    fn entity_id(&self, entity: EntityRef) -> Option<EntityId> {
        match entity {
            EntityRef::Agent(key) => self.agents.get(&key).map(|a| EntityId::agent(a.id())),
            EntityRef::Relationship(key) => self
                .relationships
                .get(&key)
                .map(|r| EntityId::relationship(r.owner_id(), r.target_id())),
        }
    }

    fn agent_id_of(&self, key: AgentKey) -> Option<&str> {
        self.agents.get(&key).map(|a| a.id())
    }

    fn stat_from_schema(&self, schema: &StatSchema) -> Stat {
        Stat::from_schema(
            schema,
            self.config.default_stat_min,
            self.config.default_stat_max,
            self.config.stat_precision,
        )
    }

    /// Mirrors pending stat changes of one entity into facts and observers.
    /// Returns true if any stat value moved.
    fn flush_stats(&mut self, entity: EntityRef) -> bool {
        let Some(target) = self.entity_mut(entity) else {
            return false;
        };
        let changes = target.stats_mut().drain_changes();
        if changes.is_empty() {
            return false;
        }
        let paths: Vec<String> = changes
            .iter()
            .map(|c| target.stat_fact_path(&c.stat))
            .collect();
        let label = self.entity_id(entity);

        for (change, path) in changes.into_iter().zip(paths) {
            if self.config.write_stat_facts {
                let fact = facts::with_value(&path, change.value);
                tracing::trace!(fact = %fact, "Writing stat fact");
                self.facts.insert(&fact);
            }
            if let Some(entity) = label.clone() {
                self.emit(GraphEvent::StatChanged {
                    entity,
                    stat: change.stat,
                    value: change.value,
                });
            }
        }
        true
    }

    /// Role bindings for effects attached through a trait on `entity`.
    fn trait_bindings(&self, entity: EntityRef) -> facts::Bindings {
        let mut bindings = facts::Bindings::new();
        match entity {
            EntityRef::Agent(key) => {
                if let Some(agent) = self.agents.get(&key) {
                    bindings.insert("owner".into(), agent.id().to_string());
                }
            }
            EntityRef::Relationship(key) => {
                if let Some(rel) = self.relationships.get(&key) {
                    bindings.insert("owner".into(), rel.owner_id().to_string());
                    bindings.insert("other".into(), rel.target_id().to_string());
                    bindings.insert("target".into(), rel.target_id().to_string());
                }
            }
        }
        bindings
    }
}

impl EffectTargets for SocialGraph {
    fn agent(&self, id: &str) -> Option<AgentKey> {
        self.agent_ids.get(id).copied()
    }

    fn relationship(&self, owner: &str, target: &str) -> Option<RelationshipKey> {
        self.relationship_key(owner, target)
    }

    fn trait_kind(&self, trait_id: &str) -> Option<AppliesTo> {
        self.traits.get(trait_id).map(|t| t.applies_to())
    }

    fn has_stat(&self, entity: EntityRef, stat: &str) -> bool {
        self.entity(entity)
            .map_or(false, |e| e.stats().has_stat(stat))
    }
}

/// Expected attachment kind for an entity.
fn kind_of(entity: EntityRef) -> AppliesTo {
    match entity {
        EntityRef::Agent(_) => AppliesTo::Agent,
        EntityRef::Relationship(_) => AppliesTo::Relationship,
    }
}

/// Registered trait or an error naming it.
fn lookup_trait(registry: &TraitRegistry, trait_id: &str) -> Result<Arc<Trait>, GraphError> {
    registry
        .get(trait_id)
        .cloned()
        .ok_or_else(|| GraphError::UnknownTrait(trait_id.to_string()))
}

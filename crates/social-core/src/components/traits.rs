//! Trait Components
//!
//! Registered trait flyweights and the per-entity set of attached trait
//! instances.

use social_defs::{AppliesTo, StatModifierDefinition, TraitDefinition};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::rules::SocialRule;
use super::stat::SourceId;
use crate::effects::Effect;
use crate::facts::QueryError;

/// A registered trait: the definition plus its parsed social rules
#[derive(Debug, Clone)]
pub struct Trait {
    definition: TraitDefinition,
    rules: Vec<Arc<SocialRule>>,
}

impl Trait {
    /// Parses the rule preconditions of a definition.
    pub fn from_definition(definition: TraitDefinition) -> Result<Self, QueryError> {
        let rules = definition
            .social_rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let default_id = format!("{}#{}", definition.id, index);
                SocialRule::from_definition(rule, default_id).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { definition, rules })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn applies_to(&self) -> AppliesTo {
        self.definition.applies_to
    }

    pub fn display_name(&self) -> &str {
        &self.definition.display_name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn effects(&self) -> &[String] {
        &self.definition.effects
    }

    pub fn rules(&self) -> &[Arc<SocialRule>] {
        &self.rules
    }

    pub fn conflicts(&self) -> &[String] {
        &self.definition.conflicts
    }

    pub fn stat_modifiers(&self) -> &[StatModifierDefinition] {
        &self.definition.stat_modifiers
    }

    pub fn definition(&self) -> &TraitDefinition {
        &self.definition
    }

    /// Conflicts are symmetric: either side listing the other is enough.
    pub fn conflicts_with(&self, other: &Trait) -> bool {
        self.conflicts().iter().any(|id| id == other.id())
            || other.conflicts().iter().any(|id| id == self.id())
    }

    /// Lifetime of an instance added without an explicit duration.
    ///
    /// A trait made only of timed effects lives as long as its longest effect;
    /// anything carrying rules, stat modifiers or an untimed effect is indefinite.
    pub fn inherited_duration(&self, effects: &[Effect]) -> Option<u32> {
        if effects.is_empty() || !self.rules.is_empty() || !self.stat_modifiers().is_empty() {
            return None;
        }
        effects
            .iter()
            .map(Effect::duration)
            .collect::<Option<Vec<u32>>>()
            .and_then(|durations| durations.into_iter().max())
    }
}

/// Registered traits keyed by id
#[derive(Debug, Clone, Default)]
pub struct TraitRegistry {
    traits: BTreeMap<String, Arc<Trait>>,
}

impl TraitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing any trait with the same id.
    pub fn register(&mut self, definition: TraitDefinition) -> Result<Arc<Trait>, QueryError> {
        let flyweight = Arc::new(Trait::from_definition(definition)?);
        self.traits
            .insert(flyweight.id().to_string(), Arc::clone(&flyweight));
        Ok(flyweight)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Trait>> {
        self.traits.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.traits.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Trait>> {
        self.traits.values()
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }
}

/// A trait attached to one entity
#[derive(Debug, Clone)]
pub struct TraitInstance {
    definition: Arc<Trait>,
    source: SourceId,
    description: String,
    pub(crate) effects: Vec<Effect>,
    /// Ticks left (`None` = indefinite)
    remaining: Option<u32>,
}

impl TraitInstance {
    pub fn new(
        definition: Arc<Trait>,
        source: SourceId,
        description: impl Into<String>,
        remaining: Option<u32>,
    ) -> Self {
        Self {
            definition,
            source,
            description: description.into(),
            effects: Vec::new(),
            remaining,
        }
    }

    pub fn id(&self) -> &str {
        self.definition.id()
    }

    pub fn definition(&self) -> &Arc<Trait> {
        &self.definition
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Description with roles filled in.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }
}

/// The traits attached to one entity, in attach order
#[derive(Debug, Clone, Default)]
pub struct TraitManager {
    instances: Vec<TraitInstance>,
}

impl TraitManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_trait(&self, id: &str) -> bool {
        self.instances.iter().any(|i| i.id() == id)
    }

    pub fn get_trait(&self, id: &str) -> Option<&TraitInstance> {
        self.instances.iter().find(|i| i.id() == id)
    }

    pub(crate) fn get_trait_mut(&mut self, id: &str) -> Option<&mut TraitInstance> {
        self.instances.iter_mut().find(|i| i.id() == id)
    }

    /// Whether any attached trait conflicts with `candidate`.
    pub fn has_conflicting_trait(&self, candidate: &Trait) -> bool {
        self.instances
            .iter()
            .any(|i| i.definition().conflicts_with(candidate))
    }

    /// Stores the instance unless its id is already attached or it conflicts
    /// with an attached trait.
    pub fn add_trait(&mut self, instance: TraitInstance) -> bool {
        if self.has_trait(instance.id()) || self.has_conflicting_trait(instance.definition()) {
            return false;
        }
        self.instances.push(instance);
        true
    }

    pub fn remove_trait(&mut self, id: &str) -> Option<TraitInstance> {
        let index = self.instances.iter().position(|i| i.id() == id)?;
        Some(self.instances.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraitInstance> {
        self.instances.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.instances.iter().map(|i| i.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Counts down timed instances. Returns the ids that reached zero; the
    /// caller removes them so their effects are undone.
    pub fn tick(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        for instance in self.instances.iter_mut() {
            if let Some(remaining) = instance.remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    expired.push(instance.id().to_string());
                }
            }
        }
        expired
    }
}

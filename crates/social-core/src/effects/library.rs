//! Effect Factory Library
//!
//! Maps effect names to factories that validate arguments and build typed
//! effects. The built-in set covers trait attachment and stat modifiers; hosts
//! register extra factories under new names.

use social_defs::{AppliesTo, ModifierKind};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{BindingContext, Effect, EffectError};
use crate::components::{AgentKey, EntityRef, RelationshipKey, SourceId, StatModifier};

/// What a factory may look up while validating arguments
pub trait EffectTargets {
    fn agent(&self, id: &str) -> Option<AgentKey>;
    fn relationship(&self, owner: &str, target: &str) -> Option<RelationshipKey>;
    /// Entity kind a registered trait attaches to
    fn trait_kind(&self, trait_id: &str) -> Option<AppliesTo>;
    fn has_stat(&self, entity: EntityRef, stat: &str) -> bool;
}

/// Builds an effect from its name and resolved arguments
pub type EffectFactory = Arc<
    dyn Fn(&str, &[String], &dyn EffectTargets, SourceId) -> Result<Effect, EffectError>
        + Send
        + Sync,
>;

/// Name -> factory registry
#[derive(Clone)]
pub struct EffectLibrary {
    factories: BTreeMap<String, EffectFactory>,
}

impl std::fmt::Debug for EffectLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectLibrary")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for EffectLibrary {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl EffectLibrary {
    /// A library with no factories.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// A library with the built-in trait and stat factories.
    pub fn with_builtins() -> Self {
        let mut library = Self::empty();
        library.register("AddAgentTrait", add_agent_trait);
        library.register("RemoveAgentTrait", remove_agent_trait);
        library.register("AddRelationshipTrait", add_relationship_trait);
        library.register("RemoveRelationshipTrait", remove_relationship_trait);
        library.register("IncreaseAgentStat", |name, args, targets, source| {
            agent_stat(name, args, targets, source, 1.0)
        });
        library.register("DecreaseAgentStat", |name, args, targets, source| {
            agent_stat(name, args, targets, source, -1.0)
        });
        library.register("IncreaseRelationshipStat", |name, args, targets, source| {
            relationship_stat(name, args, targets, source, 1.0)
        });
        library.register("DecreaseRelationshipStat", |name, args, targets, source| {
            relationship_stat(name, args, targets, source, -1.0)
        });
        library
    }

    /// Registers a factory, replacing any factory with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&str, &[String], &dyn EffectTargets, SourceId) -> Result<Effect, EffectError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Parses one effect string, resolving `?role` arguments through `ctx`.
    pub fn create_instance(
        &self,
        ctx: &BindingContext,
        text: &str,
        targets: &dyn EffectTargets,
        source: SourceId,
    ) -> Result<Effect, EffectError> {
        let mut tokens = text.split_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| EffectError::UnknownEffect(String::new()))?;
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| EffectError::UnknownEffect(name.to_string()))?;
        let args = tokens
            .map(|token| ctx.resolve(token))
            .collect::<Result<Vec<_>, _>>()?;
        factory(name, &args, targets, source)
    }
}

fn exact_args(effect: &str, args: &[String], arity: usize) -> Result<(), EffectError> {
    if args.len() != arity {
        return Err(EffectError::ArgumentCount {
            effect: effect.to_string(),
            expected: arity,
            actual: args.len(),
        });
    }
    Ok(())
}

/// Accepts `arity` arguments plus an optional trailing duration.
fn args_with_duration(effect: &str, args: &[String], arity: usize) -> Result<Option<u32>, EffectError> {
    match args.len() {
        n if n == arity => Ok(None),
        n if n == arity + 1 => parse_duration(effect, &args[arity]),
        actual => Err(EffectError::ArgumentCount {
            effect: effect.to_string(),
            expected: arity,
            actual,
        }),
    }
}

/// `-1` means indefinite.
fn parse_duration(effect: &str, value: &str) -> Result<Option<u32>, EffectError> {
    if value == "-1" {
        return Ok(None);
    }
    let format_error = |reason: &str| EffectError::ArgumentFormat {
        effect: effect.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    match value.parse::<u32>() {
        Ok(0) => Err(format_error("duration must be positive")),
        Ok(ticks) => Ok(Some(ticks)),
        Err(_) => Err(format_error("duration must be a whole number of ticks")),
    }
}

fn parse_amount(effect: &str, value: &str) -> Result<f64, EffectError> {
    match value.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(EffectError::ArgumentFormat {
            effect: effect.to_string(),
            value: value.to_string(),
            reason: "amount must be a finite number".to_string(),
        }),
    }
}

fn agent_ref(targets: &dyn EffectTargets, id: &str) -> Result<EntityRef, EffectError> {
    targets
        .agent(id)
        .map(EntityRef::Agent)
        .ok_or_else(|| EffectError::UnknownEntity(id.to_string()))
}

fn relationship_ref(
    targets: &dyn EffectTargets,
    owner: &str,
    target: &str,
) -> Result<EntityRef, EffectError> {
    targets
        .relationship(owner, target)
        .map(EntityRef::Relationship)
        .ok_or_else(|| EffectError::UnknownEntity(format!("{}->{}", owner, target)))
}

fn checked_trait(
    targets: &dyn EffectTargets,
    trait_id: &str,
    expected: AppliesTo,
) -> Result<String, EffectError> {
    match targets.trait_kind(trait_id) {
        None => Err(EffectError::UnknownTrait(trait_id.to_string())),
        Some(kind) if kind != expected => Err(EffectError::TraitTypeMismatch {
            trait_id: trait_id.to_string(),
            expected,
        }),
        Some(_) => Ok(trait_id.to_string()),
    }
}

fn checked_stat(
    targets: &dyn EffectTargets,
    entity: EntityRef,
    label: String,
    stat: &str,
) -> Result<String, EffectError> {
    if !targets.has_stat(entity, stat) {
        return Err(EffectError::UnknownStat {
            entity: label,
            stat: stat.to_string(),
        });
    }
    Ok(stat.to_string())
}

fn add_agent_trait(
    name: &str,
    args: &[String],
    targets: &dyn EffectTargets,
    _source: SourceId,
) -> Result<Effect, EffectError> {
    let duration = args_with_duration(name, args, 2)?;
    let agent = agent_ref(targets, &args[0])?;
    let trait_id = checked_trait(targets, &args[1], AppliesTo::Agent)?;
    Ok(Effect::add_trait(agent, trait_id, duration))
}

fn remove_agent_trait(
    name: &str,
    args: &[String],
    targets: &dyn EffectTargets,
    _source: SourceId,
) -> Result<Effect, EffectError> {
    exact_args(name, args, 2)?;
    let agent = agent_ref(targets, &args[0])?;
    let trait_id = checked_trait(targets, &args[1], AppliesTo::Agent)?;
    Ok(Effect::remove_trait(agent, trait_id))
}

fn add_relationship_trait(
    name: &str,
    args: &[String],
    targets: &dyn EffectTargets,
    _source: SourceId,
) -> Result<Effect, EffectError> {
    let duration = args_with_duration(name, args, 3)?;
    let relationship = relationship_ref(targets, &args[0], &args[1])?;
    let trait_id = checked_trait(targets, &args[2], AppliesTo::Relationship)?;
    Ok(Effect::add_trait(relationship, trait_id, duration))
}

fn remove_relationship_trait(
    name: &str,
    args: &[String],
    targets: &dyn EffectTargets,
    _source: SourceId,
) -> Result<Effect, EffectError> {
    exact_args(name, args, 3)?;
    let relationship = relationship_ref(targets, &args[0], &args[1])?;
    let trait_id = checked_trait(targets, &args[2], AppliesTo::Relationship)?;
    Ok(Effect::remove_trait(relationship, trait_id))
}

fn agent_stat(
    name: &str,
    args: &[String],
    targets: &dyn EffectTargets,
    source: SourceId,
    sign: f64,
) -> Result<Effect, EffectError> {
    let duration = args_with_duration(name, args, 3)?;
    let agent = agent_ref(targets, &args[0])?;
    let stat = checked_stat(targets, agent, args[0].clone(), &args[1])?;
    let amount = parse_amount(name, &args[2])?;
    let modifier = StatModifier::new(sign * amount, ModifierKind::Flat, source).with_duration(duration);
    Ok(Effect::modify_stat(agent, stat, modifier))
}

fn relationship_stat(
    name: &str,
    args: &[String],
    targets: &dyn EffectTargets,
    source: SourceId,
    sign: f64,
) -> Result<Effect, EffectError> {
    let duration = args_with_duration(name, args, 4)?;
    let relationship = relationship_ref(targets, &args[0], &args[1])?;
    let label = format!("{}->{}", args[0], args[1]);
    let stat = checked_stat(targets, relationship, label, &args[2])?;
    let amount = parse_amount(name, &args[3])?;
    let modifier = StatModifier::new(sign * amount, ModifierKind::Flat, source).with_duration(duration);
    Ok(Effect::modify_stat(relationship, stat, modifier))
}

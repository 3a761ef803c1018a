//! Trait attachment and effect application.

use social_defs::StatModifierDefinition;

use super::{kind_of, lookup_trait, Propagation, SocialGraph};
use crate::components::{EntityRef, RuleSource, SocialEntity, SourceId, StatModifier, TraitInstance};
use crate::effects::{BindingContext, Effect, EffectTargets};
use crate::error::GraphError;
use crate::observer::GraphEvent;

impl SocialGraph {
    /// Attaches a trait to an agent. Returns false if the agent already has it
    /// or holds a conflicting trait.
    pub fn add_agent_trait(&mut self, id: &str, trait_id: &str, duration: Option<u32>) -> Result<bool, GraphError> {
        let key = self.agent_key(id)?;
        self.add_trait_internal(EntityRef::Agent(key), trait_id, duration, Propagation::Around)
    }

    /// Returns false if the agent does not have the trait.
    pub fn remove_agent_trait(&mut self, id: &str, trait_id: &str) -> Result<bool, GraphError> {
        let key = self.agent_key(id)?;
        self.remove_trait_internal(EntityRef::Agent(key), trait_id, Propagation::Around)
    }

    pub fn add_relationship_trait(
        &mut self,
        owner: &str,
        target: &str,
        trait_id: &str,
        duration: Option<u32>,
    ) -> Result<bool, GraphError> {
        let key = self.existing_relationship(owner, target)?;
        self.add_trait_internal(EntityRef::Relationship(key), trait_id, duration, Propagation::Around)
    }

    pub fn remove_relationship_trait(&mut self, owner: &str, target: &str, trait_id: &str) -> Result<bool, GraphError> {
        let key = self.existing_relationship(owner, target)?;
        self.remove_trait_internal(EntityRef::Relationship(key), trait_id, Propagation::Around)
    }

    pub(super) fn add_trait_internal(
        &mut self,
        entity: EntityRef,
        trait_id: &str,
        duration: Option<u32>,
        propagation: Propagation,
    ) -> Result<bool, GraphError> {
        let definition = lookup_trait(&self.traits, trait_id)?;
        if definition.applies_to() != kind_of(entity) {
            return Err(GraphError::TraitTypeMismatch {
                trait_id: trait_id.to_string(),
                expected: kind_of(entity),
            });
        }
        let Some(target) = self.entity(entity) else {
            return Ok(false);
        };
        if target.traits().has_trait(trait_id) || target.traits().has_conflicting_trait(&definition) {
            tracing::debug!(entity = %target.fact_path(), trait_id, "Trait rejected");
            return Ok(false);
        }

        let source = self.next_source();
        let ctx = BindingContext::new(self.trait_bindings(entity));
        let targets: &dyn EffectTargets = &*self;
        let effects = definition
            .effects()
            .iter()
            .map(|text| self.effects.create_instance(&ctx, text, targets, source))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| GraphError::effect(trait_id, error))?;

        let remaining = duration.or_else(|| definition.inherited_duration(&effects));
        let instance = TraitInstance::new(
            definition.clone(),
            source,
            ctx.describe(definition.description()),
            remaining,
        );
        let Some(target) = self.entity_mut(entity) else {
            return Ok(false);
        };
        if !target.traits_mut().add_trait(instance) {
            return Ok(false);
        }
        let fact = target.trait_fact_path(trait_id);
        for shortcut in definition.stat_modifiers() {
            add_shortcut(target, shortcut, source);
        }
        self.facts.insert(&fact);
        self.flush_stats(entity);

        let applied = match self.apply_all(effects, Propagation::OwnRulesOnly) {
            Ok(applied) => applied,
            Err(err) => {
                self.discard_instance(entity, trait_id);
                return Err(err);
            }
        };
        if let Some(instance) = self
            .entity_mut(entity)
            .and_then(|e| e.traits_mut().get_trait_mut(trait_id))
        {
            instance.effects = applied;
        }

        if !definition.rules().is_empty() {
            self.rules.add_source(RuleSource {
                source,
                holder: entity,
                rules: definition.rules().to_vec(),
            });
            if let Some(holder) = self.entity_mut(entity) {
                holder.rule_sources_mut().push(source);
            }
        }

        tracing::debug!(fact = %fact, ?remaining, "Added trait");
        if let Some(label) = self.entity_id(entity) {
            self.emit(GraphEvent::TraitAdded {
                entity: label,
                trait_id: trait_id.to_string(),
            });
        }

        match propagation {
            Propagation::Around => self.propagate_around(entity)?,
            Propagation::OwnRulesOnly if !definition.rules().is_empty() => {
                self.reevaluate_source(source, None)?
            }
            Propagation::OwnRulesOnly => {}
        }
        Ok(true)
    }

    /// Detaches a trait, undoing its effects and every rule instance it
    /// sourced. Returns false if the trait is not attached.
    pub(super) fn remove_trait_internal(
        &mut self,
        entity: EntityRef,
        trait_id: &str,
        propagation: Propagation,
    ) -> Result<bool, GraphError> {
        let Some(target) = self.entity_mut(entity) else {
            return Ok(false);
        };
        let Some(instance) = target.traits_mut().remove_trait(trait_id) else {
            return Ok(false);
        };
        let fact = target.trait_fact_path(trait_id);

        let mut result = self.undo_all(instance.effects());
        if let Some(target) = self.entity_mut(entity) {
            target.stats_mut().remove_modifiers_from_source(instance.source());
        }
        self.flush_stats(entity);
        self.facts.delete(&fact);
        if let Err(err) = self.remove_rule_source(instance.source()) {
            result = result.and(Err(err));
        }

        tracing::debug!(fact = %fact, "Removed trait");
        if let Some(label) = self.entity_id(entity) {
            self.emit(GraphEvent::TraitRemoved {
                entity: label,
                trait_id: trait_id.to_string(),
            });
        }
        result?;

        if propagation == Propagation::Around {
            self.propagate_around(entity)?;
        }
        Ok(true)
    }

    /// Drops a half-attached instance after one of its effects failed.
    fn discard_instance(&mut self, entity: EntityRef, trait_id: &str) {
        let Some(target) = self.entity_mut(entity) else {
            return;
        };
        if let Some(instance) = target.traits_mut().remove_trait(trait_id) {
            target.stats_mut().remove_modifiers_from_source(instance.source());
            let fact = target.trait_fact_path(trait_id);
            self.facts.delete(&fact);
            self.flush_stats(entity);
        }
    }

    /// Applies one effect. Stat effects re-evaluate around their target when
    /// `propagation` is `Around`.
    pub(super) fn apply_effect(&mut self, effect: &mut Effect, propagation: Propagation) -> Result<(), GraphError> {
        match effect {
            Effect::AddTrait {
                target,
                trait_id,
                duration,
                added,
            } => {
                *added = self.add_trait_internal(*target, trait_id, *duration, propagation)?;
            }
            Effect::RemoveTrait {
                target,
                trait_id,
                removed,
            } => {
                let trait_id = trait_id.clone();
                let remaining = self
                    .entity(*target)
                    .and_then(|e| e.traits().get_trait(&trait_id))
                    .map(|t| t.remaining());
                if let Some(remaining) = remaining {
                    if self.remove_trait_internal(*target, &trait_id, propagation)? {
                        *removed = Some(remaining);
                    }
                }
            }
            Effect::ModifyStat {
                target,
                stat,
                modifier,
            } => {
                let Some(entity) = self.entity_mut(*target) else {
                    tracing::debug!(stat = %stat, "Stat effect on a removed entity");
                    return Ok(());
                };
                if !entity.stats_mut().add_modifier(stat, modifier.clone()) {
                    tracing::warn!(stat = %stat, entity = %entity.fact_path(), "Stat effect on a missing stat");
                    return Ok(());
                }
                if self.flush_stats(*target) && propagation == Propagation::Around {
                    self.propagate_around(*target)?;
                }
            }
            Effect::Batch(effects) => {
                for effect in effects.iter_mut() {
                    self.apply_effect(effect, propagation)?;
                }
            }
        }
        Ok(())
    }

    /// Reverts an applied effect. Effects on removed entities are no-ops.
    pub(super) fn undo_effect(&mut self, effect: &Effect) -> Result<(), GraphError> {
        match effect {
            Effect::AddTrait {
                target,
                trait_id,
                added: true,
                ..
            } => {
                self.remove_trait_internal(*target, trait_id, Propagation::OwnRulesOnly)?;
            }
            Effect::RemoveTrait {
                target,
                trait_id,
                removed: Some(remaining),
            } => {
                self.add_trait_internal(*target, trait_id, *remaining, Propagation::OwnRulesOnly)?;
            }
            Effect::ModifyStat {
                target,
                stat,
                modifier,
            } => {
                if let Some(entity) = self.entity_mut(*target) {
                    entity
                        .stats_mut()
                        .remove_modifiers_from_source_on(stat, modifier.source);
                    self.flush_stats(*target);
                }
            }
            Effect::Batch(effects) => self.undo_all(effects)?,
            Effect::AddTrait { .. } | Effect::RemoveTrait { .. } => {}
        }
        Ok(())
    }
}

fn add_shortcut(target: &mut dyn SocialEntity, shortcut: &StatModifierDefinition, source: SourceId) {
    let mut modifier = StatModifier::new(shortcut.value, shortcut.kind, source);
    if let Some(order) = shortcut.order {
        modifier = modifier.with_order(order);
    }
    if !target.stats_mut().add_modifier(&shortcut.stat, modifier) {
        tracing::warn!(stat = %shortcut.stat, entity = %target.fact_path(), "Trait modifier on a missing stat");
    }
}

//! Social rule propagation.
//!
//! A rule instance exists for (rule, owner, other) exactly while the rule's
//! precondition holds for that relationship. When several sources hold the
//! same rule, the first one evaluated owns the instance. Re-evaluation is a single
//! pass over the rule sources touching a set of relationships: missing
//! instances whose precondition now holds are created, existing instances whose
//! precondition fails are removed. Effects applied by an instance never trigger
//! another pass.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::{Propagation, SocialGraph};
use crate::components::{
    EntityRef, RelationshipKey, RuleInstanceKey, SocialEntity, SocialRule, SocialRuleInstance,
    SourceId,
};
use crate::effects::{BindingContext, Effect, EffectTargets};
use crate::error::GraphError;
use crate::facts::Bindings;
use crate::observer::GraphEvent;

impl SocialGraph {
    /// Re-checks every rule against every relationship.
    pub fn reevaluate(&mut self) -> Result<(), GraphError> {
        let edges: Vec<RelationshipKey> = self.relationships.keys().copied().collect();
        self.reevaluate_edges(&edges)
    }

    /// Re-evaluates around a mutated entity: every relationship touching an
    /// agent, or every relationship touching either end of a relationship.
    pub(super) fn propagate_around(&mut self, entity: EntityRef) -> Result<(), GraphError> {
        let agents = match entity {
            EntityRef::Agent(key) => vec![key],
            EntityRef::Relationship(key) => match self.relationships.get(&key) {
                Some(rel) => vec![rel.owner(), rel.target()],
                None => return Ok(()),
            },
        };
        let edges = self.edges_around_agents(&agents);
        self.reevaluate_edges(&edges)
    }

    /// Evaluates, restricted to `edges`, every rule source held by an edge or
    /// by either of its endpoints.
    pub(super) fn reevaluate_edges(&mut self, edges: &[RelationshipKey]) -> Result<(), GraphError> {
        let mut sources = BTreeSet::new();
        for edge in edges {
            let Some(rel) = self.relationships.get(edge) else {
                continue;
            };
            sources.extend(rel.rule_sources().iter().copied());
            for end in [rel.owner(), rel.target()] {
                if let Some(agent) = self.agents.get(&end) {
                    sources.extend(agent.rule_sources().iter().copied());
                }
            }
        }
        let scope: BTreeSet<RelationshipKey> = edges.iter().copied().collect();
        for source in sources {
            self.reevaluate_source(source, Some(&scope))?;
        }
        Ok(())
    }

    /// Evaluates the rules of one source over the relationships it can see,
    /// optionally restricted to `scope`.
    pub(super) fn reevaluate_source(
        &mut self,
        source: SourceId,
        scope: Option<&BTreeSet<RelationshipKey>>,
    ) -> Result<(), GraphError> {
        let Some(rule_source) = self.rules.source(source).cloned() else {
            return Ok(());
        };

        let mut candidates: Vec<(Arc<SocialRule>, RelationshipKey)> = Vec::new();
        for rule in &rule_source.rules {
            match rule_source.holder {
                EntityRef::Relationship(edge) => candidates.push((Arc::clone(rule), edge)),
                EntityRef::Agent(holder) => {
                    let Some(agent) = self.agents.get(&holder) else {
                        continue;
                    };
                    if rule.direction().includes_outgoing() {
                        candidates.extend(agent.outgoing().map(|(_, edge)| (Arc::clone(rule), edge)));
                    }
                    if rule.direction().includes_incoming() {
                        candidates.extend(agent.incoming().map(|(_, edge)| (Arc::clone(rule), edge)));
                    }
                }
            }
        }

        for (rule, edge) in candidates {
            if scope.map_or(false, |s| !s.contains(&edge)) {
                continue;
            }
            let Some(rel) = self.relationships.get(&edge) else {
                continue;
            };
            let key = RuleInstanceKey {
                source,
                rule: rule.id().to_string(),
                owner: rel.owner(),
                other: rel.target(),
            };
            let mut seed = Bindings::new();
            seed.insert("owner".into(), rel.owner_id().to_string());
            seed.insert("other".into(), rel.target_id().to_string());

            let result = rule.query().run(self.facts.as_ref(), &seed);
            let exists = self.rules.contains(&key);
            match result.bindings.into_iter().next() {
                // another holder already carries this rule for the pair
                Some(_) if !exists && self.rules.has_instance(rule.id(), key.owner, key.other) => {}
                Some(bindings) if !exists => self.instantiate_rule(key, rule, bindings)?,
                None if exists => self.remove_rule_instance(&key)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn instantiate_rule(
        &mut self,
        key: RuleInstanceKey,
        rule: Arc<SocialRule>,
        bindings: Bindings,
    ) -> Result<(), GraphError> {
        let instance_source = self.next_source();
        let ctx = BindingContext::new(bindings);
        let targets: &dyn EffectTargets = &*self;
        let effects = rule
            .effects()
            .iter()
            .map(|text| self.effects.create_instance(&ctx, text, targets, instance_source))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| GraphError::effect(rule.id(), error))?;

        let owner = ctx.get("owner").unwrap_or_default().to_string();
        let other = ctx.get("other").unwrap_or_default().to_string();
        let description = ctx.describe(rule.description());
        let instance = SocialRuleInstance::new(
            Arc::clone(&rule),
            instance_source,
            ctx.bindings().clone(),
            description,
        );
        if !self.rules.insert(key.clone(), instance) {
            return Ok(());
        }

        let applied = match self.apply_all(effects, Propagation::OwnRulesOnly) {
            Ok(applied) => applied,
            Err(err) => {
                self.rules.remove(&key);
                return Err(err);
            }
        };
        if let Some(instance) = self.rules.get_mut(&key) {
            instance.effects = applied;
        }

        tracing::debug!(rule = %rule.id(), owner = %owner, other = %other, "Instantiated social rule");
        self.emit(GraphEvent::RuleInstantiated {
            rule: rule.id().to_string(),
            owner,
            other,
        });
        Ok(())
    }

    /// Undoes an instance's effects and discards it.
    pub(super) fn remove_rule_instance(&mut self, key: &RuleInstanceKey) -> Result<(), GraphError> {
        let Some(instance) = self.rules.remove(key) else {
            return Ok(());
        };
        let result = self.undo_all(instance.effects());

        let owner = instance.bindings().get("owner").cloned().unwrap_or_default();
        let other = instance.bindings().get("other").cloned().unwrap_or_default();
        tracing::debug!(rule = %instance.rule_id(), owner = %owner, other = %other, "Removed social rule instance");
        self.emit(GraphEvent::RuleRemoved {
            rule: instance.rule_id().to_string(),
            owner,
            other,
        });
        result
    }

    /// Removes every instance created from `source`, then the source itself.
    /// The pairs those instances covered are re-evaluated so another holder of
    /// the same rule can take over.
    pub(super) fn remove_rule_source(&mut self, source: SourceId) -> Result<(), GraphError> {
        let mut result = Ok(());
        let mut edges = Vec::new();
        for key in self.rules.keys_for_source(source) {
            if let Some(edge) = self.relationship_index.get(&(key.owner, key.other)) {
                edges.push(*edge);
            }
            if let Err(err) = self.remove_rule_instance(&key) {
                result = result.and(Err(err));
            }
        }
        if let Some(rule_source) = self.rules.remove_source(source) {
            if let Some(holder) = self.entity_mut(rule_source.holder) {
                holder.rule_sources_mut().retain(|s| *s != source);
            }
        }
        result?;

        edges.sort();
        edges.dedup();
        self.reevaluate_edges(&edges)
    }

    /// Applies effects in order. On failure the effects applied so far are
    /// undone and the error returned.
    pub(super) fn apply_all(
        &mut self,
        effects: Vec<Effect>,
        propagation: Propagation,
    ) -> Result<Vec<Effect>, GraphError> {
        let mut applied = Vec::with_capacity(effects.len());
        for mut effect in effects {
            if let Err(err) = self.apply_effect(&mut effect, propagation) {
                let _ = self.undo_all(&applied);
                return Err(err);
            }
            applied.push(effect);
        }
        Ok(applied)
    }

    /// Undoes effects in reverse order. Every effect is attempted; the first
    /// failure is returned.
    pub(super) fn undo_all(&mut self, effects: &[Effect]) -> Result<(), GraphError> {
        let mut result = Ok(());
        for effect in effects.iter().rev() {
            if let Err(err) = self.undo_effect(effect) {
                tracing::error!(error = %err, "Failed to undo effect");
                result = result.and(Err(err));
            }
        }
        result
    }
}

//! Snapshot export and import.
//!
//! Only state that content cannot rebuild is exported: attached traits that
//! nothing else attached, stat bases, and modifiers owned by no live trait or
//! rule instance. Import re-attaches the traits and lets rules re-derive the rest.

use social_defs::{
    AgentSnapshot, GraphSnapshot, ModifierSnapshot, RelationshipSnapshot, StatSnapshot,
    TraitSnapshot,
};
use std::collections::BTreeSet;

use super::{Propagation, SocialGraph};
use crate::components::{EntityRef, SocialEntity, SourceId, StatManager, StatModifier};
use crate::effects::Effect;
use crate::error::GraphError;

impl SocialGraph {
    /// Captures agents and relationships in registration order.
    pub fn export_snapshot(&self) -> GraphSnapshot {
        let live = self.live_sources();
        let derived = self.derived_traits();

        let mut snapshot = GraphSnapshot::new();
        for (key, agent) in &self.agents {
            snapshot.agents.push(AgentSnapshot {
                uid: agent.id().to_string(),
                agent_type: agent.agent_type().to_string(),
                traits: export_traits(agent, EntityRef::Agent(*key), &derived),
                stats: export_stats(agent.stats(), &live),
            });
        }
        for (key, relationship) in &self.relationships {
            snapshot.relationships.push(RelationshipSnapshot {
                owner: relationship.owner_id().to_string(),
                target: relationship.target_id().to_string(),
                traits: export_traits(relationship, EntityRef::Relationship(*key), &derived),
                stats: export_stats(relationship.stats(), &live),
            });
        }
        tracing::info!(
            agents = snapshot.agents.len(),
            relationships = snapshot.relationships.len(),
            "Exported snapshot"
        );
        snapshot
    }

    /// Rebuilds a snapshot into this graph, which must have no agents yet.
    /// Traits that are no longer registered are skipped with a warning.
    pub fn import_snapshot(&mut self, snapshot: &GraphSnapshot) -> Result<(), GraphError> {
        snapshot.check_version()?;
        if !self.agents.is_empty() {
            return Err(GraphError::Unexpected(
                "snapshots can only be imported into an empty graph".into(),
            ));
        }

        self.check_snapshot(snapshot)?;

        for agent in &snapshot.agents {
            let schema = self.agent_schema(&agent.agent_type)?;
            let key = self.spawn_agent(&schema, &agent.uid);
            self.restore_bases(EntityRef::Agent(key), &agent.stats);
        }

        let mut edges = Vec::with_capacity(snapshot.relationships.len());
        for relationship in &snapshot.relationships {
            let owner = self.agent_key(&relationship.owner)?;
            let target = self.agent_key(&relationship.target)?;
            let key = match self.relationship_index.get(&(owner, target)) {
                Some(existing) => *existing,
                None => {
                    let schema = self.relationship_schema(owner, target)?;
                    self.link(owner, target, &schema)
                }
            };
            self.restore_bases(EntityRef::Relationship(key), &relationship.stats);
            edges.push(key);
        }

        let agents: Vec<_> = self.agents.keys().copied().collect();
        for (key, agent) in agents.iter().zip(&snapshot.agents) {
            self.restore_traits(EntityRef::Agent(*key), &agent.traits)?;
        }
        for (key, relationship) in edges.iter().zip(&snapshot.relationships) {
            self.restore_traits(EntityRef::Relationship(*key), &relationship.traits)?;
        }

        let restored = self.next_source();
        for (key, agent) in agents.iter().zip(&snapshot.agents) {
            self.restore_modifiers(EntityRef::Agent(*key), &agent.stats, restored);
        }
        for (key, relationship) in edges.iter().zip(&snapshot.relationships) {
            self.restore_modifiers(EntityRef::Relationship(*key), &relationship.stats, restored);
        }

        self.reevaluate()?;
        tracing::info!(
            agents = self.agents.len(),
            relationships = self.relationships.len(),
            rule_instances = self.rules.instance_count(),
            "Imported snapshot"
        );
        Ok(())
    }

    /// Rejects snapshots that would fail part way through, before anything
    /// is spawned.
    fn check_snapshot(&self, snapshot: &GraphSnapshot) -> Result<(), GraphError> {
        let mut uids = BTreeSet::new();
        for agent in &snapshot.agents {
            if !uids.insert(agent.uid.as_str()) {
                return Err(GraphError::DuplicateAgent(agent.uid.clone()));
            }
            self.agent_schema(&agent.agent_type)?;
        }
        for relationship in &snapshot.relationships {
            for end in [&relationship.owner, &relationship.target] {
                if !uids.contains(end.as_str()) {
                    return Err(GraphError::UnknownAgent(end.clone()));
                }
            }
        }
        Ok(())
    }

    fn restore_bases(&mut self, entity: EntityRef, stats: &[StatSnapshot]) {
        let Some(target) = self.entity_mut(entity) else {
            return;
        };
        for stat in stats {
            if !target.stats_mut().set_base(&stat.name, stat.base_value) {
                tracing::warn!(entity = %target.fact_path(), stat = %stat.name, "Snapshot stat not in schema");
            }
        }
        self.flush_stats(entity);
    }

    fn restore_traits(&mut self, entity: EntityRef, traits: &[TraitSnapshot]) -> Result<(), GraphError> {
        for snapshot in traits {
            if !self.traits.contains(&snapshot.id) {
                tracing::warn!(trait_id = %snapshot.id, "Snapshot trait is no longer registered");
                continue;
            }
            if !self.add_trait_internal(entity, &snapshot.id, snapshot.duration, Propagation::OwnRulesOnly)? {
                tracing::debug!(trait_id = %snapshot.id, "Snapshot trait already present");
            }
        }
        Ok(())
    }

    fn restore_modifiers(&mut self, entity: EntityRef, stats: &[StatSnapshot], source: SourceId) {
        let Some(target) = self.entity_mut(entity) else {
            return;
        };
        for stat in stats {
            for saved in &stat.modifiers {
                let modifier = StatModifier::new(saved.value, saved.kind, source)
                    .with_order(saved.order)
                    .with_duration(saved.duration);
                target.stats_mut().add_modifier(&stat.name, modifier);
            }
        }
        self.flush_stats(entity);
    }

    /// Sources of every attached trait instance and every rule instance.
    fn live_sources(&self) -> BTreeSet<SourceId> {
        let entities = self
            .agents
            .values()
            .map(|a| a as &dyn SocialEntity)
            .chain(self.relationships.values().map(|r| r as &dyn SocialEntity));
        let mut live: BTreeSet<SourceId> = entities
            .flat_map(|e| e.traits().iter().map(|t| t.source()).collect::<Vec<_>>())
            .collect();
        live.extend(self.rules.iter().map(|(_, instance)| instance.source()));
        live
    }

    /// Traits attached by an effect that a live trait or rule instance holds.
    fn derived_traits(&self) -> BTreeSet<(EntityRef, String)> {
        let mut derived = BTreeSet::new();
        let trait_effects = self
            .agents
            .values()
            .flat_map(|a| a.traits().iter())
            .chain(self.relationships.values().flat_map(|r| r.traits().iter()))
            .flat_map(|t| t.effects());
        let rule_effects = self.rules.iter().flat_map(|(_, instance)| instance.effects());
        for effect in trait_effects.chain(rule_effects) {
            collect_added(effect, &mut derived);
        }
        derived
    }
}

fn collect_added(effect: &Effect, out: &mut BTreeSet<(EntityRef, String)>) {
    match effect {
        Effect::AddTrait {
            target,
            trait_id,
            added: true,
            ..
        } => {
            out.insert((*target, trait_id.clone()));
        }
        Effect::Batch(effects) => {
            for effect in effects {
                collect_added(effect, out);
            }
        }
        _ => {}
    }
}

fn export_traits(
    entity: &dyn SocialEntity,
    key: EntityRef,
    derived: &BTreeSet<(EntityRef, String)>,
) -> Vec<TraitSnapshot> {
    entity
        .traits()
        .iter()
        .filter(|t| !derived.contains(&(key, t.id().to_string())))
        .map(|t| TraitSnapshot {
            id: t.id().to_string(),
            duration: t.remaining(),
        })
        .collect()
}

fn export_stats(stats: &StatManager, live: &BTreeSet<SourceId>) -> Vec<StatSnapshot> {
    stats
        .iter()
        .map(|stat| StatSnapshot {
            name: stat.name().to_string(),
            base_value: stat.base(),
            modifiers: stat
                .modifiers()
                .iter()
                .filter(|m| !live.contains(&m.source))
                .map(|m| ModifierSnapshot {
                    value: m.value,
                    order: m.order,
                    kind: m.kind,
                    duration: m.remaining,
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_graph;
    use super::*;
    use social_defs::FORMAT_VERSION;

    fn populated() -> SocialGraph {
        let mut graph = sample_graph();
        for id in ["liza", "zim", "jose"] {
            graph.add_agent("character", id).unwrap();
        }
        graph.add_relationship("liza", "zim").unwrap();
        graph.add_relationship("zim", "liza").unwrap();
        graph.add_relationship("liza", "jose").unwrap();
        graph.add_agent_trait("liza", "friendly", None).unwrap();
        graph.add_agent_trait("zim", "human", None).unwrap();
        graph.set_agent_stat_base("jose", "Energy", 14.0).unwrap();
        graph.dispatch_event("compliment", &["zim", "liza"]).unwrap();
        graph.dispatch_event("insult", &["jose", "liza"]).unwrap();
        graph
    }

    #[test]
    fn test_export_skips_derived_state() {
        let graph = populated();
        let snapshot = graph.export_snapshot();

        let liza = snapshot.agent("liza").unwrap();
        let ids: Vec<&str> = liza.traits.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["friendly", "recently-complimented"]);
        assert_eq!(liza.traits[1].duration, Some(3));

        // rule effects are rebuilt on import, only event modifiers persist
        let free = |owner: &str, target: &str| -> Vec<f64> {
            snapshot
                .relationship(owner, target)
                .unwrap()
                .stats
                .iter()
                .flat_map(|s| s.modifiers.iter().map(|m| m.value))
                .collect()
        };
        assert_eq!(free("zim", "liza"), Vec::<f64>::new());
        assert_eq!(free("liza", "zim"), vec![5.0]);
        assert_eq!(free("liza", "jose"), vec![-8.0]);
    }

    #[test]
    fn test_import_rebuilds_graph() {
        let original = populated();
        let snapshot = original.export_snapshot();

        let mut restored = sample_graph();
        restored.import_snapshot(&snapshot).unwrap();

        assert_eq!(restored.agent_count(), 3);
        assert_eq!(restored.relationship_count(), 3);
        for (owner, target) in [("liza", "zim"), ("zim", "liza"), ("liza", "jose")] {
            assert_eq!(
                restored.relationship_stat(owner, target, "Friendship"),
                original.relationship_stat(owner, target, "Friendship"),
                "{owner}->{target}"
            );
        }
        assert_eq!(restored.agent_stat("jose", "Energy"), Some(14.0));
        assert_eq!(restored.agent_stat("liza", "Confidence"), Some(20.0));
        assert!(restored.has_social_rule_instance("friendly-outgoing", "liza", "zim"));
        assert!(restored.has_social_rule_instance("confident-charm", "liza", "zim"));
        assert_eq!(restored.rule_instance_count(), original.rule_instance_count());
        assert_eq!(restored.export_snapshot(), snapshot);
    }

    #[test]
    fn test_import_rejects_bad_input() {
        let snapshot = populated().export_snapshot();

        let mut wrong_version = snapshot.clone();
        wrong_version.format_version = FORMAT_VERSION + 1;
        assert!(matches!(
            sample_graph().import_snapshot(&wrong_version),
            Err(GraphError::Load(_))
        ));

        let mut occupied = sample_graph();
        occupied.add_agent("character", "liza").unwrap();
        assert!(matches!(
            occupied.import_snapshot(&snapshot),
            Err(GraphError::Unexpected(_))
        ));
    }

    #[test]
    fn test_import_rejects_duplicate_uid_before_spawning() {
        let mut snapshot = populated().export_snapshot();
        let mut twin = snapshot.agents[0].clone();
        twin.traits.clear();
        snapshot.agents.push(twin);

        let mut restored = sample_graph();
        assert!(matches!(
            restored.import_snapshot(&snapshot),
            Err(GraphError::DuplicateAgent(uid)) if uid == "liza"
        ));
        assert_eq!(restored.agent_count(), 0);
        assert_eq!(restored.relationship_count(), 0);
    }

    #[test]
    fn test_import_skips_unregistered_traits() {
        let mut snapshot = populated().export_snapshot();
        snapshot.agents[0].traits.push(TraitSnapshot {
            id: "werewolf".into(),
            duration: None,
        });

        let mut restored = sample_graph();
        restored.import_snapshot(&snapshot).unwrap();
        assert!(restored.has_agent_trait("liza", "friendly"));
        assert!(!restored.has_agent_trait("liza", "werewolf"));
    }
}

//! Duration bookkeeping.

use super::{Propagation, SocialGraph};
use crate::components::{EntityRef, SocialEntity};
use crate::error::GraphError;
use crate::observer::GraphEvent;

impl SocialGraph {
    /// Advances every duration by one tick: agents first, then relationships,
    /// each in registration order. Modifiers count down before traits.
    pub fn tick(&mut self) -> Result<(), GraphError> {
        let agents: Vec<EntityRef> = self.agents.keys().map(|k| EntityRef::Agent(*k)).collect();
        let relationships: Vec<EntityRef> = self
            .relationships
            .keys()
            .map(|k| EntityRef::Relationship(*k))
            .collect();

        for entity in agents.into_iter().chain(relationships) {
            self.tick_entity(entity)?;
        }
        Ok(())
    }

    fn tick_entity(&mut self, entity: EntityRef) -> Result<(), GraphError> {
        let Some(target) = self.entity_mut(entity) else {
            return Ok(());
        };
        target.stats_mut().tick();
        let expired = target.traits_mut().tick();
        let stats_moved = self.flush_stats(entity);

        for trait_id in &expired {
            if !self.remove_trait_internal(entity, trait_id, Propagation::OwnRulesOnly)? {
                let label = self.entity_id(entity).map(|e| e.to_string()).unwrap_or_default();
                tracing::error!(entity = %label, trait_id = %trait_id, "Expired trait vanished before removal");
                return Err(GraphError::Unexpected(format!(
                    "expired trait {} missing from {}",
                    trait_id, label
                )));
            }
        }

        if stats_moved || !expired.is_empty() {
            self.propagate_around(entity)?;
        }
        if let Some(label) = self.entity_id(entity) {
            self.emit(GraphEvent::Ticked { entity: label });
        }
        Ok(())
    }
}

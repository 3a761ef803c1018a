//! One-shot social events.

use serde::Serialize;
use social_defs::event_key;

use super::{Propagation, SocialGraph};
use crate::effects::{BindingContext, EffectTargets};
use crate::error::GraphError;
use crate::facts::Bindings;
use crate::observer::GraphEvent;

/// What a dispatched event did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    /// `name/cardinality`
    pub event: String,
    /// Event description with roles filled in
    pub description: String,
    /// Responses whose precondition held, in definition order
    pub responses: Vec<ResponseReport>,
}

impl DispatchReport {
    pub fn fired(&self) -> bool {
        !self.responses.is_empty()
    }

    pub fn effects_applied(&self) -> usize {
        self.responses.iter().map(|r| r.effects_applied).sum()
    }
}

/// One response that fired
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseReport {
    pub index: usize,
    pub description: String,
    pub effects_applied: usize,
}

impl SocialGraph {
    /// Dispatches `name` with `agents` bound positionally to its roles.
    ///
    /// Each response runs its precondition against the current facts, so a
    /// response sees what earlier responses changed. A response whose effects
    /// fail to build or apply returns its error and the remaining responses
    /// are skipped; responses already applied stay applied.
    pub fn dispatch_event(&mut self, name: &str, agents: &[&str]) -> Result<DispatchReport, GraphError> {
        let key = event_key(name, agents.len());
        let event = self
            .events
            .get(&key)
            .cloned()
            .ok_or_else(|| GraphError::UnknownEvent(key.clone()))?;

        let mut seed = Bindings::new();
        for (role, agent) in event.definition.roles.iter().zip(agents) {
            self.agent_key(agent)?;
            seed.insert(role.clone(), agent.to_string());
        }
        let base = BindingContext::new(seed.clone());
        let source = self.next_source();
        let mut report = DispatchReport {
            event: key.clone(),
            description: base.describe(&event.definition.description),
            responses: Vec::new(),
        };

        for (index, (response, precondition)) in event
            .definition
            .responses
            .iter()
            .zip(&event.preconditions)
            .enumerate()
        {
            let result = precondition.run(self.facts.as_ref(), &seed);
            if !result.success {
                continue;
            }

            let mut effects_applied = 0;
            for bindings in result.bindings {
                let ctx = BindingContext::new(bindings);
                let targets: &dyn EffectTargets = &*self;
                let effects = response
                    .effects
                    .iter()
                    .map(|text| self.effects.create_instance(&ctx, text, targets, source))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|error| GraphError::effect(key.clone(), error))?;
                effects_applied += self.apply_all(effects, Propagation::Around)?.len();
            }

            let description = match &response.description {
                Some(text) => base.describe(text),
                None => report.description.clone(),
            };
            tracing::debug!(event = %key, response = index, effects = effects_applied, "Response fired");
            report.responses.push(ResponseReport {
                index,
                description,
                effects_applied,
            });
        }

        tracing::info!(event = %key, agents = ?agents, responses = report.responses.len(), "Dispatched social event");
        self.emit(GraphEvent::EventDispatched {
            event: key,
            description: report.description.clone(),
        });
        Ok(report)
    }

    /// Whether an event named `name` takes `cardinality` agents.
    pub fn has_event(&self, name: &str, cardinality: usize) -> bool {
        self.events.contains_key(&event_key(name, cardinality))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_graph;
    use super::*;

    fn liza_and_zim() -> SocialGraph {
        let mut graph = sample_graph();
        graph.add_agent("character", "liza").unwrap();
        graph.add_agent("character", "zim").unwrap();
        graph.add_relationship("liza", "zim").unwrap();
        graph.add_relationship("zim", "liza").unwrap();
        graph
    }

    #[test]
    fn test_compliment_adds_timed_trait() {
        let mut graph = liza_and_zim();
        let report = graph.dispatch_event("compliment", &["liza", "zim"]).unwrap();

        assert_eq!(report.event, "compliment/2");
        assert_eq!(report.description, "liza compliments zim");
        assert_eq!(report.responses.len(), 1);
        assert_eq!(report.effects_applied(), 1);
        assert!(graph.has_agent_trait("zim", "recently-complimented"));
        assert_eq!(graph.agent_stat("zim", "Confidence"), Some(20.0));
        // zim now clears confident-charm toward liza
        assert!(graph.has_social_rule_instance("confident-charm", "zim", "liza"));
    }

    #[test]
    fn test_gated_response_uses_its_own_description() {
        let mut graph = liza_and_zim();
        graph.add_agent_trait("zim", "friendly", None).unwrap();
        let report = graph.dispatch_event("compliment", &["liza", "zim"]).unwrap();

        assert_eq!(report.responses.len(), 2);
        assert_eq!(report.responses[1].index, 1);
        assert_eq!(report.responses[1].description, "zim beams at liza");
        // 12 from friendly-outgoing, 5 from the response
        assert_eq!(graph.relationship_stat("zim", "liza", "Friendship"), Some(17.0));
    }

    #[test]
    fn test_event_effects_are_permanent() {
        let mut graph = liza_and_zim();
        graph.dispatch_event("insult", &["liza", "zim"]).unwrap();
        for _ in 0..5 {
            graph.tick().unwrap();
        }
        assert_eq!(graph.relationship_stat("zim", "liza", "Friendship"), Some(-8.0));
    }

    #[test]
    fn test_precondition_failure_applies_nothing() {
        let mut graph = sample_graph();
        graph.add_agent("character", "liza").unwrap();
        graph.add_agent("character", "zim").unwrap();

        let report = graph.dispatch_event("insult", &["liza", "zim"]).unwrap();
        assert!(!report.fired());
        assert_eq!(report.description, "liza insults zim");
    }

    #[test]
    fn test_dispatch_errors() {
        let mut graph = liza_and_zim();
        assert!(matches!(
            graph.dispatch_event("compliment", &["liza"]),
            Err(GraphError::UnknownEvent(key)) if key == "compliment/1"
        ));
        assert!(matches!(
            graph.dispatch_event("compliment", &["liza", "nobody"]),
            Err(GraphError::UnknownAgent(_))
        ));
        assert!(graph.has_event("insult", 2));
        assert!(!graph.has_event("insult", 3));
    }

    #[test]
    fn test_observers_see_dispatch() {
        use std::sync::{Arc, Mutex};

        let mut graph = liza_and_zim();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        graph.subscribe(move |event| {
            if let GraphEvent::EventDispatched { event, .. } = event {
                sink.lock().unwrap().push(event.clone());
            }
        });

        graph.dispatch_event("insult", &["liza", "zim"]).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["insult/2".to_string()]);
    }

    #[test]
    fn test_failing_response_keeps_earlier_responses() {
        use social_defs::{ResponseDefinition, SocialEventDefinition};

        let mut graph = liza_and_zim();
        let nudge = SocialEventDefinition::new("nudge", &["initiator", "target"])
            .with_description("[initiator] nudges [target]")
            .with_response(
                ResponseDefinition::new().with_effect("IncreaseRelationshipStat ?initiator ?target Friendship 3"),
            )
            .with_response(ResponseDefinition::new().with_effect("Hug ?initiator ?target"))
            .with_response(
                ResponseDefinition::new().with_effect("IncreaseRelationshipStat ?target ?initiator Friendship 3"),
            );
        graph.register_event(nudge).unwrap();

        let err = graph.dispatch_event("nudge", &["liza", "zim"]).unwrap_err();
        assert!(matches!(err, GraphError::Effect { origin, .. } if origin == "nudge/2"));
        assert_eq!(graph.relationship_stat("liza", "zim", "Friendship"), Some(3.0));
        assert_eq!(graph.relationship_stat("zim", "liza", "Friendship"), Some(0.0));
    }
}

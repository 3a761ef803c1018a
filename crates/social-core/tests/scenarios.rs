//! End-to-end scenarios over the sample content library.

use social_core::components::{SocialEntity, SourceId, Stat, StatModifier};
use social_core::setup::{build_graph, run_simulation, spawn_scenario, EventDriver};
use social_core::{EngineConfig, FactDatabase, GraphEvent, SocialGraph};
use social_defs::{fixtures, ContentLibrary};
use std::sync::{Arc, Mutex};

fn empty_graph() -> SocialGraph {
    SocialGraph::default()
        .with_library(&fixtures::sample_definitions())
        .unwrap()
}

fn graph_with(agents: &[&str], relationships: &[(&str, &str)]) -> SocialGraph {
    let mut graph = empty_graph();
    for id in agents {
        graph.add_agent("character", id).unwrap();
    }
    for (owner, target) in relationships {
        graph.add_relationship(owner, target).unwrap();
    }
    graph
}

/// Every stat of every entity, keyed by entity and stat name.
fn all_stats(graph: &SocialGraph) -> Vec<(String, String, f64)> {
    let agents = graph.agents().flat_map(|a| {
        a.stats()
            .iter()
            .map(|s| (a.id().to_string(), s.name().to_string(), s.value()))
            .collect::<Vec<_>>()
    });
    let relationships = graph.relationships().flat_map(|r| {
        r.stats()
            .iter()
            .map(|s| {
                (
                    format!("{}->{}", r.owner_id(), r.target_id()),
                    s.name().to_string(),
                    s.value(),
                )
            })
            .collect::<Vec<_>>()
    });
    agents.chain(relationships).collect()
}

#[test]
fn test_friendly_rule_follows_trait() {
    let mut graph = graph_with(&["liza", "zim"], &[("liza", "zim")]);
    assert_eq!(graph.relationship_stat("liza", "zim", "Friendship"), Some(0.0));

    assert!(graph.add_agent_trait("liza", "friendly", None).unwrap());
    assert_eq!(graph.relationship_stat("liza", "zim", "Friendship"), Some(12.0));
    assert!(graph.has_social_rule_instance("friendly-outgoing", "liza", "zim"));

    assert!(graph.remove_agent_trait("liza", "friendly").unwrap());
    assert_eq!(graph.relationship_stat("liza", "zim", "Friendship"), Some(0.0));
    assert!(!graph.has_social_rule_instance("friendly-outgoing", "liza", "zim"));
}

#[test]
fn test_recently_complimented_expires() {
    let mut graph = graph_with(&["liza"], &[]);
    graph.add_agent_trait("liza", "recently-complimented", None).unwrap();
    assert_eq!(graph.agent_stat("liza", "Confidence"), Some(20.0));

    for _ in 0..3 {
        graph.tick().unwrap();
    }
    assert_eq!(graph.agent_stat("liza", "Confidence"), Some(0.0));
    assert!(!graph.has_agent_trait("liza", "recently-complimented"));
    assert!(!graph.facts().contains("liza.traits.recently-complimented"));
}

#[test]
fn test_conflicting_trait_rejected() {
    let mut graph = graph_with(&["zim"], &[]);
    graph.add_agent_trait("zim", "human", None).unwrap();

    assert!(!graph.add_agent_trait("zim", "vampirism", None).unwrap());
    let traits = graph.agent("zim").unwrap().traits().ids();
    assert_eq!(traits, vec!["human".to_string()]);
}

#[test]
fn test_compliment_event_then_expiry() {
    let mut graph = graph_with(&["jose", "lisa"], &[("lisa", "jose")]);
    let report = graph.dispatch_event("compliment", &["jose", "lisa"]).unwrap();

    assert_eq!(report.description, "jose compliments lisa");
    assert!(graph.has_agent_trait("lisa", "recently-complimented"));

    for _ in 0..4 {
        graph.tick().unwrap();
    }
    assert!(!graph.has_agent_trait("lisa", "recently-complimented"));
    assert_eq!(graph.agent_stat("lisa", "Confidence"), Some(0.0));
}

#[test]
fn test_flat_stats_clamp_and_floor() {
    let cases: &[(f64, &[f64])] = &[
        (10.0, &[2.5, -1.0]),
        (10.0, &[30.0]),
        (3.0, &[-7.25, 1.5]),
        (0.0, &[]),
        (19.0, &[0.9]),
    ];
    for (base, flats) in cases {
        let mut stat = Stat::new("Energy", *base, 0.0, 20.0).discrete();
        for (i, value) in flats.iter().enumerate() {
            stat.add_modifier(StatModifier::flat(*value, SourceId(i as u64)));
        }
        let expected = (base + flats.iter().sum::<f64>()).clamp(0.0, 20.0).floor();
        assert_eq!(stat.value(), expected, "base {base} flats {flats:?}");
    }
}

#[test]
fn test_add_then_remove_restores_stats() {
    let mut graph = graph_with(
        &["liza", "zim", "jose"],
        &[("liza", "zim"), ("zim", "liza"), ("jose", "liza")],
    );
    graph.add_agent_trait("zim", "friendly", None).unwrap();
    graph.set_agent_stat_base("liza", "Confidence", 30.0).unwrap();
    let before = all_stats(&graph);

    graph.add_agent_trait("liza", "friendly", None).unwrap();
    graph.add_agent_trait("liza", "beloved", None).unwrap();
    graph.add_relationship_trait("liza", "zim", "crush", None).unwrap();
    assert_ne!(all_stats(&graph), before);

    graph.remove_relationship_trait("liza", "zim", "crush").unwrap();
    graph.remove_agent_trait("liza", "beloved").unwrap();
    graph.remove_agent_trait("liza", "friendly").unwrap();
    assert_eq!(all_stats(&graph), before);
}

#[test]
fn test_rule_instances_never_duplicate() {
    let mut graph = graph_with(&["liza", "zim"], &[("liza", "zim"), ("zim", "liza")]);
    graph.add_agent_trait("liza", "friendly", None).unwrap();
    graph.set_agent_stat_base("liza", "Confidence", 50.0).unwrap();

    for _ in 0..3 {
        graph.add_relationship("liza", "zim").unwrap();
        graph.add_agent_trait("liza", "friendly", None).unwrap();
        graph.reevaluate().unwrap();
    }
    let rules: Vec<&str> = graph
        .social_rule_instances_for("liza", "zim")
        .iter()
        .map(|i| i.rule_id())
        .collect();
    assert_eq!(rules.len(), 2);
    assert!(rules.contains(&"friendly-outgoing"));
    assert!(rules.contains(&"confident-charm"));
    assert_eq!(graph.relationship_stat("liza", "zim", "Friendship"), Some(12.0));
    assert_eq!(graph.relationship_stat("zim", "liza", "Friendship"), Some(1.0));
}

#[test]
fn test_rule_removed_when_condition_stops_holding() {
    let mut graph = graph_with(&["liza", "jose"], &[("liza", "jose")]);
    graph.add_agent_trait("liza", "suspicious", None).unwrap();
    graph.add_agent_trait("jose", "vampirism", None).unwrap();
    assert!(graph.has_social_rule_instance("distrust-vampires", "liza", "jose"));

    graph.remove_relationship("liza", "jose").unwrap();
    assert!(!graph.has_social_rule_instance("distrust-vampires", "liza", "jose"));

    graph.add_relationship("liza", "jose").unwrap();
    assert!(graph.has_social_rule_instance("distrust-vampires", "liza", "jose"));
    assert_eq!(graph.relationship_stat("liza", "jose", "Friendship"), Some(-10.0));
}

#[test]
fn test_observers_receive_changes_in_order() {
    let mut graph = graph_with(&["liza", "zim"], &[("liza", "zim")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handle = graph.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    graph.add_agent_trait("liza", "friendly", None).unwrap();
    assert!(graph.unsubscribe(handle));
    graph.remove_agent_trait("liza", "friendly").unwrap();

    let seen = seen.lock().unwrap();
    let added = seen
        .iter()
        .position(|e| matches!(e, GraphEvent::TraitAdded { trait_id, .. } if trait_id == "friendly"))
        .unwrap();
    let instantiated = seen
        .iter()
        .position(|e| matches!(e, GraphEvent::RuleInstantiated { rule, .. } if rule == "friendly-outgoing"))
        .unwrap();
    assert!(added < instantiated);
    assert!(seen
        .iter()
        .any(|e| matches!(e, GraphEvent::StatChanged { stat, value, .. } if stat == "Friendship" && *value == 12.0)));
    assert!(!seen.iter().any(|e| matches!(e, GraphEvent::TraitRemoved { .. })));
}

#[test]
fn test_demo_village_runs() {
    let library = ContentLibrary::from_toml_str(include_str!("../../../content/village.toml")).unwrap();
    let mut graph = build_graph(&library, EngineConfig::default()).unwrap();
    let summary = spawn_scenario(&mut graph, &library.scenario).unwrap();
    assert_eq!(summary.total_agents, 5);
    assert_eq!(summary.traits_rejected, 0);
    assert!(graph.has_social_rule_instance("distrust-vampires", "marta", "lisa"));
    assert!(graph.has_social_rule_instance("beloved-incoming", "lisa", "jose"));

    let mut driver = EventDriver::new(11, 4);
    let result = run_simulation(&mut graph, &mut driver, 25, |_, _, _| {}).unwrap();
    assert_eq!(result.events_dispatched, 100);
}

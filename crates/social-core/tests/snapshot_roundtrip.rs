//! Snapshot persistence through the filesystem.

use social_core::setup::{build_graph, run_simulation, spawn_scenario, EventDriver};
use social_core::{EngineConfig, GraphError, SocialGraph};
use social_defs::{ContentLibrary, GraphSnapshot, LoadError};

fn village() -> ContentLibrary {
    ContentLibrary::from_toml_str(include_str!("../../../content/village.toml")).unwrap()
}

fn simulated(library: &ContentLibrary) -> SocialGraph {
    let mut graph = build_graph(library, EngineConfig::default()).unwrap();
    spawn_scenario(&mut graph, &library.scenario).unwrap();
    let mut driver = EventDriver::new(5, 3);
    run_simulation(&mut graph, &mut driver, 12, |_, _, _| {}).unwrap();
    graph
}

fn stat_table(graph: &SocialGraph) -> Vec<(String, String, Option<f64>)> {
    let mut rows = Vec::new();
    for agent in graph.agents() {
        for stat in ["Confidence", "Energy"] {
            rows.push((agent.id().to_string(), stat.to_string(), graph.agent_stat(agent.id(), stat)));
        }
    }
    for rel in graph.relationships() {
        rows.push((
            format!("{}->{}", rel.owner_id(), rel.target_id()),
            "Friendship".to_string(),
            graph.relationship_stat(rel.owner_id(), rel.target_id(), "Friendship"),
        ));
    }
    rows
}

#[test]
fn test_snapshot_survives_disk_round_trip() {
    let library = village();
    let original = simulated(&library);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("village.json");
    std::fs::write(&path, original.export_snapshot().to_json().unwrap()).unwrap();

    let json = std::fs::read_to_string(&path).unwrap();
    let snapshot = GraphSnapshot::from_json(&json).unwrap();
    let mut restored = build_graph(&library, EngineConfig::default()).unwrap();
    restored.import_snapshot(&snapshot).unwrap();

    assert_eq!(stat_table(&restored), stat_table(&original));
    assert_eq!(restored.rule_instance_count(), original.rule_instance_count());
    assert_eq!(restored.export_snapshot(), original.export_snapshot());
}

#[test]
fn test_restored_graph_keeps_ticking() {
    let library = village();
    let mut original = simulated(&library);
    let mut restored = build_graph(&library, EngineConfig::default()).unwrap();
    restored.import_snapshot(&original.export_snapshot()).unwrap();

    for _ in 0..12 {
        original.tick().unwrap();
        restored.tick().unwrap();
    }
    assert_eq!(stat_table(&restored), stat_table(&original));
}

#[test]
fn test_unsupported_version_rejected() {
    let json = r#"{"format_version": 99, "agents": [], "relationships": []}"#;
    assert!(matches!(
        GraphSnapshot::from_json(json),
        Err(LoadError::UnsupportedVersion { found: 99, .. })
    ));

    let snapshot = GraphSnapshot {
        format_version: 99,
        ..GraphSnapshot::new()
    };
    let mut graph = build_graph(&village(), EngineConfig::default()).unwrap();
    assert!(matches!(graph.import_snapshot(&snapshot), Err(GraphError::Load(_))));
}

//! Event Driver
//!
//! Dispatches randomly chosen social events between randomly chosen agents.
//! All randomness comes from one seeded `SmallRng`, so a seed and a content
//! library fully determine a run.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::GraphError;
use crate::graph::{DispatchReport, SocialGraph};

/// Seeded source of social events
#[derive(Debug, Clone)]
pub struct EventDriver {
    rng: SmallRng,
    events_per_tick: usize,
}

impl EventDriver {
    pub fn new(seed: u64, events_per_tick: usize) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            events_per_tick,
        }
    }

    pub fn events_per_tick(&self) -> usize {
        self.events_per_tick
    }

    /// Dispatches up to `events_per_tick` events. Events needing more agents
    /// than the graph holds are never picked.
    pub fn step(&mut self, graph: &mut SocialGraph) -> Result<Vec<DispatchReport>, GraphError> {
        let ids: Vec<String> = graph.agents().map(|a| a.id().to_string()).collect();
        let events: Vec<(String, usize)> = graph
            .events()
            .filter(|e| e.roles.len() <= ids.len())
            .map(|e| (e.name.clone(), e.roles.len()))
            .collect();

        let mut reports = Vec::with_capacity(self.events_per_tick);
        for _ in 0..self.events_per_tick {
            let Some((name, cardinality)) = events.choose(&mut self.rng) else {
                break;
            };
            let agents: Vec<&str> = ids
                .choose_multiple(&mut self.rng, *cardinality)
                .map(String::as_str)
                .collect();
            reports.push(graph.dispatch_event(name, &agents)?);
        }
        Ok(reports)
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationSummary {
    pub ticks: u64,
    pub events_dispatched: usize,
    pub responses_fired: usize,
    pub effects_applied: usize,
}

impl std::fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ticks, {} events, {} responses, {} effects",
            self.ticks, self.events_dispatched, self.responses_fired, self.effects_applied
        )
    }
}

/// Runs `ticks` rounds of event dispatch followed by a graph tick.
/// `on_tick` sees the graph after each round.
pub fn run_simulation(
    graph: &mut SocialGraph,
    driver: &mut EventDriver,
    ticks: u64,
    mut on_tick: impl FnMut(u64, &SocialGraph, &[DispatchReport]),
) -> Result<SimulationSummary, GraphError> {
    let mut summary = SimulationSummary::default();

    for tick in 1..=ticks {
        let reports = driver.step(graph)?;
        graph.tick()?;

        summary.ticks = tick;
        summary.events_dispatched += reports.len();
        summary.responses_fired += reports.iter().map(|r| r.responses.len()).sum::<usize>();
        summary.effects_applied += reports.iter().map(DispatchReport::effects_applied).sum::<usize>();

        tracing::debug!(tick, events = reports.len(), "Tick complete");
        on_tick(tick, graph, &reports);
    }

    tracing::info!(
        ticks = summary.ticks,
        events = summary.events_dispatched,
        rule_instances = graph.rule_instance_count(),
        "Simulation finished"
    );
    Ok(summary)
}

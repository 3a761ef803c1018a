//! Social Simulation Runner
//!
//! Loads a content library, spawns its scenario, then dispatches seeded random
//! social events for a number of ticks and writes the final snapshot.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use social_core::setup::{build_graph, run_simulation, spawn_scenario, EventDriver};
use social_core::EngineConfig;
use social_defs::ContentLibrary;

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "social_sim")]
#[command(about = "Runs a seeded social simulation over a content library")]
struct Args {
    /// Content library (.toml or .json)
    #[arg(long)]
    content: PathBuf,

    /// Engine configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 20)]
    ticks: u64,

    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Social events dispatched per tick
    #[arg(long, default_value_t = 3)]
    events_per_tick: usize,

    /// Where to write the final snapshot as JSON
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    println!("Social Simulation");
    println!("=================");
    println!("Content: {}", args.content.display());
    println!("Seed: {}", args.seed);
    println!("Ticks: {}", args.ticks);
    println!("Events per tick: {}", args.events_per_tick);
    println!();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let library = ContentLibrary::from_file(&args.content)?;

    println!("Registering content...");
    let mut graph = build_graph(&library, config)?;
    println!(
        "  {} traits, {} events",
        graph.trait_registry().len(),
        graph.events().count()
    );

    println!("Spawning scenario...");
    let summary = spawn_scenario(&mut graph, &library.scenario)?;
    for line in summary.to_string().lines() {
        println!("  {}", line);
    }
    println!("  {} social rule instances", graph.rule_instance_count());
    println!();

    let mut driver = EventDriver::new(args.seed, args.events_per_tick);
    let report_every = (args.ticks / 10).max(1);
    let result = run_simulation(&mut graph, &mut driver, args.ticks, |tick, graph, reports| {
        for report in reports.iter().filter(|r| r.fired()) {
            tracing::debug!(tick, event = %report.event, "{}", report.description);
        }
        if tick % report_every == 0 {
            println!(
                "Tick {}: {} relationships, {} rule instances",
                tick,
                graph.relationship_count(),
                graph.rule_instance_count()
            );
        }
    })?;

    println!();
    println!("Simulation complete: {}", result);

    if let Some(path) = &args.snapshot_out {
        let snapshot = graph.export_snapshot();
        std::fs::write(path, snapshot.to_json()?)?;
        println!("Wrote snapshot to {}", path.display());
    }
    Ok(())
}

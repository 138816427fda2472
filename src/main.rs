//! Headless runner: `hexsim [RULE] [TICKS] [CONFIG.json]`
//!
//! Runs one of the built-in rules and prints per-state populations at the end.
//! Without a config file it uses a radius-24 hexagon seeded with random `on` cells.

use hexsim::{Simulation, SimulationConfig, all_rules, default_rule};
use std::collections::BTreeMap;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_TICKS: u64 = 100;
const REPORT_EVERY: u64 = 10;

fn default_config() -> SimulationConfig {
    SimulationConfig::bounded(24)
        .with_seed(1)
        .with_random_fill("on", 0.3)
}

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let rule = match args.first() {
        Some(name) => all_rules()
            .into_iter()
            .find(|(rule_name, _)| rule_name.eq_ignore_ascii_case(name))
            .map(|(_, rule)| rule)
            .ok_or_else(|| {
                let known: Vec<&str> = all_rules().iter().map(|(n, _)| *n).collect();
                format!("unknown rule `{name}`, expected one of {}", known.join(", "))
            })?,
        None => default_rule(),
    };

    let ticks = match args.get(1) {
        Some(ticks) => ticks.parse()?,
        None => DEFAULT_TICKS,
    };

    let config = match args.get(2) {
        Some(path) => SimulationConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => default_config(),
    };

    let mut sim = Simulation::new(config, rule)?;

    for _ in 0..ticks {
        let report = sim.step()?;
        if report.generation % REPORT_EVERY == 0 {
            info!(
                generation = report.generation,
                population = report.population,
                changed = report.changed,
                faults = report.faults.len(),
                elapsed_ms = report.elapsed.as_secs_f32() * 1000.0,
                "progress"
            );
        }
    }

    let mut by_state: BTreeMap<String, usize> = BTreeMap::new();
    for (_, state) in sim.cells() {
        *by_state.entry(state.to_string()).or_default() += 1;
    }

    println!("{} after {} generations", sim.rule().name(), sim.generation());
    for (state, count) in by_state {
        println!("{state:>10} {count:>8}");
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hexsim=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

//! Performance benchmark comparing serial and parallel stepping

use std::time::Instant;
use hexsim::domain::{Coord, HexLifeRule, hex_count};
use hexsim::{CellState, Execution, Simulation, SimulationConfig};

fn build(radius: u32, execution: Execution) -> Simulation {
    let config = SimulationConfig::bounded(radius)
        .with_seed(7)
        .with_random_fill("on", 0.3)
        .with_history_depth(1)
        .with_execution(execution);
    match Simulation::new(config, HexLifeRule) {
        Ok(sim) => sim,
        Err(err) => panic!("benchmark config rejected: {err}"),
    }
}

/// Milliseconds per generation, plus the final cells for comparison
fn benchmark(radius: u32, iterations: u32, execution: Execution) -> (f64, Vec<(Coord, CellState)>) {
    let mut sim = build(radius, execution);

    let start = Instant::now();
    for _ in 0..iterations {
        if let Err(err) = sim.step() {
            panic!("step failed: {err}");
        }
    }
    let ms = start.elapsed().as_secs_f64() * 1000.0 / iterations as f64;

    let mut cells: Vec<_> = sim.cells().map(|(c, s)| (c, s.clone())).collect();
    cells.sort_by_key(|(c, _)| *c);
    (ms, cells)
}

fn main() {
    println!("=== Hex Grid Stepping Benchmark ===\n");

    let radii = [16, 32, 64, 128, 256];
    let iterations = 20;

    println!("{:>8} {:>10} {:>12} {:>12} {:>10} {:>10}",
        "Radius", "Cells", "Serial", "Parallel", "Speedup", "Match");
    println!("{:-<68}", "");

    for radius in radii {
        let (serial_ms, serial_cells) = benchmark(radius, iterations, Execution::Serial);
        let (parallel_ms, parallel_cells) = benchmark(radius, iterations, Execution::Parallel);

        println!(
            "{:>8} {:>10} {:>12.2} {:>12.2} {:>9.1}x {:>10}",
            radius,
            hex_count(radius),
            serial_ms,
            parallel_ms,
            serial_ms / parallel_ms,
            if serial_cells == parallel_cells { "yes" } else { "NO" }
        );
    }

    println!("\n=== Throughput at radius 256 ===\n");

    let cells = hex_count(256) as f64;
    let (parallel_ms, _) = benchmark(256, iterations, Execution::Parallel);
    println!("Parallel: {:.2} ms/gen, {:.1}M cells/sec",
        parallel_ms, cells / (parallel_ms / 1000.0) / 1_000_000.0);
}

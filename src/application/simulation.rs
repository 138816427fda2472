use super::config::{ConfigError, SimulationConfig};
use crate::domain::{
    CellRng, CellState, Coord, Execution, Grid, HistoryRing, OFF, Rule, RuleFault, Snapshot,
    Topology, evaluate, hex_count, hex_range,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the stepper is. Outside of `step` it is always `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Ticking,
}

/// Tick-level failure. The tick is abandoned and the previous generation stays current.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("active domain of {size} cells exceeds the limit of {limit}")]
    DomainLimitExceeded { size: usize, limit: usize },
}

/// Outcome of one committed tick
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Index of the generation just committed
    pub generation: u64,
    pub evaluated: usize,
    pub changed: usize,
    pub population: usize,
    pub faults: Vec<RuleFault>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub ticks: u64,
    pub cancelled: bool,
    pub faults: Vec<RuleFault>,
}

/// Stops a `run` at the next tick boundary. Cheap to clone and share across threads.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Simulation drives a rule over a hexagonal grid one generation at a time.
/// Between ticks the grid holds a complete generation; `step` either commits
/// a full new generation or leaves the current one untouched.
///
/// Rule faults are reported through `tracing` and `TickReport::faults`. A rule
/// that panics also goes through the process panic hook, which writes to stderr
/// unless the host replaces it.
pub struct Simulation {
    grid: Grid,
    history: HistoryRing,
    rule: Box<dyn Rule>,
    seed: u64,
    execution: Execution,
    pool: Option<rayon::ThreadPool>,
    max_active_cells: Option<usize>,
    phase: Phase,
    last_faults: Vec<RuleFault>,
}

impl Simulation {
    /// Validate `config` against `rule` and build generation 0
    pub fn new(config: SimulationConfig, rule: impl Rule + 'static) -> Result<Self, ConfigError> {
        let topology = config.validate(&rule)?;

        let pool = config
            .worker_threads
            .map(|threads| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("hexsim-worker-{i}"))
                    .build()
            })
            .transpose()?;

        let grid = Grid::with_cells(topology, Self::initial_cells(&config, topology));

        info!(
            rule = rule.name(),
            ?topology,
            history_depth = config.history_depth,
            seed = config.seed,
            execution = config.execution.name(),
            population = grid.population(),
            "simulation ready"
        );

        Ok(Self {
            grid,
            history: HistoryRing::new(config.history_depth),
            rule: Box::new(rule),
            seed: config.seed,
            execution: config.execution,
            pool,
            max_active_cells: config.max_active_cells,
            phase: Phase::Idle,
            last_faults: Vec::new(),
        })
    }

    /// Random fill first, explicit placements on top
    fn initial_cells(config: &SimulationConfig, topology: Topology) -> HashMap<Coord, CellState> {
        let mut cells = HashMap::new();

        if let (Some(fill), Topology::Bounded { radius }) = (&config.random_fill, topology) {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            for coord in hex_range(Coord::ORIGIN, radius) {
                if rng.random_bool(fill.density) {
                    cells.insert(coord, fill.state.clone());
                }
            }
        }

        for placement in &config.initial_cells {
            cells.insert(placement.coord(), placement.state.clone());
        }

        cells
    }

    pub fn generation(&self) -> u64 {
        self.grid.generation()
    }

    pub fn population(&self) -> usize {
        self.grid.population()
    }

    pub fn topology(&self) -> Topology {
        self.grid.topology()
    }

    pub fn get(&self, coord: Coord) -> &CellState {
        self.grid.get(coord)
    }

    /// State of `coord` `-offset` generations before the current one
    pub fn get_history(&self, offset: i64, coord: Coord) -> &CellState {
        if self.grid.topology().contains(coord) {
            self.history.get_history(offset, coord)
        } else {
            &OFF
        }
    }

    /// Non-`off` cells of the current generation
    pub fn cells(&self) -> impl Iterator<Item = (Coord, &CellState)> + '_ {
        self.grid.current().iter()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    pub fn rule(&self) -> &dyn Rule {
        self.rule.as_ref()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }

    /// Takes effect from the next tick
    pub fn set_execution(&mut self, execution: Execution) {
        self.execution = execution;
    }

    /// Faults contained during the most recent committed tick
    pub fn last_faults(&self) -> &[RuleFault] {
        &self.last_faults
    }

    /// Advance one generation
    pub fn step(&mut self) -> Result<TickReport, StepError> {
        let started = Instant::now();

        // A bounded domain is sized before anything is allocated for it
        if let (Some(limit), Topology::Bounded { radius }) =
            (self.max_active_cells, self.grid.topology())
        {
            let size = hex_count(radius);
            if size > limit {
                return Err(self.abandon_tick(size, limit));
            }
        }

        let domain = self.grid.active_domain();

        if let Some(limit) = self.max_active_cells {
            if domain.len() > limit {
                return Err(self.abandon_tick(domain.len(), limit));
            }
        }

        self.phase = Phase::Ticking;

        let results = {
            let snapshot = Snapshot::new(&self.grid, &self.history, &domain);
            self.evaluate_domain(&snapshot)
        };

        let evaluated = results.len();
        let mut changed = 0;
        let mut faults = Vec::new();

        for (coord, result) in results {
            let next = match result {
                Ok(state) => state,
                Err(fault) => {
                    warn!(coord = %fault.coord, generation = fault.generation, detail = %fault.detail, "rule fault contained");
                    faults.push(fault);
                    self.grid.get(coord).clone()
                }
            };
            if next != *self.grid.get(coord) {
                changed += 1;
            }
            self.grid.stage(coord, next);
        }

        let retired = self.grid.commit();
        self.history.push(retired);
        self.phase = Phase::Idle;

        let report = TickReport {
            generation: self.grid.generation(),
            evaluated,
            changed,
            population: self.grid.population(),
            faults,
            elapsed: started.elapsed(),
        };

        debug!(
            generation = report.generation,
            evaluated,
            changed,
            population = report.population,
            faults = report.faults.len(),
            elapsed_us = report.elapsed.as_micros() as u64,
            "tick committed"
        );

        self.last_faults.clone_from(&report.faults);
        Ok(report)
    }

    fn abandon_tick(&mut self, size: usize, limit: usize) -> StepError {
        warn!(
            generation = self.generation(),
            size,
            limit,
            "tick abandoned, active domain over limit"
        );
        self.grid.discard();
        StepError::DomainLimitExceeded { size, limit }
    }

    /// Step up to `ticks` times, stopping early once `cancel` is set.
    /// Cancellation is only observed between ticks.
    pub fn run(&mut self, ticks: u64, cancel: &CancelToken) -> Result<RunReport, StepError> {
        let mut report = RunReport::default();

        for _ in 0..ticks {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let tick = self.step()?;
            report.ticks += 1;
            report.faults.extend(tick.faults);
        }

        info!(
            ticks = report.ticks,
            cancelled = report.cancelled,
            faults = report.faults.len(),
            generation = self.generation(),
            population = self.population(),
            "run finished"
        );

        Ok(report)
    }

    /// Evaluate every domain cell against the snapshot, serially or on rayon workers
    fn evaluate_domain(&self, snapshot: &Snapshot<'_>) -> Vec<(Coord, Result<CellState, RuleFault>)> {
        let rule = self.rule.as_ref();
        let seed = self.seed;
        let generation = snapshot.generation();

        let evaluate_cell = |&coord: &Coord| {
            let mut rng = CellRng::new(seed, generation, coord);
            (coord, evaluate(rule, snapshot.get(coord), coord, snapshot, &mut rng))
        };

        let domain = snapshot.domain();
        match (self.execution, &self.pool) {
            (Execution::Serial, _) => domain.iter().map(evaluate_cell).collect(),
            (Execution::Parallel, Some(pool)) => {
                pool.install(|| domain.par_iter().map(evaluate_cell).collect())
            }
            (Execution::Parallel, None) => domain.par_iter().map(evaluate_cell).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FnRule, HexLifeRule, LifeDiffusionRule, RuleError};
    use std::sync::atomic::AtomicUsize;

    fn sorted_cells(sim: &Simulation) -> Vec<(Coord, CellState)> {
        let mut cells: Vec<_> = sim.cells().map(|(c, s)| (c, s.clone())).collect();
        cells.sort_by_key(|(c, _)| *c);
        cells
    }

    #[test]
    fn test_hexlife_triangle_survives() {
        let triangle = [Coord::new(0, 0), Coord::new(1, 0), Coord::new(0, 1)];
        let extra = Coord::new(1, -1);
        let config = SimulationConfig::bounded(5)
            .with_cells(triangle.iter().map(|&c| (c, "on")))
            .with_cell(extra, "on");
        let mut sim = Simulation::new(config, HexLifeRule).unwrap();

        let report = sim.step().unwrap();
        assert_eq!(report.generation, 1);
        assert_eq!(report.evaluated, hex_count(5));
        assert!(report.faults.is_empty());

        for coord in triangle.into_iter().chain([extra]) {
            assert_eq!(sim.get(coord), "on", "cell {coord} should survive");
        }
        // (-1, 1) touches (0, 0) and (0, 1): born
        assert_eq!(sim.get(Coord::new(-1, 1)), "on");
        // (-1, 0) touches only (0, 0): stays off
        assert!(sim.get(Coord::new(-1, 0)).is_off());
    }

    fn maturing_rule() -> impl Rule {
        FnRule::new("Maturing", |cell, _rng| {
            if *cell.state() != "green" || cell.count_neighbors("root") == 0 {
                return Ok(None);
            }
            let held = (1..=3).all(|back| *cell.get_history(-back, 0, 0) == "green");
            Ok(held.then(|| CellState::new("blue")))
        })
    }

    fn maturing_config(depth: usize) -> SimulationConfig {
        SimulationConfig::bounded(3)
            .with_history_depth(depth)
            .with_cell(Coord::ORIGIN, "green")
            .with_cell(Coord::new(1, 0), "root")
    }

    #[test]
    fn test_history_driven_transition() {
        let mut sim = Simulation::new(maturing_config(8), maturing_rule()).unwrap();
        for _ in 0..3 {
            sim.step().unwrap();
            assert_eq!(sim.get(Coord::ORIGIN), "green");
        }
        // History offsets count back from the generation being read: at
        // generation 3, -1..=-3 are generations 2, 1 and 0. Green at generations
        // 1 through 3 is therefore not enough on its own; generation 0 counts too.
        assert_eq!(sim.generation(), 3);
        for offset in 1..=3 {
            assert_eq!(sim.get_history(-offset, Coord::ORIGIN), "green");
        }
        assert!(sim.get_history(-4, Coord::ORIGIN).is_off());
        sim.step().unwrap();
        assert_eq!(sim.generation(), 4);
        assert_eq!(sim.get(Coord::ORIGIN), "blue");
    }

    #[test]
    fn test_shallow_history_never_transitions() {
        let mut sim = Simulation::new(maturing_config(2), maturing_rule()).unwrap();
        sim.run(12, &CancelToken::new()).unwrap();
        assert_eq!(sim.get(Coord::ORIGIN), "green");
        assert_eq!(sim.history().len(), 2);
    }

    #[test]
    fn test_fault_is_contained_to_one_cell() {
        let rule = FnRule::new("Toggle", |cell, _rng| {
            if cell.coord() == Coord::ORIGIN && cell.generation() + 1 == 2 {
                return Err(RuleError::new("origin refuses generation 2"));
            }
            let next = match cell.state().as_str() {
                "a" => "b",
                _ => "a",
            };
            Ok(Some(CellState::new(next)))
        });
        let mut sim = Simulation::new(SimulationConfig::bounded(2), rule).unwrap();

        assert!(sim.step().unwrap().faults.is_empty());
        assert_eq!(sim.get(Coord::ORIGIN), "a");

        let report = sim.step().unwrap();
        assert_eq!(sim.generation(), 2);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].coord, Coord::ORIGIN);
        assert_eq!(report.faults[0].generation, 2);
        assert_eq!(sim.last_faults().len(), 1);

        assert_eq!(sim.get(Coord::ORIGIN), "a");
        for coord in hex_range(Coord::ORIGIN, 2).filter(|&c| c != Coord::ORIGIN) {
            assert_eq!(sim.get(coord), "b");
        }

        assert!(sim.step().unwrap().faults.is_empty());
        assert!(sim.last_faults().is_empty());
    }

    #[test]
    fn test_panicking_rule_is_contained() {
        let rule = FnRule::new("Panics", |cell, _rng| {
            if cell.coord() == Coord::new(1, 1) {
                panic!("bad cell");
            }
            Ok(Some(CellState::new("on")))
        });
        let mut sim = Simulation::new(SimulationConfig::bounded(2), rule).unwrap();
        let report = sim.step().unwrap();
        assert_eq!(report.faults.len(), 1);
        assert!(sim.get(Coord::new(1, 1)).is_off());
        assert_eq!(sim.population(), hex_count(2) - 1);
    }

    /// Every cell copies its east neighbor, so state moves west by one per tick
    fn shift_west() -> impl Rule {
        FnRule::new("ShiftWest", |cell, _rng| Ok(Some(cell.get(1, 0).clone())))
    }

    #[test]
    fn test_no_tick_observes_its_own_writes() {
        for execution in Execution::all() {
            let config = SimulationConfig::unbounded()
                .with_cell(Coord::new(1, 0), "on")
                .with_execution(execution);
            let mut sim = Simulation::new(config, shift_west()).unwrap();
            sim.step().unwrap();
            assert_eq!(sim.get(Coord::ORIGIN), "on");
            // (-1, 0) would be on if it had seen the origin's new value
            assert!(sim.get(Coord::new(-1, 0)).is_off());
            assert!(sim.get(Coord::new(1, 0)).is_off());
            assert_eq!(sim.population(), 1);
        }
    }

    fn diffusion_run(seed: u64, execution: Execution, workers: Option<usize>) -> Vec<(Coord, CellState)> {
        let rule = LifeDiffusionRule {
            spark_chance: 0.05,
            ..LifeDiffusionRule::default()
        };
        let mut config = SimulationConfig::bounded(12)
            .with_seed(seed)
            .with_random_fill("on", 0.35)
            .with_execution(execution);
        if let Some(workers) = workers {
            config = config.with_worker_threads(workers);
        }
        let mut sim = Simulation::new(config, rule).unwrap();
        sim.run(25, &CancelToken::new()).unwrap();
        sorted_cells(&sim)
    }

    #[test]
    fn test_determinism_across_execution_modes() {
        let serial = diffusion_run(42, Execution::Serial, None);
        assert_eq!(serial, diffusion_run(42, Execution::Serial, None));
        assert_eq!(serial, diffusion_run(42, Execution::Parallel, None));
        assert_eq!(serial, diffusion_run(42, Execution::Parallel, Some(3)));
        assert_ne!(serial, diffusion_run(43, Execution::Serial, None));
    }

    #[test]
    fn test_random_draws_depend_only_on_position() {
        let rule = FnRule::new("Coin", |_cell, rng| {
            Ok(Some(CellState::new(if rng.chance(0.5) { "heads" } else { "tails" })))
        });
        let mut sim = Simulation::new(SimulationConfig::bounded(6).with_seed(9), rule).unwrap();
        sim.step().unwrap();
        for coord in hex_range(Coord::ORIGIN, 6) {
            let expected = if crate::domain::random::draw(9, 0, coord, 0) < 0.5 { "heads" } else { "tails" };
            assert_eq!(sim.get(coord), expected);
        }
    }

    #[test]
    fn test_scan_runs_once_per_tick() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let rule = FnRule::new("NearTarget", move |cell, _rng| {
            if *cell.state() == "target" {
                return Ok(None);
            }
            let targets = cell.scan("targets", |_, state| {
                counter.fetch_add(1, Ordering::Relaxed);
                *state == "target"
            });
            let near = targets.iter().any(|&t| cell.distance_to(t) <= 2);
            Ok(Some(CellState::new(if near { "path" } else { "off" })))
        });
        let config = SimulationConfig::bounded(4).with_cell(Coord::new(3, 0), "target");
        let mut sim = Simulation::new(config, rule).unwrap();

        sim.step().unwrap();
        // One predicate call per domain cell, not per cell squared
        assert_eq!(passes.load(Ordering::Relaxed), hex_count(4));
        assert_eq!(sim.get(Coord::new(1, 0)), "path");
        assert!(sim.get(Coord::new(0, 0)).is_off());

        sim.step().unwrap();
        assert_eq!(passes.load(Ordering::Relaxed), 2 * hex_count(4));
    }

    #[test]
    fn test_domain_limit_discards_tick() {
        let config = SimulationConfig::unbounded()
            .with_cell(Coord::ORIGIN, "on")
            .with_max_active_cells(5);
        let mut sim = Simulation::new(config, HexLifeRule).unwrap();

        let err = sim.step().unwrap_err();
        assert!(matches!(err, StepError::DomainLimitExceeded { size: 7, limit: 5 }));
        assert_eq!(sim.generation(), 0);
        assert_eq!(sim.get(Coord::ORIGIN), "on");
        assert_eq!(sim.phase(), Phase::Idle);
        assert!(!sim.grid().is_staging());
        assert!(sim.history().is_empty());
    }

    #[test]
    fn test_bounded_domain_limit() {
        let over = SimulationConfig::bounded(3).with_max_active_cells(hex_count(3) - 1);
        let result = Simulation::new(over, HexLifeRule);
        assert!(matches!(result, Err(ConfigError::DomainTooLarge { size: 37, limit: 36 })));

        let config = SimulationConfig::bounded(3)
            .with_cell(Coord::ORIGIN, "on")
            .with_max_active_cells(hex_count(3));
        let mut sim = Simulation::new(config, HexLifeRule).unwrap();
        assert_eq!(sim.step().unwrap().evaluated, 37);
    }

    #[test]
    fn test_cancel_stops_between_ticks() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let rule = FnRule::new("StopAtThree", move |cell, _rng| {
            if cell.generation() == 2 {
                trigger.cancel();
            }
            Ok(Some(CellState::new("on")))
        });
        let mut sim = Simulation::new(SimulationConfig::bounded(3), rule).unwrap();

        let report = sim.run(10, &cancel).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.ticks, 3);
        // The tick that raised the flag still committed in full
        assert_eq!(sim.generation(), 3);
        assert_eq!(sim.population(), hex_count(3));
        assert_eq!(sim.phase(), Phase::Idle);
    }

    #[test]
    fn test_out_of_range_and_early_history_are_off() {
        let config = SimulationConfig::bounded(2).with_cell(Coord::ORIGIN, "on");
        let mut sim = Simulation::new(config, HexLifeRule).unwrap();
        assert!(sim.get(Coord::new(0, 3)).is_off());
        assert!(sim.get_history(-1, Coord::ORIGIN).is_off());

        sim.step().unwrap();
        assert_eq!(sim.get_history(-1, Coord::ORIGIN), "on");
        assert!(sim.get_history(-2, Coord::ORIGIN).is_off());
        assert!(sim.get_history(-1, Coord::new(9, 9)).is_off());
    }

    #[test]
    fn test_history_never_exceeds_depth() {
        let config = SimulationConfig::bounded(3).with_history_depth(4).with_random_fill("on", 0.5);
        let mut sim = Simulation::new(config, HexLifeRule).unwrap();
        for _ in 0..20 {
            sim.step().unwrap();
            assert!(sim.history().len() <= 4);
        }
        assert_eq!(sim.history().len(), 4);
        let newest = sim.history().iter().last().unwrap();
        assert_eq!(newest.index(), sim.generation() - 1);
    }

    #[test]
    fn test_random_fill_is_seeded_and_overridable() {
        let config = |seed| {
            SimulationConfig::bounded(8)
                .with_seed(seed)
                .with_random_fill("on", 0.5)
                .with_cell(Coord::ORIGIN, "off")
        };
        let a = Simulation::new(config(5), HexLifeRule).unwrap();
        let b = Simulation::new(config(5), HexLifeRule).unwrap();
        assert_eq!(sorted_cells(&a), sorted_cells(&b));
        assert!(a.population() > 0);
        assert!(a.get(Coord::ORIGIN).is_off());
    }

    #[test]
    fn test_invalid_config_never_starts() {
        let config = SimulationConfig::bounded(4).with_history_depth(1);
        let result = Simulation::new(config, LifeDiffusionRule::default());
        assert!(matches!(result, Err(ConfigError::HistoryTooShallow { .. })));
    }

    #[test]
    fn test_boxed_rules_run() {
        let (_, rule) = crate::domain::all_rules().into_iter().next().unwrap();
        let config = SimulationConfig::bounded(2).with_cell(Coord::ORIGIN, "on");
        let mut sim = Simulation::new(config, rule).unwrap();
        assert_eq!(sim.rule().name(), "HexLife");
        sim.step().unwrap();
        assert_eq!(sim.population(), 0);
    }
}

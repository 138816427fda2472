//! Simulation configuration.
//!
//! Everything except the rule is plain data and can be loaded from JSON.
//! `validate` checks a config against the rule it will run before any tick.

use crate::domain::{CellState, Coord, Execution, Rule, Topology, hex_count};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Largest accepted bounded radius, about 12.6 million cells
pub const MAX_RADIUS: i64 = 1 << 11;

pub const DEFAULT_HISTORY_DEPTH: usize = 8;

fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("either boundedRadius or unbounded must be set")]
    MissingTopology,

    #[error("boundedRadius and unbounded are mutually exclusive")]
    ConflictingTopology,

    #[error("boundedRadius must be non-negative, got {0}")]
    NegativeRadius(i64),

    #[error("boundedRadius {0} exceeds the maximum of {max}", max = MAX_RADIUS)]
    RadiusTooLarge(i64),

    #[error("historyDepth {depth} is shallower than the {required} generations rule `{rule}` reads")]
    HistoryTooShallow {
        depth: usize,
        required: usize,
        rule: String,
    },

    #[error("state `{0}` appears more than once in the alphabet")]
    DuplicateState(CellState),

    #[error("state labels must not be empty")]
    EmptyLabel,

    #[error("state `{state}` at {coord} is not in the declared alphabet")]
    UnknownState { state: CellState, coord: Coord },

    #[error("cell {0} is placed more than once")]
    DuplicateCell(Coord),

    #[error("cell {0} lies outside the bounded domain")]
    CellOutOfBounds(Coord),

    #[error("randomFill requires a bounded domain")]
    RandomFillUnbounded,

    #[error("randomFill density must be within [0, 1], got {0}")]
    InvalidDensity(f64),

    #[error("bounded domain of {size} cells exceeds maxActiveCells of {limit}")]
    DomainTooLarge { size: usize, limit: usize },

    #[error("workerThreads must be at least 1")]
    ZeroWorkers,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One initial cell
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub q: i32,
    pub r: i32,
    pub state: CellState,
}

impl Placement {
    pub const fn coord(&self) -> Coord {
        Coord::new(self.q, self.r)
    }
}

/// Scatter `state` over a bounded domain at generation 0
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomFill {
    pub state: CellState,
    pub density: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounded_radius: Option<i64>,
    #[serde(default)]
    pub unbounded: bool,
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    #[serde(default)]
    pub seed: u64,
    /// Declared states besides `off`; empty means any label is accepted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alphabet: Vec<CellState>,
    #[serde(default)]
    pub initial_cells: Vec<Placement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_fill: Option<RandomFill>,
    #[serde(default)]
    pub execution: Execution,
    /// Size of a dedicated worker pool; the global rayon pool when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_threads: Option<usize>,
    /// Refuse ticks whose active domain is larger than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_active_cells: Option<usize>,
}

impl SimulationConfig {
    fn with_topology(bounded_radius: Option<i64>, unbounded: bool) -> Self {
        Self {
            bounded_radius,
            unbounded,
            history_depth: DEFAULT_HISTORY_DEPTH,
            seed: 0,
            alphabet: Vec::new(),
            initial_cells: Vec::new(),
            random_fill: None,
            execution: Execution::default(),
            worker_threads: None,
            max_active_cells: None,
        }
    }

    /// Hexagonal domain of the given radius around the origin
    pub fn bounded(radius: u32) -> Self {
        Self::with_topology(Some(i64::from(radius)), false)
    }

    /// Sparse, unbounded plane
    pub fn unbounded() -> Self {
        Self::with_topology(None, true)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_alphabet<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CellState>,
    {
        self.alphabet = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cell(mut self, coord: Coord, state: impl Into<CellState>) -> Self {
        self.initial_cells.push(Placement {
            q: coord.q,
            r: coord.r,
            state: state.into(),
        });
        self
    }

    pub fn with_cells<I, S>(self, cells: I) -> Self
    where
        I: IntoIterator<Item = (Coord, S)>,
        S: Into<CellState>,
    {
        cells
            .into_iter()
            .fold(self, |config, (coord, state)| config.with_cell(coord, state))
    }

    pub fn with_random_fill(mut self, state: impl Into<CellState>, density: f64) -> Self {
        self.random_fill = Some(RandomFill {
            state: state.into(),
            density,
        });
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub fn with_max_active_cells(mut self, limit: usize) -> Self {
        self.max_active_cells = Some(limit);
        self
    }

    /// Resolve `boundedRadius` / `unbounded` into a topology
    pub fn topology(&self) -> Result<Topology, ConfigError> {
        match (self.bounded_radius, self.unbounded) {
            (Some(_), true) => Err(ConfigError::ConflictingTopology),
            (None, false) => Err(ConfigError::MissingTopology),
            (None, true) => Ok(Topology::Unbounded),
            (Some(radius), false) if radius < 0 => Err(ConfigError::NegativeRadius(radius)),
            (Some(radius), false) if radius > MAX_RADIUS => Err(ConfigError::RadiusTooLarge(radius)),
            (Some(radius), false) => Ok(Topology::Bounded {
                radius: radius as u32,
            }),
        }
    }

    /// Check the config against the rule that will run it
    pub fn validate(&self, rule: &dyn Rule) -> Result<Topology, ConfigError> {
        let topology = self.topology()?;

        if let (Topology::Bounded { radius }, Some(limit)) = (topology, self.max_active_cells) {
            let size = hex_count(radius);
            if size > limit {
                return Err(ConfigError::DomainTooLarge { size, limit });
            }
        }

        let required = rule.history_depth();
        if self.history_depth < required {
            return Err(ConfigError::HistoryTooShallow {
                depth: self.history_depth,
                required,
                rule: rule.name().to_owned(),
            });
        }

        let alphabet = self.checked_alphabet()?;

        let mut seen = HashSet::with_capacity(self.initial_cells.len());
        for placement in &self.initial_cells {
            let coord = placement.coord();
            if placement.state.as_str().is_empty() {
                return Err(ConfigError::EmptyLabel);
            }
            if !seen.insert(coord) {
                return Err(ConfigError::DuplicateCell(coord));
            }
            if !topology.contains(coord) {
                return Err(ConfigError::CellOutOfBounds(coord));
            }
            if let Some(alphabet) = &alphabet {
                if !placement.state.is_off() && !alphabet.contains(&placement.state) {
                    return Err(ConfigError::UnknownState {
                        state: placement.state.clone(),
                        coord,
                    });
                }
            }
        }

        if let Some(fill) = &self.random_fill {
            if topology == Topology::Unbounded {
                return Err(ConfigError::RandomFillUnbounded);
            }
            if !(0.0..=1.0).contains(&fill.density) {
                return Err(ConfigError::InvalidDensity(fill.density));
            }
            if let Some(alphabet) = &alphabet {
                if !fill.state.is_off() && !alphabet.contains(&fill.state) {
                    return Err(ConfigError::UnknownState {
                        state: fill.state.clone(),
                        coord: Coord::ORIGIN,
                    });
                }
            }
        }

        if self.worker_threads == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }

        Ok(topology)
    }

    /// The declared alphabet as a set, or `None` when any label is allowed
    fn checked_alphabet(&self) -> Result<Option<HashSet<CellState>>, ConfigError> {
        if self.alphabet.is_empty() {
            return Ok(None);
        }
        let mut set = HashSet::with_capacity(self.alphabet.len());
        for state in &self.alphabet {
            if state.as_str().is_empty() {
                return Err(ConfigError::EmptyLabel);
            }
            if !set.insert(state.clone()) {
                return Err(ConfigError::DuplicateState(state.clone()));
            }
        }
        Ok(Some(set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HexLifeRule, LifeDiffusionRule};

    #[test]
    fn test_topology_resolution() {
        assert_eq!(
            SimulationConfig::bounded(5).topology().unwrap(),
            Topology::Bounded { radius: 5 }
        );
        assert_eq!(SimulationConfig::unbounded().topology().unwrap(), Topology::Unbounded);

        let mut both = SimulationConfig::bounded(5);
        both.unbounded = true;
        assert!(matches!(both.topology(), Err(ConfigError::ConflictingTopology)));

        let mut neither = SimulationConfig::unbounded();
        neither.unbounded = false;
        assert!(matches!(neither.topology(), Err(ConfigError::MissingTopology)));
    }

    #[test]
    fn test_negative_radius_rejected() {
        let config = SimulationConfig::from_json(r#"{ "boundedRadius": -3 }"#).unwrap();
        assert!(matches!(config.validate(&HexLifeRule), Err(ConfigError::NegativeRadius(-3))));
    }

    #[test]
    fn test_radius_limits() {
        assert!(SimulationConfig::bounded(MAX_RADIUS as u32).validate(&HexLifeRule).is_ok());
        assert!(matches!(
            SimulationConfig::bounded(65536).validate(&HexLifeRule),
            Err(ConfigError::RadiusTooLarge(65536))
        ));
    }

    #[test]
    fn test_bounded_domain_checked_against_cell_limit() {
        let config = SimulationConfig::bounded(3000).with_max_active_cells(10);
        assert!(matches!(config.topology(), Err(ConfigError::RadiusTooLarge(3000))));

        let config = SimulationConfig::bounded(2).with_max_active_cells(18);
        assert!(matches!(
            config.validate(&HexLifeRule),
            Err(ConfigError::DomainTooLarge { size: 19, limit: 18 })
        ));
        let config = SimulationConfig::bounded(2).with_max_active_cells(19);
        assert!(config.validate(&HexLifeRule).is_ok());
    }

    #[test]
    fn test_history_depth_must_cover_rule() {
        let rule = LifeDiffusionRule::default();
        let shallow = SimulationConfig::bounded(3).with_history_depth(2);
        assert!(matches!(
            shallow.validate(&rule),
            Err(ConfigError::HistoryTooShallow { depth: 2, required: 3, .. })
        ));
        assert!(SimulationConfig::bounded(3).with_history_depth(3).validate(&rule).is_ok());
    }

    #[test]
    fn test_duplicate_alphabet_rejected() {
        let config = SimulationConfig::unbounded().with_alphabet(["on", "green", "on"]);
        assert!(matches!(config.validate(&HexLifeRule), Err(ConfigError::DuplicateState(s)) if s == "on"));

        let off_twice = SimulationConfig::unbounded().with_alphabet(["off", "off"]);
        assert!(matches!(off_twice.validate(&HexLifeRule), Err(ConfigError::DuplicateState(_))));
    }

    #[test]
    fn test_placements_checked() {
        let outside = SimulationConfig::bounded(1).with_cell(Coord::new(2, 0), "on");
        assert!(matches!(outside.validate(&HexLifeRule), Err(ConfigError::CellOutOfBounds(_))));

        let twice = SimulationConfig::unbounded()
            .with_cell(Coord::ORIGIN, "on")
            .with_cell(Coord::ORIGIN, "on");
        assert!(matches!(twice.validate(&HexLifeRule), Err(ConfigError::DuplicateCell(_))));

        let unknown = SimulationConfig::unbounded()
            .with_alphabet(["on"])
            .with_cell(Coord::ORIGIN, "green");
        assert!(matches!(unknown.validate(&HexLifeRule), Err(ConfigError::UnknownState { .. })));
    }

    #[test]
    fn test_random_fill_checked() {
        let unbounded = SimulationConfig::unbounded().with_random_fill("on", 0.5);
        assert!(matches!(unbounded.validate(&HexLifeRule), Err(ConfigError::RandomFillUnbounded)));

        let dense = SimulationConfig::bounded(4).with_random_fill("on", 1.5);
        assert!(matches!(dense.validate(&HexLifeRule), Err(ConfigError::InvalidDensity(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = SimulationConfig::bounded(2).with_worker_threads(0);
        assert!(matches!(config.validate(&HexLifeRule), Err(ConfigError::ZeroWorkers)));
    }

    #[test]
    fn test_json_surface() {
        let config = SimulationConfig::from_json(
            r#"{
                "boundedRadius": 10,
                "historyDepth": 4,
                "seed": 7,
                "alphabet": ["on"],
                "initialCells": [{ "q": 0, "r": 0, "state": "on" }, { "q": 1, "r": -1, "state": "on" }],
                "execution": "serial",
                "workerThreads": 2
            }"#,
        )
        .unwrap();
        assert_eq!(config.history_depth, 4);
        assert_eq!(config.seed, 7);
        assert_eq!(config.initial_cells.len(), 2);
        assert_eq!(config.initial_cells[1].coord(), Coord::new(1, -1));
        assert_eq!(config.execution, Execution::Serial);
        assert_eq!(config.validate(&HexLifeRule).unwrap(), Topology::Bounded { radius: 10 });
    }

    #[test]
    fn test_json_defaults_and_unknown_fields() {
        let config = SimulationConfig::from_json(r#"{ "unbounded": true }"#).unwrap();
        assert_eq!(config.history_depth, DEFAULT_HISTORY_DEPTH);
        assert_eq!(config.execution, Execution::Parallel);

        let typo = SimulationConfig::from_json(r#"{ "unbounded": true, "histroyDepth": 3 }"#);
        assert!(matches!(typo, Err(ConfigError::Parse(_))));
    }
}

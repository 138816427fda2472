// Domain layer - hex grid, history, rules and evaluation
pub mod domain;

// Application layer - configuration and the tick scheduler
pub mod application;

// Re-exports for convenience
pub use domain::{
    CellContext, CellRng, CellState, Coord, Execution, FnRule, Rule, RuleError, RuleFault,
    RuleResult, Topology, all_rules, default_rule, hex_distance,
};
pub use application::{CancelToken, ConfigError, Simulation, SimulationConfig, StepError, TickReport};

mod config;
mod simulation;

pub use config::{
    ConfigError, DEFAULT_HISTORY_DEPTH, MAX_RADIUS, Placement, RandomFill, SimulationConfig,
};
pub use simulation::{CancelToken, Phase, RunReport, Simulation, StepError, TickReport};

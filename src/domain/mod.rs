mod cell;
mod coord;
mod evaluator;
mod execution;
mod grid;
mod history;
mod rules;
mod snapshot;
pub mod random;

pub use cell::CellState;
pub(crate) use cell::OFF;
pub use coord::{Coord, NEIGHBOR_OFFSETS, hex_count, hex_distance, hex_range};
pub use evaluator::{RuleFault, evaluate};
pub use execution::Execution;
pub use grid::{Generation, Grid, Topology};
pub use history::HistoryRing;
pub use random::CellRng;
pub use rules::{
    FnRule, GravityRule, HexLifeRule, LifeDiffusionRule, Rule, RuleError, RuleResult, all_rules,
    default_rule,
};
pub use snapshot::{CellContext, ScanKey, Snapshot};

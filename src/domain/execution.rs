//! Execution mode for fanning out cell evaluations within a tick.
//!
//! Both modes read the same immutable snapshot and draw from the same
//! position-addressed random source, so they produce identical generations.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    /// One cell after another on the calling thread
    Serial,
    /// Cells spread over rayon workers
    #[default]
    Parallel,
}

impl Execution {
    /// Get all available modes
    pub fn all() -> Vec<Execution> {
        vec![Execution::Serial, Execution::Parallel]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Execution::Serial => "Serial",
            Execution::Parallel => "Parallel",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Execution::Serial => "Cell by cell on the calling thread",
            Execution::Parallel => "Rayon work-stealing over the active domain",
        }
    }
}

use super::{CellContext, CellRng, CellState, Coord, Rule, Snapshot};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// A rule failure contained to one cell.
/// The cell keeps its previous state for the generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rule failed at {coord} while computing generation {generation}: {detail}")]
pub struct RuleFault {
    pub coord: Coord,
    /// Generation the failing tick was producing
    pub generation: u64,
    pub detail: String,
}

/// Run `rule` for one cell.
/// Returned errors and panics both become a `RuleFault`; `Ok(None)` keeps `state`.
///
/// The process panic hook still runs before a panic is caught, so the default
/// hook prints a message to stderr for each panicking cell. Prefer returning
/// `RuleError`, or install a quieter hook with `std::panic::set_hook`.
pub fn evaluate(
    rule: &dyn Rule,
    state: &CellState,
    coord: Coord,
    snapshot: &Snapshot<'_>,
    rng: &mut CellRng,
) -> Result<CellState, RuleFault> {
    let cell = CellContext::new(coord, state, snapshot);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate(&cell, rng)));

    let detail = match outcome {
        Ok(Ok(Some(next))) => return Ok(next),
        Ok(Ok(None)) => return Ok(state.clone()),
        Ok(Err(error)) => error.to_string(),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };

    Err(RuleFault {
        coord,
        generation: snapshot.generation() + 1,
        detail,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

use super::{CellContext, CellRng, CellState};

/// What a rule returns: `Some` for a new state, `None` for "unchanged"
pub type RuleResult = Result<Option<CellState>, RuleError>;

/// Failure reported by a rule for one cell
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RuleError {
    message: String,
}

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for RuleError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for RuleError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Trait for hexagonal transition rules.
/// A rule sees only its `CellContext` and its own `CellRng`; the return value
/// is its only effect on the simulation.
pub trait Rule: Send + Sync {
    /// Name of the rule
    fn name(&self) -> &str;

    /// Short description
    fn description(&self) -> &str {
        ""
    }

    /// Deepest `get_history` offset the rule reads. Simulations refuse to
    /// start with a shallower history.
    fn history_depth(&self) -> usize {
        0
    }

    /// Compute the next state of one cell
    fn evaluate(&self, cell: &CellContext<'_>, rng: &mut CellRng) -> RuleResult;
}

impl<R: Rule + ?Sized> Rule for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn description(&self) -> &str {
        (**self).description()
    }

    fn history_depth(&self) -> usize {
        (**self).history_depth()
    }

    fn evaluate(&self, cell: &CellContext<'_>, rng: &mut CellRng) -> RuleResult {
        (**self).evaluate(cell, rng)
    }
}

/// Rule backed by a closure
pub struct FnRule<F> {
    name: String,
    history_depth: usize,
    f: F,
}

impl<F> FnRule<F>
where
    F: Fn(&CellContext<'_>, &mut CellRng) -> RuleResult + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            history_depth: 0,
            f,
        }
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }
}

impl<F> Rule for FnRule<F>
where
    F: Fn(&CellContext<'_>, &mut CellRng) -> RuleResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn history_depth(&self) -> usize {
        self.history_depth
    }

    fn evaluate(&self, cell: &CellContext<'_>, rng: &mut CellRng) -> RuleResult {
        (self.f)(cell, rng)
    }
}

fn set(label: &str) -> RuleResult {
    Ok(Some(CellState::new(label)))
}

/// Hexagonal Life (B2/S23)
/// An off cell with exactly 2 on neighbors turns on; an on cell survives with 2 or 3.
#[derive(Clone, Copy)]
pub struct HexLifeRule;

impl Rule for HexLifeRule {
    fn name(&self) -> &str {
        "HexLife"
    }

    fn description(&self) -> &str {
        "B2/S23 on six neighbors"
    }

    fn evaluate(&self, cell: &CellContext<'_>, _rng: &mut CellRng) -> RuleResult {
        let on = cell.count_neighbors("on");
        match (cell.state().as_str(), on) {
            ("off", 2) => set("on"),
            ("on", 2 | 3) => set("on"),
            _ => set("off"),
        }
    }
}

/// Gravity
/// On cells fall while anything below them is empty; empty cells fill from above.
#[derive(Clone, Copy)]
pub struct GravityRule;

impl Rule for GravityRule {
    fn name(&self) -> &str {
        "Gravity"
    }

    fn description(&self) -> &str {
        "Cells fall down and slide diagonally"
    }

    fn evaluate(&self, cell: &CellContext<'_>, _rng: &mut CellRng) -> RuleResult {
        match cell.state().as_str() {
            "on" => {
                let below = [cell.get(0, 1), cell.get(-1, 1), cell.get(1, 0)];
                if below.iter().any(|s| s.is_off()) {
                    set("off")
                } else {
                    set("on")
                }
            }
            "off" => {
                let from_above = *cell.get(0, -1) == "on";
                let from_left = !cell.get(-1, 1).is_off() && *cell.get(-1, 0) == "on";
                let from_right = !cell.get(1, 0).is_off() && *cell.get(1, -1) == "on";
                if from_above || from_left || from_right {
                    set("on")
                } else {
                    set("off")
                }
            }
            _ => Ok(None),
        }
    }
}

/// Organic growth: sprouts (green) mature (blue) after holding for three
/// generations, dense areas decay (orange), decay spreads chaos (red), and
/// lone mature cells seed sparks (yellow) that sprout new growth.
#[derive(Clone, Copy)]
pub struct LifeDiffusionRule {
    /// Living cells in the 5x5 axial window before a sprout starts to decay
    pub density_threshold: usize,
    /// Chance that an empty cell spontaneously becomes a spark
    pub spark_chance: f64,
}

impl Default for LifeDiffusionRule {
    fn default() -> Self {
        Self {
            density_threshold: 8,
            spark_chance: 0.0,
        }
    }
}

#[derive(Default)]
struct StateCounts {
    green: usize,
    blue: usize,
    orange: usize,
    yellow: usize,
    red: usize,
}

impl LifeDiffusionRule {
    fn counts(cell: &CellContext<'_>) -> StateCounts {
        cell.neighbors().fold(StateCounts::default(), |mut counts, state| {
            match state.as_str() {
                "green" => counts.green += 1,
                "blue" => counts.blue += 1,
                "orange" => counts.orange += 1,
                "yellow" => counts.yellow += 1,
                "red" => counts.red += 1,
                _ => {}
            }
            counts
        })
    }

    /// Green or blue cells in the axial window `dq, dr ∈ [-2, 2]` around the
    /// cell, itself excluded. The window is 24 cells, wider than the 18-cell
    /// hex ring of radius 2, and the density thresholds are tuned to it.
    fn local_life(cell: &CellContext<'_>) -> usize {
        (-2..=2)
            .flat_map(|dq| (-2..=2).map(move |dr| (dq, dr)))
            .filter(|&offset| offset != (0, 0))
            .map(|(dq, dr)| cell.get(dq, dr))
            .filter(|s| *s == "green" || *s == "blue")
            .count()
    }
}

impl Rule for LifeDiffusionRule {
    fn name(&self) -> &str {
        "LifeDiffusion"
    }

    fn description(&self) -> &str {
        "Sprouts, maturation, decay and chaos"
    }

    fn history_depth(&self) -> usize {
        3
    }

    fn evaluate(&self, cell: &CellContext<'_>, rng: &mut CellRng) -> RuleResult {
        // Raw "on" cells are converted into a life stage by cluster size
        if *cell.state() == "on" {
            return match cell.count_neighbors("on") {
                0 => set("off"),
                1..=2 => set("green"),
                3..=4 => set("blue"),
                _ => set("orange"),
            };
        }

        let counts = Self::counts(cell);
        match cell.state().as_str() {
            "off" => {
                let lone_mature = counts.blue == 1
                    && counts.green == 0
                    && counts.orange == 0
                    && counts.red == 0
                    && counts.yellow == 0;
                if lone_mature || (self.spark_chance > 0.0 && rng.chance(self.spark_chance)) {
                    set("yellow")
                } else {
                    Ok(None)
                }
            }
            "green" => {
                if counts.red > 0 {
                    return set("red");
                }
                if Self::local_life(cell) >= self.density_threshold {
                    return set("orange");
                }
                if counts.blue + counts.green == 0 {
                    return set("off");
                }
                let matured = (1..=3).all(|back| *cell.get_history(-back, 0, 0) == "green");
                if matured { set("blue") } else { Ok(None) }
            }
            "blue" => {
                if counts.red > 0 {
                    set("red")
                } else if counts.green + counts.blue <= 1 {
                    set("green")
                } else if Self::local_life(cell) > self.density_threshold + 6 {
                    set("orange")
                } else {
                    Ok(None)
                }
            }
            "orange" => {
                if counts.red > 0 || counts.orange >= 3 {
                    set("red")
                } else {
                    set("off")
                }
            }
            "yellow" => {
                if counts.red > 0 {
                    set("red")
                } else if cell.neighbors().any(|s| s.is_off()) {
                    set("green")
                } else {
                    set("off")
                }
            }
            "red" => set("off"),
            _ => Ok(None),
        }
    }
}

/// Get all available rules
pub fn all_rules() -> Vec<(&'static str, Box<dyn Rule>)> {
    vec![
        ("HexLife", Box::new(HexLifeRule) as Box<dyn Rule>),
        ("Gravity", Box::new(GravityRule)),
        ("LifeDiffusion", Box::new(LifeDiffusionRule::default())),
    ]
}

/// Get default rule (hexagonal Life)
pub fn default_rule() -> Box<dyn Rule> {
    Box::new(HexLifeRule)
}

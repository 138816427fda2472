use super::cell::OFF;
use super::{CellState, Coord, hex_range};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Shape of the coordinate domain a grid covers
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Topology {
    /// Hexagon of the given radius around the origin
    Bounded { radius: u32 },
    /// Whole plane, stored sparsely
    Unbounded,
}

impl Topology {
    pub const fn contains(&self, coord: Coord) -> bool {
        match *self {
            Topology::Bounded { radius } => {
                let dq = (coord.q as i64).unsigned_abs();
                let dr = (coord.r as i64).unsigned_abs();
                let ds = (coord.q as i64 + coord.r as i64).unsigned_abs();
                (dq + dr + ds) / 2 <= radius as u64
            }
            Topology::Unbounded => true,
        }
    }
}

/// Generation is an immutable picture of the grid at one tick boundary.
/// Only non-`off` cells are stored.
#[derive(Clone, Debug, Default)]
pub struct Generation {
    index: u64,
    cells: HashMap<Coord, CellState>,
}

impl Generation {
    pub(crate) fn new(index: u64, cells: HashMap<Coord, CellState>) -> Self {
        Self { index, cells }
    }

    pub const fn index(&self) -> u64 {
        self.index
    }

    /// State at `coord`, `off` when nothing was recorded there
    pub fn get(&self, coord: Coord) -> &CellState {
        self.cells.get(&coord).unwrap_or(&OFF)
    }

    /// Number of non-`off` cells
    pub fn population(&self) -> usize {
        self.cells.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, &CellState)> + '_ {
        self.cells.iter().map(|(&coord, state)| (coord, state))
    }
}

/// Grid holds the committed generation plus the staging buffer of the tick
/// in flight. `commit` is the only way the current generation changes.
pub struct Grid {
    topology: Topology,
    current: Arc<Generation>,
    next: Option<HashMap<Coord, CellState>>,
}

impl Grid {
    /// Create an empty grid (every cell `off`) at generation 0
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            current: Arc::new(Generation::default()),
            next: None,
        }
    }

    /// Create generation 0 from explicit cells. Cells outside the domain are dropped.
    pub fn with_cells(
        topology: Topology,
        cells: impl IntoIterator<Item = (Coord, CellState)>,
    ) -> Self {
        let cells = cells
            .into_iter()
            .filter(|(coord, state)| !state.is_off() && topology.contains(*coord))
            .collect();

        Self {
            topology,
            current: Arc::new(Generation::new(0, cells)),
            next: None,
        }
    }

    pub const fn topology(&self) -> Topology {
        self.topology
    }

    pub fn generation(&self) -> u64 {
        self.current.index()
    }

    pub fn current(&self) -> &Arc<Generation> {
        &self.current
    }

    /// Current-generation state, `off` outside a bounded domain
    pub fn get(&self, coord: Coord) -> &CellState {
        if self.topology.contains(coord) {
            self.current.get(coord)
        } else {
            &OFF
        }
    }

    pub fn population(&self) -> usize {
        self.current.population()
    }

    /// Whether a next buffer is being filled
    pub fn is_staging(&self) -> bool {
        self.next.is_some()
    }

    /// Write into the next buffer. Never visible through `get` until `commit`.
    pub fn stage(&mut self, coord: Coord, state: CellState) {
        if !self.topology.contains(coord) {
            return;
        }
        let next = self.next.get_or_insert_with(HashMap::new);
        if state.is_off() {
            next.remove(&coord);
        } else {
            next.insert(coord, state);
        }
    }

    /// Drop everything staged, keeping the current generation authoritative
    pub fn discard(&mut self) {
        self.next = None;
    }

    /// Swap the staged buffer in as the next generation and return the one it replaces.
    /// Cells never staged during the tick are `off` in the new generation.
    pub fn commit(&mut self) -> Arc<Generation> {
        let staged = self.next.take().unwrap_or_default();
        let next = Arc::new(Generation::new(self.current.index() + 1, staged));
        std::mem::replace(&mut self.current, next)
    }

    /// Coordinates to evaluate this tick.
    /// Bounded grids cover the whole hexagon; unbounded grids cover live cells
    /// and their immediate neighbors. Sorted so iteration order is stable.
    pub fn active_domain(&self) -> Vec<Coord> {
        match self.topology {
            Topology::Bounded { radius } => hex_range(Coord::ORIGIN, radius).collect(),
            Topology::Unbounded => {
                let domain: HashSet<Coord> = self
                    .current
                    .iter()
                    .flat_map(|(coord, _)| std::iter::once(coord).chain(coord.neighbors()))
                    .collect();
                let mut domain: Vec<Coord> = domain.into_iter().collect();
                domain.sort_unstable();
                domain
            }
        }
    }
}

//! Read-only view of one tick.
//!
//! A [`Snapshot`] is built from the committed generation and the history ring
//! before any cell is evaluated, and is shared by every evaluation of that
//! tick. Rules see it through a [`CellContext`], which resolves relative
//! offsets against the cell being evaluated.

use super::cell::OFF;
use super::{CellState, Coord, Generation, Grid, HistoryRing, NEIGHBOR_OFFSETS, Topology, hex_distance};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Identity of a memoized scan within a tick
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ScanKey {
    /// All cells in the given state
    State(CellState),
    /// A caller-named predicate; the name stands for the predicate for the whole tick
    Named(Cow<'static, str>),
}

type ScanSlot = Arc<OnceLock<Arc<[Coord]>>>;

pub struct Snapshot<'a> {
    topology: Topology,
    current: &'a Generation,
    history: &'a HistoryRing,
    domain: &'a [Coord],
    scans: Mutex<HashMap<ScanKey, ScanSlot>>,
    scan_passes: AtomicUsize,
}

impl<'a> Snapshot<'a> {
    pub fn new(grid: &'a Grid, history: &'a HistoryRing, domain: &'a [Coord]) -> Self {
        Self {
            topology: grid.topology(),
            current: grid.current().as_ref(),
            history,
            domain,
            scans: Mutex::new(HashMap::new()),
            scan_passes: AtomicUsize::new(0),
        }
    }

    /// Index of the generation being read
    pub fn generation(&self) -> u64 {
        self.current.index()
    }

    pub const fn topology(&self) -> Topology {
        self.topology
    }

    /// Coordinates evaluated this tick, also the range every scan covers
    pub const fn domain(&self) -> &'a [Coord] {
        self.domain
    }

    pub fn get(&self, coord: Coord) -> &'a CellState {
        if self.topology.contains(coord) {
            self.current.get(coord)
        } else {
            &OFF
        }
    }

    pub fn get_history(&self, offset: i64, coord: Coord) -> &'a CellState {
        if self.topology.contains(coord) {
            self.history.get_history(offset, coord)
        } else {
            &OFF
        }
    }

    /// Every domain coordinate currently in `state`, computed once per tick
    pub fn scan_state(&self, state: &CellState) -> Arc<[Coord]> {
        self.scan_keyed(ScanKey::State(state.clone()), |_, current| current == state)
    }

    /// Every domain coordinate matching `predicate`, memoized under `name`.
    /// Later calls with the same name reuse the first result without running
    /// their predicate.
    pub fn scan<P>(&self, name: impl Into<Cow<'static, str>>, predicate: P) -> Arc<[Coord]>
    where
        P: Fn(Coord, &CellState) -> bool,
    {
        self.scan_keyed(ScanKey::Named(name.into()), predicate)
    }

    /// Number of full-domain passes run so far
    pub fn scan_passes(&self) -> usize {
        self.scan_passes.load(Ordering::Relaxed)
    }

    fn scan_keyed<P>(&self, key: ScanKey, predicate: P) -> Arc<[Coord]>
    where
        P: Fn(Coord, &CellState) -> bool,
    {
        // Hold the map lock only long enough to find the slot; the pass itself
        // runs under the slot's OnceLock so concurrent callers wait on it.
        let slot = {
            let mut scans = self.scans.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(scans.entry(key).or_default())
        };

        Arc::clone(slot.get_or_init(|| {
            self.scan_passes.fetch_add(1, Ordering::Relaxed);
            self.domain
                .iter()
                .copied()
                .filter(|&coord| predicate(coord, self.get(coord)))
                .collect()
        }))
    }
}

/// CellContext is what a rule sees: its own state and coordinate, and
/// accessors into the tick's snapshot.
pub struct CellContext<'s> {
    coord: Coord,
    state: &'s CellState,
    snapshot: &'s Snapshot<'s>,
}

impl<'s> CellContext<'s> {
    pub fn new(coord: Coord, state: &'s CellState, snapshot: &'s Snapshot<'s>) -> Self {
        Self { coord, state, snapshot }
    }

    pub const fn coord(&self) -> Coord {
        self.coord
    }

    pub const fn q(&self) -> i32 {
        self.coord.q
    }

    pub const fn r(&self) -> i32 {
        self.coord.r
    }

    /// State before this tick
    pub const fn state(&self) -> &'s CellState {
        self.state
    }

    /// Index of the generation being read
    pub fn generation(&self) -> u64 {
        self.snapshot.generation()
    }

    /// State at a relative offset from this cell
    pub fn get(&self, dq: i32, dr: i32) -> &'s CellState {
        self.snapshot.get(self.coord.offset(dq, dr))
    }

    pub fn get_at(&self, coord: Coord) -> &'s CellState {
        self.snapshot.get(coord)
    }

    /// State at a relative offset, `-offset` generations before the current one
    pub fn get_history(&self, offset: i64, dq: i32, dr: i32) -> &'s CellState {
        self.snapshot.get_history(offset, self.coord.offset(dq, dr))
    }

    pub fn get_history_at(&self, offset: i64, coord: Coord) -> &'s CellState {
        self.snapshot.get_history(offset, coord)
    }

    /// The six adjacent states in `NEIGHBOR_OFFSETS` order
    pub fn neighbors(&self) -> impl Iterator<Item = &'s CellState> + '_ {
        NEIGHBOR_OFFSETS.into_iter().map(|(dq, dr)| self.get(dq, dr))
    }

    pub fn count_neighbors(&self, label: &str) -> usize {
        self.neighbors().filter(|state| state.as_str() == label).count()
    }

    pub fn distance_to(&self, coord: Coord) -> u64 {
        hex_distance(self.coord, coord)
    }

    pub fn scan_state(&self, state: &CellState) -> Arc<[Coord]> {
        self.snapshot.scan_state(state)
    }

    pub fn scan<P>(&self, name: impl Into<Cow<'static, str>>, predicate: P) -> Arc<[Coord]>
    where
        P: Fn(Coord, &CellState) -> bool,
    {
        self.snapshot.scan(name, predicate)
    }

    pub const fn snapshot(&self) -> &'s Snapshot<'s> {
        self.snapshot
    }
}

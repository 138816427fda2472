use serde::{Deserialize, Serialize};
use std::fmt;

/// The six axial neighbor offsets, clockwise from east.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

/// Axial hex coordinate `(q, r)`.
/// The implied cube coordinate is `s = -q - r`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
pub struct Coord {
    pub q: i32,
    pub r: i32,
}

impl Coord {
    pub const ORIGIN: Coord = Coord { q: 0, r: 0 };

    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Third cube axis
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    /// Coordinate shifted by a relative offset.
    /// Saturates at the edge of the addressable plane instead of wrapping.
    pub const fn offset(self, dq: i32, dr: i32) -> Self {
        Self {
            q: self.q.saturating_add(dq),
            r: self.r.saturating_add(dr),
        }
    }

    /// The six adjacent coordinates in `NEIGHBOR_OFFSETS` order
    pub fn neighbors(self) -> impl Iterator<Item = Coord> {
        NEIGHBOR_OFFSETS.into_iter().map(move |(dq, dr)| self.offset(dq, dr))
    }

    pub fn distance(self, other: Coord) -> u64 {
        hex_distance(self, other)
    }

    /// Distance from the origin
    pub fn length(self) -> u64 {
        hex_distance(self, Coord::ORIGIN)
    }
}

impl From<(i32, i32)> for Coord {
    fn from((q, r): (i32, i32)) -> Self {
        Self::new(q, r)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

/// Hex distance between two axial coordinates.
/// Computed in 64-bit so extreme coordinates cannot overflow.
pub fn hex_distance(a: Coord, b: Coord) -> u64 {
    let dq = i64::from(a.q) - i64::from(b.q);
    let dr = i64::from(a.r) - i64::from(b.r);
    (dq.unsigned_abs() + (dq + dr).unsigned_abs() + dr.unsigned_abs()) / 2
}

/// Every coordinate within `radius` of `center`, ordered by `q` then `r`.
pub fn hex_range(center: Coord, radius: u32) -> impl Iterator<Item = Coord> {
    let radius = radius as i32;
    (-radius..=radius).flat_map(move |dq| {
        let low = (-radius).max(-dq - radius);
        let high = radius.min(-dq + radius);
        (low..=high).map(move |dr| center.offset(dq, dr))
    })
}

/// Number of cells in a hexagon of the given radius: `3R(R+1) + 1`
pub const fn hex_count(radius: u32) -> usize {
    let r = radius as usize;
    3 * r * (r + 1) + 1
}

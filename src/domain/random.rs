//! Seeded, position-addressed randomness.
//!
//! Every value is a pure function of `(seed, generation, coord, sequence)`,
//! so the numbers a cell sees do not depend on which worker evaluates it or
//! in what order.

use super::Coord;
use rand::RngCore;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// SplitMix64 finalizer
#[inline]
const fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Raw 64-bit value for one draw
pub const fn draw_u64(seed: u64, generation: u64, coord: Coord, sequence: u64) -> u64 {
    let mut h = mix64(seed.wrapping_add(GOLDEN_GAMMA));
    h = mix64(h ^ generation.wrapping_mul(GOLDEN_GAMMA));
    h = mix64(h ^ ((coord.q as u32 as u64) << 32) ^ (coord.r as u32 as u64));
    mix64(h ^ sequence.wrapping_add(GOLDEN_GAMMA))
}

/// Uniform float in `[0, 1)` for one draw
pub const fn draw(seed: u64, generation: u64, coord: Coord, sequence: u64) -> f64 {
    unit_f64(draw_u64(seed, generation, coord, sequence))
}

/// Top 53 bits as a float in `[0, 1)`
#[inline]
const fn unit_f64(bits: u64) -> f64 {
    (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

/// CellRng hands out the draws for one cell in one tick.
/// Each call advances `sequence`; implements `RngCore` so rules can use `rand::Rng`.
#[derive(Clone, Debug)]
pub struct CellRng {
    seed: u64,
    generation: u64,
    coord: Coord,
    sequence: u64,
}

impl CellRng {
    pub const fn new(seed: u64, generation: u64, coord: Coord) -> Self {
        Self {
            seed,
            generation,
            coord,
            sequence: 0,
        }
    }

    /// Next float in `[0, 1)`
    pub fn draw(&mut self) -> f64 {
        unit_f64(self.next_u64())
    }

    /// `true` with probability `p`
    pub fn chance(&mut self, p: f64) -> bool {
        self.draw() < p
    }

    /// How many draws have been taken
    pub const fn draws(&self) -> u64 {
        self.sequence
    }
}

impl RngCore for CellRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let value = draw_u64(self.seed, self.generation, self.coord, self.sequence);
        self.sequence += 1;
        value
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

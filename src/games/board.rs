//! Seeded board generation and per-round hazard density

use crate::games::types::Coord;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeSet;

/// Board dimensions derived from the lobby size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridParams {
    pub grid_size: u8,
    pub base_mine_count: u16,
}

impl GridParams {
    /// Larger lobbies play on larger boards with proportionally more mines.
    pub fn for_max_players(max_players: u8) -> Self {
        let (grid_size, base_mine_count) = match max_players {
            0..=2 => (5, 3),
            3..=4 => (6, 5),
            5..=6 => (8, 8),
            7..=8 => (10, 12),
            _ => (12, 18),
        };
        Self {
            grid_size,
            base_mine_count,
        }
    }

    pub fn total_cells(&self) -> u16 {
        u16::from(self.grid_size) * u16::from(self.grid_size)
    }
}

/// Mine count for `round`: `floor(base * 1.2^(round - 1))`, capped so that every
/// active player still has at least one safe tile left to reach.
pub fn round_mine_count(base_mine_count: u16, round: u8, grid_size: u8, active_players: usize) -> u16 {
    let total = u32::from(grid_size) * u32::from(grid_size);
    let cap = total.saturating_sub(active_players as u32 + 1);

    // 1.2 = 6/5, kept exact in integers
    let mut numerator = u128::from(base_mine_count);
    let mut denominator: u128 = 1;
    for _ in 1..round.max(1) {
        if numerator / denominator >= u128::from(cap) {
            break;
        }
        numerator *= 6;
        denominator *= 5;
    }

    let mines = (numerator / denominator).min(u128::from(cap));
    mines as u16
}

/// Hazard layout of one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub grid_size: u8,
    pub mines: BTreeSet<Coord>,
}

impl Board {
    pub fn contains_mine(&self, coord: Coord) -> bool {
        self.mines.contains(&coord)
    }

    pub fn in_bounds(&self, (x, y): Coord) -> bool {
        x < self.grid_size && y < self.grid_size
    }

    pub fn mine_count(&self) -> usize {
        self.mines.len()
    }
}

/// Place `mine_count` distinct mines on a `grid_size x grid_size` board.
///
/// Pure function of its inputs: a partial Fisher-Yates shuffle driven by a
/// ChaCha20 stream seeded with `seed`, so every subset of cells is equally
/// likely and any board can be replayed from its seed.
pub fn generate_board(seed: [u8; 32], grid_size: u8, mine_count: u16) -> Board {
    let total = usize::from(grid_size) * usize::from(grid_size);
    let mine_count = usize::from(mine_count);
    if mine_count > total {
        tracing::warn!(
            requested = mine_count,
            cells = total,
            "Board already full, clamping mine count"
        );
    }
    let mine_count = mine_count.min(total);

    let mut cells: Vec<u16> = (0..total as u16).collect();
    let mut rng = ChaCha20Rng::from_seed(seed);
    // Draw indices as u32: usize sampling consumes a different word width per target.
    for i in 0..mine_count {
        let j = rng.gen_range(i as u32..total as u32) as usize;
        cells.swap(i, j);
    }

    let side = u16::from(grid_size);
    let mines = cells[..mine_count]
        .iter()
        .map(|&cell| ((cell / side) as u8, (cell % side) as u8))
        .collect();

    Board { grid_size, mines }
}

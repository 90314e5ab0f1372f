//! World initialisation and rendering on the coordinator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::grid::CellGrid;

/// Gosper glider gun, from <https://bitstorm.org/gameoflife/>.
pub const GLIDER_GUN: [&str; 22] = [
    "..........................................",
    "..........................................",
    "..........................................",
    "..........................................",
    "..........................................",
    "..........................................",
    "........................OO.........OO.....",
    ".......................O.O.........OO.....",
    ".OO.......OO...........OO.................",
    ".OO......O.O..............................",
    ".........OO......OO.......................",
    ".................O.O......................",
    ".................O........................",
    "....................................OO....",
    "....................................O.O...",
    "....................................O.....",
    "..........................................",
    "..........................................",
    ".........................OOO..............",
    ".........................O................",
    "..........................O...............",
    "..........................................",
];

/// Default seed of the random fill.
pub const DEFAULT_SEED: u64 = 1;

/// How the coordinator fills the world before the first step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldInit {
    /// Every cell alive with probability one half.
    Random {
        /// RNG seed; equal seeds give equal worlds.
        seed: u64,
    },
    /// The glider gun pattern, clipped to the world. Cells outside the
    /// pattern are dead.
    Fixed,
    /// A caller-supplied pattern of `'.'` (dead) and anything else (alive),
    /// clipped the same way as [`WorldInit::Fixed`].
    Pattern(Vec<String>),
}

impl Default for WorldInit {
    fn default() -> Self {
        WorldInit::Random { seed: DEFAULT_SEED }
    }
}

impl WorldInit {
    /// Assign a state to every real cell of `world`.
    pub fn apply(&self, world: &mut CellGrid) {
        match self {
            WorldInit::Random { seed } => fill_random(world, *seed),
            WorldInit::Fixed => fill_pattern(world, GLIDER_GUN.iter().copied()),
            WorldInit::Pattern(lines) => fill_pattern(world, lines.iter().map(String::as_str)),
        }
    }
}

fn fill_random(world: &mut CellGrid, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for row in 1..=world.rows() {
        for col in 1..=world.cols() {
            world.set(row, col, rng.gen::<f32>() >= 0.5);
        }
    }
}

fn fill_pattern<'a>(world: &mut CellGrid, lines: impl Iterator<Item = &'a str>) {
    for row in 1..=world.rows() {
        world.real_row_mut(row).fill(0);
    }
    for (r, line) in lines.take(world.rows()).enumerate() {
        for (c, ch) in line.chars().take(world.cols()).enumerate() {
            world.set(r + 1, c + 1, ch != '.');
        }
    }
}

/// Render the real cells: `'O'` alive, `' '` dead, one line per row.
pub fn render(world: &CellGrid) -> String {
    let mut out = String::with_capacity(world.rows() * (world.cols() + 1));
    for row in 1..=world.rows() {
        for &cell in world.real_row(row) {
            out.push(if cell != 0 { 'O' } else { ' ' });
        }
        out.push('\n');
    }
    out
}

/// Number of live cells in the world.
pub fn live_count(world: &CellGrid) -> usize {
    world.live_count()
}

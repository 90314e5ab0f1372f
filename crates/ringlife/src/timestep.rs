//! The Game of Life timestep kernel.

use crate::grid::{CellGrid, ALIVE, DEAD};

/// Next state of a cell given its current state and live neighbour count.
///
/// Three neighbours bring a cell to life, two keep its state, anything else
/// kills it.
#[inline(always)]
pub fn next_state(current: u8, neighbours: u8) -> u8 {
    match neighbours {
        3 => ALIVE,
        2 => current,
        _ => DEAD,
    }
}

/// Compute the real cells of `new` from the haloed grid `old`.
///
/// `old` must have had its margin filled (column wrap plus ghost rows).
/// Only the real cells of `new` are written; its margin is left for the
/// next halo exchange.
pub fn step(old: &CellGrid, new: &mut CellGrid) {
    debug_assert_eq!((old.rows(), old.cols()), (new.rows(), new.cols()));

    let cells = old.as_bytes();
    let sw = old.stride();

    for row in 1..=old.rows() {
        let out = new.real_row_mut(row);
        for (c, cell) in out.iter_mut().enumerate() {
            let idx = row * sw + c + 1;

            let nsum = cells[idx - sw - 1]
                + cells[idx - sw]
                + cells[idx - sw + 1]
                + cells[idx - 1]
                + cells[idx + 1]
                + cells[idx + sw - 1]
                + cells[idx + sw]
                + cells[idx + sw + 1];

            *cell = next_state(cells[idx], nsum);
        }
    }
}

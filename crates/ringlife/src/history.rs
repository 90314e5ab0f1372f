//! Rolling window of past partition states and local cycle detection.
//!
//! The window is a fixed ring of buffers indexed by `iteration % capacity`.
//! The slot at the cursor is the current state; the others hold the most
//! recent previous states until the ring wraps over them.

use ringlife_core::error::{Result, RingLifeError};

use crate::grid::CellGrid;

/// Default number of states kept per worker.
pub const HISTORY: usize = 3;

/// Ring buffer of partition states with an explicit cursor.
#[derive(Debug)]
pub struct History {
    slots: Vec<CellGrid>,
    /// Slot holding the current state.
    cursor: usize,
    /// Iteration of the current state.
    iteration: u64,
}

impl History {
    /// Allocate a window of [`HISTORY`] states for a `rows x cols` partition.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        Self::with_capacity(rows, cols, HISTORY)
    }

    /// Allocate a window of `capacity` states. The current state is at
    /// iteration 0 in slot 0.
    pub fn with_capacity(rows: usize, cols: usize, capacity: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(RingLifeError::Config(format!(
                "history needs at least 2 slots, got {}",
                capacity
            )));
        }
        let slots = (0..capacity)
            .map(|_| CellGrid::allocate(rows, cols, "history slot"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            slots,
            cursor: 0,
            iteration: 0,
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iteration of the current state.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Current state.
    pub fn current(&self) -> &CellGrid {
        &self.slots[self.cursor]
    }

    /// Current state, mutable. Used to seed iteration 0 and to refresh the
    /// margin after an exchange.
    pub fn current_mut(&mut self) -> &mut CellGrid {
        &mut self.slots[self.cursor]
    }

    /// Advance to the next iteration, letting `f` write the new state from
    /// the current one. The slot being written is the oldest in the window
    /// and its previous contents are lost.
    pub fn advance<F>(&mut self, f: F)
    where
        F: FnOnce(&CellGrid, &mut CellGrid),
    {
        let next_iteration = self.iteration + 1;
        let next = self.slot_of(next_iteration);
        let (current, target) = pair_mut(&mut self.slots, self.cursor, next);
        f(current, target);
        self.cursor = next;
        self.iteration = next_iteration;
    }

    /// Most recent previous iteration whose full buffer, margin included,
    /// equals the current one.
    pub fn find_cycle(&self) -> Option<u64> {
        let current = self.current().as_bytes();
        let oldest = self
            .iteration
            .saturating_sub(self.capacity() as u64 - 1);

        (oldest..self.iteration)
            .rev()
            .find(|&i| self.slots[self.slot_of(i)].as_bytes() == current)
    }

    fn slot_of(&self, iteration: u64) -> usize {
        (iteration % self.capacity() as u64) as usize
    }
}

/// Shared reference to `slots[read]` and mutable reference to `slots[write]`.
fn pair_mut(slots: &mut [CellGrid], read: usize, write: usize) -> (&CellGrid, &mut CellGrid) {
    assert_ne!(read, write, "history slots must differ");
    if read < write {
        let (head, tail) = slots.split_at_mut(write);
        (&head[read], &mut tail[0])
    } else {
        let (head, tail) = slots.split_at_mut(read);
        (&tail[0], &mut head[write])
    }
}

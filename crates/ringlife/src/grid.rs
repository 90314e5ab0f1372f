//! Cell storage with a one-cell margin.
//!
//! Both the coordinator's full world and every worker's partition use the
//! same layout: `(rows + 2) x (cols + 2)` bytes, row-major, with real cells
//! at buffer rows `1..=rows` and columns `1..=cols`.
//!
//! ```text
//! +--+----------------+--+
//! |  | ghost row (top)|  |
//! +--+----------------+--+
//! |W |                |E |
//! |  |   real cells   |  |
//! +--+----------------+--+
//! |  | ghost row (bot)|  |
//! +--+----------------+--+
//! ```

use ringlife_core::error::{Result, RingLifeError};

/// Byte value of a dead cell.
pub const DEAD: u8 = 0;
/// Byte value of a live cell.
pub const ALIVE: u8 = 1;

/// Row-major cell buffer with a one-cell margin on every side.
#[derive(Clone, PartialEq, Eq)]
pub struct CellGrid {
    rows: usize,
    cols: usize,
    /// Buffer width including margin: cols + 2.
    stride: usize,
    cells: Vec<u8>,
}

impl std::fmt::Debug for CellGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellGrid")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("live", &self.live_count())
            .finish()
    }
}

impl CellGrid {
    /// Allocate an all-dead grid of `rows x cols` real cells.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        Self::allocate(rows, cols, "grid")
    }

    /// Allocate an all-dead grid, naming the buffer in allocation errors.
    pub fn allocate(rows: usize, cols: usize, what: &'static str) -> Result<Self> {
        let stride = cols.checked_add(2).ok_or(RingLifeError::Allocation {
            what,
            cells: usize::MAX,
        })?;
        let len = rows
            .checked_add(2)
            .and_then(|r| r.checked_mul(stride))
            .ok_or(RingLifeError::Allocation {
                what,
                cells: usize::MAX,
            })?;

        let mut cells = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| RingLifeError::Allocation { what, cells: len })?;
        cells.resize(len, DEAD);

        Ok(Self {
            rows,
            cols,
            stride,
            cells,
        })
    }

    /// Number of real rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of real columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Buffer row width including the margin.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Buffer index of `(row, col)` in margin coordinates.
    #[inline(always)]
    pub fn idx(&self, row: usize, col: usize) -> usize {
        row * self.stride + col
    }

    /// Cell at margin coordinates `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells[self.idx(row, col)] != DEAD
    }

    /// Set the cell at margin coordinates `(row, col)`.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, alive: bool) {
        let idx = self.idx(row, col);
        self.cells[idx] = if alive { ALIVE } else { DEAD };
    }

    /// Full-width buffer row `row`, margin columns included.
    pub fn row(&self, row: usize) -> &[u8] {
        let start = row * self.stride;
        &self.cells[start..start + self.stride]
    }

    /// Mutable full-width buffer row.
    pub fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let start = row * self.stride;
        &mut self.cells[start..start + self.stride]
    }

    /// Real cells of buffer row `row`, margin columns excluded.
    pub fn real_row(&self, row: usize) -> &[u8] {
        let start = row * self.stride + 1;
        &self.cells[start..start + self.cols]
    }

    /// Mutable real cells of buffer row `row`.
    pub fn real_row_mut(&mut self, row: usize) -> &mut [u8] {
        let start = row * self.stride + 1;
        &mut self.cells[start..start + self.cols]
    }

    /// The whole buffer, margin included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// Overwrite this grid with `other`. Both must have the same shape.
    pub fn copy_from(&mut self, other: &CellGrid) {
        debug_assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        self.cells.copy_from_slice(&other.cells);
    }

    /// Copy each real row's last column into the left margin and its first
    /// column into the right margin.
    pub fn wrap_columns(&mut self) {
        let cols = self.cols;
        for row in 1..=self.rows {
            let line = self.row_mut(row);
            line[0] = line[cols];
            line[cols + 1] = line[1];
        }
    }

    /// Number of live real cells.
    pub fn live_count(&self) -> usize {
        (1..=self.rows)
            .map(|row| self.real_row(row).iter().filter(|&&c| c != DEAD).count())
            .sum()
    }
}

//! Halo exchange between ring neighbours.
//!
//! Columns are never split, so the left and right margins are filled
//! locally from the partition's own rows. Rows are split, so the ghost rows
//! come from the neighbouring ranks:
//!
//! ```text
//!        rank r-1                      rank r+1
//!   [ last real row ] --> ghost top
//!                         first real row --> [ ghost bottom ] of r-1
//!                         last real row  --> [ ghost top ] of r+1
//!                         ghost bottom <-- [ first real row ]
//! ```
//!
//! The ring wraps, so rank 0's upper neighbour is the last rank and a ring
//! of one rank exchanges with itself.

use ringlife_core::message::message_type::HALO_ROW;
use ringlife_core::prelude::*;

use crate::grid::CellGrid;

/// Tag of a row travelling to the upper neighbour (a first real row).
pub const TAG_TO_UP: u64 = 0;
/// Tag of a row travelling to the lower neighbour (a last real row).
pub const TAG_TO_DOWN: u64 = 1;

/// The two ranks a worker exchanges ghost rows with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingNeighbours {
    /// Rank owning the rows above.
    pub up: Rank,
    /// Rank owning the rows below.
    pub down: Rank,
}

impl RingNeighbours {
    /// Neighbours of `rank` in a ring of `size`.
    pub fn of(rank: Rank, size: usize) -> Self {
        Self {
            up: rank.up(size),
            down: rank.down(size),
        }
    }
}

/// Fill the margin of `grid` for `iteration`.
///
/// Both rows are handed to the neighbours before either receive is awaited, and the call
/// returns only once both ghost rows are in place. A row that fails to
/// arrive, arrives for another iteration, or has the wrong width is fatal.
pub async fn exchange(endpoint: &mut Endpoint, grid: &mut CellGrid, iteration: u64) -> Result<()> {
    let rank = endpoint.rank();
    let neighbours = RingNeighbours::of(rank, endpoint.size());
    let rows = grid.rows();

    grid.wrap_columns();

    endpoint
        .deliver(
            neighbours.up,
            MessageEnvelope::new(HALO_ROW, rank, TAG_TO_UP, iteration, grid.row(1).to_vec()),
        )
        .await?;
    endpoint
        .deliver(
            neighbours.down,
            MessageEnvelope::new(HALO_ROW, rank, TAG_TO_DOWN, iteration, grid.row(rows).to_vec()),
        )
        .await?;

    let from_up = endpoint
        .recv_from(neighbours.up, HALO_ROW, TAG_TO_DOWN)
        .await?;
    let from_down = endpoint
        .recv_from(neighbours.down, HALO_ROW, TAG_TO_UP)
        .await?;

    apply_ghost_row(grid, 0, &from_up, iteration)?;
    apply_ghost_row(grid, rows + 1, &from_down, iteration)?;

    tracing::trace!(
        "{} halo exchanged with up={} down={} at iteration {}",
        rank,
        neighbours.up,
        neighbours.down,
        iteration
    );

    Ok(())
}

fn apply_ghost_row(
    grid: &mut CellGrid,
    row: usize,
    envelope: &MessageEnvelope,
    iteration: u64,
) -> Result<()> {
    if envelope.header.iteration != iteration {
        return Err(RingLifeError::Communication(format!(
            "halo row from {} belongs to iteration {}, expected {}",
            envelope.header.source, envelope.header.iteration, iteration
        )));
    }
    let data = envelope.expect_len(grid.stride())?;
    grid.row_mut(row).copy_from_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ALIVE;
    use crate::partition::RowPartition;

    /// Partition of a `rows x cols` world whose cell values encode their
    /// global row, so ghost rows can be checked by content.
    fn labelled(part: &RowPartition, cols: usize) -> CellGrid {
        let mut grid = CellGrid::new(part.local_rows, cols).unwrap();
        for local in 1..=part.local_rows {
            let global = part.global_row(local);
            for c in 1..=cols {
                grid.set(local, c, (global + c) % 3 == 0);
            }
        }
        grid
    }

    async fn check_ring(rows: usize, cols: usize, workers: usize) {
        let broker = CommBuilder::new().receive_timeout_ms(1_000).build(workers);
        let parts = RowPartition::all(rows, workers).unwrap();

        let mut handles = Vec::new();
        for part in parts.clone() {
            let mut endpoint = broker.register(part.rank).unwrap();
            handles.push(tokio::spawn(async move {
                let mut grid = labelled(&part, cols);
                exchange(&mut endpoint, &mut grid, 1).await.unwrap();
                // Keep the endpoint alive until every peer has received.
                (grid, endpoint)
            }));
        }

        let mut grids = Vec::new();
        for handle in handles {
            grids.push(handle.await.unwrap().0);
        }

        for (r, grid) in grids.iter().enumerate() {
            let up = &grids[(r + workers - 1) % workers];
            let down = &grids[(r + 1) % workers];
            assert_eq!(grid.row(0), up.row(up.rows()), "ghost top of rank {}", r);
            assert_eq!(grid.row(grid.rows() + 1), down.row(1), "ghost bottom of rank {}", r);
        }
    }

    #[tokio::test]
    async fn test_single_rank_wraps_onto_itself() {
        check_ring(5, 4, 1).await;
    }

    #[tokio::test]
    async fn test_two_ranks() {
        check_ring(6, 5, 2).await;
    }

    #[tokio::test]
    async fn test_uneven_ring() {
        check_ring(11, 7, 4).await;
        check_ring(7, 3, 7).await;
    }

    #[tokio::test]
    async fn test_ghost_rows_include_wrapped_columns() {
        let broker = CommBuilder::new().build(1);
        let mut endpoint = broker.register(Rank(0)).unwrap();
        let mut grid = CellGrid::new(2, 3).unwrap();
        grid.set(2, 3, true);

        exchange(&mut endpoint, &mut grid, 0).await.unwrap();

        // Last row wrapped: [c3, c1, c2, c3, c1] -> [1, 0, 0, 1, 0].
        assert_eq!(grid.row(0), &[ALIVE, 0, 0, ALIVE, 0]);
        assert_eq!(grid.row(3), &[0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_truncated_row_is_rejected() {
        let broker = CommBuilder::new().receive_timeout_ms(100).build(2);
        let mut e0 = broker.register(Rank(0)).unwrap();
        let e1 = broker.register(Rank(1)).unwrap();

        // Rank 1 sends a row that is one cell short, in both directions.
        for tag in [TAG_TO_UP, TAG_TO_DOWN] {
            e1.post(Rank(0), MessageEnvelope::new(HALO_ROW, Rank(1), tag, 1, vec![0; 4]))
                .unwrap();
        }

        let mut grid = CellGrid::new(2, 4).unwrap();
        let err = exchange(&mut e0, &mut grid, 1).await.unwrap_err();
        assert!(matches!(err, RingLifeError::Malformed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_neighbour_times_out() {
        let broker = CommBuilder::new().receive_timeout_ms(100).build(3);
        let mut e0 = broker.register(Rank(0)).unwrap();
        let _e1 = broker.register(Rank(1)).unwrap();
        let _e2 = broker.register(Rank(2)).unwrap();

        let mut grid = CellGrid::new(2, 4).unwrap();
        let err = exchange(&mut e0, &mut grid, 1).await.unwrap_err();
        assert!(err.is_communication());
    }
}

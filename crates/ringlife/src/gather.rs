//! Moving rows between the coordinator's world and the partitions.
//!
//! Gather: each non-coordinating rank sends its real rows, one message per
//! row, tagged with the row's global index. The coordinator copies its own
//! rows directly and places every received row at its tag, in whatever order
//! the rows arrive. Gathering only reads partitions, so it can run at any
//! point of a round.
//!
//! Scatter is the same protocol in reverse and runs once, to hand every rank
//! its share of the initial world.
//!
//! Rows are sent with [`Endpoint::deliver`], so a world larger than the
//! coordinator's inbox is streamed rather than rejected.

use ringlife_core::message::message_type::{GATHER_ROW, SCATTER_ROW};
use ringlife_core::prelude::*;

use crate::grid::CellGrid;
use crate::partition::RowPartition;

/// Gather `local` into `world` on the coordinator.
///
/// `world` must be `Some` on the coordinator and is ignored elsewhere.
pub async fn gather(
    endpoint: &mut Endpoint,
    part: &RowPartition,
    local: &CellGrid,
    world: Option<&mut CellGrid>,
    iteration: u64,
) -> Result<()> {
    if !endpoint.rank().is_root() {
        return send_rows(endpoint, part, local, iteration).await;
    }

    let world = world.ok_or_else(|| {
        RingLifeError::Config("coordinator gather needs a world buffer".to_string())
    })?;
    collect_rows(endpoint, part, local, world, iteration).await
}

async fn send_rows(
    endpoint: &Endpoint,
    part: &RowPartition,
    local: &CellGrid,
    iteration: u64,
) -> Result<()> {
    let rank = endpoint.rank();
    for row in 1..=part.local_rows {
        let global = part.global_row(row) as u64;
        endpoint
            .deliver(
                Rank::ROOT,
                MessageEnvelope::new(
                    GATHER_ROW,
                    rank,
                    global,
                    iteration,
                    local.real_row(row).to_vec(),
                ),
            )
            .await?;
    }
    Ok(())
}

async fn collect_rows(
    endpoint: &mut Endpoint,
    part: &RowPartition,
    local: &CellGrid,
    world: &mut CellGrid,
    iteration: u64,
) -> Result<()> {
    if world.cols() != local.cols() || world.rows() < part.end() {
        return Err(RingLifeError::Config(format!(
            "world of {}x{} cannot hold rows {}..{} of width {}",
            world.rows(),
            world.cols(),
            part.start,
            part.end(),
            local.cols()
        )));
    }

    for row in 1..=part.local_rows {
        world
            .real_row_mut(part.global_row(row) + 1)
            .copy_from_slice(local.real_row(row));
    }

    let mut received = vec![false; world.rows()];
    for _ in 0..world.rows() - part.local_rows {
        let envelope = endpoint.recv_type(GATHER_ROW).await?;
        let source = envelope.header.source;
        if envelope.header.iteration != iteration {
            return Err(RingLifeError::Communication(format!(
                "row {} from {} belongs to iteration {}, expected {}",
                envelope.header.tag, source, envelope.header.iteration, iteration
            )));
        }

        let global = usize::try_from(envelope.header.tag)
            .ok()
            .filter(|&g| g < world.rows() && !part.contains(g) && !received[g])
            .ok_or_else(|| {
                RingLifeError::Malformed(format!(
                    "unexpected row {} from {} at iteration {}",
                    envelope.header.tag, source, iteration
                ))
            })?;
        let data = envelope.expect_len(world.cols())?;
        world.real_row_mut(global + 1).copy_from_slice(data);
        received[global] = true;
    }

    tracing::debug!(
        "gathered {}x{} world at iteration {}",
        world.rows(),
        world.cols(),
        iteration
    );
    Ok(())
}

/// Hand each rank its rows of the initial world and fill `local` with the
/// coordinator's own rows.
///
/// The coordinator passes `Some(world)` together with every rank's
/// partition; other ranks pass `None` and receive into `local`.
pub async fn scatter(
    endpoint: &mut Endpoint,
    part: &RowPartition,
    local: &mut CellGrid,
    world: Option<(&CellGrid, &[RowPartition])>,
) -> Result<()> {
    let rank = endpoint.rank();

    if let Some((world, parts)) = world {
        for row in 1..=part.local_rows {
            local
                .real_row_mut(row)
                .copy_from_slice(world.real_row(part.global_row(row) + 1));
        }
        for peer in parts.iter().filter(|p| p.rank != rank) {
            for row in 1..=peer.local_rows {
                let global = peer.global_row(row);
                endpoint
                    .deliver(
                        peer.rank,
                        MessageEnvelope::new(
                            SCATTER_ROW,
                            rank,
                            global as u64,
                            0,
                            world.real_row(global + 1).to_vec(),
                        ),
                    )
                    .await?;
            }
        }
        return Ok(());
    }

    for row in 1..=part.local_rows {
        let global = part.global_row(row) as u64;
        let envelope = endpoint.recv_from(Rank::ROOT, SCATTER_ROW, global).await?;
        let data = envelope.expect_len(local.cols())?;
        local.real_row_mut(row).copy_from_slice(data);
    }
    Ok(())
}

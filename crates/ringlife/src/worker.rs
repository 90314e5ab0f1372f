//! Per-rank simulation state and the bulk-synchronous round loop.
//!
//! A [`Worker`] owns everything its rank touches: the partition history, the
//! messaging endpoint and, on the coordinator, the world buffer and report
//! sink. Every worker runs the same sequence of rounds:
//!
//! 1. timestep kernel into the next history slot
//! 2. halo exchange of the new state
//! 3. local cycle check against the history window
//! 4. consensus round with the coordinator
//! 5. gather, when a report is due or the run ends
//! 6. stop if the verdict says so

use std::sync::Arc;

use ringlife_core::prelude::*;

use crate::config::SimConfig;
use crate::consensus::consensus_round;
use crate::gather::{gather, scatter};
use crate::grid::CellGrid;
use crate::halo;
use crate::history::History;
use crate::partition::RowPartition;
use crate::report::{ReportEvent, ReportSink};
use crate::timestep;
use crate::world;

/// Coordinator-only state.
struct Coordinator {
    world: CellGrid,
    parts: Vec<RowPartition>,
    sink: Arc<dyn ReportSink>,
}

/// One rank of the simulation.
pub struct Worker {
    part: RowPartition,
    endpoint: Endpoint,
    history: History,
    config: Arc<SimConfig>,
    coordinator: Option<Coordinator>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("part", &self.part)
            .field("iteration", &self.history.iteration())
            .field("coordinator", &self.coordinator.is_some())
            .finish()
    }
}

/// What a worker leaves behind when its loop ends.
#[derive(Debug)]
pub struct WorkerOutcome {
    /// Rank of the worker.
    pub rank: Rank,
    /// Last iteration computed.
    pub iterations: u64,
    /// `(iteration, matches)` of the detected cycle, if any.
    pub cycle: Option<(u64, u64)>,
    /// Live cells in this worker's own rows.
    pub local_live_cells: usize,
    /// Gathered final world; only set on the coordinator.
    pub world: Option<CellGrid>,
}

impl Worker {
    /// Create a non-coordinating worker.
    pub fn new(config: Arc<SimConfig>, part: RowPartition, endpoint: Endpoint) -> Result<Self> {
        let history = History::with_capacity(part.local_rows, config.cols, config.history)?;
        Ok(Self {
            part,
            endpoint,
            history,
            config,
            coordinator: None,
        })
    }

    /// Create the coordinating worker. It owns the initial `world`, knows
    /// every rank's partition, and writes reports to `sink`.
    pub fn coordinator(
        config: Arc<SimConfig>,
        part: RowPartition,
        endpoint: Endpoint,
        world: CellGrid,
        parts: Vec<RowPartition>,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self> {
        let mut worker = Self::new(config, part, endpoint)?;
        worker.coordinator = Some(Coordinator { world, parts, sink });
        Ok(worker)
    }

    /// This worker's rank.
    pub fn rank(&self) -> Rank {
        self.part.rank
    }

    /// Run the simulation loop to completion.
    pub async fn run(mut self) -> Result<WorkerOutcome> {
        let rank = self.rank();
        let steps = self.config.steps;

        self.distribute_initial_world().await?;
        if self.config.print_world > 0 {
            if let Some(coord) = &self.coordinator {
                let text = world::render(&coord.world);
                self.report(ReportEvent::InitialWorld { text })?;
            }
        }

        halo::exchange(&mut self.endpoint, self.history.current_mut(), 0).await?;

        let mut cycle = None;
        let mut gathered = None;
        let mut iteration = 0;
        while iteration + 1 < steps {
            iteration += 1;

            self.history.advance(timestep::step);
            halo::exchange(&mut self.endpoint, self.history.current_mut(), iteration).await?;

            let local = self.history.find_cycle();
            let verdict = consensus_round(&mut self.endpoint, iteration, local, steps).await?;
            tracing::debug!(
                "{} iteration {}: local={:?} verdict={:?}",
                rank,
                iteration,
                local,
                verdict
            );

            if let Some(matches) = verdict.cycle {
                cycle = Some((iteration, matches));
                self.report(ReportEvent::CycleDetected { iteration, matches })?;
            }

            let show_cells = self.config.prints_cells_at(iteration);
            let show_world = self.config.prints_world_at(iteration);
            if show_cells || show_world {
                self.collect(iteration).await?;
                gathered = Some(iteration);
                self.report_world(iteration, show_cells, show_world)?;
            }

            if verdict.cycle.is_some() && self.config.print_world > 0 {
                if gathered != Some(iteration) {
                    self.collect(iteration).await?;
                    gathered = Some(iteration);
                }
                if let Some(coord) = &self.coordinator {
                    let text = world::render(&coord.world);
                    self.report(ReportEvent::CycleWorld { iteration, text })?;
                }
            }

            if verdict.stop {
                break;
            }
        }

        // Every rank takes the same branch: `gathered` follows from the
        // config and the shared verdicts only.
        if gathered != Some(iteration) {
            self.collect(iteration).await?;
        }

        let world = match self.coordinator.take() {
            Some(coord) => {
                let count = coord.world.live_count();
                coord.sink.write(&ReportEvent::FinalCount { count })?;
                coord.sink.flush()?;
                tracing::info!(
                    "simulation finished after {} iterations with {} live cells",
                    iteration,
                    count
                );
                Some(coord.world)
            }
            None => None,
        };

        Ok(WorkerOutcome {
            rank,
            iterations: iteration,
            cycle,
            local_live_cells: self.history.current().live_count(),
            world,
        })
    }

    async fn distribute_initial_world(&mut self) -> Result<()> {
        let current = self.history.current_mut();
        match &self.coordinator {
            Some(coord) => {
                scatter(
                    &mut self.endpoint,
                    &self.part,
                    current,
                    Some((&coord.world, coord.parts.as_slice())),
                )
                .await
            }
            None => scatter(&mut self.endpoint, &self.part, current, None).await,
        }
    }

    async fn collect(&mut self, iteration: u64) -> Result<()> {
        let world = self.coordinator.as_mut().map(|coord| &mut coord.world);
        gather(
            &mut self.endpoint,
            &self.part,
            self.history.current(),
            world,
            iteration,
        )
        .await
    }

    fn report_world(&self, iteration: u64, show_cells: bool, show_world: bool) -> Result<()> {
        let Some(coord) = &self.coordinator else {
            return Ok(());
        };
        if show_cells {
            let count = coord.world.live_count();
            coord.sink.write(&ReportEvent::LiveCells { iteration, count })?;
        }
        if show_world {
            let text = world::render(&coord.world);
            coord.sink.write(&ReportEvent::World { iteration, text })?;
        }
        Ok(())
    }

    fn report(&self, event: ReportEvent) -> Result<()> {
        if let Some(coord) = &self.coordinator {
            if let ReportEvent::CycleDetected { iteration, matches } = &event {
                tracing::debug!(
                    "world iteration {} is equal to iteration {}",
                    iteration,
                    matches
                );
            }
            coord.sink.write(&event)?;
        }
        Ok(())
    }
}

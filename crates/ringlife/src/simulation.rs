//! Simulation driver.
//!
//! Builds the communicator, partitions the world, spawns one task per rank
//! and collects their outcomes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use ringlife_core::prelude::*;

use crate::config::SimConfig;
use crate::grid::CellGrid;
use crate::partition::RowPartition;
use crate::report::{NullSink, ReportSink};
use crate::worker::{Worker, WorkerOutcome};

/// Result of a finished run, as seen by the coordinator.
#[derive(Debug)]
pub struct SimulationReport {
    /// Final world.
    pub world: CellGrid,
    /// Live cells in the final world.
    pub live_cells: usize,
    /// Last iteration computed.
    pub iterations: u64,
    /// `(iteration, matches)` if the run stopped on a cycle.
    pub cycle: Option<(u64, u64)>,
    /// Wall time of the run, partitioning included.
    pub elapsed: Duration,
    /// Envelopes delivered by the broker.
    pub messages_delivered: u64,
}

/// A configured simulation.
pub struct Simulation {
    config: Arc<SimConfig>,
    sink: Arc<dyn ReportSink>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Create a simulation. Reports are discarded until a sink is set.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            sink: Arc::new(NullSink),
        })
    }

    /// Send coordinator reports to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The configuration this simulation runs with.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run every rank to completion.
    ///
    /// The first worker error aborts the remaining workers and is returned.
    pub async fn run(&self) -> Result<SimulationReport> {
        let started = Instant::now();
        let config = &self.config;

        let parts = RowPartition::all(config.rows, config.workers)?;
        let broker = CommBuilder::with_config(config.effective_comm()).build(config.workers);

        let mut world = CellGrid::allocate(config.rows, config.cols, "world")?;
        config.init.apply(&mut world);

        tracing::info!(
            "starting {}x{} world on {} workers for {} steps",
            config.rows,
            config.cols,
            config.workers,
            config.steps
        );

        let mut workers = Vec::with_capacity(parts.len());
        for part in &parts {
            let endpoint = broker.register(part.rank)?;
            let worker = if part.rank.is_root() {
                Worker::coordinator(
                    Arc::clone(config),
                    *part,
                    endpoint,
                    world.clone(),
                    parts.clone(),
                    Arc::clone(&self.sink),
                )?
            } else {
                Worker::new(Arc::clone(config), *part, endpoint)?
            };
            tracing::debug!("{} owns rows {}..{}", part.rank, part.start, part.end());
            workers.push(worker);
        }
        drop(world);

        let mut tasks = JoinSet::new();
        for worker in workers {
            tasks.spawn(worker.run());
        }

        let mut coordinator: Option<WorkerOutcome> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => {
                    tracing::error!("worker failed: {}", err);
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join) => {
                    tasks.abort_all();
                    return Err(RingLifeError::WorkerFailed(join.to_string()));
                }
            };
            tracing::debug!(
                "{} finished at iteration {} with {} local live cells",
                outcome.rank,
                outcome.iterations,
                outcome.local_live_cells
            );
            if outcome.rank.is_root() {
                coordinator = Some(outcome);
            }
        }

        let outcome = coordinator.ok_or_else(|| {
            RingLifeError::WorkerFailed("coordinator produced no outcome".to_string())
        })?;
        let world = outcome.world.ok_or_else(|| {
            RingLifeError::WorkerFailed("coordinator returned no world".to_string())
        })?;

        Ok(SimulationReport {
            live_cells: world.live_count(),
            world,
            iterations: outcome.iterations,
            cycle: outcome.cycle,
            elapsed: started.elapsed(),
            messages_delivered: broker.stats().messages_delivered,
        })
    }
}

//! Simulation configuration.

use ringlife_core::comm::CommConfig;
use ringlife_core::error::{Result, RingLifeError};

use crate::history::HISTORY;
use crate::world::WorldInit;

/// Everything a simulation run needs to know up front.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// World rows.
    pub rows: usize,
    /// World columns.
    pub cols: usize,
    /// Step limit. Iterations `1..steps` are computed.
    pub steps: u64,
    /// Print the world every this many iterations (0 disables).
    pub print_world: u64,
    /// Print the live cell count every this many iterations (0 disables).
    pub print_cells: u64,
    /// Number of worker ranks.
    pub workers: usize,
    /// How the coordinator fills the initial world.
    pub init: WorldInit,
    /// States kept per worker for cycle detection.
    pub history: usize,
    /// Messaging configuration.
    pub comm: CommConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rows: 64,
            cols: 64,
            steps: 100,
            print_world: 0,
            print_cells: 0,
            workers: 1,
            init: WorldInit::default(),
            history: HISTORY,
            comm: CommConfig::default(),
        }
    }
}

impl SimConfig {
    /// Start building a configuration.
    pub fn builder() -> SimConfigBuilder {
        SimConfigBuilder::new()
    }

    /// Check the configuration before anything is partitioned or allocated.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(RingLifeError::Config(format!(
                "world must have at least one row and column, got {}x{}",
                self.rows, self.cols
            )));
        }
        if self.steps == 0 {
            return Err(RingLifeError::Config(
                "step count must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(RingLifeError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.workers > self.rows {
            return Err(RingLifeError::Config(format!(
                "{} workers need at least {} rows, got {}",
                self.workers, self.workers, self.rows
            )));
        }
        if self.history < 2 {
            return Err(RingLifeError::Config(format!(
                "history needs at least 2 slots, got {}",
                self.history
            )));
        }
        Ok(())
    }

    /// Messaging configuration with inboxes large enough for the per-round
    /// traffic of every rank. Gather rows stream through with backpressure
    /// and need no room of their own.
    pub fn effective_comm(&self) -> CommConfig {
        let mut comm = self.comm.clone();
        let needed = 2 * self.workers + 8;
        comm.max_pending_messages = comm.max_pending_messages.max(needed);
        comm
    }

    /// Whether the live cell count is printed at `iteration`.
    pub fn prints_cells_at(&self, iteration: u64) -> bool {
        due(self.print_cells, iteration)
    }

    /// Whether the world is printed at `iteration`.
    pub fn prints_world_at(&self, iteration: u64) -> bool {
        due(self.print_world, iteration)
    }
}

fn due(interval: u64, iteration: u64) -> bool {
    interval > 0 && iteration % interval == interval - 1
}

/// Builder for [`SimConfig`].
#[derive(Debug, Clone, Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    /// Create a builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the world size.
    pub fn world(mut self, rows: usize, cols: usize) -> Self {
        self.config.rows = rows;
        self.config.cols = cols;
        self
    }

    /// Set the step limit.
    pub fn steps(mut self, steps: u64) -> Self {
        self.config.steps = steps;
        self
    }

    /// Set the world print interval.
    pub fn print_world(mut self, interval: u64) -> Self {
        self.config.print_world = interval;
        self
    }

    /// Set the live cell print interval.
    pub fn print_cells(mut self, interval: u64) -> Self {
        self.config.print_cells = interval;
        self
    }

    /// Set the number of worker ranks.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the initial world.
    pub fn init(mut self, init: WorldInit) -> Self {
        self.config.init = init;
        self
    }

    /// Set the number of states kept for cycle detection.
    pub fn history(mut self, slots: usize) -> Self {
        self.config.history = slots;
        self
    }

    /// Set the receive timeout.
    pub fn receive_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.comm.receive_timeout_ms = timeout;
        self
    }

    /// Set the capacity of every rank's inbox.
    pub fn max_pending_messages(mut self, count: usize) -> Self {
        self.config.comm.max_pending_messages = count;
        self
    }

    /// Enable per-message tracing.
    pub fn enable_tracing(mut self, enable: bool) -> Self {
        self.config.comm.enable_tracing = enable;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

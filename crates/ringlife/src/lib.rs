//! # ringlife
//!
//! Conway's Game of Life on a torus, split by rows across a ring of worker
//! ranks.
//!
//! Each rank owns a contiguous band of rows plus one halo row above and
//! below, and one wrap column on either side. After every timestep the ranks
//! swap boundary rows with their ring neighbours, check their recent history
//! for a repeat, and agree with the coordinator (rank 0) on whether the whole
//! world has entered a cycle. The coordinator gathers the world whenever a
//! report is due.
//!
//! ## Example
//!
//! ```
//! use ringlife::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let config = SimConfig::builder()
//!     .world(32, 32)
//!     .steps(50)
//!     .workers(4)
//!     .init(WorldInit::Random { seed: 7 })
//!     .build()?;
//!
//! let report = Simulation::new(config)?.run().await?;
//! println!("{} live cells after {} iterations", report.live_cells, report.iterations);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod consensus;
pub mod gather;
pub mod grid;
pub mod halo;
pub mod history;
pub mod partition;
pub mod report;
pub mod simulation;
pub mod timestep;
pub mod worker;
pub mod world;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{SimConfig, SimConfigBuilder};
    pub use crate::grid::{CellGrid, ALIVE, DEAD};
    pub use crate::partition::RowPartition;
    pub use crate::report::{MemorySink, NullSink, ReportEvent, ReportSink, StdoutSink};
    pub use crate::simulation::{Simulation, SimulationReport};
    pub use crate::world::{WorldInit, GLIDER_GUN};
    pub use ringlife_core::prelude::*;
}

pub use config::SimConfig;
pub use simulation::{Simulation, SimulationReport};
pub use world::WorldInit;

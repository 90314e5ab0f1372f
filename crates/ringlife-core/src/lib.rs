//! # ringlife Core
//!
//! Message passing substrate for the ringlife row-partitioned Game of Life.
//!
//! Workers are arranged in a ring by [`Rank`]. Each owns an [`Endpoint`]
//! registered with a shared [`CommBroker`] and talks to its peers only by
//! exchanging [`MessageEnvelope`]s; nothing about the simulation state is
//! shared between workers.
//!
//! ## Example
//!
//! ```
//! use ringlife_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let broker = CommBuilder::new().build(2);
//! let root = broker.register(Rank(0))?;
//! let mut peer = broker.register(Rank(1))?;
//!
//! root.post(Rank(1), MessageEnvelope::new(message_type::VERDICT, Rank(0), 0, 1, vec![1]))?;
//! let envelope = peer.recv_from(Rank(0), message_type::VERDICT, 0).await?;
//! assert_eq!(envelope.payload, vec![1]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comm;
pub mod error;
pub mod message;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::comm::{
        CommBroker, CommBuilder, CommConfig, CommStats, DeliveryReceipt, DeliveryStatus, Endpoint,
    };
    pub use crate::error::*;
    pub use crate::message::{message_type, MessageEnvelope, MessageHeader, Rank};
}

pub use comm::{CommBroker, CommBuilder, CommConfig, Endpoint};
pub use error::{Result, RingLifeError};
pub use message::{MessageEnvelope, MessageHeader, Rank};

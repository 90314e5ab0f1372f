//! Message envelopes exchanged between worker ranks.
//!
//! An envelope is a small fixed header plus an opaque byte payload. The
//! header carries enough routing information (type, source, tag, iteration)
//! for a receiver to match the envelope against an outstanding receive,
//! in the same spirit as MPI's `(source, tag)` matching.

use std::fmt;

use crate::error::{Result, RingLifeError};

/// Rank of a worker in the ring, `0..size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Rank(pub usize);

impl Rank {
    /// The coordinating rank.
    pub const ROOT: Rank = Rank(0);

    /// Index value of this rank.
    pub fn index(self) -> usize {
        self.0
    }

    /// True for the coordinating rank.
    pub fn is_root(self) -> bool {
        self.0 == 0
    }

    /// Rank above this one in a ring of `size` workers.
    pub fn up(self, size: usize) -> Rank {
        Rank((self.0 + size - 1) % size)
    }

    /// Rank below this one in a ring of `size` workers.
    pub fn down(self, size: usize) -> Rank {
        Rank((self.0 + 1) % size)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rank{}", self.0)
    }
}

impl From<usize> for Rank {
    fn from(value: usize) -> Self {
        Rank(value)
    }
}

/// Well-known message type identifiers.
pub mod message_type {
    /// Boundary row sent to a ring neighbour.
    pub const HALO_ROW: u64 = 200;
    /// Local cycle result sent to the coordinator.
    pub const CYCLE_REPORT: u64 = 300;
    /// Coordinator verdict broadcast to every worker.
    pub const VERDICT: u64 = 301;
    /// Real row sent to the coordinator during a gather.
    pub const GATHER_ROW: u64 = 400;
    /// Initial real row sent from the coordinator to its owner.
    pub const SCATTER_ROW: u64 = 401;
}

/// Routing header for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Message type identifier (see [`message_type`]).
    pub message_type: u64,
    /// Sending rank.
    pub source: Rank,
    /// Protocol-specific tag used for matching.
    pub tag: u64,
    /// Simulation iteration the message belongs to.
    pub iteration: u64,
    /// Payload length in bytes.
    pub payload_len: usize,
}

impl MessageHeader {
    /// Create a new header.
    pub fn new(message_type: u64, source: Rank, tag: u64, iteration: u64, payload_len: usize) -> Self {
        Self {
            message_type,
            source,
            tag,
            iteration,
            payload_len,
        }
    }
}

/// A header and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    /// Routing header.
    pub header: MessageHeader,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl MessageEnvelope {
    /// Build an envelope around `payload`.
    pub fn new(message_type: u64, source: Rank, tag: u64, iteration: u64, payload: Vec<u8>) -> Self {
        Self {
            header: MessageHeader::new(message_type, source, tag, iteration, payload.len()),
            payload,
        }
    }

    /// Envelope with no payload.
    pub fn empty(message_type: u64, source: Rank, tag: u64, iteration: u64) -> Self {
        Self::new(message_type, source, tag, iteration, Vec::new())
    }

    /// Check that the payload is exactly `expected` bytes long and agrees
    /// with the header.
    pub fn expect_len(&self, expected: usize) -> Result<&[u8]> {
        if self.header.payload_len != self.payload.len() {
            return Err(RingLifeError::Malformed(format!(
                "type {} from {}: header says {} bytes, payload has {}",
                self.header.message_type,
                self.header.source,
                self.header.payload_len,
                self.payload.len()
            )));
        }
        if self.payload.len() != expected {
            return Err(RingLifeError::Malformed(format!(
                "type {} from {}: expected {} bytes, got {}",
                self.header.message_type,
                self.header.source,
                expected,
                self.payload.len()
            )));
        }
        Ok(&self.payload)
    }
}

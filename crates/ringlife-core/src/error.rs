//! Error types for ringlife.

use thiserror::Error;

/// Result type alias using [`RingLifeError`].
pub type Result<T> = std::result::Result<T, RingLifeError>;

/// Errors raised by the simulation and its messaging layer.
///
/// Every variant is fatal: the simulation is a batch computation and has no
/// degraded mode, so callers propagate these up to process exit.
#[derive(Error, Debug)]
pub enum RingLifeError {
    /// Invalid arguments or configuration values.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A cell buffer could not be allocated.
    #[error("Allocation failed: {cells} cells for {what}")]
    Allocation {
        /// What the buffer was for.
        what: &'static str,
        /// Requested size in cells.
        cells: usize,
    },

    /// A message could not be delivered or a peer went away.
    #[error("Communication error: {0}")]
    Communication(String),

    /// A receive did not complete in time.
    #[error("Timed out after {timeout_ms}ms waiting for {what} from {}", peer(.source_rank))]
    Timeout {
        /// Description of the awaited message.
        what: String,
        /// Rank the message was expected from; `None` when any rank would do.
        source_rank: Option<usize>,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// A message arrived but its payload did not decode.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// A worker task panicked or was cancelled.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    /// I/O error while writing a report.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn peer(rank: &Option<usize>) -> String {
    match rank {
        Some(rank) => format!("rank {}", rank),
        None => "any rank".to_string(),
    }
}

impl RingLifeError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// True for errors that come from the messaging layer.
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            RingLifeError::Communication(_)
                | RingLifeError::Timeout { .. }
                | RingLifeError::Malformed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RingLifeError::Timeout {
            what: "halo row".to_string(),
            source_rank: Some(3),
            timeout_ms: 250,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 250ms waiting for halo row from rank 3"
        );

        let err = RingLifeError::Timeout {
            what: "gather row".to_string(),
            source_rank: None,
            timeout_ms: 250,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 250ms waiting for gather row from any rank"
        );

        let err = RingLifeError::Allocation {
            what: "partition",
            cells: 42,
        };
        assert_eq!(err.to_string(), "Allocation failed: 42 cells for partition");
    }

    #[test]
    fn test_communication_classification() {
        assert!(RingLifeError::Malformed("short".into()).is_communication());
        assert!(RingLifeError::Communication("closed".into()).is_communication());
        assert!(!RingLifeError::Config("rows".into()).is_communication());
        assert_eq!(RingLifeError::Config("rows".into()).exit_code(), 1);
    }
}

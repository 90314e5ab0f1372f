//! Coordinator report events and sinks.

use parking_lot::Mutex;
use std::fmt;
use std::io::Write;

/// Something the coordinator reports while the simulation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    /// The world before the first step.
    InitialWorld {
        /// Rendered world.
        text: String,
    },
    /// Every rank agreed the world repeats an earlier iteration.
    CycleDetected {
        /// Current iteration.
        iteration: u64,
        /// Earlier iteration with the same world.
        matches: u64,
    },
    /// Periodic live cell count.
    LiveCells {
        /// Current iteration.
        iteration: u64,
        /// Number of live cells.
        count: usize,
    },
    /// Periodic world dump.
    World {
        /// Current iteration.
        iteration: u64,
        /// Rendered world.
        text: String,
    },
    /// The world once more after a cycle ends the run, without a header.
    CycleWorld {
        /// Iteration the cycle was detected at.
        iteration: u64,
        /// Rendered world.
        text: String,
    },
    /// Live cell count after the last iteration.
    FinalCount {
        /// Number of live cells.
        count: usize,
    },
}

impl fmt::Display for ReportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportEvent::InitialWorld { text } => {
                write!(f, "\ninitial world:\n\n{}", text.trim_end_matches('\n'))
            }
            ReportEvent::CycleDetected { iteration, matches } => write!(
                f,
                "world iteration {} is equal to iteration {}",
                iteration, matches
            ),
            ReportEvent::LiveCells { iteration, count } => {
                write!(f, "{}: {} live cells", iteration, count)
            }
            ReportEvent::World { iteration, text } => write!(
                f,
                "\nat time step {}:\n\n{}",
                iteration,
                text.trim_end_matches('\n')
            ),
            ReportEvent::CycleWorld { text, .. } => {
                write!(f, "{}", text.trim_end_matches('\n'))
            }
            ReportEvent::FinalCount { count } => write!(f, "Number of live cells = {}", count),
        }
    }
}

/// Destination of report events.
pub trait ReportSink: Send + Sync {
    /// Write one event.
    fn write(&self, event: &ReportEvent) -> std::io::Result<()>;

    /// Flush buffered output.
    fn flush(&self) -> std::io::Result<()>;
}

/// Writes events to standard output, one per line.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl ReportSink for StdoutSink {
    fn write(&self, event: &ReportEvent) -> std::io::Result<()> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        writeln!(lock, "{}", event)
    }

    fn flush(&self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all stored events.
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().clone()
    }

    /// Get the count of events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl ReportSink for MemorySink {
    fn write(&self, event: &ReportEvent) -> std::io::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn flush(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn write(&self, _event: &ReportEvent) -> std::io::Result<()> {
        Ok(())
    }

    fn flush(&self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_text() {
        let cycle = ReportEvent::CycleDetected {
            iteration: 8,
            matches: 6,
        };
        assert_eq!(cycle.to_string(), "world iteration 8 is equal to iteration 6");

        let world = ReportEvent::World {
            iteration: 4,
            text: "O \n O\n".to_string(),
        };
        assert_eq!(world.to_string(), "\nat time step 4:\n\nO \n O");

        let reprint = ReportEvent::CycleWorld {
            iteration: 4,
            text: "O \n O\n".to_string(),
        };
        assert_eq!(reprint.to_string(), "O \n O");

        assert_eq!(
            ReportEvent::LiveCells {
                iteration: 9,
                count: 12
            }
            .to_string(),
            "9: 12 live cells"
        );
        assert_eq!(
            ReportEvent::FinalCount { count: 3 }.to_string(),
            "Number of live cells = 3"
        );
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.write(&ReportEvent::FinalCount { count: 1 }).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.events()[0], ReportEvent::FinalCount { count: 1 });
    }
}

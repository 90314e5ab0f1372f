//! ringlife CLI - run a row-partitioned Game of Life from the command line.
//!
//! # Usage
//!
//! ```bash
//! # 64x64 random world, 1000 steps, print the world every 100 steps and the
//! # live cell count every 10, on 4 workers
//! ringlife 64 64 1000 100 10 --workers 4
//!
//! # Glider gun, no periodic output
//! ringlife 40 60 500 0 0 --fixed
//! ```
//!
//! The simulation report goes to stdout. Logs, errors and the elapsed time go
//! to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use ringlife::prelude::*;

/// Row-partitioned Game of Life on a torus
#[derive(Parser, Debug)]
#[command(name = "ringlife")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of world rows
    rows: usize,

    /// Number of world columns
    cols: usize,

    /// Step limit; iterations 1 to steps-1 are computed
    steps: u64,

    /// Print the world every this many iterations (0 disables)
    print_world: u64,

    /// Print the live cell count every this many iterations (0 disables)
    print_cells: u64,

    /// Number of worker ranks (default: available parallelism, at most rows)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Start from the glider gun instead of a random world
    #[arg(long)]
    fixed: bool,

    /// Seed of the random world
    #[arg(long, default_value_t = ringlife::world::DEFAULT_SEED)]
    seed: u64,

    /// Receive timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn config(&self) -> Result<SimConfig> {
        let workers = self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(self.rows)
                .max(1)
        });
        let init = if self.fixed {
            WorldInit::Fixed
        } else {
            WorldInit::Random { seed: self.seed }
        };

        let mut builder = SimConfig::builder()
            .world(self.rows, self.cols)
            .steps(self.steps)
            .print_world(self.print_world)
            .print_cells(self.print_cells)
            .workers(workers)
            .init(init)
            .enable_tracing(self.verbose);
        if let Some(timeout) = self.timeout_ms {
            builder = builder.receive_timeout_ms(timeout);
        }
        builder.build()
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;
    let simulation = Simulation::new(config)?.with_sink(Arc::new(StdoutSink));

    let report = simulation.run().await?;

    eprintln!(
        "Game of Life took {:10.3} seconds",
        report.elapsed.as_secs_f64()
    );
    tracing::debug!(
        "{} messages delivered, stopped at iteration {}",
        report.messages_delivered,
        report.iterations
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    setup_logging(cli.verbose, cli.quiet);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let cli = Cli::try_parse_from(["ringlife", "20", "30", "100", "0", "10", "-w", "4"]).unwrap();
        let config = cli.config().unwrap();
        assert_eq!((config.rows, config.cols), (20, 30));
        assert_eq!(config.steps, 100);
        assert_eq!(config.print_world, 0);
        assert_eq!(config.print_cells, 10);
        assert_eq!(config.workers, 4);
        assert_eq!(config.init, WorldInit::Random { seed: 1 });
    }

    #[test]
    fn test_fixed_and_seed() {
        let cli = Cli::try_parse_from(["ringlife", "40", "60", "5", "1", "1", "--fixed"]).unwrap();
        assert_eq!(cli.config().unwrap().init, WorldInit::Fixed);

        let cli =
            Cli::try_parse_from(["ringlife", "8", "8", "5", "0", "0", "--seed", "9"]).unwrap();
        assert_eq!(cli.config().unwrap().init, WorldInit::Random { seed: 9 });
    }

    #[test]
    fn test_default_workers_capped_at_rows() {
        let cli = Cli::try_parse_from(["ringlife", "1", "8", "5", "0", "0"]).unwrap();
        assert_eq!(cli.config().unwrap().workers, 1);
    }

    #[test]
    fn test_argument_errors() {
        assert!(Cli::try_parse_from(["ringlife", "20", "30", "100"]).is_err());
        assert!(Cli::try_parse_from(["ringlife", "x", "30", "100", "0", "0"]).is_err());
        assert!(Cli::try_parse_from(["ringlife", "-5", "30", "100", "0", "0"]).is_err());

        let cli = Cli::try_parse_from(["ringlife", "0", "30", "100", "0", "0"]).unwrap();
        assert!(matches!(cli.config(), Err(RingLifeError::Config(_))));

        let cli = Cli::try_parse_from(["ringlife", "3", "3", "10", "0", "0", "-w", "5"]).unwrap();
        assert!(matches!(cli.config(), Err(RingLifeError::Config(_))));
    }
}

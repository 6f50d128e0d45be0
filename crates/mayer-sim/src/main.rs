use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    run::{self, RunArgs},
    version::{self, VersionArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "mayer-sim", about = "Overlap-sampling validation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Calibrate, equilibrate and sample a synthetic scenario.
    Run(RunArgs),
    /// Print version information.
    Version(VersionArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Version(args) => version::run(&args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::run::Scenario;

    #[test]
    fn run_arguments_parse() {
        let cli = Cli::try_parse_from([
            "mayer-sim",
            "run",
            "--config",
            "overlap.yaml",
            "--scenario",
            "boxed-linear",
            "--seed",
            "4",
        ])
        .unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.scenario, Scenario::BoxedLinear);
                assert_eq!(args.seed, Some(4));
                assert_eq!(args.dimensions, 1);
                assert!(args.out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn run_requires_a_config() {
        assert!(Cli::try_parse_from(["mayer-sim", "run"]).is_err());
    }
}

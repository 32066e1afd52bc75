use clap::{Args, Parser, Subcommand};
use latfit::engine::config::ErrorAggregation;
use latfit::engine::symmetry::CellType;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "LATFIT Developers",
    version,
    about = "LATFIT CLI - Symmetry-constrained least-squares refinement of unit cells from indexed diffraction peaks.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refine the unit cell of an indexed peak list under a cell-type constraint.
    Refine(RefineArgs),
    /// List the supported cell types and their free parameters.
    Cells,
}

/// Arguments for the `refine` subcommand.
#[derive(Args, Debug)]
pub struct RefineArgs {
    // --- Core Arguments ---
    /// Path to the peak list, a CSV file with columns h,k,l,qx,qy,qz.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Write the refinement report to this file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Path to a refinement configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Model Overrides ---
    /// Cell type to refine (e.g. 'hexagonal', 'monoclinic-b', 'cubic').
    #[arg(short = 't', long, value_name = "CELL")]
    pub cell_type: Option<CellType>,

    /// How per-peak squared errors are combined into the reported total error.
    #[arg(long, value_enum, value_name = "METHOD")]
    pub aggregation: Option<AggregationArg>,

    // --- Optimization Overrides ---
    /// Override the maximum number of Levenberg-Marquardt iterations.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Override the parameter-step convergence tolerance.
    #[arg(long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S optimization.initial-lambda=0.01
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationArg {
    SumOfSquares,
    MeanSquare,
    RootMeanSquare,
}

impl From<AggregationArg> for ErrorAggregation {
    fn from(arg: AggregationArg) -> Self {
        match arg {
            AggregationArg::SumOfSquares => ErrorAggregation::SumOfSquares,
            AggregationArg::MeanSquare => ErrorAggregation::MeanSquare,
            AggregationArg::RootMeanSquare => ErrorAggregation::RootMeanSquare,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_refine_with_overrides() {
        let cli = Cli::parse_from([
            "latfit",
            "-vv",
            "refine",
            "-i",
            "peaks.csv",
            "-t",
            "monoclinic-b",
            "--max-iterations",
            "50",
            "--aggregation",
            "mean-square",
            "-S",
            "optimization.tolerance=1e-9",
        ]);

        assert_eq!(cli.verbose, 2);
        let Commands::Refine(args) = cli.command else {
            panic!("Expected 'refine' subcommand");
        };
        assert_eq!(args.input, PathBuf::from("peaks.csv"));
        assert_eq!(args.cell_type, Some(CellType::MonoclinicB));
        assert_eq!(args.max_iterations, Some(50));
        assert_eq!(args.aggregation, Some(AggregationArg::MeanSquare));
        assert_eq!(args.set_values, vec!["optimization.tolerance=1e-9"]);
    }

    #[test]
    fn rejects_unknown_cell_type() {
        let result = Cli::try_parse_from(["latfit", "refine", "-i", "p.csv", "-t", "pentagonal"]);
        assert!(result.is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["latfit", "-q", "-v", "cells"]);
        assert!(result.is_err());
    }
}

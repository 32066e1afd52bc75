use crate::cli::RefineArgs;
use crate::config::PartialRefineConfig;
use crate::error::Result;
use crate::peaks;
use crate::utils::progress::CliProgressHandler;
use latfit::engine::progress::ProgressReporter;
use latfit::workflows::{self, refine::RefinementResult};
use std::fmt::Write as _;
use tracing::{info, warn};

const LATTICE_LABELS: [&str; 7] = ["a", "b", "c", "alpha", "beta", "gamma", "volume"];

pub fn run(args: RefineArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialRefineConfig::from_file(path)?,
        None => PartialRefineConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.merge_with_cli(&args)?;

    info!("Loading peaks from {:?}", &args.input);
    let peaks = peaks::read_peaks(&args.input)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Refining {} cell against {} peaks...",
        final_config.cell_type,
        peaks.len()
    );
    let result = workflows::refine::run(peaks, &final_config, &reporter)?;

    if !result.converged {
        warn!("Refinement finished without converging.");
        println!("Warning: refinement stopped after {} iterations without converging.", result.iterations);
    }

    let report = render_report(&result);
    match &args.output {
        Some(path) => {
            std::fs::write(path, &report)?;
            println!("✓ Refinement report written to: {}", path.display());
        }
        None => print!("{}", report),
    }
    Ok(())
}

pub fn render_report(result: &RefinementResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Cell type: {}", result.cell_type);
    let _ = writeln!(
        out,
        "Iterations: {} ({})",
        result.iterations,
        if result.converged {
            "converged"
        } else {
            "not converged"
        }
    );
    let _ = writeln!(out, "Total error: {:.6e}", result.total_error);
    let _ = writeln!(out);

    let _ = writeln!(out, "Refined parameters:");
    for ((name, value), error) in result
        .parameter_names
        .iter()
        .zip(&result.parameters)
        .zip(&result.parameter_errors)
    {
        let _ = writeln!(out, "  {:<8}{:>14.6} +/- {:.6}", name, value, error);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Lattice:");
    let mut values = result.lattice.to_array().to_vec();
    values.push(result.volume);
    for ((label, value), error) in LATTICE_LABELS.iter().zip(values).zip(result.errors) {
        let _ = writeln!(out, "  {:<8}{:>14.6} +/- {:.6}", label, value, error);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Orientation matrix (U * B):");
    for row in result.ub.row_iter() {
        let _ = writeln!(
            out,
            "  {:>12.8} {:>12.8} {:>12.8}",
            row[0], row[1], row[2]
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use latfit::core::lattice::LatticeParameters;
    use latfit::engine::symmetry::CellType;
    use nalgebra::Matrix3;
    use std::fs;
    use tempfile::tempdir;

    fn sample_result() -> RefinementResult {
        let lattice = LatticeParameters::new(4.5, 4.5, 7.2, 90.0, 90.0, 120.0);
        RefinementResult {
            cell_type: CellType::Hexagonal,
            ub: Matrix3::identity(),
            initial_lattice: lattice,
            lattice,
            volume: lattice.volume(),
            errors: [0.01, 0.01, 0.02, 0.0, 0.0, 0.0, 0.5],
            total_error: 1e-8,
            chi_squared: 1e-8,
            iterations: 6,
            converged: true,
            parameter_names: CellType::Hexagonal.parameter_names(),
            parameters: vec![4.5, 7.2],
            parameter_errors: vec![0.01, 0.02],
        }
    }

    #[test]
    fn report_lists_parameters_lattice_and_matrix() {
        let report = render_report(&sample_result());

        assert!(report.contains("Cell type: Hexagonal"));
        assert!(report.contains("Iterations: 6 (converged)"));
        assert!(report.contains("gamma       120.000000 +/- 0.000000"));
        assert!(report.contains("volume"));
        assert_eq!(
            report
                .lines()
                .skip_while(|l| !l.starts_with("Orientation"))
                .count(),
            4
        );
    }

    #[test]
    fn refine_command_writes_report_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("peaks.csv");
        let output = dir.path().join("report.txt");
        fs::write(
            &input,
            "h,k,l,qx,qy,qz\n1,0,0,1,0,0\n2,0,0,2,0,0\n0,1,0,0,1,0\n0,0,1,0,0,1\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "latfit",
            "refine",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-t",
            "cubic",
        ]);
        let Commands::Refine(args) = cli.command else {
            panic!("Expected 'refine' subcommand");
        };

        run(args).unwrap();

        let report = fs::read_to_string(&output).unwrap();
        assert!(report.contains("Cell type: Cubic"));
        assert!(report.contains("a             1.000000"));
    }
}

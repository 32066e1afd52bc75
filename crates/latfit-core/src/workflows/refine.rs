use crate::core::lattice::LatticeParameters;
use crate::core::peaks::PeakSet;
use crate::engine::config::{OptimizationConfig, RefineConfig};
use crate::engine::error::EngineError;
use crate::engine::optimizer::LevenbergMarquardt;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::residual::ConstrainedResidualModel;
use crate::engine::symmetry::CellType;
use nalgebra::Matrix3;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementResult {
    pub cell_type: CellType,
    /// Constrained orientation matrix `U1 * Bc` mapping hkl to q.
    pub ub: Matrix3<f64>,
    /// Cell implied by the unconstrained best fit, before refinement.
    pub initial_lattice: LatticeParameters,
    pub lattice: LatticeParameters,
    pub volume: f64,
    /// Standard errors of `[a, b, c, alpha, beta, gamma, volume]`.
    pub errors: [f64; 7],
    pub total_error: f64,
    pub chi_squared: f64,
    pub iterations: usize,
    pub converged: bool,
    pub parameter_names: &'static [&'static str],
    pub parameters: Vec<f64>,
    pub parameter_errors: Vec<f64>,
}

/// Refines the cell of `config.cell_type` against `peaks`.
///
/// The cell starts at the constrained projection of the unconstrained
/// best fit and is refined with Levenberg-Marquardt; lattice-constant
/// errors are the reduced parameter standard errors mapped through the
/// symmetry constraints.
#[instrument(skip_all, name = "refine_workflow", fields(cell_type = %config.cell_type))]
pub fn run(
    peaks: impl Into<Arc<PeakSet>>,
    config: &RefineConfig,
    reporter: &ProgressReporter,
) -> Result<RefinementResult, EngineError> {
    // === Phase 1: Unconstrained fit and initial constrained cell ===
    reporter.report(Progress::PhaseStart {
        name: "Initial Fit",
    });
    let mut model = ConstrainedResidualModel::new("refine", config.cell_type, peaks)?
        .with_aggregation(config.aggregation);
    info!(
        peaks = model.len(),
        initial = %model.initial_lattice_parameters(),
        start = %model.lattice_parameters(),
        total_error = model.total_error(),
        "Initial constrained cell prepared."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Least-squares refinement ===
    reporter.report(Progress::PhaseStart { name: "Refinement" });
    let report = LevenbergMarquardt::new(&config.optimization).minimize(&mut model, reporter)?;
    reporter.report(Progress::PhaseFinish);

    if !report.converged {
        warn!(
            iterations = report.iterations,
            "Refinement stopped at the iteration limit before converging."
        );
        reporter.report(Progress::Message(format!(
            "Refinement did not converge within {} iterations",
            report.iterations
        )));
    }

    // === Phase 3: Error propagation ===
    let errors = model.expand_errors(&report.parameter_errors)?;
    let lattice = *model.lattice_parameters();

    info!(
        refined = %lattice,
        total_error = model.total_error(),
        iterations = report.iterations,
        "Refinement complete."
    );

    Ok(RefinementResult {
        cell_type: config.cell_type,
        ub: *model.u1_bc(),
        initial_lattice: *model.initial_lattice_parameters(),
        lattice,
        volume: lattice.volume(),
        errors,
        total_error: model.total_error(),
        chi_squared: report.chi_squared,
        iterations: report.iterations,
        converged: report.converged,
        parameter_names: model.parameter_names(),
        parameters: report.parameters,
        parameter_errors: report.parameter_errors,
    })
}

/// Constrained best-fit orientation matrix and its total error, refined with
/// the default optimizer settings.
pub fn best_fit_matrix(
    cell_type: CellType,
    peaks: impl Into<Arc<PeakSet>>,
) -> Result<(Matrix3<f64>, f64), EngineError> {
    let config = RefineConfig {
        cell_type,
        aggregation: Default::default(),
        optimization: OptimizationConfig::default(),
    };
    let result = run(peaks, &config, &ProgressReporter::new())?;
    Ok((result.ub, result.total_error))
}

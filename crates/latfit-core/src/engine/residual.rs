use super::config::ErrorAggregation;
use super::error::ModelError;
use super::optimizer::ResidualModel;
use super::symmetry::CellType;
use crate::core::lattice::{self, LatticeParameters};
use crate::core::linalg;
use crate::core::peaks::PeakSet;
use nalgebra::{DVector, Matrix3, Vector3};
use std::sync::Arc;
use tracing::{debug, trace};

/// The matrices linking Miller indices to predicted q for one trial cell.
///
/// `ub * real_cell = u1 * b1` with `u1` orthogonal, `bc` is the reciprocal cell
/// matrix of the constrained lattice, and `u1_bc = u1 * bc` maps hkl to q.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationMatrices {
    pub u1: Matrix3<f64>,
    pub b1: Matrix3<f64>,
    pub bc: Matrix3<f64>,
    pub u1_bc: Matrix3<f64>,
}

impl OrientationMatrices {
    /// Factors the best-fit `ub` against the cell described by `lattice`.
    pub fn compute(lattice: &LatticeParameters, ub: &Matrix3<f64>) -> Result<Self, ModelError> {
        let real_cell = lattice.real_cell_matrix()?;
        let bc = linalg::invert(&real_cell, "constrained reciprocal cell")?;
        let (u1, b1) = linalg::factor_orientation(&(ub * real_cell))?;

        Ok(Self {
            u1,
            b1,
            bc,
            u1_bc: u1 * bc,
        })
    }
}

/// Residual error of a peak set against a symmetry-constrained unit cell.
///
/// The model holds the observed peaks, the unconstrained best-fit `UB` matrix
/// and the current trial cell. An optimizer varies the reduced parameter
/// vector through [`set_parameters`](Self::set_parameters) and reads back
/// [`total_error`](Self::total_error) or the per-peak errors; once converged,
/// [`expand_errors`](Self::expand_errors) turns the reduced parameter standard
/// errors into a report over all six lattice constants plus the cell volume.
///
/// Peak sets are immutable after construction and may be shared between
/// independent models through an [`Arc`].
#[derive(Debug, Clone)]
pub struct ConstrainedResidualModel {
    name: String,
    cell_type: CellType,
    peaks: Arc<PeakSet>,
    aggregation: ErrorAggregation,
    ub: Matrix3<f64>,
    initial_lattice: LatticeParameters,
    parameters: Vec<f64>,
    lattice: LatticeParameters,
    matrices: OrientationMatrices,
}

impl ConstrainedResidualModel {
    /// Builds the model and places it at the constrained cell closest to the
    /// unconstrained best fit of `peaks`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::EmptyInput`] if `peaks` is empty.
    /// - [`ModelError::SingularMatrix`] if the Miller indices do not span three
    ///   dimensions or the initial constrained cell is degenerate.
    pub fn new(
        name: impl Into<String>,
        cell_type: CellType,
        peaks: impl Into<Arc<PeakSet>>,
    ) -> Result<Self, ModelError> {
        let name = name.into();
        let peaks = peaks.into();
        if peaks.is_empty() {
            return Err(ModelError::EmptyInput(format!(
                "model '{name}' needs at least one peak"
            )));
        }

        let ub = linalg::best_fit_matrix(&peaks)?;
        let initial_lattice = LatticeParameters::from_ub(&ub)?;
        let parameters = cell_type.init(&initial_lattice);
        let lattice = cell_type.expand_parameters(&parameters)?;
        let matrices = OrientationMatrices::compute(&lattice, &ub)?;

        debug!(
            model = %name,
            cell_type = %cell_type,
            peaks = peaks.len(),
            initial = %initial_lattice,
            "Constrained residual model initialised."
        );

        Ok(Self {
            name,
            cell_type,
            peaks,
            aggregation: ErrorAggregation::default(),
            ub,
            initial_lattice,
            parameters,
            lattice,
            matrices,
        })
    }

    pub fn with_aggregation(mut self, aggregation: ErrorAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Moves the model to a new trial cell.
    ///
    /// On error the previous cell and matrices are kept unchanged.
    ///
    /// # Errors
    ///
    /// - [`ModelError::InvalidArgument`] if `reduced` has the wrong length or
    ///   contains non-finite values.
    /// - [`ModelError::SingularMatrix`] if the cell is degenerate.
    pub fn set_parameters(&mut self, reduced: &[f64]) -> Result<(), ModelError> {
        let lattice = self.cell_type.expand_parameters(reduced)?;
        if reduced.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::InvalidArgument(format!(
                "non-finite trial parameters {reduced:?}"
            )));
        }
        let matrices = OrientationMatrices::compute(&lattice, &self.ub)?;

        self.parameters.clear();
        self.parameters.extend_from_slice(reduced);
        self.lattice = lattice;
        self.matrices = matrices;
        trace!(parameters = ?reduced, "Trial cell applied.");
        Ok(())
    }

    /// `U1_Bc * hkl_i - q_i`
    pub fn point_residual(&self, index: usize) -> Result<Vector3<f64>, ModelError> {
        let peak = self.peaks.get(index).ok_or_else(|| {
            ModelError::InvalidArgument(format!(
                "peak index {index} out of range for {} peaks",
                self.peaks.len()
            ))
        })?;
        Ok(self.matrices.u1_bc * peak.hkl - peak.q)
    }

    /// Distance between the observed and predicted q of one peak.
    pub fn point_error(&self, index: usize) -> Result<f64, ModelError> {
        Ok(self.point_residual(index)?.norm())
    }

    pub fn residuals(&self) -> impl Iterator<Item = Vector3<f64>> + '_ {
        self.peaks
            .iter()
            .map(|peak| self.matrices.u1_bc * peak.hkl - peak.q)
    }

    /// Aggregated squared per-peak error, by default `sum |U1_Bc * hkl - q|^2`.
    pub fn total_error(&self) -> f64 {
        self.aggregation
            .aggregate(self.residuals().map(|r| r.norm_squared()))
    }

    /// Maps reduced parameter errors onto `[a, b, c, alpha, beta, gamma, volume]`.
    ///
    /// Does not change the model; the volume error is propagated at the current cell.
    pub fn expand_errors(&self, reduced_errors: &[f64]) -> Result<[f64; 7], ModelError> {
        let errors = self.cell_type.expand_errors(reduced_errors)?;
        let volume = lattice::volume_error(&self.lattice, &errors);

        let mut expanded = [0.0; 7];
        expanded[..6].copy_from_slice(&errors);
        expanded[6] = volume;
        Ok(expanded)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn aggregation(&self) -> ErrorAggregation {
        self.aggregation
    }

    pub fn peaks(&self) -> &Arc<PeakSet> {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    pub fn parameter_names(&self) -> &'static [&'static str] {
        self.cell_type.parameter_names()
    }

    pub fn lattice_parameters(&self) -> &LatticeParameters {
        &self.lattice
    }

    /// Unconstrained cell derived from the best-fit `UB` at construction.
    pub fn initial_lattice_parameters(&self) -> &LatticeParameters {
        &self.initial_lattice
    }

    pub fn ub(&self) -> &Matrix3<f64> {
        &self.ub
    }

    pub fn matrices(&self) -> &OrientationMatrices {
        &self.matrices
    }

    pub fn u1_bc(&self) -> &Matrix3<f64> {
        &self.matrices.u1_bc
    }
}

impl ResidualModel for ConstrainedResidualModel {
    fn parameter_count(&self) -> usize {
        self.cell_type.parameter_count()
    }

    fn parameters(&self) -> Vec<f64> {
        self.parameters.clone()
    }

    fn set_parameters(&mut self, parameters: &[f64]) -> Result<(), ModelError> {
        ConstrainedResidualModel::set_parameters(self, parameters)
    }

    fn residuals(&self) -> DVector<f64> {
        DVector::from_iterator(
            3 * self.peaks.len(),
            ConstrainedResidualModel::residuals(self).flat_map(|r| [r.x, r.y, r.z]),
        )
    }
}

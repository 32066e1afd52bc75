use super::config::OptimizationConfig;
use super::error::{EngineError, ModelError};
use super::progress::{Progress, ProgressReporter};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, instrument, trace};

/// A model whose state is a flat parameter vector and whose fit quality is a
/// vector of residuals to be driven towards zero.
pub trait ResidualModel {
    fn parameter_count(&self) -> usize;

    fn parameters(&self) -> Vec<f64>;

    /// Moves the model to `parameters`; on error the model is left unchanged.
    fn set_parameters(&mut self, parameters: &[f64]) -> Result<(), ModelError>;

    fn residuals(&self) -> DVector<f64>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    pub parameters: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Sum of squared residuals at the solution.
    pub chi_squared: f64,
    /// `(J^T J)^-1` at the solution, unscaled.
    pub covariance: DMatrix<f64>,
    /// Standard errors `sqrt(cov_ii * chi^2 / (m - n))`.
    pub parameter_errors: Vec<f64>,
}

/// Damped Gauss-Newton minimiser with Marquardt diagonal scaling and a
/// forward-difference Jacobian.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt<'a> {
    config: &'a OptimizationConfig,
}

impl<'a> LevenbergMarquardt<'a> {
    pub fn new(config: &'a OptimizationConfig) -> Self {
        Self { config }
    }

    /// Minimises the squared norm of `model.residuals()`, leaving the model at
    /// the best parameters found.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InsufficientData`] if there are no more residuals than parameters.
    /// - [`EngineError::NonFiniteResidual`] if the residuals at the start point are not finite.
    /// - [`EngineError::Model`] if the model rejects a required evaluation or the
    ///   normal matrix at the solution is singular.
    #[instrument(skip_all, name = "levenberg_marquardt")]
    pub fn minimize<M: ResidualModel>(
        &self,
        model: &mut M,
        reporter: &ProgressReporter,
    ) -> Result<OptimizationReport, EngineError> {
        self.config.validate()?;
        let cfg = self.config;

        let n = model.parameter_count();
        let mut params = DVector::from_vec(model.parameters());
        let mut residuals = model.residuals();
        let m = residuals.len();
        if m <= n {
            return Err(EngineError::InsufficientData {
                residuals: m,
                parameters: n,
            });
        }
        if residuals.iter().any(|r| !r.is_finite()) {
            return Err(EngineError::NonFiniteResidual { iteration: 0 });
        }

        let mut chi_squared = residuals.norm_squared();
        let mut lambda = cfg.initial_lambda;
        let mut converged = chi_squared == 0.0;
        let mut iterations = 0;
        info!(parameters = n, residuals = m, chi_squared, "Starting minimisation.");

        while !converged && iterations < cfg.max_iterations {
            iterations += 1;

            let jacobian = self.jacobian(model, &params, &residuals)?;
            let normal = jacobian.tr_mul(&jacobian);
            let gradient = jacobian.tr_mul(&residuals);

            let mut damped = normal.clone();
            for i in 0..n {
                let d = damped[(i, i)];
                damped[(i, i)] = if d > 0.0 { d * (1.0 + lambda) } else { lambda };
            }

            let step = damped.cholesky().map(|c| c.solve(&(-&gradient)));
            let improved = match step {
                Some(step) => {
                    let trial = &params + &step;
                    match model.set_parameters(trial.as_slice()) {
                        Ok(()) => {
                            let trial_residuals = model.residuals();
                            let trial_chi_squared = trial_residuals.norm_squared();
                            if trial_chi_squared.is_finite() && trial_chi_squared < chi_squared {
                                let scale = 1.0 + params.amax();
                                params = trial;
                                residuals = trial_residuals;
                                chi_squared = trial_chi_squared;
                                if step.amax() < cfg.tolerance * scale {
                                    converged = true;
                                }
                                true
                            } else {
                                false
                            }
                        }
                        Err(ModelError::SingularMatrix(reason)) => {
                            trace!(%reason, "Trial step left the valid cell region.");
                            false
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                None => false,
            };

            if improved {
                lambda *= cfg.lambda_down;
            } else {
                model.set_parameters(params.as_slice())?;
                lambda *= cfg.lambda_up;
                if lambda > cfg.max_lambda {
                    // No damped step lowers chi^2: the start point is stationary.
                    debug!(iteration = iterations, "Damping exhausted at a stationary point.");
                    converged = true;
                }
            }

            debug!(iteration = iterations, chi_squared, lambda, "Iteration finished.");
            reporter.report(Progress::Iteration {
                index: iterations,
                max: cfg.max_iterations,
                chi_squared,
            });
        }

        let jacobian = self.jacobian(model, &params, &residuals)?;
        let covariance = jacobian
            .tr_mul(&jacobian)
            .try_inverse()
            .ok_or_else(|| {
                ModelError::SingularMatrix("normal matrix at the solution".to_string())
            })?;
        let variance = chi_squared / (m - n) as f64;
        let parameter_errors = covariance
            .diagonal()
            .iter()
            .map(|c| (c * variance).max(0.0).sqrt())
            .collect();

        info!(iterations, converged, chi_squared, "Minimisation finished.");

        Ok(OptimizationReport {
            parameters: params.as_slice().to_vec(),
            iterations,
            converged,
            chi_squared,
            covariance,
            parameter_errors,
        })
    }

    /// Forward-difference Jacobian at `params`, falling back to a backward step
    /// where the forward one is rejected. Restores the model to `params`.
    fn jacobian<M: ResidualModel>(
        &self,
        model: &mut M,
        params: &DVector<f64>,
        residuals: &DVector<f64>,
    ) -> Result<DMatrix<f64>, ModelError> {
        let mut jacobian = DMatrix::zeros(residuals.len(), params.len());
        for k in 0..params.len() {
            let h = self.config.finite_difference_step * params[k].abs().max(1.0);
            let mut shifted = params.clone();

            shifted[k] = params[k] + h;
            let signed_h = match model.set_parameters(shifted.as_slice()) {
                Ok(()) => h,
                Err(ModelError::SingularMatrix(_)) => {
                    shifted[k] = params[k] - h;
                    model.set_parameters(shifted.as_slice())?;
                    -h
                }
                Err(err) => return Err(err),
            };
            let column = (model.residuals() - residuals) / signed_h;
            jacobian.set_column(k, &column);
        }
        model.set_parameters(params.as_slice())?;
        Ok(jacobian)
    }
}

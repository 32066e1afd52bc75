use super::symmetry::CellType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// How per-peak squared errors are combined into the total error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorAggregation {
    /// `sum |U1_Bc * hkl - q|^2`
    #[default]
    SumOfSquares,
    MeanSquare,
    RootMeanSquare,
}

impl ErrorAggregation {
    pub fn aggregate(&self, squared_errors: impl Iterator<Item = f64>) -> f64 {
        let (count, sum) = squared_errors.fold((0usize, 0.0), |(n, s), e| (n + 1, s + e));
        if count == 0 {
            return 0.0;
        }
        match self {
            ErrorAggregation::SumOfSquares => sum,
            ErrorAggregation::MeanSquare => sum / count as f64,
            ErrorAggregation::RootMeanSquare => (sum / count as f64).sqrt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationConfig {
    pub max_iterations: usize,
    /// Convergence is reached once the largest parameter step falls below this value.
    pub tolerance: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    /// Damping beyond which the search gives up.
    pub max_lambda: f64,
    /// Relative step for forward-difference Jacobian columns.
    pub finite_difference_step: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-12,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            max_lambda: 1e10,
            finite_difference_step: 1e-7,
        }
    }
}

impl OptimizationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |parameter, reason: &str| {
            Err(ConfigError::InvalidValue {
                parameter,
                reason: reason.to_string(),
            })
        };
        if self.max_iterations == 0 {
            return invalid("max_iterations", "must be at least 1");
        }
        if !(self.tolerance > 0.0) {
            return invalid("tolerance", "must be positive");
        }
        if !(self.initial_lambda > 0.0) {
            return invalid("initial_lambda", "must be positive");
        }
        if !(self.lambda_up > 1.0) {
            return invalid("lambda_up", "must be greater than 1");
        }
        if !(self.lambda_down > 0.0 && self.lambda_down < 1.0) {
            return invalid("lambda_down", "must lie strictly between 0 and 1");
        }
        if !(self.max_lambda > self.initial_lambda) {
            return invalid("max_lambda", "must exceed initial_lambda");
        }
        if !(self.finite_difference_step > 0.0) {
            return invalid("finite_difference_step", "must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefineConfig {
    pub cell_type: CellType,
    pub aggregation: ErrorAggregation,
    pub optimization: OptimizationConfig,
}

#[derive(Default)]
pub struct RefineConfigBuilder {
    cell_type: Option<CellType>,
    aggregation: Option<ErrorAggregation>,
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
    initial_lambda: Option<f64>,
    lambda_up: Option<f64>,
    lambda_down: Option<f64>,
    max_lambda: Option<f64>,
    finite_difference_step: Option<f64>,
}

impl RefineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell_type(mut self, cell_type: CellType) -> Self {
        self.cell_type = Some(cell_type);
        self
    }
    pub fn aggregation(mut self, aggregation: ErrorAggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn initial_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = Some(lambda);
        self
    }
    pub fn lambda_up(mut self, factor: f64) -> Self {
        self.lambda_up = Some(factor);
        self
    }
    pub fn lambda_down(mut self, factor: f64) -> Self {
        self.lambda_down = Some(factor);
        self
    }
    pub fn max_lambda(mut self, lambda: f64) -> Self {
        self.max_lambda = Some(lambda);
        self
    }
    pub fn finite_difference_step(mut self, step: f64) -> Self {
        self.finite_difference_step = Some(step);
        self
    }

    pub fn build(self) -> Result<RefineConfig, ConfigError> {
        let defaults = OptimizationConfig::default();
        let optimization = OptimizationConfig {
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            tolerance: self.tolerance.unwrap_or(defaults.tolerance),
            initial_lambda: self.initial_lambda.unwrap_or(defaults.initial_lambda),
            lambda_up: self.lambda_up.unwrap_or(defaults.lambda_up),
            lambda_down: self.lambda_down.unwrap_or(defaults.lambda_down),
            max_lambda: self.max_lambda.unwrap_or(defaults.max_lambda),
            finite_difference_step: self
                .finite_difference_step
                .unwrap_or(defaults.finite_difference_step),
        };
        optimization.validate()?;

        Ok(RefineConfig {
            cell_type: self
                .cell_type
                .ok_or(ConfigError::MissingParameter("cell_type"))?,
            aggregation: self.aggregation.unwrap_or_default(),
            optimization,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_cell_type() {
        let result = RefineConfigBuilder::new().build();
        assert_eq!(result, Err(ConfigError::MissingParameter("cell_type")));
    }

    #[test]
    fn builder_fills_optimizer_defaults() {
        let config = RefineConfigBuilder::new()
            .cell_type(CellType::Cubic)
            .build()
            .unwrap();
        assert_eq!(config.optimization, OptimizationConfig::default());
        assert_eq!(config.aggregation, ErrorAggregation::SumOfSquares);
    }

    #[test]
    fn builder_applies_overrides() {
        let config = RefineConfigBuilder::new()
            .cell_type(CellType::Hexagonal)
            .aggregation(ErrorAggregation::MeanSquare)
            .max_iterations(20)
            .tolerance(1e-8)
            .build()
            .unwrap();
        assert_eq!(config.cell_type, CellType::Hexagonal);
        assert_eq!(config.optimization.max_iterations, 20);
        assert_eq!(config.optimization.tolerance, 1e-8);
        assert_eq!(config.aggregation, ErrorAggregation::MeanSquare);
    }

    #[test]
    fn builder_rejects_invalid_damping_factors() {
        let result = RefineConfigBuilder::new()
            .cell_type(CellType::Cubic)
            .lambda_down(1.5)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "lambda_down",
                ..
            })
        ));
    }

    #[test]
    fn builder_rejects_zero_iterations() {
        let result = RefineConfigBuilder::new()
            .cell_type(CellType::Cubic)
            .max_iterations(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn aggregation_of_empty_set_is_zero() {
        for aggregation in [
            ErrorAggregation::SumOfSquares,
            ErrorAggregation::MeanSquare,
            ErrorAggregation::RootMeanSquare,
        ] {
            assert_eq!(aggregation.aggregate(std::iter::empty()), 0.0);
        }
    }

    #[test]
    fn aggregation_variants_scale_the_sum() {
        let values = [1.0, 4.0, 4.0, 7.0];
        assert_eq!(ErrorAggregation::SumOfSquares.aggregate(values.into_iter()), 16.0);
        assert_eq!(ErrorAggregation::MeanSquare.aggregate(values.into_iter()), 4.0);
        assert_eq!(ErrorAggregation::RootMeanSquare.aggregate(values.into_iter()), 2.0);
    }
}

use latfit::engine::config::{ErrorAggregation, OptimizationConfig};

/// Values used when neither the config file nor the command line sets them.
pub struct DefaultsConfig {
    pub aggregation: ErrorAggregation,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
    pub max_lambda: f64,
    pub finite_difference_step: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let optimization = OptimizationConfig::default();
        Self {
            aggregation: ErrorAggregation::SumOfSquares,
            max_iterations: optimization.max_iterations,
            tolerance: optimization.tolerance,
            initial_lambda: optimization.initial_lambda,
            lambda_up: optimization.lambda_up,
            lambda_down: optimization.lambda_down,
            max_lambda: optimization.max_lambda,
            finite_difference_step: optimization.finite_difference_step,
        }
    }
}

use super::config::ConfigError;
use crate::core::lattice::LatticeError;
use crate::core::linalg::LinalgError;
use crate::core::peaks::PeakSetError;
use thiserror::Error;

/// Failures of the residual model itself.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ModelError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),
}

impl From<LinalgError> for ModelError {
    fn from(err: LinalgError) -> Self {
        match err {
            LinalgError::EmptyInput => ModelError::EmptyInput(err.to_string()),
            LinalgError::Singular { .. } => ModelError::SingularMatrix(err.to_string()),
        }
    }
}

impl From<LatticeError> for ModelError {
    fn from(err: LatticeError) -> Self {
        match err {
            LatticeError::Linalg(inner) => inner.into(),
            other => ModelError::SingularMatrix(other.to_string()),
        }
    }
}

impl From<PeakSetError> for ModelError {
    fn from(err: PeakSetError) -> Self {
        ModelError::InvalidArgument(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Residual model error: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("{residuals} residuals cannot determine {parameters} free parameters")]
    InsufficientData { residuals: usize, parameters: usize },

    #[error("Residuals became non-finite at iteration {iteration}")]
    NonFiniteResidual { iteration: usize },
}

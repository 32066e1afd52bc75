//! # Engine Module
//!
//! The stateful side of constrained refinement.
//!
//! - **Symmetry** ([`symmetry`]) - Cell types and the mapping between reduced
//!   parameters and full lattice parameters
//! - **Residual Model** ([`residual`]) - Per-peak and total error of a peak set
//!   against a trial constrained cell
//! - **Optimizer** ([`optimizer`]) - Levenberg-Marquardt over any [`optimizer::ResidualModel`]
//! - **Configuration** ([`config`]) - Refinement and optimizer settings
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Model and engine error types

pub mod config;
pub mod error;
pub mod optimizer;
pub mod progress;
pub mod residual;
pub mod symmetry;

//! # LATFIT Core Library
//!
//! Symmetry-constrained least-squares refinement of crystal unit cells from
//! indexed single-crystal diffraction peaks.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless peak data, the unconstrained
//!   best-fit `UB` matrix, the `U * B` factorisation and unit-cell geometry
//!   (real and reciprocal cell matrices, volume and volume error).
//!
//! - **[`engine`]: The Logic Core.** The stateful [`ConstrainedResidualModel`](engine::residual::ConstrainedResidualModel),
//!   the [`CellType`](engine::symmetry::CellType) constraint tables, the
//!   Levenberg-Marquardt optimizer and the configuration, error and progress
//!   types shared by everything above.
//!
//! - **[`workflows`]: The Public API.** End-to-end refinement of a peak set
//!   for one cell type, returning the refined cell with propagated errors.

pub mod core;
pub mod engine;
pub mod workflows;

//! # Workflows Module
//!
//! Top-level entry points tying the [`crate::core`] and [`crate::engine`]
//! layers together.
//!
//! - **Refinement Workflow** ([`refine`]) - Initial constrained cell from the
//!   unconstrained best fit, Levenberg-Marquardt refinement and error
//!   propagation to all lattice constants and the cell volume.

pub mod refine;

//! # Core Module
//!
//! Stateless building blocks for constrained lattice refinement.
//!
//! - **Peak Data** ([`peaks`]) - Indexed (hkl, q) observations
//! - **Linear Algebra** ([`linalg`]) - Best-fit orientation matrix, `U * B` factorisation, guarded inversion
//! - **Unit Cells** ([`lattice`]) - Lattice parameters, real and reciprocal cell matrices, volume and volume errors
//!
//! Everything here is a pure function of its inputs; the stateful residual model
//! lives in [`crate::engine`].

pub mod lattice;
pub mod linalg;
pub mod peaks;

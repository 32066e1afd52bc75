use super::linalg::{self, LinalgError};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum LatticeError {
    #[error("Cell edge lengths must be positive and finite, got ({a}, {b}, {c})")]
    NonPositiveLength { a: f64, b: f64, c: f64 },

    #[error("Cell angles ({alpha}, {beta}, {gamma}) do not describe a cell with positive volume")]
    DegenerateCell { alpha: f64, beta: f64, gamma: f64 },

    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

/// The six constants describing a unit cell.
///
/// Edge lengths share the unit implied by the q vectors (no factor of 2*pi),
/// angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl LatticeParameters {
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
        }
    }

    pub fn from_array(values: [f64; 6]) -> Self {
        let [a, b, c, alpha, beta, gamma] = values;
        Self::new(a, b, c, alpha, beta, gamma)
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }

    /// Lattice parameters of the cell whose reciprocal basis vectors are the
    /// columns of `ub`.
    ///
    /// The real-space metric tensor is `(UB^T UB)^-1`; edge lengths are the
    /// square roots of its diagonal and the angles follow from the off-diagonal
    /// terms.
    pub fn from_ub(ub: &Matrix3<f64>) -> Result<Self, LatticeError> {
        let metric = linalg::invert(&(ub.transpose() * ub), "real-space metric tensor")?;

        let a = metric[(0, 0)].sqrt();
        let b = metric[(1, 1)].sqrt();
        let c = metric[(2, 2)].sqrt();
        let angle = |g: f64, x: f64, y: f64| (g / (x * y)).clamp(-1.0, 1.0).acos().to_degrees();

        Ok(Self::new(
            a,
            b,
            c,
            angle(metric[(1, 2)], b, c),
            angle(metric[(0, 2)], a, c),
            angle(metric[(0, 1)], a, b),
        ))
    }

    /// `1 - cos^2(alpha) - cos^2(beta) - cos^2(gamma) + 2 cos(alpha) cos(beta) cos(gamma)`
    fn volume_factor(&self) -> f64 {
        let (ca, cb, cg) = self.cosines();
        1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg
    }

    fn cosines(&self) -> (f64, f64, f64) {
        (
            self.alpha.to_radians().cos(),
            self.beta.to_radians().cos(),
            self.gamma.to_radians().cos(),
        )
    }

    pub fn volume(&self) -> f64 {
        self.a * self.b * self.c * self.volume_factor().max(0.0).sqrt()
    }

    /// Real-space cell matrix whose rows are the basis vectors `a`, `b`, `c`,
    /// with `a` along x and `b` in the xy plane.
    pub fn real_cell_matrix(&self) -> Result<Matrix3<f64>, LatticeError> {
        let lengths = [self.a, self.b, self.c];
        if lengths.iter().any(|l| !l.is_finite() || *l <= 0.0) {
            return Err(LatticeError::NonPositiveLength {
                a: self.a,
                b: self.b,
                c: self.c,
            });
        }

        let degenerate = LatticeError::DegenerateCell {
            alpha: self.alpha,
            beta: self.beta,
            gamma: self.gamma,
        };
        let (ca, cb, cg) = self.cosines();
        let sg = self.gamma.to_radians().sin();
        if !sg.is_finite() || sg.abs() < 1e-9 || self.volume_factor() <= 1e-12 {
            return Err(degenerate);
        }

        let c_y = self.c * (ca - cb * cg) / sg;
        let c_z_sq = self.c * self.c - (self.c * cb).powi(2) - c_y * c_y;
        if c_z_sq <= 0.0 {
            return Err(degenerate);
        }

        let a_vec = Vector3::new(self.a, 0.0, 0.0);
        let b_vec = Vector3::new(self.b * cg, self.b * sg, 0.0);
        let c_vec = Vector3::new(self.c * cb, c_y, c_z_sq.sqrt());

        Ok(Matrix3::from_rows(&[
            a_vec.transpose(),
            b_vec.transpose(),
            c_vec.transpose(),
        ]))
    }

    /// Reciprocal cell matrix `B = A^-1`, whose columns are `a*`, `b*`, `c*`.
    pub fn reciprocal_cell_matrix(&self) -> Result<Matrix3<f64>, LatticeError> {
        let real = self.real_cell_matrix()?;
        Ok(linalg::invert(&real, "reciprocal cell matrix")?)
    }
}

impl fmt::Display for LatticeParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a={:.4} b={:.4} c={:.4} alpha={:.3} beta={:.3} gamma={:.3}",
            self.a, self.b, self.c, self.alpha, self.beta, self.gamma
        )
    }
}

/// First-order propagation of independent lattice-constant errors into the
/// unit-cell volume.
///
/// `errors` follows the order (a, b, c, alpha, beta, gamma); angle errors are
/// in degrees. The result is `sqrt(sum (dV/dp_i * sigma_i)^2)`.
pub fn volume_error(lattice: &LatticeParameters, errors: &[f64; 6]) -> f64 {
    let volume = lattice.volume();
    let factor = lattice.volume_factor();
    if factor <= 0.0 {
        return f64::NAN;
    }

    let (ca, cb, cg) = lattice.cosines();
    let abc = lattice.a * lattice.b * lattice.c;
    let root = factor.sqrt();

    // dV/d(angle) in radians, e.g. dV/dalpha = abc * sin(alpha) (cos(alpha) - cos(beta) cos(gamma)) / root
    let d_angle = |angle: f64, c_self: f64, c_1: f64, c_2: f64| {
        abc * angle.to_radians().sin() * (c_self - c_1 * c_2) / root
    };

    let derivatives = [
        volume / lattice.a,
        volume / lattice.b,
        volume / lattice.c,
        d_angle(lattice.alpha, ca, cb, cg),
        d_angle(lattice.beta, cb, ca, cg),
        d_angle(lattice.gamma, cg, ca, cb),
    ];

    derivatives
        .iter()
        .zip(errors)
        .enumerate()
        .map(|(slot, (d, e))| {
            let sigma = if slot < 3 { *e } else { e.to_radians() };
            (d * sigma).powi(2)
        })
        .sum::<f64>()
        .sqrt()
}

use super::peaks::PeakSet;
use nalgebra::Matrix3;
use thiserror::Error;

/// Relative size below which a pivot or determinant is treated as zero.
const SINGULARITY_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LinalgError {
    #[error("Matrix is singular during {operation}")]
    Singular { operation: &'static str },

    #[error("At least one (hkl, q) pair is required")]
    EmptyInput,
}

/// Inverts a 3x3 matrix, treating a determinant that is negligible relative
/// to the matrix scale as singular.
pub fn invert(m: &Matrix3<f64>, operation: &'static str) -> Result<Matrix3<f64>, LinalgError> {
    let scale = m.abs().max();
    if !scale.is_finite() || scale == 0.0 {
        return Err(LinalgError::Singular { operation });
    }
    let det = m.determinant();
    if !det.is_finite() || det.abs() <= SINGULARITY_TOLERANCE * scale.powi(3) {
        return Err(LinalgError::Singular { operation });
    }
    m.try_inverse().ok_or(LinalgError::Singular { operation })
}

/// Least-squares matrix `UB` minimising `sum |UB * hkl_i - q_i|^2`.
///
/// Solved through the normal equations `UB = (sum q hkl^T) (sum hkl hkl^T)^-1`,
/// which requires the Miller indices to span three dimensions.
pub fn best_fit_matrix(peaks: &PeakSet) -> Result<Matrix3<f64>, LinalgError> {
    if peaks.is_empty() {
        return Err(LinalgError::EmptyInput);
    }

    let mut hh = Matrix3::zeros();
    let mut qh = Matrix3::zeros();
    for peak in peaks {
        hh += peak.hkl * peak.hkl.transpose();
        qh += peak.q * peak.hkl.transpose();
    }

    Ok(qh * invert(&hh, "best-fit normal equations")?)
}

/// Factors `m = U * B` with `U` orthogonal and `B` upper triangular with a
/// positive diagonal.
pub fn factor_orientation(m: &Matrix3<f64>) -> Result<(Matrix3<f64>, Matrix3<f64>), LinalgError> {
    let operation = "orientation factorisation";
    let scale = m.abs().max();
    if !scale.is_finite() || scale == 0.0 {
        return Err(LinalgError::Singular { operation });
    }

    let qr = m.qr();
    let mut u = qr.q();
    let mut b = qr.r();

    for i in 0..3 {
        let pivot = b[(i, i)];
        if pivot.abs() <= SINGULARITY_TOLERANCE * scale {
            return Err(LinalgError::Singular { operation });
        }
        if pivot < 0.0 {
            u.column_mut(i).neg_mut();
            b.row_mut(i).neg_mut();
        }
    }

    Ok((u, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::peaks::Peak;
    use nalgebra::{Rotation3, Vector3};

    const TOLERANCE: f64 = 1e-10;

    fn assert_matrix_eq(a: &Matrix3<f64>, b: &Matrix3<f64>) {
        assert!((a - b).abs().max() < TOLERANCE, "{a} != {b}");
    }

    #[test]
    fn best_fit_matrix_recovers_exact_linear_map() {
        let truth = Matrix3::new(0.2, 0.01, -0.03, 0.0, 0.15, 0.02, 0.05, 0.0, 0.11);
        let peaks: PeakSet = [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 2.0, -1.0],
            [3.0, -1.0, 2.0],
        ]
        .into_iter()
        .map(|h| {
            let hkl = Vector3::from(h);
            Peak { hkl, q: truth * hkl }
        })
        .collect();

        let ub = best_fit_matrix(&peaks).unwrap();
        assert_matrix_eq(&ub, &truth);
    }

    #[test]
    fn best_fit_matrix_of_identity_pairs_is_identity() {
        let rows = [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let peaks = PeakSet::from_rows(&rows, &rows).unwrap();
        assert_matrix_eq(&best_fit_matrix(&peaks).unwrap(), &Matrix3::identity());
    }

    #[test]
    fn best_fit_matrix_rejects_empty_input() {
        assert_eq!(
            best_fit_matrix(&PeakSet::default()),
            Err(LinalgError::EmptyInput)
        );
    }

    #[test]
    fn best_fit_matrix_rejects_coplanar_indices() {
        let rows = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        let peaks = PeakSet::from_rows(&rows, &rows).unwrap();
        assert!(matches!(
            best_fit_matrix(&peaks),
            Err(LinalgError::Singular { .. })
        ));
    }

    #[test]
    fn factor_orientation_splits_rotation_and_triangular_parts() {
        let rotation = Rotation3::from_euler_angles(0.2, 0.3, 0.5).into_inner();
        let triangular = Matrix3::new(2.0, 0.5, -0.3, 0.0, 3.0, 0.7, 0.0, 0.0, 1.5);

        let (u, b) = factor_orientation(&(rotation * triangular)).unwrap();

        assert_matrix_eq(&u, &rotation);
        assert_matrix_eq(&b, &triangular);
    }

    #[test]
    fn factor_orientation_produces_positive_diagonal() {
        let m = Matrix3::new(-1.0, 0.2, 0.0, 0.0, -2.0, 0.1, 0.3, 0.0, 4.0);
        let (u, b) = factor_orientation(&m).unwrap();

        assert!((0..3).all(|i| b[(i, i)] > 0.0));
        assert_matrix_eq(&(u.transpose() * u), &Matrix3::identity());
        assert_matrix_eq(&(u * b), &m);
    }

    #[test]
    fn factor_orientation_rejects_rank_deficient_matrix() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0);
        assert!(factor_orientation(&m).is_err());
    }

    #[test]
    fn invert_rejects_zero_matrix() {
        assert!(invert(&Matrix3::zeros(), "test").is_err());
    }
}

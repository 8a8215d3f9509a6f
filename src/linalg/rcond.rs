use nalgebra::DMatrix;

/**
 * Numerical comparison of reciprocal condition numbers
 *  Required for all linear algebra in models and filters
 */

/* Estimate the reciprocal condition number of a Diagonal Matrix for inversion.
 * The diagonal of sm is used, other elements are ignored.
 *
 * The Condition Number is defined from a matrix norm.
 *  Choose max element of D as the norm of the original matrix.
 *  Assume this norm for inverse matrix is min element D.
 *  Therefore rcond = min/max
 *
 * Note:
 *  Defined to be 0 for semi-definite and 0 for an empty matrix
 *  Defined to be 0 for max and min infinite
 *  Defined to be <0 for negative matrix (D element a value  < 0)
 *  Defined to be <0 with any NaN element
 *
 *  A negative matrix may be due to errors in the original matrix resulting in
 *   a factorisation producing special values in D (e.g. -infinity,NaN etc)
 *  By definition rcond <= 1 as min<=max
 */
pub fn rcond_symetric(sm: &DMatrix<f64>) -> f64 {
    // Special case an empty matrix
    let n = sm.nrows().min(sm.ncols());
    if n == 0 {
        return 0.;
    }

    let mut mind = sm[(0, 0)];
    let mut maxd = mind;
    for i in 0..n {
        let d = sm[(i, i)];
        if d.is_nan() {
            mind = -1.;
            break;
        }
        if d < mind {
            mind = d;
        }
        if d > maxd {
            maxd = d;
        }
    }

    rcond_min_max(mind, maxd)
}

/// Relative tolerance below zero for the eigenvalues of a semi-definite matrix.
pub const PSD_TOLERANCE: f64 = 1e-12;

/* Estimate the reciprocal condition number of a symmetric matrix for inversion from its eigenvalues.
 *
 * Rounding leaves the zero eigenvalues of a semi-definite matrix either side of zero.
 *  Eigenvalues down to -PSD_TOLERANCE times the largest magnitude are taken as zero.
 *
 * Note:
 *  Defined to be 0 for semi-definite and 0 for an empty matrix
 *  Defined to be <0 for negative matrix or any non finite element
 */
pub fn rcond_eigen(sm: &DMatrix<f64>) -> f64 {
    if sm.nrows() == 0 {
        return 0.;
    }
    if sm.iter().any(|e| !e.is_finite()) {
        return -1.;
    }
    let eigenvalues = sm.symmetric_eigenvalues();
    let mut mind = eigenvalues.min();
    let maxd = eigenvalues.max();
    if mind < 0. && mind >= -PSD_TOLERANCE * eigenvalues.amax() {
        mind = 0.;
    }
    rcond_min_max(mind, maxd)
}

fn rcond_min_max(mind: f64, maxd: f64) -> f64 {
    if mind < 0. {
        // matrix is negative
        mind // mind < 0 but does not represent a rcond
    } else {
        let rcond = mind / maxd; // rcond from min/max norm
        if rcond.is_nan() {
            // NaN, singular due to (mind == maxd) == (zero or infinity)
            0.
        } else {
            rcond
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn rcond_of_diagonal() {
        assert_eq!(rcond_symetric(&dmatrix![4., 1.; 1., 2.]), 0.5);
        assert_eq!(rcond_symetric(&dmatrix![0., 0.; 0., 0.]), 0.);
        assert!(rcond_symetric(&dmatrix![-1., 0.; 0., 2.]) < 0.);
        assert!(rcond_symetric(&dmatrix![f64::NAN, 0.; 0., 2.]) < 0.);
        assert_eq!(rcond_symetric(&DMatrix::zeros(0, 0)), 0.);
    }

    #[test]
    fn rcond_of_eigenvalues() {
        approx::assert_relative_eq!(rcond_eigen(&dmatrix![4., 0.; 0., 1.]), 0.25, epsilon = 1e-12);
        assert!(rcond_eigen(&dmatrix![1., 2.; 2., 1.]) < 0.);
        assert!(rcond_eigen(&dmatrix![f64::INFINITY, 0.; 0., 1.]) < 0.);
        assert_eq!(rcond_eigen(&DMatrix::zeros(2, 2)), 0.);

        // Rank one, zero eigenvalues lost in rounding
        let v = nalgebra::dvector![0.1, 0.3, 0.7];
        let rcond = rcond_eigen(&(&v * v.transpose()));
        assert!(rcond >= 0. && rcond < 1e-12);
    }
}

#![allow(non_snake_case)]

//! Modified Cholesky factorisation.
//!
//! UdU' factorisation of positive semi-definite matrices. Where:
//! U is unit upper triangular
//! d is diagonal
//!
//! Storage:
//! UD format of UdU' factor
//! strict_upper_triangle(UD) = strict_upper_triangle(U), diagonal(UD) = d, strict_lower_triangle(UD) ignored or zeroed

use nalgebra::DMatrix;

use super::rcond;

/// Estimate the reciprocal condition number for inversion of the original PSD matrix for which UD is the factor UdU'.
///
/// The rcond of the original matrix is simply the rcond of its d factor.
/// Using the d factor is fast and simple, and avoids computing any squares.
pub fn UdUrcond(UD: &DMatrix<f64>) -> f64 {
    rcond::rcond_symetric(UD)
}

/// In place Modified upper triangular Cholesky factor of a Positive definite or semi-definite matrix M.
///
/// Reference: A+G p.218 Upper Cholesky algorithm modified for UdU'
///
/// Numerical stability may not be as good as M(k,i) is updated from previous results.
/// Infinity values on the diagonal can be factorised.
///
/// Input: M, n=last column to be included in factorisation, Strict lower triangle of M is ignored in computation
///
/// Output: M as UdU' factor
///
/// strict_upper_triangle(M) = strict_upper_triangle(U), diagonal(M) = d,
/// strict_lower_triangle(M) is unmodified
///
/// Return: reciprocal condition number, -1 if negative, 0 if semi-definite (including zero)
pub fn UdUfactor_variant1(M: &mut DMatrix<f64>, n: usize) -> f64 {
    for j in (0..n).rev() {
        let mut d = M[(j, j)];

        // Diagonal element
        if d > 0. {
            // Positive definite
            d = 1. / d;

            for i in 0..j {
                let e = M[(i, j)];
                M[(i, j)] = d * e;
                for k in 0..=i {
                    let t = e * M[(k, j)];
                    M[(k, i)] -= t;
                }
            }
        } else if d == 0. {
            // Possibly semi-definite, check not negative
            for i in 0..j {
                if M[(i, j)] != 0. {
                    return -1.;
                }
            }
        } else {
            // Negative
            return -1.;
        }
    }

    // Estimate the reciprocal condition number
    UdUrcond(M)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn factor_reconstructs() {
        let M = dmatrix![4., 2., 0.6; 2., 2., 0.4; 0.6, 0.4, 1.];
        let mut UD = M.clone();
        let rcond = UdUfactor_variant1(&mut UD, 3);
        assert!(rcond > 0.);

        let mut U = UD.clone();
        U.fill_lower_triangle(0., 1);
        U.fill_diagonal(1.);
        let d = DMatrix::from_diagonal(&UD.diagonal());
        approx::assert_relative_eq!(&U * d * U.transpose(), M, epsilon = 1e-12);
    }

    #[test]
    fn semi_definite_and_negative() {
        let mut psd = dmatrix![1., 0.; 0., 0.];
        assert_eq!(UdUfactor_variant1(&mut psd, 2), 0.);

        let mut negative = dmatrix![1., 2.; 2., 1.];
        assert!(UdUfactor_variant1(&mut negative, 2) < 0.);
    }
}

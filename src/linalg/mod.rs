//! Linear algebra support for the numeric estimation operations.

pub mod cholesky;
pub mod rcond;

/// Checks a the reciprocal condition number is >= 0.
///
/// IEC 559 NaN values are never true.
pub fn check_non_negativ(rcond: f64, message: &'static str) -> Result<f64, &'static str> {
    if rcond >= 0. {
        Ok(rcond)
    } else {
        Err(message)
    }
}

/// Checks a the reciprocal condition number is > 0.
pub fn check_positive(rcond: f64, message: &'static str) -> Result<f64, &'static str> {
    if rcond > 0. {
        Ok(rcond)
    } else {
        Err(message)
    }
}

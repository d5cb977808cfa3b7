//! Ordinary least-squares regression.
//!
//! Decay and growth rates of multilevel statistics are fitted on a `log2`
//! scale. One direction reduces to the textbook slope/intercept formulas; the
//! multi-index case solves the normal equations of a small dense system.

use thiserror::Error;

/// Smallest pivot accepted by the normal-equation solver.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Regression failure.
///
/// Rate fitting always recovers from these by falling back to default
/// rates; they never reach the caller of an estimation run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegressionError {
    /// Inputs have inconsistent lengths.
    #[error("x and y must have the same length")]
    LengthMismatch,

    /// Too few points for the number of unknowns.
    #[error("Need at least {required} points for regression, got {provided}")]
    InsufficientPoints {
        /// Minimum number of points.
        required: usize,
        /// Number of points supplied.
        provided: usize,
    },

    /// Design matrix is rank deficient (e.g. all x values identical).
    #[error("Design matrix is singular; cannot fit")]
    Singular,
}

/// Fits `y = intercept + slope * x`.
///
/// # Returns
///
/// `Ok((intercept, slope))`.
///
/// # Errors
///
/// - `LengthMismatch` if `x` and `y` differ in length
/// - `InsufficientPoints` if fewer than two points are given
/// - `Singular` if all `x` values are identical
///
/// # Example
///
/// ```
/// use mimc_core::math::linear_regression;
///
/// let x = vec![1.0, 2.0, 3.0];
/// let y = vec![2.0, 4.0, 6.0];
/// let (intercept, slope) = linear_regression(&x, &y).unwrap();
/// assert!((slope - 2.0).abs() < 1e-10);
/// assert!(intercept.abs() < 1e-10);
/// ```
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<(f64, f64), RegressionError> {
    if x.len() != y.len() {
        return Err(RegressionError::LengthMismatch);
    }
    let n = x.len();
    if n < 2 {
        return Err(RegressionError::InsufficientPoints {
            required: 2,
            provided: n,
        });
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut den = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        num += dx * (yi - mean_y);
        den += dx * dx;
    }

    if den <= PIVOT_TOLERANCE {
        return Err(RegressionError::Singular);
    }

    let slope = num / den;
    Ok((mean_y - slope * mean_x, slope))
}

/// Solves the least-squares problem `min ‖A c - y‖²` for a design matrix
/// given row by row.
///
/// Rows must all have the same length `p`; the returned vector has `p`
/// coefficients. Include a column of ones for an intercept.
///
/// # Errors
///
/// - `LengthMismatch` if row lengths differ or `rows.len() != y.len()`
/// - `InsufficientPoints` if there are fewer rows than unknowns
/// - `Singular` if the normal equations are rank deficient
///
/// # Example
///
/// ```
/// use mimc_core::math::least_squares;
///
/// // y = 1 + 2 x0 - x1
/// let rows = vec![
///     vec![1.0, 0.0, 0.0],
///     vec![1.0, 1.0, 0.0],
///     vec![1.0, 0.0, 1.0],
///     vec![1.0, 1.0, 1.0],
/// ];
/// let y = vec![1.0, 3.0, 0.0, 2.0];
/// let c = least_squares(&rows, &y).unwrap();
/// assert!((c[0] - 1.0).abs() < 1e-10);
/// assert!((c[1] - 2.0).abs() < 1e-10);
/// assert!((c[2] + 1.0).abs() < 1e-10);
/// ```
pub fn least_squares(rows: &[Vec<f64>], y: &[f64]) -> Result<Vec<f64>, RegressionError> {
    if rows.len() != y.len() {
        return Err(RegressionError::LengthMismatch);
    }
    let p = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != p) {
        return Err(RegressionError::LengthMismatch);
    }
    if p == 0 || rows.len() < p {
        return Err(RegressionError::InsufficientPoints {
            required: p.max(1),
            provided: rows.len(),
        });
    }

    // Normal equations as an augmented matrix [AᵀA | Aᵀy].
    let mut m = vec![vec![0.0; p + 1]; p];
    for (row, yi) in rows.iter().zip(y) {
        for i in 0..p {
            for j in 0..p {
                m[i][j] += row[i] * row[j];
            }
            m[i][p] += row[i] * yi;
        }
    }

    // Gaussian elimination with partial pivoting.
    for col in 0..p {
        let pivot = (col..p)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() <= PIVOT_TOLERANCE {
            return Err(RegressionError::Singular);
        }
        m.swap(col, pivot);
        for r in (col + 1)..p {
            let factor = m[r][col] / m[col][col];
            for c in col..=p {
                let delta = factor * m[col][c];
                m[r][c] -= delta;
            }
        }
    }

    let mut coeffs = vec![0.0; p];
    for i in (0..p).rev() {
        let tail: f64 = ((i + 1)..p).map(|j| m[i][j] * coeffs[j]).sum();
        coeffs[i] = (m[i][p] - tail) / m[i][i];
    }
    Ok(coeffs)
}

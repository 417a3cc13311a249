use crate::error::StrataError;
use crate::{Result, F};
use nalgebra::DMatrix;

const NORM_EPS: F = 1e-12;

/// Scaled cosine reconstruction error over masked rows.
///
/// `mean((1 - cos(target_r, recon_r))^alpha)` for masked rows `r`; unmasked
/// rows contribute nothing. A non-finite result halts the run.
pub fn masked_cosine_loss(
    target: &DMatrix<F>,
    recon: &DMatrix<F>,
    masked: &[bool],
    alpha: F,
) -> Result<F> {
    if target.shape() != recon.shape() {
        return Err(StrataError::shape(
            "reconstruction",
            format!("{:?}", target.shape()),
            format!("{:?}", recon.shape()),
        ));
    }
    if masked.len() != target.nrows() {
        return Err(StrataError::shape(
            "loss mask",
            target.nrows(),
            masked.len(),
        ));
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for (r, &m) in masked.iter().enumerate() {
        if !m {
            continue;
        }
        let x = target.row(r);
        let y = recon.row(r);
        let cos = x.dot(&y) / (x.norm() * y.norm()).max(NORM_EPS);
        sum += (1.0 - cos).max(0.0).powf(alpha);
        count += 1;
    }
    if count == 0 {
        return Err(StrataError::EmptySelection);
    }

    let loss = sum / count as F;
    if !loss.is_finite() {
        return Err(StrataError::NonFiniteLoss { value: loss });
    }
    Ok(loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_perfect_reconstruction_is_zero() {
        let x = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, -1.0, 0.5, 2.0]);
        let loss = masked_cosine_loss(&x, &x, &[true, true], 2.0).unwrap();
        assert_abs_diff_eq!(loss, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_unmasked_rows_ignored() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        // Second row is reconstructed orthogonally but is unmasked.
        let y = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 1.0, 0.0]);
        let loss = masked_cosine_loss(&x, &y, &[true, false], 2.0).unwrap();
        assert_abs_diff_eq!(loss, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_opposite_direction_penalized() {
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let y = DMatrix::from_row_slice(1, 2, &[-1.0, 0.0]);
        let loss = masked_cosine_loss(&x, &y, &[true], 1.0).unwrap();
        assert_abs_diff_eq!(loss, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_no_masked_rows_is_error() {
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let err = masked_cosine_loss(&x, &x, &[false], 2.0);
        assert!(matches!(err, Err(StrataError::EmptySelection)));
    }
}

//! Shared linear-algebra plumbing for the square-root filter forms: the
//! LQ factorization (via QR of the transpose) and its sign normalization.

use nalgebra::linalg::QR;
use nalgebra::DMatrix;

/// The lower-triangular factor `L` of the LQ factorization `M = L * Q`
/// (`Q` orthogonal with orthonormal rows, discarded here — only `L` is
/// needed by the square-root filter updates), with the sign convention
/// that `L`'s diagonal is nonnegative.
///
/// Computed as `L = Rᵀ` where `Mᵀ = Q_qr * R` is an ordinary (thin) QR
/// factorization, since nalgebra exposes QR but not LQ directly.
pub fn lq_lower(m: &DMatrix<f64>) -> DMatrix<f64> {
    let qr = QR::new(m.transpose());
    let mut l = qr.r().transpose();
    normalize_diagonal_sign(&mut l);
    l
}

/// Flip the sign of column `i` of a lower-triangular matrix whenever its
/// diagonal entry `l[(i, i)]` is negative. `L * diag(sign) * (L *
/// diag(sign))ᵀ == L * Lᵀ`, since `diag(sign) * diag(sign)ᵀ == I`, so this
/// changes nothing about the covariance the factor represents while
/// bringing it to the canonical nonnegative-diagonal form.
fn normalize_diagonal_sign(l: &mut DMatrix<f64>) {
    let n = l.nrows().min(l.ncols());
    for i in 0..n {
        if l[(i, i)] < 0.0 {
            for r in 0..l.nrows() {
                l[(r, i)] = -l[(r, i)];
            }
        }
    }
}

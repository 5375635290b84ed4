//! Gaussian beliefs: a dense (mean, covariance) representation and a
//! numerically stable square-root (Cholesky-factored) representation,
//! unified behind a small capability trait so the filters in [`crate::lkf`],
//! [`crate::ekf`] and [`crate::iekf`] can be written once and instantiated
//! for either.

use nalgebra::{Cholesky, DMatrix, DVector, Dynamic};

use crate::error::{Error, Result};

/// Shared capability set over a Gaussian belief: its first two moments and
/// the density they imply.
///
/// Implementors are immutable values. A filter step never mutates a
/// `Belief` in place; it consumes priors and produces a new posterior of
/// the same representation family (mixing `Dense` and `Sqrt` across a
/// single filter call is a domain error, enforced by the filter APIs being
/// generic over one concrete belief type per call, not by a runtime check
/// here).
pub trait Belief {
    /// Dimension of the underlying state vector.
    fn dim(&self) -> usize {
        self.mean().len()
    }

    /// The mean vector.
    fn mean(&self) -> &DVector<f64>;

    /// The covariance matrix. For [`Sqrt`] this materializes `L * Lᵀ`;
    /// callers on a hot path that only need a triangular solve should
    /// prefer the factor directly rather than calling this.
    fn covariance(&self) -> DMatrix<f64>;

    /// Natural log of the Gaussian density at `y`.
    fn logpdf(&self, y: &DVector<f64>) -> Result<f64>;

    /// Gaussian density at `y`.
    fn pdf(&self, y: &DVector<f64>) -> Result<f64> {
        Ok(self.logpdf(y)?.exp())
    }
}

const LN_2PI: f64 = 1.837_877_066_409_345_6;

fn check_y_len(expected: usize, y: &DVector<f64>) -> Result<()> {
    if y.len() != expected {
        return Err(Error::MismatchedDimensions {
            expected,
            got: y.len(),
        });
    }
    Ok(())
}

/// A Gaussian belief stored as `(mean, covariance)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    mean: DVector<f64>,
    cov: DMatrix<f64>,
}

impl Dense {
    /// Build a `Dense` belief from its moments.
    ///
    /// Only the shapes are checked here (`cov` square, matching `mean`'s
    /// length); symmetry/positive-semi-definiteness is not verified at
    /// construction (that check, when needed, happens lazily the first
    /// time a Cholesky is required, e.g. by [`logpdf`](Belief::logpdf) or by
    /// [`Sqrt::from_dense`]).
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self> {
        if !cov.is_square() || cov.nrows() != mean.len() {
            return Err(Error::InvalidShape(format!(
                "Dense belief: mean has length {} but covariance is {}x{}",
                mean.len(),
                cov.nrows(),
                cov.ncols()
            )));
        }
        Ok(Self { mean, cov })
    }

    /// Materialize a `Dense` belief from a [`Sqrt`] one (`cov = L * Lᵀ`).
    pub fn from_sqrt(sqrt: &Sqrt) -> Self {
        Self {
            mean: sqrt.mean.clone(),
            cov: &sqrt.l * sqrt.l.transpose(),
        }
    }

    fn cholesky(&self) -> Result<Cholesky<f64, Dynamic>> {
        Cholesky::new(self.cov.clone()).ok_or(Error::NotPositiveSemiDefinite)
    }
}

impl Belief for Dense {
    fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    fn covariance(&self) -> DMatrix<f64> {
        self.cov.clone()
    }

    fn logpdf(&self, y: &DVector<f64>) -> Result<f64> {
        check_y_len(self.mean.len(), y)?;
        let n = self.mean.len() as f64;
        let chol = self.cholesky()?;
        let l = chol.l();
        let logdet: f64 = 2.0 * l.diagonal().iter().map(|v| v.ln()).sum::<f64>();
        let residual = y - &self.mean;
        let z = chol.solve(&residual);
        let quad = residual.dot(&z);
        Ok(-0.5 * n * LN_2PI - 0.5 * logdet - 0.5 * quad)
    }
}

/// A Gaussian belief stored as `(mean, L)` with `cov = L * Lᵀ` and `L` lower
/// triangular with a nonnegative diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct Sqrt {
    mean: DVector<f64>,
    l: DMatrix<f64>,
}

impl Sqrt {
    /// Build a `Sqrt` belief directly from a mean and a lower-triangular
    /// factor. The caller is responsible for `l` actually being lower
    /// triangular with a nonnegative diagonal; this is the representation
    /// every filter step in this crate produces, so the common path never
    /// needs to re-derive it from a dense covariance.
    pub fn new(mean: DVector<f64>, l: DMatrix<f64>) -> Result<Self> {
        if !l.is_square() || l.nrows() != mean.len() {
            return Err(Error::InvalidShape(format!(
                "Sqrt belief: mean has length {} but factor is {}x{}",
                mean.len(),
                l.nrows(),
                l.ncols()
            )));
        }
        Ok(Self { mean, l })
    }

    /// The lower-triangular factor itself (not the materialized covariance).
    pub fn factor(&self) -> &DMatrix<f64> {
        &self.l
    }

    /// Compute the lower Cholesky factor of a [`Dense`] belief's covariance.
    pub fn from_dense(dense: &Dense) -> Result<Self> {
        let chol = Cholesky::new(dense.cov.clone()).ok_or(Error::NotPositiveSemiDefinite)?;
        Ok(Self {
            mean: dense.mean.clone(),
            l: chol.l(),
        })
    }
}

impl Belief for Sqrt {
    fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    fn covariance(&self) -> DMatrix<f64> {
        &self.l * self.l.transpose()
    }

    fn logpdf(&self, y: &DVector<f64>) -> Result<f64> {
        check_y_len(self.mean.len(), y)?;
        let n = self.mean.len() as f64;
        let logdet: f64 = self.l.diagonal().iter().map(|v| v.ln()).sum();
        let residual = y - &self.mean;
        // Lᵀ \ (y - mu): solve the transpose of the lower-triangular factor
        // directly rather than materializing L*Lᵀ and inverting it.
        let z = self
            .l
            .tr_solve_lower_triangular(&residual)
            .ok_or(Error::SingularInnovation)?;
        let quad = z.dot(&z);
        Ok(-0.5 * n * LN_2PI - logdet - 0.5 * quad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dense_1d(mean: f64, var: f64) -> Dense {
        Dense::new(DVector::from_vec(vec![mean]), DMatrix::from_vec(1, 1, vec![var])).unwrap()
    }

    #[test]
    fn dense_sqrt_roundtrip_mean_and_covariance() {
        let mean = DVector::from_vec(vec![1.0, -2.0]);
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 2.0]);
        let dense = Dense::new(mean.clone(), cov.clone()).unwrap();
        let sqrt = Sqrt::from_dense(&dense).unwrap();
        assert_relative_eq!(sqrt.mean(), &mean);
        assert_relative_eq!(sqrt.covariance(), cov, max_relative = 1e-10);

        let back = Dense::from_sqrt(&sqrt);
        assert_relative_eq!(back.covariance(), dense.covariance(), max_relative = 1e-10);
    }

    #[test]
    fn non_psd_covariance_fails_sqrt_conversion() {
        let mean = DVector::from_vec(vec![0.0, 0.0]);
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let dense = Dense::new(mean, cov).unwrap();
        assert!(Sqrt::from_dense(&dense).is_err());
    }

    #[test]
    fn logpdf_agrees_between_dense_and_sqrt() {
        let mean = DVector::from_vec(vec![0.3, -0.1]);
        let cov = DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.5]);
        let dense = Dense::new(mean, cov).unwrap();
        let sqrt = Sqrt::from_dense(&dense).unwrap();
        let y = DVector::from_vec(vec![1.0, 1.0]);
        assert_relative_eq!(
            dense.logpdf(&y).unwrap(),
            sqrt.logpdf(&y).unwrap(),
            max_relative = 1e-9
        );
    }

    #[test]
    fn standard_normal_logpdf_at_origin() {
        let d = dense_1d(0.0, 1.0);
        let expected = -0.5 * LN_2PI;
        assert_relative_eq!(d.logpdf(&DVector::from_vec(vec![0.0])).unwrap(), expected);
    }
}

use std::marker::PhantomData;

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

use super::{MeasurementEquation, StateEquation};

/// `x' = A*x` (if `n_inputs == 0`) or `x' = A*x + B*u`.
///
/// `T` is [`super::Continuous`] or [`super::Discrete`] and only tags which
/// interpretation `x'` carries; the evaluation itself is identical either
/// way.
#[derive(Debug, Clone)]
pub struct LTIStateEquation<T> {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    _marker: PhantomData<T>,
}

impl<T> LTIStateEquation<T> {
    /// Build an LTI state equation. `A` must be square and nonempty; `B`
    /// must either be empty (no control input) or have `A.nrows()` rows.
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>) -> Result<Self> {
        if a.nrows() == 0 || !a.is_square() {
            return Err(Error::InvalidShape(format!(
                "LTIStateEquation: A must be nonempty and square, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        if !b.is_empty() && b.nrows() != a.nrows() {
            return Err(Error::InvalidShape(format!(
                "LTIStateEquation: B has {} rows but A has {}",
                b.nrows(),
                a.nrows()
            )));
        }
        Ok(Self {
            a,
            b,
            _marker: PhantomData,
        })
    }

    /// The state transition matrix `A`.
    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// The control matrix `B` (empty if there is no control input).
    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    fn control_dim(&self) -> usize {
        self.b.ncols()
    }
}

impl<T> StateEquation<T> for LTIStateEquation<T> {
    fn n_states(&self) -> usize {
        self.a.nrows()
    }

    fn n_inputs(&self) -> usize {
        self.control_dim()
    }

    fn eval(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        if self.control_dim() == 0 {
            &self.a * x
        } else {
            &self.a * x + &self.b * u
        }
    }
}

/// `y = C*x` (if `n_inputs == 0`) or `y = C*x + D*u`.
#[derive(Debug, Clone)]
pub struct LTIMeasurementEquation {
    c: DMatrix<f64>,
    d: DMatrix<f64>,
}

impl LTIMeasurementEquation {
    /// Build an LTI measurement equation. `C` must be nonempty with `p`
    /// rows; `D` must either be empty or have `p` rows.
    pub fn new(c: DMatrix<f64>, d: DMatrix<f64>) -> Result<Self> {
        if c.nrows() == 0 || c.ncols() == 0 {
            return Err(Error::InvalidShape(format!(
                "LTIMeasurementEquation: C must be nonempty, got {}x{}",
                c.nrows(),
                c.ncols()
            )));
        }
        if !d.is_empty() && d.nrows() != c.nrows() {
            return Err(Error::InvalidShape(format!(
                "LTIMeasurementEquation: D has {} rows but C has {}",
                d.nrows(),
                c.nrows()
            )));
        }
        Ok(Self { c, d })
    }

    /// The observation matrix `C`.
    pub fn c(&self) -> &DMatrix<f64> {
        &self.c
    }

    /// The feedthrough matrix `D` (empty if there is no control input).
    pub fn d(&self) -> &DMatrix<f64> {
        &self.d
    }
}

impl MeasurementEquation for LTIMeasurementEquation {
    fn n_states(&self) -> usize {
        self.c.ncols()
    }

    fn n_inputs(&self) -> usize {
        self.d.ncols()
    }

    fn n_outputs(&self) -> usize {
        self.c.nrows()
    }

    fn eval(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        if self.d.ncols() == 0 {
            &self.c * x
        } else {
            &self.c * x + &self.d * u
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Discrete;
    use approx::assert_relative_eq;

    #[test]
    fn lti_state_equation_with_control() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let eq = LTIStateEquation::<Discrete>::new(a, b).unwrap();
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let u = DVector::from_vec(vec![3.0]);
        let xp = eq.eval(&x, &u);
        assert_relative_eq!(xp, DVector::from_vec(vec![3.0, 5.0]));
    }

    #[test]
    fn lti_rejects_mismatched_b() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(3, 1, &[0.0, 0.0, 0.0]);
        assert!(LTIStateEquation::<Discrete>::new(a, b).is_err());
    }
}

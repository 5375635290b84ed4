//! Jacobians of nonlinear state/measurement equations at an operating point.
//!
//! Mirrors the split the `nyx-space` family of examples uses for its force
//! models (an `eom` that evaluates in plain `f64` and a `dual_eom` that
//! evaluates in dual numbers for the Jacobian): a model that wants to be
//! linearized implements [`DualStateEquation`] / [`DualMeasurementEquation`]
//! alongside the plain [`StateEquation`] / [`MeasurementEquation`] it
//! already has.

use nalgebra::{DMatrix, DVector};

use crate::dual::{self, Dual};
use crate::error::Result;
use crate::model::lti::{LTIMeasurementEquation, LTIStateEquation};
use crate::model::{MeasurementEquation, StateEquation};

/// A [`StateEquation`] that can also be evaluated in dual numbers, one
/// derivative direction at a time.
pub trait DualStateEquation<T>: StateEquation<T> {
    fn eval_dual(&self, x: &[Dual], u: &[Dual]) -> Vec<Dual>;
}

/// A [`MeasurementEquation`] that can also be evaluated in dual numbers.
pub trait DualMeasurementEquation: MeasurementEquation {
    fn eval_dual(&self, x: &[Dual], u: &[Dual]) -> Vec<Dual>;
}

fn seed(values: &DVector<f64>, active: Option<usize>) -> Vec<Dual> {
    values
        .iter()
        .enumerate()
        .map(|(k, &v)| {
            if Some(k) == active {
                dual::variable(v)
            } else {
                dual::constant(v)
            }
        })
        .collect()
}

fn jacobian_columns(
    eval: impl Fn(&[Dual], &[Dual]) -> Vec<Dual>,
    x: &DVector<f64>,
    u: &DVector<f64>,
    n_outputs: usize,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let n = x.len();
    let m = u.len();
    let mut jx = DMatrix::zeros(n_outputs, n);
    for j in 0..n {
        let xd = seed(x, Some(j));
        let ud = seed(u, None);
        let col = eval(&xd, &ud);
        for (i, d) in col.iter().enumerate() {
            jx[(i, j)] = dual::derivative(d);
        }
    }
    let mut ju = DMatrix::zeros(n_outputs, m);
    for j in 0..m {
        let xd = seed(x, None);
        let ud = seed(u, Some(j));
        let col = eval(&xd, &ud);
        for (i, d) in col.iter().enumerate() {
            ju[(i, j)] = dual::derivative(d);
        }
    }
    (jx, ju)
}

/// `linearize(f, x, u)`: build the LTI surrogate `A = df/dx`, `B = df/du` of
/// a nonlinear state equation at `(x, u)`. `B` is the empty `n x 0` matrix
/// when `f.n_inputs() == 0`.
pub fn linearize_state<T, F: DualStateEquation<T> + ?Sized>(
    f: &F,
    x: &DVector<f64>,
    u: &DVector<f64>,
) -> Result<LTIStateEquation<T>> {
    let (a, b) = jacobian_columns(|xd, ud| f.eval_dual(xd, ud), x, u, f.n_states());
    LTIStateEquation::new(a, b)
}

/// `linearize(g, x, u)`: build the LTI surrogate `C = dg/dx`, `D = dg/du` of
/// a nonlinear measurement equation at `(x, u)`.
pub fn linearize_measurement<G: DualMeasurementEquation + ?Sized>(
    g: &G,
    x: &DVector<f64>,
    u: &DVector<f64>,
) -> Result<LTIMeasurementEquation> {
    let (c, d) = jacobian_columns(|xd, ud| g.eval_dual(xd, ud), x, u, g.n_outputs());
    LTIMeasurementEquation::new(c, d)
}

impl<T> DualStateEquation<T> for LTIStateEquation<T> {
    fn eval_dual(&self, x: &[Dual], u: &[Dual]) -> Vec<Dual> {
        let n = self.a().nrows();
        let mut out = vec![dual::constant(0.0); n];
        for i in 0..n {
            let mut acc = dual::constant(0.0);
            for (j, &xj) in x.iter().enumerate() {
                acc = acc + dual::constant(self.a()[(i, j)]) * xj;
            }
            for (k, &uk) in u.iter().enumerate() {
                acc = acc + dual::constant(self.b()[(i, k)]) * uk;
            }
            out[i] = acc;
        }
        out
    }
}

impl DualMeasurementEquation for LTIMeasurementEquation {
    fn eval_dual(&self, x: &[Dual], u: &[Dual]) -> Vec<Dual> {
        let p = self.c().nrows();
        let mut out = vec![dual::constant(0.0); p];
        for i in 0..p {
            let mut acc = dual::constant(0.0);
            for (j, &xj) in x.iter().enumerate() {
                acc = acc + dual::constant(self.c()[(i, j)]) * xj;
            }
            for (k, &uk) in u.iter().enumerate() {
                acc = acc + dual::constant(self.d()[(i, k)]) * uk;
            }
            out[i] = acc;
        }
        out
    }
}

/// Adapts a pair of closures (one evaluating in `f64`, one in [`Dual`]) into
/// a [`StateEquation`] + [`DualStateEquation`].
pub struct DualFnState<Ff64, Fd> {
    n_states: usize,
    n_inputs: usize,
    f: Ff64,
    fd: Fd,
}

impl<Ff64, Fd> DualFnState<Ff64, Fd>
where
    Ff64: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
    Fd: Fn(&[Dual], &[Dual]) -> Vec<Dual>,
{
    pub fn new(n_states: usize, n_inputs: usize, f: Ff64, fd: Fd) -> Self {
        Self {
            n_states,
            n_inputs,
            f,
            fd,
        }
    }
}

impl<T, Ff64, Fd> StateEquation<T> for DualFnState<Ff64, Fd>
where
    Ff64: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
    Fd: Fn(&[Dual], &[Dual]) -> Vec<Dual>,
{
    fn n_states(&self) -> usize {
        self.n_states
    }
    fn n_inputs(&self) -> usize {
        self.n_inputs
    }
    fn eval(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        (self.f)(x, u)
    }
}

impl<T, Ff64, Fd> DualStateEquation<T> for DualFnState<Ff64, Fd>
where
    Ff64: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
    Fd: Fn(&[Dual], &[Dual]) -> Vec<Dual>,
{
    fn eval_dual(&self, x: &[Dual], u: &[Dual]) -> Vec<Dual> {
        (self.fd)(x, u)
    }
}

/// Adapts a pair of closures into a [`MeasurementEquation`] +
/// [`DualMeasurementEquation`].
pub struct DualFnMeasurement<Ff64, Fd> {
    n_states: usize,
    n_inputs: usize,
    n_outputs: usize,
    f: Ff64,
    fd: Fd,
}

impl<Ff64, Fd> DualFnMeasurement<Ff64, Fd>
where
    Ff64: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
    Fd: Fn(&[Dual], &[Dual]) -> Vec<Dual>,
{
    pub fn new(n_states: usize, n_inputs: usize, n_outputs: usize, f: Ff64, fd: Fd) -> Self {
        Self {
            n_states,
            n_inputs,
            n_outputs,
            f,
            fd,
        }
    }
}

impl<Ff64, Fd> MeasurementEquation for DualFnMeasurement<Ff64, Fd>
where
    Ff64: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
    Fd: Fn(&[Dual], &[Dual]) -> Vec<Dual>,
{
    fn n_states(&self) -> usize {
        self.n_states
    }
    fn n_inputs(&self) -> usize {
        self.n_inputs
    }
    fn n_outputs(&self) -> usize {
        self.n_outputs
    }
    fn eval(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        (self.f)(x, u)
    }
}

impl<Ff64, Fd> DualMeasurementEquation for DualFnMeasurement<Ff64, Fd>
where
    Ff64: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
    Fd: Fn(&[Dual], &[Dual]) -> Vec<Dual>,
{
    fn eval_dual(&self, x: &[Dual], u: &[Dual]) -> Vec<Dual> {
        (self.fd)(x, u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Continuous;
    use approx::assert_relative_eq;

    #[test]
    fn linearize_recovers_lti_exactly() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, -1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.5, 1.5]);
        let eq = LTIStateEquation::<Continuous>::new(a.clone(), b.clone()).unwrap();
        let x = DVector::from_vec(vec![3.0, -2.0]);
        let u = DVector::from_vec(vec![0.7]);
        let lin = linearize_state(&eq, &x, &u).unwrap();
        assert_relative_eq!(lin.a(), &a, max_relative = 1e-10);
        assert_relative_eq!(lin.b(), &b, max_relative = 1e-10);
    }

    #[test]
    fn linearize_quadratic_measurement() {
        // g(x) = x^2, dg/dx = 2x
        let g = DualFnMeasurement::new(
            1,
            0,
            1,
            |x, _u| DVector::from_vec(vec![x[0] * x[0]]),
            |x, _u| vec![x[0] * x[0]],
        );
        let x = DVector::from_vec(vec![3.0]);
        let u = DVector::zeros(0);
        let lin = linearize_measurement(&g, &x, &u).unwrap();
        assert_relative_eq!(lin.c()[(0, 0)], 6.0);
    }

    #[test]
    fn linearize_no_inputs_gives_empty_b() {
        let f = DualFnState::new(
            1,
            0,
            |x: &DVector<f64>, _u: &DVector<f64>| DVector::from_vec(vec![-x[0]]),
            |x: &[Dual], _u: &[Dual]| vec![-x[0]],
        );
        let x = DVector::from_vec(vec![2.0]);
        let u = DVector::zeros(0);
        let lin: LTIStateEquation<Continuous> = linearize_state(&f, &x, &u).unwrap();
        assert_eq!(lin.b().ncols(), 0);
    }
}

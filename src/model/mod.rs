//! State-space model algebra: the callable contracts every filter and the
//! renderer are built against.
//!
//! A [`StateEquation`] is `f(x, u) -> x'`; whether the result is a
//! derivative or a next state is carried purely in the phantom type
//! parameter `T` (`Continuous` or `Discrete`) so that, e.g., handing a
//! continuous-time equation straight to a filter step (which expects a
//! discrete one) is a compile error rather than a silent unit mismatch.
//! A [`MeasurementEquation`] is `g(x, u) -> y` and has no such distinction.

mod lti;

pub use lti::{LTIMeasurementEquation, LTIStateEquation};

use nalgebra::DVector;

use crate::dual::Dual;
use crate::linearize::DualMeasurementEquation;

/// Tags a [`StateEquation`] whose output is a time derivative, `ẋ = f(x, u)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Continuous;

/// Tags a [`StateEquation`] whose output is the next state, `x_{k+1} = f(x_k, u_k)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discrete;

/// `f(x, u) -> x'`, continuous or discrete depending on `T`.
///
/// `n_inputs` may be zero, in which case `u` is the empty vector and is
/// ignored by `eval`.
pub trait StateEquation<T> {
    /// Dimension of the state vector `x`.
    fn n_states(&self) -> usize;

    /// Dimension of the input vector `u` (may be zero).
    fn n_inputs(&self) -> usize;

    /// Evaluate `f(x, u)`. The returned vector has length `n_states`.
    fn eval(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64>;
}

/// `g(x, u) -> y`.
pub trait MeasurementEquation {
    /// Dimension of the state vector `x`.
    fn n_states(&self) -> usize;

    /// Dimension of the input vector `u` (may be zero).
    fn n_inputs(&self) -> usize;

    /// Dimension of the output vector `y`.
    fn n_outputs(&self) -> usize;

    /// Evaluate `g(x, u)`. The returned vector has length `n_outputs`.
    fn eval(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64>;
}

/// Wraps a plain closure as a [`StateEquation`]/[`MeasurementEquation`].
///
/// This is how the nonlinear models in this crate's tests are built: a
/// `TramState`-style kinematic model or a test fixture like `g(x) = x^2`
/// does not need a dedicated named type, just a closure plus the shapes it
/// operates on.
pub struct FnEquation<F> {
    n_states: usize,
    n_inputs: usize,
    n_outputs: usize,
    f: F,
}

impl<F> FnEquation<F>
where
    F: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
{
    /// Build a state-equation adapter (`n_outputs` is implicitly `n_states`).
    pub fn state(n_states: usize, n_inputs: usize, f: F) -> Self {
        Self {
            n_states,
            n_inputs,
            n_outputs: n_states,
            f,
        }
    }

    /// Build a measurement-equation adapter.
    pub fn measurement(n_states: usize, n_inputs: usize, n_outputs: usize, f: F) -> Self {
        Self {
            n_states,
            n_inputs,
            n_outputs,
            f,
        }
    }
}

impl<F, T> StateEquation<T> for FnEquation<F>
where
    F: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
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

impl<F> MeasurementEquation for FnEquation<F>
where
    F: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
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

/// Concatenates the outputs of a sequence of sub-measurements that share
/// `n_states` and `n_inputs`. Its `n_outputs` is the sum of the
/// sub-measurements' `n_outputs`.
///
/// Unlike the track/speed segment lists (see [`crate::track`] /
/// [`crate::speed`]), which sit in a hot per-micro-step loop and are
/// therefore modeled as tagged enums, a composite measurement is built from
/// ordinary dynamic dispatch; the simplicity outweighs the inlining concern
/// here. Subs are `dyn DualMeasurementEquation`, not just
/// `dyn MeasurementEquation`, so a `CompositeMeasurement` is itself
/// linearizable and can be handed to [`crate::ekf::ExtendedKalmanFilter`] /
/// [`crate::iekf::IteratedExtendedKalmanFilter`] directly, or to
/// [`crate::linearize::linearize_measurement`] to get the
/// [`LTIMeasurementEquation`] a [`crate::lkf::LinearKalmanFilter`] data step
/// needs.
pub struct CompositeMeasurement {
    subs: Vec<Box<dyn DualMeasurementEquation>>,
    n_states: usize,
    n_inputs: usize,
    n_outputs: usize,
}

impl CompositeMeasurement {
    /// Build a composite measurement from its sub-measurements.
    ///
    /// Returns [`crate::error::Error::InvalidShape`] if `subs` is empty or
    /// if the sub-measurements disagree on `n_states`/`n_inputs`.
    pub fn new(subs: Vec<Box<dyn DualMeasurementEquation>>) -> crate::error::Result<Self> {
        let first = subs
            .first()
            .ok_or_else(|| crate::error::Error::InvalidShape("CompositeMeasurement: empty".into()))?;
        let n_states = first.n_states();
        let n_inputs = first.n_inputs();
        for sub in &subs {
            if sub.n_states() != n_states || sub.n_inputs() != n_inputs {
                return Err(crate::error::Error::InvalidShape(format!(
                    "CompositeMeasurement: sub-measurement shape ({}, {}) disagrees with ({}, {})",
                    sub.n_states(),
                    sub.n_inputs(),
                    n_states,
                    n_inputs
                )));
            }
        }
        let n_outputs = subs.iter().map(|s| s.n_outputs()).sum();
        Ok(Self {
            subs,
            n_states,
            n_inputs,
            n_outputs,
        })
    }
}

impl MeasurementEquation for CompositeMeasurement {
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
        let mut out = DVector::zeros(self.n_outputs);
        let mut offset = 0;
        for sub in &self.subs {
            let y = sub.eval(x, u);
            out.rows_mut(offset, y.len()).copy_from(&y);
            offset += y.len();
        }
        out
    }
}

impl DualMeasurementEquation for CompositeMeasurement {
    fn eval_dual(&self, x: &[Dual], u: &[Dual]) -> Vec<Dual> {
        let mut out = Vec::with_capacity(self.n_outputs);
        for sub in &self.subs {
            out.extend(sub.eval_dual(x, u));
        }
        out
    }
}

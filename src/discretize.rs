//! Euler and RK4 integrators, and the wrapper that turns a continuous-time
//! [`StateEquation`] into a discrete-time one.

use nalgebra::DVector;

use crate::error::{Error, Result};
use crate::model::{Continuous, Discrete, StateEquation};

/// Which one-step integration rule [`DiscretizedStateEquation`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Euler,
    Rk4,
}

/// `x + f(x, u) * dt`.
pub fn euler_step<F: StateEquation<Continuous> + ?Sized>(
    f: &F,
    x: &DVector<f64>,
    u: &DVector<f64>,
    dt: f64,
) -> DVector<f64> {
    x + f.eval(x, u) * dt
}

/// Classic four-stage Runge-Kutta step.
pub fn rk4_step<F: StateEquation<Continuous> + ?Sized>(
    f: &F,
    x: &DVector<f64>,
    u: &DVector<f64>,
    dt: f64,
) -> DVector<f64> {
    let k1 = f.eval(x, u);
    let k2 = f.eval(&(x + &k1 * (dt / 2.0)), u);
    let k3 = f.eval(&(x + &k2 * (dt / 2.0)), u);
    let k4 = f.eval(&(x + &k3 * dt), u);
    x + (k1 + 2.0 * &k2 + 2.0 * &k3 + k4) * (dt / 6.0)
}

fn step<F: StateEquation<Continuous> + ?Sized>(
    method: Method,
    f: &F,
    x: &DVector<f64>,
    u: &DVector<f64>,
    dt: f64,
) -> DVector<f64> {
    match method {
        Method::Euler => euler_step(f, x, u, dt),
        Method::Rk4 => rk4_step(f, x, u, dt),
    }
}

/// Wraps a continuous-time [`StateEquation`] into a discrete-time one by
/// applying `method` `subsamples` times over `Ts / subsamples`.
pub struct DiscretizedStateEquation<F> {
    f: F,
    method: Method,
    ts: f64,
    subsamples: u32,
}

impl<F: StateEquation<Continuous>> DiscretizedStateEquation<F> {
    pub fn ts(&self) -> f64 {
        self.ts
    }

    pub fn subsamples(&self) -> u32 {
        self.subsamples
    }

    pub fn method(&self) -> Method {
        self.method
    }
}

/// Build a [`DiscretizedStateEquation`]. Fails if `ts` is not finite and
/// positive, or if `subsamples == 0`.
pub fn discretize<F: StateEquation<Continuous>>(
    f: F,
    method: Method,
    ts: f64,
    subsamples: u32,
) -> Result<DiscretizedStateEquation<F>> {
    if !ts.is_finite() || ts <= 0.0 {
        return Err(Error::NonPositiveTimeStep(ts));
    }
    if subsamples < 1 {
        return Err(Error::InvalidShape("subsamples must be >= 1".into()));
    }
    Ok(DiscretizedStateEquation {
        f,
        method,
        ts,
        subsamples,
    })
}

impl<F: StateEquation<Continuous>> StateEquation<Discrete> for DiscretizedStateEquation<F> {
    fn n_states(&self) -> usize {
        self.f.n_states()
    }

    fn n_inputs(&self) -> usize {
        self.f.n_inputs()
    }

    fn eval(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        let sub_dt = self.ts / self.subsamples as f64;
        let mut x = x.clone();
        for _ in 0..self.subsamples {
            x = step(self.method, &self.f, &x, u, sub_dt);
        }
        x
    }
}

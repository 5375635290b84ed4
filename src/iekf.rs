//! Iterated Extended Kalman filter: a Gauss-Newton maximization of the
//! log-posterior at the data step, damped by a [`StepControl`] so that
//! strongly nonlinear measurements converge reliably instead of
//! oscillating (Bell & Cathey, "The iterated Kalman filter update as a
//! Gauss-Newton method").

use log::warn;
use nalgebra::DVector;

use crate::belief::Belief;
use crate::ekf::ExtendedKalmanFilter;
use crate::error::Result;
use crate::line_search::StepControl;
use crate::linearize::{linearize_measurement, DualMeasurementEquation, DualStateEquation};
use crate::lkf::LkfStep;
use crate::model::{Discrete, MeasurementEquation};

/// Iterated Extended Kalman filter.
///
/// `step_control` damps the raw Gauss-Newton iterate (see
/// [`crate::line_search`]); `min_step_norm` is the convergence tolerance on
/// `||step||`; `max_iters` bounds the Gauss-Newton loop (a non-fatal
/// termination: the last iterate is still returned, just not a converged
/// one, logged at `warn` level).
pub struct IteratedExtendedKalmanFilter<S> {
    pub step_control: S,
    pub min_step_norm: f64,
    pub max_iters: usize,
}

impl<S: StepControl> IteratedExtendedKalmanFilter<S> {
    pub fn new(step_control: S, min_step_norm: f64, max_iters: usize) -> Self {
        Self {
            step_control,
            min_step_norm,
            max_iters,
        }
    }

    /// Time update is not iterated: delegates to [`ExtendedKalmanFilter::forward_step`].
    pub fn forward_step<B, F>(&self, prior: &B, f: &F, u: &DVector<f64>, process_noise: &B) -> Result<B>
    where
        B: LkfStep,
        F: DualStateEquation<Discrete> + ?Sized,
    {
        ExtendedKalmanFilter::forward_step(prior, f, u, process_noise)
    }

    /// Gauss-Newton MAP update of the data step.
    pub fn data_step<B, G>(&self, prior: &B, g: &G, u: &DVector<f64>, observation: &B) -> Result<B>
    where
        B: LkfStep,
        G: DualMeasurementEquation + ?Sized,
    {
        let mut x_hat = prior.mean().clone();
        let mut converged = false;

        for _ in 0..self.max_iters {
            let lin = linearize_measurement(g, &x_hat, u)?;
            let c = lin.c();
            // modified innovation: z - g(x_hat) - C*(mu_prior - x_hat)
            let modified_innovation =
                observation.mean() - g.eval(&x_hat, u) - c * (prior.mean() - &x_hat);
            let candidate = B::innovate(prior, c, &modified_innovation, observation)?;
            let delta_gn = candidate.mean() - &x_hat;

            // V(x) = -logpdf(observation, g(x,u)) - logpdf(prior, x): the
            // negative log-posterior Gauss-Newton is maximizing.
            let objective = |x: &DVector<f64>| -> f64 {
                let lik = observation
                    .logpdf(&g.eval(x, u))
                    .unwrap_or(f64::NEG_INFINITY);
                let prior_term = prior.logpdf(x).unwrap_or(f64::NEG_INFINITY);
                -(lik + prior_term)
            };

            let step = self.step_control.control(&objective, &x_hat, &delta_gn);
            let step_norm = step.norm();
            x_hat += &step;

            if step_norm < self.min_step_norm {
                converged = true;
                break;
            }
        }
        if !converged {
            warn!(
                "IEKF data_step did not converge within {} iterations",
                self.max_iters
            );
        }

        let lin = linearize_measurement(g, &x_hat, u)?;
        let c = lin.c();
        let final_innovation = observation.mean() - g.eval(&x_hat, u) - c * (prior.mean() - &x_hat);
        let posterior = B::innovate(prior, c, &final_innovation, observation)?;
        posterior.with_mean(x_hat)
    }
}

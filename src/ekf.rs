//! Extended Kalman filter: forward/data steps for a nonlinear state-space
//! model, obtained by linearizing at the prior mean and handing the
//! resulting Jacobian to [`crate::lkf`]'s propagate/innovate paths.

use nalgebra::DVector;

use crate::error::Result;
use crate::linearize::{linearize_measurement, linearize_state, DualMeasurementEquation, DualStateEquation};
use crate::lkf::LkfStep;
use crate::model::{Discrete, MeasurementEquation, StateEquation};

/// Extended Kalman filter, generic over [`crate::belief::Dense`] or
/// [`crate::belief::Sqrt`] beliefs via [`LkfStep`].
pub struct ExtendedKalmanFilter;

impl ExtendedKalmanFilter {
    /// `A = df/dx` at the prior mean; mean `f(x, u) + q`, covariance via
    /// the LKF propagate path with `A` and the process noise.
    pub fn forward_step<B, F>(
        prior: &B,
        f: &F,
        u: &DVector<f64>,
        process_noise: &B,
    ) -> Result<B>
    where
        B: LkfStep,
        F: DualStateEquation<Discrete> + ?Sized,
    {
        let x = prior.mean().clone();
        let lin = linearize_state(f, &x, u)?;
        let mean = f.eval(&x, u) + process_noise.mean();
        B::propagate(prior, lin.a(), mean, process_noise)
    }

    /// `C = dg/dx` at the prior mean; innovation `nu = z - g(x, u)`, then
    /// the LKF innovate path.
    pub fn data_step<B, G>(
        prior: &B,
        g: &G,
        u: &DVector<f64>,
        observation: &B,
    ) -> Result<B>
    where
        B: LkfStep,
        G: DualMeasurementEquation + ?Sized,
    {
        let x = prior.mean().clone();
        let lin = linearize_measurement(g, &x, u)?;
        let innovation = observation.mean() - g.eval(&x, u);
        B::innovate(prior, lin.c(), &innovation, observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::{Belief, Dense};
    use crate::linearize::DualFnMeasurement;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn dense_1d(mean: f64, var: f64) -> Dense {
        Dense::new(DVector::from_vec(vec![mean]), DMatrix::from_vec(1, 1, vec![var])).unwrap()
    }

    // Scenario 3: g(x) = x^2, prior N(1,1), observation N(1,1).
    #[test]
    fn quadratic_measurement_data_step() {
        let g = DualFnMeasurement::new(
            1,
            0,
            1,
            |x: &DVector<f64>, _u: &DVector<f64>| DVector::from_vec(vec![x[0] * x[0]]),
            |x, _u| vec![x[0] * x[0]],
        );
        let prior = dense_1d(1.0, 1.0);
        let obs = dense_1d(1.0, 1.0);
        let post = ExtendedKalmanFilter::data_step(&prior, &g, &DVector::zeros(0), &obs).unwrap();
        assert_relative_eq!(post.mean()[0], 1.0, max_relative = 1e-6);
        assert_relative_eq!(post.covariance()[(0, 0)], 0.2, max_relative = 1e-6);
    }

    #[test]
    fn ekf_reduces_to_lkf_on_linear_measurement() {
        use crate::lkf::LinearKalmanFilter;
        use crate::model::lti::LTIMeasurementEquation;

        let c = DMatrix::from_row_slice(1, 1, &[2.0]);
        let d = DMatrix::from_row_slice(1, 0, &[]);
        let lin_model = LTIMeasurementEquation::new(c, d).unwrap();
        let g = DualFnMeasurement::new(
            1,
            0,
            1,
            |x: &DVector<f64>, _u: &DVector<f64>| DVector::from_vec(vec![2.0 * x[0]]),
            |x, _u| vec![crate::dual::constant(2.0) * x[0]],
        );
        let prior = dense_1d(0.5, 1.0);
        let obs = dense_1d(0.9, 0.3);
        let u = DVector::zeros(0);

        let via_ekf = ExtendedKalmanFilter::data_step(&prior, &g, &u, &obs).unwrap();
        let via_lkf = LinearKalmanFilter::data_step(&prior, &lin_model, &u, &obs).unwrap();
        assert_relative_eq!(via_ekf.mean(), via_lkf.mean(), max_relative = 1e-9);
        assert_relative_eq!(via_ekf.covariance(), via_lkf.covariance(), max_relative = 1e-9);
    }
}

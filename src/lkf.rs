//! Linear Kalman filter forward/data steps and Rauch-Tung-Striebel backward
//! smoothing, in both the dense (covariance) and square-root (Cholesky
//! factor) representations of [`crate::belief`].
//!
//! [`LkfStep`] is the shared machinery [`crate::ekf`] and [`crate::iekf`]
//! reuse: a nonlinear forward step is a linear one evaluated at a
//! linearization point, and a nonlinear data step is the same "innovation
//! path" driven by a Jacobian instead of a constant `C`.

use log::trace;
use nalgebra::{Cholesky, DMatrix, DVector};

use crate::belief::{Belief, Dense, Sqrt};
use crate::error::{Error, Result};
use crate::model::lti::{LTIMeasurementEquation, LTIStateEquation};
use crate::model::{Discrete, MeasurementEquation, StateEquation};
use crate::sqrt_math::lq_lower;

/// A belief representation capable of the two primitive Kalman moves:
/// propagating a mean and covariance through a linear (or linearized) state
/// transition, and folding in an innovation against a linear (or
/// linearized) measurement. Implemented for [`Dense`] and [`Sqrt`]; a
/// filter step is generic over one concrete implementor at a time, so
/// mixing representations within a single call is a compile error.
pub trait LkfStep: Belief + Clone + Sized {
    /// `mean` is the already-evaluated new mean (`A*mu + B*u` for a linear
    /// model, `f(x, u)` for a linearized one); `noise` supplies its
    /// covariance (and, for `Sqrt`, its factor).
    fn propagate(prior: &Self, a: &DMatrix<f64>, mean: DVector<f64>, noise: &Self) -> Result<Self>;

    /// `innovation` is `z - predicted` (already computed by the caller, so
    /// this same path serves both a constant `C` and a Jacobian); `noise`
    /// supplies the observation covariance.
    fn innovate(
        prior: &Self,
        c: &DMatrix<f64>,
        innovation: &DVector<f64>,
        noise: &Self,
    ) -> Result<Self>;

    /// Same uncertainty, a different mean. Used by [`crate::iekf`] to graft
    /// the line-search-damped Gauss-Newton iterate onto the covariance (or
    /// factor) produced by one final un-damped innovation step.
    fn with_mean(&self, mean: DVector<f64>) -> Result<Self>;
}

impl LkfStep for Dense {
    fn propagate(prior: &Self, a: &DMatrix<f64>, mean: DVector<f64>, noise: &Self) -> Result<Self> {
        let p = prior.covariance();
        let cov = a * &p * a.transpose() + noise.covariance();
        trace!("lkf propagate: mean {mean:?}");
        Dense::new(mean, cov)
    }

    fn innovate(
        prior: &Self,
        c: &DMatrix<f64>,
        innovation: &DVector<f64>,
        noise: &Self,
    ) -> Result<Self> {
        let p = prior.covariance();
        let s = c * &p * c.transpose() + noise.covariance();
        let chol = Cholesky::new(s).ok_or(Error::SingularInnovation)?;
        let s_inv = chol.inverse();
        let k = &p * c.transpose() * &s_inv;
        let mean = prior.mean() + &k * innovation;

        // Joseph form: (I - KC) P (I - KC)^T + K R K^T. Preserves symmetry
        // and positive semi-definiteness under finite precision, unlike the
        // textbook (I - KC) P update.
        let kc = &k * c;
        let identity = DMatrix::<f64>::identity(kc.nrows(), kc.ncols());
        let one_minus_kc = &identity - &kc;
        let cov = &one_minus_kc * &p * one_minus_kc.transpose() + &k * noise.covariance() * k.transpose();
        Dense::new(mean, cov)
    }

    fn with_mean(&self, mean: DVector<f64>) -> Result<Self> {
        Dense::new(mean, self.covariance())
    }
}

impl LkfStep for Sqrt {
    fn propagate(prior: &Self, a: &DMatrix<f64>, mean: DVector<f64>, noise: &Self) -> Result<Self> {
        let n = prior.dim();
        let a_l = a * prior.factor();
        let mut stacked = DMatrix::zeros(n, 2 * n);
        stacked.view_mut((0, 0), (n, n)).copy_from(noise.factor());
        stacked.view_mut((0, n), (n, n)).copy_from(&a_l);
        let l = lq_lower(&stacked);
        Sqrt::new(mean, l)
    }

    fn innovate(
        prior: &Self,
        c: &DMatrix<f64>,
        innovation: &DVector<f64>,
        noise: &Self,
    ) -> Result<Self> {
        let n = prior.dim();
        let p = noise.dim();
        let mut m = DMatrix::zeros(p + n, p + n);
        m.view_mut((0, 0), (p, p)).copy_from(noise.factor());
        m.view_mut((0, p), (p, n)).copy_from(&(c * prior.factor()));
        m.view_mut((p, p), (n, n)).copy_from(prior.factor());
        let l_prime = lq_lower(&m);

        let l_y = l_prime.view((0, 0), (p, p)).into_owned();
        let k_tilde = l_prime.view((p, 0), (n, p)).into_owned();
        let l_x_plus = l_prime.view((p, p), (n, n)).into_owned();

        let solved = l_y
            .solve_lower_triangular(innovation)
            .ok_or(Error::SingularInnovation)?;
        let mean = prior.mean() + &k_tilde * solved;
        Sqrt::new(mean, l_x_plus)
    }

    fn with_mean(&self, mean: DVector<f64>) -> Result<Self> {
        Sqrt::new(mean, self.factor().clone())
    }
}

/// Linear Kalman filter with Rauch-Tung-Striebel smoothing, generic over
/// [`Dense`] or [`Sqrt`] beliefs via [`LkfStep`].
pub struct LinearKalmanFilter;

impl LinearKalmanFilter {
    /// `mu+ = A*mu + B*u + q`, `P+ = A*P*Aᵀ + Q` (`B*u` term omitted when
    /// the model has no control input).
    pub fn forward_step<B: LkfStep>(
        prior: &B,
        model: &LTIStateEquation<Discrete>,
        u: &DVector<f64>,
        process_noise: &B,
    ) -> Result<B> {
        if model.n_states() != prior.dim() {
            return Err(Error::MismatchedDimensions {
                expected: model.n_states(),
                got: prior.dim(),
            });
        }
        let mean = model.eval(prior.mean(), u) + process_noise.mean();
        B::propagate(prior, model.a(), mean, process_noise)
    }

    /// Innovation `nu = z - (C*mu + D*u)`, Kalman gain `K = P*Cᵀ*(C*P*Cᵀ +
    /// R)^-1`, posterior mean `mu + K*nu`, posterior covariance in Joseph
    /// form (or its square-root-factor equivalent for `Sqrt`).
    pub fn data_step<B: LkfStep>(
        prior: &B,
        model: &LTIMeasurementEquation,
        u: &DVector<f64>,
        observation: &B,
    ) -> Result<B> {
        if model.n_states() != prior.dim() {
            return Err(Error::MismatchedDimensions {
                expected: model.n_states(),
                got: prior.dim(),
            });
        }
        let predicted = model.eval(prior.mean(), u);
        let innovation = observation.mean() - predicted;
        B::innovate(prior, model.c(), &innovation, observation)
    }

    /// Rauch-Tung-Striebel backward step. Given the current posterior
    /// `(mu_k, P_k)`, the next one-step prior `(mu_{k+1}^-, P_{k+1}^-)` and
    /// the next smoothed belief, returns the smoothed belief at `k`.
    ///
    /// Always dense: smoothing is not on the hot per-observation path that
    /// motivates the square-root forward/data steps, and the RTS gain `F`
    /// requires inverting `P_{k+1}^-` regardless of the forward filter's
    /// representation, so callers smoothing a `Sqrt` filter run should
    /// convert with [`Dense::from_sqrt`] first.
    pub fn backward_step(
        posterior: &Dense,
        next_prior: &Dense,
        next_smoothed: &Dense,
        a: &DMatrix<f64>,
    ) -> Result<Dense> {
        let chol = Cholesky::new(next_prior.covariance()).ok_or(Error::SingularInnovation)?;
        let inv_next_prior = chol.inverse();
        let f = posterior.covariance() * a.transpose() * inv_next_prior;

        let mean = posterior.mean() + &f * (next_smoothed.mean() - next_prior.mean());
        let cov_diff = next_prior.covariance() - next_smoothed.covariance();
        let cov = posterior.covariance() - &f * cov_diff * f.transpose();
        Dense::new(mean, cov)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dense_1d(mean: f64, var: f64) -> Dense {
        Dense::new(DVector::from_vec(vec![mean]), DMatrix::from_vec(1, 1, vec![var])).unwrap()
    }

    fn sqrt_1d(mean: f64, var: f64) -> Sqrt {
        Sqrt::from_dense(&dense_1d(mean, var)).unwrap()
    }

    // Scenario 1: scalar integrator time step.
    #[test]
    fn forward_step_scalar_integrator() {
        let a = DMatrix::from_row_slice(1, 1, &[1.0]);
        let b = DMatrix::from_row_slice(1, 1, &[1.0]);
        let model = LTIStateEquation::<Discrete>::new(a, b).unwrap();
        let prior = dense_1d(0.0, 1.0);
        let u = DVector::from_vec(vec![1.0]);
        let q = dense_1d(0.0, 1.0);
        let post = LinearKalmanFilter::forward_step(&prior, &model, &u, &q).unwrap();
        assert_relative_eq!(post.mean()[0], 1.0);
        assert_relative_eq!(post.covariance()[(0, 0)], 2.0);

        let prior_sqrt = sqrt_1d(0.0, 1.0);
        let q_sqrt = sqrt_1d(0.0, 1.0);
        let post_sqrt = LinearKalmanFilter::forward_step(&prior_sqrt, &model, &u, &q_sqrt).unwrap();
        assert_relative_eq!(post_sqrt.mean()[0], 1.0);
        assert_relative_eq!(post_sqrt.covariance()[(0, 0)], 2.0, max_relative = 1e-10);
    }

    // Scenario 2: scalar observation data step.
    #[test]
    fn data_step_scalar_observation() {
        let c = DMatrix::from_row_slice(1, 1, &[1.0]);
        let d = DMatrix::from_row_slice(1, 0, &[]);
        let model = LTIMeasurementEquation::new(c, d).unwrap();
        let prior = dense_1d(0.0, 1.0);
        let u = DVector::zeros(0);
        let obs = dense_1d(1.0, 1.0);
        let post = LinearKalmanFilter::data_step(&prior, &model, &u, &obs).unwrap();
        assert_relative_eq!(post.mean()[0], 0.5);
        assert_relative_eq!(post.covariance()[(0, 0)], 0.5);

        let prior_sqrt = sqrt_1d(0.0, 1.0);
        let obs_sqrt = sqrt_1d(1.0, 1.0);
        let post_sqrt = LinearKalmanFilter::data_step(&prior_sqrt, &model, &u, &obs_sqrt).unwrap();
        assert_relative_eq!(post_sqrt.mean()[0], 0.5, max_relative = 1e-10);
        assert_relative_eq!(post_sqrt.covariance()[(0, 0)], 0.5, max_relative = 1e-10);
    }

    #[test]
    fn joseph_form_preserves_symmetry() {
        let c = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 1.0, 0.0, 1.0, -1.0]);
        let d = DMatrix::from_row_slice(2, 0, &[]);
        let model = LTIMeasurementEquation::new(c, d).unwrap();
        let cov = DMatrix::from_row_slice(
            3,
            3,
            &[2.0, 0.3, 0.1, 0.3, 1.5, 0.2, 0.1, 0.2, 1.0],
        );
        let prior = Dense::new(DVector::from_vec(vec![1.0, -1.0, 0.5]), cov).unwrap();
        let obs_cov = DMatrix::from_row_slice(2, 2, &[0.5, 0.0, 0.0, 0.5]);
        let obs = Dense::new(DVector::from_vec(vec![0.2, -0.3]), obs_cov).unwrap();
        let post = LinearKalmanFilter::data_step(&prior, &model, &DVector::zeros(0), &obs).unwrap();
        let p = post.covariance();
        assert_relative_eq!(p, p.transpose(), max_relative = 1e-9);
    }

    #[test]
    fn infinite_observation_covariance_leaves_prior_unchanged() {
        let c = DMatrix::from_row_slice(1, 1, &[1.0]);
        let d = DMatrix::from_row_slice(1, 0, &[]);
        let model = LTIMeasurementEquation::new(c, d).unwrap();
        let prior = dense_1d(0.3, 2.0);
        let obs = dense_1d(5.0, 1e18);
        let post = LinearKalmanFilter::data_step(&prior, &model, &DVector::zeros(0), &obs).unwrap();
        assert_relative_eq!(post.mean()[0], prior.mean()[0], max_relative = 1e-6);
        assert_relative_eq!(post.covariance()[(0, 0)], prior.covariance()[(0, 0)], max_relative = 1e-6);
    }

    #[test]
    fn zero_observation_covariance_collapses_onto_observation() {
        let c = DMatrix::from_row_slice(1, 1, &[1.0]);
        let d = DMatrix::from_row_slice(1, 0, &[]);
        let model = LTIMeasurementEquation::new(c, d).unwrap();
        let prior = dense_1d(0.3, 2.0);
        let obs = dense_1d(5.0, 1e-12);
        let post = LinearKalmanFilter::data_step(&prior, &model, &DVector::zeros(0), &obs).unwrap();
        assert_relative_eq!(post.mean()[0], 5.0, max_relative = 1e-5);
        assert_relative_eq!(post.covariance()[(0, 0)], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn rts_backward_step_matches_forward_prediction_on_noiseless_system() {
        // With zero process noise the smoothed estimate at k should equal
        // the filtered one whenever the future smoothed belief equals the
        // future prior (nothing left to correct).
        let a = DMatrix::from_row_slice(1, 1, &[1.0]);
        let posterior = dense_1d(2.0, 0.5);
        let next_prior = dense_1d(2.0, 0.5);
        let next_smoothed = dense_1d(2.0, 0.5);
        let smoothed =
            LinearKalmanFilter::backward_step(&posterior, &next_prior, &next_smoothed, &a).unwrap();
        assert_relative_eq!(smoothed.mean()[0], 2.0, max_relative = 1e-10);
        assert_relative_eq!(smoothed.covariance()[(0, 0)], 0.5, max_relative = 1e-10);
    }

    #[test]
    fn dense_and_sqrt_forward_then_data_step_agree() {
        let model_f =
            LTIStateEquation::<Discrete>::new(
                DMatrix::from_row_slice(2, 2, &[1.0, 0.1, 0.0, 1.0]),
                DMatrix::from_row_slice(2, 0, &[]),
            )
            .unwrap();
        let model_g = LTIMeasurementEquation::new(
            DMatrix::from_row_slice(1, 2, &[1.0, 0.0]),
            DMatrix::from_row_slice(1, 0, &[]),
        )
        .unwrap();
        let q_cov = DMatrix::from_row_slice(2, 2, &[0.01, 0.0, 0.0, 0.01]);
        let r_cov = DMatrix::from_row_slice(1, 1, &[0.1]);

        let prior_d = Dense::new(DVector::from_vec(vec![0.0, 1.0]), DMatrix::identity(2, 2)).unwrap();
        let prior_s = Sqrt::from_dense(&prior_d).unwrap();
        let q_d = Dense::new(DVector::zeros(2), q_cov.clone()).unwrap();
        let q_s = Sqrt::from_dense(&q_d).unwrap();
        let u = DVector::zeros(0);

        let fwd_d = LinearKalmanFilter::forward_step(&prior_d, &model_f, &u, &q_d).unwrap();
        let fwd_s = LinearKalmanFilter::forward_step(&prior_s, &model_f, &u, &q_s).unwrap();
        assert_relative_eq!(fwd_d.mean(), fwd_s.mean(), max_relative = 1e-9);
        assert_relative_eq!(fwd_d.covariance(), fwd_s.covariance(), max_relative = 1e-8);

        let obs_d = Dense::new(DVector::from_vec(vec![0.2]), r_cov.clone()).unwrap();
        let obs_s = Sqrt::from_dense(&obs_d).unwrap();
        let post_d = LinearKalmanFilter::data_step(&fwd_d, &model_g, &u, &obs_d).unwrap();
        let post_s = LinearKalmanFilter::data_step(&fwd_s, &model_g, &u, &obs_s).unwrap();
        assert_relative_eq!(post_d.mean(), post_s.mean(), max_relative = 1e-8);
        assert_relative_eq!(post_d.covariance(), post_s.covariance(), max_relative = 1e-7);
    }
}

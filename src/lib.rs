//! State estimation for nonlinear dynamical systems under Gaussian noise.
//!
//! Characteristics:
//! - Uses the [nalgebra](https://nalgebra.org) crate for math.
//! - Linear, Extended and Iterated Extended Kalman filters
//!   (`LinearKalmanFilter`, `ExtendedKalmanFilter`,
//!   `IteratedExtendedKalmanFilter`), each available in a dense (covariance)
//!   or square-root (Cholesky-factor) belief representation (`Dense`/`Sqrt`).
//! - Rauch-Tung-Striebel backward smoothing for the linear filter.
//! - Nonlinear models are linearized automatically via forward-mode
//!   automatic differentiation (`linearize_state`, `linearize_measurement`).
//! - A piecewise ground-truth trajectory renderer (`render_trip`) for a
//!   tram-like vehicle, driven by independent track-geometry and
//!   speed-profile segment streams.
//! - Strong typing used to ensure model/filter dimensions and
//!   continuous/discrete time kinds match at compile time.
//!
//! Throughout the library, state vectors and covariance matrices are
//! runtime-sized (`nalgebra::DVector`/`DMatrix`) rather than const-generic:
//! the models here (composite measurements, the 10-state tram kinematics)
//! are assembled at runtime from a variable number of parts.

mod belief;
mod discretize;
pub mod dual;
mod ekf;
mod error;
mod iekf;
mod interp;
mod lkf;
mod line_search;
mod linearize;
mod model;
mod render;
mod speed;
mod sqrt_math;
mod track;

pub use belief::{Belief, Dense, Sqrt};
pub use discretize::{discretize, euler_step, rk4_step, DiscretizedStateEquation, Method};
pub use ekf::ExtendedKalmanFilter;
pub use error::{Error, Result};
pub use iekf::IteratedExtendedKalmanFilter;
pub use interp::{lerp, slope};
pub use line_search::{BacktrackingLineSearch, IdentityStepping, StepControl};
pub use linearize::{
    linearize_measurement, linearize_state, DualFnMeasurement, DualFnState, DualMeasurementEquation,
    DualStateEquation,
};
pub use lkf::{LinearKalmanFilter, LkfStep};
pub use model::{
    Continuous, CompositeMeasurement, Discrete, FnEquation, LTIMeasurementEquation, LTIStateEquation,
    MeasurementEquation, StateEquation,
};
pub use render::{render_trip, render_trip_default, TramState};
pub use speed::{
    ActiveAccelerate, ActiveConstantSpeed, ActiveSmoothlyAccelerate, ActiveSpeedSegment, ActiveStop, SpeedSegment,
    TrajectoryDrive,
};
pub use track::{ActiveStraight, ActiveTrackSegment, ActiveTurn, TrackCurvature, TrackSegment};

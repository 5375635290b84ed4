//! Ground-truth trajectory renderer: drives the rigid-body kinematic ODE of
//! a tram-like vehicle from two independent segment streams ([`crate::track`]
//! geometry and [`crate::speed`] profile), RK4-integrating one micro-step at
//! a time.

use nalgebra::DVector;

use crate::discretize::rk4_step;
use crate::error::{Error, Result};
use crate::model::{Continuous, StateEquation};
use crate::speed::{ActiveSpeedSegment, SpeedSegment, TrajectoryDrive};
use crate::track::{ActiveTrackSegment, TrackCurvature, TrackSegment};

/// Index layout of the 10-dimensional kinematic state:
/// `[time, distance, x, y, speed, accel, jerk, heading, curvature, dcurvature]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TramState(DVector<f64>);

impl TramState {
    /// The all-zero state (vehicle at rest at the origin, facing along +x).
    pub fn zero() -> Self {
        Self(DVector::zeros(10))
    }

    /// Wraps a raw 10-vector. Fails if its length is not 10.
    pub fn from_vector(v: DVector<f64>) -> Result<Self> {
        if v.len() != 10 {
            return Err(Error::MismatchedDimensions {
                expected: 10,
                got: v.len(),
            });
        }
        Ok(Self(v))
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.0
    }

    pub fn into_vector(self) -> DVector<f64> {
        self.0
    }

    pub fn time(&self) -> f64 {
        self.0[0]
    }

    pub fn distance(&self) -> f64 {
        self.0[1]
    }

    pub fn x(&self) -> f64 {
        self.0[2]
    }

    pub fn y(&self) -> f64 {
        self.0[3]
    }

    pub fn speed(&self) -> f64 {
        self.0[4]
    }

    pub fn accel(&self) -> f64 {
        self.0[5]
    }

    pub fn jerk(&self) -> f64 {
        self.0[6]
    }

    pub fn heading(&self) -> f64 {
        self.0[7]
    }

    pub fn curvature(&self) -> f64 {
        self.0[8]
    }

    pub fn dcurvature(&self) -> f64 {
        self.0[9]
    }
}

/// `ẋ = [1, v, v·cosφ, v·sinφ, a, j, 0, v·c, v·dc, 0]`.
struct TramKinematics;

impl StateEquation<Continuous> for TramKinematics {
    fn n_states(&self) -> usize {
        10
    }

    fn n_inputs(&self) -> usize {
        0
    }

    fn eval(&self, x: &DVector<f64>, _u: &DVector<f64>) -> DVector<f64> {
        let v = x[4];
        let a = x[5];
        let j = x[6];
        let phi = x[7];
        let c = x[8];
        let dc = x[9];
        DVector::from_vec(vec![
            1.0,
            v,
            v * phi.cos(),
            v * phi.sin(),
            a,
            j,
            0.0,
            v * c,
            v * dc,
            0.0,
        ])
    }
}

/// Chains a list of [`TrackSegment`] descriptors, activating the next one
/// against the current distance whenever the active one signals
/// end-of-segment.
struct TrackChainer {
    segments: Vec<TrackSegment>,
    index: usize,
    active: ActiveTrackSegment,
}

impl TrackChainer {
    fn new(segments: Vec<TrackSegment>, start_pos: f64) -> Result<Self> {
        let first = segments
            .first()
            .ok_or_else(|| Error::InvalidShape("render_trip: tracks must be nonempty".into()))?;
        let active = first.activate(start_pos);
        Ok(Self {
            segments,
            index: 0,
            active,
        })
    }

    /// `None` means the track list is exhausted: the renderer should stop.
    fn sample(&mut self, pos: f64) -> Option<TrackCurvature> {
        loop {
            if let Some(c) = self.active.curvature(pos) {
                return Some(c);
            }
            self.index += 1;
            let next = self.segments.get(self.index)?;
            self.active = next.activate(pos);
        }
    }
}

/// Chains a list of [`SpeedSegment`] descriptors the same way, against
/// `(time, pos, speed, accel)`.
struct SpeedChainer {
    segments: Vec<SpeedSegment>,
    index: usize,
    active: ActiveSpeedSegment,
}

impl SpeedChainer {
    fn new(segments: Vec<SpeedSegment>, time0: f64, pos0: f64, speed0: f64, accel0: f64) -> Result<Self> {
        let first = segments
            .first()
            .ok_or_else(|| Error::InvalidShape("render_trip: trips must be nonempty".into()))?;
        let active = first.activate(time0, pos0, speed0, accel0)?;
        Ok(Self {
            segments,
            index: 0,
            active,
        })
    }

    /// `Ok(None)` means the trip list is exhausted.
    fn sample(&mut self, time: f64, pos: f64, speed: f64, accel: f64) -> Result<Option<TrajectoryDrive>> {
        loop {
            if let Some(d) = self.active.drive(time, pos, speed, accel) {
                return Ok(Some(d));
            }
            self.index += 1;
            let segment = match self.segments.get(self.index) {
                Some(s) => s,
                None => return Ok(None),
            };
            self.active = segment.activate(time, pos, speed, accel)?;
        }
    }
}

/// Render a ground-truth trajectory by chaining `tracks` and `trips` and
/// RK4-integrating the kinematic ODE at micro-step `dt / subsamples`,
/// appending a sample to the output every `subsamples`-th micro-step.
///
/// Terminates when either chainer is exhausted. Fails if `dt` is not finite
/// and positive, `subsamples == 0`, or either segment list is empty, or a
/// [`SpeedSegment::SmoothlyAccelerate`] with zero jerk is activated.
pub fn render_trip(
    tracks: Vec<TrackSegment>,
    trips: Vec<SpeedSegment>,
    dt: f64,
    subsamples: u32,
    state0: TramState,
) -> Result<Vec<TramState>> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(Error::NonPositiveTimeStep(dt));
    }
    if subsamples < 1 {
        return Err(Error::InvalidShape("render_trip: subsamples must be >= 1".into()));
    }

    let sub_dt = dt / subsamples as f64;
    let ode = TramKinematics;
    let u = DVector::zeros(0);

    let mut x = state0.into_vector();
    let mut track_chainer = TrackChainer::new(tracks, x[1])?;
    let mut speed_chainer = SpeedChainer::new(trips, x[0], x[1], x[4], x[5])?;

    let mut out = Vec::new();
    let mut iteration: u64 = 1;

    loop {
        let pos = x[1];
        let time = x[0];
        let speed = x[4];
        let accel = x[5];

        let curvature_sample = match track_chainer.sample(pos) {
            Some(c) => c,
            None => break,
        };
        let drive_sample = match speed_chainer.sample(time, pos, speed, accel)? {
            Some(d) => d,
            None => break,
        };

        x[8] = curvature_sample.curvature;
        x[9] = curvature_sample.dcurvature;
        x[4] = drive_sample.speed;
        x[5] = drive_sample.accel;
        x[6] = drive_sample.jerk;
        x[0] = (iteration - 1) as f64 * sub_dt;

        x = rk4_step(&ode, &x, &u, sub_dt);

        if iteration % subsamples as u64 == 0 {
            out.push(TramState::from_vector(x.clone())?);
        }
        iteration += 1;
    }

    Ok(out)
}

/// [`render_trip`] with `subsamples = 1` and `state0` all-zero.
pub fn render_trip_default(tracks: Vec<TrackSegment>, trips: Vec<SpeedSegment>, dt: f64) -> Result<Vec<TramState>> {
    render_trip(tracks, trips, dt, 1, TramState::zero())
}

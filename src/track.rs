//! Track geometry segments: straight runs and turns with clothoid entry/exit
//! transitions, each yielding a position-parameterized curvature sample.
//!
//! Segment heterogeneity is modeled as a tagged enum rather than `dyn
//! Trait`: [`crate::render`]'s micro-step loop samples the active segment
//! once per RK4 micro-step, so keeping the match monomorphic and
//! inlineable matters more here than it does for, say,
//! [`crate::model::CompositeMeasurement`].

use crate::error::{Error, Result};

/// A curvature sample: `curvature` and its slope with respect to position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackCurvature {
    pub curvature: f64,
    pub dcurvature: f64,
}

/// A track geometry descriptor, not yet anchored to a starting position.
#[derive(Debug, Clone, Copy)]
pub enum TrackSegment {
    Straight { distance: f64 },
    Turn {
        angle: f64,
        radius: f64,
        transition_length: f64,
    },
}

impl TrackSegment {
    /// A straight run of the given length.
    pub fn straight(distance: f64) -> Self {
        Self::Straight { distance }
    }

    /// A turn through `angle` radians (signed: positive left, say) of
    /// `radius`, entered and exited through a clothoid of length
    /// `transition_length`.
    pub fn turn(angle: f64, radius: f64, transition_length: f64) -> Result<Self> {
        if radius <= 0.0 {
            return Err(Error::NegativeRadius(format!(
                "TrackTurn: radius must be positive, got {radius}"
            )));
        }
        if transition_length < 0.0 {
            return Err(Error::NegativeRadius(format!(
                "TrackTurn: transition_length must be nonnegative, got {transition_length}"
            )));
        }
        Ok(Self::Turn {
            angle,
            radius,
            transition_length,
        })
    }

    /// Anchor this descriptor at `start_pos`, computing its breakpoints.
    pub fn activate(&self, start_pos: f64) -> ActiveTrackSegment {
        match *self {
            TrackSegment::Straight { distance } => {
                ActiveTrackSegment::Straight(ActiveStraight {
                    end_pos: start_pos + distance,
                })
            }
            TrackSegment::Turn {
                angle,
                radius,
                transition_length,
            } => {
                let sign = if angle >= 0.0 { 1.0 } else { -1.0 };
                let k_max_full = 1.0 / radius;
                let theta_t = transition_length * k_max_full;
                let total = angle.abs();

                // Each clothoid ramp sweeps theta_t/2 of the total angle
                // (curvature rises linearly from 0 to k_max over it, so the
                // average curvature during the ramp is k_max/2); two ramps
                // consume theta_t between them.
                let (t_len, arc_len, k_max) = if theta_t <= total {
                    let arc_len = (total - theta_t) / k_max_full;
                    (transition_length, arc_len, sign * k_max_full)
                } else {
                    let t_len = (total * radius * transition_length).sqrt();
                    let k_max = angle / t_len;
                    (t_len, 0.0, k_max)
                };

                let t_in_start = start_pos;
                let arc_start = t_in_start + t_len;
                let t_out_start = arc_start + arc_len;
                let turn_end = t_out_start + t_len;
                ActiveTrackSegment::Turn(ActiveTurn {
                    t_in_start,
                    arc_start,
                    t_out_start,
                    turn_end,
                    t_len,
                    k_max,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveStraight {
    end_pos: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveTurn {
    t_in_start: f64,
    arc_start: f64,
    t_out_start: f64,
    turn_end: f64,
    t_len: f64,
    k_max: f64,
}

/// An activated [`TrackSegment`], anchored at its starting position.
#[derive(Debug, Clone, Copy)]
pub enum ActiveTrackSegment {
    Straight(ActiveStraight),
    Turn(ActiveTurn),
}

impl ActiveTrackSegment {
    /// Sample the curvature at `pos`. `None` signals end-of-segment: the
    /// chainer in [`crate::render`] should activate the next descriptor and
    /// retry, not treat this as an error.
    pub fn curvature(&self, pos: f64) -> Option<TrackCurvature> {
        match self {
            ActiveTrackSegment::Straight(s) => {
                if pos < s.end_pos {
                    Some(TrackCurvature {
                        curvature: 0.0,
                        dcurvature: 0.0,
                    })
                } else {
                    None
                }
            }
            ActiveTrackSegment::Turn(t) => {
                if pos < t.arc_start {
                    let slope = t.k_max / t.t_len;
                    Some(TrackCurvature {
                        curvature: slope * (pos - t.t_in_start),
                        dcurvature: slope,
                    })
                } else if pos < t.t_out_start {
                    Some(TrackCurvature {
                        curvature: t.k_max,
                        dcurvature: 0.0,
                    })
                } else if pos < t.turn_end {
                    let slope = -t.k_max / t.t_len;
                    Some(TrackCurvature {
                        curvature: t.k_max + slope * (pos - t.t_out_start),
                        dcurvature: slope,
                    })
                } else {
                    None
                }
            }
        }
    }
}

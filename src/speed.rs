//! Longitudinal speed-profile segments: stops, constant-acceleration and
//! jerk-limited ramps, and constant-speed cruises, each yielding a
//! time/position-parameterized drive sample.
//!
//! Modeled as a tagged enum for the same reason as [`crate::track`]:
//! [`crate::render`] samples the active segment once per RK4 micro-step.

use crate::error::{Error, Result};
use crate::interp::lerp;

/// A drive sample: instantaneous speed, acceleration and jerk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryDrive {
    pub speed: f64,
    pub accel: f64,
    pub jerk: f64,
}

/// A speed-profile descriptor, not yet anchored to a starting time/position.
#[derive(Debug, Clone, Copy)]
pub enum SpeedSegment {
    Stop {
        duration: f64,
    },
    Accelerate {
        to_speed: f64,
        acceleration: f64,
    },
    SmoothlyAccelerate {
        to_speed: f64,
        acceleration: f64,
        jerk: f64,
    },
    ConstantSpeed {
        speed: f64,
        distance: f64,
    },
}

impl SpeedSegment {
    /// Hold still for `duration` seconds.
    pub fn stop(duration: f64) -> Result<Self> {
        if duration < 0.0 {
            return Err(Error::InvalidShape(format!(
                "Stop: duration must be nonnegative, got {duration}"
            )));
        }
        Ok(Self::Stop { duration })
    }

    /// Ramp speed linearly to `to_speed` at the given (magnitude)
    /// `acceleration`.
    pub fn accelerate(to_speed: f64, acceleration: f64) -> Result<Self> {
        if acceleration <= 0.0 {
            return Err(Error::InvalidShape(format!(
                "Accelerate: acceleration must be positive, got {acceleration}"
            )));
        }
        Ok(Self::Accelerate {
            to_speed,
            acceleration,
        })
    }

    /// Ramp speed to `to_speed` with a jerk-limited trapezoidal
    /// acceleration profile of peak magnitude `acceleration` and jerk
    /// magnitude `jerk`. `jerk == 0` is accepted here (the division by it
    /// only happens at [`activate`](Self::activate), which is where it is
    /// reported as a domain error).
    pub fn smoothly_accelerate(to_speed: f64, acceleration: f64, jerk: f64) -> Result<Self> {
        if acceleration <= 0.0 {
            return Err(Error::InvalidShape(format!(
                "SmoothlyAccelerate: acceleration must be positive, got {acceleration}"
            )));
        }
        if jerk < 0.0 {
            return Err(Error::InvalidShape(format!(
                "SmoothlyAccelerate: jerk must be nonnegative, got {jerk}"
            )));
        }
        Ok(Self::SmoothlyAccelerate {
            to_speed,
            acceleration,
            jerk,
        })
    }

    /// Cruise at `speed` for `distance`.
    pub fn constant_speed(speed: f64, distance: f64) -> Result<Self> {
        if distance < 0.0 {
            return Err(Error::InvalidShape(format!(
                "ConstantSpeed: distance must be nonnegative, got {distance}"
            )));
        }
        Ok(Self::ConstantSpeed { speed, distance })
    }

    /// Anchor this descriptor at the current `(time, pos, speed, accel)`.
    pub fn activate(&self, time: f64, pos: f64, speed: f64, accel: f64) -> Result<ActiveSpeedSegment> {
        let _ = accel;
        match *self {
            SpeedSegment::Stop { duration } => Ok(ActiveSpeedSegment::Stop(ActiveStop {
                end_time: time + duration,
            })),
            SpeedSegment::Accelerate {
                to_speed,
                acceleration,
            } => {
                let delta_v = to_speed - speed;
                let duration = delta_v.abs() / acceleration;
                let signed_a = delta_v.signum() * acceleration;
                Ok(ActiveSpeedSegment::Accelerate(ActiveAccelerate {
                    t0: time,
                    v0: speed,
                    t1: time + duration,
                    v1: to_speed,
                    accel: signed_a,
                }))
            }
            SpeedSegment::SmoothlyAccelerate {
                to_speed,
                acceleration,
                jerk,
            } => {
                if jerk == 0.0 {
                    return Err(Error::DivisionByZero(
                        "SmoothlyAccelerate: jerk must be nonzero at activation".into(),
                    ));
                }
                let dir = if to_speed >= speed { 1.0 } else { -1.0 };
                let delta_v = (to_speed - speed).abs();
                let t_ramp_full = (acceleration / jerk).abs();
                let delta_v_ramp = t_ramp_full * acceleration.abs();

                let (peak_accel_mag, t_ramp, cruise_duration) = if delta_v_ramp < delta_v {
                    let cruise = (delta_v - delta_v_ramp) / acceleration.abs();
                    (acceleration, t_ramp_full, cruise)
                } else {
                    let peak = (jerk.abs() * delta_v).sqrt();
                    let t_ramp = (peak / jerk).abs();
                    (peak, t_ramp, 0.0)
                };

                let peak_accel = dir * peak_accel_mag;
                let jerk_signed = dir * jerk;

                let t0 = time;
                let t1 = t0 + t_ramp;
                let t2 = t1 + cruise_duration;
                let t3 = t2 + t_ramp;

                let v_after_ramp_up = speed + 0.5 * peak_accel * t_ramp;
                let v_after_cruise = v_after_ramp_up + peak_accel * cruise_duration;

                Ok(ActiveSpeedSegment::SmoothlyAccelerate(ActiveSmoothlyAccelerate {
                    t0,
                    t1,
                    t2,
                    t3,
                    v0: speed,
                    v_after_ramp_up,
                    v_after_cruise,
                    peak_accel,
                    jerk_signed,
                }))
            }
            SpeedSegment::ConstantSpeed {
                speed: target_speed,
                distance,
            } => Ok(ActiveSpeedSegment::ConstantSpeed(ActiveConstantSpeed {
                end_pos: pos + distance,
                speed: target_speed,
            })),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveStop {
    end_time: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveAccelerate {
    t0: f64,
    v0: f64,
    t1: f64,
    v1: f64,
    accel: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveSmoothlyAccelerate {
    t0: f64,
    t1: f64,
    t2: f64,
    t3: f64,
    v0: f64,
    v_after_ramp_up: f64,
    v_after_cruise: f64,
    peak_accel: f64,
    jerk_signed: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ActiveConstantSpeed {
    end_pos: f64,
    speed: f64,
}

/// An activated [`SpeedSegment`], anchored at its starting time/position.
#[derive(Debug, Clone, Copy)]
pub enum ActiveSpeedSegment {
    Stop(ActiveStop),
    Accelerate(ActiveAccelerate),
    SmoothlyAccelerate(ActiveSmoothlyAccelerate),
    ConstantSpeed(ActiveConstantSpeed),
}

impl ActiveSpeedSegment {
    /// Sample the drive at `(time, pos, speed, accel)`. `None` signals
    /// end-of-segment.
    pub fn drive(&self, time: f64, pos: f64, speed: f64, accel: f64) -> Option<TrajectoryDrive> {
        let _ = (speed, accel);
        match self {
            ActiveSpeedSegment::Stop(s) => {
                if time < s.end_time {
                    Some(TrajectoryDrive {
                        speed: 0.0,
                        accel: 0.0,
                        jerk: 0.0,
                    })
                } else {
                    None
                }
            }
            ActiveSpeedSegment::Accelerate(a) => {
                if time < a.t1 {
                    Some(TrajectoryDrive {
                        speed: lerp(a.t0, a.v0, a.t1, a.v1, time),
                        accel: a.accel,
                        jerk: 0.0,
                    })
                } else {
                    None
                }
            }
            ActiveSpeedSegment::SmoothlyAccelerate(a) => {
                if time < a.t0 {
                    // Pre-activation: hold the initial speed with zero
                    // accel/jerk (the source's "returns initial_jerk" is
                    // read as a typo for "initial_speed").
                    Some(TrajectoryDrive {
                        speed: a.v0,
                        accel: 0.0,
                        jerk: 0.0,
                    })
                } else if time < a.t1 {
                    let tau = time - a.t0;
                    Some(TrajectoryDrive {
                        speed: a.v0 + 0.5 * a.jerk_signed * tau * tau,
                        accel: a.jerk_signed * tau,
                        jerk: a.jerk_signed,
                    })
                } else if time < a.t2 {
                    Some(TrajectoryDrive {
                        speed: a.v_after_ramp_up + a.peak_accel * (time - a.t1),
                        accel: a.peak_accel,
                        jerk: 0.0,
                    })
                } else if time < a.t3 {
                    let tau = time - a.t2;
                    Some(TrajectoryDrive {
                        speed: a.v_after_cruise + a.peak_accel * tau - 0.5 * a.jerk_signed * tau * tau,
                        accel: a.peak_accel - a.jerk_signed * tau,
                        jerk: -a.jerk_signed,
                    })
                } else {
                    None
                }
            }
            ActiveSpeedSegment::ConstantSpeed(c) => {
                if pos < c.end_pos {
                    Some(TrajectoryDrive {
                        speed: c.speed,
                        accel: 0.0,
                        jerk: 0.0,
                    })
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stop_holds_zero_until_duration() {
        let seg = SpeedSegment::stop(1.0).unwrap();
        let active = seg.activate(0.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(
            active.drive(0.5, 0.0, 0.0, 0.0),
            Some(TrajectoryDrive {
                speed: 0.0,
                accel: 0.0,
                jerk: 0.0
            })
        );
        assert_eq!(active.drive(1.0, 0.0, 0.0, 0.0), None);
    }

    #[test]
    fn accelerate_ramps_linearly() {
        let seg = SpeedSegment::accelerate(10.0, 2.0).unwrap();
        let active = seg.activate(0.0, 0.0, 0.0, 0.0).unwrap();
        let sample = active.drive(2.5, 0.0, 0.0, 0.0).unwrap();
        assert_relative_eq!(sample.speed, 5.0);
        assert_relative_eq!(sample.accel, 2.0);
        assert_eq!(active.drive(5.0, 0.0, 0.0, 0.0), None);
    }

    #[test]
    fn smoothly_accelerate_rejects_zero_jerk_at_activation() {
        let seg = SpeedSegment::smoothly_accelerate(10.0, 1.0, 0.0).unwrap();
        assert!(seg.activate(0.0, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn smoothly_accelerate_reaches_target_speed_with_trapezoid() {
        let seg = SpeedSegment::smoothly_accelerate(10.0, 2.0, 1.0).unwrap();
        let active = seg.activate(0.0, 0.0, 0.0, 0.0).unwrap();
        if let ActiveSpeedSegment::SmoothlyAccelerate(a) = active {
            let final_sample = active.drive(a.t3 - 1e-9, 0.0, 0.0, 0.0).unwrap();
            assert_relative_eq!(final_sample.speed, 10.0, max_relative = 1e-3);
            assert_eq!(active.drive(a.t3 + 1e-6, 0.0, 0.0, 0.0), None);
        } else {
            panic!("expected SmoothlyAccelerate");
        }
    }

    #[test]
    fn smoothly_accelerate_no_cruise_when_ramps_alone_exceed_delta_v() {
        // acceleration large relative to jerk and delta_v, so peak < acceleration
        let seg = SpeedSegment::smoothly_accelerate(1.0, 5.0, 0.5).unwrap();
        let active = seg.activate(0.0, 0.0, 0.0, 0.0).unwrap();
        if let ActiveSpeedSegment::SmoothlyAccelerate(a) = active {
            assert_relative_eq!(a.t1, a.t2, max_relative = 1e-9);
            assert!(a.peak_accel.abs() < 5.0);
        } else {
            panic!("expected SmoothlyAccelerate");
        }
    }

    #[test]
    fn constant_speed_active_until_distance() {
        let seg = SpeedSegment::constant_speed(10.0, 50.0).unwrap();
        let active = seg.activate(0.0, 0.0, 10.0, 0.0).unwrap();
        assert_eq!(
            active.drive(0.0, 25.0, 10.0, 0.0),
            Some(TrajectoryDrive {
                speed: 10.0,
                accel: 0.0,
                jerk: 0.0
            })
        );
        assert_eq!(active.drive(0.0, 50.0, 10.0, 0.0), None);
    }
}

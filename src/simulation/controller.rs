//! Closed-loop steering, throttle and brake control law.
//!
//! Steering tracks the heading toward the active waypoint through the sine of
//! the heading error, so the command saturates at the configured maximum and
//! flips sign when the target passes behind the vehicle. Throttle regulates
//! speed up to a cruise threshold. Any braking demand (an impending collision
//! or a signal stop) zeroes the throttle and applies a speed-proportional brake
//! torque with a floor.

use std::f32::consts::{PI, TAU};

use bevy::prelude::*;
use smallvec::SmallVec;

use crate::error::{ensure_non_negative, ensure_positive, ConfigError};
use crate::simulation::kinematics::Kinematics;

/// Calibration constants for the control law.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Motor torque per unit of speed deficit below cruise speed.
    pub max_motor_torque: f32,
    /// Maximum wheel steer angle in degrees.
    pub max_steering_angle: f32,
    pub steering_gain: f32,
    /// Brake torque per unit of speed while braking.
    pub brake_torque_gain: f32,
    /// Floor applied to any nonzero brake command.
    pub min_brake_torque: f32,
    /// Speed (units/s) at and above which no motor torque is applied.
    pub cruise_speed: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_motor_torque: 200.0,
            max_steering_angle: 30.0,
            steering_gain: 1.0,
            brake_torque_gain: 300.0,
            min_brake_torque: 150.0,
            cruise_speed: 5.0,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("max_motor_torque", self.max_motor_torque)?;
        ensure_positive("max_steering_angle", self.max_steering_angle)?;
        ensure_non_negative("steering_gain", self.steering_gain)?;
        ensure_non_negative("brake_torque_gain", self.brake_torque_gain)?;
        ensure_non_negative("min_brake_torque", self.min_brake_torque)?;
        ensure_positive("cruise_speed", self.cruise_speed)?;
        Ok(())
    }
}

/// Reasons a vehicle must brake this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BrakingDemand {
    pub collision: bool,
    pub signal: bool,
}

impl BrakingDemand {
    pub fn active(&self) -> bool {
        self.collision || self.signal
    }
}

/// Control outputs for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlOutput {
    /// Steer angle in degrees; positive turns right.
    pub steering_angle: f32,
    pub motor_torque: f32,
    pub brake_torque: f32,
}

impl ControlOutput {
    pub fn is_braking(&self) -> bool {
        self.brake_torque > 0.0
    }

    /// Fan the outputs out to every axle: steer angle to steering axles,
    /// motor and brake torque to motorized axles.
    pub fn for_axles(&self, axles: &[Axle]) -> SmallVec<[AxleCommand; 2]> {
        axles
            .iter()
            .map(|axle| {
                let wheel = WheelCommand {
                    steer_angle: if axle.steering { self.steering_angle } else { 0.0 },
                    motor_torque: if axle.motor { self.motor_torque } else { 0.0 },
                    brake_torque: if axle.motor { self.brake_torque } else { 0.0 },
                };
                AxleCommand {
                    axle: *axle,
                    left: wheel,
                    right: wheel,
                }
            })
            .collect()
    }
}

/// Which actuation an axle takes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Axle {
    pub motor: bool,
    pub steering: bool,
}

impl Axle {
    pub const FRONT_STEERING: Axle = Axle {
        motor: false,
        steering: true,
    };
    pub const REAR_DRIVE: Axle = Axle {
        motor: true,
        steering: false,
    };

    /// Front axle steers, rear axle drives and brakes.
    pub fn default_layout() -> Vec<Axle> {
        vec![Axle::FRONT_STEERING, Axle::REAR_DRIVE]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelCommand {
    pub steer_angle: f32,
    pub motor_torque: f32,
    pub brake_torque: f32,
}

/// Commands for the left and right wheel of one axle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxleCommand {
    pub axle: Axle,
    pub left: WheelCommand,
    pub right: WheelCommand,
}

/// Signed angle (radians, in `(-PI, PI]`) from `forward` to `to_target`,
/// both projected onto the ground (x/z) plane. Positive means the target lies
/// counter-clockwise of the heading when angles are measured with `atan2(z, x)`.
pub fn heading_error(forward: Vec3, to_target: Vec3) -> f32 {
    let heading = forward.z.atan2(forward.x);
    let bearing = to_target.z.atan2(to_target.x);
    wrap_angle(bearing - heading)
}

fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// The per-tick control law.
#[derive(Clone, Debug, Default)]
pub struct VehicleController {
    config: ControllerConfig,
}

impl VehicleController {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn steering(&self, heading_error: f32) -> f32 {
        -self.config.steering_gain * heading_error.sin() * self.config.max_steering_angle
    }

    pub fn motor_torque(&self, speed: f32, braking: BrakingDemand) -> f32 {
        if braking.active() || speed >= self.config.cruise_speed {
            return 0.0;
        }
        self.config.max_motor_torque * (self.config.cruise_speed - speed)
    }

    pub fn brake_torque(&self, speed: f32, braking: BrakingDemand) -> f32 {
        if !braking.active() {
            return 0.0;
        }
        (self.config.brake_torque_gain * speed).max(self.config.min_brake_torque)
    }

    /// Full control output toward `target` from the current kinematics.
    pub fn compute(&self, kinematics: &Kinematics, target: Vec3, braking: BrakingDemand) -> ControlOutput {
        let error = heading_error(kinematics.forward, target - kinematics.position);
        let speed = kinematics.speed();
        ControlOutput {
            steering_angle: self.steering(error),
            motor_torque: self.motor_torque(speed, braking),
            brake_torque: self.brake_torque(speed, braking),
        }
    }
}

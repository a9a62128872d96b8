//! Vehicle kinematics and the physics body interface.
//!
//! The control law never integrates motion itself. A `VehicleBody` takes the
//! per-axle commands, steps its own dynamics and reports position, velocity
//! and heading back. `PointMassBody` is the built-in body used for headless
//! runs: a kinematic bicycle with linear drag.

use bevy::prelude::*;

use crate::error::{ensure_non_negative, ensure_positive, ConfigError};
use crate::simulation::controller::AxleCommand;

/// Kinematic state reported by a physics body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Unit forward direction of the vehicle body.
    pub forward: Vec3,
}

impl Kinematics {
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Projection of `point - position` onto the forward direction.
    pub fn forward_offset(&self, point: Vec3) -> f32 {
        (point - self.position).dot(self.forward)
    }

    /// Heading around the up axis, measured as `atan2(forward.z, forward.x)`.
    pub fn yaw(&self) -> f32 {
        self.forward.z.atan2(self.forward.x)
    }
}

/// Physics integration supplied from outside the control loop.
pub trait VehicleBody: Send + Sync {
    fn kinematics(&self) -> Kinematics;

    /// Latch wheel commands; they stay in effect until the next call.
    fn actuate(&mut self, commands: &[AxleCommand]);

    fn integrate(&mut self, dt: f32);
}

/// Physical parameters of `PointMassBody`.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyParams {
    pub mass: f32,
    pub wheel_radius: f32,
    pub wheelbase: f32,
    /// Linear drag coefficient (1/s).
    pub drag: f32,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            mass: 1500.0,
            wheel_radius: 0.35,
            wheelbase: 2.6,
            drag: 0.3,
        }
    }
}

impl BodyParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("mass", self.mass)?;
        ensure_positive("wheel_radius", self.wheel_radius)?;
        ensure_positive("wheelbase", self.wheelbase)?;
        ensure_non_negative("drag", self.drag)
    }
}

/// Kinematic bicycle body driven by wheel torques.
#[derive(Clone, Debug)]
pub struct PointMassBody {
    params: BodyParams,
    position: Vec3,
    yaw: f32,
    speed: f32,
    steer_angle: f32,
    drive_torque: f32,
    brake_torque: f32,
}

impl PointMassBody {
    pub fn new(position: Vec3, forward: Vec3, params: BodyParams) -> Self {
        Self {
            params,
            position,
            yaw: forward.z.atan2(forward.x),
            speed: 0.0,
            steer_angle: 0.0,
            drive_torque: 0.0,
            brake_torque: 0.0,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed.max(0.0);
        self
    }

    fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin())
    }
}

impl VehicleBody for PointMassBody {
    fn kinematics(&self) -> Kinematics {
        let forward = self.forward();
        Kinematics {
            position: self.position,
            velocity: forward * self.speed,
            forward,
        }
    }

    fn actuate(&mut self, commands: &[AxleCommand]) {
        let steering: Vec<f32> = commands
            .iter()
            .filter(|c| c.axle.steering)
            .map(|c| (c.left.steer_angle + c.right.steer_angle) * 0.5)
            .collect();
        self.steer_angle = if steering.is_empty() {
            0.0
        } else {
            steering.iter().sum::<f32>() / steering.len() as f32
        };

        self.drive_torque = commands
            .iter()
            .map(|c| c.left.motor_torque + c.right.motor_torque)
            .sum();
        self.brake_torque = commands
            .iter()
            .map(|c| c.left.brake_torque + c.right.brake_torque)
            .sum();
    }

    fn integrate(&mut self, dt: f32) {
        let p = &self.params;
        let drive_accel = self.drive_torque / p.wheel_radius / p.mass;
        self.speed += (drive_accel - p.drag * self.speed) * dt;

        // Brakes only ever bring the body to rest, never into reverse.
        let brake_decel = self.brake_torque / p.wheel_radius / p.mass;
        self.speed = (self.speed - brake_decel * dt).max(0.0);

        // Positive steer turns right, i.e. toward decreasing yaw.
        let yaw_rate = -self.speed * self.steer_angle.to_radians().tan() / p.wheelbase;
        self.yaw += yaw_rate * dt;
        self.position += self.forward() * self.speed * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::controller::{Axle, ControlOutput};

    fn body() -> PointMassBody {
        PointMassBody::new(Vec3::ZERO, Vec3::Z, BodyParams::default())
    }

    fn drive(body: &mut PointMassBody, output: ControlOutput, ticks: usize) {
        let commands = output.for_axles(&Axle::default_layout());
        body.actuate(&commands);
        for _ in 0..ticks {
            body.integrate(0.05);
        }
    }

    #[test]
    fn motor_torque_accelerates_along_heading() {
        let mut body = body();
        drive(
            &mut body,
            ControlOutput {
                motor_torque: 500.0,
                ..default()
            },
            20,
        );
        let kinematics = body.kinematics();
        assert!(kinematics.speed() > 1.0);
        assert!(kinematics.position.z > 0.5);
        assert!(kinematics.position.x.abs() < 1e-3);
    }

    #[test]
    fn brakes_stop_without_reversing() {
        let mut body = body().with_speed(4.0);
        drive(
            &mut body,
            ControlOutput {
                brake_torque: 1000.0,
                ..default()
            },
            200,
        );
        let kinematics = body.kinematics();
        assert_eq!(kinematics.speed(), 0.0);
        assert!(kinematics.position.z > 0.0);
    }

    #[test]
    fn positive_steer_turns_right() {
        let mut body = body().with_speed(3.0);
        drive(
            &mut body,
            ControlOutput {
                steering_angle: 20.0,
                ..default()
            },
            20,
        );
        // Heading +z, a right turn swings toward +x.
        assert!(body.kinematics().forward.x > 0.1);
        assert!(body.kinematics().position.x > 0.0);
    }

    #[test]
    fn forward_offset_separates_ahead_from_behind() {
        let kinematics = body().kinematics();
        assert!(kinematics.forward_offset(Vec3::new(1.0, 0.0, 3.0)) > 0.0);
        assert!(kinematics.forward_offset(Vec3::new(1.0, 0.0, -3.0)) < 0.0);
    }

    #[test]
    fn degenerate_body_params_are_rejected() {
        assert!(BodyParams::default().validate().is_ok());
        for params in [
            BodyParams { mass: 0.0, ..default() },
            BodyParams { wheel_radius: 0.0, ..default() },
            BodyParams { wheelbase: f32::NAN, ..default() },
        ] {
            assert!(matches!(params.validate(), Err(ConfigError::NotPositive { .. })));
        }
        let params = BodyParams { drag: -0.1, ..default() };
        assert_eq!(
            params.validate(),
            Err(ConfigError::Negative { field: "drag", value: -0.1 })
        );
    }
}

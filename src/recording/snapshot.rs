//! Per-tick vehicle state snapshots and their text record format.

use bevy::prelude::*;
use chrono::{DateTime, Local};

use crate::recording::projection::{screen_rect, world_bounds, PartBounds, ScreenProjector};
use crate::simulation::kinematics::Kinematics;

/// `7/16/2017 7:10:00 PM`: three whitespace-separated tokens, which the
/// offline tools skip over to reach the frame index at field 15.
pub const TIMESTAMP_FORMAT: &str = "%-m/%-d/%Y %-I:%M:%S %p";

/// Kinematics and screen-space box of one vehicle at one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub screen_centroid: Vec2,
    pub screen_velocity: Vec2,
    /// Width and height of the screen-space bounding box.
    pub screen_size: Vec2,
    pub timestamp: DateTime<Local>,
    pub frame: u64,
}

impl VehicleState {
    /// Capture a snapshot, projecting through `projector`.
    ///
    /// Screen velocity is the pixel displacement per second of the centroid.
    /// With no rendered parts the box collapses to zero size.
    pub fn capture(
        kinematics: &Kinematics,
        parts: &[PartBounds],
        projector: &dyn ScreenProjector,
        frame: u64,
        timestamp: DateTime<Local>,
    ) -> Self {
        let screen_centroid = projector.world_to_screen(kinematics.position).truncate();
        let screen_velocity = projector
            .world_to_screen(kinematics.position + kinematics.velocity)
            .truncate()
            - screen_centroid;
        let screen_size = world_bounds(parts, kinematics)
            .map(|(min, max)| screen_rect(projector, min, max).1)
            .unwrap_or(Vec2::ZERO);

        Self {
            position: kinematics.position,
            velocity: kinematics.velocity,
            screen_centroid,
            screen_velocity,
            screen_size,
            timestamp,
            frame,
        }
    }

    /// One line of the state-history file. Field order and rounding are
    /// relied on by the offline labeling tools.
    pub fn to_record_line(&self) -> String {
        let values = [
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
            self.screen_centroid.x,
            self.screen_centroid.y,
            self.screen_velocity.x,
            self.screen_velocity.y,
            self.screen_size.x,
            self.screen_size.y,
        ];
        let mut line = values
            .iter()
            .map(|v| format!("{:.1}", round_tenth(*v)))
            .collect::<Vec<_>>()
            .join(" ");
        line.push(' ');
        line.push_str(&self.timestamp.format(TIMESTAMP_FORMAT).to_string());
        line.push(' ');
        line.push_str(&self.frame.to_string());
        line
    }
}

fn round_tenth(value: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    let rounded = (value * 10.0).round() / 10.0;
    // Avoid printing "-0.0".
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

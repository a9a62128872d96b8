//! Waypoint trajectories assigned to vehicles at spawn.

use bevy::prelude::*;

/// Maneuver a trajectory performs through the intersection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnType {
    Left,
    Right,
    Through,
}

/// One of the two independently signaled directions of traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoadApproach {
    Road1,
    Road2,
}

impl RoadApproach {
    pub const ALL: [RoadApproach; 2] = [RoadApproach::Road1, RoadApproach::Road2];

    pub fn label(self) -> &'static str {
        match self {
            RoadApproach::Road1 => "Road 1",
            RoadApproach::Road2 => "Road 2",
        }
    }
}

/// An ordered path of waypoints plus its road/turn classification.
///
/// Trajectories are copied out of a route pool when a vehicle spawns and are
/// never mutated afterwards, so the fields are only exposed through accessors.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    waypoints: Vec<Vec3>,
    turn: TurnType,
    road: RoadApproach,
}

impl Trajectory {
    pub fn new(waypoints: Vec<Vec3>, turn: TurnType, road: RoadApproach) -> Self {
        Self {
            waypoints,
            turn,
            road,
        }
    }

    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }

    /// Waypoint at `index`, if the trajectory has one.
    pub fn waypoint(&self, index: usize) -> Option<Vec3> {
        self.waypoints.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.waypoints.len()
    }

    pub fn turn(&self) -> TurnType {
        self.turn
    }

    pub fn road(&self) -> RoadApproach {
        self.road
    }

    /// Total polyline length from the first to the last waypoint.
    pub fn path_length(&self) -> f32 {
        self.waypoints.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

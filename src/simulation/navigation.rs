//! Waypoint-following state machine.

use bevy::prelude::*;

use crate::error::{ensure_positive, ConfigError};
use crate::simulation::trajectory::Trajectory;

#[derive(Resource, Clone, Debug, PartialEq)]
pub struct NavigationConfig {
    /// A waypoint counts as reached once the vehicle is closer than this.
    pub arrival_threshold: f32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            arrival_threshold: 8.0,
        }
    }
}

impl NavigationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("arrival_threshold", self.arrival_threshold)
    }
}

/// Progress of a vehicle along its trajectory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationState {
    /// Heading for the waypoint at this index.
    Following(usize),
    /// Passed the last waypoint; the vehicle is due for removal.
    Arrived,
}

impl Default for NavigationState {
    fn default() -> Self {
        NavigationState::Following(0)
    }
}

/// What a navigation update did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationEvent {
    Holding,
    Advanced { from: usize, to: usize },
    Arrived,
}

impl NavigationState {
    pub fn current_index(&self) -> Option<usize> {
        match self {
            NavigationState::Following(index) => Some(*index),
            NavigationState::Arrived => None,
        }
    }

    pub fn is_arrived(&self) -> bool {
        matches!(self, NavigationState::Arrived)
    }

    /// Position of the waypoint currently targeted. `None` once arrived or
    /// when the index does not resolve (empty trajectory).
    pub fn current_target(&self, trajectory: &Trajectory) -> Option<Vec3> {
        self.current_index()
            .and_then(|index| trajectory.waypoint(index))
    }

    /// Check arrival at the current waypoint and step forward at most once.
    pub fn update(
        &mut self,
        position: Vec3,
        trajectory: &Trajectory,
        arrival_threshold: f32,
    ) -> NavigationEvent {
        let NavigationState::Following(index) = *self else {
            return NavigationEvent::Holding;
        };
        let Some(target) = trajectory.waypoint(index) else {
            return NavigationEvent::Holding;
        };

        if position.distance(target) >= arrival_threshold {
            return NavigationEvent::Holding;
        }

        if trajectory.is_last(index) {
            *self = NavigationState::Arrived;
            NavigationEvent::Arrived
        } else {
            *self = NavigationState::Following(index + 1);
            NavigationEvent::Advanced {
                from: index,
                to: index + 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::trajectory::{RoadApproach, TurnType};

    fn straight(points: &[f32]) -> Trajectory {
        Trajectory::new(
            points.iter().map(|z| Vec3::new(0.0, 0.0, *z)).collect(),
            TurnType::Through,
            RoadApproach::Road1,
        )
    }

    #[test]
    fn holds_until_inside_threshold() {
        let trajectory = straight(&[20.0, 40.0]);
        let mut state = NavigationState::default();

        assert_eq!(state.update(Vec3::ZERO, &trajectory, 8.0), NavigationEvent::Holding);
        assert_eq!(
            state.update(Vec3::new(0.0, 0.0, 12.0), &trajectory, 8.0),
            NavigationEvent::Holding,
            "exactly on the threshold does not count"
        );
        assert_eq!(
            state.update(Vec3::new(0.0, 0.0, 12.5), &trajectory, 8.0),
            NavigationEvent::Advanced { from: 0, to: 1 }
        );
        assert_eq!(state.current_target(&trajectory), Some(Vec3::new(0.0, 0.0, 40.0)));
    }

    #[test]
    fn advances_one_waypoint_per_update_even_when_several_are_close() {
        let trajectory = straight(&[1.0, 2.0, 3.0]);
        let mut state = NavigationState::default();

        let position = Vec3::new(0.0, 0.0, 2.0);
        assert_eq!(
            state.update(position, &trajectory, 8.0),
            NavigationEvent::Advanced { from: 0, to: 1 }
        );
        assert_eq!(
            state.update(position, &trajectory, 8.0),
            NavigationEvent::Advanced { from: 1, to: 2 }
        );
        assert_eq!(state.update(position, &trajectory, 8.0), NavigationEvent::Arrived);
        assert!(state.is_arrived());
        assert_eq!(state.update(position, &trajectory, 8.0), NavigationEvent::Holding);
    }

    #[test]
    fn single_waypoint_goes_straight_to_arrived() {
        let trajectory = straight(&[5.0]);
        let mut state = NavigationState::default();
        assert_eq!(state.update(Vec3::ZERO, &trajectory, 8.0), NavigationEvent::Arrived);
        assert_eq!(state.current_target(&trajectory), None);
    }

    #[test]
    fn empty_trajectory_has_no_target_and_never_moves() {
        let trajectory = straight(&[]);
        let mut state = NavigationState::default();
        assert_eq!(state.current_target(&trajectory), None);
        assert_eq!(state.update(Vec3::ZERO, &trajectory, 8.0), NavigationEvent::Holding);
        assert_eq!(state, NavigationState::Following(0));
    }
}

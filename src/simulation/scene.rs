//! Intersection layout: interior zone, spawn points and route pools.

use bevy::prelude::*;

use crate::simulation::collision::ZoneId;
use crate::simulation::signal::IntersectionId;
use crate::simulation::trajectory::{RoadApproach, Trajectory, TurnType};

/// Box marking "inside the intersection".
#[derive(Clone, Debug, PartialEq)]
pub struct InteriorZone {
    pub id: ZoneId,
    pub intersection: Option<IntersectionId>,
    pub min: Vec3,
    pub max: Vec3,
}

impl InteriorZone {
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Where vehicles enter the scene, and the routes they may take from there.
#[derive(Clone, Debug)]
pub struct SpawnPoint {
    pub position: Vec3,
    pub forward: Vec3,
    pub routes: Vec<Trajectory>,
}

/// Dimensions of a four-way intersection centred at the origin.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneLayout {
    /// Half the side length of the square interior.
    pub half_width: f32,
    /// Distance from road centreline to lane centre.
    pub lane_offset: f32,
    /// Distance from the centre to spawn points and route ends.
    pub approach_length: f32,
}

impl Default for SceneLayout {
    fn default() -> Self {
        Self {
            half_width: 12.0,
            // Oncoming lanes stay farther apart than the detection radius.
            lane_offset: 4.0,
            approach_length: 60.0,
        }
    }
}

/// Static geometry shared by the session and the spawner.
#[derive(Resource, Clone, Debug)]
pub struct IntersectionScene {
    pub interior_min: Vec3,
    pub interior_max: Vec3,
    pub spawn_points: Vec<SpawnPoint>,
}

impl Default for IntersectionScene {
    fn default() -> Self {
        Self::four_way(&SceneLayout::default())
    }
}

impl IntersectionScene {
    /// Two crossing roads: road 1 runs along z, road 2 along x. Traffic keeps
    /// right. Each of the four approaches offers a left, right and through
    /// route.
    pub fn four_way(layout: &SceneLayout) -> Self {
        let directions = [
            (Vec3::Z, RoadApproach::Road1),
            (Vec3::NEG_Z, RoadApproach::Road1),
            (Vec3::X, RoadApproach::Road2),
            (Vec3::NEG_X, RoadApproach::Road2),
        ];
        let spawn_points = directions
            .iter()
            .map(|(direction, road)| approach(*direction, *road, layout))
            .collect();

        let hw = layout.half_width;
        Self {
            interior_min: Vec3::new(-hw, -1.0, -hw),
            interior_max: Vec3::new(hw, 5.0, hw),
            spawn_points,
        }
    }

    pub fn interior(&self, id: ZoneId, intersection: Option<IntersectionId>) -> InteriorZone {
        InteriorZone {
            id,
            intersection,
            min: self.interior_min,
            max: self.interior_max,
        }
    }
}

/// Right-hand side of a ground-plane travel direction.
fn right_of(direction: Vec3) -> Vec3 {
    Vec3::new(direction.z, 0.0, -direction.x)
}

fn approach(d: Vec3, road: RoadApproach, layout: &SceneLayout) -> SpawnPoint {
    let (hw, lane, far) = (layout.half_width, layout.lane_offset, layout.approach_length);
    let r = right_of(d);
    let entry = -d * hw + r * lane;

    let through = Trajectory::new(
        vec![entry, d * hw + r * lane, d * far + r * lane],
        TurnType::Through,
        road,
    );
    // After a right turn the vehicle travels along r; its right side is -d.
    let right = Trajectory::new(
        vec![entry, r * hw - d * lane, r * far - d * lane],
        TurnType::Right,
        road,
    );
    // After a left turn it travels along -r; its right side is d.
    let left = Trajectory::new(
        vec![entry, (d - r) * lane, -r * hw + d * lane, -r * far + d * lane],
        TurnType::Left,
        road,
    );

    SpawnPoint {
        position: -d * far + r * lane,
        forward: d,
        routes: vec![left, right, through],
    }
}

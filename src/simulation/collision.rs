//! Proximity reaction: collision braking and signal braking.
//!
//! Each tick a vehicle receives the set of entities overlapping its detection
//! volume. The set is partitioned against the previous tick's set into
//! entered, continuing and exited overlaps, and each partition runs through
//! its own rule:
//!
//! * vehicle entered ahead: raise the collision flag
//! * vehicle continuing: refresh the threat distance; raise the flag if the
//!   vehicle has just moved ahead
//! * vehicle exited: clear the collision flag, even when other vehicles still
//!   overlap
//! * interior zone entered or continuing: brake unless the vehicle's road shows
//!   Green
//! * interior zone exited: stop signal braking
//!
//! Exits are processed after enters and stays, so an exit always leaves the
//! collision flag cleared for the rest of the tick. Because the flag is only
//! raised on an entry or on a vehicle moving from behind to ahead, a clear
//! caused by one threat leaving persists while another threat that was
//! already ahead keeps overlapping.

use bevy::prelude::*;
use smallvec::SmallVec;

use crate::simulation::kinematics::Kinematics;
use crate::simulation::signal::{IntersectionId, Intersections};
use crate::simulation::trajectory::RoadApproach;
use crate::simulation::vehicle::VehicleId;

/// Distances at or below this are treated as "no usable distance".
const MIN_THREAT_DISTANCE: f32 = 1e-4;

/// Identifier of an intersection interior zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub u32);

/// What an overlap is with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OverlapKind {
    Vehicle(VehicleId),
    /// Interior zone of an intersection. `intersection` is `None` when the
    /// zone has no signal attached.
    Interior {
        zone: ZoneId,
        intersection: Option<IntersectionId>,
    },
}

/// Stable key used to match overlaps across ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverlapKey {
    Vehicle(VehicleId),
    Interior(ZoneId),
}

/// One entity overlapping the detection volume this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Overlap {
    pub kind: OverlapKind,
    pub position: Vec3,
}

impl Overlap {
    pub fn vehicle(id: VehicleId, position: Vec3) -> Self {
        Self {
            kind: OverlapKind::Vehicle(id),
            position,
        }
    }

    pub fn interior(zone: ZoneId, intersection: Option<IntersectionId>, position: Vec3) -> Self {
        Self {
            kind: OverlapKind::Interior { zone, intersection },
            position,
        }
    }

    pub fn key(&self) -> OverlapKey {
        match self.kind {
            OverlapKind::Vehicle(id) => OverlapKey::Vehicle(id),
            OverlapKind::Interior { zone, .. } => OverlapKey::Interior(zone),
        }
    }
}

pub type Overlaps = SmallVec<[Overlap; 4]>;

/// Overlaps split by how they relate to the previous tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlapPartition {
    pub entered: Overlaps,
    pub continuing: Overlaps,
    pub exited: SmallVec<[OverlapKey; 4]>,
}

/// Split `current` overlaps against the keys seen last tick.
pub fn partition_overlaps(previous: &[OverlapKey], current: &[Overlap]) -> OverlapPartition {
    let mut partition = OverlapPartition::default();
    for overlap in current {
        if previous.contains(&overlap.key()) {
            partition.continuing.push(*overlap);
        } else {
            partition.entered.push(*overlap);
        }
    }
    partition.exited = previous
        .iter()
        .filter(|key| !current.iter().any(|o| o.key() == **key))
        .copied()
        .collect();
    partition
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Tracked {
    key: OverlapKey,
    /// For vehicles: whether it was ahead when last evaluated.
    ahead: bool,
}

/// Per-vehicle proximity state.
#[derive(Clone, Debug, Default)]
pub struct CollisionMonitor {
    impending_collision: bool,
    distance_to_threat: Option<f32>,
    signal_braking: bool,
    tracked: SmallVec<[Tracked; 4]>,
}

impl CollisionMonitor {
    pub fn impending_collision(&self) -> bool {
        self.impending_collision
    }

    /// Distance to the nearest overlapping vehicle, if one is known and the
    /// distance is usable.
    pub fn distance_to_threat(&self) -> Option<f32> {
        self.distance_to_threat
    }

    pub fn signal_braking(&self) -> bool {
        self.signal_braking
    }

    /// Number of overlaps open after the last update.
    pub fn open_overlaps(&self) -> usize {
        self.tracked.len()
    }

    /// Feed this tick's overlaps through the enter/stay/exit rules.
    pub fn observe(
        &mut self,
        ego: &Kinematics,
        road: RoadApproach,
        overlaps: &[Overlap],
        intersections: &Intersections,
    ) {
        let previous: SmallVec<[OverlapKey; 4]> = self.tracked.iter().map(|t| t.key).collect();
        let partition = partition_overlaps(&previous, overlaps);

        if !partition.entered.is_empty() || !partition.exited.is_empty() {
            debug!(
                "proximity: {} entered, {} continuing, {} exited",
                partition.entered.len(),
                partition.continuing.len(),
                partition.exited.len()
            );
        }

        // Exits first: a threat entering this tick must survive another
        // overlap's exit clearing the flag.
        for key in &partition.exited {
            self.on_exit(*key);
        }
        let mut tracked = SmallVec::new();
        for overlap in &partition.entered {
            tracked.push(self.on_enter(ego, road, overlap, intersections));
        }
        for overlap in &partition.continuing {
            tracked.push(self.on_stay(ego, road, overlap, intersections));
        }
        self.tracked = tracked;

        self.distance_to_threat = nearest_vehicle_distance(ego, overlaps);
    }

    fn on_enter(
        &mut self,
        ego: &Kinematics,
        road: RoadApproach,
        overlap: &Overlap,
        intersections: &Intersections,
    ) -> Tracked {
        let key = overlap.key();
        match overlap.kind {
            OverlapKind::Vehicle(_) => {
                let ahead = ego.forward_offset(overlap.position) > 0.0;
                if ahead {
                    self.impending_collision = true;
                }
                Tracked { key, ahead }
            }
            OverlapKind::Interior { intersection, .. } => {
                self.signal_braking = signal_braking_required(intersection, road, intersections);
                Tracked { key, ahead: false }
            }
        }
    }

    fn on_stay(
        &mut self,
        ego: &Kinematics,
        road: RoadApproach,
        overlap: &Overlap,
        intersections: &Intersections,
    ) -> Tracked {
        let key = overlap.key();
        match overlap.kind {
            OverlapKind::Vehicle(_) => {
                let was_ahead = self
                    .tracked
                    .iter()
                    .find(|t| t.key == key)
                    .is_some_and(|t| t.ahead);
                let ahead = ego.forward_offset(overlap.position) > 0.0;
                if ahead && !was_ahead {
                    self.impending_collision = true;
                }
                Tracked { key, ahead }
            }
            OverlapKind::Interior { intersection, .. } => {
                self.signal_braking = signal_braking_required(intersection, road, intersections);
                Tracked { key, ahead: false }
            }
        }
    }

    fn on_exit(&mut self, key: OverlapKey) {
        match key {
            OverlapKey::Vehicle(id) => {
                // Cleared on any exit, even with other vehicles still in range.
                self.impending_collision = false;
                debug!("proximity: vehicle {} left, collision flag cleared", id.0);
            }
            OverlapKey::Interior(_) => {
                self.signal_braking = false;
            }
        }
    }
}

/// Signal-braking rule for a vehicle inside an intersection interior.
/// An interior without a resolvable signal never requires braking.
pub fn signal_braking_required(
    intersection: Option<IntersectionId>,
    road: RoadApproach,
    intersections: &Intersections,
) -> bool {
    let Some(id) = intersection else {
        warn!("interior zone has no intersection signal attached, not braking");
        return false;
    };
    match intersections.phase_for(id, road) {
        Some(phase) => phase.requires_braking(),
        None => {
            warn!("intersection {} not found, not braking", id.0);
            false
        }
    }
}

fn nearest_vehicle_distance(ego: &Kinematics, overlaps: &[Overlap]) -> Option<f32> {
    overlaps
        .iter()
        .filter(|o| matches!(o.kind, OverlapKind::Vehicle(_)))
        .map(|o| o.position.distance(ego.position))
        .filter(|d| *d > MIN_THREAT_DISTANCE)
        .min_by(|a, b| a.total_cmp(b))
}

//! Simulation session: owns vehicles, intersections and the recorder, and
//! advances them one fixed tick at a time.
//!
//! A tick runs in this order:
//!
//! 1. Proximity is sensed from the positions every vehicle had at the start
//!    of the tick.
//! 2. Every active vehicle ticks (control, integration, navigation, snapshot).
//! 3. Traffic signals advance by `dt`.
//! 4. Vehicles that arrived or expired are removed; arrived histories are
//!    flushed to the recorder.

use bevy::prelude::*;

use crate::error::{ConfigError, SimError};
use crate::recording::projection::{CameraProjector, ScreenProjector};
use crate::recording::recorder::StateRecorder;
use crate::simulation::collision::{Overlap, Overlaps, ZoneId};
use crate::simulation::controller::{ControllerConfig, VehicleController};
use crate::simulation::kinematics::{BodyParams, PointMassBody, VehicleBody};
use crate::simulation::navigation::NavigationConfig;
use crate::simulation::scene::{InteriorZone, IntersectionScene, SpawnPoint};
use crate::simulation::signal::{IntersectionId, Intersections, PhaseChange, SignalTimings};
use crate::simulation::trajectory::Trajectory;
use crate::simulation::vehicle::{TickContext, Vehicle, VehicleConfig, VehicleId, VehicleStatus};

/// Everything needed to start a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionConfig {
    pub controller: ControllerConfig,
    pub navigation: NavigationConfig,
    pub vehicle: VehicleConfig,
    pub signal: SignalTimings,
    pub body: BodyParams,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()?;
        self.navigation.validate()?;
        self.vehicle.validate()?;
        self.signal.validate()?;
        self.body.validate()
    }
}

/// What happened during one tick.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    pub frame: u64,
    /// Vehicles removed at the end of the tick, with the reason.
    pub removed: Vec<(VehicleId, VehicleStatus)>,
    pub phase_changes: Vec<PhaseChange>,
    /// Vehicles still active after removal.
    pub active: usize,
}

impl TickReport {
    pub fn arrived(&self) -> usize {
        self.count(VehicleStatus::Arrived)
    }

    pub fn expired(&self) -> usize {
        self.count(VehicleStatus::Expired)
    }

    fn count(&self, status: VehicleStatus) -> usize {
        self.removed.iter().filter(|(_, s)| *s == status).count()
    }
}

#[derive(Resource)]
pub struct Session {
    controller: VehicleController,
    navigation: NavigationConfig,
    vehicle_config: VehicleConfig,
    body_params: BodyParams,
    intersections: Intersections,
    zones: Vec<InteriorZone>,
    vehicles: Vec<Vehicle>,
    recorder: Box<dyn StateRecorder>,
    projector: Box<dyn ScreenProjector>,
    frame: u64,
    elapsed: f32,
    next_id: u64,
}

impl Session {
    /// Empty session with no intersections. Rejects invalid configuration.
    pub fn new(config: &SessionConfig, recorder: Box<dyn StateRecorder>) -> Result<Self, SimError> {
        config.validate()?;
        info!(
            "Session started: cruise speed {}, arrival threshold {}, max lifetime {}s",
            config.controller.cruise_speed,
            config.navigation.arrival_threshold,
            config.vehicle.max_lifetime
        );
        Ok(Self {
            controller: VehicleController::new(config.controller.clone()),
            navigation: config.navigation.clone(),
            vehicle_config: config.vehicle.clone(),
            body_params: config.body.clone(),
            intersections: Intersections::default(),
            zones: Vec::new(),
            vehicles: Vec::new(),
            recorder,
            projector: Box::new(CameraProjector::default()),
            frame: 0,
            elapsed: 0.0,
            next_id: 1,
        })
    }

    /// Session with one signalised intersection covering the scene interior.
    pub fn from_scene(
        config: &SessionConfig,
        scene: &IntersectionScene,
        recorder: Box<dyn StateRecorder>,
    ) -> Result<Self, SimError> {
        let mut session = Self::new(config, recorder)?;
        let intersection = session.add_intersection(config.signal.clone())?;
        session.add_interior_zone(scene.interior_min, scene.interior_max, Some(intersection));
        Ok(session)
    }

    pub fn with_projector(mut self, projector: Box<dyn ScreenProjector>) -> Self {
        self.projector = projector;
        self
    }

    pub fn add_intersection(&mut self, timings: SignalTimings) -> Result<IntersectionId, ConfigError> {
        timings.validate()?;
        Ok(self.intersections.add(timings))
    }

    /// Register an interior zone. `intersection` may be `None` for a zone that
    /// is not controlled by any signal.
    pub fn add_interior_zone(
        &mut self,
        min: Vec3,
        max: Vec3,
        intersection: Option<IntersectionId>,
    ) -> ZoneId {
        let id = ZoneId(self.zones.len() as u32);
        self.zones.push(InteriorZone {
            id,
            intersection,
            min: min.min(max),
            max: min.max(max),
        });
        id
    }

    pub fn spawn_vehicle(&mut self, trajectory: Trajectory, body: Box<dyn VehicleBody>) -> VehicleId {
        let id = VehicleId(self.next_id);
        self.next_id += 1;
        info!(
            "Spawned vehicle {} on {} ({:?}, {} waypoints)",
            id.0,
            trajectory.road().label(),
            trajectory.turn(),
            trajectory.len()
        );
        self.vehicles.push(Vehicle::new(id, trajectory, body));
        id
    }

    /// Spawn a vehicle at rest on a spawn point.
    pub fn spawn_at(&mut self, point: &SpawnPoint, trajectory: Trajectory) -> VehicleId {
        let body = PointMassBody::new(point.position, point.forward, self.body_params.clone());
        self.spawn_vehicle(trajectory, Box::new(body))
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id() == id)
    }

    pub fn vehicle_positions(&self) -> Vec<Vec3> {
        self.vehicles.iter().map(|v| v.kinematics().position).collect()
    }

    pub fn intersections(&self) -> &Intersections {
        &self.intersections
    }

    pub fn zones(&self) -> &[InteriorZone] {
        &self.zones
    }

    /// Index of the last completed tick.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated seconds since the session started.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn advance(&mut self, dt: f32) -> TickReport {
        self.frame += 1;

        let settled: Vec<(VehicleId, Vec3)> = self
            .vehicles
            .iter()
            .map(|v| (v.id(), v.kinematics().position))
            .collect();

        let ctx = TickContext {
            controller: &self.controller,
            navigation: &self.navigation,
            vehicle: &self.vehicle_config,
            intersections: &self.intersections,
            projector: &*self.projector,
            frame: self.frame,
            dt,
        };
        let radius = self.vehicle_config.detection_radius;

        for (vehicle, (id, position)) in self.vehicles.iter_mut().zip(&settled) {
            let overlaps = sense_overlaps(*id, *position, &settled, &self.zones, radius);
            let Some(tick) = vehicle.tick(&ctx, &overlaps) else {
                continue;
            };
            if let Err(err) = self.recorder.append(*id, &tick.snapshot) {
                warn!("Vehicle {}: {}", id.0, err);
            }
        }

        let phase_changes = self.intersections.advance(dt);
        let removed = self.remove_finished();
        self.elapsed += dt;

        TickReport {
            frame: self.frame,
            removed,
            phase_changes,
            active: self.vehicles.len(),
        }
    }

    fn remove_finished(&mut self) -> Vec<(VehicleId, VehicleStatus)> {
        let (finished, active): (Vec<Vehicle>, Vec<Vehicle>) =
            std::mem::take(&mut self.vehicles)
                .into_iter()
                .partition(|v| !v.is_active());
        self.vehicles = active;

        let mut removed = Vec::with_capacity(finished.len());
        for vehicle in finished {
            let id = vehicle.id();
            match vehicle.status() {
                VehicleStatus::Arrived => {
                    info!(
                        "Vehicle {} arrived after {:.1}s ({} snapshots)",
                        id.0,
                        vehicle.lifetime(),
                        vehicle.history().len()
                    );
                    if let Err(err) = self.recorder.flush(id, vehicle.history()) {
                        warn!("Vehicle {}: {}", id.0, err);
                    }
                }
                VehicleStatus::Expired => {
                    info!("Vehicle {} expired at waypoint {:?}", id.0, vehicle.navigation());
                    self.recorder.close(id);
                }
                VehicleStatus::Active => {}
            }
            removed.push((id, vehicle.status()));
        }
        removed
    }
}

/// Overlaps of the vehicle `ego` at `position`: other vehicles within
/// `radius`, and every interior zone containing it.
fn sense_overlaps(
    ego: VehicleId,
    position: Vec3,
    settled: &[(VehicleId, Vec3)],
    zones: &[InteriorZone],
    radius: f32,
) -> Overlaps {
    let mut overlaps = Overlaps::new();
    for (id, other) in settled {
        if *id != ego && other.distance(position) <= radius {
            overlaps.push(Overlap::vehicle(*id, *other));
        }
    }
    for zone in zones.iter().filter(|zone| zone.contains(position)) {
        overlaps.push(Overlap::interior(zone.id, zone.intersection, zone.center()));
    }
    overlaps
}

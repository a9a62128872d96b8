//! A simulated vehicle: trajectory, navigation, proximity state and body.

use bevy::prelude::*;
use chrono::Local;

use crate::error::{ensure_non_negative, ensure_positive, ConfigError};
use crate::recording::projection::{PartBounds, ScreenProjector};
use crate::recording::snapshot::VehicleState;
use crate::simulation::collision::{CollisionMonitor, Overlap};
use crate::simulation::controller::{Axle, BrakingDemand, ControlOutput, VehicleController};
use crate::simulation::kinematics::{Kinematics, VehicleBody};
use crate::simulation::navigation::{NavigationConfig, NavigationEvent, NavigationState};
use crate::simulation::signal::Intersections;
use crate::simulation::trajectory::Trajectory;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub u64);

/// Per-vehicle settings shared by every vehicle in a session.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct VehicleConfig {
    /// Seconds after spawn at which a vehicle is removed regardless of progress.
    pub max_lifetime: f32,
    /// Radius of the detection volume around the vehicle.
    pub detection_radius: f32,
    pub axles: Vec<Axle>,
    pub parts: Vec<PartBounds>,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            max_lifetime: 60.0,
            detection_radius: 7.0,
            axles: Axle::default_layout(),
            parts: PartBounds::sedan(),
        }
    }
}

impl VehicleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("max_lifetime", self.max_lifetime)?;
        ensure_non_negative("detection_radius", self.detection_radius)?;
        if self.axles.is_empty() {
            return Err(ConfigError::NoAxles);
        }
        Ok(())
    }
}

/// Lifecycle of a vehicle. Anything but `Active` is terminal and leads to
/// removal at the end of the tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VehicleStatus {
    Active,
    Arrived,
    Expired,
}

/// Read-only session state a vehicle needs for one tick.
pub struct TickContext<'a> {
    pub controller: &'a VehicleController,
    pub navigation: &'a NavigationConfig,
    pub vehicle: &'a VehicleConfig,
    pub intersections: &'a Intersections,
    pub projector: &'a dyn ScreenProjector,
    pub frame: u64,
    pub dt: f32,
}

/// Outcome of one vehicle tick.
#[derive(Clone, Debug)]
pub struct VehicleTick {
    pub output: Option<ControlOutput>,
    pub navigation: NavigationEvent,
    pub snapshot: VehicleState,
}

pub struct Vehicle {
    id: VehicleId,
    trajectory: Trajectory,
    navigation: NavigationState,
    monitor: CollisionMonitor,
    body: Box<dyn VehicleBody>,
    lifetime: f32,
    status: VehicleStatus,
    last_output: ControlOutput,
    history: Vec<VehicleState>,
}

impl Vehicle {
    pub fn new(id: VehicleId, trajectory: Trajectory, body: Box<dyn VehicleBody>) -> Self {
        Self {
            id,
            trajectory,
            navigation: NavigationState::default(),
            monitor: CollisionMonitor::default(),
            body,
            lifetime: 0.0,
            status: VehicleStatus::Active,
            last_output: ControlOutput::default(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn navigation(&self) -> NavigationState {
        self.navigation
    }

    pub fn monitor(&self) -> &CollisionMonitor {
        &self.monitor
    }

    pub fn kinematics(&self) -> Kinematics {
        self.body.kinematics()
    }

    pub fn lifetime(&self) -> f32 {
        self.lifetime
    }

    pub fn status(&self) -> VehicleStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == VehicleStatus::Active
    }

    /// Control output of the most recent tick that produced one.
    pub fn last_output(&self) -> ControlOutput {
        self.last_output
    }

    pub fn history(&self) -> &[VehicleState] {
        &self.history
    }

    pub fn braking_demand(&self) -> BrakingDemand {
        BrakingDemand {
            collision: self.monitor.impending_collision(),
            signal: self.monitor.signal_braking(),
        }
    }

    /// Run one tick: react to overlaps, compute and apply control, integrate,
    /// check waypoint arrival and lifetime, then snapshot.
    pub fn tick(&mut self, ctx: &TickContext, overlaps: &[Overlap]) -> Option<VehicleTick> {
        if !self.is_active() {
            return None;
        }

        let kinematics = self.body.kinematics();
        self.monitor.observe(&kinematics, self.trajectory.road(), overlaps, ctx.intersections);

        let output = match self.navigation.current_target(&self.trajectory) {
            Some(target) => {
                let output = ctx.controller.compute(&kinematics, target, self.braking_demand());
                self.body.actuate(&output.for_axles(&ctx.vehicle.axles));
                self.last_output = output;
                Some(output)
            }
            None => {
                warn!(
                    "vehicle {}: no current waypoint ({:?}), skipping control",
                    self.id.0, self.navigation
                );
                None
            }
        };

        self.body.integrate(ctx.dt);
        let kinematics = self.body.kinematics();

        let navigation = self.navigation.update(
            kinematics.position,
            &self.trajectory,
            ctx.navigation.arrival_threshold,
        );
        match navigation {
            NavigationEvent::Advanced { from, to } => {
                debug!("vehicle {}: waypoint {} reached, heading for {}", self.id.0, from, to);
            }
            NavigationEvent::Arrived => self.status = VehicleStatus::Arrived,
            NavigationEvent::Holding => {}
        }

        self.lifetime += ctx.dt;
        if self.is_active() && self.lifetime >= ctx.vehicle.max_lifetime {
            self.status = VehicleStatus::Expired;
        }

        let snapshot = VehicleState::capture(
            &kinematics,
            &ctx.vehicle.parts,
            ctx.projector,
            ctx.frame,
            Local::now(),
        );
        self.history.push(snapshot.clone());

        Some(VehicleTick {
            output,
            navigation,
            snapshot,
        })
    }
}

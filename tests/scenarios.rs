use bevy::math::Vec3;
use intersim::recording::recorder::{MemoryRecorder, WriteMode};
use intersim::simulation::controller::AxleCommand;
use intersim::simulation::kinematics::{Kinematics, VehicleBody};
use intersim::simulation::navigation::NavigationState;
use intersim::simulation::scene::IntersectionScene;
use intersim::simulation::signal::{LightPhase, SignalTimings};
use intersim::simulation::trajectory::{RoadApproach, Trajectory, TurnType};
use intersim::simulation::vehicle::VehicleStatus;
use intersim::{Session, SessionConfig};

/// Moves at a constant velocity and ignores every command, so vehicle
/// positions are known exactly at each tick.
struct ScriptedBody {
    position: Vec3,
    velocity: Vec3,
}

impl ScriptedBody {
    fn boxed(position: Vec3, velocity: Vec3) -> Box<dyn VehicleBody> {
        Box::new(Self { position, velocity })
    }
}

impl VehicleBody for ScriptedBody {
    fn kinematics(&self) -> Kinematics {
        Kinematics {
            position: self.position,
            velocity: self.velocity,
            forward: self.velocity.normalize_or_zero(),
        }
    }

    fn actuate(&mut self, _commands: &[AxleCommand]) {}

    fn integrate(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }
}

fn northbound(waypoints: Vec<Vec3>) -> Trajectory {
    Trajectory::new(waypoints, TurnType::Through, RoadApproach::Road1)
}

#[test]
fn two_waypoint_route_advances_then_arrives() {
    let recorder = MemoryRecorder::new(WriteMode::Bulk);
    let mut session = Session::new(&SessionConfig::default(), Box::new(recorder.clone())).unwrap();
    let id = session.spawn_vehicle(
        northbound(vec![Vec3::new(0.0, 0.0, 20.0), Vec3::new(0.0, 0.0, 40.0)]),
        ScriptedBody::boxed(Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0)),
    );

    // One unit of travel per tick; the threshold is a strict 8 units.
    for _ in 0..12 {
        session.advance(0.5);
        assert_eq!(session.vehicle(id).unwrap().navigation(), NavigationState::Following(0));
    }
    session.advance(0.5);
    assert_eq!(session.vehicle(id).unwrap().navigation(), NavigationState::Following(1));

    for _ in 14..33 {
        let report = session.advance(0.5);
        assert!(report.removed.is_empty());
    }
    let report = session.advance(0.5);
    assert_eq!(report.frame, 33);
    assert_eq!(report.removed, vec![(id, VehicleStatus::Arrived)]);
    assert!(session.vehicle(id).is_none());

    let lines = recorder.lines(id);
    assert_eq!(lines.len(), 33);
    assert!(lines[0].starts_with("0.0 0.0 1.0 0.0 0.0 2.0 "));
    assert!(lines[32].ends_with(" 33"));
}

#[test]
fn entering_interior_on_yellow_brakes() {
    let mut session = Session::new(
        &SessionConfig::default(),
        Box::new(MemoryRecorder::default()),
    )
    .unwrap();
    let intersection = session
        .add_intersection(SignalTimings {
            green_duration: 0.5,
            yellow_duration: 50.0,
            red_duration: 50.0,
            road_offset: 200.0,
        })
        .unwrap();
    session.add_interior_zone(
        Vec3::new(-5.0, -1.0, 10.0),
        Vec3::new(5.0, 5.0, 20.0),
        Some(intersection),
    );
    let id = session.spawn_vehicle(
        northbound(vec![Vec3::new(0.0, 0.0, 200.0)]),
        ScriptedBody::boxed(Vec3::new(0.0, 0.0, 8.0), Vec3::new(0.0, 0.0, 2.0)),
    );

    // Road 1 turns yellow at the end of the first tick.
    session.advance(0.5);
    assert_eq!(
        session.intersections().phase_for(intersection, RoadApproach::Road1),
        Some(LightPhase::Yellow)
    );
    session.advance(0.5);
    assert!(!session.vehicle(id).unwrap().last_output().is_braking());

    // Starts this tick at z = 10, on the zone boundary.
    session.advance(0.5);
    let vehicle = session.vehicle(id).unwrap();
    assert!(vehicle.monitor().signal_braking());
    let output = vehicle.last_output();
    assert_eq!(output.motor_torque, 0.0);
    assert!(output.brake_torque >= 150.0);
}

#[test]
fn road_two_waits_on_red_inside_the_interior() {
    let scene = IntersectionScene::default();
    let mut session = Session::from_scene(
        &SessionConfig::default(),
        &scene,
        Box::new(MemoryRecorder::default()),
    )
    .unwrap();
    let id = session.spawn_vehicle(
        Trajectory::new(vec![Vec3::new(100.0, 0.0, -4.0)], TurnType::Through, RoadApproach::Road2),
        ScriptedBody::boxed(Vec3::new(-11.0, 0.0, -4.0), Vec3::new(1.0, 0.0, 0.0)),
    );

    session.advance(0.5);
    let vehicle = session.vehicle(id).unwrap();
    assert!(vehicle.monitor().signal_braking());
    assert!(vehicle.last_output().is_braking());
}

#[test]
fn closed_loop_vehicle_crosses_on_green_and_is_recorded() {
    let scene = IntersectionScene::default();
    let config = SessionConfig {
        signal: SignalTimings {
            green_duration: 1000.0,
            ..SignalTimings::default()
        },
        ..SessionConfig::default()
    };
    let recorder = MemoryRecorder::new(WriteMode::Bulk);
    let mut session = Session::from_scene(&config, &scene, Box::new(recorder.clone())).unwrap();

    let point = &scene.spawn_points[0];
    let through = point
        .routes
        .iter()
        .find(|route| route.turn() == TurnType::Through)
        .cloned()
        .unwrap();
    let id = session.spawn_at(point, through);

    let mut arrived_at = None;
    for _ in 0..1200 {
        let report = session.advance(0.05);
        if report.removed.contains(&(id, VehicleStatus::Arrived)) {
            arrived_at = Some(report.frame);
            break;
        }
        let vehicle = session.vehicle(id).unwrap();
        assert!(!vehicle.last_output().is_braking());
    }

    let frame = arrived_at.expect("vehicle should arrive before its lifetime runs out");
    assert_eq!(recorder.flushed(), vec![id]);
    assert_eq!(recorder.lines(id).len() as u64, frame);
}

#[test]
fn stalled_vehicle_expires_without_being_flushed() {
    let mut config = SessionConfig::default();
    config.vehicle.max_lifetime = 1.0;
    let recorder = MemoryRecorder::new(WriteMode::Bulk);
    let mut session = Session::new(&config, Box::new(recorder.clone())).unwrap();
    let id = session.spawn_vehicle(
        northbound(vec![Vec3::new(0.0, 0.0, 100.0)]),
        ScriptedBody::boxed(Vec3::ZERO, Vec3::ZERO),
    );

    for _ in 0..3 {
        assert!(session.advance(0.25).removed.is_empty());
    }
    let report = session.advance(0.25);
    assert_eq!(report.removed, vec![(id, VehicleStatus::Expired)]);
    assert!(recorder.flushed().is_empty());
    assert!(recorder.lines(id).is_empty());
}

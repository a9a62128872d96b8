//! Intersection simulation: signals, vehicles, proximity and spawning.
//!
//! The simulation runs on a fixed timestep (default 20 Hz) decoupled from the
//! frame rate. Every `SimulationTick` spawns vehicles and advances the
//! `Session` resource by exactly one tick.

use bevy::app::AppExit;
use bevy::prelude::*;

use crate::error::{ensure_non_negative, ensure_positive, ConfigError};

pub mod collision;
pub mod controller;
pub mod kinematics;
pub mod navigation;
pub mod scene;
pub mod session;
pub mod signal;
pub mod spawner;
pub mod trajectory;
pub mod vehicle;

use scene::IntersectionScene;
use session::Session;
use spawner::{SpawnConfig, Spawner};

/// Drives a `Session` from Bevy's update loop.
///
/// Insert the `Session` and `IntersectionScene` resources before running the
/// app; the plugin provides the tick, spawning and stop conditions.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SimulationConfig>()
            .init_resource::<SimulationStats>()
            .init_resource::<SpawnConfig>()
            .add_event::<SimulationTick>()
            .add_systems(Startup, validate_configuration)
            .add_systems(
                Update,
                (
                    simulation_tick_system,
                    spawn_vehicles,
                    advance_session,
                    stop_after_run_duration,
                )
                    .chain(),
            );
    }
}

/// Configuration for the simulation.
#[derive(Resource, Clone, Debug)]
pub struct SimulationConfig {
    /// Ticks per second for simulation updates.
    pub tick_rate: f32,
    /// Simulation speed multiplier.
    pub speed: f32,
    /// Whether simulation is paused.
    pub paused: bool,
    /// Simulated seconds after which the app exits. `None` runs forever.
    pub run_duration: Option<f32>,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("tick_rate", self.tick_rate)?;
        ensure_non_negative("speed", self.speed)?;
        if let Some(duration) = self.run_duration {
            ensure_non_negative("run_duration", duration)?;
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20.0,
            speed: 1.0,
            paused: false,
            run_duration: None,
        }
    }
}

/// Event sent each simulation tick (at tick_rate Hz).
#[derive(Event, Clone, Copy, Debug)]
pub struct SimulationTick {
    /// The tick number since simulation start.
    pub tick: u64,
    /// Delta time for this tick (1.0 / tick_rate).
    pub delta: f32,
}

/// Statistics about the simulation.
#[derive(Resource, Default, Debug)]
pub struct SimulationStats {
    /// Ticks emitted so far; also the number of the latest tick.
    pub total_ticks: u64,
    /// Scaled frame time not yet consumed by a whole tick.
    pub accumulator: f32,
    pub spawned: u64,
    pub arrived: u64,
    pub expired: u64,
}

/// Reject invalid plugin configuration before the first tick.
fn validate_configuration(
    config: Res<SimulationConfig>,
    spawn: Res<SpawnConfig>,
    mut exit: EventWriter<AppExit>,
) {
    if let Err(err) = config.validate().and_then(|_| spawn.validate()) {
        error!("Invalid simulation configuration: {}", err);
        exit.send(AppExit::error());
    }
}

/// Turns scaled frame time into whole `SimulationTick`s of `1 / tick_rate`.
fn simulation_tick_system(
    config: Res<SimulationConfig>,
    mut stats: ResMut<SimulationStats>,
    time: Res<Time>,
    mut tick_events: EventWriter<SimulationTick>,
) {
    if config.paused || !(config.tick_rate > 0.0) {
        return;
    }

    stats.accumulator += time.delta_secs() * config.speed;
    let tick_duration = 1.0 / config.tick_rate;

    // Process accumulated time, sending tick events
    while stats.accumulator >= tick_duration {
        stats.accumulator -= tick_duration;
        stats.total_ticks += 1;

        tick_events.send(SimulationTick {
            tick: stats.total_ticks,
            delta: tick_duration,
        });
    }
}

fn spawn_vehicles(
    mut ticks: EventReader<SimulationTick>,
    config: Res<SpawnConfig>,
    scene: Res<IntersectionScene>,
    mut session: ResMut<Session>,
    mut stats: ResMut<SimulationStats>,
    mut local_spawner: Local<Option<Spawner>>,
) {
    // Initialize spawner on first run
    let spawner = local_spawner.get_or_insert_with(|| Spawner::new(config.clone()));

    for _ in ticks.read() {
        for point in &scene.spawn_points {
            if session.vehicles().len() >= config.max_vehicles {
                break;
            }
            let occupied = session.vehicle_positions();
            if let Some(route) = spawner.try_spawn(point, &occupied) {
                session.spawn_at(point, route);
                stats.spawned += 1;
            }
        }
    }
}

fn advance_session(
    mut ticks: EventReader<SimulationTick>,
    mut session: ResMut<Session>,
    mut stats: ResMut<SimulationStats>,
) {
    for tick in ticks.read() {
        let report = session.advance(tick.delta);
        stats.arrived += report.arrived() as u64;
        stats.expired += report.expired() as u64;
    }
}

fn stop_after_run_duration(
    config: Res<SimulationConfig>,
    session: Res<Session>,
    stats: Res<SimulationStats>,
    mut exit: EventWriter<AppExit>,
) {
    let Some(limit) = config.run_duration else {
        return;
    };
    if session.elapsed() >= limit {
        info!(
            "Run finished after {:.1}s: {} spawned, {} arrived, {} expired, {} still active",
            session.elapsed(),
            stats.spawned,
            stats.arrived,
            stats.expired,
            session.vehicles().len()
        );
        exit.send(AppExit::Success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::recorder::MemoryRecorder;
    use session::SessionConfig;

    fn app(spawn: SpawnConfig, run_duration: Option<f32>) -> App {
        let scene = IntersectionScene::default();
        let session = Session::from_scene(
            &SessionConfig::default(),
            &scene,
            Box::new(MemoryRecorder::default()),
        )
        .unwrap();

        let mut app = App::new();
        app.init_resource::<Time>()
            .insert_resource(SimulationConfig {
                run_duration,
                ..default()
            })
            .insert_resource(spawn)
            .insert_resource(scene)
            .insert_resource(session)
            .add_plugins(SimulationPlugin);
        app
    }

    #[test]
    fn each_tick_event_advances_the_session_once() {
        let mut app = app(
            SpawnConfig {
                probability: 0.0,
                ..default()
            },
            None,
        );
        app.world_mut().send_event(SimulationTick { tick: 1, delta: 0.05 });
        app.world_mut().send_event(SimulationTick { tick: 2, delta: 0.05 });
        app.update();

        let session = app.world().resource::<Session>();
        assert_eq!(session.frame(), 2);
        assert!(session.vehicles().is_empty());
    }

    #[test]
    fn certain_spawn_fills_every_free_spawn_point() {
        let mut app = app(
            SpawnConfig {
                probability: 1.0,
                ..default()
            },
            None,
        );
        app.world_mut().send_event(SimulationTick { tick: 1, delta: 0.05 });
        app.update();

        assert_eq!(app.world().resource::<Session>().vehicles().len(), 4);
        assert_eq!(app.world().resource::<SimulationStats>().spawned, 4);
    }

    #[test]
    fn zero_tick_rate_exits_with_error() {
        let mut app = app(SpawnConfig::default(), None);
        app.insert_resource(SimulationConfig {
            tick_rate: 0.0,
            ..default()
        });
        app.update();
        assert_eq!(app.should_exit(), Some(AppExit::error()));
        assert_eq!(app.world().resource::<SimulationStats>().total_ticks, 0);
    }

    #[test]
    fn invalid_spawn_probability_exits_with_error() {
        let mut app = app(
            SpawnConfig {
                probability: 2.0,
                ..default()
            },
            None,
        );
        app.update();
        assert_eq!(app.should_exit(), Some(AppExit::error()));
    }

    #[test]
    fn valid_configuration_keeps_running() {
        let mut app = app(SpawnConfig::default(), None);
        app.update();
        assert!(app.should_exit().is_none());
    }

    #[test]
    fn run_duration_requests_exit() {
        let mut app = app(
            SpawnConfig {
                probability: 0.0,
                ..default()
            },
            Some(0.1),
        );
        app.world_mut().send_event(SimulationTick { tick: 1, delta: 0.05 });
        app.update();
        assert!(app.should_exit().is_none());

        app.world_mut().send_event(SimulationTick { tick: 2, delta: 0.05 });
        app.update();
        assert_eq!(app.should_exit(), Some(AppExit::Success));
    }
}

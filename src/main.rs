//! IntersectionSim - headless intersection run.
//!
//! Simulates the default four-way scene for two minutes of simulated time and
//! writes one state-history file per arrived vehicle under `output/Test`.

use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;

use intersim::simulation::scene::IntersectionScene;
use intersim::simulation::spawner::SpawnConfig;
use intersim::simulation::SimulationConfig;
use intersim::{FileRecorder, RecorderConfig, Session, SessionConfig, SimError, SimulationPlugin};

fn main() -> Result<(), SimError> {
    let session_config = SessionConfig::default();
    let spawn_config = SpawnConfig::default();
    spawn_config.validate()?;

    let recorder = FileRecorder::new(&RecorderConfig::default())?;
    let scene = IntersectionScene::default();
    let session = Session::from_scene(&session_config, &scene, Box::new(recorder))?;

    let config = SimulationConfig {
        run_duration: Some(120.0),
        // Run faster than wall clock; ticks stay fixed-size.
        speed: 8.0,
        ..default()
    };
    config.validate()?;

    App::new()
        .add_plugins(
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 60.0,
            ))),
        )
        .add_plugins(LogPlugin::default())
        .insert_resource(config)
        .insert_resource(spawn_config)
        .insert_resource(scene)
        .insert_resource(session)
        .add_plugins(SimulationPlugin)
        .run();

    Ok(())
}

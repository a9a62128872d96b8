//! Random vehicle spawning at the scene's spawn points.

use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ensure_non_negative, ensure_probability, ConfigError};
use crate::simulation::scene::SpawnPoint;
use crate::simulation::trajectory::Trajectory;

/// Configuration for vehicle spawning.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct SpawnConfig {
    /// Chance per spawn point per tick that a vehicle is spawned.
    pub probability: f32,
    /// A spawn point is blocked while any vehicle is closer than this.
    pub minimum_spawn_distance: f32,
    /// Random seed for deterministic spawning.
    pub seed: u64,
    /// Upper bound on simultaneously active vehicles.
    pub max_vehicles: usize,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            probability: 0.01,
            minimum_spawn_distance: 12.0,
            seed: 4242,
            max_vehicles: 32,
        }
    }
}

impl SpawnConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_probability("spawn_probability", self.probability)?;
        ensure_non_negative("minimum_spawn_distance", self.minimum_spawn_distance)
    }
}

/// Seeded spawner. The same seed and the same sequence of calls yield the
/// same spawns.
#[derive(Clone, Debug)]
pub struct Spawner {
    config: SpawnConfig,
    rng: StdRng,
}

impl Spawner {
    pub fn new(config: SpawnConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// Roll for a spawn at `point`. Returns the chosen route when the roll
    /// succeeds and no vehicle in `occupied` is too close.
    pub fn try_spawn(&mut self, point: &SpawnPoint, occupied: &[Vec3]) -> Option<Trajectory> {
        if self.rng.gen::<f32>() >= self.config.probability {
            return None;
        }

        let min_distance = self.config.minimum_spawn_distance;
        if occupied
            .iter()
            .any(|position| position.distance(point.position) < min_distance)
        {
            return None;
        }

        if point.routes.is_empty() {
            warn!("Spawn point at {:?} has no routes", point.position);
            return None;
        }

        let route = &point.routes[self.rng.gen_range(0..point.routes.len())];
        Some(route.clone())
    }
}

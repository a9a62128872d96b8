use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use intersim::simulation::scene::IntersectionScene;
use intersim::simulation::spawner::{SpawnConfig, Spawner};
use intersim::{MemoryRecorder, Session, SessionConfig};
use std::time::Duration;

/// Session with the default scene, pre-populated by running the spawner with
/// a high probability for `warmup` ticks.
fn populated_session(warmup: usize) -> Session {
    let scene = IntersectionScene::default();
    let mut session = Session::from_scene(
        &SessionConfig::default(),
        &scene,
        Box::new(MemoryRecorder::default()),
    )
    .expect("default configuration is valid");
    let mut spawner = Spawner::new(SpawnConfig {
        probability: 0.2,
        seed: 0xBEEF,
        ..SpawnConfig::default()
    });

    for _ in 0..warmup {
        for point in &scene.spawn_points {
            let occupied = session.vehicle_positions();
            if let Some(route) = spawner.try_spawn(point, &occupied) {
                session.spawn_at(point, route);
            }
        }
        session.advance(0.05);
    }
    session
}

fn bench_session_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_tick");
    group.sample_size(30);
    group.measurement_time(Duration::from_secs(5));

    for &warmup in &[200_usize, 600] {
        group.bench_function(format!("ticks64_after_warmup{}", warmup), |b| {
            b.iter_batched(
                || populated_session(warmup),
                |mut session| {
                    for _ in 0..64 {
                        session.advance(0.05);
                    }
                    session
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_session_ticks);
criterion_main!(benches);

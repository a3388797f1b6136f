//! Collision core benchmarks (criterion - wall-clock time).
//!
//! Run all:    cargo bench --manifest-path benchmarks/Cargo.toml --bench physics
//! Filter:     cargo bench --manifest-path benchmarks/Cargo.toml --bench physics -- broadphase

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use glam::{Affine2, Vec2};
use rein2d::physics::config::BroadphaseConfig;
use rein2d::physics::mirror;
use rein2d::physics::narrowphase::collide;
use rein2d::physics::processor::CollisionProcessor;
use rein2d::physics::rigid_body;
use rein2d::{BroadphaseKind, Collider, PhysicsConfig, SolverKind};
use rein2d_bench::*;

fn placed(mut collider: Collider, position: Vec2, angle: f32) -> Collider {
    collider.update(&Affine2::from_angle_translation(angle, position));
    collider
}

// ---------------------------------------------------------------------------
// Broadphase
// ---------------------------------------------------------------------------

fn bench_broadphase(c: &mut Criterion) {
    for kind in [BroadphaseKind::AabbTree, BroadphaseKind::SparseHashGrid] {
        let config = PhysicsConfig {
            broadphase: BroadphaseConfig {
                kind,
                ..BroadphaseConfig::default()
            },
            ..PhysicsConfig::default()
        };

        {
            let mut group = c.benchmark_group(format!("broadphase/{kind:?}/mixed"));
            for &n in &[100, 500, 1000, 2000] {
                let world = setup_mixed_world(n);
                let mut processor = CollisionProcessor::new(&config);
                processor.sync(&world);
                group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                    b.iter(|| {
                        processor.update(&world, 1.0 / 60.0);
                        processor.broadphase(&world, 1.0 / 60.0)
                    });
                });
            }
            group.finish();
        }

        {
            let mut group = c.benchmark_group(format!("broadphase/{kind:?}/sparse"));
            for &n in &[100, 500, 1000, 2000] {
                let world = setup_sparse_world(n);
                let mut processor = CollisionProcessor::new(&config);
                processor.sync(&world);
                group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                    b.iter(|| {
                        processor.update(&world, 1.0 / 60.0);
                        processor.broadphase(&world, 1.0 / 60.0)
                    });
                });
            }
            group.finish();
        }
    }
}

// ---------------------------------------------------------------------------
// Narrowphase
// ---------------------------------------------------------------------------

fn bench_narrowphase(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("narrowphase/circle_circle");
        let a = placed(Collider::circle(1.0), Vec2::ZERO, 0.0);
        let hit = placed(Collider::circle(1.0), Vec2::new(1.5, 0.0), 0.0);
        let miss = placed(Collider::circle(1.0), Vec2::new(5.0, 0.0), 0.0);
        group.bench_function("intersecting", |b| b.iter(|| collide(&a, &hit)));
        group.bench_function("separated", |b| b.iter(|| collide(&a, &miss)));
        group.finish();
    }

    {
        let mut group = c.benchmark_group("narrowphase/box_box");
        let a = placed(Collider::rectangle(2.0, 2.0), Vec2::ZERO, 0.0);
        let hit = placed(Collider::rectangle(2.0, 2.0), Vec2::new(1.5, 0.0), 0.0);
        let miss = placed(Collider::rectangle(2.0, 2.0), Vec2::new(5.0, 0.0), 0.0);
        let rotated = placed(Collider::rectangle(2.0, 2.0), Vec2::new(1.5, 0.2), 0.785);
        group.bench_function("intersecting", |b| b.iter(|| collide(&a, &hit)));
        group.bench_function("separated", |b| b.iter(|| collide(&a, &miss)));
        group.bench_function("rotated", |b| b.iter(|| collide(&a, &rotated)));
        group.finish();
    }

    {
        let mut group = c.benchmark_group("narrowphase/mixed");
        let bbox = placed(Collider::rectangle(2.0, 2.0), Vec2::ZERO, 0.0);
        let circle = placed(Collider::circle(1.0), Vec2::new(1.5, 0.0), 0.0);
        let edge = placed(Collider::edge(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)), Vec2::new(0.0, -0.9), 0.0);
        let capsule = placed(Collider::capsule(1.0, 3.0), Vec2::new(0.0, 1.5), 0.0);
        group.bench_function("box_circle", |b| b.iter(|| collide(&bbox, &circle)));
        group.bench_function("edge_box", |b| b.iter(|| collide(&edge, &bbox)));
        group.bench_function("capsule_box", |b| b.iter(|| collide(&capsule, &bbox)));
        group.finish();
    }

    {
        let mut group = c.benchmark_group("narrowphase/batch");
        for &n in &[100, 500, 1000] {
            let pairs: Vec<_> = (0..n)
                .map(|i| {
                    let x = (i as f32) * 3.0;
                    (
                        placed(Collider::circle(1.0), Vec2::new(x, 0.0), 0.0),
                        placed(Collider::rectangle(2.0, 2.0), Vec2::new(x + 1.5, 0.0), 0.3),
                    )
                })
                .collect();

            group.bench_with_input(BenchmarkId::from_parameter(n), &pairs, |b, pairs| {
                b.iter(|| {
                    for (a, b) in pairs {
                        collide(a, b);
                    }
                });
            });
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

fn bench_pipeline(c: &mut Criterion) {
    for solver in [SolverKind::Arcade, SolverKind::Realistic] {
        let mut group = c.benchmark_group(format!("pipeline/{solver:?}/step"));
        group.sample_size(30);
        for &n in &[50, 100, 500, 1000] {
            group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
                b.iter_batched(
                    || setup_scene(n, solver, BroadphaseKind::AabbTree).expect("scene setup"),
                    |(mut world, mut physics)| {
                        physics.fixed_step(&mut world, 1.0 / 60.0);
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("pipeline/pyramid_60steps");
        group.sample_size(10);
        for &rows in &[5, 10, 20] {
            group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, &rows| {
                b.iter_batched(
                    || setup_pyramid(rows, SolverKind::Realistic).expect("pyramid setup"),
                    |(mut world, mut physics)| {
                        for _ in 0..60 {
                            physics.fixed_step(&mut world, 1.0 / 60.0);
                        }
                    },
                    criterion::BatchSize::LargeInput,
                );
            });
        }
        group.finish();
    }

    {
        let mut group = c.benchmark_group("pipeline/stages");
        let n = 500;
        let gravity = Vec2::new(0.0, -9.81);

        group.bench_function("integrate_500", |b| {
            b.iter_batched(
                || setup_mixed_world(n),
                |mut w| rigid_body::integrate(&mut w, gravity, 1.0 / 60.0),
                criterion::BatchSize::LargeInput,
            );
        });

        group.bench_function("sync_transforms_500", |b| {
            b.iter_batched(
                || setup_mixed_world(n),
                |mut w| rigid_body::sync_transforms(&mut w),
                criterion::BatchSize::LargeInput,
            );
        });

        group.bench_function("mirror_roundtrip_500", |b| {
            b.iter_batched(
                || setup_mixed_world(n),
                |mut w| {
                    let mut records = mirror::snapshot(&w);
                    mirror::integrate_records(&mut records, gravity, 1.0 / 60.0);
                    mirror::apply(&mut w, &records)
                },
                criterion::BatchSize::LargeInput,
            );
        });
        group.finish();
    }
}

criterion_group!(benches, bench_broadphase, bench_narrowphase, bench_pipeline);
criterion_main!(benches);

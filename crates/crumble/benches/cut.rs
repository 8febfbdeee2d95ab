//! Benchmark for terrain cutting
//!
//! Measures a full cut (subtract, regroup, collider rebuild) against a
//! static slab and against a freshly built world, plus crack carving.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use crumble_core::terrain::{CrackConfig, CrackPattern};
use crumble_core::World;
use crumble_geometry::Contour;
use glam::Vec2;

/// A wide anchored slab with a row of floating blocks above it
fn build_world(blocks: usize) -> World {
    let mut terrain = vec![Contour::rect(Vec2::new(-200.0, -20.0), Vec2::new(200.0, 0.0))];
    for i in 0..blocks {
        let x = -190.0 + i as f32 * 12.0;
        terrain.push(Contour::rect(Vec2::new(x, 10.0), Vec2::new(x + 8.0, 18.0)));
    }
    let mut world = World::default();
    world.build_from_contours(
        terrain,
        vec![Contour::rect(Vec2::new(-210.0, -30.0), Vec2::new(210.0, -10.0))],
        Vec::new(),
    );
    world
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("build_32_blocks", |b| b.iter(|| black_box(build_world(32))));
}

fn bench_segment_cut(c: &mut Criterion) {
    c.bench_function("cut_segment_static", |b| {
        b.iter_batched(
            || build_world(8),
            |mut world| {
                let stats = world
                    .cut_segment(Vec2::new(0.0, -25.0), Vec2::new(0.0, 5.0), 2.0, 0.0)
                    .expect("valid cut");
                black_box(stats)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_crack(c: &mut Criterion) {
    let pattern = CrackPattern::radial(Vec2::new(0.0, -10.0), &CrackConfig::default(), 7);
    c.bench_function("cut_crack_static", |b| {
        b.iter_batched(
            || build_world(8),
            |mut world| black_box(world.cut_crack(&pattern, 0.0).expect("valid crack")),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_build, bench_segment_cut, bench_crack);
criterion_main!(benches);

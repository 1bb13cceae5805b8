//! Path search benchmarks.
//!
//! Every algorithm runs the same query pairs through a scattered scene, once
//! on a single octree and once routed across a 2×2×2 partition grid.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::{UVec3, Vec3};
use nav3d::registry::build_adjacency;
use nav3d::search::find_path;
use nav3d::{
  Aabb, Algorithm, GenerationSettings, NavRegistry, Nav3dSettings, OccluderSet, OccluderShape, OctreeVolume,
  PathCoordinator, PathRequest, SearchParams, VolumeBuilder,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn world() -> Aabb {
  Aabb::new(Vec3::splat(-2000.0), Vec3::splat(2000.0))
}

fn scene() -> OccluderSet {
  let mut rng = StdRng::seed_from_u64(3);
  let mut scene = OccluderSet::new();
  for _ in 0..48 {
    let center = Vec3::new(
      rng.random_range(-1500.0..1500.0),
      rng.random_range(-1500.0..1500.0),
      rng.random_range(-1500.0..1500.0),
    );
    scene.insert(OccluderShape::Box {
      center,
      half_extents: Vec3::splat(rng.random_range(50.0..300.0)),
    });
  }
  // Wall across the middle with a gap
  scene.insert(OccluderShape::Box {
    center: Vec3::new(0.0, -400.0, 0.0),
    half_extents: Vec3::new(60.0, 1600.0, 2000.0),
  });
  scene
}

/// Random navigable query pairs.
fn queries(volume: &OctreeVolume, count: usize) -> Vec<(Vec3, Vec3)> {
  let mut rng = StdRng::seed_from_u64(17);
  (0..count)
    .filter_map(|_| Some((volume.random_point(&mut rng)?, volume.random_point(&mut rng)?)))
    .collect()
}

fn bench_single_volume(c: &mut Criterion) {
  let mut group = c.benchmark_group("search/single_volume");
  let scene = scene();
  let Ok(output) = VolumeBuilder::new(&scene, GenerationSettings::default()).build(world()) else {
    return;
  };
  let pairs = queries(&output.volume, 16);
  let params = SearchParams::default();

  for algorithm in Algorithm::ALL {
    group.bench_function(algorithm.name(), |b| {
      b.iter(|| {
        for &(start, end) in &pairs {
          black_box(find_path(&output.volume, start, end, algorithm, &params));
        }
      })
    });
  }
  group.finish();
}

fn bench_partitioned(c: &mut Criterion) {
  let mut group = c.benchmark_group("search/partitioned");
  group.sample_size(20);
  let scene = scene();
  let mut registry = NavRegistry::new();
  let volume = registry.add_volume(world());
  for id in registry.split_volume(volume, UVec3::splat(2)) {
    let Some(bounds) = registry.partition(id).map(|p| p.bounds) else {
      continue;
    };
    if let Ok(output) = VolumeBuilder::new(&scene, GenerationSettings::default()).build(bounds) {
      registry.set_octree(id, output.volume);
    }
  }
  build_adjacency(&mut registry, 0.0);

  let pairs = [
    (Vec3::new(-1800.0, 1800.0, -1800.0), Vec3::new(1800.0, 1800.0, 1800.0)),
    (Vec3::new(-1500.0, -1500.0, 0.0), Vec3::new(1500.0, -1500.0, 0.0)),
    (Vec3::new(-900.0, 100.0, 900.0), Vec3::new(900.0, -100.0, -900.0)),
  ];
  for algorithm in Algorithm::ALL {
    let settings = Nav3dSettings {
      default_algorithm: algorithm,
      ..Nav3dSettings::default()
    };
    let coordinator = PathCoordinator::new(&registry, settings);
    group.bench_function(algorithm.name(), |b| {
      b.iter(|| {
        for &(start, end) in &pairs {
          black_box(coordinator.find_path(&PathRequest::new(start, end)));
        }
      })
    });
  }
  group.finish();
}

criterion_group!(search, bench_single_volume, bench_partitioned);
criterion_main!(search);

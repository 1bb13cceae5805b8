use std::sync::Arc;
use std::time::Duration;

use glam::{UVec3, Vec3};

use super::*;
use crate::test_support::{obstacle_scene, world_bounds};

/// Tick until `Finished` arrives, returning every event seen.
fn drive(driver: &mut GenerationDriver, registry: &mut NavRegistry) -> Vec<GenerationEvent> {
  let events = driver.events();
  let mut seen = Vec::new();
  for _ in 0..10_000 {
    driver.tick(registry);
    while let Ok(event) = events.try_recv() {
      let done = matches!(event, GenerationEvent::Finished { .. });
      seen.push(event);
      if done {
        return seen;
      }
    }
    std::thread::sleep(Duration::from_millis(1));
  }
  panic!("generation did not finish: {seen:?}");
}

fn driver() -> GenerationDriver {
  GenerationDriver::new(
    Arc::new(obstacle_scene()),
    GenerationSettings::default(),
    &Nav3dSettings::default(),
  )
}

fn split_registry(divisions: UVec3) -> (NavRegistry, Vec<PartitionId>) {
  let mut registry = NavRegistry::new();
  let volume = registry.add_volume(world_bounds());
  let ids = registry.split_volume(volume, divisions);
  (registry, ids)
}

#[test]
fn test_builds_every_partition_and_links_them() {
  let (mut registry, ids) = split_registry(UVec3::new(2, 1, 1));
  let mut driver = driver();
  assert_eq!(driver.enqueue_unbuilt(&registry), 2);
  assert!(!driver.is_idle());

  let events = drive(&mut driver, &mut registry);
  let built = events
    .iter()
    .filter(|e| matches!(e, GenerationEvent::PartitionBuilt { .. }))
    .count();
  assert_eq!(built, 2);
  assert_eq!(
    events.last(),
    Some(&GenerationEvent::Finished {
      built: 2,
      failed: 0,
      cancelled: false
    })
  );
  assert!(driver.is_idle());
  for &id in &ids {
    assert!(registry.octree(id).is_some_and(|o| o.is_valid() && !o.is_empty()));
  }
  assert!(registry.partition(ids[0]).unwrap().adjacency_to(ids[1]).is_some());
  assert_eq!(driver.enqueue_unbuilt(&registry), 0);
}

#[test]
fn test_failed_build_registers_invalid_octree() {
  let mut registry = NavRegistry::new();
  let volume = registry.add_volume(world_bounds());
  let tiny = registry
    .add_partition(volume, Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(50.0)))
    .unwrap();
  let mut driver = driver();
  driver.enqueue_unbuilt(&registry);

  let events = drive(&mut driver, &mut registry);
  assert!(matches!(
    events[0],
    GenerationEvent::PartitionFailed {
      partition,
      error: BuildError::TooFewLayers { .. }
    } if partition == tiny
  ));
  assert_eq!(
    events.last(),
    Some(&GenerationEvent::Finished {
      built: 0,
      failed: 1,
      cancelled: false
    })
  );
  assert!(registry.octree(tiny).is_some_and(|o| !o.is_valid()));
}

#[test]
fn test_cancel_then_restart() {
  let (mut registry, ids) = split_registry(UVec3::new(2, 2, 1));
  let mut driver = driver();
  driver.enqueue_unbuilt(&registry);
  driver.cancel();

  let events = drive(&mut driver, &mut registry);
  assert_eq!(
    events,
    vec![GenerationEvent::Finished {
      built: 0,
      failed: 0,
      cancelled: true
    }]
  );
  assert!(ids.iter().all(|&id| registry.octree(id).is_none()));

  // A fresh run starts with a cleared token
  assert_eq!(driver.enqueue_unbuilt(&registry), 4);
  let events = drive(&mut driver, &mut registry);
  assert_eq!(
    events.last(),
    Some(&GenerationEvent::Finished {
      built: 4,
      failed: 0,
      cancelled: false
    })
  );
  assert!(ids.iter().all(|&id| registry.octree(id).is_some()));
}

#[test]
fn test_job_limit() {
  let settings = GenerationSettings {
    max_simultaneous_jobs: 1,
    ..GenerationSettings::default()
  };
  let driver = GenerationDriver::new(Arc::new(obstacle_scene()), settings, &Nav3dSettings::default());
  assert_eq!(driver.max_tasks(), 1);

  // Zero still allows one
  let zero = GenerationSettings {
    max_simultaneous_jobs: 0,
    ..GenerationSettings::default()
  };
  let driver = GenerationDriver::new(Arc::new(obstacle_scene()), zero, &Nav3dSettings::default());
  assert_eq!(driver.max_tasks(), 1);
}

#[test]
fn test_volume_limit_holds_back_other_volumes() {
  let mut registry = NavRegistry::new();
  let first = registry.add_volume(world_bounds());
  let offset = Vec3::new(2000.0, 0.0, 0.0);
  let second = registry.add_volume(Aabb {
    min: world_bounds().min + offset,
    max: world_bounds().max + offset,
  });
  registry.split_volume(first, UVec3::new(2, 1, 1));
  registry.split_volume(second, UVec3::new(2, 1, 1));

  let nav = Nav3dSettings {
    max_parallel_volume_builds: 1,
    ..Nav3dSettings::default()
  };
  let mut driver = GenerationDriver::new(Arc::new(obstacle_scene()), GenerationSettings::default(), &nav);
  assert_eq!(driver.enqueue_unbuilt(&registry), 4);
  driver.submit(&registry);
  assert!(!driver.running.is_empty());
  assert!(driver.running.iter().all(|build| build.volume == Some(first)));
  assert_eq!(driver.queue.len(), 4 - driver.running.len());

  let events = drive(&mut driver, &mut registry);
  assert_eq!(
    events.last(),
    Some(&GenerationEvent::Finished {
      built: 4,
      failed: 0,
      cancelled: false
    })
  );
}

#[test]
fn test_idle_tick_does_nothing() {
  let (mut registry, _) = split_registry(UVec3::ONE);
  let mut driver = driver();
  assert!(driver.is_idle());
  assert_eq!(driver.tick(&mut registry), 0);
  assert!(driver.events().try_recv().is_err());
}

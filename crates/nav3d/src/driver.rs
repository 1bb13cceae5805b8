//! Background generation of every partition octree.
//!
//! ```text
//! enqueue ──▶ pending queue ──tick──▶ TaskExecutor (rayon) ──tick──▶ registry
//!                                                                     │
//!                         GenerationEvent channel ◀───────────────────┘
//! ```
//!
//! `tick` is meant to be called from the owning thread. It submits builds up
//! to the job limit, then integrates finished builds until the time budget
//! runs out. Once the queue drains, partition adjacency is rebuilt and
//! [`GenerationEvent::Finished`] is sent.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, Sender};
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::bounds::Aabb;
use crate::builder::{BuildOutput, BuildStats, VolumeBuilder};
use crate::cancel::CancellationToken;
use crate::error::BuildError;
use crate::occlusion::OcclusionQuery;
use crate::octree::OctreeVolume;
use crate::registry::{build_adjacency, NavRegistry, PartitionId, VolumeId};
use crate::settings::{GenerationSettings, Nav3dSettings};
use crate::threading::{TaskExecutor, TaskId};

/// Progress notifications sent by [`GenerationDriver::tick`].
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationEvent {
  PartitionBuilt { partition: PartitionId, stats: BuildStats },
  /// The partition was registered with an invalid octree.
  PartitionFailed { partition: PartitionId, error: BuildError },
  /// Every queued build has been integrated (or dropped after cancel).
  Finished { built: usize, failed: usize, cancelled: bool },
}

struct RunningBuild {
  task: TaskId,
  partition: PartitionId,
  volume: Option<VolumeId>,
  bounds: Aabb,
}

type BuildResult = Result<BuildOutput, BuildError>;

/// Drives partition builds on the rayon pool.
pub struct GenerationDriver {
  query: Arc<dyn OcclusionQuery>,
  settings: GenerationSettings,
  adjacency_threshold: f32,
  budget: Duration,
  max_tasks: usize,
  /// Distinct volumes allowed to have builds in flight.
  max_volumes: usize,
  executor: TaskExecutor,
  token: CancellationToken,
  queue: VecDeque<(PartitionId, Aabb)>,
  running: Vec<RunningBuild>,
  sender: Sender<GenerationEvent>,
  receiver: Receiver<GenerationEvent>,
  built: usize,
  failed: usize,
  active: bool,
}

impl GenerationDriver {
  pub fn new(query: Arc<dyn OcclusionQuery>, settings: GenerationSettings, nav: &Nav3dSettings) -> Self {
    let executor = TaskExecutor::new();
    let max_tasks = (executor.num_threads() * 2).max(1).min(settings.max_simultaneous_jobs.max(1));
    let (sender, receiver) = channel::unbounded();
    Self {
      query,
      settings,
      adjacency_threshold: nav.adjacency_threshold,
      budget: Duration::from_secs_f32(nav.max_chunk_time_seconds.max(0.0)),
      max_tasks,
      max_volumes: nav.max_parallel_volume_builds.max(1),
      executor,
      token: CancellationToken::new(),
      queue: VecDeque::new(),
      running: Vec::new(),
      sender,
      receiver,
      built: 0,
      failed: 0,
      active: false,
    }
  }

  /// Concurrent builds allowed.
  pub fn max_tasks(&self) -> usize {
    self.max_tasks
  }

  /// Channel receiving [`GenerationEvent`]s.
  pub fn events(&self) -> Receiver<GenerationEvent> {
    self.receiver.clone()
  }

  /// Queue one partition for building.
  pub fn enqueue(&mut self, partition: PartitionId, bounds: Aabb) {
    if self.token.is_cancelled() && !self.active {
      // New run after a cancelled one
      self.token.reset();
    }
    self.queue.push_back((partition, bounds));
    self.active = true;
  }

  /// Queue every partition of `registry` that has no octree yet.
  pub fn enqueue_unbuilt(&mut self, registry: &NavRegistry) -> usize {
    let pending: Vec<(PartitionId, Aabb)> = registry
      .partitions()
      .filter(|p| p.octree.is_none())
      .map(|p| (p.id, p.bounds))
      .collect();
    let count = pending.len();
    for (id, bounds) in pending {
      self.enqueue(id, bounds);
    }
    count
  }

  /// Stop submitting builds and ask running ones to stop.
  pub fn cancel(&mut self) {
    info!(queued = self.queue.len(), running = self.running.len(), "cancelling generation");
    self.token.cancel();
    self.queue.clear();
  }

  /// Nothing queued and nothing running.
  pub fn is_idle(&self) -> bool {
    self.queue.is_empty() && self.running.is_empty()
  }

  /// Submit and integrate builds. Returns the number of builds integrated.
  pub fn tick(&mut self, registry: &mut NavRegistry) -> usize {
    let start = Instant::now();
    self.submit(registry);

    let mut integrated = 0;
    let mut index = 0;
    while index < self.running.len() {
      if integrated > 0 && start.elapsed() > self.budget {
        break;
      }
      let Some(result) = self.executor.poll::<BuildResult>(self.running[index].task) else {
        index += 1;
        continue;
      };
      let build = self.running.swap_remove(index);
      self.integrate(registry, build, result);
      integrated += 1;
    }

    if self.active && self.is_idle() {
      self.finish(registry);
    }
    integrated
  }

  fn submit(&mut self, registry: &NavRegistry) {
    if self.token.is_cancelled() {
      self.queue.clear();
      return;
    }
    while self.running.len() < self.max_tasks {
      let Some(position) = self
        .queue
        .iter()
        .position(|(partition, _)| self.has_volume_slot(registry.partition(*partition).map(|p| p.volume)))
      else {
        break;
      };
      let Some((partition, bounds)) = self.queue.remove(position) else {
        break;
      };
      let volume = registry.partition(partition).map(|p| p.volume);
      let query = Arc::clone(&self.query);
      let settings = self.settings;
      let token = self.token.clone();
      let task = self.executor.spawn(move || -> BuildResult {
        VolumeBuilder::new(query.as_ref(), settings)
          .with_cancellation(token)
          .build(bounds)
      });
      debug!(?partition, "submitted partition build");
      self.running.push(RunningBuild {
        task,
        partition,
        volume,
        bounds,
      });
    }
  }

  /// Whether a build for `volume` may start without exceeding the volume limit.
  fn has_volume_slot(&self, volume: Option<VolumeId>) -> bool {
    let Some(volume) = volume else {
      return true;
    };
    let mut active: Vec<VolumeId> = self.running.iter().filter_map(|build| build.volume).collect();
    active.sort_unstable();
    active.dedup();
    active.contains(&volume) || active.len() < self.max_volumes
  }

  fn integrate(&mut self, registry: &mut NavRegistry, build: RunningBuild, result: BuildResult) {
    match result {
      Ok(output) => {
        registry.set_octree(build.partition, output.volume);
        self.built += 1;
        self
          .sender
          .send(GenerationEvent::PartitionBuilt {
            partition: build.partition,
            stats: output.stats,
          })
          .ok();
      }
      Err(BuildError::Cancelled) => {
        debug!(partition = ?build.partition, "discarding cancelled build");
      }
      Err(error) => {
        warn!(partition = ?build.partition, %error, "partition build failed");
        registry.set_octree(build.partition, OctreeVolume::invalid(build.bounds));
        self.failed += 1;
        self
          .sender
          .send(GenerationEvent::PartitionFailed {
            partition: build.partition,
            error,
          })
          .ok();
      }
    }
  }

  fn finish(&mut self, registry: &mut NavRegistry) {
    let cancelled = self.token.is_cancelled();
    if !cancelled {
      build_adjacency(registry, self.adjacency_threshold);
    }
    info!(built = self.built, failed = self.failed, cancelled, "generation finished");
    self
      .sender
      .send(GenerationEvent::Finished {
        built: self.built,
        failed: self.failed,
        cancelled,
      })
      .ok();
    self.built = 0;
    self.failed = 0;
    self.active = false;
  }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod driver_test;

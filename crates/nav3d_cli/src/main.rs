//! Scene-driven navigation tool.
//!
//! Loads a TOML scene, generates every partition octree on the background
//! driver, then runs the scene's raycast and path queries:
//! - `[[raycasts]]`: line of traversal across partitions plus the first hit
//! - `[[paths]]`: routed path queries through the coordinator
//! - `--random-paths N`: extra queries between random navigable points

mod scene;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use nav3d::{
	Algorithm, GenerationDriver, GenerationEvent, MultiPartitionRaycaster, NavRegistry, PathCoordinator,
	PathRequest, PathResult, Raycaster,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use scene::Scene;

/// Search algorithm names accepted on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum AlgorithmArg {
	BestFirst,
	AnyAngle,
	LazyAnyAngle,
}

impl From<AlgorithmArg> for Algorithm {
	fn from(arg: AlgorithmArg) -> Self {
		match arg {
			AlgorithmArg::BestFirst => Algorithm::BestFirst,
			AlgorithmArg::AnyAngle => Algorithm::AnyAngle,
			AlgorithmArg::LazyAnyAngle => Algorithm::LazyAnyAngle,
		}
	}
}

/// Build navigation volumes for a scene and run its queries.
#[derive(Parser, Debug)]
#[command(name = "nav3d")]
#[command(about = "Builds sparse voxel navigation octrees and runs path queries")]
struct Args {
	/// Path to the scene TOML file.
	#[arg(short, long)]
	scene: PathBuf,

	/// Seed for random path queries.
	#[arg(long, default_value_t = 0)]
	seed: u64,

	/// Algorithm for every path query, overriding the scene.
	#[arg(short, long, value_enum)]
	algorithm: Option<AlgorithmArg>,

	/// Extra path queries between random navigable points.
	#[arg(long, default_value_t = 0)]
	random_paths: usize,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args = Args::parse();
	tracing::debug!(?args, "parsed arguments");
	println!("Loading scene from: {}", args.scene.display());
	let scene = Scene::load(&args.scene)?;

	let mut registry = NavRegistry::new();
	for volume in &scene.volumes {
		let id = registry.add_volume(volume.bounds());
		registry.split_volume(id, volume.divisions());
	}
	println!(
		"Building {} partition(s) in {} volume(s), {} obstacle(s)",
		registry.partition_count(),
		scene.volumes.len(),
		scene.obstacles.len()
	);
	generate(&scene, &mut registry)?;

	let override_algorithm = args.algorithm.map(Algorithm::from);
	let coordinator = PathCoordinator::new(&registry, scene.settings);

	if !scene.raycasts.is_empty() {
		println!("\nRaycasts:");
	}
	let multi = MultiPartitionRaycaster::new(&registry);
	for (index, raycast) in scene.raycasts.iter().enumerate() {
		let clear = multi.has_line_of_traversal(raycast.from, raycast.to, raycast.radius);
		print!(
			"  #{index} {} -> {} (radius {}): {}",
			raycast.from,
			raycast.to,
			raycast.radius,
			if clear { "clear" } else { "blocked" }
		);
		let octree = registry.partition_at(raycast.from).and_then(|id| registry.octree(id));
		if let Some(octree) = octree.filter(|o| o.is_valid()) {
			let trace = Raycaster::new(octree).trace_counting(raycast.from, raycast.to);
			if let Some(hit) = trace.hit {
				print!(
					", first hit at {:.1} ({}, normal {}), {} occluded voxel(s)",
					hit.distance, hit.impact_point, hit.impact_normal, trace.occluded_voxels
				);
			}
		}
		println!();
	}

	if !scene.paths.is_empty() {
		println!("\nPaths:");
	}
	for (index, query) in scene.paths.iter().enumerate() {
		let mut request = PathRequest::new(query.start, query.end).with_agent_radius(query.agent_radius);
		request.algorithm = override_algorithm.or(query.algorithm);
		print_path(index, &request, &coordinator.find_path(&request));
	}

	if args.random_paths > 0 {
		println!("\nRandom paths (seed {}):", args.seed);
		let mut rng = StdRng::seed_from_u64(args.seed);
		let octrees: Vec<_> = registry
			.partitions()
			.filter_map(|p| p.octree.as_ref())
			.filter(|o| o.is_valid())
			.collect();
		if octrees.is_empty() {
			anyhow::bail!("No valid octree to sample random points from");
		}
		for index in 0..args.random_paths {
			let a = octrees[rng.random_range(0..octrees.len())];
			let b = octrees[rng.random_range(0..octrees.len())];
			let (Some(start), Some(end)) = (a.random_point(&mut rng), b.random_point(&mut rng)) else {
				continue;
			};
			let mut request = PathRequest::new(start, end);
			request.algorithm = override_algorithm;
			print_path(index, &request, &coordinator.find_path(&request));
		}
	}

	Ok(())
}

/// Run the generation driver until every partition is integrated.
fn generate(scene: &Scene, registry: &mut NavRegistry) -> Result<()> {
	let mut driver = GenerationDriver::new(Arc::new(scene.occluders()), scene.generation, &scene.settings);
	let events = driver.events();
	driver.enqueue_unbuilt(registry);

	loop {
		driver.tick(registry);
		while let Ok(event) = events.try_recv() {
			match event {
				GenerationEvent::PartitionBuilt { partition, stats } => {
					let nodes = registry.octree(partition).map_or(0, |o| o.node_count());
					println!(
						"  ✓ partition {}: {} nodes, {} occluded voxels, {} leaves rasterized, {} µs",
						partition.0, nodes, stats.occluded_voxels, stats.leaves_rasterized, stats.elapsed_us
					);
				}
				GenerationEvent::PartitionFailed { partition, error } => {
					println!("  ✗ partition {}: {}", partition.0, error);
				}
				GenerationEvent::Finished { built, failed, cancelled } => {
					if cancelled {
						anyhow::bail!("Generation was cancelled");
					}
					println!("Generated {} partition(s), {} failed", built, failed);
					return Ok(());
				}
			}
		}
		std::thread::sleep(Duration::from_millis(1));
	}
}

fn print_path(index: usize, request: &PathRequest, result: &PathResult) {
	println!(
		"  #{index} {} -> {}: {:?}, {} waypoint(s), cost {:.1}",
		request.start,
		request.end,
		result.code,
		result.path.len(),
		result.path.total_cost()
	);
	for point in result.path.positions() {
		println!("      {point}");
	}
}

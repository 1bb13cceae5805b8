//! TOML scene description for the CLI.

use anyhow::{Context, Result};
use glam::{UVec3, Vec3};
use nav3d::{Aabb, Algorithm, GenerationSettings, Nav3dSettings, OccluderSet, OccluderShape};
use serde::Deserialize;
use std::path::Path;

/// Root of a scene file.
#[derive(Debug, Deserialize)]
pub struct Scene {
	#[serde(default)]
	pub settings: Nav3dSettings,
	#[serde(default)]
	pub generation: GenerationSettings,
	pub volumes: Vec<VolumeConfig>,
	#[serde(default)]
	pub obstacles: Vec<ObstacleConfig>,
	#[serde(default)]
	pub raycasts: Vec<RaycastConfig>,
	#[serde(default)]
	pub paths: Vec<PathConfig>,
}

/// Navigable region, split into a grid of partitions.
#[derive(Debug, Deserialize)]
pub struct VolumeConfig {
	pub min: Vec3,
	pub max: Vec3,
	/// Partitions per axis.
	#[serde(default = "default_divisions")]
	pub divisions: [u32; 3],
}

fn default_divisions() -> [u32; 3] {
	[1, 1, 1]
}

impl VolumeConfig {
	pub fn bounds(&self) -> Aabb {
		Aabb::new(self.min, self.max)
	}

	pub fn divisions(&self) -> UVec3 {
		UVec3::from_array(self.divisions)
	}
}

/// One occluder.
#[derive(Debug, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ObstacleConfig {
	Box { center: Vec3, half_extents: Vec3 },
	Sphere { center: Vec3, radius: f32 },
	/// Triangle soup, three vertices per triangle.
	Mesh { triangles: Vec<[Vec3; 3]> },
}

impl ObstacleConfig {
	fn shape(&self) -> OccluderShape {
		match self {
			ObstacleConfig::Box { center, half_extents } => OccluderShape::Box {
				center: *center,
				half_extents: *half_extents,
			},
			ObstacleConfig::Sphere { center, radius } => OccluderShape::Sphere {
				center: *center,
				radius: *radius,
			},
			ObstacleConfig::Mesh { triangles } => OccluderShape::Triangles(triangles.clone()),
		}
	}
}

/// Straight-line traversal query.
#[derive(Debug, Deserialize)]
pub struct RaycastConfig {
	pub from: Vec3,
	pub to: Vec3,
	#[serde(default)]
	pub radius: f32,
}

/// Path query.
#[derive(Debug, Deserialize)]
pub struct PathConfig {
	pub start: Vec3,
	pub end: Vec3,
	#[serde(default)]
	pub agent_radius: f32,
	/// Overrides `settings.default_algorithm`.
	pub algorithm: Option<Algorithm>,
}

impl Scene {
	/// Load and validate a scene file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read scene file: {}", path.display()))?;
		let scene: Scene = toml::from_str(&content).with_context(|| "Failed to parse scene TOML")?;

		if scene.volumes.is_empty() {
			anyhow::bail!("Scene must declare at least one volume");
		}
		for (index, volume) in scene.volumes.iter().enumerate() {
			if !volume.min.cmplt(volume.max).all() {
				anyhow::bail!("Volume {} has min {} not below max {}", index, volume.min, volume.max);
			}
			if volume.divisions.contains(&0) {
				anyhow::bail!("Volume {} has a zero division count", index);
			}
		}
		if !(scene.generation.voxel_extent > 0.0) {
			anyhow::bail!(
				"generation.voxel_extent must be positive, got {}",
				scene.generation.voxel_extent
			);
		}
		Ok(scene)
	}

	/// Occluder set holding every obstacle.
	pub fn occluders(&self) -> OccluderSet {
		let mut set = OccluderSet::new();
		for obstacle in &self.obstacles {
			set.insert(obstacle.shape());
		}
		set
	}
}

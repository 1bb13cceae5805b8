//! Axis-aligned bounding box used for volumes, partitions and occluders.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Single-precision axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
	/// Minimum corner (inclusive).
	pub min: Vec3,
	/// Maximum corner (inclusive).
	pub max: Vec3,
}

impl Aabb {
	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: Vec3, max: Vec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Create a new AABB from center and half-extents.
	pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
		Self {
			min: center - half_extents,
			max: center + half_extents,
		}
	}

	/// Smallest box containing every point.
	pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
		let mut iter = points.into_iter();
		let first = iter.next()?;
		let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
		Some(Self { min, max })
	}

	/// Check if this AABB overlaps with another.
	///
	/// Two AABBs overlap if they share any interior or boundary points.
	#[inline]
	pub fn overlaps(&self, other: &Aabb) -> bool {
		self.min.x <= other.max.x
			&& self.max.x >= other.min.x
			&& self.min.y <= other.max.y
			&& self.max.y >= other.min.y
			&& self.min.z <= other.max.z
			&& self.max.z >= other.min.z
	}

	/// Overlap test that ignores boxes that merely touch.
	#[inline]
	pub fn overlaps_strict(&self, other: &Aabb) -> bool {
		self.min.x < other.max.x
			&& self.max.x > other.min.x
			&& self.min.y < other.max.y
			&& self.max.y > other.min.y
			&& self.min.z < other.max.z
			&& self.max.z > other.min.z
	}

	/// Check if this AABB contains a point.
	#[inline]
	pub fn contains_point(&self, point: Vec3) -> bool {
		point.x >= self.min.x
			&& point.x <= self.max.x
			&& point.y >= self.min.y
			&& point.y <= self.max.y
			&& point.z >= self.min.z
			&& point.z <= self.max.z
	}

	/// Get the size of the AABB (max - min).
	#[inline]
	pub fn size(&self) -> Vec3 {
		self.max - self.min
	}

	#[inline]
	pub fn half_extents(&self) -> Vec3 {
		self.size() * 0.5
	}

	/// Get the center of the AABB.
	#[inline]
	pub fn center(&self) -> Vec3 {
		(self.min + self.max) * 0.5
	}

	/// Grow the box by `amount` on every side.
	#[inline]
	pub fn expand(&self, amount: f32) -> Self {
		Self {
			min: self.min - Vec3::splat(amount),
			max: self.max + Vec3::splat(amount),
		}
	}

	/// Point inside (or on) the box nearest to `point`.
	#[inline]
	pub fn closest_point(&self, point: Vec3) -> Vec3 {
		point.clamp(self.min, self.max)
	}

	/// Squared distance from `point` to the box (0 inside).
	#[inline]
	pub fn distance_squared(&self, point: Vec3) -> f32 {
		self.closest_point(point).distance_squared(point)
	}

	/// Slab test of the ray `origin + dir * t` for `t` in `[0, max_t]`.
	///
	/// Returns the clipped `(t_enter, t_exit)` interval.
	pub fn ray_intersection(&self, origin: Vec3, dir: Vec3, max_t: f32) -> Option<(f32, f32)> {
		let mut t_enter = 0.0f32;
		let mut t_exit = max_t;
		for axis in 0..3 {
			let o = origin[axis];
			let d = dir[axis];
			if d.abs() < f32::EPSILON {
				if o < self.min[axis] || o > self.max[axis] {
					return None;
				}
				continue;
			}
			let inv = 1.0 / d;
			let mut t0 = (self.min[axis] - o) * inv;
			let mut t1 = (self.max[axis] - o) * inv;
			if t0 > t1 {
				std::mem::swap(&mut t0, &mut t1);
			}
			t_enter = t_enter.max(t0);
			t_exit = t_exit.min(t1);
			if t_enter > t_exit {
				return None;
			}
		}
		Some((t_enter, t_exit))
	}

	/// Clip the segment `from -> to` against the box.
	pub fn clip_segment(&self, from: Vec3, to: Vec3) -> Option<(Vec3, Vec3)> {
		let delta = to - from;
		let length = delta.length();
		if length <= f32::EPSILON {
			return self.contains_point(from).then_some((from, to));
		}
		let dir = delta / length;
		let (t0, t1) = self.ray_intersection(from, dir, length)?;
		Some((from + dir * t0, from + dir * t1))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_from_center_half_extents() {
		let aabb = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(10.0));
		assert_eq!(aabb.min, Vec3::splat(-10.0));
		assert_eq!(aabb.max, Vec3::splat(10.0));
		assert_eq!(aabb.half_extents(), Vec3::splat(10.0));
	}

	#[test]
	fn test_overlaps_touching() {
		// Touching at boundary counts for the inclusive test only
		let a = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
		let b = Aabb::new(Vec3::splat(10.0), Vec3::splat(20.0));
		assert!(a.overlaps(&b));
		assert!(!a.overlaps_strict(&b));
	}

	#[test]
	fn test_overlaps_false() {
		let a = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
		let b = Aabb::new(Vec3::splat(11.0), Vec3::splat(20.0));
		assert!(!a.overlaps(&b));
		assert!(!b.overlaps_strict(&a));
	}

	#[test]
	fn test_closest_point() {
		let aabb = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
		assert_eq!(aabb.closest_point(Vec3::new(-5.0, 5.0, 15.0)), Vec3::new(0.0, 5.0, 10.0));
		assert_eq!(aabb.distance_squared(Vec3::splat(5.0)), 0.0);
	}

	#[test]
	fn test_ray_intersection_hit_and_miss() {
		let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
		let (t0, t1) = aabb.ray_intersection(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 100.0).unwrap();
		assert!((t0 - 4.0).abs() < 1e-5);
		assert!((t1 - 6.0).abs() < 1e-5);

		assert!(aabb.ray_intersection(Vec3::new(-5.0, 2.0, 0.0), Vec3::X, 100.0).is_none());
		// Segment too short to reach the box
		assert!(aabb.ray_intersection(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 3.0).is_none());
	}

	#[test]
	fn test_clip_segment_from_inside() {
		let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
		let (a, b) = aabb.clip_segment(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)).unwrap();
		assert_eq!(a, Vec3::ZERO);
		assert!((b.x - 1.0).abs() < 1e-5);
	}
}

//! Separating-axis triangle/box overlap (Akenine-Möller).

use glam::Vec3;

/// Whether a triangle overlaps the box `center ± half_extents`.
pub fn tri_box_overlap(center: Vec3, half_extents: Vec3, triangle: &[Vec3; 3]) -> bool {
  let v0 = triangle[0] - center;
  let v1 = triangle[1] - center;
  let v2 = triangle[2] - center;
  let edges = [v1 - v0, v2 - v1, v0 - v2];

  // 9 edge × box-axis separating axes
  for edge in edges {
    for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
      if !projections_overlap(axis.cross(edge), v0, v1, v2, half_extents) {
        return false;
      }
    }
  }

  // Box face normals, i.e. the triangle's AABB against the box
  let min = v0.min(v1).min(v2);
  let max = v0.max(v1).max(v2);
  if min.cmpgt(half_extents).any() || max.cmplt(-half_extents).any() {
    return false;
  }

  plane_box_overlap(edges[0].cross(edges[1]), v0, half_extents)
}

/// Whether any triangle of the set overlaps the box.
pub fn triangle_set_overlaps_box(center: Vec3, half_extents: Vec3, triangles: &[[Vec3; 3]]) -> bool {
  triangles
    .iter()
    .any(|triangle| tri_box_overlap(center, half_extents, triangle))
}

#[inline]
fn projections_overlap(axis: Vec3, v0: Vec3, v1: Vec3, v2: Vec3, half_extents: Vec3) -> bool {
  if axis.length_squared() < 1e-12 {
    // Degenerate axis (edge parallel to a box axis) separates nothing
    return true;
  }
  let p0 = v0.dot(axis);
  let p1 = v1.dot(axis);
  let p2 = v2.dot(axis);
  let min = p0.min(p1).min(p2);
  let max = p0.max(p1).max(p2);
  let radius = half_extents.dot(axis.abs());
  !(min > radius || max < -radius)
}

fn plane_box_overlap(normal: Vec3, vertex: Vec3, half_extents: Vec3) -> bool {
  let mut vmin = Vec3::ZERO;
  let mut vmax = Vec3::ZERO;
  for axis in 0..3 {
    let v = vertex[axis];
    if normal[axis] > 0.0 {
      vmin[axis] = -half_extents[axis] - v;
      vmax[axis] = half_extents[axis] - v;
    } else {
      vmin[axis] = half_extents[axis] - v;
      vmax[axis] = -half_extents[axis] - v;
    }
  }
  if normal.dot(vmin) > 0.0 {
    return false;
  }
  normal.dot(vmax) >= 0.0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_triangle_through_box() {
    let tri = [
      Vec3::new(-10.0, -10.0, 0.0),
      Vec3::new(10.0, -10.0, 0.0),
      Vec3::new(0.0, 10.0, 0.0),
    ];
    assert!(tri_box_overlap(Vec3::ZERO, Vec3::ONE, &tri));
  }

  #[test]
  fn test_triangle_beside_box() {
    let tri = [
      Vec3::new(5.0, 5.0, 0.0),
      Vec3::new(6.0, 5.0, 0.0),
      Vec3::new(5.0, 6.0, 0.0),
    ];
    assert!(!tri_box_overlap(Vec3::ZERO, Vec3::ONE, &tri));
  }

  #[test]
  fn test_plane_separates() {
    // Triangle's AABB overlaps the box but its plane does not
    let tri = [
      Vec3::new(4.0, -1.0, -1.0),
      Vec3::new(-1.0, 4.0, -1.0),
      Vec3::new(-1.0, -1.0, 4.0),
    ];
    assert!(!tri_box_overlap(Vec3::ZERO, Vec3::splat(0.5), &tri));
    assert!(tri_box_overlap(Vec3::ZERO, Vec3::splat(1.0), &tri));
  }

  #[test]
  fn test_diagonal_sliver_misses_corner() {
    // Triangle in the plane x + y = 1.5, just past the box corner
    let tri = [
      Vec3::new(1.5, 0.0, -5.0),
      Vec3::new(0.0, 1.5, -5.0),
      Vec3::new(0.0, 1.5, 5.0),
    ];
    assert!(!tri_box_overlap(Vec3::ZERO, Vec3::splat(0.5), &tri));
  }

  #[test]
  fn test_triangle_set() {
    let far = [Vec3::splat(50.0), Vec3::splat(51.0), Vec3::new(50.0, 51.0, 50.0)];
    let near = [
      Vec3::new(-2.0, 0.0, -2.0),
      Vec3::new(2.0, 0.0, -2.0),
      Vec3::new(0.0, 0.0, 2.0),
    ];
    assert!(!triangle_set_overlaps_box(Vec3::ZERO, Vec3::ONE, &[far]));
    assert!(triangle_set_overlaps_box(Vec3::ZERO, Vec3::ONE, &[far, near]));
  }
}

//! Centripetal Catmull-Rom path smoothing.

use glam::Vec3;

/// Centripetal parameterization.
const ALPHA: f32 = 0.5;
const MIN_KNOT_SPACING: f32 = 1e-4;

#[inline]
fn knot(t: f32, a: Vec3, b: Vec3) -> f32 {
  t + a.distance(b).powf(ALPHA).max(MIN_KNOT_SPACING)
}

/// Point at `u` in [0, 1] between `p1` and `p2`.
pub fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, u: f32) -> Vec3 {
  let t0 = 0.0;
  let t1 = knot(t0, p0, p1);
  let t2 = knot(t1, p1, p2);
  let t3 = knot(t2, p2, p3);
  let t = t1 + (t2 - t1) * u;

  let a1 = p0 * ((t1 - t) / (t1 - t0)) + p1 * ((t - t0) / (t1 - t0));
  let a2 = p1 * ((t2 - t) / (t2 - t1)) + p2 * ((t - t1) / (t2 - t1));
  let a3 = p2 * ((t3 - t) / (t3 - t2)) + p3 * ((t - t2) / (t3 - t2));
  let b1 = a1 * ((t2 - t) / (t2 - t0)) + a2 * ((t - t0) / (t2 - t0));
  let b2 = a2 * ((t3 - t) / (t3 - t1)) + a3 * ((t - t1) / (t3 - t1));
  b1 * ((t2 - t) / (t2 - t1)) + b2 * ((t - t1) / (t2 - t1))
}

/// Subdivide every segment into `subdivisions` spline pieces.
///
/// Original waypoints are kept; end tangents use reflected phantom points.
pub fn smooth_path(points: &[Vec3], subdivisions: u32) -> Vec<Vec3> {
  let n = points.len();
  if n < 3 || subdivisions < 2 {
    return points.to_vec();
  }
  let mut out = Vec::with_capacity((n - 1) * subdivisions as usize + 1);
  for i in 0..n - 1 {
    let p1 = points[i];
    let p2 = points[i + 1];
    let p0 = if i == 0 { p1 * 2.0 - p2 } else { points[i - 1] };
    let p3 = if i + 2 < n { points[i + 2] } else { p2 * 2.0 - p1 };
    out.push(p1);
    for step in 1..subdivisions {
      out.push(catmull_rom(p0, p1, p2, p3, step as f32 / subdivisions as f32));
    }
  }
  out.push(points[n - 1]);
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_spline_interpolates_control_points() {
    let (p0, p1, p2, p3) = (Vec3::ZERO, Vec3::X, Vec3::new(2.0, 1.0, 0.0), Vec3::new(3.0, 1.0, 0.0));
    assert!(catmull_rom(p0, p1, p2, p3, 0.0).distance(p1) < 1e-4);
    assert!(catmull_rom(p0, p1, p2, p3, 1.0).distance(p2) < 1e-4);
  }

  #[test]
  fn test_collinear_points_stay_on_line() {
    let points: Vec<Vec3> = (0..4).map(|i| Vec3::new(i as f32 * 10.0, 0.0, 0.0)).collect();
    let smoothed = smooth_path(&points, 4);
    assert_eq!(smoothed.len(), 3 * 4 + 1);
    for p in &smoothed {
      assert!(p.y.abs() < 1e-3 && p.z.abs() < 1e-3, "{p:?} left the line");
    }
    for pair in smoothed.windows(2) {
      assert!(pair[1].x >= pair[0].x - 1e-3, "smoothing reversed direction");
    }
  }

  #[test]
  fn test_keeps_endpoints_and_waypoints() {
    let points = vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 0.0)];
    let smoothed = smooth_path(&points, 3);
    assert_eq!(smoothed.first(), Some(&points[0]));
    assert_eq!(smoothed.last(), Some(&points[2]));
    assert_eq!(smoothed[3], points[1]);
  }

  #[test]
  fn test_two_points_or_one_subdivision_unchanged() {
    let line = vec![Vec3::ZERO, Vec3::ONE];
    assert_eq!(smooth_path(&line, 8), line);
    let bend = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
    assert_eq!(smooth_path(&bend, 1), bend);
  }
}

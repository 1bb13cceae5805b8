//! Greedy look-ahead waypoint pruning.

use glam::Vec3;

/// Drop waypoints that a later waypoint can be reached from directly.
///
/// From each kept point the next `max_backscan` points are tried farthest
/// first. Every failed check counts against `max_los_checks`; once the
/// budget is spent the remaining points are kept as they are.
pub fn prune_path(
  points: &[Vec3],
  mut line_of_traversal: impl FnMut(Vec3, Vec3) -> bool,
  max_backscan: usize,
  max_los_checks: usize,
) -> Vec<Vec3> {
  if points.len() <= 2 {
    return points.to_vec();
  }
  let last = points.len() - 1;
  let mut pruned = vec![points[0]];
  let mut failed = 0usize;
  let mut i = 0usize;

  while i < last {
    if failed >= max_los_checks {
      pruned.extend_from_slice(&points[i + 1..]);
      return pruned;
    }
    let far = (i + max_backscan.max(1)).min(last);
    let mut next = i + 1;
    for j in (i + 2..=far).rev() {
      if line_of_traversal(points[i], points[j]) {
        next = j;
        break;
      }
      failed += 1;
      if failed >= max_los_checks {
        break;
      }
    }
    pruned.push(points[next]);
    i = next;
  }
  pruned
}

//! Parent-selection strategies plugged into the shared search loop.

use crate::address::NodeAddress;
use crate::octree::NeighbourList;

use super::engine::SearchContext;

/// Parent chosen for a neighbour instead of the node being expanded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ParentOverride {
  pub parent: NodeAddress,
  pub g: f32,
  /// Graph predecessor to fall back to if the shortcut is later refuted.
  pub via: Option<(NodeAddress, f32)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PopAction {
  Expand,
  /// Priority changed; push the node back instead of expanding it.
  Requeue,
}

pub(crate) trait SearchStrategy {
  /// Called when relaxing `neighbour` from `current`; `graph_g` is the cost
  /// through `current`.
  fn try_shortcut(
    &mut self,
    ctx: &mut SearchContext<'_>,
    current: NodeAddress,
    neighbour: NodeAddress,
    graph_g: f32,
  ) -> Option<ParentOverride>;

  fn on_pop(&mut self, _ctx: &mut SearchContext<'_>, _current: NodeAddress) -> PopAction {
    PopAction::Expand
  }
}

/// Cost of reaching `neighbour` straight from `parent`.
fn shortcut_cost(ctx: &mut SearchContext<'_>, parent: NodeAddress, neighbour: NodeAddress) -> f32 {
  let from = *ctx.record(parent);
  let to = ctx.position(neighbour);
  from.g + ctx.edge_cost(from.position, to)
}

/// A*: parents are always graph neighbours.
pub(crate) struct BestFirst;

impl SearchStrategy for BestFirst {
  fn try_shortcut(&mut self, _: &mut SearchContext<'_>, _: NodeAddress, _: NodeAddress, _: f32) -> Option<ParentOverride> {
    None
  }
}

/// Theta*: link to the grandparent whenever it is visible.
pub(crate) struct AnyAngle;

impl SearchStrategy for AnyAngle {
  fn try_shortcut(
    &mut self,
    ctx: &mut SearchContext<'_>,
    current: NodeAddress,
    neighbour: NodeAddress,
    _graph_g: f32,
  ) -> Option<ParentOverride> {
    let record = *ctx.record(current);
    let parent = record.parent;
    if !parent.is_valid() || !ctx.line_of_sight(parent, neighbour) {
      return None;
    }
    Some(ParentOverride {
      parent,
      g: shortcut_cost(ctx, parent, neighbour),
      via: None,
    })
  }
}

/// Lazy Theta*: assume the grandparent is visible, verify on pop.
pub(crate) struct LazyAnyAngle;

impl SearchStrategy for LazyAnyAngle {
  fn try_shortcut(
    &mut self,
    ctx: &mut SearchContext<'_>,
    current: NodeAddress,
    neighbour: NodeAddress,
    graph_g: f32,
  ) -> Option<ParentOverride> {
    let parent = ctx.record(current).parent;
    if !parent.is_valid() {
      return None;
    }
    Some(ParentOverride {
      parent,
      g: shortcut_cost(ctx, parent, neighbour),
      via: Some((current, graph_g)),
    })
  }

  fn on_pop(&mut self, ctx: &mut SearchContext<'_>, current: NodeAddress) -> PopAction {
    let record = *ctx.record(current);
    let Some((via, via_g)) = record.via else {
      return PopAction::Expand;
    };
    if ctx.line_of_sight(record.parent, current) {
      ctx.record(current).via = None;
      return PopAction::Expand;
    }

    ctx.stats.reparented += 1;
    let position = record.position;
    let mut neighbours = NeighbourList::new();
    ctx.volume().neighbours(current, &mut neighbours);
    let mut best = (via, via_g);
    for &candidate in neighbours.iter() {
      let Some(closed) = ctx.existing(candidate).filter(|r| r.closed).copied() else {
        continue;
      };
      let g = closed.g + ctx.edge_cost(closed.position, position);
      if g < best.1 {
        best = (candidate, g);
      }
    }
    ctx.set_parent(current, best.0, best.1, None);

    // A refuted goal goes back through the queue with its corrected cost
    if current == ctx.goal() {
      PopAction::Requeue
    } else {
      PopAction::Expand
    }
  }
}

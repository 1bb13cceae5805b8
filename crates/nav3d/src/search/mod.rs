//! Graph search over octree cells.
//!
//! One search loop drives three strategies that differ only in how they pick
//! a node's parent:
//!
//! ```text
//! BestFirst     parent = node being expanded
//! AnyAngle      parent = expanded node's parent when it can see the neighbour
//! LazyAnyAngle  parent assumed as AnyAngle, verified when the node is popped
//! ```
//!
//! Start and goal are snapped to navigable cells no finer than the agent
//! radius allows. Returned paths begin and end at the exact requested
//! positions.

mod engine;
mod strategy;
pub mod types;

pub use engine::{find_path, PathSearch};
pub use types::{
  Algorithm, CostStrategy, HeuristicStrategy, NavPath, PathPoint, SearchOutcome, SearchParams, SearchResult, SearchStats,
};

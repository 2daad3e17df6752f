// src/core/indexing/mvptree/mod.rs

//! Multi-vantage-point tree for similarity search.
//!
//! Records are `(id, payload)` [`Point`]s. Internal nodes hold up to
//! `branch_factor - 1` vantage points in a reserved slot and route every other
//! point to the child selected by its distance to each of them. Range and
//! k-nearest-neighbour queries prune children with the triangle inequality,
//! and leaf points carry the distances to their first `path_length` ancestor
//! vantage points so most of them can be discarded without calling the metric.

pub mod node;
pub mod persistence;
pub mod point;
pub mod shared;
pub(crate) mod split;
pub mod tree;

pub use self::node::{Node, VantagePoint, MAX_TREE_DEPTH};
pub use self::point::Point;
pub use self::shared::SharedMvpTree;
pub use self::tree::{CancellationToken, MvpTree, TreeStats};

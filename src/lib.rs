#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]
#![forbid(unsafe_code)]
#![warn(clippy::all)]

//! # mvptree: multi-vantage-point trees for similarity search
//!
//! `mvptree` indexes opaque binary records by a pluggable distance function
//! and answers two kinds of queries without scanning every record:
//! - range queries: every record within a radius of the query
//! - k-nearest-neighbour queries: the `k` records closest to the query
//!
//! Subtrees are pruned with the triangle inequality, so the distance
//! function is expected to behave like a metric.
//!
//! ```
//! use std::sync::Arc;
//! use mvptree::{BitLevenshtein, MvpTree, Point};
//!
//! let mut tree = MvpTree::create(Arc::new(BitLevenshtein), 2, 5, 2)?;
//! tree.insert(Point::new("zero", b"0000".to_vec()))?;
//! tree.insert(Point::new("one", b"0001".to_vec()))?;
//! tree.insert(Point::new("ones", b"1111".to_vec()))?;
//!
//! let nearest = tree.knn_search(b"0000", 1)?;
//! assert_eq!(nearest[0].0.id(), "zero");
//! assert_eq!(nearest[0].1, 0.0);
//! # Ok::<(), mvptree::MvpTreeError>(())
//! ```

pub mod core;

// Re-export key types for easier use by library consumers
pub use crate::core::common::MvpTreeError;
pub use crate::core::config::{TreeConfig, TreeConfigBuilder};
pub use crate::core::distance::{BitLevenshtein, DistanceMetric, Hamming};
pub use crate::core::indexing::mvptree::{
    CancellationToken, MvpTree, Node, Point, SharedMvpTree, TreeStats, VantagePoint,
};
pub use crate::core::indexing::{LinearIndex, MetricIndex};

/// Core result type for the library
pub type Result<T> = std::result::Result<T, MvpTreeError>;

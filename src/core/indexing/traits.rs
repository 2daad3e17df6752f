use crate::core::common::Result;
use crate::core::indexing::mvptree::{MvpTree, Point};
use std::fmt::Debug;

/// Trait for similarity indexes over `(id, payload)` records.
///
/// Implemented by [`MvpTree`] and by the brute-force
/// [`LinearIndex`](crate::core::indexing::linear::LinearIndex), which share
/// the same query semantics.
pub trait MetricIndex: Debug {
    /// Stores a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the distance metric fails while placing the record.
    fn insert(&mut self, point: Point) -> Result<()>;

    /// Removes every record with this id. Returns `false` if there was none.
    fn remove(&mut self, id: &str) -> bool;

    /// All records within `radius` of `query`, in no particular order.
    fn range_search(&self, query: &[u8], radius: f32) -> Result<Vec<Point>>;

    /// The `k` records nearest to `query`, ascending by distance, equal
    /// distances in insertion order.
    fn knn_search(&self, query: &[u8], k: usize) -> Result<Vec<(Point, f32)>>;

    /// Number of stored records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricIndex for MvpTree {
    fn insert(&mut self, point: Point) -> Result<()> {
        MvpTree::insert(self, point)
    }

    fn remove(&mut self, id: &str) -> bool {
        MvpTree::remove(self, id)
    }

    fn range_search(&self, query: &[u8], radius: f32) -> Result<Vec<Point>> {
        MvpTree::range_search(self, query, radius)
    }

    fn knn_search(&self, query: &[u8], k: usize) -> Result<Vec<(Point, f32)>> {
        MvpTree::knn_search(self, query, k)
    }

    fn len(&self) -> usize {
        MvpTree::len(self)
    }
}

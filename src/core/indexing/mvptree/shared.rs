// src/core/indexing/mvptree/shared.rs

use std::io::Write;
use std::sync::{Arc, RwLock};

use crate::core::common::lock_utils::{read_lock_poisoned, write_lock_poisoned_with_context};
use crate::core::common::Result;
use crate::core::config::TreeConfig;
use crate::core::indexing::mvptree::point::Point;
use crate::core::indexing::mvptree::tree::{CancellationToken, MvpTree, TreeStats};

/// Single-writer / multi-reader handle to an [`MvpTree`].
///
/// Queries take the read lock and run concurrently; inserts, batches and
/// removals take the write lock for their whole duration, so a batch is
/// atomic with respect to every other operation on the handle.
#[derive(Debug, Clone)]
pub struct SharedMvpTree {
    inner: Arc<RwLock<MvpTree>>,
}

impl SharedMvpTree {
    pub fn new(tree: MvpTree) -> Self {
        Self { inner: Arc::new(RwLock::new(tree)) }
    }

    pub fn insert(&self, point: Point) -> Result<()> {
        self.inner.write().map_err(write_lock_poisoned_with_context("insert"))?.insert(point)
    }

    pub fn insert_batch(&self, points: Vec<Point>) -> Result<usize> {
        self.inner.write().map_err(write_lock_poisoned_with_context("insert_batch"))?.insert_batch(points)
    }

    /// Inserts `point` unless the same record is stored; the check and the
    /// insertion happen under one write lock.
    pub fn add(&self, point: Point) -> Result<bool> {
        self.inner.write().map_err(write_lock_poisoned_with_context("add"))?.add(point)
    }

    pub fn add_batch(&self, points: Vec<Point>) -> Result<usize> {
        self.inner.write().map_err(write_lock_poisoned_with_context("add_batch"))?.add_batch(points)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.inner.write().map_err(write_lock_poisoned_with_context("remove"))?.remove(id))
    }

    pub fn remove_point(&self, point: &Point) -> Result<bool> {
        self.inner.write().map_err(write_lock_poisoned_with_context("remove_point"))?.remove_point(point)
    }

    pub fn range_search(&self, query: &[u8], radius: f32) -> Result<Vec<Point>> {
        self.inner.read().map_err(read_lock_poisoned)?.range_search(query, radius)
    }

    pub fn range_search_with_cancel(
        &self,
        query: &[u8],
        radius: f32,
        token: &CancellationToken,
    ) -> Result<Vec<Point>> {
        self.inner.read().map_err(read_lock_poisoned)?.range_search_with_cancel(query, radius, token)
    }

    pub fn knn_search(&self, query: &[u8], k: usize) -> Result<Vec<(Point, f32)>> {
        self.inner.read().map_err(read_lock_poisoned)?.knn_search(query, k)
    }

    pub fn knn_search_with_cancel(
        &self,
        query: &[u8],
        k: usize,
        token: &CancellationToken,
    ) -> Result<Vec<(Point, f32)>> {
        self.inner.read().map_err(read_lock_poisoned)?.knn_search_with_cancel(query, k, token)
    }

    pub fn retrieve(&self, query: &[u8], k: usize, radius: f32) -> Result<Vec<(Point, f32)>> {
        self.inner.read().map_err(read_lock_poisoned)?.retrieve(query, k, radius)
    }

    pub fn contains(&self, point: &Point) -> Result<bool> {
        self.inner.read().map_err(read_lock_poisoned)?.contains(point)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(read_lock_poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.inner.read().map_err(read_lock_poisoned)?.is_empty())
    }

    pub fn config(&self) -> Result<TreeConfig> {
        Ok(*self.inner.read().map_err(read_lock_poisoned)?.config())
    }

    pub fn stats(&self) -> Result<TreeStats> {
        Ok(self.inner.read().map_err(read_lock_poisoned)?.stats())
    }

    /// Saves a consistent snapshot; writers wait until it is written.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        self.inner.read().map_err(read_lock_poisoned)?.save(writer)
    }

    /// Runs `f` with shared access to the tree.
    pub fn with_tree<T>(&self, f: impl FnOnce(&MvpTree) -> T) -> Result<T> {
        let guard = self.inner.read().map_err(read_lock_poisoned)?;
        Ok(f(&guard))
    }
}

impl From<MvpTree> for SharedMvpTree {
    fn from(tree: MvpTree) -> Self {
        Self::new(tree)
    }
}

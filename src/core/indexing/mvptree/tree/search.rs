// src/core/indexing/mvptree/tree/search.rs

//! Range and k-nearest-neighbour queries.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use super::{MvpTree, TreeContext};
use crate::core::common::{MvpTreeError, Result};
use crate::core::distance::check_radius;
use crate::core::indexing::mvptree::node::{child_intersects, child_lower_bound, Node};
use crate::core::indexing::mvptree::point::Point;

/// Shared flag checked by cancellable queries before every node visit.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Acquire)
    }
}

/// Candidate in the k-NN heap. Orders by distance, then by insertion
/// sequence, so the heap top is the worst candidate kept so far.
#[derive(Debug)]
struct Neighbor<'a> {
    distance: f32,
    point: &'a Point,
}

impl Neighbor<'_> {
    fn key(&self) -> (f32, u64) {
        (self.distance, self.point.seq)
    }
}

impl PartialEq for Neighbor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor<'_> {}

impl PartialOrd for Neighbor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let (d1, s1) = self.key();
        let (d2, s2) = other.key();
        d1.total_cmp(&d2).then(s1.cmp(&s2))
    }
}

/// Per-query state shared by the recursive walks.
struct Search<'a, 'q> {
    ctx: TreeContext<'a>,
    query: &'q [u8],
    /// Distances from the query to the ancestor vantage points, bounded by
    /// `path_length`.
    path: Vec<f32>,
    cancel: Option<&'q CancellationToken>,
}

impl<'a, 'q> Search<'a, 'q> {
    fn new(ctx: TreeContext<'a>, query: &'q [u8], cancel: Option<&'q CancellationToken>) -> Self {
        Self { ctx, query, path: Vec::with_capacity(ctx.config.path_length), cancel }
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(MvpTreeError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Records vantage distances on the query path; returns the length to
    /// truncate back to once the subtree is done.
    fn push_path(&mut self, distances: &[f32]) -> usize {
        let mark = self.path.len();
        let room = self.ctx.config.path_length.saturating_sub(mark);
        self.path.extend(distances.iter().take(room));
        mark
    }

    fn range<'n>(&mut self, node: &'n Node, radius: f32, out: &mut Vec<&'n Point>) -> Result<()> {
        self.check_cancelled()?;
        match node {
            Node::Leaf { points } => {
                for point in points {
                    if point.path_lower_bound(&self.path) > radius {
                        continue;
                    }
                    if self.ctx.distance(self.query, point.payload())? <= radius {
                        out.push(point);
                    }
                }
            }
            Node::Internal { vantage_points, boundaries, children } => {
                let distances = self.ctx.vantage_distances(vantage_points, self.query)?;
                for (vp, &d) in vantage_points.iter().zip(&distances) {
                    if vp.live && d <= radius {
                        out.push(&vp.point);
                    }
                }
                let mark = self.push_path(&distances);
                let branch_factor = self.ctx.config.branch_factor;
                for (&index, child) in children {
                    if child_intersects(boundaries, &distances, index, branch_factor, radius) {
                        self.range(child, radius, out)?;
                    }
                }
                self.path.truncate(mark);
            }
        }
        Ok(())
    }

    fn nearest<'n>(
        &mut self,
        node: &'n Node,
        k: usize,
        radius: f32,
        heap: &mut BinaryHeap<Neighbor<'n>>,
    ) -> Result<()> {
        self.check_cancelled()?;
        match node {
            Node::Leaf { points } => {
                for point in points {
                    if point.path_lower_bound(&self.path) > bound(heap, k, radius) {
                        continue;
                    }
                    let distance = self.ctx.distance(self.query, point.payload())?;
                    offer(heap, k, radius, Neighbor { distance, point });
                }
            }
            Node::Internal { vantage_points, boundaries, children } => {
                let distances = self.ctx.vantage_distances(vantage_points, self.query)?;
                for (vp, &distance) in vantage_points.iter().zip(&distances) {
                    if vp.live {
                        offer(heap, k, radius, Neighbor { distance, point: &vp.point });
                    }
                }

                let branch_factor = self.ctx.config.branch_factor;
                let mut order: Vec<(f32, &Node)> = children
                    .iter()
                    .map(|(&index, child)| {
                        (child_lower_bound(boundaries, &distances, index, branch_factor), child)
                    })
                    .collect();
                order.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mark = self.push_path(&distances);
                for (lower_bound, child) in order {
                    if lower_bound > bound(heap, k, radius) {
                        break;
                    }
                    self.nearest(child, k, radius, heap)?;
                }
                self.path.truncate(mark);
            }
        }
        Ok(())
    }
}

/// Current pruning radius: the k-th best distance once the heap is full.
fn bound(heap: &BinaryHeap<Neighbor<'_>>, k: usize, radius: f32) -> f32 {
    match heap.peek() {
        Some(worst) if heap.len() >= k => worst.distance.min(radius),
        _ => radius,
    }
}

fn offer<'n>(heap: &mut BinaryHeap<Neighbor<'n>>, k: usize, radius: f32, candidate: Neighbor<'n>) {
    if candidate.distance > radius {
        return;
    }
    if heap.len() < k {
        heap.push(candidate);
    } else if heap.peek().is_some_and(|worst| candidate < *worst) {
        heap.pop();
        heap.push(candidate);
    }
}

impl MvpTree {
    /// All points within `radius` of `query`, in no particular order.
    pub fn range_search<Q>(&self, query: &Q, radius: f32) -> Result<Vec<Point>>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.range_search_inner(query.as_ref(), radius, None)
    }

    /// Like [`range_search`](Self::range_search), failing with
    /// `MvpTreeError::Cancelled` once `token` is cancelled.
    pub fn range_search_with_cancel<Q>(
        &self,
        query: &Q,
        radius: f32,
        token: &CancellationToken,
    ) -> Result<Vec<Point>>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.range_search_inner(query.as_ref(), radius, Some(token))
    }

    fn range_search_inner(
        &self,
        query: &[u8],
        radius: f32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Point>> {
        check_radius(radius)?;
        let Some(root) = &self.root else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        Search::new(self.context(), query, cancel).range(root, radius, &mut found)?;
        Ok(found.into_iter().cloned().collect())
    }

    /// The `k` points nearest to `query`, ascending by distance. Equal
    /// distances are ordered by insertion.
    pub fn knn_search<Q>(&self, query: &Q, k: usize) -> Result<Vec<(Point, f32)>>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.retrieve(query, k, f32::INFINITY)
    }

    /// Like [`knn_search`](Self::knn_search), failing with
    /// `MvpTreeError::Cancelled` once `token` is cancelled.
    pub fn knn_search_with_cancel<Q>(
        &self,
        query: &Q,
        k: usize,
        token: &CancellationToken,
    ) -> Result<Vec<(Point, f32)>>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.nearest_inner(query.as_ref(), k, f32::INFINITY, Some(token))
    }

    /// The `k` points nearest to `query` among those within `radius`.
    pub fn retrieve<Q>(&self, query: &Q, k: usize, radius: f32) -> Result<Vec<(Point, f32)>>
    where
        Q: AsRef<[u8]> + ?Sized,
    {
        self.nearest_inner(query.as_ref(), k, radius, None)
    }

    fn nearest_inner(
        &self,
        query: &[u8],
        k: usize,
        radius: f32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<(Point, f32)>> {
        check_radius(radius)?;
        let Some(root) = &self.root else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap = BinaryHeap::new();
        heap.try_reserve(k.min(self.count) + 1)?;
        Search::new(self.context(), query, cancel).nearest(root, k, radius, &mut heap)?;

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|neighbor| (neighbor.point.clone(), neighbor.distance))
            .collect())
    }

    /// True when a record with the same id and payload is stored.
    pub fn contains(&self, point: &Point) -> Result<bool> {
        Ok(self.range_search(point, 0.0)?.iter().any(|found| found.same_record(point)))
    }
}

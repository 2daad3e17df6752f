// src/core/indexing/mvptree/node.rs

use std::collections::BTreeMap;

use super::point::Point;

/// Most nodes on any root-to-leaf path, the root counting as 1.
///
/// Thresholds are fixed when a node is created, so keys arriving in sorted
/// order keep falling into the outermost child. A leaf at this depth is never
/// split; it grows past `leaf_capacity` instead. Every recursive walk and the
/// persisted format rely on this bound.
pub const MAX_TREE_DEPTH: usize = 256;

/// A vantage point held in the reserved slot of an internal node.
///
/// Removing the record turns the slot into a tombstone: it keeps routing
/// inserts and queries through the node but is never returned.
#[derive(Debug, Clone)]
pub struct VantagePoint {
    pub(crate) point: Point,
    pub(crate) live: bool,
}

impl VantagePoint {
    pub(crate) fn new(point: Point) -> Self {
        Self { point, live: true }
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    pub fn is_live(&self) -> bool {
        self.live
    }
}

/// A node of the MVP tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// Points in insertion order.
    Leaf { points: Vec<Point> },
    /// `boundaries[j]` holds `branch_factor - 1` non-decreasing thresholds for
    /// `vantage_points[j]`. Children are keyed by their mixed-radix index;
    /// absent keys are empty partitions.
    Internal {
        vantage_points: Vec<VantagePoint>,
        boundaries: Vec<Vec<f32>>,
        children: BTreeMap<u64, Node>,
    },
}

impl Node {
    pub(crate) fn leaf(point: Point) -> Self {
        Node::Leaf { points: vec![point] }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// True for a leaf without points. Such leaves are dropped from their parent.
    pub(crate) fn is_empty_leaf(&self) -> bool {
        matches!(self, Node::Leaf { points } if points.is_empty())
    }
}

/// Bucket of distance `d` among `thresholds`: the number of thresholds `t <= d`.
pub(crate) fn bucket(thresholds: &[f32], d: f32) -> usize {
    thresholds.partition_point(|t| *t <= d)
}

/// Half-open interval `[lo, hi)` covered by bucket `b`.
pub(crate) fn bucket_bounds(thresholds: &[f32], b: usize) -> (f32, f32) {
    let lo = if b == 0 { f32::NEG_INFINITY } else { thresholds[b - 1] };
    let hi = thresholds.get(b).copied().unwrap_or(f32::INFINITY);
    (lo, hi)
}

/// Mixed-radix child index for the distances to each vantage point, most
/// significant digit first.
pub(crate) fn child_index(boundaries: &[Vec<f32>], distances: &[f32], branch_factor: usize) -> u64 {
    boundaries
        .iter()
        .zip(distances)
        .fold(0u64, |idx, (thresholds, &d)| idx * branch_factor as u64 + bucket(thresholds, d) as u64)
}

/// Splits a child index back into its per-vantage-point buckets.
pub(crate) fn child_buckets(index: u64, vantage_points: usize, branch_factor: usize) -> Vec<usize> {
    let radix = branch_factor as u64;
    let mut buckets = vec![0usize; vantage_points];
    let mut rest = index;
    for slot in buckets.iter_mut().rev() {
        *slot = (rest % radix) as usize;
        rest /= radix;
    }
    buckets
}

/// Distance from `d` to the interval `[lo, hi)`; zero when inside.
pub(crate) fn interval_gap(d: f32, lo: f32, hi: f32) -> f32 {
    if d < lo {
        lo - d
    } else if d > hi {
        d - hi
    } else {
        0.0
    }
}

/// Triangle-inequality lower bound on the distance between the query and any
/// point stored under child `index`.
pub(crate) fn child_lower_bound(
    boundaries: &[Vec<f32>],
    distances: &[f32],
    index: u64,
    branch_factor: usize,
) -> f32 {
    let buckets = child_buckets(index, boundaries.len(), branch_factor);
    boundaries
        .iter()
        .zip(distances)
        .zip(buckets)
        .map(|((thresholds, &d), b)| {
            let (lo, hi) = bucket_bounds(thresholds, b);
            interval_gap(d, lo, hi)
        })
        .fold(0.0, f32::max)
}

/// Whether child `index` may hold points within `radius` of the query: for
/// every vantage point the bucket interval must meet `[d - radius, d + radius]`.
pub(crate) fn child_intersects(
    boundaries: &[Vec<f32>],
    distances: &[f32],
    index: u64,
    branch_factor: usize,
    radius: f32,
) -> bool {
    let buckets = child_buckets(index, boundaries.len(), branch_factor);
    boundaries.iter().zip(distances).zip(buckets).all(|((thresholds, &d), b)| {
        let (lo, hi) = bucket_bounds(thresholds, b);
        !(hi <= d - radius || lo > d + radius)
    })
}

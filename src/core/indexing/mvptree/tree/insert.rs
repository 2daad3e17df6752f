use std::collections::btree_map::Entry;
use std::collections::HashSet;

use tracing::{debug, warn};

use super::{MvpTree, TreeContext};
use crate::core::common::Result;
use crate::core::indexing::mvptree::node::{child_index, Node, MAX_TREE_DEPTH};
use crate::core::indexing::mvptree::point::Point;
use crate::core::indexing::mvptree::split::split_points;

impl MvpTree {
    /// Inserts a point.
    ///
    /// The point is routed down by its distances to each vantage point on the
    /// way; a full leaf is split. If the metric fails, the tree is unchanged.
    /// Records already present are stored again; see [`add`](Self::add).
    pub fn insert(&mut self, point: Point) -> Result<()> {
        let mut point = point;
        point.seq = self.next_seq;
        point.path.clear();

        let ctx = TreeContext::new(self.metric.as_ref(), &self.config);
        match self.root.as_mut() {
            Some(root) => insert_into(root, point, &ctx, 1)?,
            None => self.root = Some(Node::leaf(point)),
        }

        self.next_seq += 1;
        self.count += 1;
        Ok(())
    }

    /// Inserts every point of `points` or none of them.
    ///
    /// On failure the points of this batch that were already inserted are
    /// removed again before the error is returned. Returns the number of
    /// points inserted.
    pub fn insert_batch<I>(&mut self, points: I) -> Result<usize>
    where
        I: IntoIterator<Item = Point>,
    {
        let first_seq = self.next_seq;
        let mut inserted = 0;
        for point in points {
            if let Err(err) = self.insert(point) {
                let purged = self.purge_since(first_seq);
                warn!(inserted, purged, error = %err, "batch insert failed, rolled back");
                return Err(err);
            }
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Inserts `point` unless a record with the same id and payload is
    /// already stored. Returns whether it was inserted.
    pub fn add(&mut self, point: Point) -> Result<bool> {
        if self.contains(&point)? {
            return Ok(false);
        }
        self.insert(point)?;
        Ok(true)
    }

    /// Inserts the points of `points` that are not stored yet, each distinct
    /// record once, all or nothing. Returns the number of points inserted.
    pub fn add_batch<I>(&mut self, points: I) -> Result<usize>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for point in points {
            if seen.contains(&point) || self.contains(&point)? {
                continue;
            }
            seen.insert(point.clone());
            fresh.push(point);
        }
        self.insert_batch(fresh)
    }
}

/// Inserts below `node`, which sits at `depth` (the root is at depth 1).
fn insert_into(node: &mut Node, point: Point, ctx: &TreeContext<'_>, depth: usize) -> Result<()> {
    let replacement = match node {
        Node::Internal { vantage_points, boundaries, children } => {
            let mut point = point;
            let distances = ctx.vantage_distances(vantage_points, point.payload())?;
            point.extend_path(&distances, ctx.config.path_length);
            let index = child_index(boundaries, &distances, ctx.config.branch_factor);
            return match children.entry(index) {
                Entry::Vacant(slot) => {
                    slot.insert(Node::leaf(point));
                    Ok(())
                }
                Entry::Occupied(slot) => insert_into(slot.into_mut(), point, ctx, depth + 1),
            };
        }
        Node::Leaf { points } => {
            if points.len() < ctx.config.leaf_capacity {
                points.push(point);
                return Ok(());
            }
            if depth >= MAX_TREE_DEPTH {
                debug!(depth, points = points.len() + 1, "leaf at maximum depth, not splitting");
                points.try_reserve(1)?;
                points.push(point);
                return Ok(());
            }
            let mut overflow = Vec::new();
            overflow.try_reserve_exact(points.len() + 1)?;
            overflow.extend(points.iter().cloned());
            overflow.push(point);
            // A split subtree built with budget `b` is at most `b + 2` levels tall.
            let budget = ctx.config.path_length.min(MAX_TREE_DEPTH - depth - 1);
            split_points(overflow, ctx, budget)?
        }
    };
    *node = replacement;
    Ok(())
}

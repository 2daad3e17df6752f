// src/core/indexing/mvptree/tree/mod.rs

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::core::common::Result;
use crate::core::config::TreeConfig;
use crate::core::distance::{checked_distance, DistanceMetric};
use crate::core::indexing::mvptree::node::{Node, VantagePoint};
use crate::core::indexing::mvptree::point::Point;

mod delete;
mod insert;
mod search;

pub use search::CancellationToken;

/// Borrowed view of what tree algorithms need besides the nodes themselves.
#[derive(Clone, Copy)]
pub(crate) struct TreeContext<'a> {
    pub(crate) metric: &'a dyn DistanceMetric,
    pub(crate) config: &'a TreeConfig,
}

impl<'a> TreeContext<'a> {
    pub(crate) fn new(metric: &'a dyn DistanceMetric, config: &'a TreeConfig) -> Self {
        Self { metric, config }
    }

    /// Distance between two payloads. Negative values (the metric's error
    /// sentinel) and NaN are rejected.
    pub(crate) fn distance(&self, a: &[u8], b: &[u8]) -> Result<f32> {
        checked_distance(self.metric, a, b)
    }

    /// Distances from `payload` to each vantage point of an internal node, in order.
    pub(crate) fn vantage_distances(
        &self,
        vantage_points: &[VantagePoint],
        payload: &[u8],
    ) -> Result<Vec<f32>> {
        vantage_points.iter().map(|vp| self.distance(vp.point.payload(), payload)).collect()
    }
}

/// Multi-vantage-point tree.
///
/// Records are `(id, payload)` points located by similarity under the metric
/// the tree was created with. Internal nodes partition their subtree by the
/// distance to up to `branch_factor - 1` vantage points; leaves hold up to
/// `leaf_capacity` points and split when an insertion would overflow them.
///
/// The tree is not internally synchronised; see
/// [`SharedMvpTree`](crate::core::indexing::mvptree::SharedMvpTree) for a
/// single-writer / multi-reader handle.
pub struct MvpTree {
    pub(crate) config: TreeConfig,
    pub(crate) metric: Arc<dyn DistanceMetric>,
    pub(crate) root: Option<Node>,
    pub(crate) count: usize,
    pub(crate) next_seq: u64,
}

/// Shape summary of a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Live points, including live vantage points.
    pub points: usize,
    pub leaves: usize,
    pub internal_nodes: usize,
    /// Number of nodes on the longest root-to-leaf path; 0 for an empty tree.
    pub depth: usize,
    pub vantage_points: usize,
    /// Vantage points whose record was removed.
    pub tombstones: usize,
}

impl MvpTree {
    /// Creates an empty tree with a validated configuration.
    pub fn new(metric: Arc<dyn DistanceMetric>, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, metric, root: None, count: 0, next_seq: 0 })
    }

    /// Creates an empty tree from the three shape parameters.
    pub fn create(
        metric: Arc<dyn DistanceMetric>,
        branch_factor: usize,
        path_length: usize,
        leaf_capacity: usize,
    ) -> Result<Self> {
        Self::new(metric, TreeConfig::new(branch_factor, path_length, leaf_capacity)?)
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn metric(&self) -> &Arc<dyn DistanceMetric> {
        &self.metric
    }

    /// Number of live points.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub(crate) fn context(&self) -> TreeContext<'_> {
        TreeContext::new(self.metric.as_ref(), &self.config)
    }

    /// All live points in depth-first order.
    pub fn points(&self) -> Vec<&Point> {
        let mut out = Vec::with_capacity(self.count);
        if let Some(root) = &self.root {
            collect_points(root, &mut out);
        }
        out
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        if let Some(root) = &self.root {
            accumulate_stats(root, 1, &mut stats);
        }
        stats
    }

    /// Writes a human-readable dump of the node structure.
    pub fn print<W: Write>(&self, writer: &mut W) -> Result<()> {
        write!(writer, "{}", self)?;
        Ok(())
    }
}

fn collect_points<'a>(node: &'a Node, out: &mut Vec<&'a Point>) {
    match node {
        Node::Leaf { points } => out.extend(points.iter()),
        Node::Internal { vantage_points, children, .. } => {
            out.extend(vantage_points.iter().filter(|vp| vp.live).map(|vp| &vp.point));
            for child in children.values() {
                collect_points(child, out);
            }
        }
    }
}

fn accumulate_stats(node: &Node, depth: usize, stats: &mut TreeStats) {
    stats.depth = stats.depth.max(depth);
    match node {
        Node::Leaf { points } => {
            stats.leaves += 1;
            stats.points += points.len();
        }
        Node::Internal { vantage_points, children, .. } => {
            stats.internal_nodes += 1;
            for vp in vantage_points {
                stats.vantage_points += 1;
                if vp.live {
                    stats.points += 1;
                } else {
                    stats.tombstones += 1;
                }
            }
            for child in children.values() {
                accumulate_stats(child, depth + 1, stats);
            }
        }
    }
}

fn fmt_node(node: &Node, indent: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let pad = "  ".repeat(indent);
    match node {
        Node::Leaf { points } => {
            writeln!(f, "{}leaf ({} points)", pad, points.len())?;
            for point in points {
                writeln!(f, "{}  {}", pad, point)?;
            }
        }
        Node::Internal { vantage_points, boundaries, children } => {
            writeln!(f, "{}internal ({} vantage points, {} children)", pad, vantage_points.len(), children.len())?;
            for (vp, thresholds) in vantage_points.iter().zip(boundaries) {
                let state = if vp.live { "" } else { " [deleted]" };
                writeln!(f, "{}  vp {}{} thresholds={:?}", pad, vp.point, state, thresholds)?;
            }
            for (index, child) in children {
                writeln!(f, "{}  child {}:", pad, index)?;
                fmt_node(child, indent + 2, f)?;
            }
        }
    }
    Ok(())
}

impl fmt::Display for MvpTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MvpTree({}) points={} metric={}", self.config, self.count, self.metric.name())?;
        match &self.root {
            Some(root) => fmt_node(root, 0, f),
            None => writeln!(f, "(empty)"),
        }
    }
}

impl fmt::Debug for MvpTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MvpTree")
            .field("config", &self.config)
            .field("metric", &self.metric.name())
            .field("count", &self.count)
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

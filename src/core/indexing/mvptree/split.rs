// src/core/indexing/mvptree/split.rs

//! Leaf splitting: vantage point selection and partitioning.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::core::common::Result;
use crate::core::indexing::mvptree::node::{child_index, Node, VantagePoint};
use crate::core::indexing::mvptree::point::Point;
use crate::core::indexing::mvptree::tree::TreeContext;

/// Vantage points picked from a point set, with the distance from each of
/// them to every point of the set.
#[derive(Debug)]
pub(crate) struct Selection {
    /// Positions of the vantage points in the input, in selection order.
    pub(crate) chosen: Vec<usize>,
    /// `columns[j][i]` is the distance from vantage point `j` to point `i`.
    pub(crate) columns: Vec<Vec<f32>>,
}

/// Farthest-first traversal: the first point is the first vantage point, each
/// following one maximises its minimum distance to those already chosen.
/// Ties go to the earliest point.
pub(crate) fn select_vantage_points(
    points: &[Point],
    count: usize,
    ctx: &TreeContext<'_>,
) -> Result<Selection> {
    let n = points.len();
    let mut selection = Selection { chosen: Vec::new(), columns: Vec::new() };
    if n == 0 || count == 0 {
        return Ok(selection);
    }

    let mut taken = vec![false; n];
    let mut min_dist = vec![f32::INFINITY; n];
    let mut next = Some(0usize);

    while let Some(vp) = next {
        taken[vp] = true;
        let column = points
            .iter()
            .enumerate()
            .map(|(i, p)| if i == vp { Ok(0.0) } else { ctx.distance(points[vp].payload(), p.payload()) })
            .collect::<Result<Vec<f32>>>()?;
        for (m, d) in min_dist.iter_mut().zip(&column) {
            *m = m.min(*d);
        }
        selection.chosen.push(vp);
        selection.columns.push(column);

        if selection.chosen.len() == count {
            break;
        }
        next = None;
        let mut best = f32::NEG_INFINITY;
        for i in (0..n).filter(|&i| !taken[i]) {
            if min_dist[i] > best {
                best = min_dist[i];
                next = Some(i);
            }
        }
    }

    Ok(selection)
}

/// Thresholds near the empirical quantiles `sorted[i * m / bf]`, `i = 1..bf`.
///
/// Equal distances always share a bucket, so a cut that lands inside a run of
/// ties moves to whichever end of the run is closer to the ideal position,
/// preferring the end that leaves the lower bucket non-empty.
pub(crate) fn quantile_thresholds(distances: &[f32], branch_factor: usize) -> Vec<f32> {
    let m = distances.len();
    if m == 0 {
        return vec![0.0; branch_factor - 1];
    }
    let mut sorted = distances.to_vec();
    sorted.sort_by(f32::total_cmp);

    (1..branch_factor)
        .map(|i| {
            let ideal = i * m / branch_factor;
            let value = sorted[ideal];
            // First position holding `value`, and first position past the run.
            let start = sorted.partition_point(|d| d.total_cmp(&value).is_lt());
            let end = sorted.partition_point(|d| d.total_cmp(&value).is_le());
            if start == ideal || end == m {
                return value;
            }
            if start == 0 || end - ideal <= ideal - start {
                sorted[end]
            } else {
                value
            }
        })
        .collect()
}

/// Builds the subtree holding `points`.
///
/// Groups that still exceed the leaf capacity are split again with `budget - 1`;
/// once the budget is spent they stay as oversized leaves. All distance
/// computations finish before anything is returned, so an error leaves the
/// caller's node untouched.
pub(crate) fn split_points(points: Vec<Point>, ctx: &TreeContext<'_>, budget: usize) -> Result<Node> {
    let capacity = ctx.config.leaf_capacity;
    let branch_factor = ctx.config.branch_factor;
    let n = points.len();
    if n <= capacity {
        return Ok(Node::Leaf { points });
    }

    let k = ctx.config.max_vantage_points().min(n - 1);
    let Selection { chosen, columns } = select_vantage_points(&points, k, ctx)?;

    let mut is_vantage = vec![false; n];
    for &i in &chosen {
        is_vantage[i] = true;
    }
    let remaining: Vec<usize> = (0..n).filter(|&i| !is_vantage[i]).collect();

    if remaining.len() > capacity && indistinguishable(&remaining, &columns) {
        warn!(
            points = n,
            vantage_points = chosen.len(),
            "points cannot be separated by their vantage distances, keeping an oversized leaf"
        );
        return Ok(Node::Leaf { points });
    }

    let boundaries: Vec<Vec<f32>> = columns
        .iter()
        .map(|column| {
            let distances: Vec<f32> = remaining.iter().map(|&i| column[i]).collect();
            quantile_thresholds(&distances, branch_factor)
        })
        .collect();

    let mut slots: Vec<Option<Point>> = points.into_iter().map(Some).collect();
    let vantage_points: Vec<VantagePoint> =
        chosen.iter().filter_map(|&i| slots[i].take()).map(VantagePoint::new).collect();

    let mut groups: BTreeMap<u64, Vec<Point>> = BTreeMap::new();
    for &i in &remaining {
        let Some(mut point) = slots[i].take() else { continue };
        let distances: Vec<f32> = columns.iter().map(|column| column[i]).collect();
        point.extend_path(&distances, ctx.config.path_length);
        let index = child_index(&boundaries, &distances, branch_factor);
        groups.entry(index).or_default().push(point);
    }

    debug!(
        points = n,
        vantage_points = vantage_points.len(),
        children = groups.len(),
        budget,
        "split leaf"
    );

    let mut children = BTreeMap::new();
    for (index, group) in groups {
        let child = if group.len() <= capacity {
            Node::Leaf { points: group }
        } else if budget == 0 {
            warn!(points = group.len(), capacity, "split depth exhausted, keeping an oversized leaf");
            Node::Leaf { points: group }
        } else {
            split_points(group, ctx, budget - 1)?
        };
        children.insert(index, child);
    }

    Ok(Node::Internal { vantage_points, boundaries, children })
}

/// True when every point in `remaining` has the same distance to each vantage point.
fn indistinguishable(remaining: &[usize], columns: &[Vec<f32>]) -> bool {
    columns.iter().all(|column| {
        let mut values = remaining.iter().map(|&i| column[i]);
        match values.next() {
            Some(first) => values.all(|d| d == first),
            None => true,
        }
    })
}

use super::{MvpTree, TreeContext};
use crate::core::common::Result;
use crate::core::indexing::mvptree::node::{child_index, Node};
use crate::core::indexing::mvptree::point::Point;

impl MvpTree {
    /// Removes every live point with this id. Returns false, leaving the tree
    /// untouched, when no such point exists.
    ///
    /// Only the id is known, so the whole tree is scanned. Leaf points are
    /// dropped; vantage points become tombstones that keep routing.
    pub fn remove(&mut self, id: &str) -> bool {
        self.remove_where(|p| p.id() == id) > 0
    }

    /// Removes the records equal to `point` (same id and payload), locating
    /// them by the same routing as insertion.
    pub fn remove_point(&mut self, point: &Point) -> Result<bool> {
        let Some(root) = self.root.as_ref() else {
            return Ok(false);
        };
        let route = route_to_leaf(root, point.payload(), &self.context())?;

        let removed = match self.root.as_mut() {
            Some(root) => remove_along(root, &route, point),
            None => 0,
        };
        self.finish_removal(removed);
        Ok(removed > 0)
    }

    /// Removes every point inserted with a sequence number of at least `first_seq`.
    pub(crate) fn purge_since(&mut self, first_seq: u64) -> usize {
        self.remove_where(|p| p.seq >= first_seq)
    }

    fn remove_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Point) -> bool,
    {
        let removed = match self.root.as_mut() {
            Some(root) => remove_matching(root, &predicate),
            None => 0,
        };
        self.finish_removal(removed);
        removed
    }

    fn finish_removal(&mut self, removed: usize) {
        self.count -= removed;
        if self.count == 0 || self.root.as_ref().is_some_and(Node::is_empty_leaf) {
            self.root = None;
        }
    }
}

fn remove_matching<F>(node: &mut Node, predicate: &F) -> usize
where
    F: Fn(&Point) -> bool,
{
    match node {
        Node::Leaf { points } => {
            let before = points.len();
            points.retain(|p| !predicate(p));
            before - points.len()
        }
        Node::Internal { vantage_points, children, .. } => {
            let mut removed = 0;
            for vp in vantage_points.iter_mut().filter(|vp| vp.live && predicate(&vp.point)) {
                vp.live = false;
                removed += 1;
            }
            for child in children.values_mut() {
                removed += remove_matching(child, predicate);
            }
            children.retain(|_, child| !child.is_empty_leaf());
            removed
        }
    }
}

/// Child indices taken by `payload` from `node` down to the last existing node.
fn route_to_leaf(node: &Node, payload: &[u8], ctx: &TreeContext<'_>) -> Result<Vec<u64>> {
    let mut route = Vec::new();
    let mut current = node;
    while let Node::Internal { vantage_points, boundaries, children } = current {
        let distances = ctx.vantage_distances(vantage_points, payload)?;
        let index = child_index(boundaries, &distances, ctx.config.branch_factor);
        route.push(index);
        match children.get(&index) {
            Some(child) => current = child,
            None => break,
        }
    }
    Ok(route)
}

fn remove_along(node: &mut Node, route: &[u64], target: &Point) -> usize {
    match node {
        Node::Leaf { points } => {
            let before = points.len();
            points.retain(|p| !p.same_record(target));
            before - points.len()
        }
        Node::Internal { vantage_points, children, .. } => {
            let mut removed = 0;
            for vp in vantage_points.iter_mut().filter(|vp| vp.live && vp.point.same_record(target)) {
                vp.live = false;
                removed += 1;
            }
            if let Some((&index, rest)) = route.split_first() {
                if let Some(child) = children.get_mut(&index) {
                    removed += remove_along(child, rest, target);
                    if child.is_empty_leaf() {
                        children.remove(&index);
                    }
                }
            }
            removed
        }
    }
}

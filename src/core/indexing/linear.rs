// src/core/indexing/linear.rs

//! Brute-force index that compares the query against every record.
//!
//! Useful as a correctness reference for [`MvpTree`](crate::core::indexing::mvptree::MvpTree)
//! and for data sets too small to benefit from pruning.

use std::sync::Arc;

use crate::core::common::Result;
use crate::core::distance::{check_radius, checked_distance, DistanceMetric};
use crate::core::indexing::mvptree::Point;
use crate::core::indexing::traits::MetricIndex;

#[derive(Debug)]
pub struct LinearIndex {
    metric: Arc<dyn DistanceMetric>,
    points: Vec<Point>,
    next_seq: u64,
}

impl LinearIndex {
    pub fn new(metric: Arc<dyn DistanceMetric>) -> Self {
        Self { metric, points: Vec::new(), next_seq: 0 }
    }

    fn distance(&self, a: &[u8], b: &[u8]) -> Result<f32> {
        checked_distance(self.metric.as_ref(), a, b)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

impl MetricIndex for LinearIndex {
    fn insert(&mut self, mut point: Point) -> Result<()> {
        point.seq = self.next_seq;
        point.path.clear();
        self.next_seq += 1;
        self.points.push(point);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> bool {
        let before = self.points.len();
        self.points.retain(|p| p.id() != id);
        self.points.len() < before
    }

    fn range_search(&self, query: &[u8], radius: f32) -> Result<Vec<Point>> {
        check_radius(radius)?;
        let mut found = Vec::new();
        for point in &self.points {
            if self.distance(query, point.payload())? <= radius {
                found.push(point.clone());
            }
        }
        Ok(found)
    }

    fn knn_search(&self, query: &[u8], k: usize) -> Result<Vec<(Point, f32)>> {
        let mut scored = self
            .points
            .iter()
            .map(|p| Ok((p, self.distance(query, p.payload())?)))
            .collect::<Result<Vec<(&Point, f32)>>>()?;
        // Points are kept in insertion order, so a stable sort breaks ties by sequence.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(scored.into_iter().take(k).map(|(p, d)| (p.clone(), d)).collect())
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

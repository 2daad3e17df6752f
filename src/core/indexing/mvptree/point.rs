// src/core/indexing/mvptree/point.rs

//! Defines `Point`, the record stored in an MVP tree.

use std::fmt;
use std::hash::{Hash, Hasher};

/// An `(id, payload)` record.
///
/// Besides the caller's data a stored point carries the sequence number the
/// tree assigned on insertion (used to break distance ties deterministically)
/// and the distances to the first `path_length` vantage points on its
/// root-to-node path. Both are maintained by the tree; a freshly constructed
/// point has neither.
///
/// Equality and hashing only consider `id` and `payload`.
#[derive(Debug, Clone)]
pub struct Point {
    id: String,
    payload: Vec<u8>,
    pub(crate) seq: u64,
    pub(crate) path: Vec<f32>,
}

impl Point {
    /// Creates a new point from an identifier and a payload.
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self { id: id.into(), payload: payload.into(), seq: 0, path: Vec::new() }
    }

    /// Rebuilds a stored point, including its tree-maintained state.
    pub(crate) fn from_parts(id: String, payload: Vec<u8>, seq: u64, path: Vec<f32>) -> Self {
        Self { id, payload, seq, path }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Insertion sequence number assigned by the tree.
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Cached distances to the ancestor vantage points, root first.
    pub fn cached_distances(&self) -> &[f32] {
        &self.path
    }

    /// Appends ancestor distances while the cache has room for them.
    pub(crate) fn extend_path(&mut self, distances: &[f32], path_length: usize) {
        let room = path_length.saturating_sub(self.path.len());
        self.path.extend(distances.iter().take(room));
    }

    /// Lower bound on the distance between this point and a query whose own
    /// ancestor distances are `query_path`, from the triangle inequality.
    pub(crate) fn path_lower_bound(&self, query_path: &[f32]) -> f32 {
        self.path
            .iter()
            .zip(query_path)
            .map(|(p, q)| (p - q).abs())
            .fold(0.0, f32::max)
    }

    /// Returns true when both points carry the same id and payload.
    pub fn same_record(&self, other: &Point) -> bool {
        self.id == other.id && self.payload == other.payload
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.same_record(other)
    }
}

impl Eq for Point {}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.payload.hash(state);
    }
}

impl AsRef<[u8]> for Point {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.id, String::from_utf8_lossy(&self.payload))
    }
}

// src/core/distance/mod.rs

//! Distance metrics over opaque byte payloads.
//!
//! A tree is built around exactly one [`DistanceMetric`]. The metric must be
//! deterministic, should be symmetric, and must return a non-negative value;
//! a negative result is the metric's way of reporting that it could not
//! measure the pair and fails the operation that asked for it.

use std::fmt;

use crate::core::common::{MvpTreeError, Result};

/// A dissimilarity function over byte payloads.
pub trait DistanceMetric: Send + Sync {
    /// Returns the distance between two payloads.
    fn distance(&self, a: &[u8], b: &[u8]) -> f32;

    /// Returns the name of the metric, used in diagnostics.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> DistanceMetric for F
where
    F: Fn(&[u8], &[u8]) -> f32 + Send + Sync,
{
    fn distance(&self, a: &[u8], b: &[u8]) -> f32 {
        self(a, b)
    }
}

impl fmt::Debug for dyn DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DistanceMetric").field(&self.name()).finish()
    }
}

/// Calls `metric`, rejecting negative results (the metric's error sentinel)
/// and NaN.
pub(crate) fn checked_distance(metric: &dyn DistanceMetric, a: &[u8], b: &[u8]) -> Result<f32> {
    let value = metric.distance(a, b);
    if value.is_nan() || value < 0.0 {
        return Err(MvpTreeError::InvalidDistance { value });
    }
    Ok(value)
}

/// Query radii must be non-negative numbers; `+inf` is allowed.
pub(crate) fn check_radius(radius: f32) -> Result<()> {
    if radius.is_nan() || radius < 0.0 {
        return Err(MvpTreeError::invalid_argument(format!(
            "radius must be a non-negative number, got {}",
            radius
        )));
    }
    Ok(())
}

/// Bit-difference count that charges every byte missing from the shorter
/// payload its full width of 8 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitLevenshtein;

impl DistanceMetric for BitLevenshtein {
    fn distance(&self, a: &[u8], b: &[u8]) -> f32 {
        let common = a.len().min(b.len());
        let differing: u32 = a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum();
        let missing = (a.len().max(b.len()) - common) as u64 * 8;
        (u64::from(differing) + missing) as f32
    }

    fn name(&self) -> &str {
        "bitlevenshtein"
    }
}

/// Hamming distance over bytes, where the shorter payload is padded with zero
/// bytes. A missing byte costs the number of set bits in its counterpart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hamming;

impl DistanceMetric for Hamming {
    fn distance(&self, a: &[u8], b: &[u8]) -> f32 {
        let (longer, shorter) = if a.len() >= b.len() { (a, b) } else { (b, a) };
        let bits: u64 = longer
            .iter()
            .enumerate()
            .map(|(i, x)| u64::from((x ^ shorter.get(i).copied().unwrap_or(0)).count_ones()))
            .sum();
        bits as f32
    }

    fn name(&self) -> &str {
        "hamming"
    }
}

//! Ordering of build requests within one tick.
//!
//! ```text
//!   key = (min(depth, lod_precedence), distance)
//!
//!   lod_precedence = 2
//!   depth 0 ─┐
//!   depth 1 ─┼─ coarse first, nearest first within a depth
//!   depth 2+ ─── one bucket, nearest first regardless of depth
//! ```
//!
//! Coarse levels always win so every region gets some mesh quickly. Past the
//! cutoff, a near depth-5 node beats a far depth-2 node.

use std::cmp::Ordering;

/// Sort key of a request; lower sorts first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriorityKey {
  pub bucket: u32,
  pub distance: f32,
}

impl PriorityKey {
  #[inline]
  pub fn new(depth: u32, distance: f32, lod_precedence: u32) -> Self {
    Self {
      bucket: depth.min(lod_precedence),
      distance,
    }
  }

  /// Total order; NaN distances sort last within their bucket.
  pub fn compare(&self, other: &Self) -> Ordering {
    self
      .bucket
      .cmp(&other.bucket)
      .then_with(|| self.distance.total_cmp(&other.distance))
  }
}

/// Stable sort of `items` by their priority key.
pub fn sort_by_priority<T>(items: &mut [T], lod_precedence: u32, key: impl Fn(&T) -> (u32, f32)) {
  items.sort_by(|a, b| {
    let (da, xa) = key(a);
    let (db, xb) = key(b);
    PriorityKey::new(da, xa, lod_precedence).compare(&PriorityKey::new(db, xb, lod_precedence))
  });
}

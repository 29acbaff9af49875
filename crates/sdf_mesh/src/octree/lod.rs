//! Distance-based LOD policy.
//!
//! A tier `(depth, max_distance)` limits every node at `depth` or deeper to
//! viewers within `max_distance` of the node's bounds. Drawing uses the same
//! tiers stretched by `draw_scale`, so a node keeps drawing a little past the
//! point where it stops being rebuilt and the next LOD has time to stream in.

use glam::Vec3;

use super::Aabb;

/// Decides which nodes are worth building and which may be drawn.
pub trait LodPolicy {
  fn should_update(&self, bounds: &Aabb, depth: u32) -> bool;
  fn should_draw(&self, bounds: &Aabb, depth: u32) -> bool;
}

/// Maximum viewer distance for nodes at `depth` and deeper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodTier {
  pub depth: u32,
  pub max_distance: f32,
}

impl LodTier {
  pub const fn new(depth: u32, max_distance: f32) -> Self {
    Self {
      depth,
      max_distance,
    }
  }
}

/// Default draw slack applied to every tier.
pub const DEFAULT_DRAW_SCALE: f32 = 1.25;

/// Tiered distance policy around a viewer in octree-local space.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceLod {
  pub viewer: Vec3,
  pub tiers: Vec<LodTier>,
  pub draw_scale: f32,
}

impl DistanceLod {
  pub fn new(viewer: Vec3, tiers: Vec<LodTier>) -> Self {
    Self {
      viewer,
      tiers,
      draw_scale: DEFAULT_DRAW_SCALE,
    }
  }

  pub fn with_draw_scale(mut self, draw_scale: f32) -> Self {
    self.draw_scale = draw_scale;
    self
  }

  /// Distance from the viewer to the closest point of `bounds`.
  #[inline]
  pub fn distance(&self, bounds: &Aabb) -> f32 {
    bounds.distance_to_point(self.viewer)
  }

  fn within(&self, bounds: &Aabb, depth: u32, scale: f32) -> bool {
    let distance = self.distance(bounds);
    self
      .tiers
      .iter()
      .filter(|tier| tier.depth <= depth)
      .all(|tier| distance <= tier.max_distance * scale)
  }
}

impl LodPolicy for DistanceLod {
  fn should_update(&self, bounds: &Aabb, depth: u32) -> bool {
    self.within(bounds, depth, 1.0)
  }

  fn should_draw(&self, bounds: &Aabb, depth: u32) -> bool {
    self.within(bounds, depth, self.draw_scale.max(1.0))
  }
}

#[cfg(test)]
#[path = "lod_test.rs"]
mod lod_test;

//! Per-cell vertex placement for the three mesh modes.

use glam::Vec3;
use smallvec::SmallVec;

use super::qef::Qef;
use super::tables::CUBE_EDGES;
use crate::field::{self, DensityField, MaterialId, Sample};
use crate::types::{DualContourFallback, ExtractConfig, MeshMode};

/// Edge crossings of one cell (at most 12).
pub type Crossings = SmallVec<[Vec3; 12]>;

/// Corner samples and world positions of one cell.
pub struct CellCorners {
  pub samples: [Sample; 8],
  pub positions: [Vec3; 8],
}

impl CellCorners {
  /// Bit `i` set when corner `i` is inside.
  #[inline]
  pub fn inside_mask(&self) -> u8 {
    let mut mask = 0u8;
    for (i, sample) in self.samples.iter().enumerate() {
      mask |= u8::from(!sample.is_outside()) << i;
    }
    mask
  }

  #[inline]
  pub fn min(&self) -> Vec3 {
    self.positions[0]
  }

  #[inline]
  pub fn max(&self) -> Vec3 {
    self.positions[7]
  }

  /// Zero-crossing of every sign-changing edge, by linear interpolation.
  pub fn crossings(&self) -> Crossings {
    let mut out = Crossings::new();
    for [c0, c1] in CUBE_EDGES {
      let s0 = self.samples[c0];
      let s1 = self.samples[c1];
      if s0.is_outside() == s1.is_outside() {
        continue;
      }
      let denom = s0.distance - s1.distance;
      let t = if denom != 0.0 {
        (s0.distance / denom).clamp(0.0, 1.0)
      } else {
        0.5
      };
      out.push(self.positions[c0].lerp(self.positions[c1], t));
    }
    out
  }

  /// Most common material among the inside corners, lowest id on ties.
  pub fn dominant_material(&self) -> MaterialId {
    let mut best = MaterialId(0);
    let mut best_count = 0;
    for sample in self.samples.iter().filter(|s| !s.is_outside()) {
      let count = self
        .samples
        .iter()
        .filter(|s| !s.is_outside() && s.material == sample.material)
        .count();
      if count > best_count || (count == best_count && sample.material < best) {
        best = sample.material;
        best_count = count;
      }
    }
    best
  }
}

/// Outcome of placing one vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
  pub position: Vec3,
  /// Dual-contour solve was rejected and the fallback applied.
  pub fell_back: bool,
}

/// Place the vertex of a sign-changing cell.
pub fn place_vertex<F: DensityField + ?Sized>(
  field: &F,
  corners: &CellCorners,
  config: &ExtractConfig,
  crossing_normal_delta: f32,
) -> Placement {
  match config.mode {
    MeshMode::Blocky => Placement {
      position: (corners.min() + corners.max()) * 0.5,
      fell_back: false,
    },
    MeshMode::SurfaceNet => Placement {
      position: mean(&corners.crossings()).unwrap_or((corners.min() + corners.max()) * 0.5),
      fell_back: false,
    },
    MeshMode::DualContour => dual_contour(field, corners, config, crossing_normal_delta),
  }
}

fn mean(points: &[Vec3]) -> Option<Vec3> {
  if points.is_empty() {
    return None;
  }
  Some(points.iter().copied().sum::<Vec3>() / points.len() as f32)
}

fn dual_contour<F: DensityField + ?Sized>(
  field: &F,
  corners: &CellCorners,
  config: &ExtractConfig,
  crossing_normal_delta: f32,
) -> Placement {
  let crossings = corners.crossings();
  let center = (corners.min() + corners.max()) * 0.5;
  let average = mean(&crossings).unwrap_or(center);

  let mut qef = Qef::new();
  for &p in &crossings {
    qef.add(p, field::gradient(field, p, crossing_normal_delta));
  }

  let slack = (corners.max() - corners.min()) * config.dc_tolerance.max(0.0);
  let lo = corners.min() - slack;
  let hi = corners.max() + slack;

  match qef.solve(config.qef_regularization) {
    Some(x) if x.cmpge(lo).all() && x.cmple(hi).all() => Placement {
      position: x,
      fell_back: false,
    },
    solved => {
      let position = match (config.dc_fallback, solved) {
        (DualContourFallback::Clamp, Some(x)) => x.clamp(corners.min(), corners.max()),
        _ => average,
      };
      Placement {
        position,
        fell_back: true,
      }
    }
  }
}

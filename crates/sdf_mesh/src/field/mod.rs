//! Density-field contract shared by every extraction mode.
//!
//! A field maps a point to a [`Sample`]: signed distance to the nearest
//! surface plus a material tag.
//!
//! ```text
//!   distance > 0   outside (air)
//!   distance <= 0  inside (solid)
//! ```
//!
//! Fields are wrapped in a [`FieldHandle`] that records whether the field may
//! be evaluated from worker threads. Fields that call back into
//! single-threaded host logic are tagged `MainThreadOnly` and get extracted
//! synchronously on the caller's thread.

use std::rc::Rc;
use std::sync::Arc;

use glam::Vec3;

pub mod shapes;

pub use shapes::{BoxField, HalfSpace, Sphere, TiltedPlane, Union};

/// Distance substituted for non-finite samples.
///
/// Large and positive so a broken sample reads as empty space and can never
/// fake a sign change.
pub const FAR_OUTSIDE: f32 = 1.0e6;

/// Material identifier carried by samples and vertices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u8);

/// One evaluation of a density field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
  pub distance: f32,
  pub material: MaterialId,
}

impl Sample {
  /// Sample far outside any surface.
  pub const AIR: Self = Self {
    distance: FAR_OUTSIDE,
    material: MaterialId(0),
  };

  #[inline]
  pub const fn new(distance: f32, material: MaterialId) -> Self {
    Self { distance, material }
  }

  #[inline]
  pub fn is_outside(&self) -> bool {
    self.distance > 0.0
  }

  /// Replace a non-finite distance with [`FAR_OUTSIDE`].
  #[inline]
  pub fn sanitized(self) -> Self {
    if self.distance.is_finite() {
      self
    } else {
      Self {
        distance: FAR_OUTSIDE,
        material: self.material,
      }
    }
  }
}

impl Default for Sample {
  fn default() -> Self {
    Self::AIR
  }
}

/// Signed distance field with material tags.
///
/// Must be pure from the caller's perspective: evaluated many times per build
/// in any order.
pub trait DensityField {
  fn sample(&self, point: Vec3) -> Sample;
}

impl<F> DensityField for F
where
  F: Fn(Vec3) -> Sample,
{
  #[inline]
  fn sample(&self, point: Vec3) -> Sample {
    self(point)
  }
}

/// Evaluate a field and sanitize the result.
#[inline]
pub fn sample_sanitized<F: DensityField + ?Sized>(field: &F, point: Vec3) -> Sample {
  field.sample(point).sanitized()
}

/// A density field tagged with its threading capability.
#[derive(Clone)]
pub enum FieldHandle {
  /// Safe to evaluate from any worker.
  ThreadSafe(Arc<dyn DensityField + Send + Sync>),
  /// Must be evaluated on the thread that owns the handle.
  MainThreadOnly(Rc<dyn DensityField>),
}

impl FieldHandle {
  pub fn thread_safe<F>(field: F) -> Self
  where
    F: DensityField + Send + Sync + 'static,
  {
    Self::ThreadSafe(Arc::new(field))
  }

  pub fn main_thread_only<F>(field: F) -> Self
  where
    F: DensityField + 'static,
  {
    Self::MainThreadOnly(Rc::new(field))
  }

  /// Whether builds for this field may run on a worker.
  #[inline]
  pub fn is_thread_safe(&self) -> bool {
    matches!(self, Self::ThreadSafe(_))
  }

  /// Borrow the underlying field regardless of its tag.
  pub fn as_field(&self) -> &dyn DensityField {
    match self {
      Self::ThreadSafe(field) => field.as_ref(),
      Self::MainThreadOnly(field) => field.as_ref(),
    }
  }
}

impl std::fmt::Debug for FieldHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::ThreadSafe(_) => f.write_str("FieldHandle::ThreadSafe"),
      Self::MainThreadOnly(_) => f.write_str("FieldHandle::MainThreadOnly"),
    }
  }
}

// =============================================================================
// Derived queries
// =============================================================================

/// Central-difference gradient, normalized.
///
/// Points from solid towards air. Falls back to +Y where the field is flat.
pub fn gradient<F: DensityField + ?Sized>(field: &F, point: Vec3, delta: f32) -> Vec3 {
  let dx = Vec3::new(delta, 0.0, 0.0);
  let dy = Vec3::new(0.0, delta, 0.0);
  let dz = Vec3::new(0.0, 0.0, delta);
  let d = |p: Vec3| sample_sanitized(field, p).distance;

  let g = Vec3::new(
    d(point + dx) - d(point - dx),
    d(point + dy) - d(point - dy),
    d(point + dz) - d(point - dz),
  ) / (2.0 * delta);

  g.normalize_or(Vec3::Y)
}

/// Result of [`raycast`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
  /// Fraction of the segment travelled, in `(0, 1]`.
  pub t: f32,
  /// Material sampled at the hit.
  pub material: MaterialId,
}

/// Smallest step taken when the field reports a distance near zero.
const RAY_MIN_STEP: f32 = 0.05;

/// March from `p0` towards `p1` and report the first inside/outside flip
/// relative to the starting point.
///
/// Steps by the sampled distance, clamped to `[min(0.05, max_step), max_step]`.
/// Returns `None` when the segment ends first or is degenerate.
pub fn raycast<F: DensityField + ?Sized>(
  field: &F,
  p0: Vec3,
  p1: Vec3,
  max_step: f32,
) -> Option<RayHit> {
  let length = p0.distance(p1);
  if !(length > 0.0) || !(max_step > 0.0) {
    return None;
  }

  let dir = (p1 - p0) / length;
  let start = sample_sanitized(field, p0);
  let start_outside = start.is_outside();
  let min_step = RAY_MIN_STEP.min(max_step);

  let mut travelled = 0.0;
  let mut d = start.distance;
  loop {
    travelled += d.abs().clamp(min_step, max_step);
    let t = travelled / length;
    if t > 1.0 {
      return None;
    }

    let sample = sample_sanitized(field, p0 + dir * travelled);
    if sample.is_outside() != start_outside {
      return Some(RayHit {
        t,
        material: sample.material,
      });
    }
    d = sample.distance;
  }
}

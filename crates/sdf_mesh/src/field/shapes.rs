//! Simple analytic fields for testing and debugging.
//!
//! Deterministic shapes that are easy to verify by eye or by formula.

use glam::Vec3;

use super::{DensityField, MaterialId, Sample};

/// Solid sphere.
#[derive(Clone, Copy, Debug)]
pub struct Sphere {
  pub center: Vec3,
  pub radius: f32,
  pub material: MaterialId,
}

impl Sphere {
  pub fn new(radius: f32) -> Self {
    Self {
      center: Vec3::ZERO,
      radius,
      material: MaterialId(0),
    }
  }

  pub fn with_center(mut self, center: Vec3) -> Self {
    self.center = center;
    self
  }

  pub fn with_material(mut self, material: MaterialId) -> Self {
    self.material = material;
    self
  }
}

impl DensityField for Sphere {
  #[inline]
  fn sample(&self, point: Vec3) -> Sample {
    Sample::new(point.distance(self.center) - self.radius, self.material)
  }
}

/// Everything below `height` is solid: `distance = y - height`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HalfSpace {
  pub height: f32,
  pub material: MaterialId,
}

impl HalfSpace {
  pub fn new(height: f32) -> Self {
    Self {
      height,
      material: MaterialId(0),
    }
  }
}

impl DensityField for HalfSpace {
  #[inline]
  fn sample(&self, point: Vec3) -> Sample {
    Sample::new(point.y - self.height, self.material)
  }
}

/// Plane through `(0, height, 0)` tilted around Z.
///
/// Crosses many node boundaries at a predictable angle, which makes it a good
/// probe for seams between neighbouring nodes.
///
/// SDF: `(y - height) * cos(angle) - x * sin(angle)`
#[derive(Clone, Copy, Debug)]
pub struct TiltedPlane {
  pub height: f32,
  pub angle: f32,
}

impl Default for TiltedPlane {
  fn default() -> Self {
    Self {
      height: 0.0,
      angle: std::f32::consts::FRAC_PI_4,
    }
  }
}

impl TiltedPlane {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_height(mut self, height: f32) -> Self {
    self.height = height;
    self
  }

  pub fn with_angle_degrees(mut self, degrees: f32) -> Self {
    self.angle = degrees.to_radians();
    self
  }
}

impl DensityField for TiltedPlane {
  #[inline]
  fn sample(&self, point: Vec3) -> Sample {
    let (sin_a, cos_a) = self.angle.sin_cos();
    Sample::new((point.y - self.height) * cos_a - point.x * sin_a, MaterialId(0))
  }
}

/// Solid axis-aligned box. Sharp edges exercise the dual-contouring solve.
#[derive(Clone, Copy, Debug)]
pub struct BoxField {
  pub center: Vec3,
  pub half_extents: Vec3,
  pub material: MaterialId,
}

impl BoxField {
  pub fn new(half_extents: Vec3) -> Self {
    Self {
      center: Vec3::ZERO,
      half_extents,
      material: MaterialId(0),
    }
  }

  pub fn with_center(mut self, center: Vec3) -> Self {
    self.center = center;
    self
  }

  pub fn with_material(mut self, material: MaterialId) -> Self {
    self.material = material;
    self
  }
}

impl DensityField for BoxField {
  fn sample(&self, point: Vec3) -> Sample {
    let q = (point - self.center).abs() - self.half_extents;
    let outside = q.max(Vec3::ZERO).length();
    let inside = q.max_element().min(0.0);
    Sample::new(outside + inside, self.material)
  }
}

/// Union of two fields. The nearer surface wins, along with its material.
#[derive(Clone, Copy, Debug)]
pub struct Union<A, B> {
  pub a: A,
  pub b: B,
}

impl<A, B> Union<A, B> {
  pub fn new(a: A, b: B) -> Self {
    Self { a, b }
  }
}

impl<A: DensityField, B: DensityField> DensityField for Union<A, B> {
  fn sample(&self, point: Vec3) -> Sample {
    let a = self.a.sample(point);
    let b = self.b.sample(point);
    if a.distance <= b.distance {
      a
    } else {
      b
    }
  }
}

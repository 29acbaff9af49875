//! Quadratic error function for dual-contouring vertex placement.
//!
//! Minimizes `sum((n_i . (x - p_i))^2) + lambda * |x - c|^2` where `c` is the
//! mass point of the crossings. The regularization term pins directions the
//! planes leave unconstrained (flat or ridge-like cells) to the mass point.

use glam::{Mat3, Vec3};

/// Determinant below which the regularized system is treated as singular.
const SINGULAR_EPSILON: f32 = 1.0e-12;

/// Accumulated plane constraints for one cell.
#[derive(Clone, Copy, Debug)]
pub struct Qef {
  ata: Mat3,
  atb: Vec3,
  btb: f32,
  mass_sum: Vec3,
  count: u32,
}

impl Default for Qef {
  fn default() -> Self {
    Self {
      ata: Mat3::ZERO,
      atb: Vec3::ZERO,
      btb: 0.0,
      mass_sum: Vec3::ZERO,
      count: 0,
    }
  }
}

impl Qef {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add the plane through `point` with unit `normal`.
  pub fn add(&mut self, point: Vec3, normal: Vec3) {
    let b = normal.dot(point);
    self.ata += Mat3::from_cols(normal * normal.x, normal * normal.y, normal * normal.z);
    self.atb += normal * b;
    self.btb += b * b;
    self.mass_sum += point;
    self.count += 1;
  }

  pub fn count(&self) -> u32 {
    self.count
  }

  /// Average of the added points.
  pub fn mass_point(&self) -> Option<Vec3> {
    (self.count > 0).then(|| self.mass_sum / self.count as f32)
  }

  /// Solve for the minimizing point.
  ///
  /// Returns `None` with no constraints, when the system is singular, or when
  /// the result is not finite.
  pub fn solve(&self, regularization: f32) -> Option<Vec3> {
    let center = self.mass_point()?;
    let a = self.ata + Mat3::from_diagonal(Vec3::splat(regularization.max(0.0)));
    if a.determinant().abs() <= SINGULAR_EPSILON {
      return None;
    }

    // Solve relative to the mass point to keep magnitudes small.
    let rhs = self.atb - self.ata * center;
    let x = center + a.inverse() * rhs;
    x.is_finite().then_some(x)
  }

  /// Sum of squared plane distances at `x`.
  pub fn error_at(&self, x: Vec3) -> f32 {
    (x.dot(self.ata * x) - 2.0 * x.dot(self.atb) + self.btb).max(0.0)
  }
}

#[cfg(test)]
#[path = "qef_test.rs"]
mod qef_test;

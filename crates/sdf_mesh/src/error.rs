//! Error types for configuration and region validation.
//!
//! Only caller mistakes surface here. Transient conditions during a build
//! (solver fallback, deferred requests, orphaned completions) are absorbed by
//! the pipeline and never become an `Err`.

use glam::{UVec3, Vec3};
use thiserror::Error;

use crate::system::ObjectId;

/// Errors returned by configuration setters and region construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SdfMeshError {
  /// A single cell cannot determine an edge neighbour.
  #[error("resolution must be at least 2 cells on every axis, got {0}")]
  ResolutionTooSmall(UVec3),

  /// Padded grid does not fit in the 20-bit-per-axis cell key.
  #[error("resolution {0} exceeds the cell key range")]
  ResolutionTooLarge(UVec3),

  #[error("bounds min {min} must be finite and strictly below max {max}")]
  InvalidBounds { min: Vec3, max: Vec3 },

  #[error("cell size must be finite and positive, got {0}")]
  InvalidCellSize(Vec3),

  #[error("unknown object {0:?}")]
  UnknownObject(ObjectId),
}

pub type Result<T> = std::result::Result<T, SdfMeshError>;

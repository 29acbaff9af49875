//! Core data types shared by the extractor, scheduler and renderer seam.

pub use crate::field::MaterialId;
pub use crate::octree::Aabb;

/// Vertex placement policy for one extraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MeshMode {
  /// Any sign change places a vertex at the cell center.
  Blocky,

  /// Vertex at the mean of all edge zero-crossings.
  #[default]
  SurfaceNet,

  /// Vertex minimizing the plane error of the crossings (QEF solve).
  DualContour,
}

/// What a dual-contouring cell falls back to when its solve leaves the cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DualContourFallback {
  /// Use the surface-net average of the crossings.
  #[default]
  SurfaceNet,

  /// Clamp the solved point into the cell box.
  Clamp,
}

/// Output vertex with all mesh attributes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
  /// Position in the object's local space.
  pub position: [f32; 3],

  /// Surface normal (unit vector, pointing out of the solid).
  pub normal: [f32; 3],

  /// Material of the solid side of the surface.
  pub material: u32,
}

impl Default for Vertex {
  fn default() -> Self {
    Self {
      position: [0.0; 3],
      normal: [0.0, 1.0, 0.0],
      material: 0,
    }
  }
}

/// Mesh generation result.
#[derive(Clone, Debug, Default)]
pub struct MeshOutput {
  /// Output vertices with positions, normals, and materials.
  pub vertices: Vec<Vertex>,

  /// Triangle indices (3 indices per triangle).
  pub indices: Vec<u32>,

  /// Bounding box encompassing all vertices.
  pub bounds: Aabb,
}

impl MeshOutput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Clear all buffers, preserving capacity.
  pub fn clear(&mut self) {
    self.vertices.clear();
    self.indices.clear();
    self.bounds = Aabb::empty();
  }

  /// Returns true if no triangles were generated.
  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  /// Number of triangles in the mesh.
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }
}

/// Configuration for one extraction pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractConfig {
  /// Vertex placement policy.
  pub mode: MeshMode,

  /// Scales the gradient sample offset used for vertex normals.
  /// The offset is `min(cell_size) * max(normal_smoothness, 0.01)`.
  pub normal_smoothness: f32,

  /// Emit unshared vertices carrying per-face normals.
  pub flat_shading: bool,

  /// Dual-contouring fallback policy.
  pub dc_fallback: DualContourFallback,

  /// How far (in fractions of a cell) a solved vertex may leave its cell
  /// before the fallback is applied.
  pub dc_tolerance: f32,

  /// Pull towards the mass point in the QEF solve.
  pub qef_regularization: f32,

  /// Extra sample layers on each side of the region.
  ///
  /// With a margin, quads on the region's low faces are owned by this region
  /// and quads on its high faces by the neighbour, so adjacent nodes stitch
  /// without duplicates.
  pub margin: u32,
}

impl Default for ExtractConfig {
  fn default() -> Self {
    Self {
      mode: MeshMode::SurfaceNet,
      normal_smoothness: 1.0,
      flat_shading: false,
      dc_fallback: DualContourFallback::SurfaceNet,
      dc_tolerance: 0.25,
      qef_regularization: 0.05,
      margin: 0,
    }
  }
}

impl ExtractConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_mode(mut self, mode: MeshMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn with_normal_smoothness(mut self, smoothness: f32) -> Self {
    self.normal_smoothness = smoothness;
    self
  }

  pub fn with_flat_shading(mut self, flat: bool) -> Self {
    self.flat_shading = flat;
    self
  }

  pub fn with_dc_fallback(mut self, fallback: DualContourFallback) -> Self {
    self.dc_fallback = fallback;
    self
  }

  pub fn with_dc_tolerance(mut self, tolerance: f32) -> Self {
    self.dc_tolerance = tolerance;
    self
  }

  pub fn with_qef_regularization(mut self, regularization: f32) -> Self {
    self.qef_regularization = regularization;
    self
  }

  pub fn with_margin(mut self, margin: u32) -> Self {
    self.margin = margin;
    self
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

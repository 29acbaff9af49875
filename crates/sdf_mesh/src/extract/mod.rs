//! Isosurface extraction from a sampled density field.
//!
//! ```text
//!   ┌──────────────┐    ┌────────────────┐    ┌──────────────┐    ┌──────────┐
//!   │ sample_grid  │ →  │ place_vertices │ →  │ stitch_quads │ →  │ finalize │
//!   │ 1 call/point │    │ 1 vertex/cell  │    │ 1 quad/edge  │    │ pack     │
//!   └──────────────┘    └────────────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! The field is evaluated once per grid point and cached; corners are read
//! from the cache, never re-sampled. Each cell with a sign change on any of
//! its edges gets one vertex, placed by the configured [`MeshMode`]. Each grid
//! edge with a sign change then emits a quad joining the vertices of the four
//! cells around it, wound so its front faces the outside (positive) end.
//!
//! With a margin, the sampled grid extends `margin` points past the region on
//! each side. Edge ownership is half-open, so regions that share a face never
//! both emit the quads lying on it.
//!
//! [`MeshMode`]: crate::types::MeshMode

pub mod cell_map;
pub mod placement;
pub mod qef;
pub mod tables;

use glam::{UVec3, Vec3};

pub use cell_map::{cell_key, CellVertexMap, DenseCellMap, HashCellMap, MAX_GRID_EXTENT};
pub use placement::{place_vertex, CellCorners, Placement};
pub use qef::Qef;

use crate::error::{Result, SdfMeshError};
use crate::field::{self, DensityField, Sample};
use crate::octree::Aabb;
use crate::types::{ExtractConfig, MeshOutput, Vertex};
use tables::{AXIS_STEPS, CORNER_OFFSETS};

// =============================================================================
// Region
// =============================================================================

/// Axis-aligned region sampled by one extraction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtractRegion {
  /// Minimum corner of the region (grid point at index `margin`).
  pub origin: Vec3,
  /// Size of one cell.
  pub cell_size: Vec3,
  /// Number of cells per axis.
  pub resolution: UVec3,
}

impl ExtractRegion {
  pub fn new(origin: Vec3, cell_size: Vec3, resolution: UVec3) -> Result<Self> {
    validate_resolution(resolution)?;
    if !cell_size.is_finite() || !cell_size.cmpgt(Vec3::ZERO).all() {
      return Err(SdfMeshError::InvalidCellSize(cell_size));
    }
    if !origin.is_finite() {
      return Err(SdfMeshError::InvalidBounds {
        min: origin,
        max: origin + cell_size * resolution.as_vec3(),
      });
    }
    Ok(Self {
      origin,
      cell_size,
      resolution,
    })
  }

  /// Region spanning `bounds` with `resolution` cells per axis.
  pub fn from_bounds(bounds: &Aabb, resolution: UVec3) -> Result<Self> {
    validate_bounds(bounds.min, bounds.max)?;
    validate_resolution(resolution)?;
    Self::new(bounds.min, bounds.size() / resolution.as_vec3(), resolution)
  }

  pub fn bounds(&self) -> Aabb {
    Aabb::new(self.origin, self.origin + self.cell_size * self.resolution.as_vec3())
  }

  /// Grid points per axis including the margin on both sides.
  #[inline]
  pub fn grid_dims(&self, margin: u32) -> UVec3 {
    self.resolution + UVec3::splat(1 + 2 * margin)
  }

  /// World position of a grid point.
  #[inline]
  pub fn grid_point(&self, margin: u32, point: UVec3) -> Vec3 {
    self.origin + (point.as_vec3() - Vec3::splat(margin as f32)) * self.cell_size
  }
}

/// At least two cells per axis, and small enough for the cell key.
pub fn validate_resolution(resolution: UVec3) -> Result<()> {
  if resolution.cmplt(UVec3::splat(2)).any() {
    return Err(SdfMeshError::ResolutionTooSmall(resolution));
  }
  if resolution.max_element() >= MAX_GRID_EXTENT {
    return Err(SdfMeshError::ResolutionTooLarge(resolution));
  }
  Ok(())
}

pub fn validate_bounds(min: Vec3, max: Vec3) -> Result<()> {
  if min.is_finite() && max.is_finite() && min.cmplt(max).all() {
    Ok(())
  } else {
    Err(SdfMeshError::InvalidBounds { min, max })
  }
}

// =============================================================================
// Observer, scratch and stats
// =============================================================================

/// Debug hook notified as vertices and quads are produced.
///
/// Indices refer to the pass's vertex buffer, before [`finalize`] compacts it.
pub trait ExtractionObserver {
  fn on_cell_vertex(&mut self, _index: u32, _cell: UVec3, _position: Vec3, _normal: Vec3) {}

  fn on_quad(&mut self, _vertices: [u32; 4]) {}
}

impl ExtractionObserver for () {}

/// Scratch buffers for one extraction pass.
#[derive(Debug, Default)]
pub struct ExtractScratch<M> {
  /// Cached field samples, x fastest.
  pub samples: Vec<Sample>,
  pub vertices: Vec<Vertex>,
  pub indices: Vec<u32>,
  pub cells: M,
}

impl<M: CellVertexMap> ExtractScratch<M> {
  pub fn new(cells: M) -> Self {
    Self {
      samples: Vec::new(),
      vertices: Vec::new(),
      indices: Vec::new(),
      cells,
    }
  }
}

/// Counters from one extraction pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractStats {
  pub grid_points: usize,
  pub vertices: usize,
  pub triangles: usize,
  /// Dual-contouring cells that used the fallback placement.
  pub dc_fallbacks: usize,
}

// =============================================================================
// Entry points
// =============================================================================

/// Extract a mesh in one call, using a hashed cell map.
pub fn extract<F: DensityField + ?Sized>(
  field: &F,
  region: &ExtractRegion,
  config: &ExtractConfig,
) -> Result<MeshOutput> {
  extract_with_observer(field, region, config, &mut ())
}

pub fn extract_with_observer<F, O>(
  field: &F,
  region: &ExtractRegion,
  config: &ExtractConfig,
  observer: &mut O,
) -> Result<MeshOutput>
where
  F: DensityField + ?Sized,
  O: ExtractionObserver,
{
  let mut scratch = ExtractScratch::new(HashCellMap::new());
  extract_into(field, region, config, &mut scratch, observer)?;
  Ok(finalize(&scratch.vertices, &scratch.indices, config.flat_shading))
}

/// Run sampling, vertex placement and quad stitching into `scratch`.
///
/// Leaves the raw vertex and index buffers in `scratch`; call [`finalize`] to
/// pack them into a [`MeshOutput`].
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "extract"))]
pub fn extract_into<F, M, O>(
  field: &F,
  region: &ExtractRegion,
  config: &ExtractConfig,
  scratch: &mut ExtractScratch<M>,
  observer: &mut O,
) -> Result<ExtractStats>
where
  F: DensityField + ?Sized,
  M: CellVertexMap,
  O: ExtractionObserver,
{
  debug_assert!(
    validate_resolution(region.resolution).is_ok(),
    "extraction requested with resolution {}",
    region.resolution
  );
  validate_resolution(region.resolution)?;
  if config.margin >= MAX_GRID_EXTENT {
    return Err(SdfMeshError::ResolutionTooLarge(region.resolution));
  }
  let dims = region.grid_dims(config.margin);
  if dims.max_element() > MAX_GRID_EXTENT {
    return Err(SdfMeshError::ResolutionTooLarge(region.resolution));
  }

  sample_grid(field, region, config.margin, &mut scratch.samples);

  let grid = Grid {
    samples: &scratch.samples,
    dims,
  };
  scratch.cells.reset(dims);
  scratch.vertices.clear();
  scratch.indices.clear();

  let dc_fallbacks = place_vertices(
    field,
    region,
    config,
    &grid,
    &mut scratch.cells,
    &mut scratch.vertices,
    observer,
  );
  stitch_quads(region, config, &grid, &scratch.cells, &mut scratch.indices, observer);

  Ok(ExtractStats {
    grid_points: scratch.samples.len(),
    vertices: scratch.vertices.len(),
    triangles: scratch.indices.len() / 3,
    dc_fallbacks,
  })
}

// =============================================================================
// Stages
// =============================================================================

/// Read-only view of the cached samples.
struct Grid<'a> {
  samples: &'a [Sample],
  dims: UVec3,
}

impl Grid<'_> {
  #[inline]
  fn at(&self, p: UVec3) -> Sample {
    debug_assert!(p.cmplt(self.dims).all());
    let index =
      p.x as usize + self.dims.x as usize * (p.y as usize + self.dims.y as usize * p.z as usize);
    self.samples[index]
  }
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "sample_grid"))]
fn sample_grid<F: DensityField + ?Sized>(
  field: &F,
  region: &ExtractRegion,
  margin: u32,
  samples: &mut Vec<Sample>,
) {
  let dims = region.grid_dims(margin);
  samples.clear();
  samples.reserve(dims.x as usize * dims.y as usize * dims.z as usize);

  for z in 0..dims.z {
    for y in 0..dims.y {
      for x in 0..dims.x {
        let p = region.grid_point(margin, UVec3::new(x, y, z));
        samples.push(field::sample_sanitized(field, p));
      }
    }
  }
}

/// Returns the number of dual-contouring fallbacks.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "place_vertices"))]
fn place_vertices<F, M, O>(
  field: &F,
  region: &ExtractRegion,
  config: &ExtractConfig,
  grid: &Grid<'_>,
  cells: &mut M,
  vertices: &mut Vec<Vertex>,
  observer: &mut O,
) -> usize
where
  F: DensityField + ?Sized,
  M: CellVertexMap,
  O: ExtractionObserver,
{
  let margin = config.margin;
  // Cells touched by owned edges.
  let lo = UVec3::splat(margin.max(1) - 1);
  let hi = UVec3::splat(margin) + region.resolution - UVec3::ONE;

  let min_cell = region.cell_size.min_element();
  let normal_delta = min_cell * config.normal_smoothness.max(0.01);
  let crossing_normal_delta = min_cell * 0.1;

  let mut fallbacks = 0;
  for z in lo.z..=hi.z {
    for y in lo.y..=hi.y {
      for x in lo.x..=hi.x {
        let cell = UVec3::new(x, y, z);
        let corners = CellCorners {
          samples: std::array::from_fn(|i| grid.at(cell + CORNER_OFFSETS[i])),
          positions: std::array::from_fn(|i| region.grid_point(margin, cell + CORNER_OFFSETS[i])),
        };

        let mask = corners.inside_mask();
        if mask == 0 || mask == 0xFF {
          continue;
        }

        let placement = place_vertex(field, &corners, config, crossing_normal_delta);
        fallbacks += placement.fell_back as usize;

        let normal = field::gradient(field, placement.position, normal_delta);
        let index = vertices.len() as u32;
        vertices.push(Vertex {
          position: placement.position.to_array(),
          normal: normal.to_array(),
          material: corners.dominant_material().0 as u32,
        });
        cells.insert(cell, index);
        observer.on_cell_vertex(index, cell, placement.position, normal);
      }
    }
  }
  fallbacks
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "stitch_quads"))]
fn stitch_quads<M, O>(
  region: &ExtractRegion,
  config: &ExtractConfig,
  grid: &Grid<'_>,
  cells: &M,
  indices: &mut Vec<u32>,
  observer: &mut O,
) where
  M: CellVertexMap,
  O: ExtractionObserver,
{
  let margin = config.margin;
  let hi = UVec3::splat(margin) + region.resolution - UVec3::ONE;

  for axis in 0..3 {
    let u = AXIS_STEPS[(axis + 1) % 3];
    let v = AXIS_STEPS[(axis + 2) % 3];
    // Quads need a cell on the low side of the edge along u and v.
    let mut lo = UVec3::splat(margin.max(1));
    lo[axis] = margin;

    for z in lo.z..=hi.z {
      for y in lo.y..=hi.y {
        for x in lo.x..=hi.x {
          let p = UVec3::new(x, y, z);
          let near_outside = grid.at(p).is_outside();
          let far_outside = grid.at(p + AXIS_STEPS[axis]).is_outside();
          if near_outside == far_outside {
            continue;
          }

          // Counter-clockwise around +axis.
          let quad_cells = [p - u - v, p - v, p, p - u];
          let mut quad = [0u32; 4];
          let mut complete = true;
          for (slot, cell) in quad.iter_mut().zip(quad_cells) {
            match cells.get(cell) {
              Some(index) => *slot = index,
              None => complete = false,
            }
          }
          if !complete {
            debug_assert!(false, "crossing edge at {p} without four cell vertices");
            continue;
          }

          if !far_outside {
            quad = [quad[0], quad[3], quad[2], quad[1]];
          }
          indices.extend_from_slice(&[quad[0], quad[1], quad[2], quad[2], quad[3], quad[0]]);
          observer.on_quad(quad);
        }
      }
    }
  }
}

/// Pack raw buffers into a mesh.
///
/// Drops vertices no triangle references and computes bounds. With
/// `flat_shading`, every triangle gets its own three vertices carrying the
/// face normal.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "finalize"))]
pub fn finalize(vertices: &[Vertex], indices: &[u32], flat_shading: bool) -> MeshOutput {
  let mut output = MeshOutput::new();
  if indices.is_empty() {
    return output;
  }

  if flat_shading {
    output.vertices.reserve(indices.len());
    for tri in indices.chunks_exact(3) {
      let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| vertices[i as usize]);
      let pa = Vec3::from_array(a.position);
      let pb = Vec3::from_array(b.position);
      let pc = Vec3::from_array(c.position);
      let face = (pb - pa).cross(pc - pa).normalize_or(Vec3::from_array(a.normal));
      for mut vertex in [a, b, c] {
        vertex.normal = face.to_array();
        output.bounds.encapsulate(Vec3::from_array(vertex.position));
        output.indices.push(output.vertices.len() as u32);
        output.vertices.push(vertex);
      }
    }
    return output;
  }

  let mut remap = vec![u32::MAX; vertices.len()];
  for &index in indices {
    remap[index as usize] = 0;
  }
  for (old, slot) in remap.iter_mut().enumerate() {
    if *slot == 0 {
      *slot = output.vertices.len() as u32;
      let vertex = vertices[old];
      output.bounds.encapsulate(Vec3::from_array(vertex.position));
      output.vertices.push(vertex);
    }
  }
  output.indices = indices.iter().map(|&i| remap[i as usize]).collect();
  output
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;

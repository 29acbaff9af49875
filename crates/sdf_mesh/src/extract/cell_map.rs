//! Cell-to-vertex lookup used while stitching quads.
//!
//! One vertex per sign-changing cell, written once during vertex placement
//! and read back by the four quads around each crossing edge.

use std::collections::HashMap;

use glam::UVec3;

/// Bits reserved per axis in a packed cell key.
pub const KEY_BITS_PER_AXIS: u32 = 20;

/// Largest grid extent (in points) addressable by [`cell_key`].
pub const MAX_GRID_EXTENT: u32 = 1 << KEY_BITS_PER_AXIS;

/// Pack a cell coordinate into a 64-bit key, 20 bits per axis.
#[inline]
pub fn cell_key(cell: UVec3) -> u64 {
  const MASK: u64 = (1 << KEY_BITS_PER_AXIS) - 1;
  debug_assert!(cell.max_element() < MAX_GRID_EXTENT);
  (cell.x as u64 & MASK)
    | ((cell.y as u64 & MASK) << KEY_BITS_PER_AXIS)
    | ((cell.z as u64 & MASK) << (KEY_BITS_PER_AXIS * 2))
}

/// Cell coordinate to vertex index map for one extraction pass.
pub trait CellVertexMap {
  /// Forget all entries and prepare for a grid of `dims` points.
  fn reset(&mut self, dims: UVec3);

  /// Record the vertex placed in `cell`. A cell is written at most once.
  fn insert(&mut self, cell: UVec3, vertex: u32);

  fn get(&self, cell: UVec3) -> Option<u32>;
}

/// Hashed map keyed by [`cell_key`]. Memory scales with the surface, not the grid.
#[derive(Debug, Default)]
pub struct HashCellMap {
  map: HashMap<u64, u32>,
}

impl HashCellMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.map.len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }
}

impl CellVertexMap for HashCellMap {
  fn reset(&mut self, _dims: UVec3) {
    self.map.clear();
  }

  #[inline]
  fn insert(&mut self, cell: UVec3, vertex: u32) {
    let previous = self.map.insert(cell_key(cell), vertex);
    debug_assert!(previous.is_none(), "cell {cell} placed twice");
  }

  #[inline]
  fn get(&self, cell: UVec3) -> Option<u32> {
    self.map.get(&cell_key(cell)).copied()
  }
}

/// Dense lookup buffer, one slot per grid point.
///
/// Backs the working set; the buffer keeps its allocation across passes.
#[derive(Debug, Default)]
pub struct DenseCellMap {
  dims: UVec3,
  slots: Vec<u32>,
}

impl DenseCellMap {
  const EMPTY: u32 = u32::MAX;

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      dims: UVec3::ZERO,
      slots: Vec::with_capacity(capacity),
    }
  }

  pub fn capacity(&self) -> usize {
    self.slots.capacity()
  }

  #[inline]
  fn index(&self, cell: UVec3) -> usize {
    debug_assert!(cell.cmplt(self.dims).all());
    cell.x as usize + self.dims.x as usize * (cell.y as usize + self.dims.y as usize * cell.z as usize)
  }
}

impl CellVertexMap for DenseCellMap {
  fn reset(&mut self, dims: UVec3) {
    self.dims = dims;
    self.slots.clear();
    self.slots.resize(dims.x as usize * dims.y as usize * dims.z as usize, Self::EMPTY);
  }

  #[inline]
  fn insert(&mut self, cell: UVec3, vertex: u32) {
    let index = self.index(cell);
    debug_assert_eq!(self.slots[index], Self::EMPTY, "cell {cell} placed twice");
    self.slots[index] = vertex;
  }

  #[inline]
  fn get(&self, cell: UVec3) -> Option<u32> {
    match self.slots[self.index(cell)] {
      Self::EMPTY => None,
      vertex => Some(vertex),
    }
  }
}

#[cfg(test)]
#[path = "cell_map_test.rs"]
mod cell_map_test;

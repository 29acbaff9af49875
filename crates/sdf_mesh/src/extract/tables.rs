//! Cube corner and edge tables.
//!
//! Corner `i` sits at `(x=bit0, y=bit1, z=bit2)` of the unit cell.

use glam::UVec3;

/// Integer offsets of the eight cell corners.
pub const CORNER_OFFSETS: [UVec3; 8] = [
  UVec3::new(0, 0, 0), // 0b000
  UVec3::new(1, 0, 0), // 0b001
  UVec3::new(0, 1, 0), // 0b010
  UVec3::new(1, 1, 0), // 0b011
  UVec3::new(0, 0, 1), // 0b100
  UVec3::new(1, 0, 1), // 0b101
  UVec3::new(0, 1, 1), // 0b110
  UVec3::new(1, 1, 1), // 0b111
];

/// The 12 cube edges as corner index pairs.
pub const CUBE_EDGES: [[usize; 2]; 12] = [
  [0, 1], // X axis at Y=0, Z=0
  [0, 2], // Y axis at X=0, Z=0
  [0, 4], // Z axis at X=0, Y=0
  [1, 3], // Y axis at X=1, Z=0
  [1, 5], // Z axis at X=1, Y=0
  [2, 3], // X axis at Y=1, Z=0
  [2, 6], // Z axis at X=0, Y=1
  [3, 7], // Z axis at X=1, Y=1
  [4, 5], // X axis at Y=0, Z=1
  [4, 6], // Y axis at X=0, Z=1
  [5, 7], // Y axis at X=1, Z=1
  [6, 7], // X axis at Y=1, Z=1
];

/// Unit step along each axis.
pub const AXIS_STEPS: [UVec3; 3] = [UVec3::X, UVec3::Y, UVec3::Z];

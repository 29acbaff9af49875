//! Axis-aligned bounding box used for octree nodes and mesh extents.

use glam::Vec3;

/// Single-precision axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
	/// Minimum corner (inclusive).
	pub min: Vec3,
	/// Maximum corner.
	pub max: Vec3,
}

impl Aabb {
	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: Vec3, max: Vec3) -> Self {
		debug_assert!(min.cmple(max).all(), "AABB min must be <= max on all axes");
		Self { min, max }
	}

	/// Create AABB with inverted extents (ready for encapsulation).
	pub fn empty() -> Self {
		Self {
			min: Vec3::INFINITY,
			max: Vec3::NEG_INFINITY,
		}
	}

	/// Create a new AABB from center and half-extents.
	pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
		Self {
			min: center - half_extents,
			max: center + half_extents,
		}
	}

	/// Expand AABB to include a point.
	#[inline]
	pub fn encapsulate(&mut self, point: Vec3) {
		self.min = self.min.min(point);
		self.max = self.max.max(point);
	}

	/// Check if AABB is valid (min <= max on all axes).
	#[inline]
	pub fn is_valid(&self) -> bool {
		self.min.cmple(self.max).all()
	}

	#[inline]
	pub fn size(&self) -> Vec3 {
		self.max - self.min
	}

	#[inline]
	pub fn center(&self) -> Vec3 {
		(self.min + self.max) * 0.5
	}

	/// Closed containment test.
	#[inline]
	pub fn contains_point(&self, point: Vec3) -> bool {
		point.cmpge(self.min).all() && point.cmple(self.max).all()
	}

	/// Half-open containment test, `[min, max)` on every axis.
	///
	/// Sibling octants tile their parent exactly under this test.
	#[inline]
	pub fn contains_point_half_open(&self, point: Vec3) -> bool {
		point.cmpge(self.min).all() && point.cmplt(self.max).all()
	}

	/// Point of the box closest to `point` (the point itself when inside).
	#[inline]
	pub fn closest_point(&self, point: Vec3) -> Vec3 {
		point.clamp(self.min, self.max)
	}

	/// Distance from `point` to the closest point of the box (zero inside).
	#[inline]
	pub fn distance_to_point(&self, point: Vec3) -> f32 {
		self.closest_point(point).distance(point)
	}

	/// Bounds of one octant.
	///
	/// Octant: 0-7 where bits represent +X, +Y, +Z offsets:
	/// - bit 0: X offset
	/// - bit 1: Y offset
	/// - bit 2: Z offset
	pub fn octant(&self, octant: u8) -> Aabb {
		debug_assert!(octant < 8);
		let half = self.size() * 0.5;
		let offset = Vec3::new(
			(octant & 1) as f32,
			((octant >> 1) & 1) as f32,
			((octant >> 2) & 1) as f32,
		);
		let min = self.min + half * offset;
		// Snap the far edge to the parent so siblings share exact faces.
		let max = Vec3::select(offset.cmpgt(Vec3::ZERO), self.max, min + half);
		Aabb { min, max }
	}
}

impl Default for Aabb {
	fn default() -> Self {
		Self::empty()
	}
}

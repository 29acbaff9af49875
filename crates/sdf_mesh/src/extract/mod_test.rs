use std::collections::{HashMap, HashSet};

use super::*;
use crate::field::{BoxField, HalfSpace, MaterialId, Sphere, TiltedPlane};
use crate::types::{DualContourFallback, MeshMode};

fn unit_region(resolution: u32) -> ExtractRegion {
  let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
  ExtractRegion::from_bounds(&bounds, UVec3::splat(resolution)).unwrap()
}

fn config(mode: MeshMode) -> ExtractConfig {
  ExtractConfig::default().with_mode(mode)
}

fn positions(mesh: &MeshOutput) -> Vec<Vec3> {
  mesh.vertices.iter().map(|v| Vec3::from_array(v.position)).collect()
}

/// Count how many triangles use each undirected edge.
fn edge_usage(mesh: &MeshOutput) -> HashMap<(u32, u32), usize> {
  let mut usage = HashMap::new();
  for tri in mesh.indices.chunks_exact(3) {
    for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
      *usage.entry((a.min(b), a.max(b))).or_insert(0) += 1;
    }
  }
  usage
}

fn face_normal(mesh: &MeshOutput, tri: &[u32]) -> Vec3 {
  let p = |i: u32| Vec3::from_array(mesh.vertices[i as usize].position);
  (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0]))
}

// =============================================================================
// Region validation
// =============================================================================

#[test]
fn test_region_rejects_small_resolution() {
  let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
  let err = ExtractRegion::from_bounds(&bounds, UVec3::new(8, 1, 8)).unwrap_err();
  assert_eq!(err, SdfMeshError::ResolutionTooSmall(UVec3::new(8, 1, 8)));
}

#[test]
fn test_region_rejects_inverted_bounds() {
  let bounds = Aabb {
    min: Vec3::ONE,
    max: Vec3::new(2.0, 0.0, 2.0),
  };
  assert!(matches!(
    ExtractRegion::from_bounds(&bounds, UVec3::splat(4)),
    Err(SdfMeshError::InvalidBounds { .. })
  ));
}

#[test]
fn test_region_rejects_bad_cell_size() {
  let err = ExtractRegion::new(Vec3::ZERO, Vec3::new(0.1, 0.0, 0.1), UVec3::splat(4)).unwrap_err();
  assert!(matches!(err, SdfMeshError::InvalidCellSize(_)));
}

#[test]
fn test_region_geometry() {
  let region = unit_region(8);
  assert_eq!(region.cell_size, Vec3::splat(0.25));
  assert_eq!(region.grid_dims(0), UVec3::splat(9));
  assert_eq!(region.grid_dims(2), UVec3::splat(13));
  assert_eq!(region.grid_point(0, UVec3::ZERO), Vec3::splat(-1.0));
  assert_eq!(region.grid_point(2, UVec3::splat(2)), Vec3::splat(-1.0));
  assert_eq!(region.bounds().max, Vec3::splat(1.0));
}

// =============================================================================
// Empty output
// =============================================================================

#[test]
fn test_empty_field_produces_no_mesh() {
  let air = |_: Vec3| Sample::new(1.0, MaterialId(0));
  let solid = |_: Vec3| Sample::new(-1.0, MaterialId(0));
  for mode in [MeshMode::Blocky, MeshMode::SurfaceNet, MeshMode::DualContour] {
    let mesh = extract(&air, &unit_region(8), &config(mode)).unwrap();
    assert!(mesh.is_empty());
    assert!(mesh.vertices.is_empty());

    let mesh = extract(&solid, &unit_region(8), &config(mode)).unwrap();
    assert!(mesh.is_empty());
  }
}

#[test]
fn test_non_finite_samples_read_as_air() {
  let broken = |_: Vec3| Sample::new(f32::NAN, MaterialId(0));
  let mesh = extract(&broken, &unit_region(4), &config(MeshMode::SurfaceNet)).unwrap();
  assert!(mesh.is_empty());

  // A NaN pocket inside a half-space can only add air, never a phantom surface
  // where both neighbours agree.
  let pocket = |p: Vec3| {
    if p.y < -0.5 && p.x.abs() < 0.1 {
      Sample::new(f32::NAN, MaterialId(0))
    } else {
      HalfSpace::new(0.0).sample(p)
    }
  };
  let mesh = extract(&pocket, &unit_region(8), &config(MeshMode::SurfaceNet)).unwrap();
  for v in &mesh.vertices {
    assert!(v.position.iter().all(|c| c.is_finite()));
  }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_flat_half_space_blocky() {
  let mesh = extract(&HalfSpace::new(0.0), &unit_region(8), &config(MeshMode::Blocky)).unwrap();

  // One layer of 8x8 boundary cells at y in [0, 0.25].
  assert_eq!(mesh.vertices.len(), 64);
  for v in &mesh.vertices {
    assert_eq!(v.position[1], 0.125);
    assert!((Vec3::from_array(v.normal) - Vec3::Y).length() < 1e-5);
  }

  // 7x7 interior crossing edges, two triangles each.
  assert_eq!(mesh.triangle_count(), 98);
  for tri in mesh.indices.chunks_exact(3) {
    assert!(face_normal(&mesh, tri).y > 0.0, "triangle faces into the solid");
  }
}

#[test]
fn test_sphere_surface_net_is_watertight() {
  let sphere = Sphere::new(0.5);
  let mesh = extract(&sphere, &unit_region(16), &config(MeshMode::SurfaceNet)).unwrap();

  assert!((150..=600).contains(&mesh.vertices.len()), "{} vertices", mesh.vertices.len());
  for (edge, count) in edge_usage(&mesh) {
    assert_eq!(count, 2, "edge {edge:?} used by {count} triangles");
  }

  // Consistent orientation: every directed edge appears exactly once.
  let mut directed = HashSet::new();
  for tri in mesh.indices.chunks_exact(3) {
    for edge in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
      assert!(directed.insert(edge), "directed edge {edge:?} repeated");
    }
  }

  for tri in mesh.indices.chunks_exact(3) {
    let centroid = tri
      .iter()
      .map(|&i| Vec3::from_array(mesh.vertices[i as usize].position))
      .sum::<Vec3>()
      / 3.0;
    assert!(face_normal(&mesh, tri).dot(centroid) > 0.0, "triangle faces inward");
  }
}

#[test]
fn test_sphere_vertex_count_matches_reference() {
  use fast_surface_nets::ndshape::{ConstShape, ConstShape3u32};
  use fast_surface_nets::{surface_nets, SurfaceNetsBuffer};

  type Shape = ConstShape3u32<17, 17, 17>;
  let sphere = Sphere::new(0.5);
  let region = unit_region(16);

  // The reference counts `d < 0` as inside; negating the field gives the same
  // set of sign-changing cells as `d <= 0`.
  let mut sdf = [0.0f32; Shape::USIZE];
  for i in 0u32..Shape::SIZE {
    let [x, y, z] = Shape::delinearize(i);
    let p = region.grid_point(0, UVec3::new(x, y, z));
    sdf[i as usize] = -sphere.sample(p).distance;
  }
  let mut buffer = SurfaceNetsBuffer::default();
  surface_nets(&sdf, &Shape {}, [0; 3], [16; 3], &mut buffer);

  let mesh = extract(&sphere, &region, &config(MeshMode::SurfaceNet)).unwrap();
  let reference = buffer.positions.len() as i64;
  let ours = mesh.vertices.len() as i64;
  assert!(
    (ours - reference).abs() * 50 <= reference,
    "ours {ours}, reference {reference}"
  );
}

// =============================================================================
// Invariants
// =============================================================================

#[test]
fn test_modes_share_topology() {
  let sphere = Sphere::new(0.6).with_center(Vec3::new(0.05, -0.1, 0.02));
  let region = unit_region(12);
  let meshes: Vec<_> = [MeshMode::Blocky, MeshMode::SurfaceNet, MeshMode::DualContour]
    .into_iter()
    .map(|mode| extract(&sphere, &region, &config(mode)).unwrap())
    .collect();

  for mesh in &meshes[1..] {
    assert_eq!(mesh.vertices.len(), meshes[0].vertices.len());
    assert_eq!(mesh.indices, meshes[0].indices);
  }
}

#[test]
fn test_extraction_is_reproducible() {
  let field = TiltedPlane::new().with_angle_degrees(30.0).with_height(0.1);
  let region = unit_region(10);
  for mode in [MeshMode::Blocky, MeshMode::SurfaceNet] {
    let a = extract(&field, &region, &config(mode)).unwrap();
    let b = extract(&field, &region, &config(mode)).unwrap();
    assert_eq!(a.vertices, b.vertices);
    assert_eq!(a.indices, b.indices);
  }

  let a = extract(&field, &region, &config(MeshMode::DualContour)).unwrap();
  let b = extract(&field, &region, &config(MeshMode::DualContour)).unwrap();
  assert_eq!(a.vertices.len(), b.vertices.len());
  assert_eq!(a.triangle_count(), b.triangle_count());
}

#[derive(Default)]
struct Recorder {
  cells: HashMap<u32, UVec3>,
  quads: Vec<[u32; 4]>,
}

impl ExtractionObserver for Recorder {
  fn on_cell_vertex(&mut self, index: u32, cell: UVec3, _position: Vec3, _normal: Vec3) {
    assert!(self.cells.insert(index, cell).is_none());
  }

  fn on_quad(&mut self, vertices: [u32; 4]) {
    self.quads.push(vertices);
  }
}

#[test]
fn test_quads_only_join_sign_changing_cells() {
  let field = Sphere::new(0.45).with_center(Vec3::new(0.1, 0.0, -0.05));
  let region = unit_region(10);
  let mut recorder = Recorder::default();
  let mesh =
    extract_with_observer(&field, &region, &config(MeshMode::SurfaceNet), &mut recorder).unwrap();

  assert_eq!(recorder.quads.len() * 2, mesh.triangle_count());
  for quad in &recorder.quads {
    let cells: HashSet<UVec3> = quad.iter().map(|i| recorder.cells[i]).collect();
    assert_eq!(cells.len(), 4, "quad reuses a cell");
    for cell in cells {
      let inside = CORNER_OFFSETS
        .iter()
        .filter(|&&o| !field.sample(region.grid_point(0, cell + o)).is_outside())
        .count();
      assert!(inside > 0 && inside < 8, "cell {cell} has no sign change");
    }
  }
}

#[test]
fn test_surface_net_vertices_stay_in_their_cell() {
  let field = Sphere::new(0.7);
  let region = unit_region(8);
  let mut recorder = Recorder::default();
  let mut scratch = ExtractScratch::new(HashCellMap::new());
  extract_into(&field, &region, &config(MeshMode::SurfaceNet), &mut scratch, &mut recorder)
    .unwrap();

  for (index, cell) in &recorder.cells {
    let lo = region.grid_point(0, *cell);
    let hi = lo + region.cell_size;
    let p = Vec3::from_array(scratch.vertices[*index as usize].position);
    assert!(p.cmpge(lo - 1e-5).all() && p.cmple(hi + 1e-5).all());
  }
}

#[test]
fn test_dual_contour_respects_tolerance() {
  let field = BoxField::new(Vec3::splat(0.52)).with_center(Vec3::splat(0.03));
  let region = unit_region(9);
  for fallback in [DualContourFallback::SurfaceNet, DualContourFallback::Clamp] {
    let cfg = config(MeshMode::DualContour).with_dc_fallback(fallback);
    let mut recorder = Recorder::default();
    let mut scratch = ExtractScratch::new(HashCellMap::new());
    extract_into(&field, &region, &cfg, &mut scratch, &mut recorder).unwrap();

    let slack = region.cell_size * cfg.dc_tolerance;
    for (index, cell) in &recorder.cells {
      let lo = region.grid_point(0, *cell) - slack - 1e-5;
      let hi = region.grid_point(0, *cell) + region.cell_size + slack + 1e-5;
      let p = Vec3::from_array(scratch.vertices[*index as usize].position);
      assert!(p.cmpge(lo).all() && p.cmple(hi).all(), "{p} escaped cell {cell}");
    }
  }
}

#[test]
fn test_dual_contour_sharpens_box_corner() {
  let half = 0.55;
  let field = BoxField::new(Vec3::splat(half));
  let region = unit_region(8);
  let dc = extract(&field, &region, &config(MeshMode::DualContour)).unwrap();
  let sn = extract(&field, &region, &config(MeshMode::SurfaceNet)).unwrap();

  let corner = Vec3::splat(half);
  let nearest = |mesh: &MeshOutput| {
    positions(mesh)
      .into_iter()
      .map(|p| p.distance(corner))
      .fold(f32::INFINITY, f32::min)
  };
  assert!(nearest(&dc) < nearest(&sn), "dual contouring should reach the corner");
  assert!(nearest(&dc) < 0.05);
}

#[test]
fn test_dense_and_hashed_maps_agree() {
  let field = Sphere::new(0.5).with_center(Vec3::new(0.1, 0.2, 0.0));
  let region = unit_region(12);
  let cfg = config(MeshMode::DualContour).with_margin(1);

  let mut hashed = ExtractScratch::new(HashCellMap::new());
  let mut dense = ExtractScratch::new(DenseCellMap::with_capacity(16 * 16 * 16));
  let a = extract_into(&field, &region, &cfg, &mut hashed, &mut ()).unwrap();
  let b = extract_into(&field, &region, &cfg, &mut dense, &mut ()).unwrap();

  assert_eq!(a, b);
  assert_eq!(hashed.vertices, dense.vertices);
  assert_eq!(hashed.indices, dense.indices);
}

#[test]
fn test_margin_regions_tile_without_duplicates() {
  // Two halves of [-1, 1] along x must emit exactly the quads of the whole
  // when each owns its half-open share of the edges.
  let field = Sphere::new(0.55);
  let cfg = config(MeshMode::SurfaceNet).with_margin(1);
  let left = ExtractRegion::new(Vec3::splat(-1.0), Vec3::splat(0.125), UVec3::new(8, 16, 16)).unwrap();
  let right =
    ExtractRegion::new(Vec3::new(0.0, -1.0, -1.0), Vec3::splat(0.125), UVec3::new(8, 16, 16)).unwrap();
  let whole = ExtractRegion::new(Vec3::splat(-1.0), Vec3::splat(0.125), UVec3::new(16, 16, 16)).unwrap();

  let tris = |region: &ExtractRegion| extract(&field, region, &cfg).unwrap().triangle_count();
  assert_eq!(tris(&left) + tris(&right), tris(&whole));
  assert!(tris(&whole) > 0);
}

#[test]
fn test_material_from_inside_corners() {
  let field = |p: Vec3| {
    let material = if p.x < 0.0 { MaterialId(2) } else { MaterialId(5) };
    Sample::new(p.y, material)
  };
  let mesh = extract(&field, &unit_region(8), &config(MeshMode::SurfaceNet)).unwrap();
  for v in &mesh.vertices {
    let expected = if v.position[0] < 0.0 { 2 } else { 5 };
    assert_eq!(v.material, expected, "vertex at {:?}", v.position);
  }
}

#[test]
fn test_flat_shading_unshares_vertices() {
  let sphere = Sphere::new(0.5);
  let region = unit_region(8);
  let smooth = extract(&sphere, &region, &config(MeshMode::SurfaceNet)).unwrap();
  let flat = extract(&sphere, &region, &config(MeshMode::SurfaceNet).with_flat_shading(true)).unwrap();

  assert_eq!(flat.triangle_count(), smooth.triangle_count());
  assert_eq!(flat.vertices.len(), flat.indices.len());
  for tri in flat.indices.chunks_exact(3) {
    let n = Vec3::from_array(flat.vertices[tri[0] as usize].normal);
    assert_eq!(n, Vec3::from_array(flat.vertices[tri[1] as usize].normal));
    assert!(face_normal(&flat, tri).normalize().dot(n) > 0.999);
  }
}

#[test]
fn test_finalize_drops_unreferenced_vertices() {
  let vertex = |x: f32| Vertex {
    position: [x, 0.0, 0.0],
    ..Vertex::default()
  };
  let vertices = [vertex(0.0), vertex(1.0), vertex(2.0), vertex(3.0)];
  let mesh = finalize(&vertices, &[0, 2, 3], false);

  assert_eq!(mesh.vertices.len(), 3);
  assert_eq!(mesh.indices, vec![0, 1, 2]);
  assert_eq!(mesh.bounds.min.x, 0.0);
  assert_eq!(mesh.bounds.max.x, 3.0);

  assert!(finalize(&vertices, &[], false).is_empty());
}

#[test]
fn test_oversized_margin_is_rejected() {
  let err = extract(
    &HalfSpace::new(0.0),
    &unit_region(4),
    &ExtractConfig::default().with_margin(MAX_GRID_EXTENT),
  )
  .unwrap_err();
  assert!(matches!(err, SdfMeshError::ResolutionTooLarge(_)));
}

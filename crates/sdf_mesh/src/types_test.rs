use super::*;

#[test]
fn test_extract_config_defaults() {
  let config = ExtractConfig::default();
  assert_eq!(config.mode, MeshMode::SurfaceNet);
  assert_eq!(config.dc_fallback, DualContourFallback::SurfaceNet);
  assert_eq!(config.dc_tolerance, 0.25);
  assert_eq!(config.normal_smoothness, 1.0);
  assert_eq!(config.margin, 0);
  assert!(!config.flat_shading);
}

#[test]
fn test_extract_config_builders() {
  let config = ExtractConfig::new()
    .with_mode(MeshMode::DualContour)
    .with_dc_fallback(DualContourFallback::Clamp)
    .with_dc_tolerance(0.5)
    .with_margin(2)
    .with_flat_shading(true);

  assert_eq!(config.mode, MeshMode::DualContour);
  assert_eq!(config.dc_fallback, DualContourFallback::Clamp);
  assert_eq!(config.dc_tolerance, 0.5);
  assert_eq!(config.margin, 2);
  assert!(config.flat_shading);
}

#[test]
fn test_mesh_output_clear() {
  let mut output = MeshOutput::new();
  output.vertices.push(Vertex::default());
  output.indices.extend_from_slice(&[0, 0, 0]);
  output.bounds.encapsulate(glam::Vec3::ONE);
  assert_eq!(output.triangle_count(), 1);
  assert!(!output.is_empty());

  output.clear();
  assert!(output.is_empty());
  assert!(output.vertices.is_empty());
  assert!(!output.bounds.is_valid());
}

#[test]
fn test_vertex_layout() {
  assert_eq!(std::mem::size_of::<Vertex>(), 28);
  assert_eq!(Vertex::default().normal, [0.0, 1.0, 0.0]);
}

use super::*;

fn approx(a: Vec3, b: Vec3) -> bool {
  (a - b).length() < 1.0e-4
}

#[test]
fn test_empty_qef_has_no_solution() {
  let qef = Qef::new();
  assert_eq!(qef.mass_point(), None);
  assert_eq!(qef.solve(0.1), None);
}

#[test]
fn test_corner_of_three_planes() {
  let corner = Vec3::new(0.3, 0.4, 0.5);
  let mut qef = Qef::new();
  qef.add(Vec3::new(0.3, 0.0, 0.0), Vec3::X);
  qef.add(Vec3::new(0.0, 0.4, 0.0), Vec3::Y);
  qef.add(Vec3::new(0.0, 0.0, 0.5), Vec3::Z);

  let x = qef.solve(0.0).expect("well conditioned");
  assert!(approx(x, corner), "got {x}");
  assert!(qef.error_at(x) < 1.0e-6);
}

#[test]
fn test_regularization_biases_towards_mass_point() {
  let mut qef = Qef::new();
  qef.add(Vec3::new(0.3, 0.0, 0.0), Vec3::X);
  qef.add(Vec3::new(0.0, 0.4, 0.0), Vec3::Y);
  qef.add(Vec3::new(0.0, 0.0, 0.5), Vec3::Z);

  let exact = qef.solve(0.0).unwrap();
  let biased = qef.solve(0.5).unwrap();
  let mass = qef.mass_point().unwrap();
  assert!(biased.distance(mass) < exact.distance(mass));
}

#[test]
fn test_single_plane_is_singular_without_regularization() {
  let mut qef = Qef::new();
  qef.add(Vec3::new(0.0, 0.4, 0.0), Vec3::Y);
  qef.add(Vec3::new(1.0, 0.4, 0.0), Vec3::Y);
  assert_eq!(qef.solve(0.0), None);

  // Regularized: stays on the plane at the mass point.
  let x = qef.solve(0.05).expect("regularized");
  assert!(approx(x, Vec3::new(0.5, 0.4, 0.0)), "got {x}");
}

#[test]
fn test_sharp_edge_recovered() {
  // Two faces of a box meeting along the line x = 1, y = 1.
  let mut qef = Qef::new();
  qef.add(Vec3::new(1.0, 0.8, 0.2), Vec3::X);
  qef.add(Vec3::new(1.0, 0.7, 0.8), Vec3::X);
  qef.add(Vec3::new(0.8, 1.0, 0.2), Vec3::Y);
  qef.add(Vec3::new(0.7, 1.0, 0.8), Vec3::Y);

  let x = qef.solve(0.01).expect("regularized");
  assert!((x.x - 1.0).abs() < 1.0e-3 && (x.y - 1.0).abs() < 1.0e-3, "got {x}");
  assert!((x.z - 0.5).abs() < 1.0e-3, "free axis pinned to mass point, got {x}");
}

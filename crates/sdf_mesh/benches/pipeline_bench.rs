//! Pipeline benchmarks.
//!
//! Drives `SdfMeshSystem` from an empty octree until every node the LOD policy
//! wants has been built:
//! - **inline**: every stage on the calling thread
//! - **threaded**: extraction and finalize on rayon
//!
//! Each with two fields:
//! - **sphere**: compact surface, many empty nodes
//! - **terrain**: tilted ground plane crossing most of the volume

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Affine3A, UVec3, Vec3};
use sdf_mesh::{
  BuildScheduler, FieldHandle, LodTier, MeshOutput, ObjectDesc, RenderBackend, RenderMaterial,
  SchedulerConfig, SdfMeshSystem, Sphere, TiltedPlane,
};

/// Backend that keeps triangle counts and counts draws.
#[derive(Default)]
struct CountingBackend {
  draws: usize,
}

impl RenderBackend for CountingBackend {
  type Mesh = usize;

  fn create_mesh(&mut self, mesh: MeshOutput) -> Option<usize> {
    Some(mesh.triangle_count())
  }

  fn submit(&mut self, _: &Affine3A, mesh: &usize, _: RenderMaterial, _: Vec3, _: Vec3) {
    self.draws += 1;
    black_box(mesh);
  }
}

fn fields() -> [(&'static str, FieldHandle); 2] {
  [
    ("sphere", FieldHandle::thread_safe(Sphere::new(0.7))),
    (
      "terrain",
      FieldHandle::thread_safe(TiltedPlane::new().with_height(0.1).with_angle_degrees(20.0)),
    ),
  ]
}

fn desc(field: FieldHandle) -> ObjectDesc {
  ObjectDesc::new(field)
    .with_resolution(UVec3::splat(16))
    .with_max_depth(3)
    .with_lods(vec![LodTier::new(2, 1.0), LodTier::new(3, 0.5)])
}

/// Tick until nothing is requested or in flight; returns the tick count.
fn run_to_convergence(mut system: SdfMeshSystem<CountingBackend>, viewer: Vec3) -> usize {
  for tick in 1..100_000 {
    let stats = system.tick(viewer);
    if stats.requested == 0 && stats.in_flight == 0 {
      system.shutdown();
      return tick;
    }
  }
  unreachable!("pipeline did not converge")
}

fn bench_convergence(c: &mut Criterion) {
  let mut group = c.benchmark_group("pipeline_convergence");
  group.sample_size(10);
  let viewer = Vec3::new(0.3, 0.2, 0.1);

  for (name, field) in fields() {
    group.bench_with_input(BenchmarkId::new("inline", name), &field, |b, field| {
      b.iter(|| {
        let scheduler = BuildScheduler::inline(SchedulerConfig::DEFAULT);
        let mut system = SdfMeshSystem::with_scheduler(CountingBackend::default(), scheduler);
        system.add_object(desc(field.clone())).unwrap();
        black_box(run_to_convergence(system, viewer))
      })
    });

    group.bench_with_input(BenchmarkId::new("threaded", name), &field, |b, field| {
      b.iter(|| {
        let mut system = SdfMeshSystem::new(CountingBackend::default(), SchedulerConfig::DEFAULT);
        system.add_object(desc(field.clone())).unwrap();
        black_box(run_to_convergence(system, viewer))
      })
    });
  }

  group.finish();
}

/// Steady-state traversal and draw selection on a converged octree.
fn bench_steady_tick(c: &mut Criterion) {
  let mut group = c.benchmark_group("pipeline_steady_tick");
  let viewer = Vec3::new(0.3, 0.2, 0.1);

  for (name, field) in fields() {
    let scheduler = BuildScheduler::inline(SchedulerConfig::UNLIMITED);
    let mut system = SdfMeshSystem::with_scheduler(CountingBackend::default(), scheduler);
    system.add_object(desc(field)).unwrap();
    while system.tick(viewer).requested > 0 {}
    system.tick(viewer);

    group.bench_function(name, |b| b.iter(|| black_box(system.tick(black_box(viewer)))));
  }

  group.finish();
}

criterion_group!(pipeline, bench_convergence, bench_steady_tick);
criterion_main!(pipeline);

//! sdf_mesh - Framework/engine independent SDF meshing with streaming LOD
//!
//! This crate turns signed distance fields into triangle meshes and keeps a
//! level-of-detail octree of those meshes up to date as a viewer moves. Builds
//! run on a worker pool under a per-frame budget; the main thread only
//! traverses, dispatches and hands finished meshes to the renderer.
//!
//! # Features
//!
//! - **Isosurface extraction**: Blocky, Surface Nets and Dual Contouring
//!   vertex placement over one shared quad-stitching pass
//! - **LOD octree**: lazily built, generation-invalidated, gap-free draw
//!   selection with coarser fallbacks while children stream in
//! - **Build scheduler**: priority ordering, per-frame budget, pooled working
//!   sets, main-thread-only fields built synchronously
//! - **Render seam**: [`RenderBackend`] receives finished meshes and draw calls
//!
//! # Example
//!
//! ```ignore
//! use sdf_mesh::{FieldHandle, ObjectDesc, SchedulerConfig, SdfMeshSystem, Sphere};
//!
//! let mut system = SdfMeshSystem::new(my_backend, SchedulerConfig::DEFAULT);
//! let sphere = system.add_object(ObjectDesc::new(FieldHandle::thread_safe(Sphere::new(0.8))))?;
//!
//! // Every frame:
//! let stats = system.tick(camera_position);
//!
//! // On exit:
//! system.shutdown();
//! ```

pub mod error;
pub use error::{Result, SdfMeshError};

// Density fields and reference shapes
pub mod field;
pub use field::{
  gradient, raycast, BoxField, DensityField, FieldHandle, HalfSpace, MaterialId, RayHit, Sample, Sphere,
  TiltedPlane, Union,
};

pub mod types;
pub use types::{DualContourFallback, ExtractConfig, MeshMode, MeshOutput, Vertex};

// Isosurface extraction
pub mod extract;
pub use extract::{extract, extract_with_observer, ExtractRegion, ExtractionObserver};

// Reusable scratch buffers
pub mod working_set;
pub use working_set::{WorkingSet, WorkingSetPool};

// Cross-platform threading abstraction
pub mod threading;
pub use threading::{ExecutionMode, TaskExecutor, TaskId};

// LOD octree
pub mod octree;
pub use octree::{Aabb, DistanceLod, LodPolicy, LodTier, MeshOctree, NodeId, NodeState};

// Build scheduling
pub mod scheduler;
pub use scheduler::{BuildScheduler, SchedulerConfig, TickStats};

// Per-object driver
pub mod system;
pub use system::{ObjectDesc, ObjectId, RenderBackend, RenderMaterial, SdfMeshSystem};

// Build statistics
pub mod metrics;

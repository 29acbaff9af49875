//! SdfMeshSystem - per-object driver.
//!
//! Each object has its own octree, field, resolution, LOD tiers and
//! transform. One `tick` per frame runs every stage for every object:
//!
//! ```text
//!   tick(viewer)
//!     ├─ handoff   finished builds ──► RenderBackend::create_mesh ──► octree node
//!     ├─ traverse  per object, viewer in local space
//!     │              ├─ stale nodes ──► build requests
//!     │              └─ selected meshes ──► RenderBackend::submit
//!     └─ dispatch  sort, budget, signal building, submit jobs
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Affine3A, UVec3, Vec3};
use web_time::Instant;

use crate::error::{Result, SdfMeshError};
use crate::extract::{validate_bounds, validate_resolution, MAX_GRID_EXTENT};
use crate::field::FieldHandle;
use crate::metrics::PipelineMetrics;
use crate::octree::{Aabb, DistanceLod, LodTier, MeshOctree, DEFAULT_DRAW_SCALE, DEFAULT_MAX_DEPTH};
use crate::scheduler::{BuildKey, BuildRequest, BuildScheduler, SchedulerConfig, TickStats};
use crate::types::{ExtractConfig, MeshOutput};

// =============================================================================
// ObjectId - unique identifier
// =============================================================================

/// Atomic counter for generating unique ObjectIds.
static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque object identifier, unique within the process lifetime.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn new() -> Self {
        Self(OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Render seam
// =============================================================================

/// Opaque material handle passed through to the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderMaterial(pub u64);

/// Renderer and GPU resource layer.
///
/// Both methods are only called from the thread driving [`SdfMeshSystem::tick`].
pub trait RenderBackend {
    /// Renderer-side mesh stored in octree nodes.
    type Mesh;

    /// Upload a finished mesh. `None` stores the node as having no surface.
    fn create_mesh(&mut self, mesh: MeshOutput) -> Option<Self::Mesh>;

    /// Draw a mesh this frame. Bounds are the node's, in object space.
    fn submit(
        &mut self,
        transform: &Affine3A,
        mesh: &Self::Mesh,
        material: RenderMaterial,
        bounds_min: Vec3,
        bounds_max: Vec3,
    );
}

// =============================================================================
// ObjectDesc - construction parameters
// =============================================================================

/// Default cells per node on each axis.
pub const DEFAULT_RESOLUTION: UVec3 = UVec3::splat(32);

/// Configuration of one volumetric object.
#[derive(Clone, Debug)]
pub struct ObjectDesc {
    pub field: FieldHandle,
    /// Object-space bounds of the octree root.
    pub bounds: Aabb,
    /// Cells per node on each axis.
    pub resolution: UVec3,
    pub max_depth: u32,
    pub lods: Vec<LodTier>,
    pub draw_scale: f32,
    pub extract: ExtractConfig,
    /// Object space to world space.
    pub transform: Affine3A,
    pub material: RenderMaterial,
}

impl ObjectDesc {
    /// Defaults around `field`: unit bounds, 32³ cells, depth 4, one sample
    /// of margin so neighbouring nodes agree on normals.
    pub fn new(field: FieldHandle) -> Self {
        Self {
            field,
            bounds: Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
            resolution: DEFAULT_RESOLUTION,
            max_depth: DEFAULT_MAX_DEPTH,
            lods: Vec::new(),
            draw_scale: DEFAULT_DRAW_SCALE,
            extract: ExtractConfig::default().with_margin(1),
            transform: Affine3A::IDENTITY,
            material: RenderMaterial::default(),
        }
    }

    pub fn with_bounds(mut self, min: Vec3, max: Vec3) -> Self {
        self.bounds = Aabb { min, max };
        self
    }

    pub fn with_resolution(mut self, resolution: UVec3) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_lods(mut self, lods: Vec<LodTier>) -> Self {
        self.lods = lods;
        self
    }

    pub fn with_draw_scale(mut self, draw_scale: f32) -> Self {
        self.draw_scale = draw_scale;
        self
    }

    pub fn with_extract_config(mut self, extract: ExtractConfig) -> Self {
        self.extract = extract;
        self
    }

    pub fn with_transform(mut self, transform: Affine3A) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_material(mut self, material: RenderMaterial) -> Self {
        self.material = material;
        self
    }
}

/// Padded sample grid must fit the cell key.
fn validate_grid(resolution: UVec3, margin: u32) -> Result<()> {
    validate_resolution(resolution)?;
    let padded = resolution.max_element() as u64 + 1 + 2 * margin as u64;
    if padded > MAX_GRID_EXTENT as u64 {
        return Err(SdfMeshError::ResolutionTooLarge(resolution));
    }
    Ok(())
}

// =============================================================================
// SdfObject<M> - per-object state
// =============================================================================

/// Live state of one object, generic over the renderer's mesh type.
pub struct SdfObject<M> {
    field: FieldHandle,
    octree: MeshOctree<M>,
    resolution: UVec3,
    extract: ExtractConfig,
    lod: DistanceLod,
    transform: Affine3A,
    material: RenderMaterial,
}

impl<M> SdfObject<M> {
    fn from_desc(desc: ObjectDesc) -> Result<Self> {
        validate_bounds(desc.bounds.min, desc.bounds.max)?;
        validate_grid(desc.resolution, desc.extract.margin)?;
        Ok(Self {
            field: desc.field,
            octree: MeshOctree::new(desc.bounds, desc.max_depth),
            resolution: desc.resolution,
            extract: desc.extract,
            lod: DistanceLod::new(Vec3::ZERO, desc.lods).with_draw_scale(desc.draw_scale),
            transform: desc.transform,
            material: desc.material,
        })
    }

    pub fn octree(&self) -> &MeshOctree<M> {
        &self.octree
    }

    pub fn field(&self) -> &FieldHandle {
        &self.field
    }

    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    pub fn extract_config(&self) -> &ExtractConfig {
        &self.extract
    }

    pub fn lod(&self) -> &DistanceLod {
        &self.lod
    }

    pub fn transform(&self) -> &Affine3A {
        &self.transform
    }

    pub fn material(&self) -> RenderMaterial {
        self.material
    }

    /// Convert a world position into object space.
    #[inline]
    pub fn world_to_local(&self, world_pos: Vec3) -> Vec3 {
        self.transform.inverse().transform_point3(world_pos)
    }
}

// =============================================================================
// SdfMeshSystem<B>
// =============================================================================

/// Owns every object, the build scheduler and the render backend.
pub struct SdfMeshSystem<B: RenderBackend> {
    objects: BTreeMap<ObjectId, SdfObject<B::Mesh>>,
    scheduler: BuildScheduler,
    backend: B,
}

impl<B: RenderBackend> SdfMeshSystem<B> {
    /// System building on rayon's thread pool.
    pub fn new(backend: B, config: SchedulerConfig) -> Self {
        Self::with_scheduler(backend, BuildScheduler::new(config))
    }

    pub fn with_scheduler(backend: B, scheduler: BuildScheduler) -> Self {
        Self {
            objects: BTreeMap::new(),
            scheduler,
            backend,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn scheduler(&self) -> &BuildScheduler {
        &self.scheduler
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        self.scheduler.metrics()
    }

    pub fn object(&self, id: ObjectId) -> Option<&SdfObject<B::Mesh>> {
        self.objects.get(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut SdfObject<B::Mesh>> {
        self.objects.get_mut(&id).ok_or(SdfMeshError::UnknownObject(id))
    }

    // =========================================================================
    // Object lifecycle and configuration
    // =========================================================================

    pub fn add_object(&mut self, desc: ObjectDesc) -> Result<ObjectId> {
        let object = SdfObject::from_desc(desc)?;
        let id = ObjectId::new();
        log::debug!(
            "added object {:?}: resolution {}, max depth {}",
            id,
            object.resolution,
            object.octree.max_depth()
        );
        self.objects.insert(id, object);
        Ok(id)
    }

    /// Remove an object. Builds still in flight for it are discarded on arrival.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<()> {
        if self.objects.remove(&id).is_none() {
            return Err(SdfMeshError::UnknownObject(id));
        }
        log::debug!("removed object {id:?}");
        Ok(())
    }

    /// Move the octree root. Discards every node of the object.
    pub fn set_bounds(&mut self, id: ObjectId, min: Vec3, max: Vec3) -> Result<()> {
        validate_bounds(min, max)?;
        self.object_mut(id)?.octree.set_bounds(Aabb::new(min, max));
        Ok(())
    }

    /// Change cells per node. Existing meshes stay drawn until rebuilt.
    pub fn set_resolution(&mut self, id: ObjectId, resolution: UVec3) -> Result<()> {
        let object = self.object_mut(id)?;
        validate_grid(resolution, object.extract.margin)?;
        object.resolution = resolution;
        object.octree.invalidate(false);
        Ok(())
    }

    pub fn set_max_depth(&mut self, id: ObjectId, max_depth: u32) -> Result<()> {
        self.object_mut(id)?.octree.set_max_depth(max_depth);
        Ok(())
    }

    pub fn set_extract_config(&mut self, id: ObjectId, extract: ExtractConfig) -> Result<()> {
        let object = self.object_mut(id)?;
        validate_grid(object.resolution, extract.margin)?;
        object.extract = extract;
        object.octree.invalidate(false);
        Ok(())
    }

    /// Swap the field, e.g. after an edit. Existing meshes stay drawn until rebuilt.
    pub fn set_field(&mut self, id: ObjectId, field: FieldHandle) -> Result<()> {
        let object = self.object_mut(id)?;
        object.field = field;
        object.octree.invalidate(false);
        Ok(())
    }

    pub fn invalidate(&mut self, id: ObjectId, destroy_all: bool) -> Result<()> {
        self.object_mut(id)?.octree.invalidate(destroy_all);
        Ok(())
    }

    pub fn set_transform(&mut self, id: ObjectId, transform: Affine3A) -> Result<()> {
        self.object_mut(id)?.transform = transform;
        Ok(())
    }

    pub fn set_lods(&mut self, id: ObjectId, lods: Vec<LodTier>, draw_scale: f32) -> Result<()> {
        let lod = &mut self.object_mut(id)?.lod;
        lod.tiers = lods;
        lod.draw_scale = draw_scale;
        Ok(())
    }

    // =========================================================================
    // Per-frame driver
    // =========================================================================

    /// Run one frame for every object with the viewer at `viewer` (world space).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "sdf_mesh_tick"))]
    pub fn tick(&mut self, viewer: Vec3) -> TickStats {
        let start = Instant::now();
        let mut stats = TickStats::default();
        let Self {
            objects,
            scheduler,
            backend,
        } = self;

        scheduler.poll(
            |key, mesh| {
                let Some(object) = objects.get_mut(&key.owner) else {
                    return false;
                };
                if object.octree.node_state(key.node).is_none() {
                    return false;
                }
                let mesh = mesh.and_then(|m| backend.create_mesh(m));
                object.octree.set_node_mesh(key.node, mesh)
            },
            &mut stats,
        );

        let mut requests = Vec::new();
        for (&owner, object) in objects.iter_mut() {
            let local_viewer = object.world_to_local(viewer);
            object.lod.viewer = local_viewer;

            let transform = object.transform;
            let material = object.material;
            object.octree.update_with_policy(
                &object.lod,
                |node| {
                    requests.push(BuildRequest {
                        key: BuildKey {
                            owner,
                            node: node.node,
                        },
                        bounds: node.bounds,
                        depth: node.depth,
                        distance: transform
                            .transform_point3(node.bounds.closest_point(local_viewer))
                            .distance(viewer),
                        resolution: object.resolution,
                        config: object.extract,
                        field: object.field.clone(),
                    })
                },
                |bounds, _, mesh| backend.submit(&transform, mesh, material, bounds.min, bounds.max),
            );
        }

        scheduler.dispatch(
            requests,
            |key| {
                objects
                    .get_mut(&key.owner)
                    .is_some_and(|object| object.octree.signal_node_building(key.node))
            },
            &mut stats,
        );

        scheduler
            .metrics_mut()
            .record_tick_timing(start.elapsed().as_micros() as u64);
        stats
    }

    /// Drain in-flight builds and release pooled memory.
    ///
    /// Returns false if builds were still running at the scheduler's timeout.
    pub fn shutdown(&mut self) -> bool {
        self.scheduler.shutdown()
    }
}

#[cfg(test)]
#[path = "system_test.rs"]
mod system_test;

//! LOD octree caching one mesh per node.
//!
//! Nodes are created lazily while traversing and live in an arena; each node
//! owns its children's slots and no node points back at its parent. Bounds
//! are recomputed top-down during traversal rather than stored.
//!
//! ```text
//!                     ┌──────────┐  scheduler accepts   ┌──────────┐
//!        created ───► │ Unbuilt  │ ───────────────────► │ Building │
//!                     └──────────┘                      └────┬─────┘
//!                           ▲                                │ set_node_mesh
//!                           │ invalidate(true)               ▼
//!                     (tree discarded)               ┌──────────────┐
//!                                                    │ Ready        │
//!                            invalidate(false) ────► │ (now stale)  │
//!                                                    └──────────────┘
//! ```
//!
//! Invalidation bumps one generation counter. Every node whose generation
//! trails it is stale and gets re-requested the next time traversal finds it
//! worth updating, while still drawing its previous mesh.

pub mod bounds;
pub mod lod;
pub mod node;

use std::collections::HashMap;

pub use bounds::Aabb;
pub use lod::{DistanceLod, LodPolicy, LodTier, DEFAULT_DRAW_SCALE};
pub use node::{NodeId, NodeState};

use node::Node;

/// Default maximum depth below the root.
pub const DEFAULT_MAX_DEPTH: u32 = 4;

/// Update request emitted by traversal for a stale node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeRequest {
  pub node: NodeId,
  pub bounds: Aabb,
  pub depth: u32,
}

/// Octree of cached meshes of type `M`.
pub struct MeshOctree<M> {
  bounds: Aabb,
  max_depth: u32,
  generation: u64,
  next_id: u64,
  nodes: Vec<Node<M>>,
  lookup: HashMap<NodeId, usize>,
}

const ROOT: usize = 0;

impl<M> MeshOctree<M> {
  pub fn new(bounds: Aabb, max_depth: u32) -> Self {
    Self {
      bounds,
      max_depth,
      generation: 0,
      next_id: 0,
      nodes: Vec::new(),
      lookup: HashMap::new(),
    }
  }

  pub fn bounds(&self) -> Aabb {
    self.bounds
  }

  /// Deepest level; the root is depth 0.
  pub fn max_depth(&self) -> u32 {
    self.max_depth
  }

  /// Current global generation.
  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// Number of live nodes.
  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  pub fn root(&self) -> Option<NodeId> {
    self.nodes.first().map(|n| n.id)
  }

  // ===========================================================================
  // Configuration and invalidation
  // ===========================================================================

  /// Move the octree. The existing tree no longer matches and is discarded.
  pub fn set_bounds(&mut self, bounds: Aabb) {
    self.bounds = bounds;
    self.invalidate(true);
  }

  /// Nodes deeper than the new limit are kept but no longer visited.
  pub fn set_max_depth(&mut self, max_depth: u32) {
    self.max_depth = max_depth;
    self.invalidate(false);
  }

  /// Mark every node stale. With `destroy_all`, drop the whole tree instead.
  pub fn invalidate(&mut self, destroy_all: bool) {
    if destroy_all {
      self.nodes.clear();
      self.lookup.clear();
    }
    self.generation += 1;
  }

  // ===========================================================================
  // Scheduler handoff
  // ===========================================================================

  /// Mark a node as having a build in flight.
  ///
  /// Returns false if the node no longer exists.
  pub fn signal_node_building(&mut self, id: NodeId) -> bool {
    let generation = self.generation;
    match self.node_mut(id) {
      Some(node) => {
        debug_assert!(!node.is_building(), "node {id:?} dispatched twice");
        node.building = Some(generation);
        true
      }
      None => false,
    }
  }

  /// Store a finished build.
  ///
  /// The node becomes current for the generation its build was dispatched
  /// under, so an invalidation during the build leaves it stale. Returns
  /// false (and drops nothing but the argument) when the node is gone.
  pub fn set_node_mesh(&mut self, id: NodeId, mesh: Option<M>) -> bool {
    let generation = self.generation;
    match self.node_mut(id) {
      Some(node) => {
        node.generation = Some(node.building.take().unwrap_or(generation));
        node.mesh = mesh;
        true
      }
      None => false,
    }
  }

  pub fn node_state(&self, id: NodeId) -> Option<NodeState> {
    self.node(id).map(Node::state)
  }

  pub fn is_stale(&self, id: NodeId) -> Option<bool> {
    self.node(id).map(|n| n.is_stale(self.generation))
  }

  pub fn mesh(&self, id: NodeId) -> Option<&M> {
    self.node(id).and_then(|n| n.mesh.as_ref())
  }

  /// Ids of all live nodes.
  pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
    self.nodes.iter().map(|n| n.id)
  }

  fn node(&self, id: NodeId) -> Option<&Node<M>> {
    self.lookup.get(&id).map(|&slot| &self.nodes[slot])
  }

  fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<M>> {
    let slot = *self.lookup.get(&id)?;
    Some(&mut self.nodes[slot])
  }

  fn make_node(&mut self) -> usize {
    self.next_id += 1;
    let id = NodeId(self.next_id);
    let slot = self.nodes.len();
    self.nodes.push(Node::new(id));
    self.lookup.insert(id, slot);
    slot
  }

  // ===========================================================================
  // Traversal
  // ===========================================================================

  /// Run one tick of traversal.
  ///
  /// Walks nodes worth updating depth-first, creating children on demand,
  /// and reports every stale node without a build in flight through
  /// `on_request`. The root is always worth updating. Then selects what to
  /// draw and reports it through `draw`.
  ///
  /// Requests do not mark nodes as building; the caller does that with
  /// [`signal_node_building`](Self::signal_node_building) for the requests it
  /// accepts.
  #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "octree_update"))]
  pub fn update<SU, UR, SD, D>(
    &mut self,
    mut should_update: SU,
    mut on_request: UR,
    mut should_draw: SD,
    mut draw: D,
  ) where
    SU: FnMut(&Aabb, u32) -> bool,
    UR: FnMut(NodeRequest),
    SD: FnMut(&Aabb, u32) -> bool,
    D: FnMut(&Aabb, u32, &M),
  {
    if self.nodes.is_empty() {
      self.make_node();
    }
    let bounds = self.bounds;
    self.update_node(ROOT, 0, bounds, &mut should_update, &mut on_request);
    self.draw_node(ROOT, 0, bounds, &mut should_draw, &mut draw);
  }

  /// [`update`](Self::update) driven by a [`LodPolicy`].
  pub fn update_with_policy<P, UR, D>(&mut self, policy: &P, on_request: UR, draw: D)
  where
    P: LodPolicy + ?Sized,
    UR: FnMut(NodeRequest),
    D: FnMut(&Aabb, u32, &M),
  {
    self.update(
      |b, d| policy.should_update(b, d),
      on_request,
      |b, d| policy.should_draw(b, d),
      draw,
    );
  }

  fn update_node<SU, UR>(
    &mut self,
    slot: usize,
    depth: u32,
    bounds: Aabb,
    should_update: &mut SU,
    on_request: &mut UR,
  ) where
    SU: FnMut(&Aabb, u32) -> bool,
    UR: FnMut(NodeRequest),
  {
    let node = &self.nodes[slot];
    if !node.is_building() && node.is_stale(self.generation) {
      on_request(NodeRequest {
        node: node.id,
        bounds,
        depth,
      });
    }

    if depth >= self.max_depth {
      return;
    }

    for octant in 0..8u8 {
      let child_bounds = bounds.octant(octant);
      if !should_update(&child_bounds, depth + 1) {
        continue;
      }
      let child = match self.nodes[slot].children[octant as usize] {
        Some(child) => child,
        None => {
          let child = self.make_node();
          self.nodes[slot].children[octant as usize] = Some(child);
          child
        }
      };
      self.update_node(child, depth + 1, child_bounds, should_update, on_request);
    }
  }

  /// Draw children only when all eight octants are visible and loaded,
  /// otherwise this node's own mesh, so the region never goes uncovered.
  fn draw_node<SD, D>(&self, slot: usize, depth: u32, bounds: Aabb, should_draw: &mut SD, draw: &mut D)
  where
    SD: FnMut(&Aabb, u32) -> bool,
    D: FnMut(&Aabb, u32, &M),
  {
    if !should_draw(&bounds, depth) {
      return;
    }

    let node = &self.nodes[slot];
    if depth < self.max_depth {
      let mut children: [Option<(usize, Aabb)>; 8] = [None; 8];
      let mut descend = true;

      for octant in 0..8u8 {
        let child_bounds = bounds.octant(octant);
        let loaded = node.children[octant as usize].filter(|&child| self.nodes[child].is_loaded());
        match loaded {
          Some(child) if should_draw(&child_bounds, depth + 1) => {
            children[octant as usize] = Some((child, child_bounds));
          }
          _ => {
            descend = false;
            break;
          }
        }
      }

      if descend {
        for (child, child_bounds) in children.into_iter().flatten() {
          self.draw_node(child, depth + 1, child_bounds, should_draw, draw);
        }
        return;
      }
    }

    if let Some(mesh) = &node.mesh {
      draw(&bounds, depth, mesh);
    }
  }
}

//! Octree node storage and lifecycle state.

/// Stable identifier of an octree node.
///
/// Never reused by the owning octree, even after a full teardown, so a
/// completion addressed to a destroyed node cannot land on a new one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
  /// Get the raw ID value.
  pub fn raw(&self) -> u64 {
    self.0
  }
}

/// Build lifecycle of a node.
///
/// Staleness is tracked separately: any state except `Building` may also be
/// stale when the node's generation trails the octree's.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeState {
  /// Never built.
  Unbuilt,
  /// A build is in flight.
  Building,
  /// Built at least once; the mesh may be absent if the region was empty.
  Ready,
}

/// Arena entry. Children are arena slots owned by this node.
#[derive(Debug)]
pub(crate) struct Node<M> {
  pub id: NodeId,
  /// Generation the current mesh was built for.
  pub generation: Option<u64>,
  /// Generation the in-flight build was dispatched under.
  pub building: Option<u64>,
  pub mesh: Option<M>,
  pub children: [Option<usize>; 8],
}

impl<M> Node<M> {
  pub fn new(id: NodeId) -> Self {
    Self {
      id,
      generation: None,
      building: None,
      mesh: None,
      children: [None; 8],
    }
  }

  #[inline]
  pub fn is_building(&self) -> bool {
    self.building.is_some()
  }

  #[inline]
  pub fn is_stale(&self, current: u64) -> bool {
    self.generation != Some(current)
  }

  /// Built at least once, in any generation. A stale node keeps standing in
  /// for its region, with or without a surface, until the rebuild lands.
  #[inline]
  pub fn is_loaded(&self) -> bool {
    self.generation.is_some()
  }

  pub fn state(&self) -> NodeState {
    if self.is_building() {
      NodeState::Building
    } else if self.generation.is_some() {
      NodeState::Ready
    } else {
      NodeState::Unbuilt
    }
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;

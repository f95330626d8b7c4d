//! Authoritative node/edge registry on the control thread.
//!
//! The store owns every live node's control half, a shared handle to its
//! kernel, its ordered child list, and a cache of successfully applied
//! properties (the backing for [`Runtime::snapshot`](crate::Runtime::snapshot)).
//! It is mutated only by the instruction applier and `gc`; the realtime
//! thread never sees it — schedules carry their own kernel handles.

use std::collections::HashMap;

use crate::node::{ControlNode, Kernel, NodeId};
use crate::root::RootState;
use crate::value::Value;
use std::sync::Arc;

/// One ordered parent→child connection.
///
/// The position of an edge in the parent's child list is the input index at
/// which the child's output appears; `output_channel` selects which of the
/// child's declared outputs feeds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildEdge {
    /// The child node.
    pub child: NodeId,
    /// Which of the child's output channels to read.
    pub output_channel: usize,
}

/// Everything the store tracks for one node.
pub struct NodeEntry {
    /// Registered kind name this node was created from.
    pub kind: String,
    /// Control-thread half.
    pub control: Box<dyn ControlNode>,
    /// Shared realtime half.
    pub kernel: Kernel,
    /// Fade/channel state, present for root kinds.
    pub root: Option<Arc<RootState>>,
    /// Ordered child edges; insertion order is input position.
    pub children: Vec<ChildEdge>,
    /// Cache of successfully applied properties.
    pub properties: HashMap<String, Value>,
}

/// The control thread's node registry.
#[derive(Default)]
pub struct NodeStore {
    nodes: HashMap<NodeId, NodeEntry>,
}

impl NodeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `id` is live.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Inserts a new entry. The applier guarantees the id is fresh.
    pub fn insert(&mut self, id: NodeId, entry: NodeEntry) {
        debug_assert!(!self.nodes.contains_key(&id));
        self.nodes.insert(id, entry);
    }

    /// Borrows an entry.
    pub fn get(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.get(&id)
    }

    /// Mutably borrows an entry.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeEntry> {
        self.nodes.get_mut(&id)
    }

    /// Removes an entry (garbage collection only).
    pub fn remove(&mut self, id: NodeId) -> Option<NodeEntry> {
        self.nodes.remove(&id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes are live.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over `(id, entry)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeEntry)> {
        self.nodes.iter().map(|(id, entry)| (*id, entry))
    }

    /// Iterates mutably over `(id, entry)` pairs in arbitrary order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut NodeEntry)> {
        self.nodes.iter_mut().map(|(id, entry)| (*id, entry))
    }

    /// All live ids, sorted.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort();
        ids
    }
}

//! The control-thread facade.
//!
//! [`Runtime`] owns the registry, node store, scratch allocator, and resource
//! map, and drives the whole control side: transactional instruction
//! application, schedule compilation and handoff, event pumping, resource
//! publication, and garbage collection. Its realtime counterpart,
//! [`RenderProcessor`](crate::RenderProcessor), is created alongside it and
//! moved to the audio thread; the pair communicate only over the schedule and
//! retired-schedule queues.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::factory::{NodeFactory, NodeRegistry};
use crate::instructions::Instruction;
use crate::node::NodeId;
use crate::render::RenderProcessor;
use crate::resource::{AudioData, ResourceMap};
use crate::root;
use crate::schedule::RenderSchedule;
use crate::scheduler;
use crate::scratch::BufferAllocator;
use crate::spsc;
use crate::store::{ChildEdge, NodeEntry, NodeStore};
use crate::value::Value;

/// Pending schedule handoffs the realtime thread can lag behind by.
const SCHEDULE_QUEUE_CAPACITY: usize = 64;
/// Retired schedules in flight back to the control thread.
const RETIRED_QUEUE_CAPACITY: usize = 128;

/// The engine's control surface.
pub struct Runtime {
    config: RuntimeConfig,
    registry: NodeRegistry,
    store: NodeStore,
    allocator: BufferAllocator,
    resources: ResourceMap,
    /// Roots in schedule order: the activation target first, then fading
    /// roots retained for their tails.
    current_roots: Vec<NodeId>,
    schedule_tx: spsc::Producer<Arc<RenderSchedule>>,
    retired_rx: spsc::Consumer<Arc<RenderSchedule>>,
    live_schedule: Option<Arc<RenderSchedule>>,
}

impl Runtime {
    /// Creates a runtime and its realtime processor.
    ///
    /// The `root` kind is pre-registered; everything else is added through
    /// [`register_node_kind`](Self::register_node_kind).
    pub fn new(config: RuntimeConfig) -> (Self, RenderProcessor) {
        let (schedule_tx, schedule_rx) = spsc::channel(SCHEDULE_QUEUE_CAPACITY);
        let (retired_tx, retired_rx) = spsc::channel(RETIRED_QUEUE_CAPACITY);

        let mut registry = NodeRegistry::new();
        registry
            .register("root", root::factory)
            .expect("fresh registry");

        let runtime = Self {
            config,
            registry,
            store: NodeStore::new(),
            allocator: BufferAllocator::new(config.block_size),
            resources: ResourceMap::new(config.block_size),
            current_roots: Vec::new(),
            schedule_tx,
            retired_rx,
            live_schedule: None,
        };
        let processor = RenderProcessor::new(config, schedule_rx, retired_tx);
        (runtime, processor)
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    /// Registers a node kind.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NodeTypeAlreadyExists`] when the name is taken.
    pub fn register_node_kind(
        &mut self,
        name: &str,
        factory: NodeFactory,
    ) -> Result<(), RuntimeError> {
        self.registry.register(name, factory)
    }

    // --- Instruction application ---

    /// Applies a typed batch transactionally.
    ///
    /// Creates, edges, and activations stage into side storage and merge on
    /// each [`Instruction::Commit`]; a commit that saw an activation rebuilds
    /// the schedule and pushes it to the realtime thread. The first error
    /// aborts the batch and discards anything staged but uncommitted.
    /// `SetProperty` on an already-live node takes effect immediately and is
    /// not rolled back.
    pub fn apply_instructions(&mut self, batch: &[Instruction]) -> Result<(), RuntimeError> {
        let mut staged: HashMap<NodeId, NodeEntry> = HashMap::new();
        let mut staged_order: Vec<NodeId> = Vec::new();
        let mut staged_edges: Vec<(NodeId, ChildEdge)> = Vec::new();
        let mut staged_activation: Option<Vec<NodeId>> = None;

        for instruction in batch {
            match instruction {
                Instruction::CreateNode { id, kind } => {
                    if self.store.contains(*id) || staged.contains_key(id) {
                        return Err(RuntimeError::NodeAlreadyExists(*id));
                    }
                    let parts = self
                        .registry
                        .create(kind, &self.config)
                        .ok_or_else(|| RuntimeError::UnknownNodeType(kind.clone()))?;
                    staged.insert(
                        *id,
                        NodeEntry {
                            kind: kind.clone(),
                            control: parts.control,
                            kernel: parts.kernel,
                            root: parts.root,
                            children: Vec::new(),
                            properties: HashMap::new(),
                        },
                    );
                    staged_order.push(*id);
                }

                Instruction::SetProperty { id, key, value } => {
                    let entry = if staged.contains_key(id) {
                        staged.get_mut(id).expect("checked above")
                    } else {
                        self.store
                            .get_mut(*id)
                            .ok_or(RuntimeError::NodeNotFound(*id))?
                    };
                    entry
                        .control
                        .set_property(key, value, &mut self.resources)
                        .map_err(|e| e.into_runtime(*id, key))?;
                    entry.properties.insert(key.clone(), value.clone());
                }

                Instruction::AppendChild {
                    parent,
                    child,
                    output_channel,
                } => {
                    for id in [parent, child] {
                        if !self.store.contains(*id) && !staged.contains_key(id) {
                            return Err(RuntimeError::NodeNotFound(*id));
                        }
                    }
                    if reaches(&self.store, &staged_edges, *child, *parent) {
                        return Err(RuntimeError::InvariantViolation(format!(
                            "edge {parent}→{child} would close a cycle"
                        )));
                    }
                    staged_edges.push((
                        *parent,
                        ChildEdge {
                            child: *child,
                            output_channel: *output_channel,
                        },
                    ));
                }

                Instruction::ActivateRoots(ids) => {
                    for id in ids {
                        let is_root = staged
                            .get(id)
                            .map(|entry| entry.root.is_some())
                            .or_else(|| {
                                self.store.get(*id).map(|entry| entry.root.is_some())
                            })
                            .ok_or(RuntimeError::NodeNotFound(*id))?;
                        if !is_root {
                            return Err(RuntimeError::InvariantViolation(format!(
                                "ActivateRoots target {id} is not a root"
                            )));
                        }
                    }
                    staged_activation = Some(ids.clone());
                }

                Instruction::Commit => {
                    for id in staged_order.drain(..) {
                        let entry = staged.remove(&id).expect("staged in order");
                        self.store.insert(id, entry);
                    }
                    for (parent, edge) in staged_edges.drain(..) {
                        if let Some(entry) = self.store.get_mut(parent) {
                            entry.children.push(edge);
                        }
                    }
                    if let Some(target) = staged_activation.take() {
                        self.activate_roots(&target);
                        self.rebuild_schedule();
                    }
                }
            }
        }
        Ok(())
    }

    /// Decodes a wire batch and applies it.
    pub fn apply_wire(&mut self, batch: &Value) -> Result<(), RuntimeError> {
        let decoded = Instruction::decode_batch(batch)?;
        self.apply_instructions(&decoded)
    }

    fn activate_roots(&mut self, target: &[NodeId]) {
        let mut next_roots: Vec<NodeId> = Vec::with_capacity(target.len());
        for &id in target {
            if !next_roots.contains(&id) {
                next_roots.push(id);
            }
            if let Some(state) = self.store.get(id).and_then(|entry| entry.root.as_ref()) {
                state.set_active(true);
            }
        }
        // Deactivated roots stay in the set while their fade tail is audible.
        for &previous in &self.current_roots {
            if next_roots.contains(&previous) {
                continue;
            }
            if let Some(state) = self
                .store
                .get(previous)
                .and_then(|entry| entry.root.as_ref())
            {
                state.set_active(false);
                if state.still_running() {
                    next_roots.push(previous);
                }
            }
        }
        self.current_roots = next_roots;
    }

    fn rebuild_schedule(&mut self) {
        let schedule = scheduler::compile(
            &self.store,
            &self.current_roots,
            &mut self.allocator,
            self.config.block_size,
        );
        self.live_schedule = Some(Arc::clone(&schedule));
        if self.schedule_tx.push(schedule).is_err() {
            tracing::warn!("schedule queue full; realtime thread is not draining");
        }
        self.drain_retired();
    }

    fn drain_retired(&mut self) {
        while self.retired_rx.pop().is_some() {}
    }

    // --- Events ---

    /// Drains every scheduled node's pending events into `callback`.
    ///
    /// Control thread only. Payloads are objects carrying at least `source`
    /// (the node's `name` property) and `data`.
    pub fn process_queued_events(&mut self, callback: &mut dyn FnMut(&str, Value)) {
        let Some(schedule) = self.live_schedule.clone() else {
            return;
        };
        for &id in schedule.participants() {
            if let Some(entry) = self.store.get_mut(id) {
                entry.control.process_events(callback);
            }
        }
    }

    // --- Lifecycle ---

    /// Requests every node to clear its internal DSP state (delay lines,
    /// readers, envelopes). Takes effect at each kernel's next block.
    pub fn reset(&mut self) {
        for (_, entry) in self.store.iter_mut() {
            entry.control.reset();
        }
    }

    /// Collects nodes no live schedule references and returns their ids,
    /// sorted.
    ///
    /// Runs only when the client asks; idempotent between mutations. Retired
    /// schedules are drained first so references released by the realtime
    /// thread are accounted for.
    pub fn gc(&mut self) -> Vec<NodeId> {
        self.drain_retired();
        let mut collected: Vec<NodeId> = self
            .store
            .iter()
            .filter(|(_, entry)| Arc::strong_count(&entry.kernel) == 1)
            .map(|(id, _)| id)
            .collect();
        collected.sort();
        for &id in &collected {
            self.store.remove(id);
        }
        self.current_roots.retain(|id| !collected.contains(id));
        if !collected.is_empty() {
            tracing::debug!(count = collected.len(), "collected unreferenced nodes");
        }
        collected
    }

    // --- Shared resources ---

    /// Publishes an immutable buffer under `name`. Returns `false` (leaving
    /// the existing entry untouched) when the name is taken.
    pub fn add_shared_resource(&mut self, name: &str, data: AudioData) -> bool {
        self.resources.insert(name, data)
    }

    /// Drops resources nothing references any more; returns how many.
    pub fn prune_shared_resources(&mut self) -> usize {
        self.resources.prune()
    }

    /// Names of all published resources.
    pub fn shared_resource_names(&self) -> Vec<String> {
        self.resources.keys()
    }

    // --- Introspection ---

    /// Property map of every live node.
    pub fn snapshot(&self) -> HashMap<NodeId, HashMap<String, Value>> {
        self.store
            .iter()
            .map(|(id, entry)| (id, entry.properties.clone()))
            .collect()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.store.len()
    }

    /// The most recently compiled schedule, if any.
    pub fn current_schedule(&self) -> Option<&Arc<RenderSchedule>> {
        self.live_schedule.as_ref()
    }
}

/// Reachability over the merged view of live edges plus staged edges: can
/// `from` reach `to`? Used to keep the committed graph a DAG — the only legal
/// feedback path is a tap pair, which shares a buffer instead of an edge.
fn reaches(
    store: &NodeStore,
    staged_edges: &[(NodeId, ChildEdge)],
    from: NodeId,
    to: NodeId,
) -> bool {
    let mut stack = vec![from];
    let mut seen = std::collections::HashSet::new();
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        if let Some(entry) = store.get(node) {
            stack.extend(entry.children.iter().map(|edge| edge.child));
        }
        stack.extend(
            staged_edges
                .iter()
                .filter(|(parent, _)| *parent == node)
                .map(|(_, edge)| edge.child),
        );
    }
    false
}

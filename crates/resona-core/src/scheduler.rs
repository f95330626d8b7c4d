//! Schedule compilation: store + root set → [`RenderSchedule`].
//!
//! Runs on the control thread, triggered by a committed batch that contained
//! a root activation. The caller passes roots **active-first,
//! fading-second**, so any node reachable from a live root lands in a live
//! root's subsequence; nodes reachable only from a fading root stop being
//! rendered as soon as that root's fade completes and it drops out of the
//! root set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::node::NodeId;
use crate::schedule::{InputSource, RenderOp, RenderSchedule, RootSequence};
use crate::scratch::{BufferAllocator, ScratchBuffer};
use crate::store::NodeStore;

/// Compiles one schedule.
///
/// A global visited set across roots guarantees a node shared by several
/// roots renders exactly once per block; its scratch assignment is recorded
/// once and referenced by every consumer. Each node gets one scratch window
/// per declared output channel, dealt by the (freshly reset) bump allocator,
/// so all assignments within the schedule are disjoint.
pub(crate) fn compile(
    store: &NodeStore,
    roots: &[NodeId],
    allocator: &mut BufferAllocator,
    block_size: usize,
) -> Arc<RenderSchedule> {
    allocator.reset();

    let mut discovered: HashSet<NodeId> = HashSet::new();
    let mut assigned: HashMap<NodeId, Vec<ScratchBuffer>> = HashMap::new();
    let mut participants: Vec<NodeId> = Vec::new();
    let mut sequences: Vec<RootSequence> = Vec::new();

    for &root_id in roots {
        let Some(root_entry) = store.get(root_id) else {
            continue;
        };
        let Some(root_state) = root_entry.root.clone() else {
            continue;
        };

        let order = post_order(store, root_id, &mut discovered);
        let mut ops = Vec::with_capacity(order.len());
        let mut taps = Vec::new();

        for node_id in order {
            let entry = store.get(node_id).expect("post-order yields live nodes");

            let outputs: Vec<ScratchBuffer> = (0..entry.control.num_outputs().max(1))
                .map(|_| allocator.next())
                .collect();

            let inputs: Vec<InputSource> = entry
                .children
                .iter()
                .map(|edge| {
                    assigned
                        .get(&edge.child)
                        .and_then(|bufs| bufs.get(edge.output_channel))
                        .map_or(InputSource::Silence, |buf| {
                            InputSource::Buffer(buf.clone())
                        })
                })
                .collect();

            if entry.control.is_feedback_writer() {
                taps.push(entry.kernel.clone());
            }

            ops.push(RenderOp {
                kernel: entry.kernel.clone(),
                inputs: inputs.into_boxed_slice(),
                outputs: outputs.clone().into_boxed_slice(),
            });
            assigned.insert(node_id, outputs);
            participants.push(node_id);
        }

        let output = assigned
            .get(&root_id)
            .and_then(|bufs| bufs.first())
            .cloned();
        let Some(output) = output else {
            continue;
        };

        sequences.push(RootSequence {
            root: root_state,
            ops,
            output,
            taps,
        });
    }

    tracing::debug!(
        roots = sequences.len(),
        nodes = participants.len(),
        scratch = allocator.allocated(),
        "compiled render schedule"
    );

    Arc::new(RenderSchedule::new(sequences, participants, block_size))
}

/// Iterative depth-first post-order from `root`, skipping anything already
/// discovered by an earlier root. Children are visited in child-list order,
/// so a node's inputs are rendered before it. Marking at discovery (not
/// emission) keeps the walk finite even on a malformed cyclic graph.
fn post_order(store: &NodeStore, root: NodeId, discovered: &mut HashSet<NodeId>) -> Vec<NodeId> {
    let mut order = Vec::new();
    if !store.contains(root) || !discovered.insert(root) {
        return order;
    }

    // Stack of (node, next child index to descend into).
    let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
    while let Some((node, child_index)) = stack.pop() {
        let entry = store.get(node).expect("stacked nodes are live");
        let mut advanced = false;
        for (i, edge) in entry.children.iter().enumerate().skip(child_index) {
            if store.contains(edge.child) && discovered.insert(edge.child) {
                stack.push((node, i + 1));
                stack.push((edge.child, 0));
                advanced = true;
                break;
            }
        }
        if !advanced {
            order.push(node);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::PropertyError;
    use crate::node::{ControlNode, DspNode, NodeParts, RenderContext};
    use crate::resource::ResourceMap;
    use crate::root;
    use crate::store::{ChildEdge, NodeEntry};
    use crate::value::Value;

    struct TestControl;
    impl ControlNode for TestControl {
        fn set_property(
            &mut self,
            _key: &str,
            _value: &Value,
            _resources: &mut ResourceMap,
        ) -> Result<(), PropertyError> {
            Ok(())
        }
    }

    struct TestDsp;
    impl DspNode for TestDsp {
        fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
            ctx.zero_outputs();
        }
    }

    fn plain_entry(children: Vec<ChildEdge>) -> NodeEntry {
        let parts = NodeParts::new(TestControl, TestDsp);
        NodeEntry {
            kind: "test".into(),
            control: parts.control,
            kernel: parts.kernel,
            root: None,
            children,
            properties: HashMap::new(),
        }
    }

    fn root_entry(children: Vec<ChildEdge>) -> NodeEntry {
        let parts = root::factory(&RuntimeConfig::default());
        NodeEntry {
            kind: "root".into(),
            control: parts.control,
            kernel: parts.kernel,
            root: parts.root,
            children,
            properties: HashMap::new(),
        }
    }

    fn edge(child: u32) -> ChildEdge {
        ChildEdge {
            child: NodeId(child),
            output_channel: 0,
        }
    }

    #[test]
    fn test_post_order_children_first() {
        let mut store = NodeStore::new();
        // 0 (root) ← 1 ← {2, 3}
        store.insert(NodeId(2), plain_entry(vec![]));
        store.insert(NodeId(3), plain_entry(vec![]));
        store.insert(NodeId(1), plain_entry(vec![edge(2), edge(3)]));
        store.insert(NodeId(0), root_entry(vec![edge(1)]));

        let mut discovered = HashSet::new();
        let order = post_order(&store, NodeId(0), &mut discovered);
        assert_eq!(order, vec![NodeId(2), NodeId(3), NodeId(1), NodeId(0)]);
    }

    #[test]
    fn test_shared_child_rendered_once() {
        let mut store = NodeStore::new();
        // Two roots both reaching node 5.
        store.insert(NodeId(5), plain_entry(vec![]));
        store.insert(NodeId(0), root_entry(vec![edge(5)]));
        store.insert(NodeId(1), root_entry(vec![edge(5)]));

        let mut allocator = BufferAllocator::new(64);
        let schedule = compile(
            &store,
            &[NodeId(0), NodeId(1)],
            &mut allocator,
            64,
        );
        assert_eq!(schedule.num_roots(), 2);
        // Node 5 appears in the first root's subsequence only.
        assert_eq!(schedule.ops_per_root(), vec![2, 1]);
        assert_eq!(schedule.participants().len(), 3);
    }

    #[test]
    fn test_diamond_is_single_visit() {
        let mut store = NodeStore::new();
        // 0 ← 1 ← {2, 3}, 2 ← 4, 3 ← 4
        store.insert(NodeId(4), plain_entry(vec![]));
        store.insert(NodeId(2), plain_entry(vec![edge(4)]));
        store.insert(NodeId(3), plain_entry(vec![edge(4)]));
        store.insert(NodeId(1), plain_entry(vec![edge(2), edge(3)]));
        store.insert(NodeId(0), root_entry(vec![edge(1)]));

        let mut discovered = HashSet::new();
        let order = post_order(&store, NodeId(0), &mut discovered);
        assert_eq!(order.len(), 5);
        // 4 precedes both 2 and 3; every node appears once.
        let pos = |id: u32| order.iter().position(|n| *n == NodeId(id)).unwrap();
        assert!(pos(4) < pos(2));
        assert!(pos(4) < pos(3));
        assert!(pos(1) < pos(0));
    }

    #[test]
    fn test_missing_child_becomes_silence() {
        let mut store = NodeStore::new();
        store.insert(NodeId(0), root_entry(vec![edge(99)]));

        let mut allocator = BufferAllocator::new(64);
        let schedule = compile(&store, &[NodeId(0)], &mut allocator, 64);
        assert_eq!(schedule.num_roots(), 1);
        assert_eq!(schedule.ops_per_root(), vec![1]);
    }

    #[test]
    fn test_recompile_is_structurally_stable() {
        let mut store = NodeStore::new();
        store.insert(NodeId(2), plain_entry(vec![]));
        store.insert(NodeId(1), plain_entry(vec![edge(2)]));
        store.insert(NodeId(0), root_entry(vec![edge(1)]));

        let mut allocator = BufferAllocator::new(64);
        let first = compile(&store, &[NodeId(0)], &mut allocator, 64);
        let second = compile(&store, &[NodeId(0)], &mut allocator, 64);
        assert_eq!(first.participants(), second.participants());
        assert_eq!(first.ops_per_root(), second.ops_per_root());
        assert_eq!(allocator.allocated(), 3);
    }
}

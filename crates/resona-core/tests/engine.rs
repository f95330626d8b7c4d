//! Runtime-level behavior: instruction application, schedule handoff,
//! fades, events, and garbage collection, exercised with minimal local node
//! kinds so the core crate tests itself without the built-in kind library.

use std::sync::Arc;

use resona_core::atomic::AtomicF32;
use resona_core::node::{ControlNode, DspNode, NodeId, NodeParts, RenderContext};
use resona_core::{
    Instruction, PropertyError, ResourceMap, Runtime, RuntimeConfig, RuntimeError, Value,
};

// --- Local test kinds ---

struct SourceControl {
    value: Arc<AtomicF32>,
}

impl ControlNode for SourceControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "value" {
            let number = value.as_number().ok_or(PropertyError::InvalidType)?;
            if !number.is_finite() {
                return Err(PropertyError::InvalidValue);
            }
            self.value.store(number as f32);
        }
        Ok(())
    }
}

struct SourceDsp {
    value: Arc<AtomicF32>,
}

impl DspNode for SourceDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let level = self.value.load();
        for out in ctx.outputs.iter_mut() {
            out.fill(level);
        }
    }
}

fn source_factory(_config: &RuntimeConfig) -> NodeParts {
    let value = Arc::new(AtomicF32::new(0.0));
    NodeParts::new(
        SourceControl {
            value: Arc::clone(&value),
        },
        SourceDsp { value },
    )
}

struct SumControl;

impl ControlNode for SumControl {
    fn set_property(
        &mut self,
        _key: &str,
        _value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        Ok(())
    }
}

struct SumDsp;

impl DspNode for SumDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        out.fill(0.0);
        for input in ctx.inputs {
            for (acc, &sample) in out.iter_mut().zip(*input) {
                *acc += sample;
            }
        }
    }
}

fn sum_factory(_config: &RuntimeConfig) -> NodeParts {
    NodeParts::new(SumControl, SumDsp)
}

struct TickerControl {
    ticks: resona_core::spsc::Consumer<u32>,
}

impl ControlNode for TickerControl {
    fn set_property(
        &mut self,
        _key: &str,
        _value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        Ok(())
    }

    fn process_events(&mut self, emit: &mut dyn FnMut(&str, Value)) {
        while let Some(tick) = self.ticks.pop() {
            emit("tick", Value::Number(f64::from(tick)));
        }
    }
}

struct TickerDsp {
    ticks: resona_core::spsc::Producer<u32>,
    count: u32,
}

impl DspNode for TickerDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        ctx.zero_outputs();
        self.count += 1;
        let _ = self.ticks.push(self.count);
    }
}

fn ticker_factory(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = resona_core::spsc::channel(64);
    NodeParts::new(TickerControl { ticks: rx }, TickerDsp { ticks: tx, count: 0 })
}

// --- Helpers ---

fn engine() -> (Runtime, resona_core::RenderProcessor) {
    let (mut runtime, processor) = Runtime::new(RuntimeConfig::default());
    runtime.register_node_kind("source", source_factory).unwrap();
    runtime.register_node_kind("sum", sum_factory).unwrap();
    runtime.register_node_kind("ticker", ticker_factory).unwrap();
    (runtime, processor)
}

fn create(id: u32, kind: &str) -> Instruction {
    Instruction::CreateNode {
        id: NodeId(id),
        kind: kind.into(),
    }
}

fn append(parent: u32, child: u32) -> Instruction {
    Instruction::AppendChild {
        parent: NodeId(parent),
        child: NodeId(child),
        output_channel: 0,
    }
}

fn set(id: u32, key: &str, value: Value) -> Instruction {
    Instruction::SetProperty {
        id: NodeId(id),
        key: key.into(),
        value,
    }
}

fn activate(ids: &[u32]) -> Instruction {
    Instruction::ActivateRoots(ids.iter().map(|&id| NodeId(id)).collect())
}

fn run_block(processor: &mut resona_core::RenderProcessor, frames: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; frames];
    processor.process(&[], &mut [&mut out[..]], frames);
    out
}

/// Everything after the fade transient should sit at the expected level.
fn assert_settled(block: &[f32], expected: f32) {
    for (i, &sample) in block.iter().enumerate().skip(128) {
        assert!(
            (sample - expected).abs() < 1e-6,
            "sample {i}: expected {expected}, got {sample}"
        );
    }
}

// --- Tests ---

#[test]
fn test_source_through_root() {
    let (mut runtime, mut processor) = engine();
    runtime
        .apply_instructions(&[
            create(1, "source"),
            set(1, "value", Value::Number(0.75)),
            create(2, "root"),
            append(2, 1),
            activate(&[2]),
            Instruction::Commit,
        ])
        .unwrap();

    let block = run_block(&mut processor, 512);
    assert_settled(&block, 0.75);
    // Fade-in starts from silence.
    assert!(block[0].abs() < 0.02);
}

#[test]
fn test_zero_frames_is_a_no_op() {
    let (mut runtime, mut processor) = engine();
    runtime
        .apply_instructions(&[
            create(1, "source"),
            set(1, "value", Value::Number(1.0)),
            create(2, "root"),
            append(2, 1),
            activate(&[2]),
            Instruction::Commit,
        ])
        .unwrap();
    let mut out = vec![7.0f32; 16];
    processor.process(&[], &mut [&mut out[..0]], 0);
    assert!(out.iter().all(|&x| x == 7.0));
}

#[test]
fn test_no_schedule_renders_silence() {
    let (_runtime, mut processor) = engine();
    let mut out = vec![1.0f32; 64];
    processor.process(&[], &mut [&mut out[..]], 64);
    assert!(out.iter().all(|&x| x == 0.0));
    assert!(!processor.has_schedule());
}

#[test]
fn test_out_of_range_channel_is_skipped() {
    let (mut runtime, mut processor) = engine();
    runtime
        .apply_instructions(&[
            create(1, "source"),
            set(1, "value", Value::Number(1.0)),
            create(2, "root"),
            set(2, "channel", Value::Number(5.0)),
            append(2, 1),
            activate(&[2]),
            Instruction::Commit,
        ])
        .unwrap();

    // One output channel; the root wants channel 5 and is skipped.
    let block = run_block(&mut processor, 512);
    assert!(block.iter().all(|&x| x == 0.0));

    // Repointing the root at a valid channel brings it back.
    runtime
        .apply_instructions(&[set(2, "channel", Value::Number(0.0))])
        .unwrap();
    let block = run_block(&mut processor, 512);
    assert_settled(&block, 1.0);
}

#[test]
fn test_fan_in_sums_and_shared_child_processes_once() {
    let (mut runtime, mut processor) = engine();
    // sum(source, source) under one root; the same source feeds both inputs.
    runtime
        .apply_instructions(&[
            create(1, "source"),
            set(1, "value", Value::Number(0.25)),
            create(2, "sum"),
            append(2, 1),
            append(2, 1),
            create(3, "root"),
            append(3, 2),
            activate(&[3]),
            Instruction::Commit,
        ])
        .unwrap();

    let schedule = runtime.current_schedule().unwrap();
    assert_eq!(schedule.participants().len(), 3, "shared child visits once");

    let block = run_block(&mut processor, 512);
    assert_settled(&block, 0.5);
}

#[test]
fn test_identity_batch_is_structurally_stable() {
    let batch = [
        create(1, "source"),
        set(1, "value", Value::Number(0.5)),
        create(2, "root"),
        append(2, 1),
        activate(&[2]),
        Instruction::Commit,
    ];
    let follow_up = [activate(&[2]), Instruction::Commit];

    let (mut runtime, _processor) = engine();
    runtime.apply_instructions(&batch).unwrap();
    let first = runtime.current_schedule().unwrap();
    let (participants, ops) = (first.participants().to_vec(), first.ops_per_root());

    runtime.apply_instructions(&follow_up).unwrap();
    let second = runtime.current_schedule().unwrap();
    assert_eq!(second.participants(), participants);
    assert_eq!(second.ops_per_root(), ops);
    assert_eq!(runtime.node_count(), 2);
}

#[test]
fn test_event_pump_relays_per_block_events() {
    let (mut runtime, mut processor) = engine();
    runtime
        .apply_instructions(&[
            create(1, "ticker"),
            create(2, "root"),
            append(2, 1),
            activate(&[2]),
            Instruction::Commit,
        ])
        .unwrap();

    for _ in 0..4 {
        let _ = run_block(&mut processor, 512);
    }
    let mut events = Vec::new();
    runtime.process_queued_events(&mut |name, payload| {
        events.push((name.to_string(), payload));
    });
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|(name, _)| name == "tick"));
    assert_eq!(events[3].1, Value::Number(4.0));

    // Pump again without rendering: nothing queued.
    let mut late = 0;
    runtime.process_queued_events(&mut |_, _| late += 1);
    assert_eq!(late, 0);
}

#[test]
fn test_error_codes() {
    let (mut runtime, _processor) = engine();

    assert_eq!(
        runtime
            .apply_instructions(&[create(1, "ghost")])
            .unwrap_err(),
        RuntimeError::UnknownNodeType("ghost".into())
    );

    runtime
        .apply_instructions(&[create(1, "source"), Instruction::Commit])
        .unwrap();
    assert_eq!(
        runtime
            .apply_instructions(&[create(1, "source")])
            .unwrap_err()
            .code(),
        3
    );
    assert_eq!(
        runtime
            .apply_instructions(&[set(9, "value", Value::Number(1.0))])
            .unwrap_err(),
        RuntimeError::NodeNotFound(NodeId(9))
    );
    assert_eq!(
        runtime
            .apply_instructions(&[set(1, "value", Value::String("loud".into()))])
            .unwrap_err()
            .code(),
        5
    );
    assert_eq!(
        runtime
            .apply_instructions(&[set(1, "value", Value::Number(f64::INFINITY))])
            .unwrap_err()
            .code(),
        6
    );
    assert_eq!(
        runtime
            .apply_instructions(&[activate(&[1]), Instruction::Commit])
            .unwrap_err()
            .code(),
        7
    );
}

#[test]
fn test_cycle_rejected() {
    let (mut runtime, _processor) = engine();
    let result = runtime.apply_instructions(&[
        create(1, "sum"),
        create(2, "sum"),
        append(1, 2),
        append(2, 1),
        Instruction::Commit,
    ]);
    assert!(matches!(
        result.unwrap_err(),
        RuntimeError::InvariantViolation(_)
    ));
    // The failed batch committed nothing.
    assert_eq!(runtime.node_count(), 0);
}

#[test]
fn test_failed_batch_discards_staged_nodes() {
    let (mut runtime, _processor) = engine();
    let result = runtime.apply_instructions(&[
        create(1, "source"),
        create(2, "ghost"),
        Instruction::Commit,
    ]);
    assert!(result.is_err());
    assert_eq!(runtime.node_count(), 0);
}

#[test]
fn test_gc_lifecycle() {
    let (mut runtime, mut processor) = engine();
    runtime
        .apply_instructions(&[
            create(1, "source"),
            create(2, "root"),
            append(2, 1),
            activate(&[2]),
            Instruction::Commit,
        ])
        .unwrap();
    let _ = run_block(&mut processor, 512);
    assert!(runtime.gc().is_empty(), "live schedule holds both nodes");

    // Replace the graph; the old root fades, so it survives this collection.
    runtime
        .apply_instructions(&[
            create(3, "source"),
            create(4, "root"),
            append(4, 3),
            activate(&[4]),
            Instruction::Commit,
        ])
        .unwrap();
    let _ = run_block(&mut processor, 512);
    assert!(runtime.gc().is_empty(), "old root still fading");

    // A third activation compiles a schedule without the settled first root.
    runtime
        .apply_instructions(&[
            create(5, "source"),
            create(6, "root"),
            append(6, 5),
            activate(&[6]),
            Instruction::Commit,
        ])
        .unwrap();
    let _ = run_block(&mut processor, 512);
    let collected = runtime.gc();
    assert_eq!(collected, vec![NodeId(1), NodeId(2)]);

    // Idempotence: immediately collecting again finds nothing.
    assert!(runtime.gc().is_empty());
}

#[test]
fn test_oversized_process_call_is_chunked() {
    let (mut runtime, mut processor) = engine();
    runtime
        .apply_instructions(&[
            create(1, "source"),
            set(1, "value", Value::Number(0.5)),
            create(2, "root"),
            append(2, 1),
            activate(&[2]),
            Instruction::Commit,
        ])
        .unwrap();

    // Three blocks in one call.
    let block = run_block(&mut processor, 512 * 3);
    assert_settled(&block[1024..], 0.5);
}

#[test]
fn test_snapshot_reflects_applied_properties() {
    let (mut runtime, _processor) = engine();
    runtime
        .apply_instructions(&[
            create(1, "source"),
            set(1, "value", Value::Number(0.3)),
            set(1, "name", Value::String("lfo".into())),
            Instruction::Commit,
        ])
        .unwrap();
    let snapshot = runtime.snapshot();
    let props = snapshot.get(&NodeId(1)).unwrap();
    assert_eq!(props.get("value"), Some(&Value::Number(0.3)));
    assert_eq!(props.get("name"), Some(&Value::String("lfo".into())));
}

#[test]
fn test_shared_resource_surface() {
    let (mut runtime, _processor) = engine();
    assert!(runtime.add_shared_resource("kick", resona_core::AudioData::from_mono(vec![1.0])));
    assert!(!runtime.add_shared_resource("kick", resona_core::AudioData::from_mono(vec![2.0])));
    assert_eq!(runtime.shared_resource_names(), vec!["kick".to_string()]);
    assert_eq!(runtime.prune_shared_resources(), 1);
    assert!(runtime.shared_resource_names().is_empty());
}

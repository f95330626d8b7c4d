//! Resona Core — realtime audio-graph engine.
//!
//! A client declares a signal-flow graph of DSP nodes rooted at one or more
//! output channels; the engine reconciles incremental declarative updates into
//! a running render schedule and produces audio block-by-block on a realtime
//! thread with a strict no-allocation, no-locking, no-blocking discipline.
//!
//! # Architecture
//!
//! The engine uses a **two-object split**:
//!
//! - [`Runtime`] — owned by the control thread. Applies instruction batches
//!   into the [`NodeStore`](store::NodeStore), compiles render schedules,
//!   pumps node events, loads shared resources, and garbage-collects nodes
//!   that no live schedule references.
//! - [`RenderProcessor`] — moved to the realtime thread. Takes the latest
//!   [`RenderSchedule`](schedule::RenderSchedule) off a wait-free queue at a
//!   block boundary and executes it, mixing each root's output into its host
//!   channel under a click-free linear fade.
//!
//! The two halves communicate exclusively through bounded lock-free queues
//! ([`spsc`]) and shared-immutable handles; superseded schedules travel back
//! over a return queue so every drop happens off the realtime thread.
//!
//! # Node contract
//!
//! Each node kind is a pair of halves joined by lock-free state: a
//! [`ControlNode`](node::ControlNode) (properties, event drain, reset) living
//! in the store, and a [`DspNode`](node::DspNode) kernel invoked once per
//! block by the renderer. See [`node`] for the full contract.
//!
//! # Example
//!
//! ```rust
//! use resona_core::{Runtime, RuntimeConfig};
//!
//! let (runtime, processor) = Runtime::new(RuntimeConfig::default());
//! // register node kinds, apply instruction batches on this thread, and
//! // move `processor` to the audio thread to render blocks.
//! # drop((runtime, processor));
//! ```

pub mod atomic;
pub mod config;
pub mod error;
pub mod factory;
pub mod instructions;
pub mod node;
pub mod resource;
pub mod ring;
pub mod root;
pub mod rt_cell;
pub mod runtime;
pub mod schedule;
pub mod scheduler;
pub mod scratch;
pub mod spsc;
pub mod store;
pub mod value;

mod render;

pub use config::RuntimeConfig;
pub use error::{PropertyError, RuntimeError};
pub use factory::{NodeFactory, NodeRegistry};
pub use instructions::Instruction;
pub use node::{ControlNode, DspNode, Kernel, NodeId, NodeParts, RenderContext};
pub use render::RenderProcessor;
pub use resource::{AudioData, ResourceMap, TapBuffer};
pub use ring::RingBuffer;
pub use root::RootState;
pub use runtime::Runtime;
pub use value::Value;

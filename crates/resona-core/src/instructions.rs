//! Instruction batches and their wire decoding.
//!
//! Clients describe graph changes as an ordered batch of instructions,
//! applied transactionally by
//! [`Runtime::apply_instructions`](crate::Runtime::apply_instructions). On
//! the wire a batch is an array of tagged tuples (arrays whose first element
//! is an instruction-type integer); [`Instruction::decode_batch`] turns that
//! shape into typed instructions, rejecting anything malformed with
//! [`RuntimeError::InvalidInstructionFormat`].

use crate::error::RuntimeError;
use crate::node::NodeId;
use crate::value::Value;

/// Wire tag for `CreateNode`.
const TAG_CREATE_NODE: f64 = 0.0;
/// Wire tag for `AppendChild`.
const TAG_APPEND_CHILD: f64 = 2.0;
/// Wire tag for `SetProperty`.
const TAG_SET_PROPERTY: f64 = 3.0;
/// Wire tag for `ActivateRoots`.
const TAG_ACTIVATE_ROOTS: f64 = 4.0;
/// Wire tag for `CommitUpdates`.
const TAG_COMMIT: f64 = 5.0;

/// One step of a client batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Instantiate a registered kind under a fresh id.
    CreateNode {
        /// Client-assigned id, unique for the runtime's lifetime.
        id: NodeId,
        /// Registered kind name.
        kind: String,
    },
    /// Append `child` to `parent`'s ordered child list.
    AppendChild {
        /// The consuming node.
        parent: NodeId,
        /// The producing node.
        child: NodeId,
        /// Which of the child's output channels feeds the parent.
        output_channel: usize,
    },
    /// Set one property on a node.
    SetProperty {
        /// Target node.
        id: NodeId,
        /// Property name.
        key: String,
        /// Property value.
        value: Value,
    },
    /// Declare the target set of active roots.
    ActivateRoots(
        /// Root ids, in mix order.
        Vec<NodeId>,
    ),
    /// Merge staged changes; rebuild the schedule if roots were activated.
    Commit,
}

impl Instruction {
    /// Decodes a wire batch (array of tagged tuples).
    pub fn decode_batch(batch: &Value) -> Result<Vec<Instruction>, RuntimeError> {
        let items = batch
            .as_array()
            .ok_or_else(|| malformed("batch is not an array"))?;
        items.iter().map(Self::decode_one).collect()
    }

    fn decode_one(raw: &Value) -> Result<Instruction, RuntimeError> {
        let tuple = raw
            .as_array()
            .ok_or_else(|| malformed("instruction is not an array"))?;
        let tag = tuple
            .first()
            .and_then(Value::as_number)
            .ok_or_else(|| malformed("missing instruction tag"))?;

        if tag == TAG_CREATE_NODE {
            let [_, id, kind] = tuple else {
                return Err(malformed("CreateNode expects [0, id, kind]"));
            };
            Ok(Instruction::CreateNode {
                id: decode_id(id)?,
                kind: kind
                    .as_str()
                    .ok_or_else(|| malformed("CreateNode kind must be a string"))?
                    .to_string(),
            })
        } else if tag == TAG_APPEND_CHILD {
            let [_, parent, child, channel] = tuple else {
                return Err(malformed("AppendChild expects [2, parent, child, outChannel]"));
            };
            Ok(Instruction::AppendChild {
                parent: decode_id(parent)?,
                child: decode_id(child)?,
                output_channel: channel
                    .as_index()
                    .ok_or_else(|| malformed("output channel must be a non-negative integer"))?,
            })
        } else if tag == TAG_SET_PROPERTY {
            let [_, id, key, value] = tuple else {
                return Err(malformed("SetProperty expects [3, id, key, value]"));
            };
            Ok(Instruction::SetProperty {
                id: decode_id(id)?,
                key: key
                    .as_str()
                    .ok_or_else(|| malformed("property key must be a string"))?
                    .to_string(),
                value: value.clone(),
            })
        } else if tag == TAG_ACTIVATE_ROOTS {
            let [_, ids] = tuple else {
                return Err(malformed("ActivateRoots expects [4, [id, ...]]"));
            };
            let ids = ids
                .as_array()
                .ok_or_else(|| malformed("ActivateRoots expects an id array"))?
                .iter()
                .map(decode_id)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Instruction::ActivateRoots(ids))
        } else if tag == TAG_COMMIT {
            if tuple.len() != 1 {
                return Err(malformed("CommitUpdates expects [5]"));
            }
            Ok(Instruction::Commit)
        } else {
            Err(malformed("unrecognized instruction tag"))
        }
    }
}

fn decode_id(value: &Value) -> Result<NodeId, RuntimeError> {
    value
        .as_index()
        .map(|raw| NodeId(raw as u32))
        .ok_or_else(|| malformed("node id must be a non-negative integer"))
}

fn malformed(message: &str) -> RuntimeError {
    RuntimeError::InvalidInstructionFormat(message.to_string())
}

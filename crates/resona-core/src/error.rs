//! Error types for the control surface.
//!
//! Every failure of [`Runtime::apply_instructions`](crate::Runtime::apply_instructions)
//! maps to one integer in a closed taxonomy so hosts that speak the wire
//! format can relay it without interpreting Rust types. The realtime path
//! never produces errors: a node that cannot compute (missing inputs, bad
//! state) zeroes its output instead.

use crate::node::NodeId;

/// Errors surfaced by instruction application and registration.
///
/// [`RuntimeError::code`] gives the wire integer; `0` is reserved for success
/// and is represented by `Ok(())`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// `CreateNode` named a kind that was never registered.
    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),

    /// An instruction referenced a node id that does not exist.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// `CreateNode` reused an id that is already live or staged.
    #[error("node {0} already exists")]
    NodeAlreadyExists(NodeId),

    /// `register_node_kind` was called with a name that is already taken.
    #[error("node type `{0}` is already registered")]
    NodeTypeAlreadyExists(String),

    /// A property was set with a value of the wrong shape.
    #[error("invalid type for property `{key}` on node {id}")]
    InvalidPropertyType {
        /// Target node.
        id: NodeId,
        /// Property name.
        key: String,
    },

    /// A property value had the right shape but an unacceptable value.
    #[error("invalid value for property `{key}` on node {id}")]
    InvalidPropertyValue {
        /// Target node.
        id: NodeId,
        /// Property name.
        key: String,
    },

    /// A structural rule of the graph was violated.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The wire batch was malformed (wrong tuple arity, non-numeric id, ...).
    #[error("invalid instruction format: {0}")]
    InvalidInstructionFormat(String),
}

impl RuntimeError {
    /// The wire integer for this error (`1..=8`; success is `0`).
    pub fn code(&self) -> u8 {
        match self {
            RuntimeError::UnknownNodeType(_) => 1,
            RuntimeError::NodeNotFound(_) => 2,
            RuntimeError::NodeAlreadyExists(_) => 3,
            RuntimeError::NodeTypeAlreadyExists(_) => 4,
            RuntimeError::InvalidPropertyType { .. } => 5,
            RuntimeError::InvalidPropertyValue { .. } => 6,
            RuntimeError::InvariantViolation(_) => 7,
            RuntimeError::InvalidInstructionFormat(_) => 8,
        }
    }
}

/// Outcome of a node-level `set_property` call.
///
/// The applier attaches the node id and key to produce the corresponding
/// [`RuntimeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    /// The value's variant does not fit the property.
    #[error("property value has the wrong type")]
    InvalidType,
    /// The variant fits but the value is out of range or otherwise unusable.
    #[error("property value is out of range")]
    InvalidValue,
}

impl PropertyError {
    pub(crate) fn into_runtime(self, id: NodeId, key: &str) -> RuntimeError {
        match self {
            PropertyError::InvalidType => RuntimeError::InvalidPropertyType {
                id,
                key: key.to_string(),
            },
            PropertyError::InvalidValue => RuntimeError::InvalidPropertyValue {
                id,
                key: key.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_wire_taxonomy() {
        assert_eq!(RuntimeError::UnknownNodeType("x".into()).code(), 1);
        assert_eq!(RuntimeError::NodeNotFound(NodeId(3)).code(), 2);
        assert_eq!(RuntimeError::NodeAlreadyExists(NodeId(3)).code(), 3);
        assert_eq!(RuntimeError::NodeTypeAlreadyExists("x".into()).code(), 4);
        assert_eq!(
            RuntimeError::InvalidPropertyType {
                id: NodeId(0),
                key: "k".into()
            }
            .code(),
            5
        );
        assert_eq!(
            RuntimeError::InvalidPropertyValue {
                id: NodeId(0),
                key: "k".into()
            }
            .code(),
            6
        );
        assert_eq!(RuntimeError::InvariantViolation("x".into()).code(), 7);
        assert_eq!(
            RuntimeError::InvalidInstructionFormat("x".into()).code(),
            8
        );
    }
}

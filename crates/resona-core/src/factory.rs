//! Kind-name → factory registry.
//!
//! Node kinds are registered by name before any instruction batch references
//! them; `CreateNode` looks the name up here. Built-in kinds live in their
//! own crates and are registered in bulk by `resona-registry`; hosts add
//! custom kinds through [`Runtime::register_node_kind`](crate::Runtime::register_node_kind).

use std::collections::HashMap;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::node::NodeParts;

/// Constructor for one node kind: builds both halves, wired together.
pub type NodeFactory = fn(&RuntimeConfig) -> NodeParts;

/// Registry of constructible node kinds.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NodeTypeAlreadyExists`] when the name is taken.
    pub fn register(&mut self, name: &str, factory: NodeFactory) -> Result<(), RuntimeError> {
        if self.factories.contains_key(name) {
            return Err(RuntimeError::NodeTypeAlreadyExists(name.to_string()));
        }
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// True when `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiates the kind registered under `name`.
    pub fn create(&self, name: &str, config: &RuntimeConfig) -> Option<NodeParts> {
        self.factories.get(name).map(|factory| factory(config))
    }

    /// Registered kind names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root;

    #[test]
    fn test_register_and_create() {
        let mut registry = NodeRegistry::new();
        registry.register("root", root::factory).unwrap();
        assert!(registry.contains("root"));
        let parts = registry.create("root", &RuntimeConfig::default()).unwrap();
        assert!(parts.root.is_some());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = NodeRegistry::new();
        registry.register("root", root::factory).unwrap();
        assert_eq!(
            registry.register("root", root::factory),
            Err(RuntimeError::NodeTypeAlreadyExists("root".into()))
        );
    }

    #[test]
    fn test_unknown_kind() {
        let registry = NodeRegistry::new();
        assert!(!registry.contains("ghost"));
        assert!(registry.create("ghost", &RuntimeConfig::default()).is_none());
    }
}

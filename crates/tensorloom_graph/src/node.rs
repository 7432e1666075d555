// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.

use crate::graph::{Graph, GraphError};
use crate::port::{DataType, Port, PortId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Value and dataset sources
    Source,
    /// Terminal consumers (previews, writers)
    Sink,
    /// Math operations
    Math,
    /// Dataset transformations
    Dataset,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// A node instance in the graph.
///
/// A node owns the *identity mapping* from names to port ids for its
/// inputs and outputs (two disjoint, independently-named views), but
/// not the connections those ports hold to ports of other nodes; edge
/// lifetime is managed by explicit connect/disconnect calls on the
/// graph.
#[derive(Debug)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Display title
    pub title: String,
    pub(crate) inputs: IndexMap<String, PortId>,
    pub(crate) outputs: IndexMap<String, PortId>,
}

impl Node {
    pub(crate) fn new(title: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            title: title.into(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    /// Look up an input port id by name
    pub fn input_id(&self, name: &str) -> Option<PortId> {
        self.inputs.get(name).copied()
    }

    /// Look up an output port id by name
    pub fn output_id(&self, name: &str) -> Option<PortId> {
        self.outputs.get(name).copied()
    }

    /// Input ports as `(name, id)` pairs, in insertion order
    pub fn inputs(&self) -> impl Iterator<Item = (&str, PortId)> {
        self.inputs.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Output ports as `(name, id)` pairs, in insertion order
    pub fn outputs(&self) -> impl Iterator<Item = (&str, PortId)> {
        self.outputs.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Ids of all ports registered on this node
    pub fn port_ids(&self) -> impl Iterator<Item = PortId> + '_ {
        self.inputs.values().chain(self.outputs.values()).copied()
    }

    /// Number of input ports
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output ports
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }
}

/// Declared port on a [`NodeSpec`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSpec {
    /// Port name, unique within the spec's inputs or outputs
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Whether multiple simultaneous connections are allowed
    pub allows_multiple_connections: bool,
}

impl PortSpec {
    /// Declare an input port. Inputs take a single connection by
    /// default: a new wire replaces the previous one.
    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            allows_multiple_connections: false,
        }
    }

    /// Declare an output port. Outputs fan out to multiple
    /// connections by default.
    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            allows_multiple_connections: true,
        }
    }

    fn build(&self) -> Port {
        Port::new(self.data_type.clone())
            .with_multiple_connections(self.allows_multiple_connections)
    }
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Declared input ports
    pub inputs: Vec<PortSpec>,
    /// Declared output ports
    pub outputs: Vec<PortSpec>,
}

impl NodeSpec {
    /// Create a node from this spec: the node and all of its declared
    /// ports are added to `graph` in one call.
    pub fn instantiate(&self, graph: &mut Graph) -> Result<NodeId, GraphError> {
        let node = graph.add_node(self.name.clone());
        for spec in &self.inputs {
            let port = graph.add_port(spec.build());
            graph.add_input_port(node, spec.name.clone(), port)?;
        }
        for spec in &self.outputs {
            let port = graph.add_port(spec.build());
            graph.add_output_port(node, spec.name.clone(), port)?;
        }
        Ok(node)
    }
}

/// Registry of available node types
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    specs: IndexMap<String, NodeSpec>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            specs: IndexMap::new(),
        }
    }

    /// Register a node spec
    pub fn register(&mut self, spec: NodeSpec) {
        self.specs.insert(spec.id.clone(), spec);
    }

    /// Get a node spec by type ID
    pub fn get(&self, id: &str) -> Option<&NodeSpec> {
        self.specs.get(id)
    }

    /// Get all registered specs
    pub fn specs(&self) -> impl Iterator<Item = &NodeSpec> {
        self.specs.values()
    }

    /// Get specs by category
    pub fn specs_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeSpec> {
        self.specs.values().filter(move |s| s.category == category)
    }

    /// Instantiate a registered spec into `graph`
    pub fn instantiate(&self, graph: &mut Graph, type_id: &str) -> Result<NodeId, GraphError> {
        let spec = self
            .get(type_id)
            .ok_or_else(|| GraphError::UnknownSpec(type_id.to_string()))?;
        spec.instantiate(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_spec() -> NodeSpec {
        NodeSpec {
            id: "sum".to_string(),
            name: "Sum".to_string(),
            category: NodeCategory::Math,
            description: "Adds two values".to_string(),
            inputs: vec![
                PortSpec::input("value1", DataType::Int),
                PortSpec::input("value2", DataType::Int),
            ],
            outputs: vec![PortSpec::output("result", DataType::Int)],
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = NodeRegistry::new();
        registry.register(sum_spec());

        assert!(registry.get("sum").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.specs().count(), 1);
        assert_eq!(registry.specs_in_category(NodeCategory::Math).count(), 1);
        assert_eq!(registry.specs_in_category(NodeCategory::Source).count(), 0);
    }

    #[test]
    fn test_instantiate_creates_declared_ports() {
        let mut registry = NodeRegistry::new();
        registry.register(sum_spec());

        let mut graph = Graph::new("test");
        let node = registry.instantiate(&mut graph, "sum").unwrap();

        let node_ref = graph.node(node).unwrap();
        assert_eq!(node_ref.title, "Sum");
        assert_eq!(node_ref.input_count(), 2);
        assert_eq!(node_ref.output_count(), 1);

        let value1 = graph.input(node, "value1").unwrap();
        let port = graph.port(value1).unwrap();
        assert_eq!(port.data_type(), &DataType::Int);
        assert!(!port.allows_multiple_connections());
        assert_eq!(port.node(), Some(node));

        let result = graph.output(node, "result").unwrap();
        assert!(graph.port(result).unwrap().allows_multiple_connections());
    }

    #[test]
    fn test_instantiate_unknown_spec() {
        let registry = NodeRegistry::new();
        let mut graph = Graph::new("test");

        assert!(matches!(
            registry.instantiate(&mut graph, "missing"),
            Err(GraphError::UnknownSpec(_))
        ));
    }

    #[test]
    fn test_spec_serialization_round_trip() {
        let spec = sum_spec();
        let json = serde_json::to_string(&spec).unwrap();
        let back: NodeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "sum");
        assert_eq!(back.inputs.len(), 2);
    }
}

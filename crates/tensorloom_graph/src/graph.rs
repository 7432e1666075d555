// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, ports and their connections.

use crate::node::{Node, NodeId};
use crate::port::{Port, PortId};
use crate::propagation::{Consumer, Producer, PropagationError, WorkList};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A node graph.
///
/// The graph is the single owner of all connection state: ports and
/// nodes live in arenas keyed by id, and the symmetric edge set is
/// stored as per-port adjacency that is always updated for both
/// endpoints inside one routine. Nothing here recurses into another
/// public mutator, so the symmetry invariant cannot be observed
/// half-applied.
///
/// Topology mutation requires `&mut Graph` while propagation runs
/// against `&Graph`, which statically keeps user callbacks from
/// rewiring the graph mid-delivery.
#[derive(Debug)]
pub struct Graph {
    /// Graph name
    pub name: String,
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) ports: IndexMap<PortId, Port>,
    pub(crate) propagation: RefCell<WorkList>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            ports: IndexMap::new(),
            propagation: RefCell::new(WorkList::default()),
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, title: impl Into<String>) -> NodeId {
        let node = Node::new(title);
        let id = node.id;
        tracing::debug!("Added node {:?} ({:?})", node.title, id);
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node together with all of its ports. Every connection
    /// held by those ports is severed first.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.swap_remove(&node_id)?;
        for port_id in node.port_ids().collect::<Vec<_>>() {
            self.sever_all(port_id);
            self.ports.shift_remove(&port_id);
        }
        tracing::debug!("Removed node {:?} ({:?})", node.title, node_id);
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a detached port to the graph and return its id
    pub fn add_port(&mut self, port: Port) -> PortId {
        let id = port.id;
        self.ports.insert(id, port);
        id
    }

    /// Get a port by ID
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.ports.get(&port_id)
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    /// Get the number of ports
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Remove a port from the graph entirely: its connections are
    /// severed, its node registration (if any) is dropped, and the
    /// port is taken out of the arena.
    pub fn remove_port(&mut self, port_id: PortId) -> Option<Port> {
        self.sever_all(port_id);
        if let Some(owner) = self.ports.get(&port_id).and_then(Port::node) {
            if let Some(node) = self.nodes.get_mut(&owner) {
                node.inputs.retain(|_, id| *id != port_id);
                node.outputs.retain(|_, id| *id != port_id);
            }
        }
        self.ports.shift_remove(&port_id)
    }

    /// Register `port` as an input of `node` under `name` and set the
    /// port's owning-node back-reference.
    pub fn add_input_port(
        &mut self,
        node_id: NodeId,
        name: impl Into<String>,
        port_id: PortId,
    ) -> Result<(), GraphError> {
        self.attach_port(node_id, name.into(), port_id, Role::Input)
    }

    /// Register `port` as an output of `node` under `name` and set the
    /// port's owning-node back-reference.
    pub fn add_output_port(
        &mut self,
        node_id: NodeId,
        name: impl Into<String>,
        port_id: PortId,
    ) -> Result<(), GraphError> {
        self.attach_port(node_id, name.into(), port_id, Role::Output)
    }

    fn attach_port(
        &mut self,
        node_id: NodeId,
        name: String,
        port_id: PortId,
        role: Role,
    ) -> Result<(), GraphError> {
        let port = self
            .ports
            .get(&port_id)
            .ok_or(GraphError::UnknownPort(port_id))?;
        if port.node.is_some() {
            return Err(GraphError::PortAlreadyAttached(port_id));
        }
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::UnknownNode(node_id))?;
        let mapping = match role {
            Role::Input => &mut node.inputs,
            Role::Output => &mut node.outputs,
        };
        if mapping.contains_key(&name) {
            return Err(GraphError::DuplicateName {
                node: node_id,
                name,
            });
        }
        tracing::debug!("Registered {:?} port {:?} on node {:?}", role, name, node_id);
        mapping.insert(name, port_id);
        if let Some(port) = self.ports.get_mut(&port_id) {
            port.node = Some(node_id);
        }
        Ok(())
    }

    /// Remove the input port registered under `name`. All of the
    /// port's connections are severed and its back-reference cleared;
    /// the port itself stays in the graph, detached.
    pub fn remove_input_port(
        &mut self,
        node_id: NodeId,
        name: &str,
    ) -> Result<PortId, GraphError> {
        self.detach_port(node_id, name, Role::Input)
    }

    /// Remove the output port registered under `name`. Same cascade as
    /// [`Graph::remove_input_port`].
    pub fn remove_output_port(
        &mut self,
        node_id: NodeId,
        name: &str,
    ) -> Result<PortId, GraphError> {
        self.detach_port(node_id, name, Role::Output)
    }

    fn detach_port(
        &mut self,
        node_id: NodeId,
        name: &str,
        role: Role,
    ) -> Result<PortId, GraphError> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::UnknownNode(node_id))?;
        let mapping = match role {
            Role::Input => &mut node.inputs,
            Role::Output => &mut node.outputs,
        };
        let port_id = mapping
            .shift_remove(name)
            .ok_or_else(|| GraphError::PortNotFound {
                node: node_id,
                name: name.to_string(),
            })?;
        self.sever_all(port_id);
        if let Some(port) = self.ports.get_mut(&port_id) {
            port.node = None;
        }
        tracing::debug!("Removed {:?} port {:?} from node {:?}", role, name, node_id);
        Ok(port_id)
    }

    /// Look up an input port id by name
    pub fn input(&self, node_id: NodeId, name: &str) -> Result<PortId, GraphError> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(GraphError::UnknownNode(node_id))?;
        node.input_id(name).ok_or_else(|| GraphError::PortNotFound {
            node: node_id,
            name: name.to_string(),
        })
    }

    /// Look up an output port id by name
    pub fn output(&self, node_id: NodeId, name: &str) -> Result<PortId, GraphError> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(GraphError::UnknownNode(node_id))?;
        node.output_id(name).ok_or_else(|| GraphError::PortNotFound {
            node: node_id,
            name: name.to_string(),
        })
    }

    /// Validate a prospective connection without mutating anything.
    /// This is the probe the editor runs while a wire is being
    /// dragged.
    pub fn check_connect(&self, a: PortId, b: PortId) -> Result<(), GraphError> {
        if a == b {
            return Err(GraphError::SelfConnection(a));
        }
        let port_a = self.ports.get(&a).ok_or(GraphError::UnknownPort(a))?;
        let port_b = self.ports.get(&b).ok_or(GraphError::UnknownPort(b))?;
        if !port_a.is_compatible_with(port_b) {
            return Err(GraphError::IncompatibleTypes {
                from: port_a.data_type.clone(),
                to: port_b.data_type.clone(),
            });
        }
        Ok(())
    }

    /// Connect two ports with a symmetric edge.
    ///
    /// An endpoint that disallows multiple connections has its
    /// existing connections cleared first (the new wire replaces the
    /// old one). Connecting an already-connected pair is a safe no-op
    /// for the edge set. After the edge is in place, one propagation
    /// pass runs along it so a generator-bearing endpoint immediately
    /// feeds the other side.
    pub fn connect(&mut self, a: PortId, b: PortId) -> Result<(), GraphError> {
        self.check_connect(a, b)?;

        if !self
            .ports
            .get(&a)
            .is_some_and(|p| p.allows_multiple_connections)
        {
            self.sever_all(a);
        }
        if !self
            .ports
            .get(&b)
            .is_some_and(|p| p.allows_multiple_connections)
        {
            self.sever_all(b);
        }

        if let Some(port) = self.ports.get_mut(&a) {
            port.links.insert(b);
        }
        if let Some(port) = self.ports.get_mut(&b) {
            port.links.insert(a);
        }
        tracing::debug!("Connected port {:?} to {:?}", a, b);

        self.propagate_edge(a, b)?;
        self.propagate_edge(b, a)?;
        Ok(())
    }

    /// Remove the symmetric edge between two ports. A no-op when the
    /// ports are not connected; disconnection is tolerant, not strict.
    pub fn disconnect(&mut self, a: PortId, b: PortId) -> Result<(), GraphError> {
        self.ports.get(&a).ok_or(GraphError::UnknownPort(a))?;
        self.ports.get(&b).ok_or(GraphError::UnknownPort(b))?;

        let mut removed = false;
        if let Some(port) = self.ports.get_mut(&a) {
            removed |= port.links.shift_remove(&b);
        }
        if let Some(port) = self.ports.get_mut(&b) {
            port.links.shift_remove(&a);
        }
        if removed {
            tracing::debug!("Disconnected port {:?} from {:?}", a, b);
        }
        Ok(())
    }

    /// Disconnect a port from every currently connected peer
    pub fn clear_all_connections(&mut self, port_id: PortId) -> Result<(), GraphError> {
        self.ports
            .get(&port_id)
            .ok_or(GraphError::UnknownPort(port_id))?;
        self.sever_all(port_id);
        tracing::debug!("Cleared all connections on port {:?}", port_id);
        Ok(())
    }

    // Symmetric removal of every edge touching `port_id`. Iterates a
    // snapshot of the adjacency set.
    fn sever_all(&mut self, port_id: PortId) {
        let peers: Vec<PortId> = match self.ports.get(&port_id) {
            Some(port) => port.links.iter().copied().collect(),
            None => return,
        };
        for peer in peers {
            if let Some(port) = self.ports.get_mut(&port_id) {
                port.links.shift_remove(&peer);
            }
            if let Some(port) = self.ports.get_mut(&peer) {
                port.links.shift_remove(&port_id);
            }
        }
    }

    /// Enable or disable reception on a port. While disabled, values
    /// propagated to this port are dropped silently, not queued.
    pub fn toggle_receives_input(
        &mut self,
        port_id: PortId,
        enabled: bool,
    ) -> Result<(), GraphError> {
        let port = self
            .ports
            .get_mut(&port_id)
            .ok_or(GraphError::UnknownPort(port_id))?;
        port.receives_input = enabled;
        tracing::debug!("Port {:?} receives_input set to {}", port_id, enabled);
        Ok(())
    }

    /// Register the generator invoked to produce this port's value on
    /// send. A port has at most one generator; setting again replaces.
    pub fn set_generator(
        &mut self,
        port_id: PortId,
        producer: impl Producer + 'static,
    ) -> Result<(), GraphError> {
        let port = self
            .ports
            .get_mut(&port_id)
            .ok_or(GraphError::UnknownPort(port_id))?;
        port.generator = Some(Rc::new(producer));
        Ok(())
    }

    /// Register the processor invoked with values delivered to this
    /// port. A port has at most one processor; setting again replaces.
    pub fn set_processor(
        &mut self,
        port_id: PortId,
        consumer: impl Consumer + 'static,
    ) -> Result<(), GraphError> {
        let port = self
            .ports
            .get_mut(&port_id)
            .ok_or(GraphError::UnknownPort(port_id))?;
        port.processor = Some(Rc::new(consumer));
        Ok(())
    }

    /// Get nodes in dependency order, upstream sources first.
    ///
    /// Connections are acyclic by convention, not construction; this
    /// is the check collaborators run before enabling eager
    /// propagation on a freshly loaded graph.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut visited = std::collections::HashSet::new();
        let mut temp_mark = std::collections::HashSet::new();
        let mut order = Vec::new();

        for node_id in self.nodes.keys() {
            if !visited.contains(node_id) {
                self.visit(*node_id, &mut visited, &mut temp_mark, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node_id: NodeId,
        visited: &mut std::collections::HashSet<NodeId>,
        temp_mark: &mut std::collections::HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<(), CycleError> {
        if temp_mark.contains(&node_id) {
            return Err(CycleError);
        }
        if visited.contains(&node_id) {
            return Ok(());
        }

        temp_mark.insert(node_id);

        for upstream in self.upstream_nodes(node_id) {
            self.visit(upstream, visited, temp_mark, order)?;
        }

        temp_mark.remove(&node_id);
        visited.insert(node_id);
        order.push(node_id);

        Ok(())
    }

    // Nodes feeding this node's input ports.
    fn upstream_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };
        let mut upstream = Vec::new();
        for input in node.inputs.values() {
            let Some(port) = self.ports.get(input) else {
                continue;
            };
            for peer in &port.links {
                if let Some(peer_node) = self.ports.get(peer).and_then(Port::node) {
                    if !upstream.contains(&peer_node) {
                        upstream.push(peer_node);
                    }
                }
            }
        }
        upstream
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Input,
    Output,
}

/// Error when manipulating graph structure or wiring
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A port cannot be connected to itself
    #[error("Port {0:?} cannot be connected to itself")]
    SelfConnection(PortId),

    /// Declared port types differ
    #[error("Incompatible port types: {from:?} vs {to:?}")]
    IncompatibleTypes {
        /// Type of the port the connection started from
        from: crate::port::DataType,
        /// Type of the port the connection was dropped on
        to: crate::port::DataType,
    },

    /// Port name collision on a node mapping
    #[error("Node {node:?} already has a port named {name:?}")]
    DuplicateName {
        /// Node the name collided on
        node: NodeId,
        /// The colliding name
        name: String,
    },

    /// Named port lookup miss
    #[error("No port named {name:?} on node {node:?}")]
    PortNotFound {
        /// Node the lookup ran against
        node: NodeId,
        /// The missing name
        name: String,
    },

    /// Port id not present in the graph
    #[error("Unknown port id: {0:?}")]
    UnknownPort(PortId),

    /// Node id not present in the graph
    #[error("Unknown node id: {0:?}")]
    UnknownNode(NodeId),

    /// The port is already registered on a node
    #[error("Port {0:?} is already attached to a node")]
    PortAlreadyAttached(PortId),

    /// No node spec registered under this type id
    #[error("No node spec registered under id {0:?}")]
    UnknownSpec(String),

    /// A callback failed during the propagation pass that runs right
    /// after connecting
    #[error(transparent)]
    Propagation(#[from] PropagationError),
}

/// Error when the graph contains a cycle
#[derive(Debug, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::node::NodeId;
use crate::propagation::{Consumer, Producer};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use uuid::Uuid;

/// Unique identifier for a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId(pub Uuid);

impl PortId {
    /// Create a new random port ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PortId {
    fn default() -> Self {
        Self::new()
    }
}

/// Data type that can flow through ports.
///
/// Two ports can only be wired together when their declared types are
/// *identical*. There is no wildcard type and no implicit conversion:
/// two distinct types that happen to share an interface are still
/// incompatible, so a pipeline can never be silently mis-wired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// Text value
    Text,
    /// Scalar numeric dataset value (regression targets, statistics)
    Numeric,
    /// 1D numeric array (feature vectors, label columns)
    NumericArray,
    /// 2D numeric array (image data)
    ImageArray,
    /// Categorical label
    Categorical,
    /// Custom type, compared by its registry key
    Custom(String),
}

/// A value flowing through a port during propagation.
///
/// Not every [`DataType`] has a value representation; `Custom` ports
/// carry their payloads outside the core and only use the tag for
/// compatibility checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Text
    Text(String),
    /// Scalar numeric dataset value
    Numeric(f64),
    /// 1D numeric array
    NumericArray(Vec<f64>),
    /// 2D numeric array
    ImageArray(Vec<Vec<f64>>),
    /// Categorical label
    Categorical(String),
}

impl Value {
    /// Get the data type tag for this value
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Text(_) => DataType::Text,
            Self::Numeric(_) => DataType::Numeric,
            Self::NumericArray(_) => DataType::NumericArray,
            Self::ImageArray(_) => DataType::ImageArray,
            Self::Categorical(_) => DataType::Categorical,
        }
    }
}

/// A connection endpoint on a node.
///
/// Ports live in the [`Graph`](crate::graph::Graph) arena. A port is
/// created detached, optionally registered on a node under a name, and
/// wired to other ports through [`Graph::connect`](crate::graph::Graph::connect).
/// The connection set is symmetric: if A lists B, B lists A, and both
/// sides are always updated in the same call.
pub struct Port {
    /// Unique port ID
    pub id: PortId,
    pub(crate) data_type: DataType,
    pub(crate) allows_multiple_connections: bool,
    pub(crate) receives_input: bool,
    pub(crate) node: Option<NodeId>,
    pub(crate) links: IndexSet<PortId>,
    pub(crate) generator: Option<Rc<dyn Producer>>,
    pub(crate) processor: Option<Rc<dyn Consumer>>,
}

impl Port {
    /// Create a new detached port. Multiple simultaneous connections
    /// are allowed by default.
    pub fn new(data_type: DataType) -> Self {
        Self {
            id: PortId::new(),
            data_type,
            allows_multiple_connections: true,
            receives_input: true,
            node: None,
            links: IndexSet::new(),
            generator: None,
            processor: None,
        }
    }

    /// Set whether this port accepts more than one simultaneous
    /// connection. When disallowed, a new connection replaces any
    /// existing ones.
    pub fn with_multiple_connections(mut self, allowed: bool) -> Self {
        self.allows_multiple_connections = allowed;
        self
    }

    /// The declared data type of this port
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Whether this port accepts multiple simultaneous connections
    pub fn allows_multiple_connections(&self) -> bool {
        self.allows_multiple_connections
    }

    /// Whether incoming propagation is currently applied to this port
    pub fn receives_input(&self) -> bool {
        self.receives_input
    }

    /// The node this port is registered on, if any
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Ids of the ports currently connected to this one, in insertion
    /// order. Callers must not depend on fan-out ordering.
    pub fn connections(&self) -> impl Iterator<Item = PortId> + '_ {
        self.links.iter().copied()
    }

    /// Whether this port is currently connected to `other`
    pub fn is_connected_to(&self, other: PortId) -> bool {
        self.links.contains(&other)
    }

    /// Number of current connections
    pub fn connection_count(&self) -> usize {
        self.links.len()
    }

    /// Check if this port can be wired to another port: the declared
    /// data types must be identical.
    pub fn is_compatible_with(&self, other: &Port) -> bool {
        self.data_type == other.data_type
    }

    /// Whether a generator is registered on this port
    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Whether a processor is registered on this port
    pub fn has_processor(&self) -> bool {
        self.processor.is_some()
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("data_type", &self.data_type)
            .field("allows_multiple_connections", &self.allows_multiple_connections)
            .field("receives_input", &self.receives_input)
            .field("node", &self.node)
            .field("links", &self.links)
            .field("generator", &self.generator.as_ref().map(|_| ".."))
            .field("processor", &self.processor.as_ref().map(|_| ".."))
            .finish()
    }
}

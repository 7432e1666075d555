// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph framework for the Tensorloom editor.
//!
//! This crate is the data-model core of Tensorloom's visual pipeline
//! editor: typed ports on named nodes, wired into a graph that
//! propagates values automatically from sources to consumers.
//!
//! ## Architecture
//!
//! The framework is built on:
//! - Typed input/output ports with strict type-equality checking
//! - A graph arena owning all nodes, ports and the symmetric edge set
//! - Push/pull value propagation through a single-threaded work list
//! - Node type specs and a registry for building pipelines
//!
//! Rendering, widgets and dataset file formats live in separate
//! crates; they drive this one through [`Graph`]'s public API and
//! surface its errors as non-fatal UI messages.

pub mod catalog;
pub mod graph;
pub mod node;
pub mod port;
pub mod propagation;

pub use graph::{CycleError, Graph, GraphError};
pub use node::{Node, NodeCategory, NodeId, NodeRegistry, NodeSpec, PortSpec};
pub use port::{DataType, Port, PortId, Value};
pub use propagation::{
    consumer_fn, producer_fn, CallbackError, Consumer, Producer, Propagation, PropagationError,
};

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value propagation between connected ports.
//!
//! Propagation is a push/pull hybrid. [`Graph::send`] pushes an output
//! port's current value to every connected, reception-enabled input
//! port; a [`Consumer`] running inside that delivery may pull sibling
//! inputs synchronously through its [`Propagation`] context (a
//! two-input sum pulls its other operand mid-computation).
//!
//! Deliveries go through a single work list instead of recursing: a
//! `send` issued while a drain is running appends to the active list,
//! so stack depth stays bounded on deep chains and delivery order is
//! the order items were enqueued. Cycles are not rejected; a cyclic
//! graph whose processors unconditionally re-send will spin, and
//! keeping the graph acyclic remains the caller's responsibility
//! (see [`Graph::topological_order`]).

use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::{PortId, Value};
use std::collections::VecDeque;

/// Boxed error returned by user callbacks
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error during value propagation
#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    /// Port id not present in the graph
    #[error("Unknown port id: {0:?}")]
    UnknownPort(PortId),

    /// `send` was called on a port with no registered generator
    #[error("Port {0:?} has no generator to produce a value")]
    NoGenerator(PortId),

    /// A named port operation ran against a detached port
    #[error("Port {0:?} is not attached to a node")]
    Unattached(PortId),

    /// The delivering node has no input with this name
    #[error("Node has no input named {0:?}")]
    UnknownInput(String),

    /// The delivering node has no output with this name
    #[error("Node has no output named {0:?}")]
    UnknownOutput(String),

    /// Error raised by a user generator/processor, passed through
    /// unmodified
    #[error("{0}")]
    Callback(#[source] CallbackError),
}

impl PropagationError {
    /// Wrap an error returned by a user generator or processor
    pub fn callback(err: impl Into<CallbackError>) -> Self {
        Self::Callback(err.into())
    }
}

/// Produces the current value of an output port on demand.
///
/// A port has at most one producer. Node state read by a producer is
/// shared with the owning node through `Rc` + interior mutability;
/// execution is single-threaded and synchronous.
pub trait Producer {
    /// Produce the port's current value
    fn produce(&self) -> Result<Value, PropagationError>;
}

/// Consumes a value delivered to an input port.
///
/// A port has at most one consumer. The context exposes the owning
/// node so the consumer can pull sibling inputs or forward results on
/// named outputs while the delivery is running.
pub trait Consumer {
    /// Apply a received value
    fn consume(&self, value: Value, ctx: &Propagation<'_>) -> Result<(), PropagationError>;
}

/// Wrap a closure as a [`Producer`]
pub fn producer_fn<F>(f: F) -> impl Producer + 'static
where
    F: Fn() -> Result<Value, PropagationError> + 'static,
{
    struct FnProducer<F>(F);
    impl<F> Producer for FnProducer<F>
    where
        F: Fn() -> Result<Value, PropagationError>,
    {
        fn produce(&self) -> Result<Value, PropagationError> {
            (self.0)()
        }
    }
    FnProducer(f)
}

/// Wrap a closure as a [`Consumer`]
pub fn consumer_fn<F>(f: F) -> impl Consumer + 'static
where
    F: for<'a> Fn(Value, &Propagation<'a>) -> Result<(), PropagationError> + 'static,
{
    struct FnConsumer<F>(F);
    impl<F> Consumer for FnConsumer<F>
    where
        F: for<'a> Fn(Value, &Propagation<'a>) -> Result<(), PropagationError>,
    {
        fn consume(&self, value: Value, ctx: &Propagation<'_>) -> Result<(), PropagationError> {
            (self.0)(value, ctx)
        }
    }
    FnConsumer(f)
}

/// Pending deliveries for the current propagation pass
#[derive(Debug, Default)]
pub(crate) struct WorkList {
    queue: VecDeque<(PortId, Value)>,
    draining: bool,
}

/// Context handed to a [`Consumer`] for the duration of one delivery.
///
/// Holds a shared borrow of the graph, so a consumer can read
/// topology, pull values and forward sends, but can never rewire the
/// graph mid-delivery.
pub struct Propagation<'g> {
    graph: &'g Graph,
    node: Option<NodeId>,
    port: PortId,
}

impl<'g> Propagation<'g> {
    /// The graph the delivery is running against
    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// The node owning the receiving port, if the port is attached
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// The receiving port
    pub fn port(&self) -> PortId {
        self.port
    }

    /// Pull the value currently feeding the named sibling input.
    ///
    /// Returns `Ok(None)` when the input is unwired or no connected
    /// peer has a generator — "no contribution". A consumer that
    /// needs several operands treats `None` as "don't compute yet",
    /// which is what keeps partially wired nodes from producing
    /// partial results.
    pub fn pull_input(&self, name: &str) -> Result<Option<Value>, PropagationError> {
        let node_id = self.node.ok_or(PropagationError::Unattached(self.port))?;
        let port_id = self
            .graph
            .node(node_id)
            .and_then(|node| node.input_id(name))
            .ok_or_else(|| PropagationError::UnknownInput(name.to_string()))?;
        self.graph.receive(port_id)
    }

    /// Send the owning node's named output downstream. Issued from
    /// inside a delivery, this appends to the running work list
    /// instead of recursing.
    pub fn send_output(&self, name: &str) -> Result<(), PropagationError> {
        let node_id = self.node.ok_or(PropagationError::Unattached(self.port))?;
        let port_id = self
            .graph
            .node(node_id)
            .and_then(|node| node.output_id(name))
            .ok_or_else(|| PropagationError::UnknownOutput(name.to_string()))?;
        self.graph.send(port_id)
    }
}

impl Graph {
    /// Push this port's current value to every connected peer.
    ///
    /// The registered generator produces the value once; one delivery
    /// per connected peer is then queued and drained in order. Peers
    /// whose reception is disabled, and peers without a processor,
    /// drop the value silently. A callback error aborts the pass and
    /// discards the remaining queued deliveries.
    pub fn send(&self, port_id: PortId) -> Result<(), PropagationError> {
        let port = self
            .ports
            .get(&port_id)
            .ok_or(PropagationError::UnknownPort(port_id))?;
        let generator = port
            .generator
            .clone()
            .ok_or(PropagationError::NoGenerator(port_id))?;
        let targets: Vec<PortId> = port.links.iter().copied().collect();
        let value = generator.produce()?;
        tracing::trace!(
            "Sending {:?} from port {:?} to {} peer(s)",
            value,
            port_id,
            targets.len()
        );
        self.run_deliveries(targets.into_iter().map(move |target| (target, value.clone())))
    }

    /// Pull a value through this port: the generator of exactly one
    /// connected peer (the first in adjacency order that has one) is
    /// invoked and its value returned. `Ok(None)` means no connected
    /// peer can produce a value.
    pub fn receive(&self, port_id: PortId) -> Result<Option<Value>, PropagationError> {
        let port = self
            .ports
            .get(&port_id)
            .ok_or(PropagationError::UnknownPort(port_id))?;
        for peer in &port.links {
            let Some(generator) = self.ports.get(peer).and_then(|p| p.generator.clone()) else {
                continue;
            };
            return generator.produce().map(Some);
        }
        Ok(None)
    }

    // One propagation pass along a single edge, used right after a
    // connect. Does nothing when `from` has no generator.
    pub(crate) fn propagate_edge(&self, from: PortId, to: PortId) -> Result<(), PropagationError> {
        let Some(generator) = self.ports.get(&from).and_then(|p| p.generator.clone()) else {
            return Ok(());
        };
        let value = generator.produce()?;
        self.run_deliveries(std::iter::once((to, value)))
    }

    fn run_deliveries(
        &self,
        items: impl Iterator<Item = (PortId, Value)>,
    ) -> Result<(), PropagationError> {
        {
            let mut work = self.propagation.borrow_mut();
            work.queue.extend(items);
            if work.draining {
                // A drain higher up the stack owns the loop; it will
                // pick these up in order.
                return Ok(());
            }
            work.draining = true;
        }
        let result = self.drain();
        let mut work = self.propagation.borrow_mut();
        work.draining = false;
        if result.is_err() {
            work.queue.clear();
        }
        result
    }

    fn drain(&self) -> Result<(), PropagationError> {
        loop {
            let item = self.propagation.borrow_mut().queue.pop_front();
            match item {
                Some((target, value)) => self.deliver(target, value)?,
                None => return Ok(()),
            }
        }
    }

    fn deliver(&self, target: PortId, value: Value) -> Result<(), PropagationError> {
        let port = self
            .ports
            .get(&target)
            .ok_or(PropagationError::UnknownPort(target))?;
        if !port.receives_input {
            tracing::trace!("Port {:?} has reception disabled, dropping value", target);
            return Ok(());
        }
        let Some(processor) = port.processor.clone() else {
            tracing::trace!("Port {:?} has no processor, dropping value", target);
            return Ok(());
        };
        let ctx = Propagation {
            graph: self,
            node: port.node,
            port: target,
        };
        processor.consume(value, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{DataType, Port};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn int_producer(state: &Rc<Cell<i64>>) -> impl Producer + 'static {
        let state = state.clone();
        producer_fn(move || Ok(Value::Int(state.get())))
    }

    fn recording_consumer(seen: &Rc<RefCell<Vec<i64>>>) -> impl Consumer + 'static {
        let seen = seen.clone();
        consumer_fn(move |value, _ctx| {
            if let Value::Int(v) = value {
                seen.borrow_mut().push(v);
            }
            Ok(())
        })
    }

    #[test]
    fn test_send_requires_generator() {
        let mut graph = Graph::new("test");
        let port = graph.add_port(Port::new(DataType::Int));

        assert!(matches!(
            graph.send(port),
            Err(PropagationError::NoGenerator(_))
        ));
    }

    #[test]
    fn test_connect_propagates_initial_value() {
        let mut graph = Graph::new("test");
        let out = graph.add_port(Port::new(DataType::Int));
        let inp = graph.add_port(Port::new(DataType::Int));

        let source = Rc::new(Cell::new(10));
        let seen = Rc::new(RefCell::new(Vec::new()));
        graph.set_generator(out, int_producer(&source)).unwrap();
        graph.set_processor(inp, recording_consumer(&seen)).unwrap();

        graph.connect(out, inp).unwrap();

        assert_eq!(*seen.borrow(), vec![10]);
    }

    #[test]
    fn test_send_pushes_current_value() {
        let mut graph = Graph::new("test");
        let out = graph.add_port(Port::new(DataType::Int));
        let inp = graph.add_port(Port::new(DataType::Int));

        let source = Rc::new(Cell::new(10));
        let seen = Rc::new(RefCell::new(Vec::new()));
        graph.set_generator(out, int_producer(&source)).unwrap();
        graph.set_processor(inp, recording_consumer(&seen)).unwrap();
        graph.connect(out, inp).unwrap();

        source.set(20);
        graph.send(out).unwrap();

        assert_eq!(*seen.borrow(), vec![10, 20]);
    }

    #[test]
    fn test_disabled_reception_drops_silently() {
        let mut graph = Graph::new("test");
        let out = graph.add_port(Port::new(DataType::Int));
        let inp = graph.add_port(Port::new(DataType::Int));

        let source = Rc::new(Cell::new(10));
        let seen = Rc::new(RefCell::new(Vec::new()));
        graph.set_generator(out, int_producer(&source)).unwrap();
        graph.set_processor(inp, recording_consumer(&seen)).unwrap();
        graph.connect(out, inp).unwrap();

        graph.toggle_receives_input(inp, false).unwrap();
        source.set(5);
        graph.send(out).unwrap();

        assert_eq!(*seen.borrow(), vec![10]);

        // Values are dropped, not queued: re-enabling does not replay
        // them.
        graph.toggle_receives_input(inp, true).unwrap();
        assert_eq!(*seen.borrow(), vec![10]);
    }

    #[test]
    fn test_processorless_peer_drops_silently() {
        let mut graph = Graph::new("test");
        let out = graph.add_port(Port::new(DataType::Int));
        let inp = graph.add_port(Port::new(DataType::Int));

        let source = Rc::new(Cell::new(10));
        graph.set_generator(out, int_producer(&source)).unwrap();
        graph.connect(out, inp).unwrap();

        graph.send(out).unwrap();
    }

    #[test]
    fn test_receive_returns_none_when_unwired() {
        let mut graph = Graph::new("test");
        let inp = graph.add_port(Port::new(DataType::Int));
        assert!(graph.receive(inp).unwrap().is_none());

        // A connected peer without a generator is still "no
        // contribution".
        let peer = graph.add_port(Port::new(DataType::Int));
        graph.connect(inp, peer).unwrap();
        assert!(graph.receive(inp).unwrap().is_none());
    }

    #[test]
    fn test_receive_pulls_peer_generator() {
        let mut graph = Graph::new("test");
        let out = graph.add_port(Port::new(DataType::Int));
        let inp = graph.add_port(Port::new(DataType::Int));

        let source = Rc::new(Cell::new(42));
        graph.set_generator(out, int_producer(&source)).unwrap();
        graph.connect(out, inp).unwrap();

        assert_eq!(graph.receive(inp).unwrap(), Some(Value::Int(42)));
        source.set(43);
        assert_eq!(graph.receive(inp).unwrap(), Some(Value::Int(43)));
    }

    #[test]
    fn test_fanout_follows_adjacency_order() {
        let mut graph = Graph::new("test");
        let hub = graph.add_port(Port::new(DataType::Int));
        let source = Rc::new(Cell::new(7));
        graph.set_generator(hub, int_producer(&source)).unwrap();

        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in 1..=3 {
            let inp = graph.add_port(Port::new(DataType::Int));
            let order = order.clone();
            graph
                .set_processor(
                    inp,
                    consumer_fn(move |_value, _ctx| {
                        order.borrow_mut().push(tag);
                        Ok(())
                    }),
                )
                .unwrap();
            graph.connect(hub, inp).unwrap();
        }

        order.borrow_mut().clear();
        graph.send(hub).unwrap();

        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_callback_error_aborts_pass() {
        let mut graph = Graph::new("test");
        let hub = graph.add_port(Port::new(DataType::Int));
        let failing = graph.add_port(Port::new(DataType::Int));
        let after = graph.add_port(Port::new(DataType::Int));

        let source = Rc::new(Cell::new(1));
        graph.set_generator(hub, int_producer(&source)).unwrap();
        graph.connect(hub, failing).unwrap();
        graph.connect(hub, after).unwrap();

        graph
            .set_processor(
                failing,
                consumer_fn(|_value, _ctx| Err(PropagationError::callback("processor exploded"))),
            )
            .unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        graph.set_processor(after, recording_consumer(&seen)).unwrap();

        let err = graph.send(hub).unwrap_err();
        assert!(matches!(err, PropagationError::Callback(_)));
        // The failing delivery discarded the rest of the pass.
        assert!(seen.borrow().is_empty());

        // The graph is still usable afterwards.
        graph.disconnect(hub, failing).unwrap();
        graph.send(hub).unwrap();
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn test_forwarded_send_appends_to_work_list() {
        let mut graph = Graph::new("test");

        let source_node = graph.add_node("source");
        let source_out = graph.add_port(Port::new(DataType::Int));
        graph.add_output_port(source_node, "value", source_out).unwrap();
        let source = Rc::new(Cell::new(3));
        graph.set_generator(source_out, int_producer(&source)).unwrap();

        // Middle node doubles and forwards on its own output.
        let middle = graph.add_node("double");
        let middle_in = graph.add_port(Port::new(DataType::Int));
        let middle_out = graph.add_port(Port::new(DataType::Int));
        graph.add_input_port(middle, "value", middle_in).unwrap();
        graph.add_output_port(middle, "value", middle_out).unwrap();

        let held = Rc::new(Cell::new(0));
        let state = held.clone();
        graph
            .set_processor(
                middle_in,
                consumer_fn(move |value, ctx| {
                    if let Value::Int(v) = value {
                        state.set(v * 2);
                    }
                    ctx.send_output("value")
                }),
            )
            .unwrap();
        graph.set_generator(middle_out, int_producer(&held)).unwrap();

        let sink = graph.add_node("sink");
        let sink_in = graph.add_port(Port::new(DataType::Int));
        graph.add_input_port(sink, "value", sink_in).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        graph.set_processor(sink_in, recording_consumer(&seen)).unwrap();

        graph.connect(middle_out, sink_in).unwrap();
        graph.connect(source_out, middle_in).unwrap();

        source.set(5);
        graph.send(source_out).unwrap();

        assert_eq!(seen.borrow().last(), Some(&10));
    }

    #[test]
    fn test_pull_against_detached_port() {
        let mut graph = Graph::new("test");
        let out = graph.add_port(Port::new(DataType::Int));
        let inp = graph.add_port(Port::new(DataType::Int));

        let source = Rc::new(Cell::new(10));
        graph.set_generator(out, int_producer(&source)).unwrap();

        let result = Rc::new(RefCell::new(Vec::new()));
        let errors = result.clone();
        graph
            .set_processor(
                inp,
                consumer_fn(move |_value, ctx| {
                    // The port was never registered on a node, so
                    // named pulls cannot resolve.
                    match ctx.pull_input("anything") {
                        Err(PropagationError::Unattached(_)) => {
                            errors.borrow_mut().push(true);
                        }
                        _ => errors.borrow_mut().push(false),
                    }
                    Ok(())
                }),
            )
            .unwrap();

        graph.connect(out, inp).unwrap();
        assert_eq!(*result.borrow(), vec![true]);
    }
}

//! The variant indirection layer: binding handler nodes to producer nodes
//! in other graphs by stable identity.
//!
//! A producer (custom event / getter / output) exposes its own node id as
//! its variant id. Binding copies the producer's *current* IO shape onto
//! the handler, so the two contracts match at bind time; validation
//! re-resolves the producer through the runtime's directory and reports any
//! drift as a human-readable string. Nothing here holds a reference across
//! graphs — only `(GraphId, NodeId)` pairs resolved at call time.

use crate::error::{FlowError, Result};
use crate::graph::{GraphId, NodeId, NodeRef};
use crate::node::{props, Node, NodeTag, StackInput, StackOutput};
use crate::runtime::Runtime;

/// Author-time binding: point `handler` at `producer` and mirror the
/// producer's IO shape onto the handler.
///
/// - call-custom-event ← custom-event: producer outputs become handler
///   inputs (the call forwards values *to* the producer);
/// - handle-custom-getter ← custom-getter: producer inputs become handler
///   outputs (the handler reads the value the producer evaluates);
/// - handle-custom-output ← custom-output: producer inputs become handler
///   outputs (the producer pushes values *at* the handler).
pub fn set_variant(handler: &NodeRef, producer: &NodeRef) -> Result<()> {
    if std::rc::Rc::ptr_eq(handler, producer) {
        return Err(FlowError::variant("a handler cannot bind to itself"));
    }
    let (producer_id, producer_graph) = {
        let p = producer.borrow();
        (p.id(), p.graph_id())
    };

    let mut h = handler.borrow_mut();
    let p = producer.borrow();
    match (h.tag(), p.tag()) {
        (NodeTag::CallCustomEvent, NodeTag::CustomEvent) => {
            h.stack_inputs = p
                .stack_outputs()
                .iter()
                .map(|output| StackInput::new(&output.name, output.ty))
                .collect();
        }
        (NodeTag::HandleCustomGetter, NodeTag::CustomGetter)
        | (NodeTag::HandleCustomOutput, NodeTag::CustomOutput) => {
            h.stack_outputs = p
                .stack_inputs()
                .iter()
                .map(|input| StackOutput::new(&input.name, input.ty))
                .collect();
        }
        (handler_tag, producer_tag) => {
            return Err(FlowError::variant(format!(
                "{} nodes cannot bind to {} nodes",
                handler_tag.as_str(),
                producer_tag.as_str()
            )));
        }
    }
    h.set_guid_property(props::VARIANT, producer_id.as_uuid());
    h.set_guid_property(props::TARGET_GRAPH, producer_graph.as_uuid());
    Ok(())
}

/// Validation for handler nodes: re-resolve the bound producer and check
/// that the shapes still agree. Returns a problem description or `None`.
pub(crate) fn check_handler(handler: &Node, rt: &Runtime) -> Option<String> {
    let (producer_tag, handler_is_caller) = match handler.tag() {
        NodeTag::CallCustomEvent => (NodeTag::CustomEvent, true),
        NodeTag::HandleCustomGetter => (NodeTag::CustomGetter, false),
        NodeTag::HandleCustomOutput => (NodeTag::CustomOutput, false),
        _ => return None,
    };

    let graph_id = GraphId::from_uuid(handler.guid_property(props::TARGET_GRAPH));
    let variant = NodeId::from_uuid(handler.guid_property(props::VARIANT));

    let Some(graph) = rt.try_graph(graph_id) else {
        return Some("Target graph is missing".to_string());
    };
    let Some(producer) = graph.borrow().try_node(variant) else {
        return Some(format!("Target {} is not found", producer_tag.as_str()));
    };
    let producer = producer.borrow();
    if producer.tag() != producer_tag {
        return Some(format!("Target {} is not found", producer_tag.as_str()));
    }

    // A caller's inputs mirror the producer's outputs; the other handlers
    // mirror the producer's inputs as their outputs.
    let (own, other): (Vec<_>, Vec<_>) = if handler_is_caller {
        (
            handler.stack_inputs().iter().map(|i| i.ty).collect(),
            producer.stack_outputs().iter().map(|o| o.ty).collect(),
        )
    } else {
        (
            handler.stack_outputs().iter().map(|o| o.ty).collect(),
            producer.stack_inputs().iter().map(|i| i.ty).collect(),
        )
    };

    if own.len() != other.len() {
        return Some("Argument count mismatch".to_string());
    }
    if own.iter().zip(&other).any(|(a, b)| a != b) {
        return Some("Argument type mismatch".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::runtime::Runtime;
    use flowgraph_bindings::ValueType;

    #[test]
    fn binding_copies_the_producer_shape() {
        let rt = Runtime::new();
        let child = rt.create_graph();
        let parent = rt.create_graph();

        let producer = child.borrow_mut().create_node(NodeKind::custom_event()).unwrap();
        producer.borrow().set_event_name("OnTest").unwrap();
        producer.borrow_mut().add_custom_io("arg1", ValueType::Int).unwrap();
        producer.borrow_mut().add_custom_io("arg2", ValueType::Bool).unwrap();

        let caller = parent.borrow_mut().create_node(NodeKind::call_custom_event()).unwrap();
        set_variant(&caller, &producer).unwrap();

        let c = caller.borrow();
        assert_eq!(c.stack_inputs().len(), 2);
        assert_eq!(c.stack_inputs()[0].name, "arg1");
        assert_eq!(c.stack_inputs()[0].ty, ValueType::Int);
        assert_eq!(c.stack_inputs()[1].ty, ValueType::Bool);
        assert!(rt.validate_graph(parent.borrow().id()).unwrap().is_empty());
    }

    #[test]
    fn mismatched_kinds_are_rejected() {
        let rt = Runtime::new();
        let graph = rt.create_graph();
        let producer = graph.borrow_mut().create_node(NodeKind::custom_event()).unwrap();
        let handler = graph.borrow_mut().create_node(NodeKind::handle_custom_getter()).unwrap();
        assert!(set_variant(&handler, &producer).is_err());
    }

    #[test]
    fn validation_reports_shape_drift() {
        let rt = Runtime::new();
        let child = rt.create_graph();
        let parent = rt.create_graph();

        let producer = child.borrow_mut().create_node(NodeKind::custom_output()).unwrap();
        producer.borrow().set_output_name("OnTest").unwrap();
        producer.borrow_mut().add_custom_io("arg1", ValueType::Int).unwrap();
        producer.borrow_mut().add_custom_io("arg2", ValueType::Bool).unwrap();

        let handler = parent.borrow_mut().create_node(NodeKind::handle_custom_output()).unwrap();
        set_variant(&handler, &producer).unwrap();
        assert!(rt.validate_graph(parent.borrow().id()).unwrap().is_empty());

        // Grow the producer without rebinding: count mismatch.
        producer.borrow_mut().add_custom_io("arg3", ValueType::Float).unwrap();
        let problems = rt.validate_graph(parent.borrow().id()).unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].1.contains("count mismatch"));

        // Same count, different type: type mismatch.
        producer.borrow_mut().remove_custom_io(2).unwrap();
        producer.borrow_mut().update_custom_io(1, "arg2", ValueType::String).unwrap();
        let problems = rt.validate_graph(parent.borrow().id()).unwrap();
        assert!(problems[0].1.contains("type mismatch"));
    }

    #[test]
    fn validation_reports_missing_targets() {
        let rt = Runtime::new();
        let child = rt.create_graph();
        let parent = rt.create_graph();
        let child_id = child.borrow().id();

        let producer = child.borrow_mut().create_node(NodeKind::custom_getter()).unwrap();
        let handler = parent.borrow_mut().create_node(NodeKind::handle_custom_getter()).unwrap();
        set_variant(&handler, &producer).unwrap();

        let producer_id = producer.borrow().id();
        child.borrow_mut().remove_node(producer_id).unwrap();
        let problems = rt.validate_graph(parent.borrow().id()).unwrap();
        assert!(problems[0].1.contains("not found"));

        rt.remove_graph(child_id).unwrap();
        let problems = rt.validate_graph(parent.borrow().id()).unwrap();
        assert!(problems[0].1.contains("graph is missing"));
    }
}

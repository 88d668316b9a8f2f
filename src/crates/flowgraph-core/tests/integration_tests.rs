//! End-to-end traversal tests.
//!
//! The host side is simulated by a small rig: a `Helper` object carrying a
//! shared log, a mutable number, and two host events, plus hand-built
//! method/event bindings standing in for the reflection layer. Every test
//! asserts the balance invariant: the runtime's value stack and frame stack
//! end exactly as deep as they started.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use flowgraph_bindings::{
    EventBinding, HostEvent, HostObject, MethodBinding, ParamSpec, Scope, Signature, Value,
    ValueType,
};
use flowgraph_core::{set_variant, GraphRef, NodeKind, NodeRef, Runtime};

const ACTION0: u64 = 0;
const ACTION2: u64 = 2;

struct Helper {
    number: Cell<i64>,
    on_action0: HostEvent,
    on_action2: HostEvent,
}

struct Rig {
    rt: Rc<Runtime>,
    log: Rc<RefCell<Vec<String>>>,
    helper: Rc<Helper>,
    host: HostObject,
    stack0: usize,
    frames0: usize,
}

impl Rig {
    fn new() -> Rig {
        let rt = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let helper = Rc::new(Helper {
            number: Cell::new(0),
            on_action0: HostEvent::new(),
            on_action2: HostEvent::new(),
        });
        let host = HostObject::from_rc(helper.clone());
        let stack0 = rt.stack_depth();
        let frames0 = rt.frame_depth();
        Rig { rt, log, helper, host, stack0, frames0 }
    }

    fn drain_log(&self) -> Vec<String> {
        self.log.borrow_mut().drain(..).collect()
    }

    fn assert_balanced(&self) {
        assert_eq!(self.rt.stack_depth(), self.stack0, "value stack depth leaked");
        assert_eq!(self.rt.frame_depth(), self.frames0, "frame stack count leaked");
    }

    fn function(&self, graph: &GraphRef, binding: MethodBinding) -> NodeRef {
        graph
            .borrow_mut()
            .create_node(NodeKind::function(binding, Some(self.host.clone())))
            .unwrap()
    }

    fn static_function(&self, graph: &GraphRef, binding: MethodBinding) -> NodeRef {
        graph
            .borrow_mut()
            .create_node(NodeKind::function(binding, None))
            .unwrap()
    }

    fn event(&self, graph: &GraphRef, binding: EventBinding) -> NodeRef {
        graph
            .borrow_mut()
            .create_node(NodeKind::event(binding, self.host.clone()))
            .unwrap()
    }

    // ---- bindings the tests wire up ------------------------------------

    fn print_int(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("print_int", "Prints a number")
                .with_param(ParamSpec::input("value", ValueType::Int)),
            move |_target, stack| {
                let value = stack.pop_int();
                log.borrow_mut().push(format!("print_int: {value}"));
            },
        )
    }

    fn print_bool(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("print_bool", "Prints a bool")
                .with_param(ParamSpec::input("value", ValueType::Bool)),
            move |_target, stack| {
                let value = stack.pop_bool();
                log.borrow_mut().push(format!("print_bool: {value}"));
            },
        )
    }

    fn print_float(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("print_float", "Prints a float")
                .with_param(ParamSpec::input("value", ValueType::Float)),
            move |_target, stack| {
                let value = stack.pop_float();
                log.borrow_mut().push(format!("print_float: {value}"));
            },
        )
    }

    fn print_string(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("print_string", "Prints a string")
                .with_param(ParamSpec::input("value", ValueType::String)),
            move |_target, stack| {
                let value = stack.pop_string();
                log.borrow_mut().push(format!("print_string: {value}"));
            },
        )
    }

    fn print_dummy(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("print_dummy", "Dummy"),
            move |_target, _stack| {
                log.borrow_mut().push("print_dummy".to_string());
            },
        )
    }

    fn return_false(&self) -> MethodBinding {
        MethodBinding::new(
            Signature::new("return_false", "Always returns false").with_ret(ValueType::Bool),
            move |_target, stack| {
                stack.push_bool(false);
            },
        )
    }

    fn get_number(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("get_number", "Gets a number").with_ret(ValueType::Int),
            move |target, stack| {
                let helper = target.unwrap().downcast::<Helper>().unwrap();
                log.borrow_mut().push(format!("get_number: {}", helper.number.get()));
                stack.push_int(helper.number.get());
            },
        )
    }

    fn set_number(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("set_number", "Sets a number")
                .with_param(ParamSpec::input("number", ValueType::Int)),
            move |target, stack| {
                let value = stack.pop_int();
                let helper = target.unwrap().downcast::<Helper>().unwrap();
                helper.number.set(value);
                log.borrow_mut().push(format!("set_number: {value}"));
            },
        )
    }

    fn get_several_outputs(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("get_several_outputs", "Gets several outputs")
                .with_ret(ValueType::Int)
                .with_param(ParamSpec::output("b", ValueType::Float))
                .with_param(ParamSpec::output("c", ValueType::Bool)),
            move |target, stack| {
                let helper = target.unwrap().downcast::<Helper>().unwrap();
                log.borrow_mut()
                    .push(format!("get_several_outputs: {}", helper.number.get()));
                stack.push_int(helper.number.get());
                stack.push_float(2.0);
                stack.push_bool(true);
            },
        )
    }

    fn double(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("double", "x * 2")
                .with_param(ParamSpec::input("x", ValueType::Int))
                .with_ret(ValueType::Int)
                .static_fn(),
            move |_target, stack| {
                let x = stack.pop_int();
                log.borrow_mut().push(format!("double: {x} * 2 = {}", x * 2));
                stack.push_int(x * 2);
            },
        )
    }

    fn parameter_order(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("parameter_order", "Parameter order")
                .with_param(ParamSpec::input("a", ValueType::Int))
                .with_param(ParamSpec::input("b", ValueType::Bool))
                .with_param(ParamSpec::input("c", ValueType::String))
                .with_ret(ValueType::Int)
                .static_fn(),
            move |_target, stack| {
                let a = stack.pop_int();
                let b = stack.pop_bool();
                let c = stack.pop_string();
                log.borrow_mut().push(format!("parameter_order: {a}, {b}, {c}"));
                stack.push_int(a);
            },
        )
    }

    fn flow_with_output(&self) -> MethodBinding {
        let log = self.log.clone();
        MethodBinding::new(
            Signature::new("flow_with_output", "Flow call with outputs")
                .with_param(ParamSpec::input("arg1", ValueType::Int))
                .with_param(ParamSpec::input("arg2", ValueType::Bool))
                .with_param(ParamSpec::output("out1", ValueType::Float))
                .with_param(ParamSpec::output("out2", ValueType::String))
                .flow(),
            move |_target, stack| {
                let arg1 = stack.pop_int();
                let arg2 = stack.pop_bool();
                log.borrow_mut().push(format!("flow_with_output: {arg1} {arg2}"));
                stack.push_float(arg1 as f64);
                stack.push_string(format!("{arg1} {arg2}"));
            },
        )
    }

    fn action0(&self) -> EventBinding {
        EventBinding::new(
            "on_action0",
            "Action0 happened",
            ACTION0,
            vec![],
            Scope::Simulation,
            |source, delegate| source.downcast::<Helper>().unwrap().on_action0.add(delegate),
            |source, delegate| source.downcast::<Helper>().unwrap().on_action0.remove(delegate),
        )
    }

    fn action2(&self) -> EventBinding {
        EventBinding::new(
            "on_action2",
            "Action2 happened",
            ACTION2,
            vec![
                ParamSpec::input("a", ValueType::Int),
                ParamSpec::input("b", ValueType::Bool),
            ],
            Scope::Simulation,
            |source, delegate| source.downcast::<Helper>().unwrap().on_action2.add(delegate),
            |source, delegate| source.downcast::<Helper>().unwrap().on_action2.remove(delegate),
        )
    }
}

fn link(from: &NodeRef, index: usize, to: &NodeRef) {
    let target = to.borrow().id();
    from.borrow_mut().set_flow_target(index, Some(target)).unwrap();
}

fn pull(consumer: &NodeRef, input: usize, producer: &NodeRef, output: usize) {
    let id = producer.borrow().id();
    consumer.borrow_mut().bind_input(input, id, output).unwrap();
}

fn delay_running(node: &NodeRef) -> bool {
    match node.borrow().kind() {
        NodeKind::Delay(delay) => delay.is_running(),
        _ => panic!("not a delay node"),
    }
}

#[test]
fn traversal_visits_a_flow_chain_in_order() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    let node0 = rig.function(&graph, rig.print_int());
    node0.borrow().set_input_literal(0, Value::Int(1)).unwrap();
    let node1 = rig.function(&graph, rig.print_int());
    node1.borrow().set_input_literal(0, Value::Int(3)).unwrap();
    let node2 = rig.function(&graph, rig.print_int());
    node2.borrow().set_input_literal(0, Value::Int(7)).unwrap();

    link(&node0, 0, &node1);
    link(&node1, 0, &node2);

    rig.rt.traverse(&node0, Scope::Simulation).unwrap();
    assert_eq!(rig.drain_log(), ["print_int: 1", "print_int: 3", "print_int: 7"]);
    rig.assert_balanced();
}

#[test]
fn branch_fed_false_follows_only_the_false_output() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    let source = rig.function(&graph, rig.return_false());
    let branch = graph.borrow_mut().create_node(NodeKind::branch()).unwrap();
    let when_true = rig.function(&graph, rig.print_string());
    when_true.borrow().set_input_literal(0, Value::String("when true".into())).unwrap();
    let when_false = rig.function(&graph, rig.print_string());
    when_false.borrow().set_input_literal(0, Value::String("when false".into())).unwrap();

    pull(&branch, 0, &source, 0);
    link(&branch, 0, &when_true);
    link(&branch, 1, &when_false);

    rig.rt.traverse(&branch, Scope::Simulation).unwrap();
    assert_eq!(rig.drain_log(), ["print_string: when false"]);
    rig.assert_balanced();
}

#[test]
fn branch_fed_true_follows_only_the_true_output() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    let branch = graph.borrow_mut().create_node(NodeKind::branch()).unwrap();
    branch.borrow().set_input_literal(0, Value::Bool(true)).unwrap();
    let when_true = rig.function(&graph, rig.print_string());
    when_true.borrow().set_input_literal(0, Value::String("when true".into())).unwrap();
    let when_false = rig.function(&graph, rig.print_string());
    when_false.borrow().set_input_literal(0, Value::String("when false".into())).unwrap();

    link(&branch, 0, &when_true);
    link(&branch, 1, &when_false);

    rig.rt.traverse(&branch, Scope::Simulation).unwrap();
    assert_eq!(rig.drain_log(), ["print_string: when true"]);
    rig.assert_balanced();
}

#[test]
fn sequence_visits_targets_in_ascending_output_order() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    let sequence = graph.borrow_mut().create_node(NodeKind::sequence()).unwrap();
    let prints: Vec<NodeRef> = (0..3)
        .map(|i| {
            let node = rig.function(&graph, rig.print_int());
            node.borrow().set_input_literal(0, Value::Int(i)).unwrap();
            node
        })
        .collect();

    sequence.borrow_mut().add_custom_flow().unwrap();
    sequence.borrow_mut().add_custom_flow().unwrap();
    sequence.borrow_mut().add_custom_flow().unwrap();

    // Wired out of order on purpose: output index, not authoring order,
    // decides the visit order.
    link(&sequence, 0, &prints[2]);
    link(&sequence, 1, &prints[0]);
    link(&sequence, 2, &prints[1]);

    rig.rt.traverse(&sequence, Scope::Simulation).unwrap();
    assert_eq!(rig.drain_log(), ["print_int: 2", "print_int: 0", "print_int: 1"]);
    rig.assert_balanced();
}

#[test]
fn flow_function_outputs_stay_readable_down_the_chain() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    let head = rig.function(&graph, rig.flow_with_output());
    head.borrow().set_input_literal(0, Value::Int(7)).unwrap();
    head.borrow().set_input_literal(1, Value::Bool(true)).unwrap();
    let mid = rig.function(&graph, rig.print_float());
    let tail = rig.function(&graph, rig.print_string());

    link(&head, 0, &mid);
    link(&mid, 0, &tail);
    pull(&mid, 0, &head, 0);
    pull(&tail, 0, &head, 1);

    rig.rt.traverse(&head, Scope::Simulation).unwrap();
    assert_eq!(
        rig.drain_log(),
        ["flow_with_output: 7 true", "print_float: 7", "print_string: 7 true"]
    );
    rig.assert_balanced();
}

#[test]
fn data_nodes_reexecute_on_every_pull() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    let source = rig.function(&graph, rig.get_number());
    let print = rig.function(&graph, rig.print_int());
    pull(&print, 0, &source, 0);

    rig.helper.number.set(1);
    rig.rt.traverse(&print, Scope::Simulation).unwrap();
    rig.helper.number.set(5);
    rig.rt.traverse(&print, Scope::Simulation).unwrap();

    assert_eq!(
        rig.drain_log(),
        ["get_number: 1", "print_int: 1", "get_number: 5", "print_int: 5"]
    );
    rig.assert_balanced();
}

#[test]
fn data_pulls_resolve_recursively_through_reference_chains() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    rig.helper.number.set(7);
    let several = rig.function(&graph, rig.get_several_outputs());
    let double = rig.static_function(&graph, rig.double());
    let set = rig.function(&graph, rig.set_number());

    // set_number ← double ← get_several_outputs[0]
    pull(&set, 0, &double, 0);
    pull(&double, 0, &several, 0);

    rig.rt.traverse(&set, Scope::Simulation).unwrap();
    assert_eq!(
        rig.drain_log(),
        ["get_several_outputs: 7", "double: 7 * 2 = 14", "set_number: 14"]
    );
    assert_eq!(rig.helper.number.get(), 14);
    rig.assert_balanced();
}

#[test]
fn bindings_pop_inputs_in_declared_order() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    let ordered = rig.static_function(&graph, rig.parameter_order());
    ordered.borrow().set_input_literal(0, Value::Int(13)).unwrap();
    ordered.borrow().set_input_literal(1, Value::Bool(true)).unwrap();
    ordered.borrow().set_input_literal(2, Value::String("!ok!".into())).unwrap();
    let print = rig.function(&graph, rig.print_int());
    pull(&print, 0, &ordered, 0);

    rig.rt.traverse(&print, Scope::Simulation).unwrap();
    assert_eq!(
        rig.drain_log(),
        ["parameter_order: 13, true, !ok!", "print_int: 13"]
    );
    rig.assert_balanced();
}

#[test]
fn event_arguments_reach_downstream_readers() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();
    let graph_id = graph.borrow().id();

    let event = rig.event(&graph, rig.action2());
    let print_a = rig.function(&graph, rig.print_int());
    let print_b = rig.function(&graph, rig.print_bool());

    link(&event, 0, &print_a);
    link(&print_a, 0, &print_b);
    pull(&print_a, 0, &event, 0);
    pull(&print_b, 0, &event, 1);

    rig.rt.enable_graph(graph_id).unwrap();
    rig.helper.on_action2.raise(&[Value::Int(13), Value::Bool(true)]);

    assert_eq!(rig.drain_log(), ["print_int: 13", "print_bool: true"]);
    rig.assert_balanced();
}

#[test]
fn disabled_graphs_do_not_fire_and_reenabled_graphs_do() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();
    let graph_id = graph.borrow().id();

    let event = rig.event(&graph, rig.action0());
    let print = rig.function(&graph, rig.print_dummy());
    link(&event, 0, &print);

    rig.rt.enable_graph(graph_id).unwrap();
    rig.rt.disable_graph(graph_id).unwrap();
    rig.helper.on_action0.raise(&[]);
    assert!(rig.drain_log().is_empty());
    assert_eq!(rig.rt.listener_count(), 0);
    assert_eq!(rig.helper.on_action0.delegate_count(), 0);

    rig.rt.enable_graph(graph_id).unwrap();
    rig.helper.on_action0.raise(&[]);
    assert_eq!(rig.drain_log(), ["print_dummy"]);
    rig.assert_balanced();
}

#[test]
fn unbinding_one_listener_leaves_the_others_bound() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();
    let graph_id = graph.borrow().id();

    let mut removable = None;
    for tag in ["child 1", "child 2", "child 3"] {
        let event = rig.event(&graph, rig.action0());
        let print = rig.function(&graph, rig.print_string());
        print.borrow().set_input_literal(0, Value::String(tag.into())).unwrap();
        link(&event, 0, &print);
        if tag == "child 2" {
            removable = Some(event.borrow().id());
        }
    }

    rig.rt.enable_graph(graph_id).unwrap();
    assert_eq!(rig.rt.listener_count(), 3);
    // All three listeners share one host-side delegate.
    assert_eq!(rig.helper.on_action0.delegate_count(), 1);

    rig.helper.on_action0.raise(&[]);
    assert_eq!(
        rig.drain_log(),
        ["print_string: child 1", "print_string: child 2", "print_string: child 3"]
    );

    graph.borrow_mut().remove_node(removable.unwrap()).unwrap();
    assert_eq!(rig.rt.listener_count(), 2);
    assert_eq!(rig.helper.on_action0.delegate_count(), 1);

    rig.helper.on_action0.raise(&[]);
    assert_eq!(rig.drain_log(), ["print_string: child 1", "print_string: child 3"]);
    rig.assert_balanced();
}

#[test]
fn one_event_targets_every_bound_graph_once() {
    let rig = Rig::new();
    let child = rig.rt.create_graph();
    let parent = rig.rt.create_graph();

    for (graph, tag) in [(&child, "child"), (&parent, "parent")] {
        let event = rig.event(graph, rig.action0());
        let print = rig.function(graph, rig.print_string());
        print.borrow().set_input_literal(0, Value::String(tag.to_string())).unwrap();
        link(&event, 0, &print);
    }

    let child_id = child.borrow().id();
    let parent_id = parent.borrow().id();
    rig.rt.enable_graph(child_id).unwrap();
    rig.rt.enable_graph(parent_id).unwrap();

    rig.helper.on_action0.raise(&[]);
    assert_eq!(rig.drain_log(), ["print_string: child", "print_string: parent"]);
    rig.assert_balanced();
}

#[test]
fn variable_nodes_place_the_live_graph_cell() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    let variable = graph.borrow_mut().add_variable("var1", ValueType::Int);
    graph.borrow().variable(variable).unwrap().cell().set(Value::Int(7));

    let reader = graph.borrow_mut().create_node(NodeKind::variable()).unwrap();
    graph.borrow().bind_variable_node(&reader, variable).unwrap();
    let print = rig.function(&graph, rig.print_int());
    pull(&print, 0, &reader, 0);

    rig.rt.traverse(&print, Scope::Simulation).unwrap();
    graph.borrow().variable(variable).unwrap().cell().set(Value::Int(9));
    rig.rt.traverse(&print, Scope::Simulation).unwrap();

    assert_eq!(rig.drain_log(), ["print_int: 7", "print_int: 9"]);
    rig.assert_balanced();
}

#[test]
fn delay_fires_started_once_and_completed_exactly_once() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();
    let graph_id = graph.borrow().id();

    let tick = graph.borrow_mut().create_node(NodeKind::update_tick()).unwrap();
    let delay = graph.borrow_mut().create_node(NodeKind::delay()).unwrap();
    delay.borrow().set_input_literal(0, Value::Float(1.0)).unwrap();
    let started = rig.function(&graph, rig.print_string());
    started.borrow().set_input_literal(0, Value::String("started".into())).unwrap();
    let completed = rig.function(&graph, rig.print_string());
    completed.borrow().set_input_literal(0, Value::String("completed".into())).unwrap();

    link(&tick, 0, &delay);
    link(&delay, 0, &started);
    link(&delay, 1, &completed);

    rig.rt.enable_graph(graph_id).unwrap();

    // First tick fires the entry node, which starts the delay.
    rig.rt.update_graph(graph_id, 0.05, true).unwrap();
    assert!(delay_running(&delay));
    assert_eq!(rig.drain_log(), ["print_string: started"]);

    // Re-triggering while running is ignored, not queued.
    rig.rt.update_graph(graph_id, 0.05, true).unwrap();
    assert!(rig.drain_log().is_empty());

    // Tick until the duration elapses; "completed" fires exactly once.
    let mut guard = 0;
    while delay_running(&delay) {
        rig.rt.update_graph(graph_id, 0.05, false).unwrap();
        guard += 1;
        assert!(guard < 40, "delay never completed");
    }
    assert_eq!(rig.drain_log(), ["print_string: completed"]);

    // Ticking long past completion fires nothing further.
    for _ in 0..10 {
        rig.rt.update_graph(graph_id, 0.05, false).unwrap();
    }
    assert!(rig.drain_log().is_empty());
    rig.assert_balanced();
}

#[test]
fn delay_replays_its_completion_on_the_captured_context() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();
    let graph_id = graph.borrow().id();

    let event = rig.event(&graph, rig.action2());
    let first = rig.function(&graph, rig.flow_with_output());
    first.borrow().set_input_literal(0, Value::Int(1)).unwrap();
    first.borrow().set_input_literal(1, Value::Bool(false)).unwrap();
    let second = rig.function(&graph, rig.flow_with_output());
    second.borrow().set_input_literal(0, Value::Int(3)).unwrap();
    second.borrow().set_input_literal(1, Value::Bool(true)).unwrap();
    let delay = graph.borrow_mut().create_node(NodeKind::delay()).unwrap();
    delay.borrow().set_input_literal(0, Value::Float(1.0)).unwrap();

    // Completion reads outputs produced before the delay armed.
    let read_first = rig.function(&graph, rig.print_float());
    pull(&read_first, 0, &first, 0);
    let read_second = rig.function(&graph, rig.print_string());
    pull(&read_second, 0, &second, 1);

    link(&event, 0, &first);
    link(&first, 0, &second);
    link(&second, 0, &delay);
    link(&delay, 1, &read_first); // "completed"
    link(&read_first, 0, &read_second);

    rig.rt.enable_graph(graph_id).unwrap();
    rig.helper.on_action2.raise(&[Value::Int(13), Value::Bool(true)]);
    assert!(delay_running(&delay));
    assert_eq!(
        rig.drain_log(),
        ["flow_with_output: 1 false", "flow_with_output: 3 true"]
    );
    rig.assert_balanced();

    // The event ran in simulation scope, so the timer lives in the fixed
    // tick domain.
    let mut guard = 0;
    while delay_running(&delay) {
        rig.rt.fixed_update_graph(graph_id, 0.05, false).unwrap();
        guard += 1;
        assert!(guard < 40, "delay never completed");
    }
    assert_eq!(rig.drain_log(), ["print_float: 1", "print_string: 3 true"]);
    rig.assert_balanced();
}

#[test]
fn call_custom_event_drives_the_producer_across_graphs() {
    let rig = Rig::new();
    let child = rig.rt.create_graph();
    let parent = rig.rt.create_graph();

    let producer = child.borrow_mut().create_node(NodeKind::custom_event()).unwrap();
    producer.borrow().set_event_name("OnTest").unwrap();
    producer.borrow_mut().add_custom_io("arg1", ValueType::Int).unwrap();
    producer.borrow_mut().add_custom_io("arg2", ValueType::Bool).unwrap();
    let print_a = rig.function(&child, rig.print_int());
    let print_b = rig.function(&child, rig.print_bool());
    link(&producer, 0, &print_a);
    link(&print_a, 0, &print_b);
    pull(&print_a, 0, &producer, 0);
    pull(&print_b, 0, &producer, 1);

    let caller = parent.borrow_mut().create_node(NodeKind::call_custom_event()).unwrap();
    set_variant(&caller, &producer).unwrap();
    caller.borrow().set_input_literal(0, Value::Int(13)).unwrap();
    caller.borrow().set_input_literal(1, Value::Bool(true)).unwrap();

    rig.rt.traverse(&caller, Scope::Simulation).unwrap();
    assert_eq!(rig.drain_log(), ["print_int: 13", "print_bool: true"]);
    rig.assert_balanced();
}

#[test]
fn custom_output_fans_out_to_its_bound_handler() {
    let rig = Rig::new();
    let child = rig.rt.create_graph();
    let parent = rig.rt.create_graph();

    let producer = child.borrow_mut().create_node(NodeKind::custom_output()).unwrap();
    producer.borrow().set_output_name("OnTest").unwrap();
    producer.borrow_mut().add_custom_io("arg1", ValueType::Int).unwrap();
    producer.borrow_mut().add_custom_io("arg2", ValueType::Bool).unwrap();
    producer.borrow().set_input_literal(0, Value::Int(13)).unwrap();
    producer.borrow().set_input_literal(1, Value::Bool(true)).unwrap();

    let handler = parent.borrow_mut().create_node(NodeKind::handle_custom_output()).unwrap();
    set_variant(&handler, &producer).unwrap();
    let print_a = rig.function(&parent, rig.print_int());
    let print_b = rig.function(&parent, rig.print_bool());
    link(&handler, 0, &print_a);
    link(&print_a, 0, &print_b);
    pull(&print_a, 0, &handler, 0);
    pull(&print_b, 0, &handler, 1);

    let child_id = child.borrow().id();
    let parent_id = parent.borrow().id();
    rig.rt.enable_graph(child_id).unwrap();
    rig.rt.enable_graph(parent_id).unwrap();

    rig.rt.traverse(&producer, Scope::Simulation).unwrap();
    assert_eq!(rig.drain_log(), ["print_int: 13", "print_bool: true"]);

    // A disabled handler no longer fires.
    rig.rt.disable_graph(parent_id).unwrap();
    rig.rt.traverse(&producer, Scope::Simulation).unwrap();
    assert!(rig.drain_log().is_empty());
    rig.assert_balanced();
}

#[test]
fn custom_getter_pulls_through_the_producer_graph() {
    let rig = Rig::new();
    let child = rig.rt.create_graph();
    let parent = rig.rt.create_graph();

    rig.helper.number.set(42);
    let producer = child.borrow_mut().create_node(NodeKind::custom_getter()).unwrap();
    producer.borrow().set_output_name("Value").unwrap();
    producer.borrow_mut().update_custom_io(0, "test", ValueType::Int).unwrap();
    let source = rig.function(&child, rig.get_number());
    pull(&producer, 0, &source, 0);

    let handler = parent.borrow_mut().create_node(NodeKind::handle_custom_getter()).unwrap();
    set_variant(&handler, &producer).unwrap();
    let print = rig.function(&parent, rig.print_int());
    pull(&print, 0, &handler, 0);

    rig.rt.traverse(&print, Scope::Simulation).unwrap();
    assert_eq!(rig.drain_log(), ["get_number: 42", "print_int: 42"]);
    rig.assert_balanced();
}

#[test]
fn traversal_errors_propagate_but_stay_balanced() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();

    // Instance binding with no target object: the call fails, the stack
    // does not leak.
    let broken = graph
        .borrow_mut()
        .create_node(NodeKind::function(rig.print_int(), None))
        .unwrap();
    broken.borrow().set_input_literal(0, Value::Int(1)).unwrap();

    let error = rig.rt.traverse(&broken, Scope::Simulation).unwrap_err();
    assert!(error.to_string().contains("target"));
    assert!(rig.drain_log().is_empty());
    rig.assert_balanced();
}

#[test]
#[should_panic(expected = "metadata")]
fn executing_a_comment_node_is_a_defect() {
    let rig = Rig::new();
    let graph = rig.rt.create_graph();
    let comment = graph.borrow_mut().create_node(NodeKind::comment()).unwrap();
    let _ = rig.rt.traverse(&comment, Scope::Simulation);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        // The load-bearing invariant, spelled as a property: whatever chain
        // of flow calls we author, a complete traversal visits it in order
        // and leaves the stack and frames exactly as deep as before.
        #[test]
        fn any_chain_of_flow_calls_stays_balanced(
            values in prop::collection::vec(any::<i64>(), 1..12)
        ) {
            let rig = Rig::new();
            let graph = rig.rt.create_graph();
            let nodes: Vec<NodeRef> = values
                .iter()
                .map(|v| {
                    let node = rig.function(&graph, rig.print_int());
                    node.borrow().set_input_literal(0, Value::Int(*v)).unwrap();
                    node
                })
                .collect();
            for pair in nodes.windows(2) {
                link(&pair[0], 0, &pair[1]);
            }

            rig.rt.traverse(&nodes[0], Scope::Simulation).unwrap();

            let expected: Vec<String> =
                values.iter().map(|v| format!("print_int: {v}")).collect();
            prop_assert_eq!(rig.drain_log(), expected);
            prop_assert_eq!(rig.rt.stack_depth(), rig.stack0);
            prop_assert_eq!(rig.rt.frame_depth(), rig.frames0);
        }
    }
}

//! The node contract: shared shape, the closed kind set, and capabilities.
//!
//! Every node owns four ordered lists — flow outputs, stack inputs, stack
//! outputs, and properties — plus kind-specific state in [`NodeKind`]. The
//! kind set is closed on purpose: the engine dispatches over a tagged union
//! and checks *capabilities* (`has_flow_input`, `is_flow_control`,
//! `supports_validation`, lifecycle participation) instead of walking an
//! inheritance hierarchy.
//!
//! # The execute protocol
//!
//! `execute` (dispatched in [`crate::nodes`]) returns the **count** of
//! flow-output indices the node pushed onto the value stack. Flow-control
//! nodes select their continuations by pushing indices; everything else
//! returns 0 and the engine follows the node's single default flow output if
//! it has one. A Sequence node with N outputs pushes `N-1 … 0` and returns
//! `N`, so the engine pops and visits outputs in ascending order.

use std::fmt;
use std::rc::Weak;

use flowgraph_bindings::{
    EventBinding, HostObject, MethodBinding, Scope, Value, ValueCell, ValueType,
};
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::graph::{Graph, GraphId, GraphRef, NodeId, VariableId};
use crate::nodes::delay::DelayNode;
use crate::nodes::event::EventNode;
use crate::nodes::function::FunctionNode;
use crate::nodes::metadata::{ErrorNode, GroupNode};
use crate::runtime::Runtime;
use crate::variant;

/// Property names shared between authoring, validation and serialization.
pub mod props {
    /// Variant handler: bound producer node id (guid).
    pub const VARIANT: &str = "Variant";
    /// Variant handler: graph hosting the producer (guid).
    pub const TARGET_GRAPH: &str = "TargetGraph";
    /// Custom event producer: the declared event name.
    pub const EVENT_NAME: &str = "EventName";
    /// Custom getter/output producer: the declared name.
    pub const OUTPUT_NAME: &str = "OutputName";
    /// Comment node text.
    pub const TEXT: &str = "Text";
    /// Variable node: bound graph variable id (guid).
    pub const VARIABLE: &str = "Variable";
}

/// A named control-flow edge to at most one target node in the same graph.
#[derive(Debug, Clone)]
pub struct FlowOutput {
    pub name: String,
    pub target: Option<NodeId>,
}

/// A named, typed data slot a node reads.
///
/// The literal cell is always present; a reference, when set, takes
/// precedence and is re-evaluated on every read (pull, not cached).
#[derive(Debug, Clone)]
pub struct StackInput {
    pub name: String,
    pub ty: ValueType,
    literal: ValueCell,
    pub reference: Option<(NodeId, usize)>,
}

impl StackInput {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            literal: ValueCell::of_type(ty),
            reference: None,
        }
    }

    /// The literal's backing cell; shared with whatever authoring surface
    /// edits it.
    pub fn literal(&self) -> &ValueCell {
        &self.literal
    }

    fn retype(&mut self, name: String, ty: ValueType) {
        self.name = name;
        if self.ty != ty {
            self.ty = ty;
            self.literal = ValueCell::of_type(ty);
        }
    }
}

/// A named, typed data slot a node writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutput {
    pub name: String,
    pub ty: ValueType,
}

impl StackOutput {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self { name: name.into(), ty }
    }
}

/// Node-specific configuration value (header text, a bound variant id, …).
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub ty: ValueType,
    cell: ValueCell,
    pub hidden: bool,
}

impl Property {
    fn new(name: &str, ty: ValueType, hidden: bool) -> Self {
        Self {
            name: name.to_string(),
            ty,
            cell: ValueCell::of_type(ty),
            hidden,
        }
    }

    pub fn cell(&self) -> &ValueCell {
        &self.cell
    }
}

/// Discriminant of [`NodeKind`]; doubles as the serialized type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    Function,
    Event,
    UpdateTick,
    FixedTick,
    Branch,
    Sequence,
    Delay,
    Group,
    Comment,
    Variable,
    CustomEvent,
    CallCustomEvent,
    CustomGetter,
    HandleCustomGetter,
    CustomOutput,
    HandleCustomOutput,
    Error,
}

impl NodeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeTag::Function => "Function",
            NodeTag::Event => "Event",
            NodeTag::UpdateTick => "UpdateTick",
            NodeTag::FixedTick => "FixedTick",
            NodeTag::Branch => "Branch",
            NodeTag::Sequence => "Sequence",
            NodeTag::Delay => "Delay",
            NodeTag::Group => "Group",
            NodeTag::Comment => "Comment",
            NodeTag::Variable => "Variable",
            NodeTag::CustomEvent => "CustomEvent",
            NodeTag::CallCustomEvent => "CallCustomEvent",
            NodeTag::CustomGetter => "CustomGetter",
            NodeTag::HandleCustomGetter => "HandleCustomGetter",
            NodeTag::CustomOutput => "CustomOutput",
            NodeTag::HandleCustomOutput => "HandleCustomOutput",
            NodeTag::Error => "Error",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "Function" => NodeTag::Function,
            "Event" => NodeTag::Event,
            "UpdateTick" => NodeTag::UpdateTick,
            "FixedTick" => NodeTag::FixedTick,
            "Branch" => NodeTag::Branch,
            "Sequence" => NodeTag::Sequence,
            "Delay" => NodeTag::Delay,
            "Group" => NodeTag::Group,
            "Comment" => NodeTag::Comment,
            "Variable" => NodeTag::Variable,
            "CustomEvent" => NodeTag::CustomEvent,
            "CallCustomEvent" => NodeTag::CallCustomEvent,
            "CustomGetter" => NodeTag::CustomGetter,
            "HandleCustomGetter" => NodeTag::HandleCustomGetter,
            "CustomOutput" => NodeTag::CustomOutput,
            "HandleCustomOutput" => NodeTag::HandleCustomOutput,
            "Error" => NodeTag::Error,
            _ => return None,
        })
    }
}

/// The closed set of node kinds, with per-kind state.
pub enum NodeKind {
    Function(FunctionNode),
    Event(EventNode),
    UpdateTick,
    FixedTick,
    Branch,
    Sequence,
    Delay(DelayNode),
    Group(GroupNode),
    Comment,
    Variable,
    CustomEvent,
    CallCustomEvent,
    CustomGetter,
    HandleCustomGetter,
    CustomOutput,
    HandleCustomOutput,
    Error(ErrorNode),
}

impl NodeKind {
    pub fn function(binding: MethodBinding, target: Option<HostObject>) -> Self {
        NodeKind::Function(FunctionNode { binding, target })
    }

    pub fn event(binding: EventBinding, target: HostObject) -> Self {
        NodeKind::Event(EventNode { binding, target })
    }

    pub fn update_tick() -> Self {
        NodeKind::UpdateTick
    }

    pub fn fixed_tick() -> Self {
        NodeKind::FixedTick
    }

    pub fn branch() -> Self {
        NodeKind::Branch
    }

    pub fn sequence() -> Self {
        NodeKind::Sequence
    }

    pub fn delay() -> Self {
        NodeKind::Delay(DelayNode::new())
    }

    pub fn group() -> Self {
        NodeKind::Group(GroupNode::default())
    }

    pub fn comment() -> Self {
        NodeKind::Comment
    }

    pub fn variable() -> Self {
        NodeKind::Variable
    }

    pub fn custom_event() -> Self {
        NodeKind::CustomEvent
    }

    pub fn call_custom_event() -> Self {
        NodeKind::CallCustomEvent
    }

    pub fn custom_getter() -> Self {
        NodeKind::CustomGetter
    }

    pub fn handle_custom_getter() -> Self {
        NodeKind::HandleCustomGetter
    }

    pub fn custom_output() -> Self {
        NodeKind::CustomOutput
    }

    pub fn handle_custom_output() -> Self {
        NodeKind::HandleCustomOutput
    }

    pub fn error(message: impl Into<String>, backup: crate::serialization::NodeEntry) -> Self {
        NodeKind::Error(ErrorNode {
            message: message.into(),
            backup,
        })
    }

    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Function(_) => NodeTag::Function,
            NodeKind::Event(_) => NodeTag::Event,
            NodeKind::UpdateTick => NodeTag::UpdateTick,
            NodeKind::FixedTick => NodeTag::FixedTick,
            NodeKind::Branch => NodeTag::Branch,
            NodeKind::Sequence => NodeTag::Sequence,
            NodeKind::Delay(_) => NodeTag::Delay,
            NodeKind::Group(_) => NodeTag::Group,
            NodeKind::Comment => NodeTag::Comment,
            NodeKind::Variable => NodeTag::Variable,
            NodeKind::CustomEvent => NodeTag::CustomEvent,
            NodeKind::CallCustomEvent => NodeTag::CallCustomEvent,
            NodeKind::CustomGetter => NodeTag::CustomGetter,
            NodeKind::HandleCustomGetter => NodeTag::HandleCustomGetter,
            NodeKind::CustomOutput => NodeTag::CustomOutput,
            NodeKind::HandleCustomOutput => NodeTag::HandleCustomOutput,
            NodeKind::Error(_) => NodeTag::Error,
        }
    }
}

/// A single node: shared shape plus kind-specific state.
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) graph_id: GraphId,
    pub(crate) owner: Weak<std::cell::RefCell<Graph>>,
    pub(crate) flow_outputs: Vec<FlowOutput>,
    pub(crate) stack_inputs: Vec<StackInput>,
    pub(crate) stack_outputs: Vec<StackOutput>,
    pub(crate) properties: Vec<Property>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        graph_id: GraphId,
        owner: Weak<std::cell::RefCell<Graph>>,
        kind: NodeKind,
    ) -> Self {
        Self {
            id,
            graph_id,
            owner,
            flow_outputs: Vec::new(),
            stack_inputs: Vec::new(),
            stack_outputs: Vec::new(),
            properties: Vec::new(),
            kind,
        }
    }

    /// Build the kind's initial IO shape. Called once, before registration.
    pub(crate) fn initialize(&mut self) -> Result<()> {
        debug_assert!(self.flow_outputs.is_empty());
        debug_assert!(self.stack_inputs.is_empty());
        debug_assert!(self.stack_outputs.is_empty());
        match &self.kind {
            NodeKind::Function(f) => {
                let signature = f.binding.signature.clone();
                if signature.is_static && f.target.is_some() {
                    return Err(FlowError::author(format!(
                        "static binding '{}' cannot take a target object",
                        signature.name
                    )));
                }
                if self.has_flow_input() {
                    self.flow_outputs.push(FlowOutput { name: "out".into(), target: None });
                }
                if let Some(ret) = signature.ret {
                    self.stack_outputs.push(StackOutput::new("ret", ret));
                }
                for param in &signature.params {
                    if param.out {
                        self.stack_outputs.push(StackOutput::new(&param.name, param.ty));
                    } else {
                        self.stack_inputs.push(StackInput::new(&param.name, param.ty));
                    }
                }
            }
            NodeKind::Event(e) => {
                let params = e.binding.params.clone();
                self.flow_outputs.push(FlowOutput { name: "out".into(), target: None });
                for param in &params {
                    self.stack_outputs.push(StackOutput::new(&param.name, param.ty));
                }
            }
            NodeKind::UpdateTick | NodeKind::FixedTick => {
                self.flow_outputs.push(FlowOutput { name: "out".into(), target: None });
            }
            NodeKind::Branch => {
                self.stack_inputs.push(StackInput::new("condition", ValueType::Bool));
                self.flow_outputs.push(FlowOutput { name: "true".into(), target: None });
                self.flow_outputs.push(FlowOutput { name: "false".into(), target: None });
            }
            NodeKind::Sequence => {}
            NodeKind::Delay(_) => {
                self.stack_inputs.push(StackInput::new("duration", ValueType::Float));
                self.flow_outputs.push(FlowOutput { name: "started".into(), target: None });
                self.flow_outputs.push(FlowOutput { name: "completed".into(), target: None });
            }
            NodeKind::Group(_) => {}
            NodeKind::Comment => {
                self.properties.push(Property::new(props::TEXT, ValueType::String, false));
            }
            NodeKind::Variable => {
                self.properties.push(Property::new(props::VARIABLE, ValueType::Guid, false));
            }
            NodeKind::CustomEvent => {
                self.flow_outputs.push(FlowOutput { name: "out".into(), target: None });
                self.properties.push(Property::new(props::EVENT_NAME, ValueType::String, false));
            }
            NodeKind::CallCustomEvent => {
                self.properties.push(Property::new(props::VARIANT, ValueType::Guid, false));
                self.properties.push(Property::new(props::TARGET_GRAPH, ValueType::Guid, true));
            }
            NodeKind::CustomGetter => {
                self.properties.push(Property::new(props::OUTPUT_NAME, ValueType::String, false));
                self.stack_inputs.push(StackInput::new("value", ValueType::Float));
            }
            NodeKind::HandleCustomGetter => {
                self.properties.push(Property::new(props::VARIANT, ValueType::Guid, false));
                self.properties.push(Property::new(props::TARGET_GRAPH, ValueType::Guid, true));
            }
            NodeKind::CustomOutput => {
                self.flow_outputs.push(FlowOutput { name: "out".into(), target: None });
                self.properties.push(Property::new(props::OUTPUT_NAME, ValueType::String, false));
            }
            NodeKind::HandleCustomOutput => {
                self.flow_outputs.push(FlowOutput { name: "out".into(), target: None });
                self.properties.push(Property::new(props::VARIANT, ValueType::Guid, false));
                self.properties.push(Property::new(props::TARGET_GRAPH, ValueType::Guid, true));
            }
            NodeKind::Error(_) => {}
        }
        Ok(())
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn graph_id(&self) -> GraphId {
        self.graph_id
    }

    /// The owning graph, if it is still alive.
    pub fn owner(&self) -> Option<GraphRef> {
        self.owner.upgrade()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub fn tag(&self) -> NodeTag {
        self.kind.tag()
    }

    /// Display name for authors and error messages.
    pub fn name(&self) -> String {
        match &self.kind {
            NodeKind::Function(f) => f.binding.signature.description.clone(),
            NodeKind::Event(e) => e.binding.description.clone(),
            NodeKind::UpdateTick => "On Update".into(),
            NodeKind::FixedTick => "On Fixed Update".into(),
            NodeKind::Branch => "Branch".into(),
            NodeKind::Sequence => "Sequence".into(),
            NodeKind::Delay(_) => "Delay".into(),
            NodeKind::Group(_) => "Group".into(),
            NodeKind::Comment => "Comment".into(),
            NodeKind::Variable => "Variable".into(),
            NodeKind::CustomEvent => "Event (custom)".into(),
            NodeKind::CallCustomEvent => "Call Custom Event".into(),
            NodeKind::CustomGetter => "Getter (custom)".into(),
            NodeKind::HandleCustomGetter => "Get Custom Value".into(),
            NodeKind::CustomOutput => "Output (custom)".into(),
            NodeKind::HandleCustomOutput => "On Custom Output".into(),
            NodeKind::Error(_) => "Error".into(),
        }
    }

    /// Execution domain this node is allowed to run in.
    pub fn scope(&self) -> Scope {
        match &self.kind {
            NodeKind::Function(f) => f.binding.signature.scope,
            NodeKind::Event(e) => e.binding.scope,
            NodeKind::UpdateTick => Scope::Presentation,
            NodeKind::FixedTick => Scope::Simulation,
            _ => Scope::Any,
        }
    }

    /// Whether traversal can enter this node through a flow edge.
    pub fn has_flow_input(&self) -> bool {
        match &self.kind {
            NodeKind::Function(f) => {
                f.binding.signature.force_flow || !f.binding.signature.has_return_values()
            }
            NodeKind::Branch
            | NodeKind::Sequence
            | NodeKind::Delay(_)
            | NodeKind::CallCustomEvent
            | NodeKind::CustomOutput => true,
            _ => false,
        }
    }

    /// Flow-control nodes pick their continuations explicitly; the engine
    /// never default-follows their first output.
    pub fn is_flow_control(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Branch | NodeKind::Sequence | NodeKind::Delay(_)
        )
    }

    /// Whether this node has enable/disable lifecycle hooks.
    pub fn has_lifecycle_hooks(&self) -> bool {
        matches!(self.kind, NodeKind::Event(_) | NodeKind::HandleCustomOutput)
    }

    /// Whether this node advances internal state on host ticks.
    pub fn is_tick_driven(&self) -> bool {
        matches!(self.kind, NodeKind::Delay(_))
    }

    /// Whether [`check_for_errors`](Self::check_for_errors) can report
    /// anything for this kind.
    pub fn supports_validation(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Function(_)
                | NodeKind::CallCustomEvent
                | NodeKind::HandleCustomGetter
                | NodeKind::HandleCustomOutput
                | NodeKind::Error(_)
        )
    }

    /// Whether this node declares a cross-graph extension point.
    pub fn is_variant_producer(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::CustomEvent | NodeKind::CustomGetter | NodeKind::CustomOutput
        )
    }

    /// Whether this node binds to an extension point by id.
    pub fn is_variant_handler(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::CallCustomEvent | NodeKind::HandleCustomGetter | NodeKind::HandleCustomOutput
        )
    }

    pub fn flow_outputs(&self) -> &[FlowOutput] {
        &self.flow_outputs
    }

    /// Point flow output `index` at `target` (or clear it).
    pub fn set_flow_target(&mut self, index: usize, target: Option<NodeId>) -> Result<()> {
        let output = self.flow_outputs.get_mut(index).ok_or_else(|| {
            FlowError::author(format!("flow output {index} is out of range"))
        })?;
        output.target = target;
        Ok(())
    }

    pub fn stack_inputs(&self) -> &[StackInput] {
        &self.stack_inputs
    }

    pub fn stack_outputs(&self) -> &[StackOutput] {
        &self.stack_outputs
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Wire stack input `index` to read `output` of `node` on every pull.
    pub fn bind_input(&mut self, index: usize, node: NodeId, output: usize) -> Result<()> {
        let input = self.stack_inputs.get_mut(index).ok_or_else(|| {
            FlowError::author(format!("stack input {index} is out of range"))
        })?;
        input.reference = Some((node, output));
        Ok(())
    }

    /// Detach stack input `index` from its reference; it reads its literal
    /// again afterwards.
    pub fn unbind_input(&mut self, index: usize) -> Result<()> {
        let input = self.stack_inputs.get_mut(index).ok_or_else(|| {
            FlowError::author(format!("stack input {index} is out of range"))
        })?;
        input.reference = None;
        Ok(())
    }

    /// Overwrite the literal of stack input `index`. The value must match
    /// the input's declared type.
    pub fn set_input_literal(&self, index: usize, value: Value) -> Result<()> {
        let input = self.stack_inputs.get(index).ok_or_else(|| {
            FlowError::author(format!("stack input {index} is out of range"))
        })?;
        input.literal.set(value);
        Ok(())
    }

    pub fn input_literal(&self, index: usize) -> Option<ValueCell> {
        self.stack_inputs.get(index).map(|i| i.literal.clone())
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_cell(&self, name: &str) -> Option<ValueCell> {
        self.property(name).map(|p| p.cell.clone())
    }

    pub(crate) fn guid_property(&self, name: &str) -> Uuid {
        self.property(name)
            .map(|p| p.cell.get_guid())
            .unwrap_or_else(Uuid::nil)
    }

    pub(crate) fn set_guid_property(&self, name: &str, value: Uuid) {
        if let Some(p) = self.property(name) {
            p.cell.set(Value::Guid(value));
        }
    }

    /// Set a custom event producer's declared name.
    pub fn set_event_name(&self, name: impl Into<String>) -> Result<()> {
        self.set_string_prop(NodeTag::CustomEvent, props::EVENT_NAME, name.into())
    }

    /// Set a custom getter/output producer's declared name.
    pub fn set_output_name(&self, name: impl Into<String>) -> Result<()> {
        match self.tag() {
            NodeTag::CustomGetter | NodeTag::CustomOutput => {
                self.property(props::OUTPUT_NAME)
                    .expect("producer is missing its name property")
                    .cell
                    .set(Value::String(name.into()));
                Ok(())
            }
            tag => Err(FlowError::author(format!(
                "{} nodes have no output name",
                tag.as_str()
            ))),
        }
    }

    /// Set a comment node's text.
    pub fn set_comment_text(&self, text: impl Into<String>) -> Result<()> {
        self.set_string_prop(NodeTag::Comment, props::TEXT, text.into())
    }

    fn set_string_prop(&self, expected: NodeTag, name: &str, value: String) -> Result<()> {
        if self.tag() != expected {
            return Err(FlowError::author(format!(
                "{} nodes have no '{name}' property",
                self.tag().as_str()
            )));
        }
        self.property(name)
            .expect("initialized node is missing a declared property")
            .cell
            .set(Value::String(value));
        Ok(())
    }

    /// Append a custom IO slot: a stack output on a custom event producer,
    /// a stack input on a custom output producer.
    pub fn add_custom_io(&mut self, name: impl Into<String>, ty: ValueType) -> Result<()> {
        match self.kind.tag() {
            NodeTag::CustomEvent => {
                self.stack_outputs.push(StackOutput::new(name, ty));
                Ok(())
            }
            NodeTag::CustomOutput => {
                self.stack_inputs.push(StackInput::new(name, ty));
                Ok(())
            }
            tag => Err(FlowError::author(format!(
                "{} nodes do not support adding custom IO",
                tag.as_str()
            ))),
        }
    }

    /// Rename/retype an existing custom IO slot. Custom getters allow this
    /// on their single fixed input even though they cannot add or remove.
    pub fn update_custom_io(&mut self, index: usize, name: impl Into<String>, ty: ValueType) -> Result<()> {
        let name = name.into();
        match self.kind.tag() {
            NodeTag::CustomEvent => {
                let output = self.stack_outputs.get_mut(index).ok_or_else(|| {
                    FlowError::author(format!("custom IO {index} is out of range"))
                })?;
                output.name = name;
                output.ty = ty;
                Ok(())
            }
            NodeTag::CustomOutput | NodeTag::CustomGetter => {
                let input = self.stack_inputs.get_mut(index).ok_or_else(|| {
                    FlowError::author(format!("custom IO {index} is out of range"))
                })?;
                input.retype(name, ty);
                Ok(())
            }
            tag => Err(FlowError::author(format!(
                "{} nodes do not support custom IO",
                tag.as_str()
            ))),
        }
    }

    /// Remove a custom IO slot.
    pub fn remove_custom_io(&mut self, index: usize) -> Result<()> {
        match self.kind.tag() {
            NodeTag::CustomEvent => {
                if index >= self.stack_outputs.len() {
                    return Err(FlowError::author(format!("custom IO {index} is out of range")));
                }
                self.stack_outputs.remove(index);
                Ok(())
            }
            NodeTag::CustomOutput => {
                if index >= self.stack_inputs.len() {
                    return Err(FlowError::author(format!("custom IO {index} is out of range")));
                }
                self.stack_inputs.remove(index);
                Ok(())
            }
            tag => Err(FlowError::author(format!(
                "{} nodes do not support removing custom IO",
                tag.as_str()
            ))),
        }
    }

    /// Append a flow output to a sequence node; returns its index. Affects
    /// future traversals only.
    pub fn add_custom_flow(&mut self) -> Result<usize> {
        if self.kind.tag() != NodeTag::Sequence {
            return Err(FlowError::author(format!(
                "{} nodes do not support custom flow outputs",
                self.kind.tag().as_str()
            )));
        }
        let index = self.flow_outputs.len();
        self.flow_outputs.push(FlowOutput { name: index.to_string(), target: None });
        Ok(index)
    }

    /// Remove a sequence flow output.
    pub fn remove_custom_flow(&mut self, index: usize) -> Result<()> {
        if self.kind.tag() != NodeTag::Sequence {
            return Err(FlowError::author(format!(
                "{} nodes do not support custom flow outputs",
                self.kind.tag().as_str()
            )));
        }
        if index >= self.flow_outputs.len() {
            return Err(FlowError::author(format!("flow output {index} is out of range")));
        }
        self.flow_outputs.remove(index);
        for (i, output) in self.flow_outputs.iter_mut().enumerate() {
            output.name = i.to_string();
        }
        Ok(())
    }

    /// Add a child to a group node. A group cannot contain itself and
    /// rejects duplicates.
    pub fn add_group_child(&mut self, child: NodeId) -> Result<()> {
        if child == self.id {
            return Err(FlowError::author("a group cannot contain itself"));
        }
        let id = self.id;
        match &mut self.kind {
            NodeKind::Group(group) => {
                if group.children.contains(&child) {
                    return Err(FlowError::author(format!(
                        "group '{id}' already contains a duplicate child '{child}'"
                    )));
                }
                group.children.push(child);
                Ok(())
            }
            _ => Err(FlowError::author("only group nodes have children")),
        }
    }

    pub fn remove_group_child(&mut self, child: NodeId) -> Result<()> {
        match &mut self.kind {
            NodeKind::Group(group) => {
                let before = group.children.len();
                group.children.retain(|&c| c != child);
                if group.children.len() == before {
                    return Err(FlowError::author(format!(
                        "node '{child}' is not a child of this group"
                    )));
                }
                Ok(())
            }
            _ => Err(FlowError::author("only group nodes have children")),
        }
    }

    pub fn group_children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Group(group) => &group.children,
            _ => &[],
        }
    }

    pub(crate) fn detach_group_child(&mut self, child: NodeId) {
        if let NodeKind::Group(group) = &mut self.kind {
            group.children.retain(|&c| c != child);
        }
    }

    /// Point a variable node at a graph variable, mirroring its name and
    /// type as this node's single stack output.
    pub(crate) fn bind_variable(
        &mut self,
        id: VariableId,
        name: String,
        ty: ValueType,
    ) -> Result<()> {
        if self.kind.tag() != NodeTag::Variable {
            return Err(FlowError::author(format!(
                "{} nodes cannot bind a variable",
                self.kind.tag().as_str()
            )));
        }
        self.set_guid_property(props::VARIABLE, id.as_uuid());
        self.stack_outputs = vec![StackOutput::new(name, ty)];
        Ok(())
    }

    /// Clear every flow edge and data reference pointing at `id`.
    pub(crate) fn remove_links_to(&mut self, id: NodeId) {
        for output in &mut self.flow_outputs {
            if output.target == Some(id) {
                output.target = None;
            }
        }
        for input in &mut self.stack_inputs {
            if matches!(input.reference, Some((target, _)) if target == id) {
                input.reference = None;
            }
        }
    }

    /// Static validation: a human-readable problem description, or `None`.
    ///
    /// Never fatal; broken nodes are reported and skipped, not crashed on.
    pub fn check_for_errors(&self, rt: &Runtime) -> Option<String> {
        match &self.kind {
            NodeKind::Function(f) => {
                if !f.binding.signature.is_static && f.target.is_none() {
                    Some("Binding target is missing".to_string())
                } else {
                    None
                }
            }
            NodeKind::CallCustomEvent | NodeKind::HandleCustomGetter | NodeKind::HandleCustomOutput => {
                variant::check_handler(self, rt)
            }
            NodeKind::Error(e) => Some(e.message.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("kind", &self.kind.tag())
            .field("name", &self.name())
            .finish()
    }
}

//! The structured entry format graphs save to and load from.
//!
//! Entries are plain serde structs; hosts choose the wire format (JSON,
//! whatever `serde` can drive). The guarantees here are the load-time ones:
//!
//! - after a successful load, a node's IO shape matches what was
//!   serialized, or the node is replaced by an error placeholder carrying
//!   the raw entry and a diagnostic;
//! - a broken entry never fails the whole graph — the rest loads normally;
//! - saving a graph containing error placeholders writes their preserved
//!   entries back verbatim, so unresolvable nodes round-trip losslessly.
//!
//! Bindings and host objects cannot be serialized; the host supplies a
//! [`BindingResolver`] on load and an [`ObjectKeys`] table on save to map
//! them to stable names. A live object reference with no key is a save
//! error; object-reference *literals* other than "none" are not
//! representable at all.

use flowgraph_bindings::{HostObject, MethodBinding, Value, ValueType};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::graph::{Graph, NodeId, Variable, VariableId};
use crate::node::{FlowOutput, Node, NodeKind, NodeTag, StackInput, StackOutput, props};

/// Version stamp written into every [`GraphEntry`].
pub const FORMAT_VERSION: u32 = 0;

/// Host-supplied lookup used while loading: resolve binding names and host
/// object keys back to live values.
pub trait BindingResolver {
    fn method(&self, name: &str) -> Option<MethodBinding>;
    fn event(&self, name: &str) -> Option<flowgraph_bindings::EventBinding>;
    fn object(&self, key: &str) -> Option<HostObject>;
}

/// Host-supplied reverse lookup used while saving: a stable key for each
/// live host object referenced by the graph.
pub trait ObjectKeys {
    fn key_for(&self, object: &HostObject) -> Option<String>;
}

/// A whole graph: variables and nodes, in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEntry {
    pub version: u32,
    #[serde(default)]
    pub variables: Vec<VariableEntry>,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableEntry {
    pub id: Uuid,
    pub name: String,
    pub ty: ValueType,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: Uuid,
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_outputs: Vec<FlowOutputEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_inputs: Vec<StackInputEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_outputs: Vec<StackOutputEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyEntry {
    pub name: String,
    pub ty: ValueType,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowOutputEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackInputEntry {
    pub name: String,
    pub ty: ValueType,
    pub literal: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Uuid>,
    #[serde(default)]
    pub reference_output: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOutputEntry {
    pub name: String,
    pub ty: ValueType,
}

fn literal_to_json(value: &Value) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Bool(v) => json!(v),
        Value::Int(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::String(v) => json!(v),
        Value::Guid(v) => json!(v.to_string()),
        Value::ObjectRef(None) => serde_json::Value::Null,
        Value::ObjectRef(Some(_)) => {
            return Err(FlowError::Save(
                "live object references cannot be serialized as literals".to_string(),
            ))
        }
    })
}

fn literal_from_json(ty: ValueType, value: &serde_json::Value) -> Result<Value> {
    let bad = || FlowError::load(format!("literal {value} is not a valid {ty}"));
    Ok(match ty {
        ValueType::Bool => Value::Bool(value.as_bool().ok_or_else(bad)?),
        ValueType::Int => Value::Int(value.as_i64().ok_or_else(bad)?),
        ValueType::Float => Value::Float(value.as_f64().ok_or_else(bad)?),
        ValueType::String => Value::String(value.as_str().ok_or_else(bad)?.to_string()),
        ValueType::Guid => {
            Value::Guid(Uuid::parse_str(value.as_str().ok_or_else(bad)?).map_err(|_| bad())?)
        }
        ValueType::ObjectRef => {
            if value.is_null() {
                Value::ObjectRef(None)
            } else {
                return Err(bad());
            }
        }
    })
}

impl Graph {
    /// Write the whole graph out as an entry tree.
    pub fn save(&self, keys: &dyn ObjectKeys) -> Result<GraphEntry> {
        let mut entry = GraphEntry {
            version: FORMAT_VERSION,
            variables: Vec::new(),
            nodes: Vec::new(),
        };
        for (id, variable) in self.variables() {
            entry.variables.push(VariableEntry {
                id: id.as_uuid(),
                name: variable.name().to_string(),
                ty: variable.ty(),
                value: literal_to_json(&variable.cell().get())?,
            });
        }
        for node in self.nodes() {
            entry.nodes.push(save_node(&node.borrow(), keys)?);
        }
        Ok(entry)
    }

    /// Reconstruct nodes and variables from an entry tree.
    ///
    /// Individual node failures become error placeholders; only structural
    /// problems (wrong format version) fail the whole load.
    pub fn load(&mut self, entry: &GraphEntry, resolver: &dyn BindingResolver) -> Result<()> {
        if entry.version != FORMAT_VERSION {
            return Err(FlowError::load(format!(
                "unsupported format version {}",
                entry.version
            )));
        }

        for variable in &entry.variables {
            let value = literal_from_json(variable.ty, &variable.value)?;
            let id = self.load_variable(
                VariableId::from_uuid(variable.id),
                variable.name.clone(),
                variable.ty,
            );
            self.variable(id).expect("just inserted").cell().set(value);
        }

        for node_entry in &entry.nodes {
            let id = NodeId::from_uuid(node_entry.id);
            let node = match self.load_node(node_entry, resolver) {
                Ok(node) => node,
                Err(error) => {
                    tracing::warn!(
                        %error,
                        node_type = %node_entry.node_type,
                        "node entry failed to load; substituting an error placeholder"
                    );
                    let mut node = Node::new(
                        id,
                        self.id,
                        self.weak_self.clone(),
                        NodeKind::error(error.to_string(), node_entry.clone()),
                    );
                    node.initialize()?;
                    node
                }
            };
            self.register(id, node);
        }
        Ok(())
    }

    fn load_variable(&mut self, id: VariableId, name: String, ty: ValueType) -> VariableId {
        self.variables.insert(id, Variable::reconstruct(name, ty));
        self.variable_order.push(id);
        id
    }

    fn load_node(&self, entry: &NodeEntry, resolver: &dyn BindingResolver) -> Result<Node> {
        let tag = NodeTag::parse(&entry.node_type)
            .ok_or_else(|| FlowError::load(format!("unknown node type '{}'", entry.node_type)))?;

        let kind = match tag {
            NodeTag::Function => {
                let name = entry
                    .binding
                    .as_deref()
                    .ok_or_else(|| FlowError::load("function entry has no binding name"))?;
                let binding = resolver
                    .method(name)
                    .ok_or_else(|| FlowError::load(format!("binding '{name}' was not found")))?;
                let target = entry
                    .target
                    .as_deref()
                    .map(|key| {
                        resolver.object(key).ok_or_else(|| {
                            FlowError::load(format!("target object '{key}' was not found"))
                        })
                    })
                    .transpose()?;
                NodeKind::function(binding, target)
            }
            NodeTag::Event => {
                let name = entry
                    .binding
                    .as_deref()
                    .ok_or_else(|| FlowError::load("event entry has no binding name"))?;
                let binding = resolver
                    .event(name)
                    .ok_or_else(|| FlowError::load(format!("event binding '{name}' was not found")))?;
                let key = entry
                    .target
                    .as_deref()
                    .ok_or_else(|| FlowError::load("event entry has no target object"))?;
                let target = resolver
                    .object(key)
                    .ok_or_else(|| FlowError::load(format!("target object '{key}' was not found")))?;
                NodeKind::event(binding, target)
            }
            NodeTag::UpdateTick => NodeKind::update_tick(),
            NodeTag::FixedTick => NodeKind::fixed_tick(),
            NodeTag::Branch => NodeKind::branch(),
            NodeTag::Sequence => NodeKind::sequence(),
            NodeTag::Delay => NodeKind::delay(),
            NodeTag::Group => NodeKind::group(),
            NodeTag::Comment => NodeKind::comment(),
            NodeTag::Variable => NodeKind::variable(),
            NodeTag::CustomEvent => NodeKind::custom_event(),
            NodeTag::CallCustomEvent => NodeKind::call_custom_event(),
            NodeTag::CustomGetter => NodeKind::custom_getter(),
            NodeTag::HandleCustomGetter => NodeKind::handle_custom_getter(),
            NodeTag::CustomOutput => NodeKind::custom_output(),
            NodeTag::HandleCustomOutput => NodeKind::handle_custom_output(),
            NodeTag::Error => {
                return Err(FlowError::load("error placeholders are not loadable"))
            }
        };

        let mut node = Node::new(
            NodeId::from_uuid(entry.id),
            self.id,
            self.weak_self.clone(),
            kind,
        );
        node.initialize()?;
        apply_entry(&mut node, entry)?;

        if tag == NodeTag::Variable {
            let variable_id = VariableId::from_uuid(node.guid_property(props::VARIABLE));
            if !variable_id.is_nil() {
                let variable = self.variable(variable_id).ok_or_else(|| {
                    FlowError::load(format!("graph variable '{variable_id}' was not found"))
                })?;
                node.bind_variable(variable_id, variable.name().to_string(), variable.ty())?;
            }
        }

        Ok(node)
    }
}

fn save_node(node: &Node, keys: &dyn ObjectKeys) -> Result<NodeEntry> {
    // Error placeholders round-trip their preserved entry untouched.
    if let NodeKind::Error(error) = node.kind() {
        return Ok(error.backup.clone());
    }

    let mut entry = NodeEntry {
        id: node.id().as_uuid(),
        node_type: node.tag().as_str().to_string(),
        binding: None,
        target: None,
        properties: Vec::new(),
        flow_outputs: Vec::new(),
        stack_inputs: Vec::new(),
        stack_outputs: Vec::new(),
        children: Vec::new(),
    };

    let missing_key = |name: &str| {
        FlowError::Save(format!("no serializable key for the target object of '{name}'"))
    };
    match node.kind() {
        NodeKind::Function(f) => {
            entry.binding = Some(f.binding.signature.name.clone());
            if let Some(target) = &f.target {
                entry.target =
                    Some(keys.key_for(target).ok_or_else(|| missing_key(&node.name()))?);
            }
        }
        NodeKind::Event(e) => {
            entry.binding = Some(e.binding.name.clone());
            entry.target =
                Some(keys.key_for(&e.target).ok_or_else(|| missing_key(&node.name()))?);
        }
        NodeKind::Group(group) => {
            entry.children = group.children.iter().map(|c| c.as_uuid()).collect();
        }
        _ => {}
    }

    for output in node.flow_outputs() {
        entry.flow_outputs.push(FlowOutputEntry {
            name: output.name.clone(),
            target: output.target.map(|t| t.as_uuid()),
        });
    }
    for input in node.stack_inputs() {
        entry.stack_inputs.push(StackInputEntry {
            name: input.name.clone(),
            ty: input.ty,
            literal: literal_to_json(&input.literal().get())?,
            reference: input.reference.map(|(node, _)| node.as_uuid()),
            reference_output: input.reference.map(|(_, output)| output).unwrap_or(0),
        });
    }
    for output in node.stack_outputs() {
        entry.stack_outputs.push(StackOutputEntry {
            name: output.name.clone(),
            ty: output.ty,
        });
    }
    for property in node.properties() {
        entry.properties.push(PropertyEntry {
            name: property.name.clone(),
            ty: property.ty,
            value: literal_to_json(&property.cell().get())?,
        });
    }

    Ok(entry)
}

/// Apply a deserialized entry onto a freshly initialized node. User-defined
/// IO lists are rebuilt from the entry; binding-derived shapes must match
/// it, or the node fails to load.
fn apply_entry(node: &mut Node, entry: &NodeEntry) -> Result<()> {
    match node.tag() {
        // User-defined outputs. Variable nodes are here too: their single
        // output mirrors the bound graph variable and is rebound right
        // after the entry is applied.
        NodeTag::CustomEvent
        | NodeTag::HandleCustomGetter
        | NodeTag::HandleCustomOutput
        | NodeTag::Variable => {
            node.stack_outputs = entry
                .stack_outputs
                .iter()
                .map(|o| StackOutput::new(&o.name, o.ty))
                .collect();
        }
        // User-defined inputs.
        NodeTag::CallCustomEvent | NodeTag::CustomOutput | NodeTag::CustomGetter => {
            node.stack_inputs = entry
                .stack_inputs
                .iter()
                .map(|i| StackInput::new(&i.name, i.ty))
                .collect();
        }
        // User-defined flow fan-out.
        NodeTag::Sequence => {
            node.flow_outputs = entry
                .flow_outputs
                .iter()
                .map(|f| FlowOutput { name: f.name.clone(), target: None })
                .collect();
        }
        NodeTag::Group => {
            for child in &entry.children {
                node.add_group_child(NodeId::from_uuid(*child))
                    .map_err(|e| FlowError::load(e.to_string()))?;
            }
        }
        _ => {}
    }

    if entry.flow_outputs.len() != node.flow_outputs.len() {
        return Err(FlowError::load(format!(
            "flow output count {} does not match the expected {}",
            entry.flow_outputs.len(),
            node.flow_outputs.len()
        )));
    }
    for (output, e) in node.flow_outputs.iter_mut().zip(&entry.flow_outputs) {
        if output.name != e.name {
            tracing::warn!(
                expected = %output.name,
                deserialized = %e.name,
                "flow output name mismatch"
            );
        }
        output.target = e.target.map(NodeId::from_uuid);
    }

    if entry.stack_inputs.len() != node.stack_inputs.len() {
        return Err(FlowError::load(format!(
            "stack input count {} does not match the expected {}",
            entry.stack_inputs.len(),
            node.stack_inputs.len()
        )));
    }
    for (input, e) in node.stack_inputs.iter_mut().zip(&entry.stack_inputs) {
        if input.ty != e.ty {
            return Err(FlowError::load(format!(
                "stack input '{}' type {} does not match the expected {}",
                e.name, e.ty, input.ty
            )));
        }
        if input.name != e.name {
            tracing::warn!(
                expected = %input.name,
                deserialized = %e.name,
                "stack input name mismatch"
            );
        }
        input.literal().set(literal_from_json(input.ty, &e.literal)?);
        input.reference = e
            .reference
            .map(|r| (NodeId::from_uuid(r), e.reference_output));
    }

    if entry.stack_outputs.len() != node.stack_outputs.len() {
        return Err(FlowError::load(format!(
            "stack output count {} does not match the expected {}",
            entry.stack_outputs.len(),
            node.stack_outputs.len()
        )));
    }
    for (output, e) in node.stack_outputs.iter().zip(&entry.stack_outputs) {
        if output.ty != e.ty {
            return Err(FlowError::load(format!(
                "stack output '{}' type {} does not match the expected {}",
                e.name, e.ty, output.ty
            )));
        }
    }

    for e in &entry.properties {
        match node.property(&e.name) {
            Some(property) => {
                property.cell().set(literal_from_json(property.ty, &e.value)?);
            }
            None => {
                tracing::warn!(property = %e.name, "deserialized property does not exist");
            }
        }
    }

    Ok(())
}

//! The shared, typed value stack used for inter-node data passing.
//!
//! One [`ValueStack`] exists per execution domain and lives for the life of
//! its runtime. Nodes communicate exclusively through it: binding invoke
//! functions pop their declared inputs and push their declared outputs, flow
//! control nodes push the flow indices they select, and pull-based data
//! evaluation leaves exactly one value on top for its consumer.
//!
//! # Ownership of slots
//!
//! A slot is either *owned* (pushed by the current traversal; the stack
//! created its backing cell) or *placed* (a non-owning alias of a cell that
//! belongs to something longer-lived — a literal, a property, a graph
//! variable, or an owned slot deeper in the stack). Consumers never need to
//! care which they are reading; only producers choose between [`push`] and
//! [`place`].
//!
//! # Contract violations
//!
//! Typed pops assert the slot's tag. A mismatch means two nodes disagree
//! about the data contract between them, which is a defect in the graph or a
//! binding — it panics rather than returning an error.
//!
//! [`push`]: ValueStack::push
//! [`place`]: ValueStack::place
//!
//! # Examples
//!
//! ```rust
//! use flowgraph_bindings::{Value, ValueStack};
//!
//! let mut stack = ValueStack::new();
//! stack.push_int(7);
//! stack.push_bool(true);
//! assert_eq!(stack.pop_bool(), true);
//! assert_eq!(stack.pop_int(), 7);
//! assert!(stack.is_empty());
//! ```

use uuid::Uuid;

use crate::value::{HostObject, Value, ValueCell, ValueType};

struct Slot {
    owned: bool,
    cell: ValueCell,
}

/// Ordered sequence of typed value slots with absolute peek addressing.
#[derive(Default)]
pub struct ValueStack {
    slots: Vec<Slot>,
}

impl ValueStack {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of slots currently on the stack.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Push an owned slot holding `value`.
    ///
    /// The stack allocates a fresh backing cell; the slot is owned by the
    /// current traversal and freed when popped.
    pub fn push(&mut self, value: Value) {
        self.slots.push(Slot {
            owned: true,
            cell: ValueCell::new(value),
        });
    }

    pub fn push_bool(&mut self, value: bool) {
        self.push(Value::Bool(value));
    }

    pub fn push_int(&mut self, value: i64) {
        self.push(Value::Int(value));
    }

    pub fn push_float(&mut self, value: f64) {
        self.push(Value::Float(value));
    }

    pub fn push_string(&mut self, value: impl Into<String>) {
        self.push(Value::String(value.into()));
    }

    pub fn push_guid(&mut self, value: Uuid) {
        self.push(Value::Guid(value));
    }

    pub fn push_object(&mut self, value: Option<HostObject>) {
        self.push(Value::ObjectRef(value));
    }

    /// Push an owned copy of a slot from another stack.
    ///
    /// Used by execution context duplication: the copy is a fresh cell with
    /// the same value, so the duplicate survives the source being popped.
    pub fn push_copy(&mut self, source: &ValueStack, index: usize) {
        self.push(source.slots[index].cell.get());
    }

    /// Place a non-owning alias of `cell` on top of the stack.
    ///
    /// The stack does not take ownership; popping the slot later leaves the
    /// cell itself untouched. The cell must currently hold a value of `ty`.
    pub fn place(&mut self, ty: ValueType, cell: &ValueCell) {
        assert_eq!(
            cell.value_type(),
            ty,
            "cannot place a {} cell as a {} slot",
            cell.value_type(),
            ty
        );
        self.slots.push(Slot {
            owned: false,
            cell: cell.clone(),
        });
    }

    /// Remove the top slot and return its value.
    pub fn pop_value(&mut self) -> Value {
        let slot = self.slots.pop().expect("pop on an empty value stack");
        slot.cell.get()
    }

    /// Remove the slot `offset` entries below the top.
    ///
    /// `remove(0)` is equivalent to discarding the top slot. Used by the
    /// data-node cleanup policy, which keeps one output of a re-executed
    /// node and discards the rest.
    pub fn remove(&mut self, offset: usize) {
        let index = self
            .slots
            .len()
            .checked_sub(1 + offset)
            .expect("remove offset exceeds value stack depth");
        self.slots.remove(index);
    }

    /// Handle of the slot at absolute `index` (0 is the stack bottom).
    ///
    /// Absolute addressing keeps frame-relative reads stable across further
    /// pushes, which is what output placement relies on.
    pub fn peek(&self, index: usize) -> ValueCell {
        self.slots[index].cell.clone()
    }

    /// Whether the slot at absolute `index` is owned by the stack.
    pub fn slot_is_owned(&self, index: usize) -> bool {
        self.slots[index].owned
    }

    /// Pop a bool; panics if the top slot holds anything else.
    pub fn pop_bool(&mut self) -> bool {
        match self.pop_value() {
            Value::Bool(v) => v,
            v => panic!("stack type mismatch: expected bool, found {}", v.value_type()),
        }
    }

    /// Pop an int; panics if the top slot holds anything else.
    pub fn pop_int(&mut self) -> i64 {
        match self.pop_value() {
            Value::Int(v) => v,
            v => panic!("stack type mismatch: expected int, found {}", v.value_type()),
        }
    }

    /// Pop a float; panics if the top slot holds anything else.
    pub fn pop_float(&mut self) -> f64 {
        match self.pop_value() {
            Value::Float(v) => v,
            v => panic!("stack type mismatch: expected float, found {}", v.value_type()),
        }
    }

    /// Pop a string; panics if the top slot holds anything else.
    pub fn pop_string(&mut self) -> String {
        match self.pop_value() {
            Value::String(v) => v,
            v => panic!("stack type mismatch: expected string, found {}", v.value_type()),
        }
    }

    /// Pop a guid; panics if the top slot holds anything else.
    pub fn pop_guid(&mut self) -> Uuid {
        match self.pop_value() {
            Value::Guid(v) => v,
            v => panic!("stack type mismatch: expected guid, found {}", v.value_type()),
        }
    }

    /// Pop an object reference; panics if the top slot holds anything else.
    pub fn pop_object(&mut self) -> Option<HostObject> {
        match self.pop_value() {
            Value::ObjectRef(v) => v,
            v => panic!("stack type mismatch: expected object, found {}", v.value_type()),
        }
    }
}

impl std::fmt::Debug for ValueStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|s| s.cell.get()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn push_pop_round_trip() {
        let mut stack = ValueStack::new();
        stack.push_int(13);
        stack.push_bool(true);
        stack.push_string("hi");
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.pop_string(), "hi");
        assert_eq!(stack.pop_bool(), true);
        assert_eq!(stack.pop_int(), 13);
        assert!(stack.is_empty());
    }

    #[test]
    #[should_panic(expected = "stack type mismatch")]
    fn typed_pop_rejects_wrong_tag() {
        let mut stack = ValueStack::new();
        stack.push_int(1);
        stack.pop_bool();
    }

    #[test]
    #[should_panic(expected = "empty value stack")]
    fn pop_on_empty_stack_is_fatal() {
        let mut stack = ValueStack::new();
        stack.pop_value();
    }

    #[test]
    fn place_aliases_without_taking_ownership() {
        let cell = ValueCell::new(Value::Int(5));
        let mut stack = ValueStack::new();
        stack.place(ValueType::Int, &cell);
        assert!(!stack.slot_is_owned(0));
        assert!(stack.peek(0).same_cell(&cell));

        // Writing through the cell is visible on the stack, and popping the
        // slot leaves the cell alive.
        cell.set(Value::Int(8));
        assert_eq!(stack.pop_int(), 8);
        assert_eq!(cell.get_int(), 8);
    }

    #[test]
    #[should_panic(expected = "cannot place")]
    fn place_checks_the_declared_type() {
        let cell = ValueCell::new(Value::Int(5));
        let mut stack = ValueStack::new();
        stack.place(ValueType::Bool, &cell);
    }

    #[test]
    fn peek_is_absolute_and_stable_across_pushes() {
        let mut stack = ValueStack::new();
        stack.push_int(1);
        stack.push_int(2);
        let bottom = stack.peek(0);
        stack.push_int(3);
        assert_eq!(bottom.get_int(), 1);
        assert_eq!(stack.peek(0).get_int(), 1);
        assert_eq!(stack.peek(2).get_int(), 3);
    }

    #[test]
    fn remove_at_offset() {
        let mut stack = ValueStack::new();
        stack.push_int(0);
        stack.push_int(1);
        stack.push_int(2);
        stack.remove(1); // drops the middle slot
        assert_eq!(stack.pop_int(), 2);
        assert_eq!(stack.pop_int(), 0);
    }

    #[test]
    fn push_copy_duplicates_values_not_cells() {
        let mut source = ValueStack::new();
        source.push_string("shared");
        let mut copy = ValueStack::new();
        copy.push_copy(&source, 0);
        assert!(!copy.peek(0).same_cell(&source.peek(0)));
        source.pop_string();
        assert_eq!(copy.pop_string(), "shared");
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<f64>().prop_filter("NaN breaks equality", |f| !f.is_nan()).prop_map(Value::Float),
            "[a-z]{0,8}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn pushes_pop_in_reverse_order(values in prop::collection::vec(arb_value(), 0..32)) {
            let mut stack = ValueStack::new();
            for v in &values {
                stack.push(v.clone());
            }
            prop_assert_eq!(stack.len(), values.len());
            for v in values.iter().rev() {
                prop_assert_eq!(&stack.pop_value(), v);
            }
            prop_assert!(stack.is_empty());
        }

        #[test]
        fn placed_cells_survive_being_popped(values in prop::collection::vec(arb_value(), 1..16)) {
            let cells: Vec<ValueCell> = values.iter().cloned().map(ValueCell::new).collect();
            let mut stack = ValueStack::new();
            for (v, cell) in values.iter().zip(&cells) {
                stack.place(v.value_type(), cell);
            }
            while !stack.is_empty() {
                stack.pop_value();
            }
            for (v, cell) in values.iter().zip(&cells) {
                prop_assert_eq!(&cell.get(), v);
            }
        }
    }
}

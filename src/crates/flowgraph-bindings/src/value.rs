//! Typed runtime values and the shared cells that back them.
//!
//! Everything that flows between nodes is a [`Value`]: a small tagged union
//! over the representable slot types. Values never live on the stack
//! directly — they live inside [`ValueCell`]s, shared mutable cells that can
//! be aliased by multiple stack slots, node properties, and graph variables
//! at once. Aliasing is the point: a "place" operation puts the *same* cell
//! on the stack again without copying or transferring ownership, which is how
//! literals and variables are read without being consumed.
//!
//! Host instances are carried as [`HostObject`] handles. The runtime never
//! looks inside one; it only passes them to binding invoke functions and
//! compares them by identity.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag for a value slot.
///
/// Every stack slot, literal, property and graph variable carries exactly one
/// of these tags. Pushes and pops must agree on the tag; a mismatch is a
/// fatal contract violation, not a recoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    /// Reference to an opaque host instance. Compared by identity, never
    /// serialized.
    ObjectRef,
    Guid,
}

impl ValueType {
    /// The default value carried by a freshly created cell of this type.
    pub fn default_value(self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::ObjectRef => Value::ObjectRef(None),
            ValueType::Guid => Value::Guid(Uuid::nil()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::ObjectRef => "object",
            ValueType::Guid => "guid",
        };
        f.write_str(name)
    }
}

/// Shared handle to an opaque host instance.
///
/// Binding invoke functions receive one of these as their target; event
/// listener records key on one as their source. Two handles are considered
/// the same object when they share an allocation — there is no structural
/// comparison.
///
/// # Examples
///
/// ```rust
/// use flowgraph_bindings::HostObject;
///
/// struct Counter { hits: u32 }
///
/// let a = HostObject::new(Counter { hits: 0 });
/// let b = a.clone();
/// assert!(a.same(&b));
/// assert_eq!(a.downcast::<Counter>().unwrap().hits, 0);
/// ```
#[derive(Clone)]
pub struct HostObject(Rc<dyn Any>);

impl HostObject {
    /// Wrap a host value in a new shared handle.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Wrap an existing shared host value.
    pub fn from_rc<T: Any>(value: Rc<T>) -> Self {
        Self(value)
    }

    /// Borrow the underlying host value, if it has the expected type.
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Identity comparison: do both handles point at the same allocation?
    pub fn same(&self, other: &HostObject) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const u8,
            Rc::as_ptr(&other.0) as *const u8,
        )
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({:p})", Rc::as_ptr(&self.0))
    }
}

/// A runtime value: the closed set of slot types nodes exchange.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    ObjectRef(Option<HostObject>),
    Guid(Uuid),
}

impl Value {
    /// The type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::ObjectRef(_) => ValueType::ObjectRef,
            Value::Guid(_) => ValueType::Guid,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::ObjectRef(None), Value::ObjectRef(None)) => true,
            (Value::ObjectRef(Some(a)), Value::ObjectRef(Some(b))) => a.same(b),
            (Value::Guid(a), Value::Guid(b)) => a == b,
            _ => false,
        }
    }
}

/// Shared mutable cell holding a single [`Value`].
///
/// Cells are the unit of aliasing: placing a cell on the stack, reading a
/// graph variable, and editing a literal in an authoring tool all touch the
/// same storage. A cell's type is fixed at creation; writing a value of a
/// different type is a contract violation.
///
/// # Examples
///
/// ```rust
/// use flowgraph_bindings::{Value, ValueCell};
///
/// let cell = ValueCell::new(Value::Int(7));
/// let alias = cell.clone();
/// alias.set(Value::Int(9));
/// assert_eq!(cell.get(), Value::Int(9));
/// ```
#[derive(Clone)]
pub struct ValueCell(Rc<RefCell<Value>>);

impl ValueCell {
    /// Create a cell holding `value`.
    pub fn new(value: Value) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Create a cell holding the default value of `ty`.
    pub fn of_type(ty: ValueType) -> Self {
        Self::new(ty.default_value())
    }

    /// Read the current value (cloned out of the cell).
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Overwrite the value. The new value must carry the cell's type.
    pub fn set(&self, value: Value) {
        let mut slot = self.0.borrow_mut();
        assert_eq!(
            slot.value_type(),
            value.value_type(),
            "cannot store a {} value in a {} cell",
            value.value_type(),
            slot.value_type()
        );
        *slot = value;
    }

    /// The type tag of the stored value.
    pub fn value_type(&self) -> ValueType {
        self.0.borrow().value_type()
    }

    /// Identity comparison: do both handles refer to the same cell?
    pub fn same_cell(&self, other: &ValueCell) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Read as bool; panics on a type mismatch.
    pub fn get_bool(&self) -> bool {
        match self.get() {
            Value::Bool(v) => v,
            v => panic!("cell type mismatch: expected bool, found {}", v.value_type()),
        }
    }

    /// Read as int; panics on a type mismatch.
    pub fn get_int(&self) -> i64 {
        match self.get() {
            Value::Int(v) => v,
            v => panic!("cell type mismatch: expected int, found {}", v.value_type()),
        }
    }

    /// Read as float; panics on a type mismatch.
    pub fn get_float(&self) -> f64 {
        match self.get() {
            Value::Float(v) => v,
            v => panic!("cell type mismatch: expected float, found {}", v.value_type()),
        }
    }

    /// Read as string; panics on a type mismatch.
    pub fn get_string(&self) -> String {
        match self.get() {
            Value::String(v) => v,
            v => panic!("cell type mismatch: expected string, found {}", v.value_type()),
        }
    }

    /// Read as guid; panics on a type mismatch.
    pub fn get_guid(&self) -> Uuid {
        match self.get() {
            Value::Guid(v) => v,
            v => panic!("cell type mismatch: expected guid, found {}", v.value_type()),
        }
    }

    /// Read as object reference; panics on a type mismatch.
    pub fn get_object(&self) -> Option<HostObject> {
        match self.get() {
            Value::ObjectRef(v) => v,
            v => panic!("cell type mismatch: expected object, found {}", v.value_type()),
        }
    }
}

impl fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueCell({:?})", self.0.borrow())
    }
}

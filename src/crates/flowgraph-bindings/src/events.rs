//! Host event bindings and the dispatcher hosts wire them to.
//!
//! An [`EventBinding`] is the consumed adapter surface for one host event:
//! an id, an ordered parameter list, and an add/remove-listener pair that
//! accepts a single [`EventDelegate`]. Removal matches by delegate identity,
//! so whoever adds a delegate must keep the same `Rc` around to remove it.
//!
//! [`HostEvent`] is the minimal host-side realization: a list of delegates
//! raised in registration order. Real hosts with their own event plumbing
//! only need to satisfy the add/remove contract; they do not need this type.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::signature::{ParamSpec, Scope};
use crate::value::{HostObject, Value};

/// Callback a host event invokes with its argument values.
pub type EventDelegate = Rc<dyn Fn(&[Value])>;

/// Identity comparison for delegates.
pub fn same_delegate(a: &EventDelegate, b: &EventDelegate) -> bool {
    std::ptr::eq(
        Rc::as_ptr(a) as *const u8,
        Rc::as_ptr(b) as *const u8,
    )
}

/// The consumed description of one host event.
#[derive(Clone)]
pub struct EventBinding {
    /// Stable lookup name (the host event's name).
    pub name: String,
    /// Human-readable description shown to authors.
    pub description: String,
    /// Host-wide id of the event; listener records key on `(source, id)`.
    pub event_id: u64,
    /// Parameters the event supplies, in declared order.
    pub params: Vec<ParamSpec>,
    pub scope: Scope,
    /// Attach `delegate` to the event on `source`.
    pub add_listener: Rc<dyn Fn(&HostObject, &EventDelegate)>,
    /// Detach `delegate` (matched by identity) from the event on `source`.
    pub remove_listener: Rc<dyn Fn(&HostObject, &EventDelegate)>,
}

impl EventBinding {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        event_id: u64,
        params: Vec<ParamSpec>,
        scope: Scope,
        add_listener: impl Fn(&HostObject, &EventDelegate) + 'static,
        remove_listener: impl Fn(&HostObject, &EventDelegate) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            event_id,
            params,
            scope,
            add_listener: Rc::new(add_listener),
            remove_listener: Rc::new(remove_listener),
        }
    }
}

impl fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinding")
            .field("name", &self.name)
            .field("event_id", &self.event_id)
            .field("params", &self.params)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A host-side event source: an ordered list of delegates.
///
/// # Examples
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use flowgraph_bindings::{EventDelegate, HostEvent, Value};
///
/// let event = HostEvent::new();
/// let hits = Rc::new(Cell::new(0));
/// let counter = hits.clone();
/// let delegate: EventDelegate = Rc::new(move |_args| counter.set(counter.get() + 1));
///
/// event.add(&delegate);
/// event.raise(&[Value::Int(1)]);
/// event.remove(&delegate);
/// event.raise(&[Value::Int(2)]);
/// assert_eq!(hits.get(), 1);
/// ```
#[derive(Default)]
pub struct HostEvent {
    delegates: RefCell<Vec<EventDelegate>>,
}

impl HostEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a delegate. Duplicates are allowed; dedup is the caller's job.
    pub fn add(&self, delegate: &EventDelegate) {
        self.delegates.borrow_mut().push(delegate.clone());
    }

    /// Detach every attachment of `delegate` (matched by identity).
    pub fn remove(&self, delegate: &EventDelegate) {
        self.delegates
            .borrow_mut()
            .retain(|d| !same_delegate(d, delegate));
    }

    /// Invoke every attached delegate, in attachment order.
    ///
    /// The list is snapshotted first: a delegate may add or remove listeners
    /// while the event is being raised without disturbing this dispatch.
    pub fn raise(&self, args: &[Value]) {
        let snapshot: Vec<EventDelegate> = self.delegates.borrow().clone();
        for delegate in snapshot {
            delegate(args);
        }
    }

    pub fn delegate_count(&self) -> usize {
        self.delegates.borrow().len()
    }
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostEvent({} delegates)", self.delegate_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn raise_invokes_in_attachment_order() {
        let event = HostEvent::new();
        let seen = Rc::new(StdRefCell::new(Vec::new()));

        let mk = |tag: &'static str| -> EventDelegate {
            let seen = seen.clone();
            Rc::new(move |_args: &[Value]| seen.borrow_mut().push(tag))
        };

        let first = mk("first");
        let second = mk("second");
        event.add(&first);
        event.add(&second);
        event.raise(&[]);
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn remove_matches_identity_not_shape() {
        let event = HostEvent::new();
        let a: EventDelegate = Rc::new(|_args: &[Value]| {});
        let b: EventDelegate = Rc::new(|_args: &[Value]| {});
        event.add(&a);
        event.add(&b);
        event.remove(&a);
        assert_eq!(event.delegate_count(), 1);
        event.remove(&b);
        assert_eq!(event.delegate_count(), 0);
    }

    #[test]
    fn delegates_receive_the_raised_arguments() {
        let event = HostEvent::new();
        let seen = Rc::new(StdRefCell::new(Vec::new()));
        let sink = seen.clone();
        let delegate: EventDelegate = Rc::new(move |args: &[Value]| {
            sink.borrow_mut().extend_from_slice(args);
        });
        event.add(&delegate);
        event.raise(&[Value::Int(13), Value::Bool(true)]);
        assert_eq!(*seen.borrow(), vec![Value::Int(13), Value::Bool(true)]);
    }
}

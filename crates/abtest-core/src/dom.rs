//! Host document abstraction.
//!
//! The reconciler talks to the page through [`Host`], a node-id based view of
//! a DOM-like tree. [`MemoryDocument`](crate::MemoryDocument) is the in-process
//! implementation used by tests and headless tooling.

use std::fmt;
use std::rc::Rc;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    Missing { id: NodeId },
    NotAnElement { id: NodeId },
    NotAChild { parent: NodeId, child: NodeId },
    Detached { id: NodeId },
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomError::Missing { id } => write!(f, "node {id} missing"),
            DomError::NotAnElement { id } => write!(f, "node {id} is not an element"),
            DomError::NotAChild { parent, child } => {
                write!(f, "node {child} is not a child of node {parent}")
            }
            DomError::Detached { id } => write!(f, "node {id} has no parent"),
        }
    }
}

impl std::error::Error for DomError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Fragment,
}

/// A dispatched event as seen by listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: String,
    pub target: NodeId,
    pub current_target: NodeId,
}

/// Shared event callback. Two handlers are equal only if they are the same
/// allocation.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Operations the reconciler needs from a live document.
///
/// Nodes are addressed by id. Moving semantics follow the DOM: inserting a
/// node that already has a parent detaches it first, and inserting a fragment
/// container moves its children instead of the container itself.
pub trait Host {
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn create_text(&mut self, text: &str) -> NodeId;
    /// Creates an empty, parentless container whose children are spliced
    /// into the target on insertion.
    fn create_fragment(&mut self) -> NodeId;

    fn kind(&self, id: NodeId) -> Result<NodeKind, DomError>;
    fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), DomError>;

    fn attribute(&self, id: NodeId, name: &str) -> Result<Option<String>, DomError>;
    fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError>;
    fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError>;

    /// Whether `name` is a native boolean property of the node.
    fn has_property(&self, id: NodeId, name: &str) -> bool;
    fn set_property(&mut self, id: NodeId, name: &str, value: bool) -> Result<(), DomError>;

    fn add_event_listener(
        &mut self,
        id: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), DomError>;
    fn remove_event_listener(
        &mut self,
        id: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), DomError>;

    /// Replaces all children of `id` with raw markup.
    fn set_inner_html(&mut self, id: NodeId, html: &str) -> Result<(), DomError>;

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError>;

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Detaches `id` from its parent. Detaching a parentless node is a no-op.
    fn remove(&mut self, id: NodeId) -> Result<(), DomError>;

    fn parent(&self, id: NodeId) -> Option<NodeId>;
    fn first_child(&self, id: NodeId) -> Option<NodeId>;
    fn last_child(&self, id: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, id: NodeId) -> Option<NodeId>;
    fn children(&self, id: NodeId) -> Vec<NodeId>;

    /// Descendants of `root` (excluding `root`) whose attribute `name` equals
    /// `value`, in document order.
    fn query_attribute(&self, root: NodeId, name: &str, value: &str) -> Vec<NodeId>;
}

//! In-memory document used for headless rendering and tests.

use indexmap::IndexMap;

use crate::dom::{DomError, Event, EventHandler, Host, NodeId, NodeKind};

/// Properties that exist natively on elements and take boolean values.
const BOOLEAN_PROPERTIES: &[&str] = &[
    "autofocus", "checked", "disabled", "hidden", "multiple", "open", "readOnly", "required",
    "selected",
];

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];

/// A recorded change to the document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Create { id: NodeId, kind: NodeKind },
    Insert { parent: NodeId, child: NodeId },
    Remove { id: NodeId },
    SetText { id: NodeId },
    SetAttribute { id: NodeId, name: String },
    RemoveAttribute { id: NodeId, name: String },
    SetProperty { id: NodeId, name: String },
    AddListener { id: NodeId, event: String },
    RemoveListener { id: NodeId, event: String },
    SetInnerHtml { id: NodeId },
}

enum NodeData {
    Element(ElementData),
    Text(String),
    Fragment,
}

struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, bool>,
    listeners: Vec<(String, EventHandler)>,
    inner_html: Option<String>,
}

struct DomNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory document implementing [`Host`].
///
/// Every write is recorded in a mutation log so tests can assert exactly
/// which changes a render pass performed.
pub struct MemoryDocument {
    nodes: Vec<DomNode>,
    body: NodeId,
    mutations: Vec<Mutation>,
    observer: Option<Box<dyn FnMut(&Mutation)>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        let mut document = Self {
            nodes: Vec::new(),
            body: 0,
            mutations: Vec::new(),
            observer: None,
        };
        document.body = document.alloc(NodeData::Element(ElementData::new("body")));
        document
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    /// Registers a callback invoked for every mutation as it happens,
    /// replacing any previous observer.
    pub fn observe(&mut self, observer: impl FnMut(&Mutation) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    fn record(&mut self, mutation: Mutation) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&mutation);
        }
        self.mutations.push(mutation);
    }

    pub fn clear_mutations(&mut self) {
        self.mutations.clear();
    }

    /// Number of elements created since the log was last cleared.
    pub fn created_elements(&self) -> usize {
        self.mutations
            .iter()
            .filter(|m| {
                matches!(
                    m,
                    Mutation::Create {
                        kind: NodeKind::Element,
                        ..
                    }
                )
            })
            .count()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.data {
            NodeData::Element(element) => Some(element.tag.as_str()),
            _ => None,
        }
    }

    pub fn property(&self, id: NodeId, name: &str) -> Option<bool> {
        match &self.nodes.get(id)?.data {
            NodeData::Element(element) => element.properties.get(name).copied(),
            _ => None,
        }
    }

    pub fn listener_count(&self, id: NodeId) -> usize {
        match self.nodes.get(id).map(|node| &node.data) {
            Some(NodeData::Element(element)) => element.listeners.len(),
            _ => 0,
        }
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(ElementData {
                inner_html: Some(html),
                ..
            }) => out.push_str(html),
            _ => {
                for &child in &node.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Elements under `root` (inclusive) with the given tag, in document order.
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(root, &mut |id, node| {
            if let NodeData::Element(element) = &node.data {
                if element.tag == tag {
                    found.push(id);
                }
            }
        });
        found
    }

    fn walk(&self, id: NodeId, visit: &mut impl FnMut(NodeId, &DomNode)) {
        if let Some(node) = self.nodes.get(id) {
            visit(id, node);
            for &child in &node.children {
                self.walk(child, visit);
            }
        }
    }

    /// Serializes `id` and its subtree to HTML-like markup.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => out.push_str(&escape(text)),
            NodeData::Fragment => {
                for &child in &node.children {
                    self.write_html(child, out);
                }
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for (name, value) in &element.attributes {
                    out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
                }
                for (name, value) in &element.properties {
                    if *value {
                        out.push(' ');
                        out.push_str(&name.to_ascii_lowercase());
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    return;
                }
                if let Some(html) = &element.inner_html {
                    out.push_str(html);
                } else {
                    for &child in &node.children {
                        self.write_html(child, out);
                    }
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }

    /// Dispatches an event at `target`, bubbling through its ancestors.
    /// Returns the number of listeners invoked.
    pub fn dispatch_event(&self, target: NodeId, kind: &str) -> usize {
        let mut invoked = 0;
        let mut current = Some(target);
        while let Some(id) = current {
            let handlers: Vec<EventHandler> = match self.nodes.get(id).map(|node| &node.data) {
                Some(NodeData::Element(element)) => element
                    .listeners
                    .iter()
                    .filter(|(event, _)| event == kind)
                    .map(|(_, handler)| handler.clone())
                    .collect(),
                _ => Vec::new(),
            };
            let event = Event {
                kind: kind.to_string(),
                target,
                current_target: id,
            };
            for handler in handlers {
                handler.call(&event);
                invoked += 1;
            }
            current = self.nodes.get(id).and_then(|node| node.parent);
        }
        invoked
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(DomNode {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&DomNode, DomError> {
        self.nodes.get(id).ok_or(DomError::Missing { id })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut DomNode, DomError> {
        self.nodes.get_mut(id).ok_or(DomError::Missing { id })
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement { id }),
        }
    }

    fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        match &self.node(id)?.data {
            NodeData::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement { id }),
        }
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes.get_mut(id).and_then(|node| node.parent.take()) {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|&child| child != id);
            }
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.nodes.get(id).and_then(|node| node.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    fn insert_one(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.detach(child);
        let parent_node = self.node_mut(parent)?;
        let index = match reference {
            Some(reference) => parent_node
                .children
                .iter()
                .position(|&c| c == reference)
                .ok_or(DomError::NotAChild {
                    parent,
                    child: reference,
                })?,
            None => parent_node.children.len(),
        };
        parent_node.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.record(Mutation::Insert { parent, child });
        Ok(())
    }
}

impl Host for MemoryDocument {
    fn create_element(&mut self, tag: &str) -> NodeId {
        let id = self.alloc(NodeData::Element(ElementData::new(tag)));
        self.record(Mutation::Create {
            id,
            kind: NodeKind::Element,
        });
        id
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let id = self.alloc(NodeData::Text(text.to_string()));
        self.record(Mutation::Create {
            id,
            kind: NodeKind::Text,
        });
        id
    }

    fn create_fragment(&mut self) -> NodeId {
        let id = self.alloc(NodeData::Fragment);
        self.record(Mutation::Create {
            id,
            kind: NodeKind::Fragment,
        });
        id
    }

    fn kind(&self, id: NodeId) -> Result<NodeKind, DomError> {
        Ok(match self.node(id)?.data {
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Fragment => NodeKind::Fragment,
        })
    }

    fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(current) => {
                *current = text.to_string();
            }
            _ => return Err(DomError::NotAnElement { id }),
        }
        self.record(Mutation::SetText { id });
        Ok(())
    }

    fn attribute(&self, id: NodeId, name: &str) -> Result<Option<String>, DomError> {
        Ok(self.element(id)?.attributes.get(name).cloned())
    }

    fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.element_mut(id)?
            .attributes
            .insert(name.to_string(), value.to_string());
        self.record(Mutation::SetAttribute {
            id,
            name: name.to_string(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        if self.element_mut(id)?.attributes.shift_remove(name).is_some() {
            self.record(Mutation::RemoveAttribute {
                id,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn has_property(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_ok() && BOOLEAN_PROPERTIES.contains(&name)
    }

    fn set_property(&mut self, id: NodeId, name: &str, value: bool) -> Result<(), DomError> {
        self.element_mut(id)?
            .properties
            .insert(name.to_string(), value);
        self.record(Mutation::SetProperty {
            id,
            name: name.to_string(),
        });
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        id: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), DomError> {
        let element = self.element_mut(id)?;
        if element
            .listeners
            .iter()
            .any(|(name, existing)| name == event && existing.ptr_eq(&handler))
        {
            return Ok(());
        }
        element.listeners.push((event.to_string(), handler));
        self.record(Mutation::AddListener {
            id,
            event: event.to_string(),
        });
        Ok(())
    }

    fn remove_event_listener(
        &mut self,
        id: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), DomError> {
        let element = self.element_mut(id)?;
        let before = element.listeners.len();
        element
            .listeners
            .retain(|(name, existing)| !(name == event && existing.ptr_eq(handler)));
        if element.listeners.len() != before {
            self.record(Mutation::RemoveListener {
                id,
                event: event.to_string(),
            });
        }
        Ok(())
    }

    fn set_inner_html(&mut self, id: NodeId, html: &str) -> Result<(), DomError> {
        self.element_mut(id)?.inner_html = (!html.is_empty()).then(|| html.to_string());
        let children = std::mem::take(&mut self.node_mut(id)?.children);
        for child in children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = None;
            }
        }
        self.record(Mutation::SetInnerHtml { id });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.node(child)?;
        self.node(parent)?;
        if self.is_ancestor(child, parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        if matches!(self.node(child)?.data, NodeData::Fragment) {
            let moved = std::mem::take(&mut self.node_mut(child)?.children);
            for grandchild in moved {
                if let Some(node) = self.nodes.get_mut(grandchild) {
                    node.parent = None;
                }
                self.insert_one(parent, grandchild, reference)?;
            }
            return Ok(());
        }
        self.insert_one(parent, child, reference)
    }

    fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        if self.node(id)?.parent.is_some() {
            self.detach(id);
            self.record(Mutation::Remove { id });
        }
        Ok(())
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.children.first().copied()
    }

    fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.children.last().copied()
    }

    fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(id)?.parent?;
        let siblings = &self.nodes.get(parent)?.children;
        let index = siblings.iter().position(|&c| c == id)?;
        siblings.get(index + 1).copied()
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn query_attribute(&self, root: NodeId, name: &str, value: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(root, &mut |id, node| {
            if id == root {
                return;
            }
            if let NodeData::Element(element) = &node.data {
                if element.attributes.get(name).map(String::as_str) == Some(value) {
                    found.push(id);
                }
            }
        });
        found
    }
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            listeners: Vec::new(),
            inner_html: None,
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_moves_existing_child() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(body, a).unwrap();
        doc.append_child(body, b).unwrap();
        doc.insert_before(body, b, Some(a)).unwrap();
        assert_eq!(doc.children(body), vec![b, a]);
        assert_eq!(doc.next_sibling(b), Some(a));
        assert_eq!(doc.next_sibling(a), None);
    }

    #[test]
    fn fragment_insertion_splices_children() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        let tail = doc.create_element("footer");
        doc.append_child(body, tail).unwrap();
        let frag = doc.create_fragment();
        let one = doc.create_element("div");
        let two = doc.create_element("div");
        doc.append_child(frag, one).unwrap();
        doc.append_child(frag, two).unwrap();
        doc.insert_before(body, frag, Some(tail)).unwrap();
        assert_eq!(doc.children(body), vec![one, two, tail]);
        assert!(doc.children(frag).is_empty());
        assert_eq!(doc.parent(frag), None);
    }

    #[test]
    fn text_nodes_reject_attributes() {
        let mut doc = MemoryDocument::new();
        let text = doc.create_text("hi");
        assert_eq!(
            doc.set_attribute(text, "class", "x"),
            Err(DomError::NotAnElement { id: text })
        );
    }

    #[test]
    fn dispatch_bubbles_to_ancestors() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut doc = MemoryDocument::new();
        let body = doc.body();
        let outer = doc.create_element("div");
        let inner = doc.create_element("button");
        doc.append_child(body, outer).unwrap();
        doc.append_child(outer, inner).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        doc.add_event_listener(
            outer,
            "click",
            EventHandler::new(move |event| log.borrow_mut().push(event.current_target)),
        )
        .unwrap();
        assert_eq!(doc.dispatch_event(inner, "click"), 1);
        assert_eq!(*seen.borrow(), vec![outer]);
    }

    #[test]
    fn serializes_markup() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        let div = doc.create_element("div");
        doc.set_attribute(div, "class", "a&b").unwrap();
        let text = doc.create_text("<hi>");
        doc.append_child(div, text).unwrap();
        doc.append_child(body, div).unwrap();
        assert_eq!(
            doc.to_html(body),
            "<body><div class=\"a&amp;b\">&lt;hi&gt;</div></body>"
        );
    }

    #[test]
    fn query_attribute_skips_root_and_keeps_order() {
        let mut doc = MemoryDocument::new();
        let body = doc.body();
        doc.set_attribute(body, "data-o", "x").unwrap();
        let a = doc.create_element("div");
        let b = doc.create_element("div");
        doc.set_attribute(a, "data-o", "x").unwrap();
        doc.set_attribute(b, "data-o", "y").unwrap();
        doc.append_child(body, a).unwrap();
        doc.append_child(body, b).unwrap();
        assert_eq!(doc.query_attribute(body, "data-o", "x"), vec![a]);
    }
}

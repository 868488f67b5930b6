//! Tree diffing.
//!
//! The reconciler consumes a freshly built child description together with
//! the subtree mounted for the same slot on the previous pass, and returns the
//! new [`Mounted`] subtree. Matched previous subtrees are moved into the new
//! one; anything left unmatched is queued in [`Work`] so the commit engine can
//! run its cleanup before detaching it. Element attributes are diffed here,
//! while positions, removals, refs and effects are left to the commit.

use std::fmt::Write as _;
use std::rc::Rc;

use log::{trace, warn};

use crate::attributes::{apply_attributes, Listeners};
use crate::collections::{HashSet, KeyIndex};
use crate::dom::{DomError, Host, NodeId};
use crate::hooks::{Instance, PendingEffect};
use crate::runtime::RuntimeHandle;
use crate::vnode::{Child, Key, NodeType, PropMap, PropValue, Props, RefProp, VNode, INNER_HTML};

#[derive(Clone)]
pub(crate) struct ElementNode {
    pub(crate) key: Key,
    pub(crate) tag: Rc<str>,
    pub(crate) dom: NodeId,
    pub(crate) attrs: PropMap,
    pub(crate) listeners: Listeners,
    pub(crate) children: Vec<Mounted>,
    /// Raw markup owning the element's content; children are empty while set.
    pub(crate) raw_html: Option<String>,
}

/// A committed subtree and the bookkeeping needed to diff against it.
#[derive(Clone)]
pub(crate) enum Mounted {
    Element(ElementNode),
    Text {
        key: Key,
        dom: NodeId,
        text: String,
    },
    Fragment {
        key: Key,
        children: Vec<Mounted>,
    },
    Component {
        key: Key,
        instance: Rc<Instance>,
        output: Option<Box<Mounted>>,
    },
    /// A document node supplied by the caller rather than created here.
    Host {
        key: Key,
        dom: NodeId,
    },
}

impl Mounted {
    pub(crate) fn key(&self) -> &Key {
        match self {
            Mounted::Element(element) => &element.key,
            Mounted::Text { key, .. }
            | Mounted::Fragment { key, .. }
            | Mounted::Component { key, .. }
            | Mounted::Host { key, .. } => key,
        }
    }

    /// Top-level document nodes of this subtree, in order.
    pub(crate) fn collect_nodes(&self, out: &mut Vec<NodeId>) {
        match self {
            Mounted::Element(element) => out.push(element.dom),
            Mounted::Text { dom, .. } | Mounted::Host { dom, .. } => out.push(*dom),
            Mounted::Fragment { children, .. } => {
                for child in children {
                    child.collect_nodes(out);
                }
            }
            Mounted::Component { output, .. } => {
                if let Some(output) = output {
                    output.collect_nodes(out);
                }
            }
        }
    }

    pub(crate) fn nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_nodes(&mut out);
        out
    }

    pub(crate) fn first_node(&self) -> Option<NodeId> {
        match self {
            Mounted::Element(element) => Some(element.dom),
            Mounted::Text { dom, .. } | Mounted::Host { dom, .. } => Some(*dom),
            Mounted::Fragment { children, .. } => children.iter().find_map(Mounted::first_node),
            Mounted::Component { output, .. } => output.as_deref().and_then(Mounted::first_node),
        }
    }

    pub(crate) fn last_node(&self) -> Option<NodeId> {
        match self {
            Mounted::Element(element) => Some(element.dom),
            Mounted::Text { dom, .. } | Mounted::Host { dom, .. } => Some(*dom),
            Mounted::Fragment { children, .. } => {
                children.iter().rev().find_map(Mounted::last_node)
            }
            Mounted::Component { output, .. } => output.as_deref().and_then(Mounted::last_node),
        }
    }

    /// Indented outline of the subtree, for trace output.
    pub(crate) fn dump(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let _ = match self {
            Mounted::Element(element) => writeln!(
                out,
                "{indent}<{}> {} #{}",
                element.tag, element.key, element.dom
            ),
            Mounted::Text { key, dom, text } => writeln!(out, "{indent}{text:?} {key} #{dom}"),
            Mounted::Fragment { key, .. } => writeln!(out, "{indent}fragment {key}"),
            Mounted::Component { key, instance, .. } => {
                writeln!(out, "{indent}{} {key} instance {}", instance.name(), instance.id())
            }
            Mounted::Host { key, dom } => writeln!(out, "{indent}host {key} #{dom}"),
        };
        match self {
            Mounted::Element(element) => {
                for child in &element.children {
                    child.dump(depth + 1, out);
                }
            }
            Mounted::Fragment { children, .. } => {
                for child in children {
                    child.dump(depth + 1, out);
                }
            }
            Mounted::Component {
                output: Some(output),
                ..
            } => output.dump(depth + 1, out),
            _ => {}
        }
    }
}

/// Side effects gathered during a reconcile pass, applied by the commit.
#[derive(Default)]
pub(crate) struct Work {
    pub(crate) removals: Vec<Mounted>,
    pub(crate) markup: Vec<(NodeId, String)>,
    pub(crate) refs: Vec<(RefProp, Option<NodeId>)>,
    pub(crate) effects: Vec<PendingEffect>,
}

pub(crate) struct Reconciler<'a> {
    host: &'a mut dyn Host,
    runtime: &'a RuntimeHandle,
    work: Work,
}

impl<'a> Reconciler<'a> {
    pub(crate) fn new(host: &'a mut dyn Host, runtime: &'a RuntimeHandle) -> Self {
        Self {
            host,
            runtime,
            work: Work::default(),
        }
    }

    pub(crate) fn finish(self) -> Work {
        self.work
    }

    fn discard(&mut self, old: Option<Mounted>) {
        if let Some(old) = old {
            trace!("unmatched {}", old.key());
            self.work.removals.push(old);
        }
    }

    /// Diffs `child` against `old`, which was mounted in the same slot.
    ///
    /// Returns `None` when the child renders nothing.
    pub(crate) fn reconcile(
        &mut self,
        child: Child,
        key: Key,
        old: Option<Mounted>,
    ) -> Result<Option<Mounted>, DomError> {
        let old = match old {
            Some(previous) if previous.key() != &key => {
                self.discard(Some(previous));
                None
            }
            other => other,
        };
        match child {
            Child::Empty => {
                self.discard(old);
                Ok(None)
            }
            Child::Text(text) => self.reconcile_text(key, text, old).map(Some),
            Child::List(items) => {
                let previous = self.take_fragment(old);
                let children = self.reconcile_children(items, previous)?;
                Ok(Some(Mounted::Fragment { key, children }))
            }
            Child::Node(node) => self.reconcile_node(node, key, old),
        }
    }

    fn take_fragment(&mut self, old: Option<Mounted>) -> Vec<Mounted> {
        match old {
            Some(Mounted::Fragment { children, .. }) => children,
            other => {
                self.discard(other);
                Vec::new()
            }
        }
    }

    fn reconcile_text(
        &mut self,
        key: Key,
        text: String,
        old: Option<Mounted>,
    ) -> Result<Mounted, DomError> {
        match old {
            Some(Mounted::Text {
                dom,
                text: previous,
                ..
            }) => {
                if previous != text {
                    self.host.set_text(dom, &text)?;
                }
                Ok(Mounted::Text { key, dom, text })
            }
            other => {
                self.discard(other);
                let dom = self.host.create_text(&text);
                Ok(Mounted::Text { key, dom, text })
            }
        }
    }

    fn reconcile_node(
        &mut self,
        node: VNode,
        key: Key,
        old: Option<Mounted>,
    ) -> Result<Option<Mounted>, DomError> {
        let (ty, props) = node.into_parts();
        match ty {
            NodeType::Tag(tag) => {
                let old = match old {
                    Some(Mounted::Element(element)) if element.tag == tag => Some(element),
                    other => {
                        self.discard(other);
                        None
                    }
                };
                let element = self.reconcile_element(key, tag, props, old)?;
                Ok(Some(Mounted::Element(element)))
            }
            NodeType::Component(component) => {
                let (instance, previous) = match old {
                    Some(Mounted::Component {
                        instance, output, ..
                    }) if instance.is_instance_of(&component) => {
                        instance.set_component(component);
                        (instance, output.map(|output| *output))
                    }
                    other => {
                        self.discard(other);
                        (Instance::new(component, self.runtime.clone()), None)
                    }
                };
                let output = self.render_component(&instance, props, previous)?;
                Ok(Some(Mounted::Component {
                    key,
                    instance,
                    output: output.map(Box::new),
                }))
            }
            NodeType::Fragment => {
                let (_, children) = props.into_parts();
                let previous = self.take_fragment(old);
                let children = self.reconcile_children(children, previous)?;
                Ok(Some(Mounted::Fragment { key, children }))
            }
            NodeType::Node(dom) => {
                if self.host.kind(dom).is_err() {
                    warn!("adopted node #{dom} is not in the document; rendering nothing");
                    self.discard(old);
                    return Ok(None);
                }
                match old {
                    Some(Mounted::Host { dom: previous, .. }) if previous == dom => {}
                    other => self.discard(other),
                }
                Ok(Some(Mounted::Host { key, dom }))
            }
        }
    }

    /// Renders `instance` with `props` and diffs its output against the
    /// output of its previous render. Effects requested by the component are
    /// queued after those of its descendants.
    pub(crate) fn render_component(
        &mut self,
        instance: &Rc<Instance>,
        props: Props,
        previous: Option<Mounted>,
    ) -> Result<Option<Mounted>, DomError> {
        trace!("render {} (instance {})", instance.name(), instance.id());
        instance.set_props(props.clone());
        let (output, effects) = instance.render(&props);
        let key = output.key().cloned().unwrap_or(Key::Index(0));
        let output = self.reconcile(output, key, previous)?;
        self.work.effects.extend(effects);
        Ok(output)
    }

    fn reconcile_element(
        &mut self,
        key: Key,
        tag: Rc<str>,
        props: Props,
        old: Option<ElementNode>,
    ) -> Result<ElementNode, DomError> {
        let (attrs, children) = props.into_parts();
        let (dom, listeners, old_attrs, old_children, old_markup) = match old {
            Some(previous) => (
                previous.dom,
                previous.listeners,
                Some(previous.attrs),
                previous.children,
                previous.raw_html,
            ),
            None => {
                let dom = self.host.create_element(&tag);
                trace!("create <{tag}> {key} as #{dom}");
                (dom, Listeners::default(), None, Vec::new(), None)
            }
        };

        apply_attributes(&mut *self.host, dom, &listeners, &attrs, old_attrs.as_ref())?;

        let next_ref = match attrs.get("ref") {
            Some(PropValue::Ref(target)) => Some(target),
            _ => None,
        };
        if let Some(PropValue::Ref(previous)) = old_attrs.as_ref().and_then(|old| old.get("ref")) {
            if next_ref != Some(previous) {
                self.work.refs.push((previous.clone(), None));
            }
        }
        if let Some(target) = next_ref {
            self.work.refs.push((target.clone(), Some(dom)));
        }

        let raw_html = match attrs.get(INNER_HTML) {
            Some(PropValue::InnerHtml(html)) | Some(PropValue::Str(html)) => Some(html.clone()),
            _ => None,
        };
        let children = match &raw_html {
            Some(html) => {
                self.work.removals.extend(old_children);
                if old_markup.as_ref() != Some(html) {
                    self.work.markup.push((dom, html.clone()));
                }
                Vec::new()
            }
            None => {
                if old_markup.is_some() {
                    self.work.markup.push((dom, String::new()));
                }
                self.reconcile_children(children, old_children)?
            }
        };

        Ok(ElementNode {
            key,
            tag,
            dom,
            attrs,
            listeners,
            children,
            raw_html,
        })
    }

    /// Keyed child matching. Each new child takes the previous child with the
    /// same key, explicit or positional; whatever is left over afterwards is
    /// queued for removal in its original order.
    pub(crate) fn reconcile_children(
        &mut self,
        children: Vec<Child>,
        previous: Vec<Mounted>,
    ) -> Result<Vec<Mounted>, DomError> {
        let mut slots: Vec<Option<Mounted>> = Vec::with_capacity(previous.len());
        let mut by_key = KeyIndex::default();
        for old in previous {
            if by_key.contains_key(old.key()) {
                warn!("duplicate key {} among mounted siblings", old.key());
                self.work.removals.push(old);
                continue;
            }
            by_key.insert(old.key().clone(), slots.len());
            slots.push(Some(old));
        }

        let mut next = Vec::with_capacity(children.len());
        let mut seen: HashSet<Key> = HashSet::default();
        for (index, child) in children.into_iter().enumerate() {
            let key = child.key().cloned().unwrap_or(Key::Index(index));
            if !seen.insert(key.clone()) {
                warn!("duplicate key {key}; later sibling is mounted as new");
            }
            let old = by_key.remove(&key).and_then(|slot| slots[slot].take());
            if let Some(mounted) = self.reconcile(child, key, old)? {
                next.push(mounted);
            }
        }

        for leftover in slots.into_iter().flatten() {
            self.discard(Some(leftover));
        }
        Ok(next)
    }
}

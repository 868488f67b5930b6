//! Applying reconcile results to the host document.
//!
//! Also home to unmount teardown and the in-place refresh of dirty
//! components driven by [`Renderer::tick`](crate::Renderer::tick).

use std::rc::Rc;

use log::trace;

use crate::dom::{DomError, Host, NodeId};
use crate::reconcile::{Mounted, Reconciler, Work};
use crate::runtime::RuntimeHandle;
use crate::vnode::PropValue;

/// Applies the outcome of a reconcile pass.
///
/// Unmatched subtrees are torn down and detached first, then `tree` is put in
/// place under `parent` ahead of `before`. Refs are filled once nodes sit in
/// their final position. Effects whose dependencies changed have their
/// previous cleanup run right away and are queued to run on the next tick.
pub(crate) fn commit(
    host: &mut dyn Host,
    runtime: &RuntimeHandle,
    tree: Option<&Mounted>,
    parent: NodeId,
    before: Option<NodeId>,
    work: Work,
) -> Result<(), DomError> {
    let Work {
        removals,
        markup,
        refs,
        effects,
    } = work;

    for removed in removals {
        unmount(host, removed)?;
    }
    for (node, html) in markup {
        host.set_inner_html(node, &html)?;
    }
    if let Some(tree) = tree {
        place(host, tree, parent, before)?;
    }
    for (target, node) in refs {
        target.attach(node);
    }
    for effect in &effects {
        effect.run_previous_cleanup();
    }
    runtime.enqueue_effects(effects);
    Ok(())
}

/// Runs cleanup for the whole subtree, then detaches its top-level nodes.
pub(crate) fn unmount(host: &mut dyn Host, mounted: Mounted) -> Result<(), DomError> {
    teardown(&mounted);
    for node in mounted.nodes() {
        host.remove(node)?;
    }
    Ok(())
}

fn teardown(mounted: &Mounted) {
    match mounted {
        Mounted::Component {
            instance, output, ..
        } => {
            trace!("dispose {} (instance {})", instance.name(), instance.id());
            instance.dispose();
            if let Some(output) = output {
                teardown(output);
            }
        }
        Mounted::Element(element) => {
            if let Some(PropValue::Ref(target)) = element.attrs.get("ref") {
                target.attach(None);
            }
            for child in &element.children {
                teardown(child);
            }
        }
        Mounted::Fragment { children, .. } => {
            for child in children {
                teardown(child);
            }
        }
        Mounted::Text { .. } | Mounted::Host { .. } => {}
    }
}

/// Positions `mounted` under `parent` ahead of `before` and returns its first
/// document node. Element children are positioned before the element itself.
fn place(
    host: &mut dyn Host,
    mounted: &Mounted,
    parent: NodeId,
    before: Option<NodeId>,
) -> Result<Option<NodeId>, DomError> {
    match mounted {
        Mounted::Element(element) => {
            if element.raw_html.is_none() {
                place_list(host, &element.children, element.dom, None)?;
            }
            ensure(host, element.dom, parent, before)?;
            Ok(Some(element.dom))
        }
        Mounted::Text { dom, .. } | Mounted::Host { dom, .. } => {
            ensure(host, *dom, parent, before)?;
            Ok(Some(*dom))
        }
        Mounted::Fragment { children, .. } => place_fragment(host, children, parent, before),
        Mounted::Component { output, .. } => match output {
            Some(output) => place(host, output, parent, before),
            None => Ok(None),
        },
    }
}

/// Places siblings back to front so each one is anchored on the node that
/// follows it.
fn place_list(
    host: &mut dyn Host,
    items: &[Mounted],
    parent: NodeId,
    before: Option<NodeId>,
) -> Result<Option<NodeId>, DomError> {
    let mut next = before;
    let mut first = None;
    for item in items.iter().rev() {
        if let Some(node) = place(host, item, parent, next)? {
            next = Some(node);
            first = Some(node);
        }
    }
    Ok(first)
}

/// A fragment whose nodes are all fresh is assembled in a detached container
/// and spliced in with a single insertion.
fn place_fragment(
    host: &mut dyn Host,
    children: &[Mounted],
    parent: NodeId,
    before: Option<NodeId>,
) -> Result<Option<NodeId>, DomError> {
    let mut nodes = Vec::new();
    for child in children {
        child.collect_nodes(&mut nodes);
    }
    if nodes.len() > 1 && nodes.iter().all(|&node| host.parent(node).is_none()) {
        let container = host.create_fragment();
        let first = place_list(host, children, container, None)?;
        host.insert_before(parent, container, before)?;
        return Ok(first);
    }
    place_list(host, children, parent, before)
}

/// Inserts `node` unless it already sits under `parent` right ahead of
/// `before`.
fn ensure(
    host: &mut dyn Host,
    node: NodeId,
    parent: NodeId,
    before: Option<NodeId>,
) -> Result<(), DomError> {
    if host.parent(node) == Some(parent) && host.next_sibling(node) == before {
        return Ok(());
    }
    trace!("insert #{node} into #{parent} before {before:?}");
    host.insert_before(parent, node, before)
}

/// Re-renders every dirty component inside `mounted` in place.
///
/// Clean components are walked through so dirty descendants are found; a
/// dirty one is rendered with its stored props and committed with the anchor
/// its position implies.
pub(crate) fn refresh(
    host: &mut dyn Host,
    runtime: &RuntimeHandle,
    mounted: &mut Mounted,
    parent: NodeId,
    before: Option<NodeId>,
) -> Result<(), DomError> {
    if let Mounted::Component {
        instance, output, ..
    } = mounted
    {
        if instance.is_dirty() && instance.is_active() {
            let instance = Rc::clone(instance);
            let previous = output.as_deref().cloned();
            let mut reconciler = Reconciler::new(&mut *host, runtime);
            let next = reconciler.render_component(&instance, instance.props(), previous)?;
            let work = reconciler.finish();
            *output = next.map(Box::new);
            return commit(host, runtime, Some(&*mounted), parent, before, work);
        }
    }
    match mounted {
        Mounted::Component {
            output: Some(output),
            ..
        } => refresh(host, runtime, output, parent, before),
        Mounted::Element(element) if element.raw_html.is_none() => {
            refresh_list(host, runtime, &mut element.children, element.dom, None)
        }
        Mounted::Fragment { children, .. } => refresh_list(host, runtime, children, parent, before),
        _ => Ok(()),
    }
}

fn refresh_list(
    host: &mut dyn Host,
    runtime: &RuntimeHandle,
    items: &mut [Mounted],
    parent: NodeId,
    before: Option<NodeId>,
) -> Result<(), DomError> {
    let mut next = before;
    for item in items.iter_mut().rev() {
        refresh(host, runtime, item, parent, next)?;
        if let Some(first) = item.first_node() {
            next = Some(first);
        }
    }
    Ok(())
}

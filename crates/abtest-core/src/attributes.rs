//! Writes element props onto host nodes.
//!
//! Plain values become attributes, booleans prefer native properties, and
//! `on<Event>` handlers are bound through one proxy listener per event.

use std::cell::RefCell;
use std::mem::discriminant;
use std::rc::Rc;

use crate::collections::HashMap;
use crate::dom::{DomError, EventHandler, Host, NodeId};
use crate::vnode::{PropMap, PropValue, INNER_HTML};

/// Per-element event bindings.
///
/// One proxy listener is registered with the host per event name; the proxy
/// forwards to whichever handler is current, so replacing a handler between
/// renders is a table update rather than a listener swap.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    bound: Rc<RefCell<HashMap<String, Binding>>>,
}

struct Binding {
    current: EventHandler,
    proxy: EventHandler,
}

impl Listeners {
    fn bind(
        &self,
        host: &mut dyn Host,
        node: NodeId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), DomError> {
        if let Some(binding) = self.bound.borrow_mut().get_mut(event) {
            binding.current = handler.clone();
            return Ok(());
        }
        let table = Rc::downgrade(&self.bound);
        let name = event.to_string();
        let proxy = EventHandler::new(move |dispatched| {
            let current = table.upgrade().and_then(|table| {
                table
                    .borrow()
                    .get(&name)
                    .map(|binding| binding.current.clone())
            });
            if let Some(current) = current {
                current.call(dispatched);
            }
        });
        host.add_event_listener(node, event, proxy.clone())?;
        self.bound.borrow_mut().insert(
            event.to_string(),
            Binding {
                current: handler.clone(),
                proxy,
            },
        );
        Ok(())
    }

    fn unbind(&self, host: &mut dyn Host, node: NodeId, event: &str) -> Result<(), DomError> {
        let removed = self.bound.borrow_mut().remove(event);
        if let Some(binding) = removed {
            host.remove_event_listener(node, event, &binding.proxy)?;
        }
        Ok(())
    }
}

/// Props that are consumed by the reconciler and never written as attributes.
fn is_reserved(name: &str) -> bool {
    matches!(name, "children" | "key" | "ref" | INNER_HTML)
}

fn attribute_name(name: &str) -> &str {
    match name {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    }
}

fn alias_of(attr: &str) -> Option<&'static str> {
    match attr {
        "class" => Some("className"),
        "for" => Some("htmlFor"),
        _ => None,
    }
}

/// An alias is ignored while its canonical spelling is present.
fn shadowed(props: &PropMap, name: &str) -> bool {
    let attr = attribute_name(name);
    attr != name && props.contains_key(attr)
}

/// The value that ends up in the attribute `name` writes to.
fn effective<'a>(props: &'a PropMap, name: &str) -> Option<&'a PropValue> {
    let attr = attribute_name(name);
    props
        .get(attr)
        .or_else(|| alias_of(attr).and_then(|alias| props.get(alias)))
}

/// `onClick` -> `click`; anything not shaped like `on<Upper>...` is not an
/// event prop.
fn event_name(name: &str) -> Option<String> {
    let rest = name.strip_prefix("on")?;
    if !rest.chars().next()?.is_ascii_uppercase() {
        return None;
    }
    Some(rest.to_ascii_lowercase())
}

/// Applies `next` onto `node`, diffing against `previous`.
///
/// Props missing from `next` are cleared first, then changed ones are
/// written. A prop whose value kind changed has its old form cleared before
/// the new one is written. Identical maps produce no host calls at all.
pub(crate) fn apply_attributes(
    host: &mut dyn Host,
    node: NodeId,
    listeners: &Listeners,
    next: &PropMap,
    previous: Option<&PropMap>,
) -> Result<(), DomError> {
    if let Some(previous) = previous {
        if previous == next {
            return Ok(());
        }
        for (name, value) in previous {
            if is_reserved(name) || shadowed(previous, name) || effective(next, name).is_some() {
                continue;
            }
            clear_prop(host, node, listeners, name, value)?;
        }
    }
    for (name, value) in next {
        if is_reserved(name) || shadowed(next, name) {
            continue;
        }
        let old = previous.and_then(|previous| effective(previous, name));
        if old == Some(value) {
            continue;
        }
        set_prop(host, node, listeners, name, value, old)?;
    }
    Ok(())
}

fn set_prop(
    host: &mut dyn Host,
    node: NodeId,
    listeners: &Listeners,
    name: &str,
    value: &PropValue,
    old: Option<&PropValue>,
) -> Result<(), DomError> {
    if let Some(old) = old {
        if discriminant(old) != discriminant(value) {
            clear_prop(host, node, listeners, name, old)?;
        }
    }
    let attr = attribute_name(name);
    match value {
        PropValue::Handler(handler) => match event_name(name) {
            Some(event) => listeners.bind(host, node, &event, handler),
            None => Ok(()),
        },
        PropValue::Str(value) => host.set_attribute(node, attr, value),
        PropValue::Int(value) => host.set_attribute(node, attr, &value.to_string()),
        PropValue::Float(value) => host.set_attribute(node, attr, &value.to_string()),
        PropValue::Style(style) => host.set_attribute(node, attr, &style.to_css()),
        PropValue::Bool(flag) => {
            if host.has_property(node, name) {
                host.set_property(node, name, *flag)
            } else if *flag {
                host.set_attribute(node, attr, "true")
            } else if old.is_some() {
                host.remove_attribute(node, attr)
            } else {
                Ok(())
            }
        }
        PropValue::Ref(_) | PropValue::InnerHtml(_) | PropValue::Data(_) => Ok(()),
    }
}

fn clear_prop(
    host: &mut dyn Host,
    node: NodeId,
    listeners: &Listeners,
    name: &str,
    value: &PropValue,
) -> Result<(), DomError> {
    match value {
        PropValue::Handler(_) => match event_name(name) {
            Some(event) => listeners.unbind(host, node, &event),
            None => Ok(()),
        },
        PropValue::Bool(_) if host.has_property(node, name) => {
            host.set_property(node, name, false)
        }
        PropValue::Ref(_) | PropValue::InnerHtml(_) | PropValue::Data(_) => Ok(()),
        _ => host.remove_attribute(node, attribute_name(name)),
    }
}

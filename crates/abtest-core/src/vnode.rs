//! Node descriptors and the markup factory.
//!
//! A [`VNode`] is plain data: a type, an ordered prop map, children and an
//! optional key. Building one has no side effects; everything that touches the
//! document happens later in the reconciler and commit engine.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::{Event, EventHandler, NodeId};
use crate::hooks::NodeRef;

/// Prop carrying raw markup that replaces child reconciliation.
pub const INNER_HTML: &str = "dangerouslySetInnerHTML";

/// Identity of a child among its siblings.
///
/// Explicit keys come from the caller; positional keys are assigned by the
/// reconciler for children that carry none, so the two never collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Explicit(Rc<str>),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Explicit(key) => write!(f, "{key:?}"),
            Key::Index(index) => write!(f, "#{index}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Explicit(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Explicit(Rc::from(value))
    }
}

macro_rules! key_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Key {
            fn from(value: $ty) -> Self {
                Key::Explicit(Rc::from(value.to_string()))
            }
        })*
    };
}

key_from_int!(i32, i64, u32, u64, usize);

/// A function component.
///
/// Identity is the Rust type of the render function, so every render of the
/// same `fn` item (or the same closure expression) is the same component type
/// and its instance is reused.
#[derive(Clone)]
pub struct Component {
    type_id: TypeId,
    name: &'static str,
    render: Rc<dyn Fn(&Props) -> Child>,
}

impl Component {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&Props) -> Child + 'static,
    {
        let full = type_name::<F>();
        let name = full.rsplit("::").next().unwrap_or(full);
        Self::named(name, render)
    }

    pub fn named<F>(name: &'static str, render: F) -> Self
    where
        F: Fn(&Props) -> Child + 'static,
    {
        Self {
            type_id: TypeId::of::<F>(),
            name,
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn same_type(&self, other: &Component) -> bool {
        self.type_id == other.type_id
    }

    pub(crate) fn call(&self, props: &Props) -> Child {
        (self.render)(props)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

#[derive(Clone, Debug)]
pub enum NodeType {
    Tag(Rc<str>),
    Component(Component),
    /// Sibling group without an element of its own.
    Fragment,
    /// An existing document node adopted as-is.
    Node(NodeId),
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeType::Tag(a), NodeType::Tag(b)) => a == b,
            (NodeType::Component(a), NodeType::Component(b)) => a.same_type(b),
            (NodeType::Fragment, NodeType::Fragment) => true,
            (NodeType::Node(a), NodeType::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        NodeType::Tag(Rc::from(tag))
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        NodeType::Tag(Rc::from(tag))
    }
}

impl From<Component> for NodeType {
    fn from(component: Component) -> Self {
        NodeType::Component(component)
    }
}

impl From<NodeId> for NodeType {
    fn from(id: NodeId) -> Self {
        NodeType::Node(id)
    }
}

/// Inline style: camelCase property names mapped to values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Style(IndexMap<String, String>);

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(property.into(), value.into());
        self
    }

    pub fn to_css(&self) -> String {
        let mut css = String::new();
        for (property, value) in &self.0 {
            css.push_str(&kebab_case(property));
            css.push(':');
            css.push_str(value);
            css.push(';');
        }
        css
    }
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Target of a `ref` prop, filled with the live node on every commit.
#[derive(Clone)]
pub enum RefProp {
    Node(NodeRef),
    Callback(Rc<dyn Fn(Option<NodeId>)>),
}

impl RefProp {
    pub(crate) fn attach(&self, node: Option<NodeId>) {
        match self {
            RefProp::Node(target) => target.set_current(node),
            RefProp::Callback(callback) => callback(node),
        }
    }
}

impl PartialEq for RefProp {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RefProp::Node(a), RefProp::Node(b)) => a.ptr_eq(b),
            (RefProp::Callback(a), RefProp::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for RefProp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefProp::Node(target) => write!(f, "RefProp::Node({:?})", target.current()),
            RefProp::Callback(_) => f.write_str("RefProp::Callback"),
        }
    }
}

#[derive(Clone)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Style(Style),
    Handler(EventHandler),
    Ref(RefProp),
    InnerHtml(String),
    /// Opaque value for components; never written to the document.
    Data(Rc<dyn Any>),
}

impl PropValue {
    fn into_key(self) -> Option<Key> {
        match self {
            PropValue::Str(value) => Some(Key::from(value)),
            PropValue::Int(value) => Some(Key::from(value)),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Style(a), PropValue::Style(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => a.ptr_eq(b),
            (PropValue::Ref(a), PropValue::Ref(b)) => a == b,
            (PropValue::InnerHtml(a), PropValue::InnerHtml(b)) => a == b,
            (PropValue::Data(a), PropValue::Data(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(value) => write!(f, "{value:?}"),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Style(style) => write!(f, "style({:?})", style.to_css()),
            PropValue::Handler(handler) => handler.fmt(f),
            PropValue::Ref(target) => target.fmt(f),
            PropValue::InnerHtml(html) => write!(f, "html({html:?})"),
            PropValue::Data(_) => f.write_str("<data>"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<&String> for PropValue {
    fn from(value: &String) -> Self {
        PropValue::Str(value.clone())
    }
}

macro_rules! prop_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for PropValue {
            fn from(value: $ty) -> Self {
                PropValue::Int(value as i64)
            }
        })*
    };
}

prop_from_int!(i32, i64, u32, usize);

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<Style> for PropValue {
    fn from(value: Style) -> Self {
        PropValue::Style(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

impl From<RefProp> for PropValue {
    fn from(value: RefProp) -> Self {
        PropValue::Ref(value)
    }
}

pub type PropMap = IndexMap<String, PropValue>;

/// Ordered attribute/event map plus the children list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    attrs: PropMap,
    children: Vec<Child>,
    key: Option<Key>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn class(self, value: impl Into<String>) -> Self {
        self.attr("class", value.into())
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Binds `f` to `event` (`"click"` is stored as `onClick`).
    pub fn on(self, event: &str, f: impl Fn(&Event) + 'static) -> Self {
        self.handler(event, EventHandler::new(f))
    }

    pub fn handler(self, event: &str, handler: EventHandler) -> Self {
        let mut name = String::with_capacity(event.len() + 2);
        name.push_str("on");
        let mut chars = event.chars();
        if let Some(first) = chars.next() {
            name.push(first.to_ascii_uppercase());
            name.extend(chars);
        }
        self.attr(name, handler)
    }

    pub fn style(self, style: Style) -> Self {
        self.attr("style", style)
    }

    pub fn node_ref(self, target: &NodeRef) -> Self {
        self.attr("ref", RefProp::Node(target.clone()))
    }

    pub fn ref_callback(self, callback: impl Fn(Option<NodeId>) + 'static) -> Self {
        self.attr("ref", RefProp::Callback(Rc::new(callback)))
    }

    pub fn inner_html(self, html: impl Into<String>) -> Self {
        self.attr(INNER_HTML, PropValue::InnerHtml(html.into()))
    }

    pub fn data<T: 'static>(self, name: impl Into<String>, value: T) -> Self {
        self.attr(name, PropValue::Data(Rc::new(value)))
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attrs.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name)? {
            PropValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.attrs.get(name)? {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.attrs.get(name)? {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_data<T: 'static>(&self, name: &str) -> Option<&T> {
        match self.attrs.get(name)? {
            PropValue::Data(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn get_handler(&self, name: &str) -> Option<&EventHandler> {
        match self.attrs.get(name)? {
            PropValue::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn attrs(&self) -> &PropMap {
        &self.attrs
    }

    pub(crate) fn into_parts(self) -> (PropMap, Vec<Child>) {
        (self.attrs, self.children)
    }
}

/// Anything that may appear in a children list. `Empty` renders nothing and
/// is how conditional output is expressed.
#[derive(Clone, Debug, PartialEq)]
pub enum Child {
    Node(VNode),
    Text(String),
    /// Nested list; behaves like an unkeyed fragment occupying one slot.
    List(Vec<Child>),
    Empty,
}

impl Child {
    pub fn key(&self) -> Option<&Key> {
        match self {
            Child::Node(node) => node.key.as_ref(),
            _ => None,
        }
    }
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<&String> for Child {
    fn from(text: &String) -> Self {
        Child::Text(text.clone())
    }
}

macro_rules! child_from_number {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(value: $ty) -> Self {
                Child::Text(value.to_string())
            }
        })*
    };
}

child_from_number!(i32, i64, u32, u64, usize, f64);

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Child::Empty)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::List(items.into_iter().map(Into::into).collect())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VNode {
    ty: NodeType,
    props: Props,
    key: Option<Key>,
}

impl VNode {
    pub fn node_type(&self) -> &NodeType {
        &self.ty
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub(crate) fn into_parts(self) -> (NodeType, Props) {
        (self.ty, self.props)
    }
}

impl From<NodeId> for VNode {
    fn from(id: NodeId) -> Self {
        create_element(id, Props::new(), Vec::new())
    }
}

/// Builds a node descriptor.
///
/// Children given here are appended after any added through
/// [`Props::child`]. An explicit key wins; a `"key"` attribute is lifted out
/// of the prop map so it is never written to the document. Unkeyed nodes get
/// a positional key when reconciled.
pub fn create_element(ty: impl Into<NodeType>, mut props: Props, children: Vec<Child>) -> VNode {
    let lifted = props.attrs.shift_remove("key").and_then(PropValue::into_key);
    let key = props.key.take().or(lifted);
    props.children.extend(children);
    VNode {
        ty: ty.into(),
        props,
        key,
    }
}

pub fn fragment(children: Vec<Child>) -> VNode {
    create_element(NodeType::Fragment, Props::new(), children)
}

pub fn text(value: impl Into<String>) -> Child {
    Child::Text(value.into())
}

/// `children![a, "text", 3]` builds a `Vec<Child>` from mixed values.
#[macro_export]
macro_rules! children {
    ($($child:expr),* $(,)?) => {
        vec![$($crate::Child::from($child)),*]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_wins_over_attribute() {
        let node = create_element("li", Props::new().attr("key", "attr").key("explicit"), vec![]);
        assert_eq!(node.key(), Some(&Key::from("explicit")));
        assert!(node.props().get("key").is_none());
    }

    #[test]
    fn key_attribute_is_lifted() {
        let node = create_element("li", Props::new().attr("key", 7), vec![]);
        assert_eq!(node.key(), Some(&Key::from("7")));
        assert!(node.props().attrs().is_empty());
    }

    #[test]
    fn children_are_normalized_into_one_list() {
        let node = create_element(
            "ul",
            Props::new().child("first"),
            children!["second", 3, None::<VNode>, false],
        );
        assert_eq!(
            node.props().children(),
            &[
                Child::Text("first".into()),
                Child::Text("second".into()),
                Child::Text("3".into()),
                Child::Empty,
                Child::Empty,
            ]
        );
    }

    #[test]
    fn style_map_is_kebab_cased() {
        let style = Style::new()
            .set("fontSize", "12px")
            .set("backgroundColor", "red");
        assert_eq!(style.to_css(), "font-size:12px;background-color:red;");
    }

    #[test]
    fn on_builds_event_prop_name() {
        let props = Props::new().on("mouseEnter", |_| {});
        assert!(props.get_handler("onMouseEnter").is_some());
    }

    fn banner(_: &Props) -> Child {
        Child::Empty
    }

    fn footer(_: &Props) -> Child {
        Child::Empty
    }

    #[test]
    fn component_identity_follows_function_type() {
        let a = Component::new(banner);
        let b = Component::new(banner);
        let c = Component::new(footer);
        assert!(a.same_type(&b));
        assert!(!a.same_type(&c));
        assert_eq!(a.name(), "banner");
    }
}

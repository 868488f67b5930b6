#![doc = r"Minimal retained-mode renderer for injected experiment markup."]

extern crate self as abtest_core;

pub mod dom;
pub mod hooks;
pub mod identity;
pub mod memory;
pub mod owned;
pub mod platform;
pub mod runtime;
pub mod vnode;

mod attributes;
mod collections;
mod commit;
mod mount;
mod reconcile;
mod renderer;

pub use dom::{DomError, Event, EventHandler, Host, NodeId, NodeKind};
pub use hooks::{
    use_effect, use_effect_with, use_ref, use_state, EffectResult, EffectScope, NodeRef, Ref,
    SetState,
};
pub use identity::{get_test_id, set_test_id};
pub use memory::{MemoryDocument, Mutation};
pub use mount::MountHandle;
pub use owned::Owned;
pub use platform::RuntimeScheduler;
pub use renderer::{RenderError, Renderer, RendererConfig, RootId};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use vnode::{
    create_element, fragment, text, Child, Component, Key, NodeType, PropMap, PropValue, Props,
    RefProp, Style, VNode, INNER_HTML,
};

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod reconcile_tests;

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod hooks_tests;

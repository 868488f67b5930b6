//! The renderer: owns the host document, the runtime queues and every
//! mounted root, and drives the deferred tick.

use std::env;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, error, trace};

use crate::commit::refresh;
use crate::dom::{DomError, Host, NodeId, NodeKind};
use crate::identity::get_test_id;
use crate::platform::RuntimeScheduler;
use crate::reconcile::Mounted;
use crate::runtime::{DefaultScheduler, Runtime, RuntimeHandle};

pub type RootId = usize;

/// Tunables for a [`Renderer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RendererConfig {
    /// Attribute stamped with [`get_test_id`] on root-level elements.
    pub marker_attribute: String,
    /// Ticks [`Renderer::run_until_idle`] may run before giving up.
    pub tick_limit: usize,
    /// Log an outline of every root after each commit, at trace level.
    pub debug_dump: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            marker_attribute: "data-o".to_string(),
            tick_limit: 100,
            debug_dump: false,
        }
    }
}

impl RendererConfig {
    /// Defaults overridden by `ABTEST_MARKER_ATTR`, `ABTEST_TICK_LIMIT` and
    /// `ABTEST_DEBUG`. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = env::var("ABTEST_MARKER_ATTR") {
            if !name.is_empty() {
                config.marker_attribute = name;
            }
        }
        if let Some(limit) = env::var("ABTEST_TICK_LIMIT")
            .ok()
            .and_then(|value| value.parse().ok())
        {
            config.tick_limit = limit;
        }
        if let Ok(flag) = env::var("ABTEST_DEBUG") {
            config.debug_dump = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    Dom(DomError),
    UnknownRoot { root: RootId },
    TickLimit { limit: usize },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Dom(err) => write!(f, "document error: {err}"),
            RenderError::UnknownRoot { root } => write!(f, "root {root} is not mounted"),
            RenderError::TickLimit { limit } => {
                write!(f, "updates still pending after {limit} ticks")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Dom(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DomError> for RenderError {
    fn from(err: DomError) -> Self {
        RenderError::Dom(err)
    }
}

/// Where a root goes relative to its parent when it has no nodes to anchor on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Placement {
    Append,
    Prepend,
    Before(NodeId),
    After(NodeId),
    /// Rendered into a container that is not part of the document.
    Detached,
}

impl Placement {
    pub(crate) fn anchor(self, host: &dyn Host, parent: NodeId) -> Option<NodeId> {
        match self {
            Placement::Append | Placement::Detached => None,
            Placement::Prepend => host.first_child(parent),
            Placement::Before(reference) => {
                (host.parent(reference) == Some(parent)).then_some(reference)
            }
            Placement::After(reference) => {
                if host.parent(reference) == Some(parent) {
                    host.next_sibling(reference)
                } else {
                    None
                }
            }
        }
    }
}

pub(crate) struct MountRoot {
    pub(crate) tree: Option<Mounted>,
    pub(crate) parent: NodeId,
    pub(crate) placement: Placement,
}

impl MountRoot {
    /// Current parent and insertion anchor of the root. Nodes may have been
    /// moved since mounting (a detached container spliced into the page), so
    /// the live position wins over the recorded one.
    pub(crate) fn locate(&self, host: &dyn Host) -> (NodeId, Option<NodeId>) {
        let parent = self
            .tree
            .as_ref()
            .and_then(Mounted::first_node)
            .and_then(|node| host.parent(node))
            .unwrap_or(self.parent);
        let before = match self.tree.as_ref().and_then(Mounted::last_node) {
            Some(last) if host.parent(last) == Some(parent) => host.next_sibling(last),
            _ => self.placement.anchor(host, parent),
        };
        (parent, before)
    }

    pub(crate) fn nodes(&self) -> Vec<NodeId> {
        self.tree.as_ref().map(Mounted::nodes).unwrap_or_default()
    }
}

/// Owns a host document, the runtime queues, and every mounted root.
pub struct Renderer<H: Host> {
    pub(crate) host: H,
    pub(crate) runtime: Runtime,
    pub(crate) config: RendererConfig,
    pub(crate) roots: IndexMap<RootId, MountRoot>,
    pub(crate) next_root: RootId,
}

impl<H: Host> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self::with_runtime(host, Runtime::new(Arc::new(DefaultScheduler)))
    }

    pub fn with_runtime(host: H, runtime: Runtime) -> Self {
        Self::with_config(host, runtime, RendererConfig::default())
    }

    pub fn with_scheduler(host: H, scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_runtime(host, Runtime::new(scheduler))
    }

    pub fn with_config(host: H, runtime: Runtime, config: RendererConfig) -> Self {
        Self {
            host,
            runtime,
            config,
            roots: IndexMap::new(),
            next_root: 1,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Whether deferred effects or re-renders are waiting for [`tick`](Self::tick).
    pub fn should_tick(&self) -> bool {
        self.runtime.needs_tick() || self.runtime.has_pending_work()
    }

    /// One deferred pass: effects queued by the previous commit run first,
    /// then every root holding a dirty component is re-rendered and committed.
    /// Effects produced by this pass wait for the next tick.
    pub fn tick(&mut self) -> Result<(), RenderError> {
        self.runtime.set_needs_tick(false);
        let handle = self.runtime.handle();

        let effects = handle.take_effects();
        if !effects.is_empty() {
            trace!("running {} deferred effects", effects.len());
        }
        for effect in effects {
            effect.run();
        }

        let dirty = handle.take_dirty();
        let mut pending = false;
        for (id, instance) in &dirty {
            match instance.upgrade() {
                Some(instance) if instance.is_dirty() && instance.is_active() => pending = true,
                _ => handle.mark_clean(*id),
            }
        }
        if pending {
            debug!("re-rendering {} dirty components", dirty.len());
            let roots: Vec<RootId> = self.roots.keys().copied().collect();
            for root in roots {
                self.refresh_root(root)?;
            }
        }

        if self.runtime.has_pending_work() {
            self.runtime.set_needs_tick(true);
        }
        Ok(())
    }

    /// Ticks until nothing is pending, at most `tick_limit` times.
    pub fn run_until_idle(&mut self) -> Result<(), RenderError> {
        for _ in 0..self.config.tick_limit {
            if !self.should_tick() {
                return Ok(());
            }
            self.tick()?;
        }
        if self.should_tick() {
            let limit = self.config.tick_limit;
            error!("renderer still has pending updates after {limit} ticks");
            return Err(RenderError::TickLimit { limit });
        }
        Ok(())
    }

    fn refresh_root(&mut self, id: RootId) -> Result<(), RenderError> {
        let handle = self.runtime.handle();
        let Some(root) = self.roots.get_mut(&id) else {
            return Ok(());
        };
        let (parent, before) = root.locate(&self.host);
        root.parent = parent;
        if let Some(tree) = root.tree.as_mut() {
            refresh(&mut self.host, &handle, tree, parent, before)?;
        }
        let nodes = root.nodes();
        self.stamp(&nodes)?;
        self.dump(id);
        Ok(())
    }

    /// Writes the identity marker on root-level elements that lack it.
    pub(crate) fn stamp(&mut self, nodes: &[NodeId]) -> Result<(), DomError> {
        let marker = self.config.marker_attribute.as_str();
        let id = get_test_id();
        for &node in nodes {
            if self.host.kind(node)? != NodeKind::Element {
                continue;
            }
            if self.host.attribute(node, marker)?.as_deref() != Some(id) {
                self.host.set_attribute(node, marker, id)?;
            }
        }
        Ok(())
    }

    pub(crate) fn dump(&self, id: RootId) {
        if !self.config.debug_dump {
            return;
        }
        if let Some(tree) = self.roots.get(&id).and_then(|root| root.tree.as_ref()) {
            let mut outline = String::new();
            tree.dump(0, &mut outline);
            trace!("root {id}:\n{outline}");
        }
    }
}

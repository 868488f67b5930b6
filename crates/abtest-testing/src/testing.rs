use abtest_core::{
    Host, MemoryDocument, MountHandle, NodeId, RenderError, Renderer, RuntimeHandle, VNode,
};
use log::debug;

/// Headless harness for exercising mounts in tests.
///
/// Owns a renderer over an in-memory document and keeps a single root
/// mounted under `<body>`. Installing new content re-renders that root, so
/// tests observe the same reuse behaviour a page sees on repeated mounts of
/// one experiment.
pub struct MountTestRule {
    renderer: Renderer<MemoryDocument>,
    handle: Option<MountHandle>,
}

impl MountTestRule {
    /// Create a new test rule backed by an empty in-memory document.
    pub fn new() -> Self {
        Self::with_renderer(Renderer::new(MemoryDocument::new()))
    }

    pub fn with_renderer(renderer: Renderer<MemoryDocument>) -> Self {
        Self {
            renderer,
            handle: None,
        }
    }

    /// Mount `content` under `<body>`, or re-render the existing root with it.
    pub fn set_content(&mut self, content: impl Into<VNode>) -> Result<&MountHandle, RenderError> {
        let next = match self.handle.take() {
            Some(handle) => self.renderer.update(&handle, content)?,
            None => {
                let body = self.renderer.host().body();
                self.renderer.append(content, body, true)?
            }
        };
        Ok(self.handle.insert(next))
    }

    /// Tick until no effects or re-renders are pending.
    pub fn pump_until_idle(&mut self) -> Result<(), RenderError> {
        self.renderer.run_until_idle()
    }

    /// Dispatch `kind` at `target` without pumping. Returns the number of
    /// listeners that ran.
    pub fn dispatch(&mut self, target: NodeId, kind: &str) -> usize {
        let invoked = self.renderer.host().dispatch_event(target, kind);
        debug!("dispatched {kind} at #{target} to {invoked} listeners");
        invoked
    }

    /// Simulated click followed by [`pump_until_idle`](Self::pump_until_idle).
    pub fn click(&mut self, target: NodeId) -> Result<usize, RenderError> {
        let invoked = self.dispatch(target, "click");
        self.pump_until_idle()?;
        Ok(invoked)
    }

    /// Unmount the current root, if any.
    pub fn unmount(&mut self) -> Result<(), RenderError> {
        match self.handle.take() {
            Some(handle) => self.renderer.unmount(&handle),
            None => Ok(()),
        }
    }

    pub fn has_content(&self) -> bool {
        self.handle.is_some()
    }

    /// Current top-level nodes of the mounted root.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        self.handle
            .as_ref()
            .map(|handle| self.renderer.root_nodes(handle.root()))
            .unwrap_or_default()
    }

    /// First top-level node of the mounted root.
    pub fn root(&self) -> Option<NodeId> {
        self.root_nodes().first().copied()
    }

    pub fn body(&self) -> NodeId {
        self.renderer.host().body()
    }

    /// Text content of the whole body.
    pub fn text_content(&self) -> String {
        self.document().text_content(self.body())
    }

    /// Markup of every node in the body, concatenated.
    pub fn html(&self) -> String {
        let document = self.document();
        document
            .children(document.body())
            .into_iter()
            .map(|node| document.to_html(node))
            .collect()
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.document().elements_by_tag(self.body(), tag)
    }

    pub fn mutation_count(&self) -> usize {
        self.document().mutation_count()
    }

    pub fn created_elements(&self) -> usize {
        self.document().created_elements()
    }

    pub fn clear_mutations(&mut self) {
        self.renderer.host_mut().clear_mutations();
    }

    pub fn document(&self) -> &MemoryDocument {
        self.renderer.host()
    }

    pub fn document_mut(&mut self) -> &mut MemoryDocument {
        self.renderer.host_mut()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.renderer.runtime_handle()
    }

    /// Gain mutable access to the renderer for placements other than the
    /// single body root.
    pub fn renderer(&mut self) -> &mut Renderer<MemoryDocument> {
        &mut self.renderer
    }
}

impl Default for MountTestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `MountTestRule`.
pub fn run_test_mount<R>(f: impl FnOnce(&mut MountTestRule) -> R) -> R {
    let mut rule = MountTestRule::new();
    f(&mut rule)
}

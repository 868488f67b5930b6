//! Entry points that tie a node tree to a location in the host document.

use log::debug;

use crate::commit::{commit, unmount};
use crate::dom::{DomError, Host, NodeId};
use crate::identity::get_test_id;
use crate::reconcile::Reconciler;
use crate::renderer::{MountRoot, Placement, RenderError, Renderer, RootId};
use crate::vnode::{Child, Key, VNode};

/// Result of a mount: the root it created and the top-level nodes committed
/// at that moment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountHandle {
    root: RootId,
    nodes: Vec<NodeId>,
    container: Option<NodeId>,
}

impl MountHandle {
    pub fn root(&self) -> RootId {
        self.root
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Detached container created by [`Renderer::render`] without a target.
    /// Inserting it into the document moves the mounted nodes along.
    pub fn container(&self) -> Option<NodeId> {
        self.container
    }

    /// The single committed node, or the container holding several.
    pub fn node(&self) -> Option<NodeId> {
        match self.nodes.as_slice() {
            [single] => Some(*single),
            nodes => self.container.or_else(|| nodes.first().copied()),
        }
    }
}

impl<H: Host> Renderer<H> {
    /// One-shot mount. With a target the tree is appended to it and nothing is
    /// cleared; without one it is committed into a fresh detached container.
    pub fn render(
        &mut self,
        node: impl Into<VNode>,
        target: Option<NodeId>,
    ) -> Result<MountHandle, RenderError> {
        match target {
            Some(parent) => self.mount(node.into(), parent, Placement::Append, false),
            None => {
                let container = self.host.create_fragment();
                let mut handle = self.mount(node.into(), container, Placement::Detached, false)?;
                handle.container = Some(container);
                Ok(handle)
            }
        }
    }

    pub fn append(
        &mut self,
        node: impl Into<VNode>,
        parent: NodeId,
        clear_previous: bool,
    ) -> Result<MountHandle, RenderError> {
        self.mount(node.into(), parent, Placement::Append, clear_previous)
    }

    pub fn prepend(
        &mut self,
        node: impl Into<VNode>,
        parent: NodeId,
        clear_previous: bool,
    ) -> Result<MountHandle, RenderError> {
        self.mount(node.into(), parent, Placement::Prepend, clear_previous)
    }

    /// Mounts as the previous sibling of `reference`. If clearing removes
    /// `reference` itself, the tree is appended to its former parent.
    pub fn insert_before(
        &mut self,
        node: impl Into<VNode>,
        reference: NodeId,
        clear_previous: bool,
    ) -> Result<MountHandle, RenderError> {
        let parent = self
            .host
            .parent(reference)
            .ok_or(DomError::Detached { id: reference })?;
        self.mount(
            node.into(),
            parent,
            Placement::Before(reference),
            clear_previous,
        )
    }

    pub fn insert_after(
        &mut self,
        node: impl Into<VNode>,
        reference: NodeId,
        clear_previous: bool,
    ) -> Result<MountHandle, RenderError> {
        let parent = self
            .host
            .parent(reference)
            .ok_or(DomError::Detached { id: reference })?;
        self.mount(
            node.into(),
            parent,
            Placement::After(reference),
            clear_previous,
        )
    }

    /// Re-renders an existing root against its previous tree, reusing every
    /// node that still matches.
    pub fn update(
        &mut self,
        handle: &MountHandle,
        node: impl Into<VNode>,
    ) -> Result<MountHandle, RenderError> {
        let mut next = self.render_root(handle.root, node.into())?;
        next.container = handle.container;
        Ok(next)
    }

    /// Runs cleanup for the whole tree of `handle`, then detaches its nodes.
    /// Unmounting a root twice is a no-op.
    pub fn unmount(&mut self, handle: &MountHandle) -> Result<(), RenderError> {
        self.unmount_root(handle.root)
    }

    /// Current top-level nodes of a root.
    pub fn root_nodes(&self, root: RootId) -> Vec<NodeId> {
        self.roots
            .get(&root)
            .map(MountRoot::nodes)
            .unwrap_or_default()
    }

    fn mount(
        &mut self,
        node: VNode,
        parent: NodeId,
        mut placement: Placement,
        clear_previous: bool,
    ) -> Result<MountHandle, RenderError> {
        if clear_previous {
            self.clear_previous(parent)?;
            placement = match placement {
                Placement::Before(reference) | Placement::After(reference)
                    if self.host.parent(reference) != Some(parent) =>
                {
                    debug!("anchor #{reference} was cleared; appending to #{parent}");
                    Placement::Append
                }
                other => other,
            };
        }
        let id = self.next_root;
        self.next_root += 1;
        self.roots.insert(
            id,
            MountRoot {
                tree: None,
                parent,
                placement,
            },
        );
        self.render_root(id, node)
    }

    fn render_root(&mut self, id: RootId, node: VNode) -> Result<MountHandle, RenderError> {
        let handle = self.runtime.handle();
        let Some(root) = self.roots.get_mut(&id) else {
            return Err(RenderError::UnknownRoot { root: id });
        };
        let (parent, before) = root.locate(&self.host);
        root.parent = parent;
        let key = node.key().cloned().unwrap_or(Key::Index(0));

        // The root keeps its previous tree until reconciling succeeds, so a
        // failed pass can still be unmounted.
        let mut reconciler = Reconciler::new(&mut self.host, &handle);
        let tree = reconciler.reconcile(Child::Node(node), key, root.tree.clone())?;
        let work = reconciler.finish();
        let committed = commit(&mut self.host, &handle, tree.as_ref(), parent, before, work);
        root.tree = tree;
        committed?;

        let nodes = root.nodes();
        self.stamp(&nodes)?;
        self.dump(id);
        debug!("root {id} committed {} top-level nodes under #{parent}", nodes.len());
        Ok(MountHandle {
            root: id,
            nodes,
            container: None,
        })
    }

    fn unmount_root(&mut self, id: RootId) -> Result<(), RenderError> {
        let Some(root) = self.roots.shift_remove(&id) else {
            debug!("root {id} is not mounted");
            return Ok(());
        };
        if let Some(tree) = root.tree {
            unmount(&mut self.host, tree)?;
        }
        debug!("unmounted root {id}");
        Ok(())
    }

    /// Removes every descendant of `parent` carrying this process's marker.
    /// Nodes owned by a live root unmount that root; anything else is simply
    /// detached.
    fn clear_previous(&mut self, parent: NodeId) -> Result<(), RenderError> {
        let marked =
            self.host
                .query_attribute(parent, &self.config.marker_attribute, get_test_id());
        let mut cleared: Vec<NodeId> = Vec::new();
        for node in marked {
            if self.host.parent(node).is_none() || self.inside(node, &cleared) {
                continue;
            }
            cleared.push(node);
            match self.owner_of(node) {
                Some(root) => {
                    debug!("replacing previous mount (root {root})");
                    self.unmount_root(root)?;
                }
                None => {
                    debug!("removing stale marked node #{node}");
                    self.host.remove(node)?;
                }
            }
        }
        Ok(())
    }

    fn inside(&self, node: NodeId, cleared: &[NodeId]) -> bool {
        let mut current = self.host.parent(node);
        while let Some(ancestor) = current {
            if cleared.contains(&ancestor) {
                return true;
            }
            current = self.host.parent(ancestor);
        }
        false
    }

    fn owner_of(&self, node: NodeId) -> Option<RootId> {
        self.roots
            .iter()
            .find(|(_, root)| root.nodes().contains(&node))
            .map(|(id, _)| *id)
    }
}

//! Deferred work queues shared between component instances and the renderer.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::collections::HashSet;
use crate::hooks::{Instance, InstanceId, PendingEffect};
use crate::platform::RuntimeScheduler;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    needs_tick: Cell<bool>,
    dirty: RefCell<HashSet<InstanceId>>,
    dirty_queue: RefCell<Vec<(InstanceId, Weak<Instance>)>>,
    effects: RefCell<VecDeque<PendingEffect>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            needs_tick: Cell::new(false),
            dirty: RefCell::new(HashSet::default()),
            dirty_queue: RefCell::new(Vec::new()),
            effects: RefCell::new(VecDeque::new()),
        }
    }

    fn schedule(&self) {
        if !self.needs_tick.replace(true) {
            self.scheduler.schedule_tick();
        }
    }

    fn register_dirty(&self, id: InstanceId, instance: Weak<Instance>) {
        let mut dirty = self.dirty.borrow_mut();
        if dirty.insert(id) {
            self.dirty_queue.borrow_mut().push((id, instance));
            drop(dirty);
            self.schedule();
        }
    }

    fn mark_clean(&self, id: InstanceId) {
        self.dirty.borrow_mut().remove(&id);
    }

    fn take_dirty(&self) -> Vec<(InstanceId, Weak<Instance>)> {
        self.dirty_queue.borrow_mut().drain(..).collect()
    }

    fn has_dirty(&self) -> bool {
        !self.dirty.borrow().is_empty()
    }

    fn enqueue_effects(&self, effects: Vec<PendingEffect>) {
        if effects.is_empty() {
            return;
        }
        self.effects.borrow_mut().extend(effects);
        self.schedule();
    }

    fn take_effects(&self) -> Vec<PendingEffect> {
        self.effects.borrow_mut().drain(..).collect()
    }

    fn has_effects(&self) -> bool {
        !self.effects.borrow().is_empty()
    }
}

/// Owner of the deferred-work queues for one renderer.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn needs_tick(&self) -> bool {
        self.inner.needs_tick.get()
    }

    pub fn set_needs_tick(&self, value: bool) {
        self.inner.needs_tick.set(value);
    }

    pub fn has_pending_work(&self) -> bool {
        self.inner.has_dirty() || self.inner.has_effects()
    }
}

/// Scheduler that ignores tick requests; the embedder polls
/// [`Renderer::should_tick`](crate::Renderer::should_tick) instead.
#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_tick(&self) {}
}

#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn schedule(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule();
        }
    }

    pub(crate) fn register_dirty(&self, id: InstanceId, instance: Weak<Instance>) {
        if let Some(inner) = self.0.upgrade() {
            inner.register_dirty(id, instance);
        }
    }

    pub(crate) fn mark_clean(&self, id: InstanceId) {
        if let Some(inner) = self.0.upgrade() {
            inner.mark_clean(id);
        }
    }

    pub(crate) fn take_dirty(&self) -> Vec<(InstanceId, Weak<Instance>)> {
        self.0
            .upgrade()
            .map(|inner| inner.take_dirty())
            .unwrap_or_default()
    }

    pub fn has_dirty(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_dirty())
            .unwrap_or(false)
    }

    pub(crate) fn enqueue_effects(&self, effects: Vec<PendingEffect>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_effects(effects);
        }
    }

    pub(crate) fn take_effects(&self) -> Vec<PendingEffect> {
        self.0
            .upgrade()
            .map(|inner| inner.take_effects())
            .unwrap_or_default()
    }

    pub fn has_effects(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_effects())
            .unwrap_or(false)
    }
}

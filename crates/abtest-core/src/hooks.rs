//! Component instances and the hook functions bound to them.
//!
//! While a component function runs, its instance sits on a thread-local
//! stack; `use_state`, `use_ref` and `use_effect*` read the top of that stack
//! and claim the next slot in call order. Slots are matched purely by index,
//! so hooks must be called unconditionally and in the same order on every
//! render of an instance. A slot whose stored type no longer matches is
//! silently re-initialised; any other ordering mistake goes unnoticed.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread_local;

use crate::dom::NodeId;
use crate::owned::Owned;
use crate::runtime::RuntimeHandle;
use crate::vnode::{Child, Component, Props};

pub(crate) type InstanceId = usize;

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

fn next_instance_id() -> InstanceId {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

type Cleanup = Box<dyn FnOnce()>;
type EffectCallback = Box<dyn FnOnce(EffectScope) -> EffectResult>;

enum HookSlot {
    State(Box<dyn Any>),
    Effect(EffectSlot),
    Ref(Box<dyn Any>),
}

#[derive(Default)]
struct EffectSlot {
    deps: Option<Box<dyn Any>>,
    cleanup: Option<Cleanup>,
}

/// Per-component bookkeeping that survives across renders.
pub(crate) struct Instance {
    id: InstanceId,
    name: &'static str,
    component: RefCell<Component>,
    props: RefCell<Props>,
    runtime: RuntimeHandle,
    slots: RefCell<Vec<HookSlot>>,
    cursor: Cell<usize>,
    dirty: Cell<bool>,
    enqueued: Cell<bool>,
    active: Cell<bool>,
}

impl Instance {
    pub(crate) fn new(component: Component, runtime: RuntimeHandle) -> Rc<Self> {
        Rc::new(Self {
            id: next_instance_id(),
            name: component.name(),
            component: RefCell::new(component),
            props: RefCell::new(Props::default()),
            runtime,
            slots: RefCell::new(Vec::new()),
            cursor: Cell::new(0),
            dirty: Cell::new(false),
            enqueued: Cell::new(false),
            active: Cell::new(true),
        })
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn is_instance_of(&self, component: &Component) -> bool {
        self.component.borrow().same_type(component)
    }

    /// Swaps in the latest render function of the same component type.
    pub(crate) fn set_component(&self, component: Component) {
        *self.component.borrow_mut() = component;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn props(&self) -> Props {
        self.props.borrow().clone()
    }

    pub(crate) fn set_props(&self, props: Props) {
        *self.props.borrow_mut() = props;
    }

    fn invalidate(self: &Rc<Self>) {
        self.dirty.set(true);
        if !self.active.get() {
            return;
        }
        if !self.enqueued.replace(true) {
            self.runtime.register_dirty(self.id, Rc::downgrade(self));
        }
    }

    fn mark_rendered(&self) {
        self.dirty.set(false);
        if self.enqueued.replace(false) {
            self.runtime.mark_clean(self.id);
        }
    }

    /// Invokes the component function with this instance installed as the
    /// current one. Effects requested by the render are returned, not run.
    pub(crate) fn render(self: &Rc<Self>, props: &Props) -> (Child, Vec<PendingEffect>) {
        // Cleared before the call so a setter used during render marks it again.
        self.mark_rendered();
        self.cursor.set(0);
        let component = self.component.borrow().clone();
        let _guard = RenderGuard::push(Rc::clone(self));
        let output = component.call(props);
        let effects = CURRENT.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|frame| std::mem::take(&mut frame.effects))
                .unwrap_or_default()
        });
        (output, effects)
    }

    /// Deactivates the instance and runs every stored effect cleanup in slot
    /// order. The slot list is dropped as a whole.
    pub(crate) fn dispose(&self) {
        if !self.active.replace(false) {
            return;
        }
        if self.enqueued.replace(false) {
            self.runtime.mark_clean(self.id);
        }
        let cleanups: Vec<Cleanup> = {
            let mut slots = self.slots.borrow_mut();
            slots
                .iter_mut()
                .filter_map(|slot| match slot {
                    HookSlot::Effect(effect) => effect.cleanup.take(),
                    _ => None,
                })
                .collect()
        };
        for cleanup in cleanups {
            cleanup();
        }
        self.slots.borrow_mut().clear();
    }

    fn advance(&self) -> usize {
        let index = self.cursor.get();
        self.cursor.set(index + 1);
        index
    }

    fn store(&self, index: usize, slot: HookSlot) {
        let mut slots = self.slots.borrow_mut();
        if index < slots.len() {
            slots[index] = slot;
        } else {
            slots.push(slot);
        }
    }

    fn state_slot<T: 'static>(&self, init: impl FnOnce() -> T) -> Owned<T> {
        let index = self.advance();
        if let Some(HookSlot::State(existing)) = self.slots.borrow().get(index) {
            if let Some(cell) = existing.downcast_ref::<Owned<T>>() {
                return cell.clone();
            }
        }
        let cell = Owned::new(init());
        self.store(index, HookSlot::State(Box::new(cell.clone())));
        cell
    }

    fn ref_slot<T: 'static>(&self, init: impl FnOnce() -> T) -> Ref<T> {
        let index = self.advance();
        if let Some(HookSlot::Ref(existing)) = self.slots.borrow().get(index) {
            if let Some(target) = existing.downcast_ref::<Ref<T>>() {
                return target.clone();
            }
        }
        let target = Ref::new(init());
        self.store(index, HookSlot::Ref(Box::new(target.clone())));
        target
    }

    /// Records `deps` in the next effect slot and reports whether they differ
    /// from the previous render's.
    fn effect_slot<D: PartialEq + 'static>(&self, deps: Option<D>) -> (usize, bool) {
        let index = self.advance();
        let mut slots = self.slots.borrow_mut();
        if index >= slots.len() {
            slots.push(HookSlot::Effect(EffectSlot::default()));
        } else if !matches!(slots[index], HookSlot::Effect(_)) {
            slots[index] = HookSlot::Effect(EffectSlot::default());
        }
        let HookSlot::Effect(slot) = &mut slots[index] else {
            unreachable!("effect slot initialised above");
        };
        let changed = match (&deps, slot.deps.as_ref()) {
            (None, _) => true,
            (Some(next), Some(previous)) => previous
                .downcast_ref::<D>()
                .map_or(true, |previous| previous != next),
            (Some(_), None) => true,
        };
        if changed {
            slot.deps = deps.map(|deps| Box::new(deps) as Box<dyn Any>);
        }
        (index, changed)
    }

    fn take_cleanup(&self, index: usize) -> Option<Cleanup> {
        match self.slots.borrow_mut().get_mut(index) {
            Some(HookSlot::Effect(slot)) => slot.cleanup.take(),
            _ => None,
        }
    }

    fn set_cleanup(&self, index: usize, cleanup: Option<Cleanup>) {
        if let Some(HookSlot::Effect(slot)) = self.slots.borrow_mut().get_mut(index) {
            slot.cleanup = cleanup;
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("component", &self.name)
            .field("dirty", &self.dirty.get())
            .field("active", &self.active.get())
            .finish()
    }
}

struct RenderFrame {
    instance: Rc<Instance>,
    effects: Vec<PendingEffect>,
}

thread_local! {
    static CURRENT: RefCell<Vec<RenderFrame>> = const { RefCell::new(Vec::new()) };
}

struct RenderGuard;

impl RenderGuard {
    fn push(instance: Rc<Instance>) -> Self {
        CURRENT.with(|stack| {
            stack.borrow_mut().push(RenderFrame {
                instance,
                effects: Vec::new(),
            })
        });
        RenderGuard
    }
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn current_instance() -> Rc<Instance> {
    CURRENT.with(|stack| {
        stack
            .borrow()
            .last()
            .map(|frame| Rc::clone(&frame.instance))
            .expect("hook called outside of a component render")
    })
}

fn push_effect(effect: PendingEffect) {
    CURRENT.with(|stack| {
        if let Some(frame) = stack.borrow_mut().last_mut() {
            frame.effects.push(effect);
        }
    });
}

/// An effect whose dependencies changed during render, waiting for commit.
pub(crate) struct PendingEffect {
    instance: Weak<Instance>,
    index: usize,
    callback: EffectCallback,
}

impl PendingEffect {
    /// Runs the previous cleanup of this slot, if any. Called at commit time.
    pub(crate) fn run_previous_cleanup(&self) {
        if let Some(instance) = self.instance.upgrade() {
            if let Some(cleanup) = instance.take_cleanup(self.index) {
                cleanup();
            }
        }
    }

    /// Runs the effect and stores its cleanup. Dropped silently when the
    /// owning instance was unmounted before the effect got to run.
    pub(crate) fn run(self) {
        let Some(instance) = self.instance.upgrade() else {
            return;
        };
        if !instance.is_active() {
            return;
        }
        if let Some(cleanup) = instance.take_cleanup(self.index) {
            cleanup();
        }
        let result = (self.callback)(EffectScope { _private: () });
        if instance.is_active() {
            instance.set_cleanup(self.index, result.cleanup);
        } else if let Some(cleanup) = result.cleanup {
            cleanup();
        }
    }
}

/// Handle passed to effect callbacks.
pub struct EffectScope {
    _private: (),
}

impl EffectScope {
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) -> EffectResult {
        EffectResult {
            cleanup: Some(Box::new(cleanup)),
        }
    }
}

/// What an effect leaves behind: an optional cleanup callback.
#[derive(Default)]
pub struct EffectResult {
    cleanup: Option<Cleanup>,
}

/// Mutable cell that keeps its identity across renders.
pub struct Ref<T> {
    cell: Owned<T>,
}

pub type NodeRef = Ref<Option<NodeId>>;

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Ref<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: Owned::new(value),
        }
    }

    pub fn set_current(&self, value: T) {
        self.cell.replace(value);
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.cell.with(f)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.cell.update(f)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.cell.ptr_eq(&other.cell)
    }
}

impl<T: Clone> Ref<T> {
    pub fn current(&self) -> T {
        self.cell.get()
    }
}

impl<T: Default> Default for Ref<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.cell.with(|value| f.debug_tuple("Ref").field(value).finish())
    }
}

/// Setter returned by [`use_state`].
pub struct SetState<T> {
    cell: Owned<T>,
    instance: Weak<Instance>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            instance: Weak::clone(&self.instance),
        }
    }
}

impl<T: PartialEq> SetState<T> {
    /// Stores `next` and schedules a re-render, unless it equals the
    /// current value.
    pub fn set(&self, next: T) {
        let changed = self.cell.update(|value| {
            if *value == next {
                false
            } else {
                *value = next;
                true
            }
        });
        if changed {
            if let Some(instance) = self.instance.upgrade() {
                instance.invalidate();
            }
        }
    }

    /// Functional form: computes the next value from the latest stored one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = self.cell.with(f);
        self.set(next);
    }
}

impl<T: Clone> SetState<T> {
    pub fn get(&self) -> T {
        self.cell.get()
    }
}

pub fn use_state<T>(init: impl FnOnce() -> T) -> (T, SetState<T>)
where
    T: Clone + PartialEq + 'static,
{
    let instance = current_instance();
    let cell = instance.state_slot(init);
    let value = cell.get();
    (
        value,
        SetState {
            cell,
            instance: Rc::downgrade(&instance),
        },
    )
}

pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> Ref<T> {
    current_instance().ref_slot(init)
}

/// Runs `effect` after every commit of the calling component.
pub fn use_effect<F>(effect: F)
where
    F: FnOnce(EffectScope) -> EffectResult + 'static,
{
    register_effect::<(), F>(None, effect);
}

/// Runs `effect` after commit whenever `deps` differs from the previous
/// render's value. Tuples compare element-wise; `()` runs once.
pub fn use_effect_with<D, F>(deps: D, effect: F)
where
    D: PartialEq + 'static,
    F: FnOnce(EffectScope) -> EffectResult + 'static,
{
    register_effect(Some(deps), effect);
}

fn register_effect<D, F>(deps: Option<D>, effect: F)
where
    D: PartialEq + 'static,
    F: FnOnce(EffectScope) -> EffectResult + 'static,
{
    let instance = current_instance();
    let (index, changed) = instance.effect_slot(deps);
    if changed {
        push_effect(PendingEffect {
            instance: Rc::downgrade(&instance),
            index,
            callback: Box::new(effect),
        });
    }
}

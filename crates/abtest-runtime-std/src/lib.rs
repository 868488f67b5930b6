//! Standard runtime services backed by Rust's `std` library.
//!
//! [`StdScheduler`] records tick requests in an atomic flag and optionally
//! wakes an embedder-supplied callback, standing in for the zero-delay timer
//! a browser host would use. [`StdRuntime`] bundles it with a
//! [`abtest_core::Runtime`] and knows how to pump a [`Renderer`] until the
//! deferred work settles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use abtest_core::{
    Host, RenderError, Renderer, RendererConfig, Runtime, RuntimeHandle, RuntimeScheduler,
};
use log::trace;

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that delegates work to Rust's threading primitives.
pub struct StdScheduler {
    tick_requested: AtomicBool,
    tick_waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            tick_requested: AtomicBool::new(false),
            tick_waker: RwLock::new(None),
        }
    }

    /// Returns whether a tick has been requested since the last call.
    pub fn take_tick_request(&self) -> bool {
        self.tick_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker that will be invoked whenever a new tick is scheduled.
    pub fn set_tick_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self
            .tick_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    /// Clears any registered tick waker.
    pub fn clear_tick_waker(&self) {
        *self
            .tick_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .tick_waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("tick_requested", &self.tick_requested.load(Ordering::SeqCst))
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_tick(&self) {
        self.tick_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Convenience container bundling the standard scheduler and a runtime.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    runtime: Runtime,
}

impl StdRuntime {
    pub fn new() -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        Self { scheduler, runtime }
    }

    /// Returns a [`Runtime`] wired to the standard scheduler.
    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Builds a renderer over `host` driven by this runtime, configured
    /// from the environment.
    pub fn renderer<H: Host>(&self, host: H) -> Renderer<H> {
        Renderer::with_config(host, self.runtime(), RendererConfig::from_env())
    }

    /// Returns whether a tick was requested since the last poll.
    pub fn take_tick_request(&self) -> bool {
        self.scheduler.take_tick_request()
    }

    /// Registers a waker to be called when the runtime schedules a tick.
    pub fn set_tick_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_tick_waker(waker);
    }

    pub fn clear_tick_waker(&self) {
        self.scheduler.clear_tick_waker();
    }

    /// Runs ticks on `renderer` while work was requested or is still queued.
    /// Returns the number of ticks run.
    pub fn pump<H: Host>(&self, renderer: &mut Renderer<H>) -> Result<usize, RenderError> {
        let limit = renderer.config().tick_limit;
        let mut ticks = 0;
        while self.take_tick_request() || renderer.should_tick() {
            if ticks == limit {
                return Err(RenderError::TickLimit { limit });
            }
            renderer.tick()?;
            ticks += 1;
        }
        trace!("pumped {ticks} ticks");
        Ok(ticks)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use abtest_core::{
        children, create_element, use_state, Child, Component, MemoryDocument, Props,
    };

    use super::StdRuntime;

    fn counter(_: &Props) -> Child {
        let (count, set_count) = use_state(|| 0);
        create_element(
            "button",
            Props::new().on("click", move |_| set_count.set(count + 1)),
            children![count],
        )
        .into()
    }

    #[test]
    fn state_change_requests_a_tick_and_pump_settles_it() {
        let runtime = StdRuntime::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&wakes);
        runtime.set_tick_waker(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        let mut renderer = runtime.renderer(MemoryDocument::new());
        let body = renderer.host().body();
        let handle = renderer
            .append(
                create_element(Component::new(counter), Props::new(), vec![]),
                body,
                false,
            )
            .expect("mount");
        assert!(!runtime.take_tick_request());

        let button = handle.node().expect("button");
        renderer.host().dispatch_event(button, "click");

        assert_eq!(wakes.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.pump(&mut renderer).expect("pump"), 1);
        assert_eq!(renderer.host().text_content(button), "1");
        assert!(!runtime.take_tick_request());
    }
}

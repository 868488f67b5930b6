//! Platform abstraction for the deferred scheduler.
//!
//! The reconciler never re-renders synchronously from a state setter. It asks
//! the host to arrange a zero-delay tick instead, so an embedding can map that
//! request onto a timer, a microtask queue, or a plain loop in tests.

/// Schedules deferred work for the runtime.
///
/// Implementations are responsible for eventually calling
/// [`Renderer::tick`](crate::Renderer::tick) on the thread that owns the
/// renderer. They must be safe to share across threads so that wakers can be
/// installed from anywhere.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host run a tick soon.
    fn schedule_tick(&self);
}

//! Single-shot, cancellable timers driven by the host's event loop.
//!
//! Nothing here sleeps or spawns. The host passes `now` into every call and
//! polls for due timers, which keeps all state changes on one thread.

use std::time::{Duration, Instant};

/// One pending delayed action carrying `T`. Starting it again replaces the
/// pending action, so a kind of timer is never armed twice.
#[derive(Debug)]
pub struct Timer<T> {
    pending: Option<(Instant, T)>,
}

impl<T> Default for Timer<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> Timer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, returning the payload it replaced, if any.
    pub fn start(&mut self, now: Instant, delay: Duration, payload: T) -> Option<T> {
        self.pending.replace((now + delay, payload)).map(|(_, p)| p)
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, p)| p)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn payload(&self) -> Option<&T> {
        self.pending.as_ref().map(|(_, p)| p)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    /// Take the payload once the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> Option<T> {
        let due = matches!(&self.pending, Some((at, _)) if *at <= now);
        if due { self.cancel() } else { None }
    }
}

/// Coalescing wrapper: only the last call's arguments are delivered, `delay`
/// after that last call.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    timer: Timer<T>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self { delay, timer: Timer::new() }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn call(&mut self, args: T, now: Instant) {
        self.timer.start(now, self.delay, args);
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        self.timer.fire_if_due(now)
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }
}

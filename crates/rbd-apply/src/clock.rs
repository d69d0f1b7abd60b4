use std::time::{Duration, Instant};

/// Monotonic time source for throughput sampling.
///
/// `now()` is measured from an arbitrary origin fixed when the clock was
/// created; only differences between readings are meaningful.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Full-resolution clock backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Whole-second clock.
///
/// Rate samples only move when a full second has ticked over, so the
/// displayed throughput changes at most once per second.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoarseClock {
    inner: SystemClock,
}

impl CoarseClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for CoarseClock {
    fn now(&self) -> Duration {
        Duration::from_secs(self.inner.now().as_secs())
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

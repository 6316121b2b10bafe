use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

/// Monotonic clock abstraction shared by the control loop and its collaborators.
///
/// - now(): returns a monotonic Instant
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - ms_since(): elapsed milliseconds from an epoch Instant
/// - ticks_ms(): free-running 32-bit millisecond counter that wraps around
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis() as u64
    }

    /// Millisecond tick counter. Wraps after ~49.7 days; compare ticks only
    /// through [`ticks_diff`].
    fn ticks_ms(&self) -> u32 {
        static PROCESS_EPOCH: OnceLock<Instant> = OnceLock::new();
        let epoch = *PROCESS_EPOCH.get_or_init(Instant::now);
        // Truncation is the wraparound.
        self.now().saturating_duration_since(epoch).as_millis() as u32
    }
}

/// Wraparound-safe difference `later - earlier` between two tick readings.
///
/// Valid as long as the real interval is shorter than one full wrap of the
/// counter.
#[inline]
pub fn ticks_diff(later: u32, earlier: u32) -> u32 {
    later.wrapping_sub(earlier)
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Deterministic clock whose time only moves when advanced.
///
/// now() = origin + offset, ticks_ms() = start_ticks + offset (wrapping).
/// sleep(d) advances internal time by d without actually sleeping. Clones share
/// the same timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    start_ticks: u32,
    offset: std::sync::Arc<std::sync::Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at_ticks(0)
    }

    /// Start the tick counter at an arbitrary value, e.g. just below
    /// `u32::MAX` to exercise rollover.
    pub fn starting_at_ticks(start_ticks: u32) -> Self {
        Self {
            origin: Instant::now(),
            start_ticks,
            offset: std::sync::Arc::new(std::sync::Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    /// Advance the clock by whole milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    fn offset(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }

    fn ticks_ms(&self) -> u32 {
        self.start_ticks
            .wrapping_add(self.offset().as_millis() as u32)
    }
}

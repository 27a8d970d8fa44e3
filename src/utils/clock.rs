//! Monotonic tick source for the calibrated timing loops.
//!
//! The tick resolution is picked once, at configuration time, and every
//! reading taken during a run uses it. Only differences between two readings
//! carry meaning; the epoch is whatever `CLOCK_MONOTONIC` uses.

use std::time::Duration;

/// Tick resolution of a [`Clock`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Resolution {
    /// One tick per nanosecond.
    #[default]
    Nanos,
    /// One tick per microsecond.
    Micros,
}

impl Resolution {
    /// Nanoseconds represented by one tick.
    pub const fn nanos_per_tick(self) -> u64 {
        match self {
            Resolution::Nanos => 1,
            Resolution::Micros => 1_000,
        }
    }

    /// Short unit label used in terminal output.
    pub const fn unit_name(self) -> &'static str {
        match self {
            Resolution::Nanos => "ns",
            Resolution::Micros => "us",
        }
    }

    /// Convert a (possibly fractional or negative) tick count to nanoseconds.
    pub fn ticks_to_nanos(self, ticks: f64) -> f64 {
        ticks * self.nanos_per_tick() as f64
    }

    /// Number of whole ticks in `duration`, rounded down.
    pub fn ticks_in(self, duration: Duration) -> u64 {
        (duration.as_nanos() / self.nanos_per_tick() as u128).min(u64::MAX as u128) as u64
    }

    /// Parse `ns` / `us` (and a few spellings of each).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ns" | "nano" | "nanos" | "nanoseconds" => Some(Resolution::Nanos),
            "us" | "micro" | "micros" | "microseconds" => Some(Resolution::Micros),
            _ => None,
        }
    }
}

/// A source of monotonically non-decreasing ticks.
pub trait Clock {
    /// Current tick count.
    fn now(&mut self) -> u64;

    /// Resolution of the values returned by [`Clock::now`].
    fn resolution(&self) -> Resolution;

    /// Ticks elapsed since `start`, saturating at zero.
    #[inline(always)]
    fn since(&mut self, start: u64) -> u64 {
        self.now().saturating_sub(start)
    }
}

/// `CLOCK_MONOTONIC` read through `clock_gettime`.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    resolution: Resolution,
}

impl MonotonicClock {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now(&mut self) -> u64 {
        let nanos = monotonic_nanos();
        match self.resolution {
            Resolution::Nanos => nanos,
            Resolution::Micros => nanos / 1_000,
        }
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

#[cfg(unix)]
#[inline(always)]
fn monotonic_nanos() -> u64 {
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // CLOCK_MONOTONIC cannot fail with a valid timespec pointer
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    debug_assert_eq!(rc, 0);
    (ts.tv_sec as u64)
        .wrapping_mul(1_000_000_000)
        .wrapping_add(ts.tv_nsec as u64)
}

#[cfg(not(unix))]
#[inline(always)]
fn monotonic_nanos() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Deterministic clock advancing by a fixed step on every reading.
#[derive(Clone, Debug)]
pub struct StepClock {
    next: u64,
    step: u64,
    resolution: Resolution,
}

impl StepClock {
    pub fn new(step: u64) -> Self {
        Self {
            next: 0,
            step,
            resolution: Resolution::Nanos,
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }
}

impl Clock for StepClock {
    fn now(&mut self) -> u64 {
        let t = self.next;
        self.next += self.step;
        t
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Clock replaying a fixed list of readings, then repeating the last one.
#[derive(Clone, Debug)]
pub struct ScriptedClock {
    readings: Vec<u64>,
    cursor: usize,
    resolution: Resolution,
}

impl ScriptedClock {
    pub fn new(readings: Vec<u64>) -> Self {
        Self {
            readings,
            cursor: 0,
            resolution: Resolution::Nanos,
        }
    }

    /// Number of readings taken so far.
    pub fn reads(&self) -> usize {
        self.cursor
    }
}

impl Clock for ScriptedClock {
    fn now(&mut self) -> u64 {
        let t = self
            .readings
            .get(self.cursor)
            .or_else(|| self.readings.last())
            .copied()
            .unwrap_or(0);
        self.cursor += 1;
        t
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

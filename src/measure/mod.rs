//! # Calibrated Timing Measurement
//!
//! Estimates the cost of one memory access at a given working-set size and
//! stride by timing two loop nests that differ only in whether they touch
//! the array:
//!
//! - **Phase A** repeats `K * stride` read-modify-write passes until the
//!   clock says at least `T` ticks have gone by, counting repetitions.
//! - **Phase B** repeats the same passes the same number of times, adding the
//!   offset to a scalar instead of touching memory.
//!
//! `(elapsed_a - elapsed_b) / steps / accesses_per_step` is then the time per
//! access with loop and induction-variable overhead removed. The result can
//! come out at or below zero when clock resolution dominates; such
//! measurements are returned as they are and flagged by
//! [`Measurement::is_anomalous`].

pub mod buffer;
pub mod kernel;
#[cfg(test)]
pub mod test;

pub use buffer::WorkingSetBuffer;

use crate::counters::{CounterBackend, CounterError, CounterGroup, CounterSnapshot};
use crate::utils::clock::{Clock, Resolution};
use std::hint::black_box;

/// Tuning knobs for one measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeasureParams {
    /// `K`: passes per repetition are `K * stride`.
    pub multiplier: usize,
    /// `T`: Phase A stops once this many ticks have elapsed.
    pub threshold_ticks: u64,
}

/// Progress of the calibrator through one (size, stride) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    PhaseARunning,
    PhaseADone,
    PhaseBRunning,
    PhaseBDone,
    Emitted,
}

/// What the counter group produced for one measurement.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CounterOutcome {
    /// No group was supplied.
    #[default]
    Inactive,
    Values(CounterSnapshot),
    Failed(CounterError),
}

/// Result for one (size, stride) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    /// Working-set size in elements.
    pub size: usize,
    /// Stride in elements.
    pub stride: usize,
    /// Number of valid starting offsets, `size - stride + 1`.
    pub limit: usize,
    pub accesses_per_pass: usize,
    /// `K * stride`.
    pub passes_per_step: usize,
    /// Phase A repetitions (Phase B ran the same number).
    pub steps: u64,
    pub elapsed_a: u64,
    pub elapsed_b: u64,
    pub resolution: Resolution,
    pub counters: CounterOutcome,
}

impl Measurement {
    /// Array touches performed by one Phase A repetition.
    pub fn accesses_per_step(&self) -> u64 {
        self.accesses_per_pass as u64 * self.passes_per_step as u64
    }

    /// Net ticks per access, possibly zero or negative.
    pub fn net_ticks_per_access(&self) -> f64 {
        net_latency(
            self.elapsed_a,
            self.elapsed_b,
            self.steps,
            self.accesses_per_step(),
        )
    }

    /// Net nanoseconds per access.
    pub fn latency_ns(&self) -> f64 {
        self.resolution.ticks_to_nanos(self.net_ticks_per_access())
    }

    /// The reference loop took at least as long as the access loop.
    pub fn is_anomalous(&self) -> bool {
        self.elapsed_a <= self.elapsed_b
    }
}

/// `(elapsed_a - elapsed_b) / steps / accesses_per_step`, in clock ticks.
///
/// Signed on purpose: a non-positive result is reported, not clamped.
pub fn net_latency(elapsed_a: u64, elapsed_b: u64, steps: u64, accesses_per_step: u64) -> f64 {
    if steps == 0 || accesses_per_step == 0 {
        return 0.0;
    }
    (elapsed_a as f64 - elapsed_b as f64) / steps as f64 / accesses_per_step as f64
}

/// Runs the two-phase measurement against a clock.
pub struct Calibrator<C: Clock> {
    clock: C,
    params: MeasureParams,
    phase: Phase,
}

impl<C: Clock> Calibrator<C> {
    pub fn new(clock: C, params: MeasureParams) -> Self {
        assert!(params.multiplier > 0, "iteration multiplier must be positive");
        Self {
            clock,
            params,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn params(&self) -> MeasureParams {
        self.params
    }

    pub fn resolution(&self) -> Resolution {
        self.clock.resolution()
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    fn enter(&mut self, next: Phase) {
        log::trace!("calibrator {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    /// Measure `size` elements of `data` at `stride` without counters.
    pub fn measure_timing(&mut self, data: &mut [i32], size: usize, stride: usize) -> Measurement {
        self.measure::<Box<dyn CounterBackend>>(data, size, stride, None)
    }

    /// Measure `size` elements of `data` at `stride`.
    ///
    /// When `counters` is given the group brackets Phase A only.
    ///
    /// # Panics
    /// If `stride` is zero or above `size / 2`, if `size > data.len()`, or if
    /// `multiplier * stride` overflows `usize`.
    pub fn measure<B: CounterBackend>(
        &mut self,
        data: &mut [i32],
        size: usize,
        stride: usize,
        counters: Option<&mut CounterGroup<B>>,
    ) -> Measurement {
        assert!(
            stride >= 1 && stride <= size / 2,
            "stride {} out of range for size {}",
            stride,
            size
        );
        assert!(size <= data.len(), "working set larger than buffer");
        debug_assert!(matches!(self.phase, Phase::Idle | Phase::Emitted));

        let data = &mut data[..size];
        let limit = size - stride + 1;
        let Some(passes) = self.params.multiplier.checked_mul(stride) else {
            panic!(
                "multiplier {} times stride {} overflows",
                self.params.multiplier, stride
            );
        };
        let threshold = self.params.threshold_ticks;

        self.enter(Phase::PhaseARunning);
        let clock = &mut self.clock;
        let ((steps, elapsed_a), counters) = match counters {
            Some(group) => {
                let (timing, snapshot) =
                    group.measure(|| phase_a(clock, data, limit, stride, passes, threshold));
                let outcome = match snapshot {
                    Ok(s) => CounterOutcome::Values(s),
                    Err(e) => CounterOutcome::Failed(e),
                };
                (timing, outcome)
            }
            None => (
                phase_a(clock, data, limit, stride, passes, threshold),
                CounterOutcome::Inactive,
            ),
        };
        self.enter(Phase::PhaseADone);

        self.enter(Phase::PhaseBRunning);
        let elapsed_b = phase_b(&mut self.clock, limit, stride, passes, steps);
        self.enter(Phase::PhaseBDone);

        let measurement = Measurement {
            size,
            stride,
            limit,
            accesses_per_pass: kernel::accesses_per_pass(limit, stride),
            passes_per_step: passes,
            steps,
            elapsed_a,
            elapsed_b,
            resolution: self.clock.resolution(),
            counters,
        };
        self.enter(Phase::Emitted);
        measurement
    }
}

/// Repeat the access passes until `threshold` ticks have elapsed.
///
/// Always runs at least one repetition. Returns `(steps, elapsed)`.
fn phase_a<C: Clock>(
    clock: &mut C,
    data: &mut [i32],
    limit: usize,
    stride: usize,
    passes: usize,
    threshold: u64,
) -> (u64, u64) {
    let start = clock.now();
    let mut steps = 0u64;
    loop {
        kernel::touch_passes(data, limit, stride, passes);
        steps += 1;
        let elapsed = clock.since(start);
        if elapsed >= threshold {
            return (steps, elapsed);
        }
    }
}

/// Run the reference passes exactly `steps` times, reading the clock after
/// each repetition as Phase A does.
fn phase_b<C: Clock>(clock: &mut C, limit: usize, stride: usize, passes: usize, steps: u64) -> u64 {
    let start = clock.now();
    let mut last = start;
    for _ in 0..steps {
        black_box(kernel::index_passes(limit, stride, passes));
        last = clock.now();
    }
    last.saturating_sub(start)
}

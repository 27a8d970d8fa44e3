//! # Sweep Engine
//!
//! Walks every (size, stride) pair of a [`SweepPlan`], measures it with the
//! [`Calibrator`], and writes one [`Sample`] per pair to a [`SampleSink`]
//! before moving on.
//!
//! The counter columns of the output are fixed when the sweep starts: they
//! exist if and only if a counter group was opened. If the group fails
//! later, the sweep drops it, logs once, and keeps emitting rows with the
//! counter cells empty.

pub mod plan;
#[cfg(test)]
pub mod test;

pub use plan::{SweepPlan, SweepStep};

use std::io;
use std::time::{Duration, Instant};

use crate::config::{Config, ConfigError};
use crate::counters::{CounterBackend, CounterGroup};
use crate::error::MembenchError;
use crate::measure::{Calibrator, CounterOutcome, MeasureParams, Measurement, WorkingSetBuffer};
use crate::utils::clock::Clock;
use crate::utils::cpu_affinity::CpuPinGuard;

/// One emitted output row.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub size_bytes: u64,
    pub stride_bytes: u64,
    /// Net latency per access; zero or negative marks an anomaly.
    pub latency_ns: f64,
    /// Counter values in declaration order, if the group produced them.
    pub counters: Option<Vec<u64>>,
}

impl Sample {
    pub fn from_measurement(step: SweepStep, m: &Measurement, scale_multiplexed: bool) -> Self {
        let counters = match &m.counters {
            CounterOutcome::Values(snapshot) if scale_multiplexed => Some(snapshot.scaled()),
            CounterOutcome::Values(snapshot) => Some(snapshot.values.clone()),
            CounterOutcome::Inactive | CounterOutcome::Failed(_) => None,
        };
        Self {
            size_bytes: step.size_bytes(),
            stride_bytes: step.stride_bytes(),
            latency_ns: m.latency_ns(),
            counters,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.latency_ns <= 0.0
    }
}

/// Destination for samples.
pub trait SampleSink {
    /// Called once before the first sample with the counter column names.
    fn begin(&mut self, counter_columns: &[String]) -> io::Result<()>;

    /// Write one sample durably before the next pair is measured.
    fn emit(&mut self, sample: &Sample) -> io::Result<()>;

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SampleSink for Vec<Sample> {
    fn begin(&mut self, _counter_columns: &[String]) -> io::Result<()> {
        Ok(())
    }

    fn emit(&mut self, sample: &Sample) -> io::Result<()> {
        self.push(sample.clone());
        Ok(())
    }
}

/// Totals reported after a sweep.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SweepSummary {
    pub samples: usize,
    pub anomalies: usize,
    /// Counter columns were part of the output.
    pub counters_active: bool,
    /// The counter group failed partway through.
    pub counters_lost: bool,
    pub elapsed: Duration,
}

/// Drives a full size/stride sweep.
pub struct Sweep<C: Clock, B: CounterBackend> {
    plan: SweepPlan,
    calibrator: Calibrator<C>,
    counters: Option<CounterGroup<B>>,
    buffer: WorkingSetBuffer,
    scale_multiplexed: bool,
    pin_cpu: bool,
}

impl<C: Clock, B: CounterBackend> Sweep<C, B> {
    /// Build a sweep from `config`, validating it first.
    ///
    /// The threshold is converted with the clock's own resolution so the two
    /// can never disagree.
    pub fn new(
        config: &Config,
        clock: C,
        counters: Option<CounterGroup<B>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let params = MeasureParams {
            multiplier: config.multiplier,
            threshold_ticks: clock.resolution().ticks_in(config.sample_interval),
        };
        let plan = SweepPlan::new(config.min_elems(), config.max_elems());
        Ok(Self {
            buffer: WorkingSetBuffer::new(plan.max_elems(), config.seed),
            plan,
            calibrator: Calibrator::new(clock, params),
            counters,
            scale_multiplexed: config.scale_multiplexed,
            pin_cpu: config.pin_cpu,
        })
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub fn counters_active(&self) -> bool {
        self.counters.is_some()
    }

    /// Output columns beyond the mandatory three.
    pub fn counter_columns(&self) -> Vec<String> {
        self.counters.as_ref().map(|g| g.names()).unwrap_or_default()
    }

    /// Measure every pair and emit each sample as soon as it exists.
    pub fn run<S: SampleSink + ?Sized>(&mut self, sink: &mut S) -> Result<SweepSummary, MembenchError> {
        let started = Instant::now();
        let columns = self.counter_columns();
        let mut summary = SweepSummary {
            counters_active: !columns.is_empty(),
            ..SweepSummary::default()
        };
        sink.begin(&columns)?;

        let _pin = self.pin_cpu.then(|| {
            let guard = CpuPinGuard::new();
            match guard.core_id() {
                Some(core) => log::debug!("sweep pinned to CPU {}", core),
                None => log::warn!("could not pin sweep to a CPU core; results may be noisier"),
            }
            guard
        });

        for step in self.plan.steps() {
            let data = self.buffer.working_set(step.size);
            let m = self
                .calibrator
                .measure(data, step.size, step.stride, self.counters.as_mut());

            match &m.counters {
                CounterOutcome::Failed(err) => {
                    log::warn!(
                        "hardware counters failed at size={} stride={}: {}; continuing with timing only",
                        step.size_bytes(),
                        step.stride_bytes(),
                        err
                    );
                    self.counters = None;
                    summary.counters_lost = true;
                }
                CounterOutcome::Values(snapshot) if snapshot.multiplexed() => {
                    log::debug!(
                        "counters multiplexed at size={} stride={} (running {} of {} ns)",
                        step.size_bytes(),
                        step.stride_bytes(),
                        snapshot.time_running,
                        snapshot.time_enabled
                    );
                }
                _ => {}
            }

            let sample = Sample::from_measurement(step, &m, self.scale_multiplexed);
            if sample.is_anomalous() {
                summary.anomalies += 1;
                log::debug!(
                    "non-positive latency {:.4} ns at size={} stride={} (A={} B={} steps={})",
                    sample.latency_ns,
                    sample.size_bytes,
                    sample.stride_bytes,
                    m.elapsed_a,
                    m.elapsed_b,
                    m.steps
                );
            }
            sink.emit(&sample)?;
            summary.samples += 1;
        }

        sink.finish()?;
        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}

//! # membench
//!
//! Memory-hierarchy latency benchmark. Sweeps working-set sizes and access
//! strides, times a calibrated read-modify-write loop against an identical
//! loop without the memory access, and reports the net per-access latency
//! together with optional hardware performance counters.

pub mod config;
pub mod counters;
pub mod error;
pub mod measure;
pub mod runner;
pub mod sweep;
pub mod utils;

/// Re-export tui from utils
pub use utils::tui;

pub use runner::run;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::counters::{CounterBackend, CounterGroup, EventSpec};
    pub use crate::error::MembenchError;
    pub use crate::measure::{Calibrator, Measurement};
    pub use crate::sweep::{Sample, SampleSink, Sweep, SweepPlan, SweepSummary};
    pub use crate::utils::clock::{Clock, MonotonicClock, Resolution};
}

//! Utility modules for timing, pinning and output.

pub mod clock;
pub mod cpu_affinity;
pub mod csv;
pub mod tui;

pub use clock::{Clock, MonotonicClock, Resolution};
pub use cpu_affinity::CpuPinGuard;
pub use csv::CsvSink;

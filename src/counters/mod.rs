//! # Hardware Counter Group
//!
//! Groups several hardware performance counters under one leader so the
//! kernel schedules, multiplexes and reads them as a single unit.
//!
//! ## Identifier matching
//!
//! A group read returns `(value, id)` pairs. Nothing guarantees that the
//! pairs come back in the order the events were opened, so every consumer
//! goes through [`CounterGroup::read_values`], which matches by the
//! kernel-assigned identifier and projects the result back to declaration
//! order.
//!
//! ## Backends
//!
//! - [`linux::PerfEventBackend`]: `perf_event_open(2)` on Linux
//! - [`stub::StubBackend`]: in-memory double with scriptable read order and
//!   failures

pub mod events;
pub mod group;
pub mod linux;
pub mod stub;
#[cfg(test)]
pub mod test;

pub use events::{default_events, EventKind, EventSpec};
pub use group::{CounterGroup, CounterSnapshot};

use std::fmt;

/// Error raised by a counter backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterError {
    /// The platform or kernel has no usable counters for the event.
    Unsupported,
    /// Need root, `CAP_PERFMON`, or a lower `perf_event_paranoid`.
    PermissionDenied,
    /// Out of descriptors or physical counters.
    ResourceExhausted,
    /// `open` was called with an empty event list.
    NoEvents,
    /// Any other failing system call.
    Os { op: &'static str, errno: i32 },
    /// The group read returned fewer bytes or entries than announced.
    ShortRead,
    /// An opened counter's identifier was absent from a read.
    MissingId(u64),
    /// Operation on a backend that has not been opened.
    NotOpen,
}

impl fmt::Display for CounterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterError::Unsupported => write!(f, "hardware counters are not supported here"),
            CounterError::PermissionDenied => write!(
                f,
                "permission denied - run with sudo, set CAP_PERFMON, or lower perf_event_paranoid"
            ),
            CounterError::ResourceExhausted => {
                write!(f, "out of counter resources (descriptors or PMU slots)")
            }
            CounterError::NoEvents => write!(f, "no events requested"),
            CounterError::Os { op, errno } => write!(
                f,
                "{} failed: {}",
                op,
                std::io::Error::from_raw_os_error(*errno)
            ),
            CounterError::ShortRead => write!(f, "short read from counter group"),
            CounterError::MissingId(id) => write!(f, "counter id {} missing from group read", id),
            CounterError::NotOpen => write!(f, "counter group is not open"),
        }
    }
}

impl std::error::Error for CounterError {}

/// One `(id, value)` entry of a group read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterValue {
    pub id: u64,
    pub value: u64,
}

/// Raw result of a group read, in whatever order the backend produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupReading {
    pub time_enabled: u64,
    pub time_running: u64,
    pub values: Vec<CounterValue>,
}

impl GroupReading {
    /// Number of counters reported (`nr`).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value reported for `id`, wherever it sits in the read.
    pub fn value_of(&self, id: u64) -> Option<u64> {
        self.values.iter().find(|v| v.id == id).map(|v| v.value)
    }
}

/// Kernel-facing half of a counter group.
///
/// `open` returns one identifier per spec, in declaration order. The other
/// operations act on the whole group.
pub trait CounterBackend {
    fn open(&mut self, specs: &[EventSpec]) -> Result<Vec<u64>, CounterError>;
    fn reset(&mut self) -> Result<(), CounterError>;
    fn enable(&mut self) -> Result<(), CounterError>;
    fn disable(&mut self) -> Result<(), CounterError>;
    fn read(&mut self) -> Result<GroupReading, CounterError>;
}

impl<B: CounterBackend + ?Sized> CounterBackend for Box<B> {
    fn open(&mut self, specs: &[EventSpec]) -> Result<Vec<u64>, CounterError> {
        (**self).open(specs)
    }
    fn reset(&mut self) -> Result<(), CounterError> {
        (**self).reset()
    }
    fn enable(&mut self) -> Result<(), CounterError> {
        (**self).enable()
    }
    fn disable(&mut self) -> Result<(), CounterError> {
        (**self).disable()
    }
    fn read(&mut self) -> Result<GroupReading, CounterError> {
        (**self).read()
    }
}

/// The platform's real counter backend.
pub fn system_backend() -> Box<dyn CounterBackend> {
    Box::new(linux::PerfEventBackend::new())
}

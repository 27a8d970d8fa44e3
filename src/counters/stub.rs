//! In-memory counter backend.
//!
//! Hands out synthetic identifiers, returns scripted values, and can shuffle
//! the order of a group read or fail on demand. Used to exercise the
//! identifier-matching and degradation paths without touching the kernel.

use super::{CounterBackend, CounterError, CounterValue, EventSpec, GroupReading};

/// How a stub read orders its `(value, id)` pairs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadOrder {
    #[default]
    Declaration,
    Reversed,
    /// Rotate left by the given amount.
    Rotated(usize),
}

/// Scriptable [`CounterBackend`].
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    order: ReadOrder,
    fail_open: Option<CounterError>,
    fail_read_after: Option<usize>,
    drop_id: Option<usize>,
    time_enabled: u64,
    time_running: u64,
    ids: Vec<u64>,
    enabled: bool,
    reads: usize,
    resets: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            time_enabled: 1_000,
            time_running: 1_000,
            ..Self::default()
        }
    }

    pub fn with_order(mut self, order: ReadOrder) -> Self {
        self.order = order;
        self
    }

    /// Make `open` fail with `err`.
    pub fn failing_open(mut self, err: CounterError) -> Self {
        self.fail_open = Some(err);
        self
    }

    /// Let `n` reads succeed, then fail every later one.
    pub fn failing_read_after(mut self, n: usize) -> Self {
        self.fail_read_after = Some(n);
        self
    }

    /// Leave the counter at declaration index `index` out of every read.
    pub fn dropping(mut self, index: usize) -> Self {
        self.drop_id = Some(index);
        self
    }

    pub fn with_times(mut self, enabled: u64, running: u64) -> Self {
        self.time_enabled = enabled;
        self.time_running = running;
        self
    }

    /// Synthetic identifier for declaration slot `index`.
    pub fn id_for(index: usize) -> u64 {
        0x40 + index as u64 * 7
    }

    /// Value reported for declaration slot `index` on read number `read`.
    pub fn value_for(index: usize, read: usize) -> u64 {
        (index as u64 + 1) * 1_000 + read as u64
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl CounterBackend for StubBackend {
    fn open(&mut self, specs: &[EventSpec]) -> Result<Vec<u64>, CounterError> {
        if let Some(err) = self.fail_open.clone() {
            return Err(err);
        }
        if specs.is_empty() {
            return Err(CounterError::NoEvents);
        }
        self.ids = (0..specs.len()).map(Self::id_for).collect();
        Ok(self.ids.clone())
    }

    fn reset(&mut self) -> Result<(), CounterError> {
        if self.ids.is_empty() {
            return Err(CounterError::NotOpen);
        }
        self.resets += 1;
        Ok(())
    }

    fn enable(&mut self) -> Result<(), CounterError> {
        if self.ids.is_empty() {
            return Err(CounterError::NotOpen);
        }
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), CounterError> {
        self.enabled = false;
        Ok(())
    }

    fn read(&mut self) -> Result<GroupReading, CounterError> {
        if self.ids.is_empty() {
            return Err(CounterError::NotOpen);
        }
        if self.fail_read_after.is_some_and(|n| self.reads >= n) {
            return Err(CounterError::Os {
                op: "read",
                errno: libc::EIO,
            });
        }
        let read = self.reads;
        self.reads += 1;

        let mut values: Vec<CounterValue> = self
            .ids
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != self.drop_id)
            .map(|(i, &id)| CounterValue {
                id,
                value: Self::value_for(i, read),
            })
            .collect();
        match self.order {
            ReadOrder::Declaration => {}
            ReadOrder::Reversed => values.reverse(),
            ReadOrder::Rotated(n) if !values.is_empty() => {
                let len = values.len();
                values.rotate_left(n % len)
            }
            ReadOrder::Rotated(_) => {}
        }
        Ok(GroupReading {
            time_enabled: self.time_enabled,
            time_running: self.time_running,
            values,
        })
    }
}

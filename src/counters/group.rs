//! Owned counter group: lifecycle plus identifier-matched reads.

use super::{CounterBackend, CounterError, EventSpec, GroupReading};

/// Counter values from one read, in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct CounterSnapshot {
    /// One value per declared event.
    pub values: Vec<u64>,
    pub time_enabled: u64,
    pub time_running: u64,
}

impl CounterSnapshot {
    /// The group was time-shared with other events during the read window.
    pub fn multiplexed(&self) -> bool {
        self.time_running < self.time_enabled
    }

    /// Values extrapolated to the full enabled window.
    ///
    /// Returns the raw values when the group never ran or was never
    /// descheduled.
    pub fn scaled(&self) -> Vec<u64> {
        if self.time_running == 0 || !self.multiplexed() {
            return self.values.clone();
        }
        self.values
            .iter()
            .map(|&v| {
                let scaled = v as u128 * self.time_enabled as u128 / self.time_running as u128;
                scaled.min(u64::MAX as u128) as u64
            })
            .collect()
    }
}

/// A leader plus members opened together, kept for the whole run.
pub struct CounterGroup<B: CounterBackend> {
    backend: B,
    specs: Vec<EventSpec>,
    /// Kernel identifiers, index-aligned with `specs`.
    ids: Vec<u64>,
}

impl<B: CounterBackend> CounterGroup<B> {
    /// Open `specs` as one group; the first spec becomes the leader.
    pub fn open(mut backend: B, specs: &[EventSpec]) -> Result<Self, CounterError> {
        if specs.is_empty() {
            return Err(CounterError::NoEvents);
        }
        let ids = backend.open(specs)?;
        if ids.len() != specs.len() {
            return Err(CounterError::ShortRead);
        }
        Ok(Self {
            backend,
            specs: specs.to_vec(),
            ids,
        })
    }

    pub fn specs(&self) -> &[EventSpec] {
        &self.specs
    }

    /// Column names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn reset(&mut self) -> Result<(), CounterError> {
        self.backend.reset()
    }

    pub fn enable(&mut self) -> Result<(), CounterError> {
        self.backend.enable()
    }

    pub fn disable(&mut self) -> Result<(), CounterError> {
        self.backend.disable()
    }

    /// Raw group read, unordered.
    pub fn read(&mut self) -> Result<GroupReading, CounterError> {
        self.backend.read()
    }

    /// Read the group and resolve every declared event by identifier.
    pub fn read_values(&mut self) -> Result<CounterSnapshot, CounterError> {
        let reading = self.backend.read()?;
        self.resolve(&reading)
    }

    /// Project a raw reading back to declaration order.
    pub fn resolve(&self, reading: &GroupReading) -> Result<CounterSnapshot, CounterError> {
        let values = self
            .ids
            .iter()
            .map(|&id| reading.value_of(id).ok_or(CounterError::MissingId(id)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CounterSnapshot {
            values,
            time_enabled: reading.time_enabled,
            time_running: reading.time_running,
        })
    }

    /// Run `f` inside a reset/enable/disable bracket and read the result.
    ///
    /// `f`'s output is returned even when a counter step fails.
    pub fn measure<T>(&mut self, f: impl FnOnce() -> T) -> (T, Result<CounterSnapshot, CounterError>) {
        if let Err(e) = self.reset().and_then(|_| self.enable()) {
            return (f(), Err(e));
        }
        let out = f();
        let snapshot = self.disable().and_then(|_| self.read_values());
        (out, snapshot)
    }
}

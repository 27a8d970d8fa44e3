//! Backing storage for the working sets of a run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Size in bytes of one working-set element.
pub const ELEMENT_BYTES: usize = std::mem::size_of::<i32>();

/// One allocation sized for the largest working set, reused for every
/// smaller one.
pub struct WorkingSetBuffer {
    data: Vec<i32>,
}

impl WorkingSetBuffer {
    /// Allocate `capacity` elements and fill them from a seeded generator.
    pub fn new(capacity: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..capacity).map(|_| rng.random::<i32>()).collect();
        Self { data }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The first `size` elements.
    ///
    /// # Panics
    /// If `size` exceeds the capacity.
    pub fn working_set(&mut self, size: usize) -> &mut [i32] {
        &mut self.data[..size]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }
}

//! Size and stride progressions of a sweep.

use crate::measure::buffer::ELEMENT_BYTES;

/// One (working-set size, stride) pair, both in elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepStep {
    pub size: usize,
    pub stride: usize,
}

impl SweepStep {
    pub fn size_bytes(&self) -> u64 {
        (self.size * ELEMENT_BYTES) as u64
    }

    pub fn stride_bytes(&self) -> u64 {
        (self.stride * ELEMENT_BYTES) as u64
    }
}

/// Power-of-two sizes from `min` to `max` elements and, for each, strides
/// from 1 to `size / 2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepPlan {
    min_elems: usize,
    max_elems: usize,
}

impl SweepPlan {
    /// Bounds in elements; both must be powers of two with `2 <= min <= max`.
    pub fn new(min_elems: usize, max_elems: usize) -> Self {
        assert!(min_elems.is_power_of_two() && max_elems.is_power_of_two());
        assert!(min_elems >= 2 && min_elems <= max_elems);
        Self {
            min_elems,
            max_elems,
        }
    }

    /// Bounds in bytes, converted with the element width.
    pub fn from_bytes(min_bytes: usize, max_bytes: usize) -> Self {
        Self::new(min_bytes / ELEMENT_BYTES, max_bytes / ELEMENT_BYTES)
    }

    pub fn min_elems(&self) -> usize {
        self.min_elems
    }

    pub fn max_elems(&self) -> usize {
        self.max_elems
    }

    /// Working-set sizes in increasing order.
    pub fn sizes(&self) -> impl Iterator<Item = usize> {
        let max = self.max_elems;
        std::iter::successors(Some(self.min_elems), |&s| s.checked_mul(2))
            .take_while(move |&s| s <= max)
    }

    /// Strides for one size: `1, 2, 4, ...` up to `size / 2`.
    pub fn strides(size: usize) -> impl Iterator<Item = usize> {
        let bound = size / 2;
        std::iter::successors(Some(1usize), |&s| s.checked_mul(2))
            .take_while(move |&s| s <= bound)
    }

    /// Every pair, sizes outer, strides inner.
    pub fn steps(&self) -> impl Iterator<Item = SweepStep> {
        self.sizes()
            .flat_map(|size| Self::strides(size).map(move |stride| SweepStep { size, stride }))
    }

    /// Total number of pairs.
    pub fn len(&self) -> usize {
        self.sizes().map(|s| Self::strides(s).count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

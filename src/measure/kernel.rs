//! The two loop nests timed by the calibration.
//!
//! Both run `passes` passes over the starting offsets `0, stride, 2*stride, ...
//! < limit`. [`touch_passes`] increments the element at each offset;
//! [`index_passes`] only folds the offset into a scalar.

use std::hint::black_box;

/// Number of offsets visited by one pass: `ceil(limit / stride)`.
#[inline]
pub const fn accesses_per_pass(limit: usize, stride: usize) -> usize {
    if limit == 0 {
        0
    } else {
        (limit - 1) / stride + 1
    }
}

/// Read-modify-write every `stride`-th element below `limit`, `passes` times.
///
/// # Panics
/// If `limit > data.len()` or `stride == 0`.
#[inline(never)]
pub fn touch_passes(data: &mut [i32], limit: usize, stride: usize, passes: usize) {
    assert!(limit <= data.len() && stride > 0);
    let base = data.as_mut_ptr();
    for _ in 0..passes {
        let mut index = 0;
        while index < limit {
            // SAFETY: index < limit <= data.len()
            unsafe {
                let slot = base.add(index);
                slot.write_volatile(slot.read_volatile().wrapping_add(1));
            }
            index += stride;
        }
    }
}

/// Same loop nest as [`touch_passes`] without touching memory.
///
/// `acc` stays in a register for the whole inner loop and is only made
/// observable once per pass, so the loop carries no memory dependency.
#[inline(never)]
pub fn index_passes(limit: usize, stride: usize, passes: usize) -> usize {
    assert!(stride > 0);
    let limit = black_box(limit);
    let stride = black_box(stride);
    let mut acc = 0usize;
    for _ in 0..passes {
        let mut index = 0;
        while index < limit {
            acc = acc.wrapping_add(index);
            index += stride;
        }
        acc = black_box(acc);
    }
    acc
}

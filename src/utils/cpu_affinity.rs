//! Keep the sweep thread on one CPU core.
//!
//! Migrating between cores mid-measurement drags a cold L1/L2 into the
//! timed loop, so the sweep pins itself to whatever core it is already on
//! and restores the previous mask when done.

#[cfg(target_os = "linux")]
mod platform {
    use std::mem;

    pub type Mask = libc::cpu_set_t;

    pub fn online_cores() -> Option<usize> {
        let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        (n > 0).then_some(n as usize)
    }

    pub fn current_cpu() -> Option<usize> {
        let cpu = unsafe { libc::sched_getcpu() };
        (cpu >= 0).then_some(cpu as usize)
    }

    pub fn current_mask() -> Option<Mask> {
        unsafe {
            let mut set: Mask = mem::zeroed();
            (libc::sched_getaffinity(0, mem::size_of::<Mask>(), &mut set) == 0).then_some(set)
        }
    }

    pub fn mask_contains(mask: &Mask, core: usize) -> bool {
        core < libc::CPU_SETSIZE as usize && unsafe { libc::CPU_ISSET(core, mask) }
    }

    pub fn pin(core: usize) -> bool {
        unsafe {
            let mut set: Mask = mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(core, &mut set);
            libc::sched_setaffinity(0, mem::size_of::<Mask>(), &set) == 0
        }
    }

    pub fn restore(mask: &Mask) -> bool {
        unsafe { libc::sched_setaffinity(0, mem::size_of::<Mask>(), mask) == 0 }
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    pub type Mask = ();

    pub fn online_cores() -> Option<usize> {
        std::thread::available_parallelism().ok().map(|n| n.get())
    }

    pub fn current_cpu() -> Option<usize> {
        None
    }

    pub fn current_mask() -> Option<Mask> {
        None
    }

    pub fn mask_contains(_mask: &Mask, _core: usize) -> bool {
        false
    }

    pub fn pin(_core: usize) -> bool {
        false
    }

    pub fn restore(_mask: &Mask) -> bool {
        true
    }
}

/// Number of online cores, if the platform reports it.
pub fn online_cores() -> Option<usize> {
    platform::online_cores()
}

/// Core the calling thread is executing on right now.
pub fn current_cpu() -> Option<usize> {
    platform::current_cpu()
}

/// RAII guard: pins the calling thread on creation, restores its previous
/// affinity mask on drop.
///
/// ```ignore
/// {
///     let _pin = CpuPinGuard::new();
///     // ... timed loops ...
/// } // original mask restored here
/// ```
pub struct CpuPinGuard {
    pinned_core: Option<usize>,
    saved: Option<platform::Mask>,
}

impl CpuPinGuard {
    /// Pin to the current core, or to the first core the thread is allowed
    /// on if the current one cannot be determined.
    pub fn new() -> Self {
        let saved = platform::current_mask();
        let candidate = current_cpu().or_else(|| {
            let mask = saved.as_ref()?;
            (0..online_cores()?).find(|&core| platform::mask_contains(mask, core))
        });
        let pinned_core = candidate.filter(|&core| platform::pin(core));
        if pinned_core.is_none() {
            log::trace!("cpu pinning unavailable (candidate {:?})", candidate);
        }
        Self { pinned_core, saved }
    }

    /// Core the thread is pinned to, if pinning succeeded.
    pub fn core_id(&self) -> Option<usize> {
        self.pinned_core
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_core.is_some()
    }
}

impl Default for CpuPinGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CpuPinGuard {
    fn drop(&mut self) {
        if self.pinned_core.is_none() {
            return;
        }
        if let Some(mask) = self.saved.take() {
            if !platform::restore(&mask) {
                log::warn!("failed to restore CPU affinity after sweep");
            }
        }
    }
}

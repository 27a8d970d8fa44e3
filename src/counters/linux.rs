//! `perf_event_open(2)` backend.
//!
//! # Permissions
//!
//! Linux perf requires one of:
//! - Root/sudo privileges
//! - `CAP_PERFMON` capability (kernel 5.8+)
//! - `kernel.perf_event_paranoid <= 2` (check with `cat /proc/sys/kernel/perf_event_paranoid`)
//!
//! Every descriptor is opened with the group read format, so one `read(2)` on
//! the leader returns:
//!
//! ```text
//! u64 nr
//! u64 time_enabled
//! u64 time_running
//! { u64 value; u64 id; } [nr]
//! ```

use super::{CounterBackend, CounterError, CounterValue, EventSpec, GroupReading};

// read_format bits
pub const FORMAT_TOTAL_TIME_ENABLED: u64 = 1 << 0;
pub const FORMAT_TOTAL_TIME_RUNNING: u64 = 1 << 1;
pub const FORMAT_ID: u64 = 1 << 2;
pub const FORMAT_GROUP: u64 = 1 << 3;

pub const GROUP_READ_FORMAT: u64 =
    FORMAT_TOTAL_TIME_ENABLED | FORMAT_TOTAL_TIME_RUNNING | FORMAT_GROUP | FORMAT_ID;

/// u64 words preceding the `(value, id)` pairs in a group read.
const HEADER_WORDS: usize = 3;

/// Decode a group read buffer into a [`GroupReading`].
///
/// `words` is the prefix of the buffer the kernel actually filled.
pub fn parse_group_read(words: &[u64]) -> Result<GroupReading, CounterError> {
    if words.len() < HEADER_WORDS {
        return Err(CounterError::ShortRead);
    }
    let nr = words[0] as usize;
    let pairs = &words[HEADER_WORDS..];
    if pairs.len() < nr.saturating_mul(2) {
        return Err(CounterError::ShortRead);
    }
    let values = pairs
        .chunks_exact(2)
        .take(nr)
        .map(|pair| CounterValue {
            value: pair[0],
            id: pair[1],
        })
        .collect();
    Ok(GroupReading {
        time_enabled: words[1],
        time_running: words[2],
        values,
    })
}

#[cfg(target_os = "linux")]
mod sys {
    use super::super::{CounterError, EventSpec};
    use super::GROUP_READ_FORMAT;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

    const ATTR_SIZE_VER0: u32 = 64;

    const FLAG_DISABLED: u64 = 1 << 0;
    const FLAG_EXCLUDE_KERNEL: u64 = 1 << 5;
    const FLAG_EXCLUDE_HV: u64 = 1 << 6;

    const PERF_FLAG_FD_CLOEXEC: libc::c_ulong = 1 << 3;

    // _IO('$', n) and _IOR('$', 7, u64)
    pub const IOC_ENABLE: u64 = 0x2400;
    pub const IOC_DISABLE: u64 = 0x2401;
    pub const IOC_RESET: u64 = 0x2403;
    pub const IOC_ID: u64 = 0x8008_2407;
    pub const IOC_FLAG_GROUP: libc::c_ulong = 1;

    /// First-revision `perf_event_attr` layout (`PERF_ATTR_SIZE_VER0`).
    #[repr(C)]
    #[derive(Default)]
    struct PerfEventAttr {
        kind: u32,
        size: u32,
        config: u64,
        sample_period: u64,
        sample_type: u64,
        read_format: u64,
        flags: u64,
        wakeup_events: u32,
        bp_type: u32,
        config1: u64,
    }

    const _: () = assert!(std::mem::size_of::<PerfEventAttr>() == ATTR_SIZE_VER0 as usize);

    fn last_errno() -> i32 {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
    }

    fn classify(op: &'static str, errno: i32) -> CounterError {
        match errno {
            libc::EACCES | libc::EPERM => CounterError::PermissionDenied,
            libc::ENOENT | libc::ENODEV | libc::EOPNOTSUPP | libc::ENOSYS => {
                CounterError::Unsupported
            }
            libc::EMFILE | libc::ENFILE | libc::ENOSPC | libc::EBUSY => {
                CounterError::ResourceExhausted
            }
            _ => CounterError::Os { op, errno },
        }
    }

    /// Open one descriptor; `group` is the leader's fd, or -1 for the leader.
    pub fn open_event(spec: &EventSpec, group: RawFd) -> Result<OwnedFd, CounterError> {
        let leader = group < 0;
        let mut flags = FLAG_EXCLUDE_KERNEL | FLAG_EXCLUDE_HV;
        if leader {
            flags |= FLAG_DISABLED;
        }
        let attr = PerfEventAttr {
            kind: spec.kind.as_raw(),
            size: ATTR_SIZE_VER0,
            config: spec.config,
            read_format: GROUP_READ_FORMAT,
            flags,
            ..Default::default()
        };

        // pid 0 = this thread, cpu -1 = any cpu
        let fd = unsafe {
            libc::syscall(
                libc::SYS_perf_event_open,
                &attr as *const PerfEventAttr,
                0 as libc::pid_t,
                -1 as libc::c_int,
                group as libc::c_int,
                PERF_FLAG_FD_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(classify("perf_event_open", last_errno()));
        }
        Ok(unsafe { OwnedFd::from_raw_fd(fd as RawFd) })
    }

    pub fn event_id(fd: &OwnedFd) -> Result<u64, CounterError> {
        let mut id: u64 = 0;
        let rc = unsafe { libc::ioctl(fd.as_raw_fd(), IOC_ID as _, &mut id as *mut u64) };
        if rc < 0 {
            return Err(classify("PERF_EVENT_IOC_ID", last_errno()));
        }
        Ok(id)
    }

    pub fn group_ioctl(fd: &OwnedFd, request: u64, op: &'static str) -> Result<(), CounterError> {
        let rc = unsafe { libc::ioctl(fd.as_raw_fd(), request as _, IOC_FLAG_GROUP) };
        if rc < 0 {
            return Err(classify(op, last_errno()));
        }
        Ok(())
    }

    /// Read into `buf`, returning the number of whole words filled.
    pub fn read_words(fd: &OwnedFd, buf: &mut [u64]) -> Result<usize, CounterError> {
        let bytes = std::mem::size_of_val(buf);
        let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), bytes) };
        if n < 0 {
            return Err(classify("read", last_errno()));
        }
        Ok(n as usize / std::mem::size_of::<u64>())
    }
}

/// Counter group backed by `perf_event_open`.
///
/// Descriptors are closed when the backend is dropped.
#[derive(Default)]
pub struct PerfEventBackend {
    #[cfg(target_os = "linux")]
    leader: Option<std::os::fd::OwnedFd>,
    #[cfg(target_os = "linux")]
    members: Vec<std::os::fd::OwnedFd>,
    buf: Vec<u64>,
}

impl PerfEventBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(target_os = "linux")]
impl PerfEventBackend {
    fn leader(&self) -> Result<&std::os::fd::OwnedFd, CounterError> {
        self.leader.as_ref().ok_or(CounterError::NotOpen)
    }
}

#[cfg(target_os = "linux")]
impl CounterBackend for PerfEventBackend {
    fn open(&mut self, specs: &[EventSpec]) -> Result<Vec<u64>, CounterError> {
        use std::os::fd::AsRawFd;

        let (first, rest) = specs.split_first().ok_or(CounterError::NoEvents)?;
        let leader = sys::open_event(first, -1)?;
        let mut ids = vec![sys::event_id(&leader)?];

        let mut members = Vec::with_capacity(rest.len());
        for spec in rest {
            let fd = sys::open_event(spec, leader.as_raw_fd())?;
            ids.push(sys::event_id(&fd)?);
            members.push(fd);
        }

        self.buf = vec![0; HEADER_WORDS + 2 * specs.len()];
        self.leader = Some(leader);
        self.members = members;
        Ok(ids)
    }

    fn reset(&mut self) -> Result<(), CounterError> {
        sys::group_ioctl(self.leader()?, sys::IOC_RESET, "PERF_EVENT_IOC_RESET")
    }

    fn enable(&mut self) -> Result<(), CounterError> {
        sys::group_ioctl(self.leader()?, sys::IOC_ENABLE, "PERF_EVENT_IOC_ENABLE")
    }

    fn disable(&mut self) -> Result<(), CounterError> {
        sys::group_ioctl(self.leader()?, sys::IOC_DISABLE, "PERF_EVENT_IOC_DISABLE")
    }

    fn read(&mut self) -> Result<GroupReading, CounterError> {
        let leader = self.leader.as_ref().ok_or(CounterError::NotOpen)?;
        let filled = sys::read_words(leader, &mut self.buf)?;
        parse_group_read(&self.buf[..filled])
    }
}

#[cfg(not(target_os = "linux"))]
impl CounterBackend for PerfEventBackend {
    fn open(&mut self, _specs: &[EventSpec]) -> Result<Vec<u64>, CounterError> {
        Err(CounterError::Unsupported)
    }
    fn reset(&mut self) -> Result<(), CounterError> {
        Err(CounterError::NotOpen)
    }
    fn enable(&mut self) -> Result<(), CounterError> {
        Err(CounterError::NotOpen)
    }
    fn disable(&mut self) -> Result<(), CounterError> {
        Err(CounterError::NotOpen)
    }
    fn read(&mut self) -> Result<GroupReading, CounterError> {
        let _ = &self.buf;
        Err(CounterError::NotOpen)
    }
}

//! Hardware event descriptions for the counter group.
//!
//! An [`EventSpec`] is the `(type, config)` pair handed to
//! `perf_event_open`, plus the column name it is reported under.

use std::fmt;

/// `perf_event_attr.type` values used by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventKind {
    Hardware = 0,
    Software = 1,
    HwCache = 3,
    Raw = 4,
}

impl EventKind {
    pub const fn as_raw(self) -> u32 {
        self as u32
    }
}

// PERF_COUNT_HW_*
pub const HW_CPU_CYCLES: u64 = 0;
pub const HW_INSTRUCTIONS: u64 = 1;
pub const HW_CACHE_REFERENCES: u64 = 2;
pub const HW_CACHE_MISSES: u64 = 3;
pub const HW_BRANCH_INSTRUCTIONS: u64 = 4;
pub const HW_BRANCH_MISSES: u64 = 5;

/// Cache level selector for `PERF_TYPE_HW_CACHE` events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum CacheId {
    L1d = 0,
    L1i = 1,
    Ll = 2,
    Dtlb = 3,
    Itlb = 4,
    Bpu = 5,
    Node = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum CacheOp {
    Read = 0,
    Write = 1,
    Prefetch = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum CacheResult {
    Access = 0,
    Miss = 1,
}

/// Encode a hardware cache event: `id | op << 8 | result << 16`.
pub const fn hw_cache_config(id: CacheId, op: CacheOp, result: CacheResult) -> u64 {
    (id as u64) | ((op as u64) << 8) | ((result as u64) << 16)
}

/// One event requested from the counter group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventSpec {
    /// Column name in the output.
    pub name: String,
    pub kind: EventKind,
    pub config: u64,
}

/// Named events understood by [`EventSpec::parse`].
const CATALOGUE: &[(&str, EventKind, u64)] = &[
    ("cycles", EventKind::Hardware, HW_CPU_CYCLES),
    ("instructions", EventKind::Hardware, HW_INSTRUCTIONS),
    ("cache-references", EventKind::Hardware, HW_CACHE_REFERENCES),
    ("cache-misses", EventKind::Hardware, HW_CACHE_MISSES),
    ("branch-instructions", EventKind::Hardware, HW_BRANCH_INSTRUCTIONS),
    ("branch-misses", EventKind::Hardware, HW_BRANCH_MISSES),
    (
        "l1d-read-accesses",
        EventKind::HwCache,
        hw_cache_config(CacheId::L1d, CacheOp::Read, CacheResult::Access),
    ),
    (
        "l1d-read-misses",
        EventKind::HwCache,
        hw_cache_config(CacheId::L1d, CacheOp::Read, CacheResult::Miss),
    ),
    (
        "l1d-write-misses",
        EventKind::HwCache,
        hw_cache_config(CacheId::L1d, CacheOp::Write, CacheResult::Miss),
    ),
    (
        "llc-read-misses",
        EventKind::HwCache,
        hw_cache_config(CacheId::Ll, CacheOp::Read, CacheResult::Miss),
    ),
    (
        "dtlb-read-misses",
        EventKind::HwCache,
        hw_cache_config(CacheId::Dtlb, CacheOp::Read, CacheResult::Miss),
    ),
];

impl EventSpec {
    pub fn new(name: impl Into<String>, kind: EventKind, config: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            config,
        }
    }

    pub fn cpu_cycles() -> Self {
        Self::new("cycles", EventKind::Hardware, HW_CPU_CYCLES)
    }

    pub fn instructions() -> Self {
        Self::new("instructions", EventKind::Hardware, HW_INSTRUCTIONS)
    }

    pub fn cache_misses() -> Self {
        Self::new("cache-misses", EventKind::Hardware, HW_CACHE_MISSES)
    }

    pub fn l1d_read_misses() -> Self {
        Self::new(
            "l1d-read-misses",
            EventKind::HwCache,
            hw_cache_config(CacheId::L1d, CacheOp::Read, CacheResult::Miss),
        )
    }

    /// Parse a catalogue name or `raw:<hex>`.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        if let Some(code) = name.strip_prefix("raw:") {
            let code = code.trim_start_matches("0x");
            let config = u64::from_str_radix(code, 16).ok()?;
            return Some(Self::new(name.clone(), EventKind::Raw, config));
        }
        CATALOGUE
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|&(n, kind, config)| Self::new(n, kind, config))
    }

    /// Parse a comma-separated list. `none` or an empty string yields no events.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, String> {
        let trimmed = list.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Vec::new());
        }
        trimmed
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| Self::parse(s).ok_or_else(|| s.trim().to_string()))
            .collect()
    }

    /// Names accepted by [`EventSpec::parse`], for help output.
    pub fn known_names() -> impl Iterator<Item = &'static str> {
        CATALOGUE.iter().map(|(n, _, _)| *n)
    }
}

impl fmt::Display for EventSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}:{:#x})", self.name, self.kind, self.config)
    }
}

/// The cycles / L1d read misses / instructions triple.
pub fn default_events() -> Vec<EventSpec> {
    vec![
        EventSpec::cpu_cycles(),
        EventSpec::l1d_read_misses(),
        EventSpec::instructions(),
    ]
}

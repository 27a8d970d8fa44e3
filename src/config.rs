//! Run configuration.
//!
//! Everything that used to be a build-time variant (clock resolution,
//! counters on/off, which events) is a field here, resolved once at
//! startup from defaults and `MEMBENCH_*` environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::counters::{default_events, EventSpec};
use crate::measure::buffer::ELEMENT_BYTES;
use crate::utils::clock::Resolution;

/// Default CSV path when none is given on the command line.
pub const DEFAULT_OUTPUT: &str = "membench.csv";

/// Largest accepted iteration multiplier `K`.
pub const MAX_MULTIPLIER: usize = 1 << 16;

/// Configuration options for a sweep.
#[derive(Clone, Debug)]
pub struct Config {
    /// CSV destination (default: `membench.csv`).
    pub output: PathBuf,
    /// Smallest working set in bytes (default: 4 KiB).
    pub min_size_bytes: usize,
    /// Largest working set in bytes (default: 16 MiB).
    pub max_size_bytes: usize,
    /// `K`: each repetition runs `K * stride` passes (default: 10).
    pub multiplier: usize,
    /// `T`: minimum wall time of the calibrated access loop (default: 1 s).
    pub sample_interval: Duration,
    /// Clock resolution for the whole run (default: nanoseconds).
    pub resolution: Resolution,
    /// Hardware events, in output column order. Empty disables counters.
    pub events: Vec<EventSpec>,
    /// Extrapolate multiplexed counter values (default: true).
    pub scale_multiplexed: bool,
    /// Pin the sweep to its current CPU core (default: true).
    pub pin_cpu: bool,
    /// Seed for the working-set contents.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            min_size_bytes: 4 << 10,
            max_size_bytes: 16 << 20,
            multiplier: 10,
            sample_interval: Duration::from_secs(1),
            resolution: Resolution::Nanos,
            events: default_events(),
            scale_multiplexed: true,
            pin_cpu: true,
            seed: 0xDEAD_BEEF,
        }
    }
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue { key: &'static str, value: String },
    /// Unknown hardware event name.
    UnknownEvent(String),
    /// Size bounds are not powers of two, too small, or inverted.
    SizeBounds { min: usize, max: usize },
    /// Multiplier or interval is zero.
    Zero(&'static str),
    /// A value exceeds its upper bound.
    TooLarge {
        what: &'static str,
        value: usize,
        max: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => {
                write!(f, "{}: cannot parse {:?}", key, value)
            }
            ConfigError::UnknownEvent(name) => {
                let known: Vec<&str> = EventSpec::known_names().collect();
                write!(
                    f,
                    "unknown event {:?} (known: {}, raw:<hex>)",
                    name,
                    known.join(", ")
                )
            }
            ConfigError::SizeBounds { min, max } => write!(
                f,
                "size bounds must be powers of two with {} <= min <= max (got min={}, max={})",
                2 * ELEMENT_BYTES,
                min,
                max
            ),
            ConfigError::Zero(what) => write!(f, "{} must be greater than zero", what),
            ConfigError::TooLarge { what, value, max } => {
                write!(f, "{} {} exceeds the maximum of {}", what, value, max)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Defaults overlaid with `MEMBENCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("MEMBENCH_MIN_SIZE") {
            config.min_size_bytes = parse_size(&v).ok_or_else(|| invalid("MEMBENCH_MIN_SIZE", &v))?;
        }
        if let Some(v) = lookup("MEMBENCH_MAX_SIZE") {
            config.max_size_bytes = parse_size(&v).ok_or_else(|| invalid("MEMBENCH_MAX_SIZE", &v))?;
        }
        if let Some(v) = lookup("MEMBENCH_MULTIPLIER") {
            config.multiplier = v.trim().parse().map_err(|_| invalid("MEMBENCH_MULTIPLIER", &v))?;
        }
        if let Some(v) = lookup("MEMBENCH_INTERVAL_MS") {
            let ms: u64 = v.trim().parse().map_err(|_| invalid("MEMBENCH_INTERVAL_MS", &v))?;
            config.sample_interval = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("MEMBENCH_RESOLUTION") {
            config.resolution = Resolution::parse(&v).ok_or_else(|| invalid("MEMBENCH_RESOLUTION", &v))?;
        }
        if let Some(v) = lookup("MEMBENCH_EVENTS") {
            config.events = EventSpec::parse_list(&v).map_err(ConfigError::UnknownEvent)?;
        }
        if let Some(v) = lookup("MEMBENCH_SCALE") {
            config.scale_multiplexed = parse_bool(&v).ok_or_else(|| invalid("MEMBENCH_SCALE", &v))?;
        }
        if let Some(v) = lookup("MEMBENCH_PIN") {
            config.pin_cpu = parse_bool(&v).ok_or_else(|| invalid("MEMBENCH_PIN", &v))?;
        }
        if let Some(v) = lookup("MEMBENCH_SEED") {
            config.seed = v.trim().parse().map_err(|_| invalid("MEMBENCH_SEED", &v))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the sweep relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.min_size_bytes, self.max_size_bytes);
        if !min.is_power_of_two() || !max.is_power_of_two() || min < 2 * ELEMENT_BYTES || min > max
        {
            return Err(ConfigError::SizeBounds { min, max });
        }
        if self.multiplier == 0 {
            return Err(ConfigError::Zero("iteration multiplier"));
        }
        // K * largest stride must fit, and so must the accesses of one repetition
        let largest_stride = self.max_elems() / 2;
        let per_step = self
            .multiplier
            .checked_mul(largest_stride)
            .and_then(|passes| passes.checked_mul(self.max_elems()));
        if self.multiplier > MAX_MULTIPLIER || per_step.is_none() {
            return Err(ConfigError::TooLarge {
                what: "iteration multiplier",
                value: self.multiplier,
                max: MAX_MULTIPLIER,
            });
        }
        if self.sample_interval.is_zero() {
            return Err(ConfigError::Zero("sample interval"));
        }
        Ok(())
    }

    /// Whether counters should be probed at all.
    pub fn counters_requested(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn min_elems(&self) -> usize {
        self.min_size_bytes / ELEMENT_BYTES
    }

    pub fn max_elems(&self) -> usize {
        self.max_size_bytes / ELEMENT_BYTES
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

/// Parse a byte count with an optional `K`/`M`/`G` (or `KiB`/`MiB`/`GiB`) suffix.
pub fn parse_size(s: &str) -> Option<usize> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    let (digits, shift) = [("GIB", 30), ("MIB", 20), ("KIB", 10), ("G", 30), ("M", 20), ("K", 10), ("B", 0)]
        .iter()
        .find_map(|&(suffix, shift)| upper.strip_suffix(suffix).map(|d| (d.trim().to_string(), shift)))
        .unwrap_or_else(|| (upper.clone(), 0));
    let n: usize = digits.parse().ok()?;
    n.checked_mul(1usize.checked_shl(shift)?)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

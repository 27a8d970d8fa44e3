//! Wires configuration, clock, counters and output into one run.

use std::path::PathBuf;

use crate::config::Config;
use crate::counters::{system_backend, CounterBackend, CounterGroup};
use crate::error::MembenchError;
use crate::sweep::{SampleSink, Sweep, SweepSummary};
use crate::utils::clock::{Clock, MonotonicClock};
use crate::utils::csv::CsvSink;
use crate::utils::tui::{self, ReportingSink};

/// What the command line asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Run a sweep, optionally overriding the output path.
    Run(Option<PathBuf>),
}

/// Interpret the arguments after the program name.
///
/// At most one argument is accepted: `--help`/`-h` or an output path.
pub fn parse_args(args: &[String]) -> Result<Command, MembenchError> {
    match args {
        [] => Ok(Command::Run(None)),
        [arg] if arg == "--help" || arg == "-h" => Ok(Command::Help),
        [path] => Ok(Command::Run(Some(PathBuf::from(path)))),
        _ => Err(MembenchError::Usage(format!(
            "expected at most one output path, got {} arguments",
            args.len()
        ))),
    }
}

/// Try to open the configured counter group on `backend`.
///
/// Failure is never fatal: the run continues with timing columns only.
pub fn probe_counters<B: CounterBackend>(backend: B, config: &Config) -> Option<CounterGroup<B>> {
    if !config.counters_requested() {
        log::info!("hardware counters disabled by configuration");
        return None;
    }
    match CounterGroup::open(backend, &config.events) {
        Ok(group) => {
            log::info!("hardware counters enabled: {}", group.names().join(", "));
            Some(group)
        }
        Err(err) => {
            log::warn!("hardware counters unavailable ({}); recording timing only", err);
            None
        }
    }
}

/// Run a sweep with explicit parts.
pub fn run_with<C, B, S>(
    config: &Config,
    clock: C,
    counters: Option<CounterGroup<B>>,
    sink: &mut S,
) -> Result<SweepSummary, MembenchError>
where
    C: Clock,
    B: CounterBackend,
    S: SampleSink + ?Sized,
{
    let mut sweep = Sweep::new(config, clock, counters)?;
    log::info!(
        "sweeping {} pairs from {} to {} bytes",
        sweep.plan().len(),
        config.min_size_bytes,
        config.max_size_bytes
    );
    sweep.run(sink)
}

/// Full run against the real clock and counters, writing `config.output`.
///
/// The output file is created before anything is measured so a bad path
/// fails immediately.
pub fn run(config: &Config) -> Result<SweepSummary, MembenchError> {
    config.validate()?;
    let csv = CsvSink::create(&config.output)?;
    let counters = probe_counters(system_backend(), config);
    let columns = counters.as_ref().map(|g| g.names()).unwrap_or_default();

    tui::print_config_box(config, &config.output, &columns);

    let clock = MonotonicClock::new(config.resolution);
    let mut sink = ReportingSink::new(csv);
    run_with(config, clock, counters, &mut sink)
}

//! Text User Interface (TUI) utilities.
//!
//! Handles formatted output for the CLI. Nothing here is written to the
//! CSV; it only goes to stdout.

use std::io;
use std::path::Path;

use terminal_size::{terminal_size, Width};

use crate::config::Config;
use crate::sweep::{Sample, SampleSink, SweepSummary};

/// Current terminal width, constrained to a reasonable range.
fn get_term_width() -> usize {
    if let Some((Width(w), _)) = terminal_size() {
        (w as usize).clamp(40, 200)
    } else {
        80
    }
}

/// Truncate string with ellipsis if it exceeds width (character-wise).
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut result: String = s.chars().take(width.saturating_sub(3)).collect();
        result.push_str("...");
        result
    }
}

/// Human-readable byte count: `512 B`, `4 KiB`, `16 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes;
    let mut unit = 0;
    while unit + 1 < UNITS.len() && value >= 1024 && value % 1024 == 0 {
        value /= 1024;
        unit += 1;
    }
    format!("{} {}", value, UNITS[unit])
}

/// Print the application header.
pub fn print_header() {
    let term_width = get_term_width().min(80);
    let title = " membench: memory hierarchy latency ";
    let padding = term_width.saturating_sub(title.len() + 2) / 2;
    let right_padding = term_width.saturating_sub(padding + title.len());

    let border = "═".repeat(term_width);

    println!("╔{}╗", border);
    println!(
        "║{}{}{}║",
        " ".repeat(padding),
        title,
        " ".repeat(right_padding)
    );
    println!("╚{}╝", border);
    println!();
}

/// Print the usage message.
pub fn print_help(program: &str) {
    println!("Usage: {} [OUTPUT.csv]", program);
    println!();
    println!("Writes one row per (size, stride) pair to OUTPUT.csv (default: membench.csv).");
    println!();
    println!("Environment:");
    println!("  MEMBENCH_MIN_SIZE     smallest working set, e.g. 4K (default: 4K)");
    println!("  MEMBENCH_MAX_SIZE     largest working set, e.g. 64M (default: 16M)");
    println!("  MEMBENCH_MULTIPLIER   passes per repetition per stride element (default: 10)");
    println!("  MEMBENCH_INTERVAL_MS  minimum timed interval per pair (default: 1000)");
    println!("  MEMBENCH_RESOLUTION   ns | us (default: ns)");
    println!("  MEMBENCH_EVENTS       comma-separated events, or none");
    println!("  MEMBENCH_SCALE        scale multiplexed counters (default: on)");
    println!("  MEMBENCH_PIN          pin to the current CPU (default: on)");
    println!("  MEMBENCH_SEED         working-set fill seed");
    println!("  RUST_LOG              log filter (default: info)");
}

/// Print the run parameters in a box.
pub fn print_config_box(config: &Config, output: &Path, counter_columns: &[String]) {
    let term_width = get_term_width();
    let max_content_width = term_width.saturating_sub(4).max(40);

    let counters = if counter_columns.is_empty() {
        "disabled".to_string()
    } else {
        counter_columns.join(", ")
    };
    let lines = [
        format!("Output:   {}", output.display()),
        format!(
            "Sizes:    {} .. {}",
            format_size(config.min_size_bytes as u64),
            format_size(config.max_size_bytes as u64)
        ),
        format!(
            "Timing:   K={}  T={:?}  clock={}",
            config.multiplier,
            config.sample_interval,
            config.resolution.unit_name()
        ),
        format!("Counters: {}", counters),
    ];

    let content_width = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(60)
        .min(max_content_width);
    let border = "─".repeat(content_width + 2);

    println!("┌{}┐", border);
    for line in &lines {
        println!(
            "│ {:<width$} │",
            truncate(line, content_width),
            width = content_width
        );
    }
    println!("└{}┘", border);
    println!();
}

/// One progress line for a finished pair.
pub fn progress_line(sample: &Sample, counter_columns: &[String]) -> String {
    let mut line = format!(
        "  {:>10} stride {:>10} {:>12.4} ns",
        format_size(sample.size_bytes),
        format_size(sample.stride_bytes),
        sample.latency_ns
    );
    if let Some(values) = &sample.counters {
        for (name, value) in counter_columns.iter().zip(values) {
            line.push_str(&format!("  {}={}", name, value));
        }
    }
    if sample.is_anomalous() {
        line.push_str("  (!)");
    }
    line
}

/// Forwards samples to another sink and prints a progress line for each.
pub struct ReportingSink<S> {
    inner: S,
    columns: Vec<String>,
    quiet: bool,
    last_size: Option<u64>,
}

impl<S: SampleSink> ReportingSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            columns: Vec::new(),
            quiet: false,
            last_size: None,
        }
    }

    /// Forward only, print nothing.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: SampleSink> SampleSink for ReportingSink<S> {
    fn begin(&mut self, counter_columns: &[String]) -> io::Result<()> {
        self.columns = counter_columns.to_vec();
        self.inner.begin(counter_columns)
    }

    fn emit(&mut self, sample: &Sample) -> io::Result<()> {
        self.inner.emit(sample)?;
        if !self.quiet {
            if self.last_size.is_some_and(|s| s != sample.size_bytes) {
                println!();
            }
            println!("{}", progress_line(sample, &self.columns));
        }
        self.last_size = Some(sample.size_bytes);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.finish()
    }
}

/// Print the end-of-run summary.
pub fn print_summary(summary: &SweepSummary, output: &Path) {
    let term_width = get_term_width().min(80);
    println!();
    println!("{}", "─".repeat(term_width));
    println!(
        "  {} samples in {:.1?} written to {}",
        summary.samples,
        summary.elapsed,
        output.display()
    );
    if summary.anomalies > 0 {
        println!(
            "  {} sample(s) had non-positive latency and are unreliable",
            summary.anomalies
        );
    }
    if summary.counters_lost {
        println!("  hardware counters stopped partway; later rows have empty counter cells");
    } else if !summary.counters_active {
        println!("  hardware counters were not available; timing only");
    }
    println!();
}

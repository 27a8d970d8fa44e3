//! CSV export of sweep samples.
//!
//! Header `size,stride,time` plus one column per counter; each row is
//! flushed as soon as it is written so an interrupted sweep keeps every
//! finished pair.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::MembenchError;
use crate::sweep::{Sample, SampleSink};

/// Mandatory leading columns.
pub const BASE_COLUMNS: [&str; 3] = ["size", "stride", "time"];

/// [`SampleSink`] writing comma-separated rows to any writer.
pub struct CsvSink<W: Write> {
    writer: W,
    counter_columns: usize,
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) `path`.
    pub fn create(path: &Path) -> Result<Self, MembenchError> {
        let file = File::create(path).map_err(|source| MembenchError::Output {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            counter_columns: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Header line for the given counter columns.
pub fn header_line(counter_columns: &[String]) -> String {
    BASE_COLUMNS
        .iter()
        .copied()
        .chain(counter_columns.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(",")
}

/// Data line for `sample`, padded or cut to `counter_columns` counter cells.
pub fn row_line(sample: &Sample, counter_columns: usize) -> String {
    let mut line = format!(
        "{},{},{:.4}",
        sample.size_bytes, sample.stride_bytes, sample.latency_ns
    );
    let values = sample.counters.as_deref().unwrap_or(&[]);
    for i in 0..counter_columns {
        line.push(',');
        if let Some(v) = values.get(i) {
            line.push_str(&v.to_string());
        }
    }
    line
}

impl<W: Write> SampleSink for CsvSink<W> {
    fn begin(&mut self, counter_columns: &[String]) -> io::Result<()> {
        self.counter_columns = counter_columns.len();
        writeln!(self.writer, "{}", header_line(counter_columns))?;
        self.writer.flush()
    }

    fn emit(&mut self, sample: &Sample) -> io::Result<()> {
        writeln!(self.writer, "{}", row_line(sample, self.counter_columns))?;
        self.writer.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

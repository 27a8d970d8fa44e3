use super::*;
use crate::counters::stub::{ReadOrder, StubBackend};
use crate::counters::{CounterError, EventSpec};
use crate::utils::clock::{ScriptedClock, StepClock};
use crate::utils::csv::CsvSink;

fn small_config() -> Config {
    Config {
        min_size_bytes: 8,
        max_size_bytes: 64,
        multiplier: 1,
        sample_interval: Duration::from_nanos(30),
        pin_cpu: false,
        ..Config::default()
    }
}

fn events() -> Vec<EventSpec> {
    vec![EventSpec::cpu_cycles(), EventSpec::instructions()]
}

fn no_counters() -> Option<CounterGroup<StubBackend>> {
    None
}

#[test]
fn test_invalid_config_is_rejected_not_panicking() {
    let bad_bounds = Config {
        min_size_bytes: 48,
        ..small_config()
    };
    let err = Sweep::new(&bad_bounds, StepClock::new(10), no_counters()).err();
    assert!(matches!(err, Some(ConfigError::SizeBounds { .. })));

    let huge_multiplier = Config {
        multiplier: usize::MAX,
        ..small_config()
    };
    let err = Sweep::new(&huge_multiplier, StepClock::new(10), no_counters()).err();
    assert!(matches!(err, Some(ConfigError::TooLarge { .. })));
}

#[test]
fn test_visits_each_size_once_in_order() {
    let config = small_config();
    let mut sweep = Sweep::new(&config, StepClock::new(10), no_counters()).unwrap();
    let mut samples: Vec<Sample> = Vec::new();
    sweep.run(&mut samples).unwrap();

    let mut sizes: Vec<u64> = samples.iter().map(|s| s.size_bytes).collect();
    sizes.dedup();
    // log2(16 / 2) + 1 sizes, in bytes
    assert_eq!(sizes, vec![8, 16, 32, 64]);
    for size in &sizes {
        let strides: Vec<u64> = samples
            .iter()
            .filter(|s| s.size_bytes == *size)
            .map(|s| s.stride_bytes)
            .collect();
        let expected: Vec<u64> = std::iter::successors(Some(4u64), |s| Some(s * 2))
            .take_while(|s| *s <= size / 2)
            .collect();
        assert_eq!(strides, expected, "strides for size {}", size);
    }
    assert_eq!(samples.len(), sweep.plan().len());
}

#[test]
fn test_open_failure_gives_three_columns() {
    let opened = CounterGroup::open(
        StubBackend::new().failing_open(CounterError::PermissionDenied),
        &events(),
    );
    assert!(opened.is_err());

    let config = small_config();
    let mut sweep = Sweep::new(&config, StepClock::new(10), opened.ok()).unwrap();
    let mut sink = CsvSink::new(Vec::new());
    let summary = sweep.run(&mut sink).unwrap();
    assert!(!summary.counters_active);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("size,stride,time"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), summary.samples);
    for row in rows {
        assert_eq!(row.split(',').count(), 3, "ragged row {:?}", row);
    }
}

#[test]
fn test_counters_are_reported_in_declaration_order() {
    let backend = StubBackend::new().with_order(ReadOrder::Reversed);
    let group = CounterGroup::open(backend, &events()).unwrap();
    let config = small_config();
    let mut sweep = Sweep::new(&config, StepClock::new(10), Some(group)).unwrap();
    assert_eq!(sweep.counter_columns(), vec!["cycles", "instructions"]);

    let mut samples: Vec<Sample> = Vec::new();
    let summary = sweep.run(&mut samples).unwrap();
    assert!(summary.counters_active);
    assert!(!summary.counters_lost);

    for (read, sample) in samples.iter().enumerate() {
        assert_eq!(
            sample.counters,
            Some(vec![
                StubBackend::value_for(0, read),
                StubBackend::value_for(1, read)
            ])
        );
    }
}

#[test]
fn test_counter_loss_mid_run_keeps_columns() {
    let backend = StubBackend::new().failing_read_after(2);
    let group = CounterGroup::open(backend, &events()).unwrap();
    let config = small_config();
    let mut sweep = Sweep::new(&config, StepClock::new(10), Some(group)).unwrap();
    let mut sink = CsvSink::new(Vec::new());

    let summary = sweep.run(&mut sink).unwrap();
    assert!(summary.counters_active);
    assert!(summary.counters_lost);
    assert!(!sweep.counters_active());

    let text = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "size,stride,time,cycles,instructions");
    for row in &lines[1..] {
        assert_eq!(row.split(',').count(), 5, "ragged row {:?}", row);
    }
    assert!(!lines[1].ends_with(",,"));
    assert!(!lines[2].ends_with(",,"));
    assert!(lines[3..].iter().all(|row| row.ends_with(",,")));
}

#[test]
fn test_non_positive_latency_is_emitted() {
    // StepClock charges both phases the same, so every latency is exactly 0.
    let config = small_config();
    let mut sweep = Sweep::new(&config, StepClock::new(10), no_counters()).unwrap();
    let mut samples: Vec<Sample> = Vec::new();
    let summary = sweep.run(&mut samples).unwrap();

    assert_eq!(summary.samples, samples.len());
    assert_eq!(summary.anomalies, samples.len());
    assert!(samples.iter().all(|s| s.latency_ns == 0.0));
}

#[test]
fn test_negative_latency_is_not_clamped() {
    // Phase A: 0 -> 100 (one step). Phase B: 1000 -> 1500.
    let config = Config {
        min_size_bytes: 8,
        max_size_bytes: 8,
        sample_interval: Duration::from_nanos(50),
        ..small_config()
    };
    let clock = ScriptedClock::new(vec![0, 100, 1_000, 1_500]);
    let mut sweep = Sweep::new(&config, clock, no_counters()).unwrap();
    let mut samples: Vec<Sample> = Vec::new();
    sweep.run(&mut samples).unwrap();

    assert_eq!(samples.len(), 1);
    // size 2, stride 1: limit 2, two accesses per pass, one pass per step
    assert_eq!(samples[0].latency_ns, -200.0);
    assert!(samples[0].is_anomalous());
}

#[test]
fn test_two_runs_give_identical_samples() {
    let config = small_config();
    let run = || {
        let group = CounterGroup::open(StubBackend::new(), &events()).unwrap();
        let mut sweep = Sweep::new(&config, StepClock::new(10), Some(group)).unwrap();
        let mut samples: Vec<Sample> = Vec::new();
        sweep.run(&mut samples).unwrap();
        samples
    };
    let first = run();
    let second = run();
    let pairs = |s: &[Sample]| -> Vec<(u64, u64)> {
        s.iter().map(|x| (x.size_bytes, x.stride_bytes)).collect()
    };
    assert_eq!(pairs(&first), pairs(&second));
    assert_eq!(first, second);
}

struct BrokenSink {
    accepted: usize,
}

impl SampleSink for BrokenSink {
    fn begin(&mut self, _counter_columns: &[String]) -> io::Result<()> {
        Ok(())
    }

    fn emit(&mut self, _sample: &Sample) -> io::Result<()> {
        if self.accepted == 3 {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        self.accepted += 1;
        Ok(())
    }
}

#[test]
fn test_sink_failure_stops_the_sweep() {
    let config = small_config();
    let mut sweep = Sweep::new(&config, StepClock::new(10), no_counters()).unwrap();
    let mut sink = BrokenSink { accepted: 0 };
    let err = sweep.run(&mut sink).unwrap_err();
    assert!(matches!(err, MembenchError::Sink(_)));
    assert_eq!(sink.accepted, 3);
}

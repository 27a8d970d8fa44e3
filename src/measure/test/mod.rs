use super::kernel::accesses_per_pass;
use super::*;
use crate::counters::stub::StubBackend;
use crate::counters::{CounterGroup, EventSpec};
use crate::utils::clock::{ScriptedClock, StepClock};

fn params(multiplier: usize, threshold_ticks: u64) -> MeasureParams {
    MeasureParams {
        multiplier,
        threshold_ticks,
    }
}

#[test]
fn test_net_latency_known_value() {
    assert_eq!(net_latency(1_000_000, 200_000, 10, 100), 800.0);
}

#[test]
fn test_net_latency_is_not_clamped() {
    assert_eq!(net_latency(200, 200, 1, 10), 0.0);
    assert!(net_latency(100, 300, 2, 10) < 0.0);
    assert_eq!(net_latency(100, 300, 2, 10), -10.0);
}

#[test]
fn test_net_latency_degenerate_counts() {
    assert_eq!(net_latency(100, 0, 0, 10), 0.0);
    assert_eq!(net_latency(100, 0, 1, 0), 0.0);
}

#[test]
fn test_scripted_calibration() {
    // Phase A: start 0, after rep 1 -> 400 (< 1000), after rep 2 -> 1200 (stop).
    // Phase B: start 5000, after rep 1 -> 5100, after rep 2 -> 5200.
    let clock = ScriptedClock::new(vec![0, 400, 1200, 5000, 5100, 5200]);
    let mut cal = Calibrator::new(clock, params(10, 1_000));
    let mut data = vec![0i32; 8];

    let m = cal.measure_timing(&mut data, 8, 2);

    assert_eq!(m.steps, 2);
    assert_eq!(m.elapsed_a, 1_200);
    assert_eq!(m.elapsed_b, 200);
    assert_eq!(m.limit, 7);
    assert_eq!(m.accesses_per_pass, 4);
    assert_eq!(m.passes_per_step, 20);
    assert_eq!(m.accesses_per_step(), 80);
    assert_eq!(m.net_ticks_per_access(), 6.25);
    assert_eq!(m.latency_ns(), 6.25);
    assert!(!m.is_anomalous());
}

#[test]
fn test_phase_b_repeats_exactly_phase_a_steps() {
    // Five Phase A reps before crossing the threshold.
    let clock = ScriptedClock::new(vec![0, 10, 20, 30, 40, 50, 100, 101, 102, 103, 104, 105]);
    let mut cal = Calibrator::new(clock, params(1, 50));
    let mut data = vec![0i32; 4];

    let m = cal.measure_timing(&mut data, 4, 1);

    assert_eq!(m.steps, 5);
    // one start reading plus one per repetition, in each phase
    assert_eq!(cal.clock_mut().reads(), 2 * (1 + 5));
    assert_eq!(m.elapsed_b, 5);
}

#[test]
fn test_data_touched_steps_times_passes() {
    let mut cal = Calibrator::new(StepClock::new(10), params(3, 25));
    let size = 16;
    let stride = 4;
    let mut data = vec![0i32; size];

    let m = cal.measure_timing(&mut data, size, stride);

    // StepClock(10) crosses 25 on the third repetition
    assert_eq!(m.steps, 3);
    let per_offset = (m.steps as usize * m.passes_per_step) as i32;
    for (i, &v) in data.iter().enumerate() {
        let expected = if i % stride == 0 && i < m.limit { per_offset } else { 0 };
        assert_eq!(v, expected, "element {}", i);
    }
}

#[test]
fn test_zero_threshold_still_runs_once() {
    let mut cal = Calibrator::new(StepClock::new(0), params(1, 0));
    let mut data = vec![0i32; 2];
    let m = cal.measure_timing(&mut data, 2, 1);
    assert_eq!(m.steps, 1);
    assert_eq!(data, vec![1, 1]);
}

#[test]
fn test_reference_slower_than_access_is_anomalous() {
    let clock = ScriptedClock::new(vec![0, 100, 1_000, 1_500]);
    let mut cal = Calibrator::new(clock, params(1, 50));
    let mut data = vec![0i32; 4];

    let m = cal.measure_timing(&mut data, 4, 2);

    assert_eq!(m.elapsed_a, 100);
    assert_eq!(m.elapsed_b, 500);
    assert!(m.is_anomalous());
    assert!(m.latency_ns() < 0.0);
}

#[test]
fn test_step_clock_cancels_to_zero() {
    // Identical clock cost in both phases -> zero net latency, flagged.
    let mut cal = Calibrator::new(StepClock::new(7), params(2, 30));
    let mut data = vec![0i32; 32];
    let m = cal.measure_timing(&mut data, 32, 8);
    assert_eq!(m.elapsed_a, m.elapsed_b);
    assert_eq!(m.latency_ns(), 0.0);
    assert!(m.is_anomalous());
}

#[test]
fn test_microsecond_ticks_convert_to_nanos() {
    let clock = MicroScripted(ScriptedClock::new(vec![0, 20, 100, 110]));
    let mut micro = Calibrator::new(clock, params(1, 10));
    let mut data = vec![0i32; 4];
    let m = micro.measure_timing(&mut data, 4, 2);
    // accesses per step: limit 3, stride 2 -> 2 offsets, 2 passes -> 4
    assert_eq!(m.accesses_per_step(), 4);
    assert_eq!(m.net_ticks_per_access(), 2.5);
    assert_eq!(m.latency_ns(), 2_500.0);
}

struct MicroScripted(ScriptedClock);

impl Clock for MicroScripted {
    fn now(&mut self) -> u64 {
        self.0.now()
    }
    fn resolution(&self) -> Resolution {
        Resolution::Micros
    }
}

#[test]
fn test_phase_sequence_ends_emitted() {
    let mut cal = Calibrator::new(StepClock::new(1), params(1, 3));
    assert_eq!(cal.phase(), Phase::Idle);
    let mut data = vec![0i32; 8];
    cal.measure_timing(&mut data, 8, 1);
    assert_eq!(cal.phase(), Phase::Emitted);
    cal.measure_timing(&mut data, 8, 4);
    assert_eq!(cal.phase(), Phase::Emitted);
}

#[test]
fn test_counters_bracket_phase_a() {
    let events = [EventSpec::cpu_cycles(), EventSpec::instructions()];
    let mut group = CounterGroup::open(StubBackend::new(), &events).unwrap();
    let mut cal = Calibrator::new(StepClock::new(5), params(1, 10));
    let mut data = vec![0i32; 8];

    let m = cal.measure(&mut data, 8, 2, Some(&mut group));

    match m.counters {
        CounterOutcome::Values(ref snapshot) => {
            assert_eq!(
                snapshot.values,
                vec![StubBackend::value_for(0, 0), StubBackend::value_for(1, 0)]
            );
        }
        ref other => panic!("expected counter values, got {:?}", other),
    }
    assert_eq!(group.backend().reads(), 1);
    assert_eq!(group.backend().resets(), 1);
}

#[test]
fn test_counter_failure_does_not_lose_timing() {
    let backend = StubBackend::new().failing_read_after(0);
    let mut group = CounterGroup::open(backend, &[EventSpec::cpu_cycles()]).unwrap();
    let mut cal = Calibrator::new(StepClock::new(5), params(1, 10));
    let mut data = vec![0i32; 8];

    let m = cal.measure(&mut data, 8, 2, Some(&mut group));

    assert!(matches!(m.counters, CounterOutcome::Failed(_)));
    assert_eq!(m.steps, 2);
}

#[test]
#[should_panic]
fn test_stride_above_half_size_panics() {
    let mut cal = Calibrator::new(StepClock::new(1), params(1, 1));
    let mut data = vec![0i32; 8];
    cal.measure_timing(&mut data, 8, 8);
}

#[test]
fn test_accesses_match_spec_formula() {
    for size in [2usize, 4, 8, 64, 1024] {
        let mut stride = 1;
        while stride <= size / 2 {
            let limit = size - stride + 1;
            assert_eq!(accesses_per_pass(limit, stride), limit.div_ceil(stride));
            stride *= 2;
        }
    }
}

#[test]
#[should_panic(expected = "overflows")]
fn test_multiplier_times_stride_overflow_panics() {
    let mut cal = Calibrator::new(StepClock::new(1), params(usize::MAX, 1));
    let mut data = vec![0i32; 8];
    cal.measure_timing(&mut data, 8, 2);
}

// Timing-sensitive: only meaningful with optimisations on.
#[cfg(not(debug_assertions))]
#[test]
fn test_reference_loop_is_not_the_dominant_cost() {
    use crate::utils::clock::MonotonicClock;

    // 4 KiB: resident in L1 on anything current
    let size = 1024;
    let mut data = vec![0i32; size];
    for stride in [1usize, 4, 16, 64] {
        let clock = MonotonicClock::new(Resolution::Nanos);
        let mut cal = Calibrator::new(clock, params(10, 20_000_000));
        let m = cal.measure_timing(&mut data, size, stride);
        assert!(
            m.elapsed_b as f64 <= m.elapsed_a as f64 * 1.25,
            "stride {}: reference loop {} ns vs access loop {} ns over {} steps",
            stride,
            m.elapsed_b,
            m.elapsed_a,
            m.steps
        );
    }
}

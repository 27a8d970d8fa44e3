use super::stub::{ReadOrder, StubBackend};
use super::{CounterError, CounterGroup, EventSpec, GroupReading};
use crate::counters::CounterValue;

fn three_events() -> Vec<EventSpec> {
    vec![
        EventSpec::cpu_cycles(),
        EventSpec::l1d_read_misses(),
        EventSpec::instructions(),
    ]
}

fn expected_first_read(n: usize) -> Vec<u64> {
    (0..n).map(|i| StubBackend::value_for(i, 0)).collect()
}

#[test]
fn test_reversed_read_is_matched_by_id() {
    let backend = StubBackend::new().with_order(ReadOrder::Reversed);
    let mut group = CounterGroup::open(backend, &three_events()).unwrap();

    // The raw read really is reversed...
    let raw = group.read().unwrap();
    assert_eq!(raw.values[0].id, StubBackend::id_for(2));

    // ...and the resolved snapshot is in declaration order regardless.
    let resolved = group.resolve(&raw).unwrap();
    assert_eq!(resolved.values, expected_first_read(3));
}

#[test]
fn test_rotated_reads_match_for_every_offset() {
    for offset in 0..4 {
        let backend = StubBackend::new().with_order(ReadOrder::Rotated(offset));
        let mut group = CounterGroup::open(backend, &three_events()).unwrap();
        let snapshot = group.read_values().unwrap();
        assert_eq!(
            snapshot.values,
            expected_first_read(3),
            "rotation {} mismatched",
            offset
        );
    }
}

#[test]
fn test_slot_index_would_be_wrong() {
    let backend = StubBackend::new().with_order(ReadOrder::Reversed);
    let mut group = CounterGroup::open(backend, &three_events()).unwrap();
    let raw = group.read().unwrap();
    let by_slot: Vec<u64> = raw.values.iter().map(|v| v.value).collect();
    assert_ne!(by_slot, expected_first_read(3));
}

#[test]
fn test_missing_id_is_an_error() {
    let backend = StubBackend::new().dropping(1);
    let mut group = CounterGroup::open(backend, &three_events()).unwrap();
    assert_eq!(
        group.read_values(),
        Err(CounterError::MissingId(StubBackend::id_for(1)))
    );
}

#[test]
fn test_resolve_handcrafted_reading() {
    let backend = StubBackend::new();
    let group = CounterGroup::open(backend, &three_events()).unwrap();
    let ids = group.ids().to_vec();
    let reading = GroupReading {
        time_enabled: 10,
        time_running: 10,
        values: vec![
            CounterValue { id: ids[2], value: 3 },
            CounterValue { id: ids[0], value: 1 },
            CounterValue { id: ids[1], value: 2 },
        ],
    };
    assert_eq!(group.resolve(&reading).unwrap().values, vec![1, 2, 3]);
}

#[test]
fn test_open_failure_propagates() {
    let backend = StubBackend::new().failing_open(CounterError::PermissionDenied);
    let result = CounterGroup::open(backend, &three_events());
    assert!(matches!(result, Err(CounterError::PermissionDenied)));
}

#[test]
fn test_open_with_no_events() {
    let result = CounterGroup::open(StubBackend::new(), &[]);
    assert!(matches!(result, Err(CounterError::NoEvents)));
}

#[test]
fn test_measure_brackets_and_reads_once() {
    let mut group = CounterGroup::open(StubBackend::new(), &three_events()).unwrap();
    let (out, snapshot) = group.measure(|| 42);
    assert_eq!(out, 42);
    assert_eq!(snapshot.unwrap().values, expected_first_read(3));

    let (_, second) = group.measure(|| ());
    assert_eq!(second.unwrap().values[0], StubBackend::value_for(0, 1));
}

#[test]
fn test_measure_still_runs_work_when_read_fails() {
    let backend = StubBackend::new().failing_read_after(0);
    let mut group = CounterGroup::open(backend, &three_events()).unwrap();
    let mut ran = false;
    let (_, snapshot) = group.measure(|| ran = true);
    assert!(ran);
    assert!(snapshot.is_err());
}

#[test]
fn test_multiplexed_values_are_scaled() {
    let backend = StubBackend::new().with_times(1_000, 250);
    let mut group = CounterGroup::open(backend, &[EventSpec::cpu_cycles()]).unwrap();
    let snapshot = group.read_values().unwrap();
    assert!(snapshot.multiplexed());
    assert_eq!(snapshot.scaled(), vec![StubBackend::value_for(0, 0) * 4]);
}

#[test]
fn test_never_scheduled_group_is_left_unscaled() {
    let backend = StubBackend::new().with_times(1_000, 0);
    let mut group = CounterGroup::open(backend, &[EventSpec::cpu_cycles()]).unwrap();
    let snapshot = group.read_values().unwrap();
    assert_eq!(snapshot.scaled(), snapshot.values);
}

#[test]
fn test_names_follow_declaration_order() {
    let group = CounterGroup::open(StubBackend::new(), &three_events()).unwrap();
    assert_eq!(
        group.names(),
        vec!["cycles", "l1d-read-misses", "instructions"]
    );
}

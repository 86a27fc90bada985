//! Invariants of the event aggregator under arbitrary event sequences.

use proptest::prelude::*;
use rstest::rstest;
use sheetstream::{Applied, Event, EventAggregator, Frame, Outcome, Phase};
use tracing_test::traced_test;

fn record(index: u64, success: bool) -> Event {
    Event::Record(Outcome {
        index,
        name: format!("fila {index}"),
        success,
        error: (!success).then(|| "bad row".into()),
    })
}

/// Completion fires exactly once, whenever the start event lands relative to
/// the records: before, in between, or after them all.
#[rstest]
#[case::start_first(0)]
#[case::start_in_between(2)]
#[case::start_last(3)]
fn completion_fires_exactly_once(#[case] start_position: usize) {
    let total = 3u64;
    let mut events: Vec<Event> = (0..total).map(|i| record(i, i % 2 == 0)).collect();
    events.insert(start_position, Event::Start { total });

    let (mut aggregator, receiver) = EventAggregator::new();
    let mut completions = 0;
    for event in events {
        if aggregator.apply(event).expect("valid sequence") == Applied::Completed {
            completions += 1;
        }
    }
    assert_eq!(completions, 1);
    assert_eq!(receiver.borrow().phase(), Phase::Completed);
    assert!((receiver.borrow().progress_percent() - 100.0).abs() < f64::EPSILON);
}

#[test]
fn start_never_arriving_never_completes() {
    let (mut aggregator, receiver) = EventAggregator::new();
    for i in 0..5 {
        aggregator.apply(record(i, true)).expect("record");
    }
    let snapshot = receiver.borrow().clone();
    assert_eq!(snapshot.phase(), Phase::Idle);
    assert!(snapshot.progress_percent().abs() < f64::EPSILON);
    assert_eq!(snapshot.total(), None);
}

/// Feeding a malformed frame between two valid frames yields a run state
/// identical to feeding only the two valid frames.
#[test]
fn malformed_frame_is_a_no_op() {
    let start = Frame::new(r#"{"total":2}"#);
    let row = Frame::new(r#"{"index":0,"nombre":"fila 0","success":false,"error":"bad row"}"#);
    let garbage = Frame::new(r#"{"evento":"procesando","index":0}"#);

    let (mut clean, _rx_clean) = EventAggregator::new();
    clean.apply_frame(&start).expect("start");
    clean.apply_frame(&row).expect("record");

    let (mut noisy, _rx_noisy) = EventAggregator::new();
    noisy.apply_frame(&start).expect("start");
    noisy.apply_frame(&garbage).expect_err("garbage must be rejected");
    noisy.apply_frame(&row).expect("record");

    assert_eq!(clean.state().total(), noisy.state().total());
    assert_eq!(clean.state().processed(), noisy.state().processed());
    assert_eq!(clean.state().phase(), noisy.state().phase());
    assert_eq!(noisy.dropped_frames(), 1);
}

#[test]
#[traced_test]
fn duplicate_start_logs_a_warning() {
    let (mut aggregator, _receiver) = EventAggregator::new();
    aggregator.apply(Event::Start { total: 3 }).expect("first start");
    aggregator
        .apply(Event::Start { total: 9 })
        .expect_err("second start is an anomaly");
    assert!(logs_contain("duplicate start event dropped"));
    assert_eq!(aggregator.state().total(), Some(3));
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0u64..8).prop_map(|total| Event::Start { total }),
        ((0u64..20), any::<bool>()).prop_map(|(index, success)| record(index, success)),
    ]
}

proptest! {
    /// Progress is always finite and within [0, 100]; the error list is
    /// always exactly the failed subsequence of `processed`, in order.
    #[test]
    fn invariants_hold_for_any_event_sequence(events in prop::collection::vec(arb_event(), 0..40)) {
        let (mut aggregator, receiver) = EventAggregator::new();
        let mut completions = 0;
        for event in events {
            if let Ok(Applied::Completed) = aggregator.apply(event) {
                completions += 1;
            }

            let snapshot = receiver.borrow().clone();
            let percent = snapshot.progress_percent();
            prop_assert!(percent.is_finite());
            prop_assert!((0.0..=100.0).contains(&percent));

            let failed: Vec<&Outcome> =
                snapshot.processed().iter().filter(|o| !o.success).collect();
            let errors: Vec<&Outcome> = snapshot.errors().collect();
            prop_assert_eq!(failed, errors);
        }
        prop_assert!(completions <= 1);
    }
}

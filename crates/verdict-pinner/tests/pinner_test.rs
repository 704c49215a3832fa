//! Chaos and property tests for the pinned invariant and the ceiling.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use test_fixtures::event_with_severity;
use verdict_core::config::{PinnerConfig, RetentionWeighting};
use verdict_core::models::{EventId, Severity};
use verdict_pinner::{FeedbackPinner, MemoryPressure};

fn tight(weighting: RetentionWeighting) -> PinnerConfig {
    PinnerConfig {
        medium_capacity: Some(8),
        low_capacity: Some(4),
        info_capacity: Some(4),
        retention_weighting: Some(weighting),
    }
}

#[test]
fn concurrent_admission_with_sweeps_never_drops_pinned_events() {
    const PRODUCERS: usize = 16;
    const PER_PRODUCER: usize = 200;

    let pinner = Arc::new(FeedbackPinner::new(&tight(RetentionWeighting::Recency)));
    let stop = Arc::new(AtomicBool::new(false));

    let sweeper = {
        let pinner = Arc::clone(&pinner);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut sweeps = 0usize;
            while !stop.load(Ordering::Acquire) {
                let candidates = pinner.evict_candidates(MemoryPressure::High).unwrap();
                pinner.evict(&candidates).unwrap();
                assert!(pinner.non_critical_len().unwrap() <= pinner.ceiling());
                sweeps += 1;
            }
            sweeps
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let pinner = Arc::clone(&pinner);
            thread::spawn(move || {
                let mut pinned = Vec::new();
                for i in 0..PER_PRODUCER {
                    let severity = Severity::ALL[(p + i) % Severity::ALL.len()];
                    let event = event_with_severity(&format!("p{p}-{i}"), severity);
                    let id = event.id();
                    let decision = pinner.admit(event).unwrap();
                    if severity.is_always_pinned() {
                        assert!(decision.is_pinned());
                        pinned.push(id);
                    }
                }
                pinned
            })
        })
        .collect();

    let pinned: HashSet<EventId> = producers
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    stop.store(true, Ordering::Release);
    sweeper.join().unwrap();

    assert_eq!(pinned.len(), PRODUCERS * PER_PRODUCER * 2 / 5);
    assert!(pinned.iter().all(|id| pinner.contains(id)));
    assert_eq!(pinner.pinned_len().unwrap(), pinned.len());
    assert!(pinner.non_critical_len().unwrap() <= pinner.ceiling());
    for tier in [Severity::Info, Severity::Low, Severity::Medium] {
        assert!(pinner.tier_len(tier).unwrap() <= pinner.capacity(tier).unwrap());
    }
}

#[derive(Debug, Clone)]
enum Op {
    Admit(Severity),
    Sweep(MemoryPressure),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => prop::sample::select(Severity::ALL.to_vec()).prop_map(Op::Admit),
        1 => prop::sample::select(vec![
            MemoryPressure::Nominal,
            MemoryPressure::Moderate,
            MemoryPressure::High,
            MemoryPressure::Critical,
        ])
        .prop_map(Op::Sweep),
    ]
}

fn weighting_strategy() -> impl Strategy<Value = RetentionWeighting> {
    prop::sample::select(vec![
        RetentionWeighting::Recency,
        RetentionWeighting::Confidence,
        RetentionWeighting::Severity,
    ])
}

proptest! {
    #[test]
    fn candidates_never_include_pinned_ids(
        ops in prop::collection::vec(op_strategy(), 1..120),
        weighting in weighting_strategy(),
    ) {
        let pinner = FeedbackPinner::new(&tight(weighting));
        let mut pinned = HashSet::new();

        for (n, op) in ops.into_iter().enumerate() {
            match op {
                Op::Admit(severity) => {
                    let event = event_with_severity(&format!("e{n}"), severity);
                    let id = event.id();
                    pinner.admit(event).unwrap();
                    if severity.is_always_pinned() {
                        pinned.insert(id);
                    }
                }
                Op::Sweep(pressure) => {
                    let candidates = pinner.evict_candidates(pressure).unwrap();
                    prop_assert!(candidates.iter().all(|id| !pinned.contains(id)));
                    pinner.evict(&candidates).unwrap();
                }
            }
            prop_assert!(pinner.non_critical_len().unwrap() <= pinner.ceiling());
        }

        let all = pinner.evict_candidates(MemoryPressure::Critical).unwrap();
        prop_assert!(all.iter().all(|id| !pinned.contains(id)));
        prop_assert!(pinned.iter().all(|id| pinner.contains(id)));
    }
}

#[test]
fn rebuild_replays_capacity_rules() {
    let pinner = FeedbackPinner::new(&tight(RetentionWeighting::Recency));
    let events: Vec<_> = (0..10)
        .map(|i| event_with_severity(&format!("i{i}"), Severity::Info))
        .chain(std::iter::once(event_with_severity("c", Severity::Critical)))
        .collect();
    let report = pinner.rebuild(events.clone()).unwrap();
    assert_eq!(report.admitted, 11);
    assert_eq!(report.evicted.len(), 6);
    assert_eq!(pinner.tier_len(Severity::Info).unwrap(), 4);

    let kept: Vec<EventId> = pinner
        .retained()
        .unwrap()
        .iter()
        .filter(|e| e.severity() == Severity::Info)
        .map(|e| e.id())
        .collect();
    let newest: Vec<EventId> = events[6..10].iter().map(|e| e.id()).collect();
    assert_eq!(kept, newest);
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::aggregation::{query, Aggregate, Component};

trait Counter: Send + Sync {
    fn value(&self) -> usize;
}

struct Fixed(usize);

impl Counter for Fixed {
    fn value(&self) -> usize {
        self.0
    }
}

fn counter(value: usize) -> Component {
    Component::builder(format!("counter-{value}"))
        .provide::<dyn Counter>(Arc::new(Fixed(value)))
        .build()
}

#[test]
fn test_queries_during_mutation() {
    let anchor = counter(0);
    let aggregate = Aggregate::new();
    aggregate.add(&anchor).unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    // The anchor is never removed, so it always answers first
                    let first = aggregate.component::<dyn Counter>().expect("anchor present");
                    assert_eq!(first.value(), 0);
                    let all = aggregate.components::<dyn Counter>();
                    assert!(!all.is_empty());
                    assert!(query::<dyn Counter>(&anchor).is_some());
                }
            });
        }

        scope.spawn(|| {
            for round in 1..200 {
                let transient = counter(round);
                aggregate.add(&transient).unwrap();
                if round % 2 == 0 {
                    aggregate.remove(&transient);
                }
                // Odd rounds leave through drop
            }
            done.store(true, Ordering::Release);
        });
    });

    assert_eq!(aggregate.members(), vec![anchor]);
}

#[test]
fn test_independent_aggregates_across_threads() {
    let handles: Vec<_> = (0..8)
        .map(|n| {
            thread::spawn(move || {
                let aggregate = Aggregate::new();
                let members: Vec<Component> = (0..10).map(|i| counter(n * 100 + i)).collect();
                for member in &members {
                    aggregate.add(member).unwrap();
                }
                aggregate
                    .components::<dyn Counter>()
                    .iter()
                    .map(|c| c.value())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let values = handle.join().unwrap();
        let expected: Vec<usize> = (0..10).map(|i| n * 100 + i).collect();
        assert_eq!(values, expected);
    }
}

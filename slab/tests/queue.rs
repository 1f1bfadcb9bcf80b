#![cfg(not(loom))]
use hyphae::{
    mpsc_queue::{PushError, TryPullError},
    MpscQueue,
};
use hyphae_slab::Slab;
use std::{sync::Arc, thread};

#[test]
fn queue_on_a_borrowed_slab() {
    let slab = Slab::for_queue::<String>();
    {
        let q = MpscQueue::new_in(&slab);
        assert_eq!(slab.allocated(), 1, "only the sentinel is allocated");

        for i in 0..10 {
            q.push(i.to_string());
        }
        assert_eq!(slab.allocated(), 11);

        for i in 0..10 {
            assert_eq!(q.pull(), Some(i.to_string()));
        }
        assert_eq!(q.try_pull(), Err(TryPullError::Empty));
        assert_eq!(slab.allocated(), 1);
    }
    assert_eq!(slab.allocated(), 0);
}

#[test]
fn steady_state_reuses_slots() {
    let slab = Slab::with_page_slots(hyphae::mpsc_queue::node_layout::<u64>(), 2);
    let q = MpscQueue::new_in(&slab);

    for i in 0..1000 {
        q.push(i);
        assert_eq!(q.pull(), Some(i));
    }

    assert_eq!(slab.pages(), 1, "a bounded queue stops growing the slab");
    drop(q);
    assert_eq!(slab.allocated(), 0);
}

#[test]
fn dropping_the_queue_returns_unpulled_nodes() {
    let slab = Slab::for_queue::<Vec<u8>>();
    let q = MpscQueue::new_in(&slab);
    for i in 0..100 {
        q.push(vec![i; 16]);
    }
    assert_eq!(slab.allocated(), 101);

    drop(q);
    assert_eq!(slab.allocated(), 0);
    assert_eq!(slab.capacity(), 128);
}

#[test]
fn undersized_slab_fails_to_allocate() {
    // slots sized for a `u8` node can't hold a node of a much larger type.
    let slab = Slab::for_queue::<u8>();
    let err = MpscQueue::<[u64; 32], _>::try_new_in(&slab).unwrap_err();
    assert_eq!(err.to_string(), "failed to allocate storage for a queue node");
    assert_eq!(slab.allocated(), 0);

    // pages are added on demand, one push at a time.
    let small = Slab::with_page_slots(hyphae::mpsc_queue::node_layout::<u8>(), 1);
    let q = MpscQueue::try_new_in(&small).expect("sentinel fits in a slot");
    q.try_push(1u8).expect("push fits in a slot");
    q.try_push(2u8)
        .map_err(PushError::into_inner)
        .expect("a new page should be allocated on demand");
    assert_eq!(small.pages(), 3);
}

#[test]
fn evens_and_odds_on_a_shared_slab() {
    const N: usize = 1000;
    let slab = Arc::new(Slab::with_page_slots(
        hyphae::mpsc_queue::node_layout::<usize>(),
        16,
    ));
    let q = Arc::new(MpscQueue::new_in(slab.clone()));

    let evens = thread::spawn({
        let q = q.clone();
        move || {
            for i in (0..N).step_by(2) {
                q.push(i);
            }
        }
    });
    let odds = thread::spawn({
        let q = q.clone();
        move || {
            for i in (1..N).step_by(2) {
                q.push(i);
            }
        }
    });

    let mut consumer = q.clone().consume_owned();
    let mut pulled = Vec::with_capacity(N);
    let mut last = [None::<usize>; 2];
    while pulled.len() < N {
        match consumer.pull() {
            Some(i) => {
                let producer = &mut last[i % 2];
                assert!(
                    producer.map_or(true, |last| last < i),
                    "{i} pulled out of order after {producer:?}"
                );
                *producer = Some(i);
                pulled.push(i);
            }
            None => thread::yield_now(),
        }
    }

    evens.join().unwrap();
    odds.join().unwrap();
    assert_eq!(consumer.pull(), None);

    pulled.sort_unstable();
    assert_eq!(pulled, (0..N).collect::<Vec<_>>());

    drop(consumer);
    drop(q);
    assert_eq!(slab.allocated(), 0);
}

use super::*;
use crate::loom::{self, sync::Arc, thread};
use ::loom::alloc::Track;

fn track(val: i32) -> Track<i32> {
    Track::new(val)
}

fn do_tx(thread: i32, msgs: i32, q: &Arc<MpscQueue<Track<i32>>>) -> impl FnOnce() + Send + 'static {
    let q = q.clone();
    move || {
        for i in 0..msgs {
            q.push(track(i + (thread * 10)));
            tracing::info!(thread, "push msg {}/{}", i, msgs);
        }
    }
}

#[test]
fn basically_works_loom() {
    const THREADS: i32 = 2;
    const MSGS: i32 = 2;
    const TOTAL_MSGS: i32 = THREADS * MSGS;
    basically_works_test(THREADS, MSGS, TOTAL_MSGS);
}

#[test]
fn doesnt_leak() {
    // Test that dropping the queue drops any values that haven't been
    // pulled by the consumer.
    const THREADS: i32 = 2;
    const MSGS: i32 = 2;
    // Only pull half as many values as are pushed, to ensure dropping the
    // queue does not leak.
    const TOTAL_MSGS: i32 = (THREADS * MSGS) / 2;
    basically_works_test(THREADS, MSGS, TOTAL_MSGS);
}

fn basically_works_test(threads: i32, msgs: i32, total_msgs: i32) {
    loom::model(move || {
        let q = Arc::new(MpscQueue::<Track<i32>>::new());

        let threads: Vec<_> = (0..threads)
            .map(|thread| thread::spawn(do_tx(thread, msgs, &q)))
            .collect();

        let mut last = [-1; 2];
        let mut i = 0;
        while i < total_msgs {
            match q.try_pull() {
                Ok(val) => {
                    let val = *val.get_ref();
                    let (thread, msg) = ((val / 10) as usize, val % 10);
                    assert!(
                        msg > last[thread],
                        "values from producer {thread} out of order: {msg} after {}",
                        last[thread]
                    );
                    last[thread] = msg;
                    i += 1;
                    tracing::info!(val, "pull {}/{}", i, total_msgs);
                }
                Err(TryPullError::Busy) => panic!(
                    "the queue should never be busy, as there is only a single consumer!"
                ),
                Err(TryPullError::Empty) => thread::yield_now(),
            }
        }

        for thread in threads {
            thread.join().unwrap();
        }
    })
}

#[test]
fn pull_racing_push() {
    loom::model(|| {
        let q = Arc::new(MpscQueue::<Track<i32>>::new());

        let producer = thread::spawn({
            let q = q.clone();
            move || q.push(track(1))
        });

        // this may run before, during, or after the push; if the producer
        // has not linked its node yet, the queue must look empty.
        let first = q.pull().map(|val| *val.get_ref());
        producer.join().unwrap();
        let second = q.pull().map(|val| *val.get_ref());

        match (first, second) {
            (Some(1), None) | (None, Some(1)) => {}
            other => panic!("value must be pulled exactly once, got {other:?}"),
        }
    })
}

#[test]
fn clear_racing_push() {
    loom::model(|| {
        let q = Arc::new(MpscQueue::<Track<i32>>::new());
        q.push(track(0));

        let producer = thread::spawn({
            let q = q.clone();
            move || {
                q.push(track(1));
                q.push(track(2));
            }
        });

        q.consume().clear();
        producer.join().unwrap();

        // whatever the clear didn't reach is still queued, in order.
        let rest: Vec<i32> = q.consume().map(|val| *val.get_ref()).collect();
        assert!(
            matches!(rest.as_slice(), [] | [2] | [1, 2]),
            "unexpected values after clear: {rest:?}"
        );
    })
}

#[test]
fn racing_consumers() {
    loom::model(|| {
        let q = Arc::new(MpscQueue::<Track<i32>>::new());
        q.push(track(1));

        let other = thread::spawn({
            let q = q.clone();
            move || q.pull().map(|val| *val.get_ref())
        });
        let mine = q.pull().map(|val| *val.get_ref());
        let theirs = other.join().unwrap();

        // the consumer flag prevents both threads from pulling at once; a
        // thread that loses the race sees `None` rather than corrupting the
        // queue.
        match (mine, theirs) {
            (Some(1), None) | (None, Some(1)) => {}
            other => panic!("value must be pulled exactly once, got {other:?}"),
        }
    })
}

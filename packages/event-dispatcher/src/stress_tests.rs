//! Stress tests for ordering, isolation and shutdown under concurrency.
//!
//! These tests exercise races between producers, workers, registration and
//! shutdown.

#[cfg(test)]
mod stress_tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::config::FanoutMode;
    use crate::core::test_types::{Data, Kind};
    use crate::dispatcher::Dispatcher;
    use crate::testing::{CountDownLatch, RecordingHandler};

    const PRODUCERS: i64 = 4;
    const EVENTS_PER_PRODUCER: i64 = 500;

    // ==========================================================================
    // Ordering
    // ==========================================================================

    #[test]
    fn test_fifo_per_producer_with_concurrent_producers() {
        let recorder = RecordingHandler::<Data>::new();
        let dispatcher = Arc::new(Dispatcher::<Data>::new());
        dispatcher.register(Kind::A, recorder.clone());
        dispatcher.start().unwrap();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let dispatcher = dispatcher.clone();
                thread::spawn(move || {
                    for i in 0..EVENTS_PER_PRODUCER {
                        dispatcher.enqueue(Kind::A, Data::A(producer * 1_000_000 + i));
                        if fastrand::u8(..) < 8 {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        dispatcher.stop();

        let recorded = recorder.recorded();
        assert_eq!(recorded.len() as i64, PRODUCERS * EVENTS_PER_PRODUCER);

        // Each producer's events must arrive in the order it sent them.
        let mut last_seen: HashMap<i64, i64> = HashMap::new();
        for data in recorded {
            let Data::A(value) = data else {
                panic!("unexpected payload {:?}", data);
            };
            let (producer, i) = (value / 1_000_000, value % 1_000_000);
            if let Some(prev) = last_seen.insert(producer, i) {
                assert!(prev < i, "producer {} out of order: {} after {}", producer, i, prev);
            }
        }
    }

    #[test]
    fn test_every_handler_sees_every_event_in_order() {
        let recorders: Vec<_> = (0..3).map(|_| RecordingHandler::<Data>::new()).collect();
        let dispatcher = Dispatcher::<Data>::new();
        for recorder in &recorders {
            dispatcher.register(Kind::C, recorder.clone());
        }
        dispatcher.start().unwrap();

        let expected: Vec<Data> = (0..1_000).map(|i| Data::C(i as f64 * 0.1)).collect();
        for data in &expected {
            dispatcher.add_event(data.clone());
        }
        dispatcher.stop();

        for recorder in &recorders {
            assert_eq!(recorder.recorded(), expected);
        }
    }

    #[test]
    fn test_fan_out_completes_before_next_event() {
        // Each event must pass through every handler before the next event
        // reaches the first one.
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::<Data>::new();
        for handler_id in 0..3 {
            let log = log.clone();
            dispatcher.register(Kind::A, move |payload: &Data| {
                if let Data::A(n) = payload {
                    if fastrand::bool() {
                        thread::yield_now();
                    }
                    log.lock().push((*n, handler_id));
                }
            });
        }
        dispatcher.start().unwrap();
        for n in 0..200 {
            dispatcher.enqueue(Kind::A, Data::A(n));
        }
        dispatcher.stop();

        let expected: Vec<(i64, i32)> = (0..200)
            .flat_map(|n| (0..3).map(move |h| (n, h)))
            .collect();
        assert_eq!(*log.lock(), expected);
    }

    // ==========================================================================
    // Isolation
    // ==========================================================================

    #[test]
    fn test_blocked_type_does_not_delay_other_types() {
        let release_a = CountDownLatch::new(1);
        let a_entered = CountDownLatch::new(1);
        let b_done = CountDownLatch::new(10);
        let dispatcher = Dispatcher::<Data>::new();

        {
            let release_a = release_a.clone();
            let a_entered = a_entered.clone();
            dispatcher.register(Kind::A, move |_: &Data| {
                a_entered.count_down();
                release_a.wait_timeout(Duration::from_secs(10));
            });
        }
        {
            let b_done = b_done.clone();
            dispatcher.register(Kind::B, move |_: &Data| b_done.count_down());
        }
        dispatcher.start().unwrap();

        dispatcher.enqueue(Kind::A, Data::A(0));
        assert!(a_entered.wait_timeout(Duration::from_secs(5)));

        for i in 0..10 {
            dispatcher.enqueue(Kind::B, Data::B(i.to_string()));
        }
        assert!(
            b_done.wait_timeout(Duration::from_secs(5)),
            "type B was blocked behind type A's handler"
        );

        release_a.count_down();
        dispatcher.stop();
    }

    #[test]
    fn test_serialized_mode_never_overlaps_fan_out() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::<Data>::builder()
            .fanout(FanoutMode::Serialized)
            .build();

        for &kind in [Kind::A, Kind::B, Kind::C].iter() {
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            dispatcher.register(kind, move |_: &Data| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_micros(fastrand::u64(0..200)));
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }
        dispatcher.start().unwrap();

        for i in 0..100 {
            dispatcher.add_event(Data::A(i));
            dispatcher.add_event(Data::B(i.to_string()));
            dispatcher.add_event(Data::C(i as f64));
        }
        dispatcher.stop();

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        for &kind in [Kind::A, Kind::B, Kind::C].iter() {
            assert_eq!(dispatcher.stats(kind).dispatched, 100);
        }
    }

    #[test]
    fn test_concurrent_mode_overlaps_fan_out() {
        // A's handler waits for B's handler to run. That only completes if the
        // two types fan out at the same time.
        let b_ran = CountDownLatch::new(1);
        let a_saw_b = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::<Data>::builder()
            .fanout(FanoutMode::Concurrent)
            .build();

        {
            let b_ran = b_ran.clone();
            let a_saw_b = a_saw_b.clone();
            dispatcher.register(Kind::A, move |_: &Data| {
                if b_ran.wait_timeout(Duration::from_secs(5)) {
                    a_saw_b.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        {
            let b_ran = b_ran.clone();
            dispatcher.register(Kind::B, move |_: &Data| b_ran.count_down());
        }
        dispatcher.start().unwrap();

        dispatcher.add_event(Data::A(1));
        thread::sleep(Duration::from_millis(20));
        dispatcher.add_event(Data::B("go".into()));
        dispatcher.stop();

        assert_eq!(a_saw_b.load(Ordering::SeqCst), 1);
    }

    // ==========================================================================
    // Shutdown
    // ==========================================================================

    #[test]
    fn test_stop_drains_backlog_of_slow_handlers() {
        let handled = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::<Data>::new();
        for &kind in [Kind::A, Kind::B, Kind::C].iter() {
            let handled = handled.clone();
            dispatcher.register(kind, move |_: &Data| {
                thread::sleep(Duration::from_micros(fastrand::u64(0..300)));
                handled.fetch_add(1, Ordering::SeqCst);
            });
        }
        dispatcher.start().unwrap();

        for i in 0..150 {
            match i % 3 {
                0 => dispatcher.add_event(Data::A(i)),
                1 => dispatcher.add_event(Data::B(i.to_string())),
                _ => dispatcher.add_event(Data::C(i as f64 * 0.1)),
            }
        }
        dispatcher.stop();

        assert_eq!(handled.load(Ordering::SeqCst), 150);
        for &kind in [Kind::A, Kind::B, Kind::C].iter() {
            let stats = dispatcher.stats(kind);
            assert_eq!(stats.enqueued, 50);
            assert_eq!(stats.dispatched, 50);
            assert_eq!(stats.pending, 0);
        }
    }

    #[test]
    fn test_concurrent_stop_calls_do_not_deadlock() {
        let dispatcher = Arc::new(Dispatcher::<Data>::new());
        let recorder = RecordingHandler::<Data>::new();
        dispatcher.register(Kind::A, recorder.clone());
        dispatcher.start().unwrap();
        for i in 0..50 {
            dispatcher.enqueue(Kind::A, Data::A(i));
        }

        let stoppers: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                thread::spawn(move || dispatcher.stop())
            })
            .collect();
        for stopper in stoppers {
            stopper.join().unwrap();
        }

        // Whichever stop() won joined everything before its thread finished.
        assert_eq!(dispatcher.state(), crate::State::Stopped);
        assert_eq!(recorder.len(), 50);
    }

    #[test]
    fn test_second_stop_waits_for_the_first_to_drain() {
        let handled = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Dispatcher::<Data>::new());
        {
            let handled = handled.clone();
            dispatcher.register(Kind::A, move |_: &Data| {
                thread::sleep(Duration::from_millis(20));
                handled.fetch_add(1, Ordering::SeqCst);
            });
        }
        dispatcher.start().unwrap();
        for i in 0..10 {
            dispatcher.enqueue(Kind::A, Data::A(i));
        }

        let first = {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || dispatcher.stop())
        };
        thread::sleep(Duration::from_millis(10));
        dispatcher.stop();

        // Checked before joining the other stopper: whichever call lost the
        // race must still have waited for the drain.
        assert_eq!(handled.load(Ordering::SeqCst), 10);
        assert_eq!(dispatcher.state(), crate::State::Stopped);
        first.join().unwrap();
    }

    #[test]
    fn test_registration_races_with_dispatch() {
        let dispatcher = Arc::new(Dispatcher::<Data>::new());
        let total = Arc::new(AtomicUsize::new(0));
        dispatcher.start().unwrap();

        let registrar = {
            let dispatcher = dispatcher.clone();
            let total = total.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    let total = total.clone();
                    dispatcher.register(Kind::B, move |_: &Data| {
                        total.fetch_add(1, Ordering::SeqCst);
                    });
                    thread::yield_now();
                }
            })
        };

        for i in 0..500 {
            dispatcher.enqueue(Kind::B, Data::B(i.to_string()));
        }
        registrar.join().unwrap();
        dispatcher.stop();

        let stats = dispatcher.stats(Kind::B);
        assert_eq!(dispatcher.handler_count(Kind::B), 20);
        assert_eq!(stats.enqueued, 500);
        assert_eq!(stats.dispatched + stats.discarded, 500);
        assert_eq!(stats.handler_invocations, total.load(Ordering::SeqCst) as u64);
    }
}

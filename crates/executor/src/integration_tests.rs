//! Integration tests for the executor as producers see it.
//!
//! Tests: producers → queue → run loop → operations
//!
//! Verifies:
//! - FIFO execution and mutual exclusion under concurrent producers
//! - Backpressure, join semantics and stale-join skipping
//! - Fault isolation and stop/cancellation behaviour

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use proptest::prelude::*;
    use serialq_config::ExecutorConfig;

    use crate::{Context, ExecutorError, ExecutorState, RunLoopHandle, SerialExecutor, spawn};

    const WAIT: Duration = Duration::from_secs(5);

    fn start(backlog: usize) -> (Arc<SerialExecutor>, RunLoopHandle, Context) {
        let exec = Arc::new(SerialExecutor::from_config(
            &ExecutorConfig::default()
                .with_name("it")
                .with_backlog(backlog)
                .with_poll_interval(Duration::from_millis(5)),
        ));
        let parent = Context::new();
        exec.initialize(&parent).unwrap();
        let handle = spawn(exec.clone()).unwrap();
        (exec, handle, parent)
    }

    /// Occupy the worker until the returned sender is used (or dropped).
    /// Returns once the blocking operation has actually started.
    fn hold_worker(exec: &SerialExecutor) -> mpsc::Sender<()> {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        exec.enqueue(move |_| {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv_timeout(WAIT).unwrap();
        release_tx
    }

    fn drain(exec: &SerialExecutor) {
        assert!(exec.join(&Context::new(), |_| {}).unwrap());
    }

    #[test]
    fn single_producer_order_is_preserved() {
        let (exec, handle, _parent) = start(4);
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let log = log.clone();
            exec.enqueue(move |_| log.lock().unwrap().push(i)).unwrap();
        }
        drain(&exec);

        assert_eq!(*log.lock().unwrap(), (0..100).collect::<Vec<_>>());
        handle.shutdown().unwrap();
    }

    #[test]
    fn concurrent_producers_keep_their_own_order() {
        let (exec, handle, _parent) = start(2);
        let log = Arc::new(Mutex::new(Vec::new()));

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let exec = exec.clone();
                let log = log.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        let log = log.clone();
                        exec.enqueue(move |_| log.lock().unwrap().push((p, i))).unwrap();
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        drain(&exec);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 200);
        for p in 0..4 {
            let mine: Vec<_> = log.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
            assert_eq!(mine, (0..50).collect::<Vec<_>>());
        }
        handle.shutdown().unwrap();
    }

    #[test]
    fn execution_order_matches_acceptance_order() {
        let (exec, handle, _parent) = start(0);
        let accepted = Arc::new(Mutex::new(Vec::new()));
        let executed = Arc::new(Mutex::new(Vec::new()));

        // With a rendezvous queue, a returned enqueue means the worker took it.
        let producers: Vec<_> = (0..3)
            .map(|p| {
                let exec = exec.clone();
                let accepted = accepted.clone();
                let executed = executed.clone();
                thread::spawn(move || {
                    for i in 0..20 {
                        let executed = executed.clone();
                        let mut acc = accepted.lock().unwrap();
                        exec.enqueue(move |_| executed.lock().unwrap().push((p, i)))
                            .unwrap();
                        acc.push((p, i));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        drain(&exec);

        assert_eq!(*executed.lock().unwrap(), *accepted.lock().unwrap());
        handle.shutdown().unwrap();
    }

    #[test]
    fn operations_never_overlap() {
        let (exec, handle, _parent) = start(3);
        let active = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..8)
            .map(|_| {
                let exec = exec.clone();
                let active = active.clone();
                let overlapped = overlapped.clone();
                let done = done.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        let active = active.clone();
                        let overlapped = overlapped.clone();
                        let done = done.clone();
                        let ok = exec
                            .join(&Context::new(), move |_| {
                                if active.fetch_add(1, Ordering::SeqCst) != 0 {
                                    overlapped.store(true, Ordering::SeqCst);
                                }
                                thread::yield_now();
                                active.fetch_sub(1, Ordering::SeqCst);
                                done.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                        assert!(ok);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        assert!(!overlapped.load(Ordering::SeqCst));
        assert_eq!(done.load(Ordering::SeqCst), 200);
        handle.shutdown().unwrap();
    }

    #[test]
    fn enqueue_blocks_until_a_slot_frees() {
        let (exec, handle, _parent) = start(1);
        let release = hold_worker(&exec);

        // Fills the single slot.
        exec.enqueue(|_| {}).unwrap();

        let returned = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();
        let blocked = {
            let exec = exec.clone();
            let returned = returned.clone();
            thread::spawn(move || {
                exec.enqueue(|_| {}).unwrap();
                returned.store(true, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!returned.load(Ordering::SeqCst), "enqueue should block on a full backlog");

        release.send(()).unwrap();
        done_rx.recv_timeout(WAIT).unwrap();
        assert!(returned.load(Ordering::SeqCst));

        blocked.join().unwrap();
        handle.shutdown().unwrap();
    }

    #[test]
    fn join_returns_after_the_operation_ran() {
        let (exec, handle, _parent) = start(0);
        let log = Arc::new(Mutex::new(Vec::new()));

        {
            let log = log.clone();
            exec.enqueue(move |_| {
                thread::sleep(Duration::from_millis(20));
                log.lock().unwrap().push("first");
            })
            .unwrap();
        }
        let ran = {
            let log = log.clone();
            exec.join(&Context::new(), move |_| log.lock().unwrap().push("joined"))
                .unwrap()
        };

        assert!(ran);
        assert_eq!(*log.lock().unwrap(), vec!["first", "joined"]);
        handle.shutdown().unwrap();
    }

    #[test]
    fn join_with_cancelled_caller_context_is_skipped() {
        let (exec, handle, _parent) = start(0);
        let ran = Arc::new(AtomicBool::new(false));
        let caller = Context::new();
        caller.cancel();

        let flag = ran.clone();
        let completed = exec
            .join(&caller, move |_| flag.store(true, Ordering::SeqCst))
            .unwrap();

        assert!(!completed);
        assert!(!ran.load(Ordering::SeqCst));
        handle.shutdown().unwrap();
    }

    #[test]
    fn join_timeout_zero_skips_stale_operation() {
        let (exec, handle, _parent) = start(1);
        let ran = Arc::new(AtomicBool::new(false));

        exec.enqueue(|_| thread::sleep(Duration::from_millis(20))).unwrap();
        let flag = ran.clone();
        let completed = exec
            .join_timeout(&Context::new(), Duration::ZERO, move |_| {
                flag.store(true, Ordering::SeqCst)
            })
            .unwrap();

        assert!(!completed);
        assert!(!ran.load(Ordering::SeqCst));
        handle.shutdown().unwrap();
    }

    #[test]
    fn join_timeout_runs_fresh_operation() {
        let (exec, handle, _parent) = start(0);
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        let completed = exec
            .join_timeout(&Context::new(), WAIT, move |_| {
                flag.store(true, Ordering::SeqCst)
            })
            .unwrap();

        assert!(completed);
        assert!(ran.load(Ordering::SeqCst));
        handle.shutdown().unwrap();
    }

    #[test]
    fn stale_join_still_takes_its_turn() {
        let (exec, handle, _parent) = start(4);
        let log = Arc::new(Mutex::new(Vec::new()));
        let release = hold_worker(&exec);

        let stale = {
            let exec = exec.clone();
            let log = log.clone();
            thread::spawn(move || {
                exec.join_timeout(&Context::new(), Duration::from_millis(10), move |_| {
                    log.lock().unwrap().push("stale")
                })
                .unwrap()
            })
        };
        // Make sure the stale join is queued ahead of the next operation.
        thread::sleep(Duration::from_millis(50));
        {
            let log = log.clone();
            exec.enqueue(move |_| log.lock().unwrap().push("after")).unwrap();
        }

        release.send(()).unwrap();
        assert!(!stale.join().unwrap());
        drain(&exec);

        assert_eq!(*log.lock().unwrap(), vec!["after"]);
        handle.shutdown().unwrap();
    }

    #[test]
    fn faulting_operation_does_not_stop_the_loop() {
        let (exec, handle, _parent) = start(2);
        let flag = Arc::new(AtomicBool::new(false));

        exec.enqueue(|_| panic!("operation A failed")).unwrap();
        {
            let flag = flag.clone();
            exec.enqueue(move |_| flag.store(true, Ordering::SeqCst)).unwrap();
        }
        drain(&exec);

        assert!(flag.load(Ordering::SeqCst));
        assert!(!handle.is_finished());

        // Still accepting work.
        assert!(exec.join(&Context::new(), |_| {}).unwrap());
        handle.shutdown().unwrap();

        let stats = exec.stats();
        assert_eq!(stats.faulted, 1);
        assert_eq!(stats.executed, 3);
    }

    #[test]
    fn faulting_join_releases_its_caller() {
        let (exec, handle, _parent) = start(0);

        let completed = exec
            .join(&Context::new(), |_| panic!("join body failed"))
            .unwrap();

        assert!(!completed);
        drain(&exec);
        handle.shutdown().unwrap();
        assert_eq!(exec.stats().faulted, 1);
    }

    #[test]
    fn stop_then_submit_is_queue_closed() {
        let (exec, handle, _parent) = start(4);
        exec.stop().unwrap();

        assert_eq!(exec.enqueue(|_| {}), Err(ExecutorError::QueueClosed));
        assert_eq!(
            exec.join(&Context::new(), |_| {}),
            Err(ExecutorError::QueueClosed)
        );
        handle.join().unwrap();
    }

    #[test]
    fn stop_discards_pending_operations() {
        let (exec, handle, _parent) = start(4);
        let ran = Arc::new(AtomicUsize::new(0));
        let release = hold_worker(&exec);

        for _ in 0..3 {
            let ran = ran.clone();
            exec.enqueue(move |_| {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        exec.stop().unwrap();
        release.send(()).unwrap();
        handle.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        let stats = exec.stats();
        assert_eq!(stats.executed, 1);
        assert_eq!(stats.discarded, 3);
    }

    #[test]
    fn join_discarded_by_stop_returns_false() {
        let (exec, handle, _parent) = start(2);
        let release = hold_worker(&exec);

        let waiting = {
            let exec = exec.clone();
            thread::spawn(move || exec.join(&Context::new(), |_| {}))
        };
        thread::sleep(Duration::from_millis(50));

        exec.stop().unwrap();
        release.send(()).unwrap();

        assert_eq!(waiting.join().unwrap(), Ok(false));
        handle.join().unwrap();
    }

    fn assert_blocked_enqueue_is_closed_by_stop(backlog: usize) {
        let (exec, handle, _parent) = start(backlog);
        let release = hold_worker(&exec);
        for _ in 0..backlog {
            exec.enqueue(|_| {}).unwrap();
        }

        let ran = Arc::new(AtomicBool::new(false));
        let blocked = {
            let exec = exec.clone();
            let ran = ran.clone();
            thread::spawn(move || exec.enqueue(move |_| ran.store(true, Ordering::SeqCst)))
        };
        thread::sleep(Duration::from_millis(50));

        exec.stop().unwrap();
        release.send(()).unwrap();
        handle.join().unwrap();

        assert_eq!(blocked.join().unwrap(), Err(ExecutorError::QueueClosed));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(exec.stats().discarded, backlog as u64);
    }

    #[test]
    fn blocked_enqueue_is_released_by_stop() {
        assert_blocked_enqueue_is_closed_by_stop(0);
    }

    #[test]
    fn blocked_enqueue_on_full_backlog_is_released_by_stop() {
        assert_blocked_enqueue_is_closed_by_stop(1);
        assert_blocked_enqueue_is_closed_by_stop(4);
    }

    #[test]
    fn repeated_stop_never_accepts_a_blocked_enqueue() {
        for _ in 0..20 {
            assert_blocked_enqueue_is_closed_by_stop(1);
        }
    }

    #[test]
    fn in_flight_operation_observes_cancellation() {
        let (exec, handle, _parent) = start(0);
        let (started_tx, started_rx) = mpsc::channel();
        let (seen_tx, seen_rx) = mpsc::channel();

        exec.enqueue(move |ctx| {
            let _ = started_tx.send(());
            while !ctx.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            let _ = seen_tx.send(());
        })
        .unwrap();

        started_rx.recv_timeout(WAIT).unwrap();
        exec.stop().unwrap();
        seen_rx.recv_timeout(WAIT).unwrap();
        handle.join().unwrap();
        assert_eq!(exec.stats().executed, 1);
    }

    #[test]
    fn parent_cancellation_closes_the_queue() {
        let (exec, handle, parent) = start(1);
        parent.cancel();
        handle.join().unwrap();

        // Not stopped, but the consumer is gone.
        assert_eq!(exec.state(), ExecutorState::Ready);
        assert_eq!(exec.enqueue(|_| {}), Err(ExecutorError::QueueClosed));
    }

    #[test]
    fn submitting_from_an_operation_is_rejected() {
        let (exec, handle, _parent) = start(1);
        let inner = Arc::new(Mutex::new(None));

        {
            let exec_ref = exec.clone();
            let inner = inner.clone();
            let completed = exec
                .join(&Context::new(), move |_| {
                    *inner.lock().unwrap() = Some(exec_ref.enqueue(|_| {}));
                })
                .unwrap();
            assert!(completed);
        }

        assert_eq!(*inner.lock().unwrap(), Some(Err(ExecutorError::Reentrant)));
        handle.shutdown().unwrap();
    }

    #[test]
    fn work_submitted_before_initialize_runs_after_start() {
        let exec = Arc::new(SerialExecutor::from_config(
            &ExecutorConfig::default()
                .with_backlog(2)
                .with_poll_interval(Duration::from_millis(5)),
        ));
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..2 {
            let log = log.clone();
            exec.enqueue(move |_| log.lock().unwrap().push(i)).unwrap();
        }

        exec.initialize(&Context::new()).unwrap();
        let handle = spawn(exec.clone()).unwrap();
        drain(&exec);

        assert_eq!(*log.lock().unwrap(), vec![0, 1]);
        handle.shutdown().unwrap();
    }

    #[test]
    fn three_producers_with_backlog_one_do_not_interleave() {
        let (exec, handle, _parent) = start(1);
        let log = Arc::new(Mutex::new(Vec::new()));

        let producers: Vec<_> = (1..=3)
            .map(|id| {
                let exec = exec.clone();
                let log = log.clone();
                thread::spawn(move || {
                    exec.join(&Context::new(), move |_| {
                        log.lock().unwrap().push(format!("start {id}"));
                        thread::sleep(Duration::from_millis(5));
                        log.lock().unwrap().push(format!("end {id}"));
                    })
                    .unwrap()
                })
            })
            .collect();
        for p in producers {
            assert!(p.join().unwrap());
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 6);
        let mut ids: Vec<_> = log
            .chunks(2)
            .map(|pair| {
                let id = pair[0].trim_start_matches("start ");
                assert_eq!(pair[1], format!("end {id}"));
                id.to_string()
            })
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2", "3"]);
        handle.shutdown().unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            ..ProptestConfig::default()
        })]

        /// Property: whatever the backlog, a single producer's operations run
        /// in exactly the order they were enqueued.
        #[test]
        fn fifo_for_any_backlog(count in 1usize..60, backlog in 0usize..5) {
            let (exec, handle, _parent) = start(backlog);
            let log = Arc::new(Mutex::new(Vec::new()));

            for i in 0..count {
                let log = log.clone();
                exec.enqueue(move |_| log.lock().unwrap().push(i)).unwrap();
            }
            drain(&exec);

            prop_assert_eq!(log.lock().unwrap().clone(), (0..count).collect::<Vec<_>>());
            handle.shutdown().unwrap();
        }
    }
}

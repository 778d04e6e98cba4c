// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous fan-in from recorder threads to a single worker thread.
//!
//! Recording paths hand a [`QueueEvent`] to [`EventQueue::enqueue`], which
//! never blocks; a dedicated consumer thread runs each event's `process` in
//! FIFO order. On overflow the oldest pending event is dropped and counted,
//! the enqueue itself still succeeds.

use crate::MutexExt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};
use tracing::error;

/// Default buffer capacity for both queue flavors.
pub const DEFAULT_CAPACITY: usize = 8192;

const WORKER_THREAD_NAME: &str = "obs-event-queue";
// How long the ring worker sleeps between polls when idle. Enqueues unpark
// it immediately; the timeout only bounds the window of a lost wakeup during
// worker startup.
const RING_IDLE_PARK: Duration = Duration::from_millis(50);

/// A unit of deferred work produced by a recording path.
pub trait QueueEvent: Send {
    /// Runs on the queue's worker thread, in the order enqueues returned.
    fn process(self: Box<Self>);
}

/// Counters exposed by a queue. `dropped` covers overflow evictions;
/// `handler_panics` counts events whose `process` panicked (the panic never
/// reaches a producer).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQueueStats {
    pub enqueued: u64,
    pub processed: u64,
    pub dropped: u64,
    pub handler_panics: u64,
}

/// The asynchronous pipe between recorder threads and the worker.
///
/// Both implementations guarantee happens-before between `enqueue` and the
/// matching `process`, FIFO order per producer, and drain-on-shutdown.
pub trait EventQueue: Send + Sync + Debug {
    /// Hands an event to the worker. Returns promptly in all cases; on
    /// overflow the oldest pending event is dropped and counted instead.
    fn enqueue(&self, event: Box<dyn QueueEvent>);

    fn stats(&self) -> EventQueueStats;

    /// Blocks until every event enqueued before this call has been processed
    /// or dropped, or until `timeout` elapses. Returns false on timeout.
    fn flush(&self, timeout: Duration) -> bool;

    /// Signals the worker to stop, waits for it to drain pending events and
    /// exit. Idempotent; events enqueued afterwards are counted as dropped.
    fn shutdown(&self);
}

/// Runs one event, containing any panic. Returns true if the handler
/// panicked.
fn run_event(event: Box<dyn QueueEvent>) -> bool {
    let panicked = catch_unwind(AssertUnwindSafe(|| event.process())).is_err();
    if panicked {
        error!("event queue handler panicked; event discarded");
    }
    panicked
}

// ---------------------------------------------------------------------------
// Simple flavor: single lock + deque. The reference implementation used by
// tests and low-volume profiles.
// ---------------------------------------------------------------------------

struct SimpleState {
    queue: VecDeque<Box<dyn QueueEvent>>,
    stats: EventQueueStats,
    stopping: bool,
}

struct SimpleShared {
    capacity: usize,
    state: Mutex<SimpleState>,
    /// Signals the worker that the queue is non-empty or stopping.
    work_available: Condvar,
    /// Signals flushers that `processed + dropped` advanced.
    progress: Condvar,
}

/// Coarse-locked queue flavor.
pub struct SimpleEventQueue {
    shared: Arc<SimpleShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimpleEventQueue {
    pub fn start(capacity: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(capacity > 0, "event queue capacity must be positive");
        let shared = Arc::new(SimpleShared {
            capacity,
            state: Mutex::new(SimpleState {
                queue: VecDeque::new(),
                stats: EventQueueStats::default(),
                stopping: false,
            }),
            work_available: Condvar::new(),
            progress: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || simple_worker_loop(worker_shared))?;
        Ok(SimpleEventQueue {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }
}

fn simple_worker_loop(shared: Arc<SimpleShared>) {
    loop {
        let mut state = shared.state.lock_or_panic();
        let event = loop {
            if let Some(event) = state.queue.pop_front() {
                break Some(event);
            }
            if state.stopping {
                break None;
            }
            #[allow(clippy::unwrap_used)]
            {
                state = shared.work_available.wait(state).unwrap();
            }
        };
        let Some(event) = event else {
            return;
        };
        drop(state);

        let panicked = run_event(event);

        let mut state = shared.state.lock_or_panic();
        state.stats.processed += 1;
        if panicked {
            state.stats.handler_panics += 1;
        }
        drop(state);
        shared.progress.notify_all();
    }
}

impl EventQueue for SimpleEventQueue {
    fn enqueue(&self, event: Box<dyn QueueEvent>) {
        let mut state = self.shared.state.lock_or_panic();
        state.stats.enqueued += 1;
        if state.stopping {
            state.stats.dropped += 1;
            drop(state);
            self.shared.progress.notify_all();
            return;
        }
        if state.queue.len() == self.shared.capacity {
            state.queue.pop_front();
            state.stats.dropped += 1;
        }
        state.queue.push_back(event);
        drop(state);
        self.shared.work_available.notify_one();
    }

    fn stats(&self) -> EventQueueStats {
        self.shared.state.lock_or_panic().stats
    }

    fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock_or_panic();
        let target = state.stats.enqueued;
        while state.stats.processed + state.stats.dropped < target {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            #[allow(clippy::unwrap_used)]
            {
                state = self.shared.progress.wait_timeout(state, remaining).unwrap().0;
            }
        }
        true
    }

    fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock_or_panic();
            state.stopping = true;
        }
        self.shared.work_available.notify_all();
        let handle = self.worker.lock_or_panic().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Debug for SimpleEventQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleEventQueue")
            .field("capacity", &self.shared.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Drop for SimpleEventQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Ring flavor: lock-free bounded ring, worker woken by unpark. The
// production flavor for hot recording paths.
// ---------------------------------------------------------------------------

struct RingShared {
    ring: crossbeam_queue::ArrayQueue<Box<dyn QueueEvent>>,
    stopping: AtomicBool,
    enqueued: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    handler_panics: AtomicU64,
    /// Set once by the worker at startup; enqueues unpark through it.
    worker_thread: OnceLock<Thread>,
    progress_lock: Mutex<()>,
    progress: Condvar,
}

impl RingShared {
    fn snapshot(&self) -> EventQueueStats {
        EventQueueStats {
            enqueued: self.enqueued.load(Ordering::Acquire),
            processed: self.processed.load(Ordering::Acquire),
            dropped: self.dropped.load(Ordering::Acquire),
            handler_panics: self.handler_panics.load(Ordering::Acquire),
        }
    }

    fn note_progress(&self) {
        drop(self.progress_lock.lock_or_panic());
        self.progress.notify_all();
    }
}

/// Lock-free queue flavor backed by a bounded MPMC ring sized to a power of
/// two. Overflow displaces the oldest pending event.
pub struct RingEventQueue {
    shared: Arc<RingShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RingEventQueue {
    pub fn start(capacity: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(capacity > 0, "event queue capacity must be positive");
        let shared = Arc::new(RingShared {
            ring: crossbeam_queue::ArrayQueue::new(capacity.next_power_of_two()),
            stopping: AtomicBool::new(false),
            enqueued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
            worker_thread: OnceLock::new(),
            progress_lock: Mutex::new(()),
            progress: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || ring_worker_loop(worker_shared))?;
        Ok(RingEventQueue {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }
}

fn ring_worker_loop(shared: Arc<RingShared>) {
    let _ = shared.worker_thread.set(thread::current());
    loop {
        let mut did_work = false;
        while let Some(event) = shared.ring.pop() {
            if run_event(event) {
                shared.handler_panics.fetch_add(1, Ordering::Release);
            }
            shared.processed.fetch_add(1, Ordering::Release);
            did_work = true;
        }
        if did_work {
            shared.note_progress();
        }
        if shared.stopping.load(Ordering::Acquire) {
            // Drain whatever raced in between the last pop and the flag.
            while let Some(event) = shared.ring.pop() {
                if run_event(event) {
                    shared.handler_panics.fetch_add(1, Ordering::Release);
                }
                shared.processed.fetch_add(1, Ordering::Release);
            }
            shared.note_progress();
            return;
        }
        thread::park_timeout(RING_IDLE_PARK);
    }
}

impl EventQueue for RingEventQueue {
    fn enqueue(&self, event: Box<dyn QueueEvent>) {
        self.shared.enqueued.fetch_add(1, Ordering::Release);
        if self.shared.stopping.load(Ordering::Acquire) {
            self.shared.dropped.fetch_add(1, Ordering::Release);
            self.shared.note_progress();
            return;
        }
        if self.shared.ring.force_push(event).is_some() {
            // The displaced entry was the oldest pending one.
            self.shared.dropped.fetch_add(1, Ordering::Release);
        }
        if let Some(worker) = self.shared.worker_thread.get() {
            worker.unpark();
        }
    }

    fn stats(&self) -> EventQueueStats {
        self.shared.snapshot()
    }

    fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let target = self.shared.enqueued.load(Ordering::Acquire);
        let mut guard = self.shared.progress_lock.lock_or_panic();
        loop {
            let stats = self.shared.snapshot();
            if stats.processed + stats.dropped >= target {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            #[allow(clippy::unwrap_used)]
            {
                guard = self.shared.progress.wait_timeout(guard, remaining).unwrap().0;
            }
        }
    }

    fn shutdown(&self) {
        self.shared.stopping.store(true, Ordering::Release);
        if let Some(worker) = self.shared.worker_thread.get() {
            worker.unpark();
        }
        let handle = self.worker.lock_or_panic().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Debug for RingEventQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingEventQueue")
            .field("capacity", &self.shared.ring.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Drop for RingEventQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct RecordingEvent {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl QueueEvent for RecordingEvent {
        fn process(self: Box<Self>) {
            self.log.lock().unwrap().push(self.id);
        }
    }

    /// Announces that the worker reached it, then blocks the worker until
    /// the paired sender is pinged.
    struct GateEvent {
        entered: mpsc::Sender<()>,
        gate: mpsc::Receiver<()>,
    }

    impl QueueEvent for GateEvent {
        fn process(self: Box<Self>) {
            let _ = self.entered.send(());
            let _ = self.gate.recv();
        }
    }

    struct PanicEvent;

    impl QueueEvent for PanicEvent {
        fn process(self: Box<Self>) {
            panic!("boom");
        }
    }

    fn recording(id: usize, log: &Arc<Mutex<Vec<usize>>>) -> Box<dyn QueueEvent> {
        Box::new(RecordingEvent {
            id,
            log: Arc::clone(log),
        })
    }

    fn fifo_order_case(queue: &dyn EventQueue) {
        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 0..100 {
            queue.enqueue(recording(id, &log));
        }
        assert!(queue.flush(Duration::from_secs(5)));
        assert_eq!(*log.lock().unwrap(), (0..100).collect::<Vec<_>>());
        let stats = queue.stats();
        assert_eq!(stats.enqueued, 100);
        assert_eq!(stats.processed, 100);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_simple_fifo_order() {
        fifo_order_case(&SimpleEventQueue::start(DEFAULT_CAPACITY).unwrap());
    }

    #[test]
    fn test_ring_fifo_order() {
        fifo_order_case(&RingEventQueue::start(DEFAULT_CAPACITY).unwrap());
    }

    fn overflow_drops_oldest_case(queue: &dyn EventQueue, capacity: usize) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (gate_tx, gate_rx) = mpsc::channel();
        let (entered_tx, entered_rx) = mpsc::channel();
        // Park the worker inside an event so the buffer fills deterministically.
        queue.enqueue(Box::new(GateEvent {
            entered: entered_tx,
            gate: gate_rx,
        }));
        entered_rx.recv().unwrap();
        for id in 0..capacity + 3 {
            queue.enqueue(recording(id, &log));
        }
        gate_tx.send(()).unwrap();
        assert!(queue.flush(Duration::from_secs(5)));

        let stats = queue.stats();
        assert_eq!(stats.enqueued, capacity as u64 + 4);
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.enqueued - stats.dropped, stats.processed);
        // The oldest events were displaced, the newest survived in order.
        assert_eq!(*log.lock().unwrap(), (3..capacity + 3).collect::<Vec<_>>());
    }

    #[test]
    fn test_simple_overflow_drops_oldest() {
        let queue = SimpleEventQueue::start(16).unwrap();
        overflow_drops_oldest_case(&queue, 16);
    }

    #[test]
    fn test_ring_overflow_drops_oldest() {
        // 16 is already a power of two so the declared capacity is exact.
        let queue = RingEventQueue::start(16).unwrap();
        overflow_drops_oldest_case(&queue, 16);
    }

    fn handler_panic_case(queue: &dyn EventQueue) {
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.enqueue(Box::new(PanicEvent));
        queue.enqueue(recording(7, &log));
        assert!(queue.flush(Duration::from_secs(5)));
        let stats = queue.stats();
        assert_eq!(stats.handler_panics, 1);
        assert_eq!(stats.processed, 2);
        // The panic did not take the worker down.
        assert_eq!(*log.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_simple_handler_panic_is_contained() {
        handler_panic_case(&SimpleEventQueue::start(DEFAULT_CAPACITY).unwrap());
    }

    #[test]
    fn test_ring_handler_panic_is_contained() {
        handler_panic_case(&RingEventQueue::start(DEFAULT_CAPACITY).unwrap());
    }

    fn shutdown_drains_case(queue: &dyn EventQueue) {
        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 0..50 {
            queue.enqueue(recording(id, &log));
        }
        queue.shutdown();
        // shutdown joined the worker, so everything pending was processed.
        assert_eq!(*log.lock().unwrap(), (0..50).collect::<Vec<_>>());

        // Enqueues after shutdown are counted as drops, not lost silently.
        queue.enqueue(recording(99, &log));
        let stats = queue.stats();
        assert_eq!(stats.enqueued, 51);
        assert_eq!(stats.dropped, 1);
        assert_eq!(*log.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_simple_shutdown_drains() {
        shutdown_drains_case(&SimpleEventQueue::start(DEFAULT_CAPACITY).unwrap());
    }

    #[test]
    fn test_ring_shutdown_drains() {
        shutdown_drains_case(&RingEventQueue::start(DEFAULT_CAPACITY).unwrap());
    }

    #[test]
    fn test_two_producers_keep_per_producer_order() {
        let queue = Arc::new(RingEventQueue::start(DEFAULT_CAPACITY).unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for producer in 0..2usize {
            let queue = Arc::clone(&queue);
            let log = Arc::clone(&log);
            handles.push(thread::spawn(move || {
                for seq in 0..1000usize {
                    queue.enqueue(recording(producer * 1_000_000 + seq, &log));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(queue.flush(Duration::from_secs(10)));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2000);
        for producer in 0..2usize {
            let seqs: Vec<usize> = log
                .iter()
                .filter(|id| *id / 1_000_000 == producer)
                .map(|id| id % 1_000_000)
                .collect();
            assert_eq!(seqs, (0..1000).collect::<Vec<_>>());
        }
    }
}

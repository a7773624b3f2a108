//! Ingestion queue between capture and delivery
//!
//! Producers call [`IngestionQueue::enqueue`] from any thread; it only pushes
//! onto an in-memory FIFO and wakes the drain task. A single long-lived drain
//! task pops records one at a time, encodes them, submits them and reports the
//! result. Failed records are dropped; nothing is retried or persisted.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::types::EventRecord;

use super::client::{DeliveryClient, Outcome};
use super::codec;
use super::sink::{DeliveryReport, DeliverySink, Disposition, TracingSink};

/// Whether the drain task has work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Draining,
}

/// Relay statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RelayStats {
    /// Events the server acknowledged
    pub delivered: usize,
    /// Events the server answered with a non-success status
    pub rejected: usize,
    /// Events lost to network errors
    pub transport_failures: usize,
    /// Events dropped before sending
    pub encoding_failures: usize,
}

impl RelayStats {
    pub fn processed(&self) -> usize {
        self.delivered + self.rejected + self.transport_failures + self.encoding_failures
    }
}

#[derive(Default)]
struct StatCounters {
    delivered: AtomicUsize,
    rejected: AtomicUsize,
    transport_failures: AtomicUsize,
    encoding_failures: AtomicUsize,
}

impl StatCounters {
    fn count(&self, disposition: &Disposition) {
        let counter = match disposition {
            Disposition::Delivered => &self.delivered,
            Disposition::Rejected(_) => &self.rejected,
            Disposition::TransportFailure(_) => &self.transport_failures,
            Disposition::EncodingFailure(_) => &self.encoding_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RelayStats {
        RelayStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            encoding_failures: self.encoding_failures.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    buffer: Mutex<VecDeque<EventRecord>>,
    /// Signalled on every enqueue; holds a permit if the drain task is busy
    wake: Notify,
    /// Signalled each time the drain task runs out of records
    idle: Notify,
    /// Set while the drain task may be holding a popped record
    draining: AtomicBool,
    stats: StatCounters,
}

impl Shared {
    // Push/pop cannot leave the deque half-updated, so a poisoned lock is still usable
    fn buffer(&self) -> MutexGuard<'_, VecDeque<EventRecord>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pop_front(&self) -> Option<EventRecord> {
        self.buffer().pop_front()
    }

    fn is_idle(&self) -> bool {
        !self.draining.load(Ordering::SeqCst) && self.buffer().is_empty()
    }
}

/// Unbounded FIFO feeding a single delivery task
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct IngestionQueue {
    shared: Arc<Shared>,
}

impl IngestionQueue {
    /// Create the queue and spawn its drain task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(client: Arc<dyn DeliveryClient>, sink: Arc<dyn DeliverySink>) -> Self {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            idle: Notify::new(),
            draining: AtomicBool::new(false),
            stats: StatCounters::default(),
        });

        tokio::spawn(drain(Arc::clone(&shared), client, sink));

        Self { shared }
    }

    /// Start a queue that reports through [`TracingSink`]
    pub fn with_tracing(client: Arc<dyn DeliveryClient>) -> Self {
        Self::start(client, Arc::new(TracingSink))
    }

    /// Append a record and return immediately.
    pub fn enqueue(&self, record: EventRecord) {
        self.shared.buffer().push_back(record);
        self.shared.wake.notify_one();
    }

    /// Records waiting to be sent, oldest first. Does not include the record
    /// currently being submitted.
    pub fn inspect(&self) -> Vec<EventRecord> {
        self.shared.buffer().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shared.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.buffer().is_empty()
    }

    pub fn state(&self) -> QueueState {
        if self.shared.is_idle() {
            QueueState::Idle
        } else {
            QueueState::Draining
        }
    }

    pub fn stats(&self) -> RelayStats {
        self.shared.stats.snapshot()
    }

    /// Wait until every enqueued record has been reported.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

async fn drain(shared: Arc<Shared>, client: Arc<dyn DeliveryClient>, sink: Arc<dyn DeliverySink>) {
    loop {
        shared.draining.store(true, Ordering::SeqCst);

        while let Some(record) = shared.pop_front() {
            let disposition = dispatch(&client, &record).await;
            shared.stats.count(&disposition);
            send_report(sink.as_ref(), &DeliveryReport::new(&record, disposition));
        }

        shared.draining.store(false, Ordering::SeqCst);
        shared.idle.notify_waiters();

        // An enqueue that raced the empty check left a permit, so this returns at once
        shared.wake.notified().await;
    }
}

fn send_report(sink: &dyn DeliverySink, report: &DeliveryReport) {
    if panic::catch_unwind(AssertUnwindSafe(|| sink.record(report))).is_err() {
        tracing::error!(
            source_id = %report.source_id,
            outcome = report.disposition.kind(),
            "Delivery sink panicked"
        );
    }
}

async fn dispatch(client: &Arc<dyn DeliveryClient>, record: &EventRecord) -> Disposition {
    let wire = match codec::encode(record) {
        Ok(wire) => wire,
        Err(e) => return Disposition::EncodingFailure(e.to_string()),
    };

    // Own task so a panicking client costs one record, not the drain loop
    let client = Arc::clone(client);
    let submission = tokio::spawn(async move { client.submit(&wire).await });

    match submission.await {
        Ok(outcome) => outcome.into(),
        Err(e) => Outcome::TransportFailure(format!("delivery task failed: {}", e)).into(),
    }
}

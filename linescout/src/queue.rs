//! Bounded handoff queue between the directory walker and the scanning workers.
//!
//! One producer, any number of consumers, FIFO. A push into a full queue blocks
//! the walker until a worker makes room, so discovery never runs unboundedly
//! ahead of scanning and nothing is dropped. A pop from an empty queue blocks
//! the worker until a path arrives or the producer closes the queue.
//!
//! Closing is explicit through [`FileQueueProducer::close`] and implicit when
//! the producer is dropped, so every walker exit path, fatal ones included,
//! wakes the consumers. Paths already queued at close time are still handed
//! out; after that every pop returns `None`.
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Default number of queued paths before the walker blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// The queue was closed, or every consumer went away. Carries back the path
/// that could not be delivered.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("file queue is closed")]
pub struct QueueClosed(pub PathBuf);

/// Why a non-blocking push did not enqueue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TryPushError {
    #[error("file queue is full")]
    Full(PathBuf),
    #[error("file queue is closed")]
    Closed(PathBuf),
}

/// Counters shared by both ends of the queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Paths accepted by the queue
    pub pushed: AtomicU64,

    /// Paths handed to consumers
    pub popped: AtomicU64,

    /// Pushes that found the queue full and had to wait
    pub backpressure_events: AtomicU64,
}

impl QueueStats {
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn popped(&self) -> u64 {
        self.popped.load(Ordering::Relaxed)
    }

    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Creates a queue holding at most `capacity` paths.
///
/// A `capacity` of zero is raised to one; a rendezvous channel would make
/// every push wait for a consumer.
pub fn file_queue(capacity: usize) -> (FileQueueProducer, FileQueueConsumer) {
    let capacity = capacity.max(1);
    let (sender, receiver) = bounded(capacity);
    let stats = Arc::new(QueueStats::default());

    let producer = FileQueueProducer {
        sender: Some(sender),
        capacity,
        stats: Arc::clone(&stats),
    };
    let consumer = FileQueueConsumer { receiver, stats };
    (producer, consumer)
}

/// Sending end, owned by the walker
#[derive(Debug)]
pub struct FileQueueProducer {
    sender: Option<Sender<PathBuf>>,
    capacity: usize,
    stats: Arc<QueueStats>,
}

impl FileQueueProducer {
    /// Enqueues `path`, blocking while the queue is full.
    pub fn push(&self, path: PathBuf) -> Result<(), QueueClosed> {
        let Some(sender) = &self.sender else {
            return Err(QueueClosed(path));
        };

        let path = match sender.try_send(path) {
            Ok(()) => {
                self.stats.pushed.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(TrySendError::Disconnected(path)) => return Err(QueueClosed(path)),
            Err(TrySendError::Full(path)) => path,
        };

        self.stats
            .backpressure_events
            .fetch_add(1, Ordering::Relaxed);
        sender.send(path).map_err(|e| QueueClosed(e.into_inner()))?;
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Enqueues `path` only if there is room right now.
    pub fn try_push(&self, path: PathBuf) -> Result<(), TryPushError> {
        let Some(sender) = &self.sender else {
            return Err(TryPushError::Closed(path));
        };
        match sender.try_send(path) {
            Ok(()) => {
                self.stats.pushed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(path)) => Err(TryPushError::Full(path)),
            Err(TrySendError::Disconnected(path)) => Err(TryPushError::Closed(path)),
        }
    }

    /// Signals end of stream. Idempotent.
    pub fn close(&mut self) {
        self.sender.take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Paths currently waiting in the queue
    pub fn len(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

/// Receiving end; clone one per worker
#[derive(Debug, Clone)]
pub struct FileQueueConsumer {
    receiver: Receiver<PathBuf>,
    stats: Arc<QueueStats>,
}

impl FileQueueConsumer {
    /// Takes the next path, blocking while the queue is empty.
    ///
    /// Returns `None` once the producer has closed and the queue is drained.
    pub fn pop(&self) -> Option<PathBuf> {
        let path = self.receiver.recv().ok()?;
        self.stats.popped.fetch_add(1, Ordering::Relaxed);
        Some(path)
    }

    /// Takes the next path if one is ready.
    pub fn try_pop(&self) -> Option<PathBuf> {
        let path = self.receiver.try_recv().ok()?;
        self.stats.popped.fetch_add(1, Ordering::Relaxed);
        Some(path)
    }

    /// Blocking iterator over paths until the queue is closed and drained.
    pub fn iter(&self) -> impl Iterator<Item = PathBuf> + '_ {
        std::iter::from_fn(move || self.pop())
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}

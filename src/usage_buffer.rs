//! Buffered, non-blocking usage recording.
//!
//! The request path calls `push()`, which is a lock-free bounded-channel
//! send and never waits on the database. A background tokio worker drains
//! the channel on a flush interval and writes batches through a
//! [`UsageSink`]. When the channel is full, new events are dropped and
//! counted. Delivery is at-most-once, best-effort.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::{models::UsageEvent, usage_sink::UsageSink};

#[derive(Debug, Clone)]
pub struct UsageBufferConfig {
    /// Maximum events per flushed batch.
    pub max_size: usize,
    /// Maximum time between flushes.
    pub flush_interval: Duration,
    /// Channel capacity; beyond it new events are dropped.
    pub max_pending_entries: usize,
}

impl Default for UsageBufferConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            flush_interval: Duration::from_secs(1),
            max_pending_entries: 10_000,
        }
    }
}

impl From<&crate::config::UsageBufferConfig> for UsageBufferConfig {
    fn from(config: &crate::config::UsageBufferConfig) -> Self {
        Self {
            max_size: config.max_size,
            flush_interval: Duration::from_millis(config.flush_interval_ms),
            max_pending_entries: config.max_pending_entries,
        }
    }
}

pub struct UsageLogBuffer {
    sender: Sender<UsageEvent>,
    /// Consumed only by the flush worker.
    receiver: Receiver<UsageEvent>,
    config: UsageBufferConfig,
    shutdown: AtomicBool,
    dropped_count: AtomicU64,
}

impl UsageLogBuffer {
    pub fn new(config: UsageBufferConfig) -> Self {
        let capacity = if config.max_pending_entries > 0 {
            config.max_pending_entries
        } else {
            // Unbounded is risky; large but bounded instead.
            1_000_000
        };
        let (sender, receiver) = crossbeam_channel::bounded(capacity);

        Self {
            sender,
            receiver,
            config,
            shutdown: AtomicBool::new(false),
            dropped_count: AtomicU64::new(0),
        }
    }

    /// Enqueue one event. Lock-free; drops the event when the channel is
    /// at capacity.
    pub fn push(&self, event: UsageEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let count = self.dropped_count.fetch_add(1, Ordering::Relaxed);
                // Every 100 drops, not per drop.
                if count % 100 == 0 {
                    tracing::warn!(
                        dropped_count = count + 1,
                        max_pending = self.config.max_pending_entries,
                        "usage buffer overflow, dropping events"
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                // Worker already gone during shutdown.
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    /// Spawn the background flush worker. Runs until `shutdown()`, then
    /// drains whatever is left and exits.
    pub fn start_worker(self: &Arc<Self>, sink: Arc<dyn UsageSink>) -> tokio::task::JoinHandle<()> {
        let buffer = Arc::clone(self);
        let flush_interval = self.config.flush_interval;
        let max_batch_size = self.config.max_size;

        tokio::spawn(async move {
            let mut batch = Vec::with_capacity(max_batch_size);

            loop {
                buffer.drain_entries(&mut batch, max_batch_size);
                if !batch.is_empty() {
                    flush_batch(&sink, &mut batch).await;
                }

                if buffer.shutdown.load(Ordering::Acquire) {
                    buffer.drain_all(&mut batch);
                    if !batch.is_empty() {
                        flush_batch(&sink, &mut batch).await;
                    }
                    tracing::info!("usage buffer worker shutting down");
                    break;
                }

                tokio::time::sleep(flush_interval).await;
            }
        })
    }

    fn drain_entries(&self, batch: &mut Vec<UsageEvent>, max_size: usize) {
        while batch.len() < max_size {
            match self.receiver.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }
    }

    fn drain_all(&self, batch: &mut Vec<UsageEvent>) {
        while let Ok(event) = self.receiver.try_recv() {
            batch.push(event);
        }
    }

    /// Signal the worker to drain and stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

async fn flush_batch(sink: &Arc<dyn UsageSink>, batch: &mut Vec<UsageEvent>) {
    let event_count = batch.len();
    tracing::debug!(count = event_count, "flushing usage buffer");

    match sink.write_batch(batch).await {
        Ok(written) => {
            tracing::debug!(written, total = event_count, "usage flush complete");
        }
        Err(e) => {
            // Dropped on the floor: recording is best-effort and must not
            // fail the requests these events belong to.
            tracing::error!(error = %e, count = event_count, "usage flush failed");
        }
    }

    batch.clear();
}

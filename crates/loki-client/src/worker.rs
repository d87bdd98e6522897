// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single background consumer of the entry queue.
//!
//! The worker accumulates entries into a batch and flushes it when any of
//! three triggers fires: the batch reaches its entry cap, appending a line
//! would cross the byte cap, or the periodic timer elapses. On shutdown it
//! drains whatever is immediately queued and performs a final flush on a
//! background token so the close signal cannot shoot down in-flight data.

use crate::config::Config;
use crate::encoder::encode_batch;
use crate::entry::Entry;
use crate::error::ClientError;
use crate::metrics::Counters;
use crate::retry::retry_push;
use crate::transport::LokiTransport;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Once the backing buffer has grown past this multiple of the entry cap,
/// the next reset reallocates at the baseline instead of reusing it, so a
/// transient spike cannot pin memory for the life of the client.
const BATCH_SHRINK_FACTOR: usize = 4;

/// The worker's accumulation buffer plus its running line-byte total.
struct Batch {
    entries: Vec<Entry>,
    bytes: usize,
    baseline: usize,
}

impl Batch {
    fn new(baseline: usize) -> Self {
        Batch {
            entries: Vec::with_capacity(baseline),
            bytes: 0,
            baseline,
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// Flush-before-append rule: `true` when appending `line_len` more
    /// bytes would cross either cap. A single oversized line on an empty
    /// batch still returns `true`, which makes the preceding flush a no-op
    /// and lets the line form a batch of one.
    fn should_flush_before(&self, line_len: usize, max_entries: usize, max_bytes: usize) -> bool {
        self.entries.len() >= max_entries || self.bytes + line_len > max_bytes
    }

    fn push(&mut self, entry: Entry) {
        self.bytes += entry.line.len();
        self.entries.push(entry);
    }

    /// Clears the batch for reuse, reallocating if the buffer ballooned.
    fn reset(&mut self) {
        if self.entries.capacity() > self.baseline * BATCH_SHRINK_FACTOR {
            self.entries = Vec::with_capacity(self.baseline);
        } else {
            self.entries.clear();
        }
        self.bytes = 0;
    }
}

pub(crate) struct Worker {
    config: Arc<Config>,
    queue: flume::Receiver<Entry>,
    cancel: CancellationToken,
    transport: LokiTransport,
    counters: Arc<Counters>,
    last_error: Arc<Mutex<Option<ClientError>>>,
}

impl Worker {
    pub(crate) fn new(
        config: Arc<Config>,
        queue: flume::Receiver<Entry>,
        cancel: CancellationToken,
        transport: LokiTransport,
        counters: Arc<Counters>,
        last_error: Arc<Mutex<Option<ClientError>>>,
    ) -> Self {
        Worker {
            config,
            queue,
            cancel,
            transport,
            counters,
            last_error,
        }
    }

    /// Event loop. Runs until the cancellation token fires (graceful
    /// shutdown with drain) or every producer handle is gone.
    pub(crate) async fn run(self) {
        debug!("loki worker started");
        let mut ticker = interval_at(
            Instant::now() + self.config.batch_max_wait,
            self.config.batch_max_wait,
        );
        let mut batch = Batch::new(self.config.batch_max_entries);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("loki worker received shutdown signal, draining queue");
                    while let Ok(entry) = self.queue.try_recv() {
                        self.append(&mut batch, entry).await;
                    }
                    self.flush(&mut batch).await;
                    debug!("loki worker stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.flush(&mut batch).await;
                }
                received = self.queue.recv_async() => {
                    match received {
                        Ok(entry) => self.append(&mut batch, entry).await,
                        Err(_) => {
                            // Every sender is gone; nothing more can arrive.
                            self.flush(&mut batch).await;
                            debug!("loki worker stopped: queue disconnected");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Merges one entry into the batch, flushing first when appending
    /// would cross a cap and flushing again once the entry cap is reached.
    async fn append(&self, batch: &mut Batch, entry: Entry) {
        if batch.should_flush_before(
            entry.line.len(),
            self.config.batch_max_entries,
            self.config.batch_max_bytes,
        ) {
            self.flush(batch).await;
        }
        batch.push(entry);
        if batch.len() >= self.config.batch_max_entries {
            self.flush(batch).await;
        }
    }

    /// One encode+push cycle including retries. No-op on an empty batch.
    ///
    /// Flushes always run on a background token: shutdown must not cancel
    /// the very payload being drained. Counter updates and the flush
    /// callback happen per attempt, inside the retry loop.
    async fn flush(&self, batch: &mut Batch) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len() as u64;
        debug!("flushing {} entries", count);

        let payload = match encode_batch(
            self.config.encoding,
            &self.config.static_labels,
            &batch.entries,
        ) {
            Ok(payload) => payload,
            Err(err) => {
                // Build failures never reach the retry loop, so they skip
                // the per-attempt counter and callback path entirely.
                self.record_error(ClientError::Push(err));
                batch.reset();
                return;
            }
        };

        let background = CancellationToken::new();
        let result = retry_push(&background, &self.config.retry, |attempt| {
            let transport = &self.transport;
            let counters = &self.counters;
            let payload = &payload;
            let cancel = &background;
            async move {
                let outcome = transport.push(payload, cancel).await;
                match &outcome {
                    Ok(()) => {
                        counters.pushed.fetch_add(count, Ordering::Relaxed);
                    }
                    Err(_) => {
                        counters.push_errors.fetch_add(count, Ordering::Relaxed);
                    }
                }
                if attempt > 0 {
                    counters.retries.fetch_add(1, Ordering::Relaxed);
                }
                self.report_flush();
                outcome
            }
        })
        .await;

        if let Err(err) = result {
            error!("failed to push batch of {} entries: {}", count, err);
            self.record_error(err);
        }
        batch.reset();
    }

    fn report_flush(&self) {
        if let Some(on_flush) = &self.config.on_flush {
            on_flush(self.counters.snapshot());
        }
    }

    /// Stores `err` as the client's last flush error and notifies the
    /// error callback. Cancellation is never recorded.
    fn record_error(&self, err: ClientError) {
        if matches!(err, ClientError::Cancelled) {
            return;
        }
        if let Some(on_error) = &self.config.on_error {
            on_error(&err);
        }
        let mut slot = match self.last_error.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(err);
    }
}

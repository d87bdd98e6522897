// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The client façade: construction, enqueue and graceful shutdown.

use crate::backpressure::{offer, Offer};
use crate::config::Config;
use crate::entry::Entry;
use crate::error::ClientError;
use crate::metrics::{Counters, Metrics};
use crate::transport::LokiTransport;
use crate::worker::Worker;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Asynchronous batching client for the Loki push API.
///
/// Construction validates the configuration and spawns the single
/// background worker. Any number of tasks may call [`Client::send`]
/// concurrently; they contend only on the bounded queue.
pub struct Client {
    config: Arc<Config>,
    queue_tx: flume::Sender<Entry>,
    // Head handle of the queue, used by the drop-oldest gate to evict.
    queue_rx: flume::Receiver<Entry>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
    last_error: Arc<Mutex<Option<ClientError>>>,
}

impl Client {
    /// Validates `config`, creates the bounded queue and starts the
    /// worker. Must be called within a tokio runtime.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        config.validate()?;
        let config = Arc::new(config);
        let transport = LokiTransport::new(&config)?;
        let (queue_tx, queue_rx) = flume::bounded(config.queue_size);
        let cancel = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let last_error = Arc::new(Mutex::new(None));

        let worker = Worker::new(
            Arc::clone(&config),
            queue_rx.clone(),
            cancel.clone(),
            transport,
            Arc::clone(&counters),
            Arc::clone(&last_error),
        );
        let handle = tokio::spawn(worker.run());

        Ok(Client {
            config,
            queue_tx,
            queue_rx,
            cancel,
            worker: Mutex::new(Some(handle)),
            counters,
            last_error,
        })
    }

    /// Enqueues one entry under the configured backpressure mode.
    ///
    /// A `None` timestamp is stamped with the current wall-clock UTC. The
    /// error is [`ClientError::Dropped`] when backpressure rejected the
    /// entry and [`ClientError::Cancelled`] when `cancel` fired first.
    pub async fn send(&self, cancel: &CancellationToken, mut entry: Entry) -> Result<(), ClientError> {
        if entry.timestamp.is_none() {
            entry.timestamp = Some(Utc::now());
        }
        let outcome = offer(
            cancel,
            &self.queue_tx,
            &self.queue_rx,
            entry,
            self.config.backpressure_mode,
        )
        .await;
        match outcome {
            Offer::Accepted { evicted } => {
                self.count_drops(evicted);
                Ok(())
            }
            Offer::Dropped => {
                self.count_drops(1);
                Err(ClientError::Dropped)
            }
            Offer::Cancelled { evicted } => {
                self.count_drops(evicted);
                Err(ClientError::Cancelled)
            }
        }
    }

    /// Signals the worker to stop and waits for it to drain and flush.
    ///
    /// `cancel` bounds only the wait: when it fires first this returns
    /// [`ClientError::Cancelled`] while the worker keeps finishing its
    /// in-flight work in the background. On a clean wait the most recent
    /// flush error (if any) is returned.
    pub async fn close(&self, cancel: &CancellationToken) -> Result<(), ClientError> {
        self.cancel.cancel();

        let handle = {
            let mut slot = match self.worker.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.take()
        };
        if let Some(handle) = handle {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ClientError::Cancelled),
                result = handle => {
                    // A worker panic still counts as termination here.
                    let _ = result;
                }
            }
        }

        let err = {
            let mut slot = match self.last_error.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.take()
        };
        match err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Snapshot of the running counters.
    pub fn metrics(&self) -> Metrics {
        self.counters.snapshot()
    }

    fn count_drops(&self, dropped: u64) {
        if dropped == 0 {
            return;
        }
        self.counters.dropped.fetch_add(dropped, Ordering::Relaxed);
        if let Some(on_flush) = &self.config.on_flush {
            on_flush(self.counters.snapshot());
        }
    }
}

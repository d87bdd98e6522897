// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Admission control in front of the bounded entry queue.
//!
//! Producers never touch the queue directly; every enqueue goes through
//! [`offer`], which applies the configured [`BackpressureMode`] and
//! reports how many entries were sacrificed to admit the new one.

use crate::config::BackpressureMode;
use crate::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Outcome of offering one entry to the queue.
#[derive(Debug)]
pub(crate) enum Offer {
    /// The entry is in the queue. `evicted` is the number of older entries
    /// removed to make room (only ever non-zero in drop-oldest mode).
    Accepted { evicted: u64 },
    /// The incoming entry was rejected (drop-new mode).
    Dropped,
    /// The caller's token fired (or the queue is gone) before admission.
    /// Evictions that happened first are still reported.
    Cancelled { evicted: u64 },
}

/// Offers `entry` to the queue under `mode`.
///
/// In block mode this suspends until space exists or `cancel` fires. In
/// drop-oldest mode each loop iteration either admits, evicts, or observes
/// cancellation; the yield between cycles keeps a current-thread runtime
/// from being starved by the spin.
pub(crate) async fn offer(
    cancel: &CancellationToken,
    queue: &flume::Sender<Entry>,
    head: &flume::Receiver<Entry>,
    entry: Entry,
    mode: BackpressureMode,
) -> Offer {
    match mode {
        BackpressureMode::Block => {
            tokio::select! {
                result = queue.send_async(entry) => match result {
                    Ok(()) => Offer::Accepted { evicted: 0 },
                    Err(_) => Offer::Cancelled { evicted: 0 },
                },
                () = cancel.cancelled() => Offer::Cancelled { evicted: 0 },
            }
        }
        BackpressureMode::DropNew => match queue.try_send(entry) {
            Ok(()) => Offer::Accepted { evicted: 0 },
            Err(flume::TrySendError::Full(_)) => Offer::Dropped,
            Err(flume::TrySendError::Disconnected(_)) => Offer::Cancelled { evicted: 0 },
        },
        BackpressureMode::DropOldest => {
            let mut evicted = 0u64;
            let mut pending = entry;
            loop {
                match queue.try_send(pending) {
                    Ok(()) => {
                        if evicted > 0 {
                            warn!("evicted {} queued entries to admit a newer one", evicted);
                        }
                        return Offer::Accepted { evicted };
                    }
                    Err(flume::TrySendError::Full(back)) => {
                        pending = back;
                        if head.try_recv().is_ok() {
                            evicted += 1;
                        }
                    }
                    Err(flume::TrySendError::Disconnected(_)) => {
                        return Offer::Cancelled { evicted };
                    }
                }
                if cancel.is_cancelled() {
                    return Offer::Cancelled { evicted };
                }
                tokio::task::yield_now().await;
            }
        }
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of the client's running counters.
///
/// All four counters are process-lifetime monotonic; they are never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    /// Entries rejected or evicted by backpressure.
    pub dropped: u64,
    /// Entries delivered by a successful push attempt.
    pub pushed: u64,
    /// Entries covered by a failed push attempt (counted per attempt).
    pub push_errors: u64,
    /// Push attempts past the first, successful or not.
    pub retries: u64,
}

/// The shared atomic counters behind [`Metrics`].
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) dropped: AtomicU64,
    pub(crate) pushed: AtomicU64,
    pub(crate) push_errors: AtomicU64,
    pub(crate) retries: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> Metrics {
        Metrics {
            dropped: self.dropped.load(Ordering::Relaxed),
            pushed: self.pushed.load(Ordering::Relaxed),
            push_errors: self.push_errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reads_all_counters() {
        let counters = Counters::default();
        counters.dropped.fetch_add(1, Ordering::Relaxed);
        counters.pushed.fetch_add(2, Ordering::Relaxed);
        counters.push_errors.fetch_add(3, Ordering::Relaxed);
        counters.retries.fetch_add(4, Ordering::Relaxed);

        let snapshot = counters.snapshot();
        assert_eq!(
            snapshot,
            Metrics {
                dropped: 1,
                pushed: 2,
                push_errors: 3,
                retries: 4,
            }
        );
    }
}

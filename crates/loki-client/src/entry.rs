// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A single log record bound for Loki.
///
/// Immutable once accepted by the queue.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    /// UTC instant of the record. When `None` at enqueue time the client
    /// stamps the current wall-clock UTC.
    pub timestamp: Option<DateTime<Utc>>,
    /// The opaque log line.
    pub line: String,
    /// Per-entry labels, merged over the client's static labels for stream
    /// grouping. The entry wins on key collision.
    pub labels: HashMap<String, String>,
}

impl Entry {
    /// Creates an entry with the given line, no labels and no timestamp.
    pub fn new(line: impl Into<String>) -> Self {
        Entry {
            line: line.into(),
            ..Default::default()
        }
    }

    /// Adds a label to the entry.
    #[must_use]
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    /// Pins the entry's timestamp instead of stamping it at enqueue time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

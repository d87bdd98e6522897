// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ClientError;
use crate::metrics::Metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked when an asynchronous flush fails.
///
/// Must be safe for concurrent use: it runs on the worker task.
pub type ErrorCallback = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// Callback invoked with the running counters after every push attempt and
/// every backpressure drop.
///
/// Must be safe for concurrent use: it runs on either a producer task (for
/// drops) or the worker task (for flushes).
pub type FlushCallback = Arc<dyn Fn(Metrics) + Send + Sync>;

/// Policy applied when an entry is offered to a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressureMode {
    /// Wait until space exists or the caller's cancellation token fires.
    #[default]
    Block,
    /// Reject the incoming entry.
    DropNew,
    /// Evict queued entries from the head until the new one fits.
    DropOldest,
}

/// Wire encoding of push payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Textual `{"streams":[...]}` payload, `application/json`.
    Json,
    /// Length-delimited logproto message, snappy block compressed,
    /// `application/x-protobuf` + `Content-Encoding: snappy`.
    #[default]
    ProtobufSnappy,
}

/// Retry policy for transient push failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempt cap, including the first attempt. Must be >= 1.
    pub max_attempts: u32,
    /// Base backoff; doubles per attempt.
    pub min_backoff: Duration,
    /// Ceiling applied to the doubled backoff before jitter.
    pub max_backoff: Duration,
    /// Fractional magnitude of the +/- jitter applied to each backoff.
    pub jitter_frac: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 5,
            min_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(3),
            jitter_frac: 0.2,
        }
    }
}

/// Client configuration.
///
/// Only `endpoint` is required; everything else defaults to the values
/// documented per field.
#[derive(Clone)]
pub struct Config {
    /// Target URL for pushes, e.g. `http://loki:3100/loki/api/v1/push`.
    /// Required, non-empty.
    pub endpoint: String,
    /// Tenant scope. When non-empty, sent as `X-Scope-OrgID` and wins over
    /// a same-key entry in `headers`.
    pub tenant_id: String,
    /// Extra headers applied to every push request.
    pub headers: HashMap<String, String>,
    /// Payload encoding. Defaults to protobuf + snappy.
    pub encoding: Encoding,
    /// Base labels every entry is merged onto; entry labels win.
    pub static_labels: HashMap<String, String>,
    /// Transport client override. Defaults to a client with a 10 s timeout.
    pub http_client: Option<reqwest::Client>,
    /// Capacity of the bounded entry queue.
    pub queue_size: usize,
    /// Entry-count flush trigger.
    pub batch_max_entries: usize,
    /// Line-bytes flush trigger. Counts line lengths only; labels and
    /// encoding overhead are excluded, so the wire payload can exceed this
    /// when labels are large.
    pub batch_max_bytes: usize,
    /// Periodic flush interval.
    pub batch_max_wait: Duration,
    /// Policy applied when the queue is full at enqueue time.
    pub backpressure_mode: BackpressureMode,
    /// Retry policy for transient push failures.
    pub retry: RetryConfig,
    /// Invoked when an asynchronous flush fails.
    pub on_error: Option<ErrorCallback>,
    /// Invoked with the running counters after every push attempt and drop.
    pub on_flush: Option<FlushCallback>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: String::new(),
            tenant_id: String::new(),
            headers: HashMap::new(),
            encoding: Encoding::default(),
            static_labels: HashMap::new(),
            http_client: None,
            queue_size: 1024,
            batch_max_entries: 500,
            batch_max_bytes: 1 << 20,
            batch_max_wait: Duration::from_secs(1),
            backpressure_mode: BackpressureMode::default(),
            retry: RetryConfig::default(),
            on_error: None,
            on_flush: None,
        }
    }
}

impl Config {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.endpoint.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "endpoint is required".to_string(),
            ));
        }
        if self.retry.max_attempts < 1 {
            return Err(ClientError::InvalidConfig(
                "retry.max_attempts must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Asynchronous batching client for the Grafana Loki push API.
//!
//! Ships log entries straight from the process to `/loki/api/v1/push`
//! without an external shipper sidecar.
//!
//! # Architecture
//!
//! ```text
//!   Producers
//!       │  send()
//!       v
//!   ┌──────────────┐
//!   │ Backpressure │ (block / drop-new / drop-oldest)
//!   └──────┬───────┘
//!          │
//!          v
//!   ┌──────────────┐
//!   │ Bounded queue│
//!   └──────┬───────┘
//!          │ single consumer
//!          v
//!   ┌──────────────┐
//!   │    Worker    │ (size / bytes / time triggered batching)
//!   └──────┬───────┘
//!          │
//!          v
//!   ┌──────────────┐
//!   │   Encoder    │ (JSON or logproto + snappy)
//!   └──────┬───────┘
//!          │
//!          v
//!   ┌──────────────┐
//!   │  HTTP POST   │ (retry with backoff + jitter)
//!   └──────────────┘
//! ```
//!
//! Delivery is at-least-once: a retried push resends the same payload
//! bytes, so a partially applied server response can produce duplicates.
//!
//! # Example
//!
//! ```no_run
//! use loki_client::{Client, Config, Entry};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), loki_client::ClientError> {
//! let client = Client::new(Config {
//!     endpoint: "http://localhost:3100/loki/api/v1/push".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let cancel = CancellationToken::new();
//! client
//!     .send(&cancel, Entry::new("hello loki").with_label("service", "api"))
//!     .await?;
//! client.close(&cancel).await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod backpressure;
mod retry;
mod transport;
mod worker;

pub mod client;
pub mod config;
pub mod encoder;
pub mod entry;
pub mod error;
pub mod metrics;

pub use client::Client;
pub use config::{BackpressureMode, Config, Encoding, ErrorCallback, FlushCallback, RetryConfig};
pub use entry::Entry;
pub use error::{ClientError, PushError};
pub use metrics::Metrics;

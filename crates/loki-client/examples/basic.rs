// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sends a handful of log entries to a local Loki and shuts down cleanly.
//!
//! Run against a Loki listening on localhost:3100:
//!
//! ```sh
//! cargo run --example basic
//! ```

use loki_client::{Client, Config, Entry};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), loki_client::ClientError> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let mut static_labels = HashMap::new();
    static_labels.insert("service".to_string(), "basic-example".to_string());

    let client = Client::new(Config {
        endpoint: "http://localhost:3100/loki/api/v1/push".to_string(),
        static_labels,
        ..Default::default()
    })?;

    let cancel = CancellationToken::new();
    for index in 0..5 {
        client
            .send(
                &cancel,
                Entry::new(format!("example log line {index}")).with_label("level", "info"),
            )
            .await?;
    }

    client.close(&cancel).await?;
    info!("shipped 5 entries, metrics: {:?}", client.metrics());
    Ok(())
}

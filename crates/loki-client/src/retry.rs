// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded exponential backoff around a push attempt function.

use crate::config::RetryConfig;
use crate::error::{ClientError, PushError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Drives `attempt` until it succeeds, a terminal error occurs, the attempt
/// cap is reached, or `cancel` fires during a backoff sleep.
///
/// `attempt` receives the 0-based attempt index. The returned error is the
/// last observed push error after exhaustion, the specific error for
/// terminal failures, or [`ClientError::Cancelled`] when the token fires
/// mid-backoff.
pub(crate) async fn retry_push<F, Fut>(
    cancel: &CancellationToken,
    config: &RetryConfig,
    mut attempt: F,
) -> Result<(), ClientError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(), PushError>>,
{
    let mut last_err: Option<PushError> = None;
    for index in 0..config.max_attempts {
        match attempt(index).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                let terminal = !err.is_retryable();
                last_err = Some(err);
                if terminal {
                    break;
                }
            }
        }
        if index + 1 == config.max_attempts {
            break;
        }
        let wait = backoff_with_jitter(config, index);
        tokio::select! {
            () = cancel.cancelled() => return Err(ClientError::Cancelled),
            () = tokio::time::sleep(wait) => {}
        }
    }
    match last_err {
        Some(err) => Err(ClientError::Push(err)),
        // Unreachable with a validated config (max_attempts >= 1).
        None => Ok(()),
    }
}

/// `clamp(min_backoff * 2^attempt, 0, max_backoff) * (1 + U * jitter_frac)`
/// with `U` uniform in [-1, +1]; negative results clamp to zero.
fn backoff_with_jitter(config: &RetryConfig, attempt: u32) -> Duration {
    let base = (config.min_backoff.as_secs_f64() * 2f64.powi(attempt as i32))
        .min(config.max_backoff.as_secs_f64());
    let unit: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
    let factor = (1.0 + unit * config.jitter_frac).max(0.0);
    Duration::from_secs_f64(base * factor)
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Failure of a single push attempt against the Loki endpoint.
///
/// The variant decides retry behaviour: network failures and HTTP 429/5xx
/// responses are transient, everything else is terminal.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Transport-level failure (DNS, connect, TLS, read or write).
    #[error("network error pushing to loki: {source}")]
    Network {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Non-2xx response from the endpoint.
    ///
    /// `body` holds at most the first 1024 bytes of the response body.
    #[error("loki push failed: {status} {body}")]
    Http { status: u16, body: String },

    /// The request could not be constructed. Never retried.
    #[error("failed to build push request: {0}")]
    Build(String),
}

impl PushError {
    /// Whether a retry can reasonably succeed: network failures,
    /// HTTP 429 and any 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            PushError::Network { .. } => true,
            PushError::Http { status, .. } => *status == 429 || *status >= 500,
            PushError::Build(_) => false,
        }
    }
}

/// Errors surfaced by the client API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected configuration; the client was not created.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Sentinel: the entry was rejected by backpressure. Callers can match
    /// on this variant to distinguish load shedding from real failures.
    #[error("entry dropped due to backpressure")]
    Dropped,

    /// The caller's cancellation token fired before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    /// A flush failed after retries were exhausted (or terminally).
    #[error(transparent)]
    Push(#[from] PushError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_retryable() {
        let err = PushError::Network {
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_http_status_retry_classification() {
        let cases = [
            (400, false),
            (401, false),
            (404, false),
            (429, true),
            (500, true),
            (502, true),
            (599, true),
        ];
        for (status, expected) in cases {
            let err = PushError::Http {
                status,
                body: String::new(),
            };
            assert_eq!(err.is_retryable(), expected, "status {status}");
        }
    }

    #[test]
    fn test_build_errors_are_terminal() {
        let err = PushError::Build("bad header value".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::InvalidConfig("endpoint is required".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: endpoint is required"
        );

        let err = ClientError::Dropped;
        assert_eq!(err.to_string(), "entry dropped due to backpressure");

        let err = PushError::Http {
            status: 400,
            body: "bad request".to_string(),
        };
        assert_eq!(err.to_string(), "loki push failed: 400 bad request");
    }
}

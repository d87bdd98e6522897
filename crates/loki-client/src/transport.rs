// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP delivery of encoded payloads to the push endpoint.

use crate::config::Config;
use crate::encoder::EncodedPayload;
use crate::error::{ClientError, PushError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Header overridden by the configured tenant, regardless of what the user
/// placed in the headers map.
const TENANT_HEADER: HeaderName = HeaderName::from_static("x-scope-orgid");

/// Default connect+read timeout for the built-in transport client.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on how much of an error response body is captured.
const MAX_ERROR_BODY_BYTES: usize = 1024;

/// One POST target: endpoint, resolved headers and the transport client.
pub(crate) struct LokiTransport {
    client: reqwest::Client,
    endpoint: String,
    user_headers: Vec<(HeaderName, HeaderValue)>,
    tenant: Option<HeaderValue>,
}

impl LokiTransport {
    /// Builds the transport from validated configuration. Invalid header
    /// names or values in the config are construction errors, not push
    /// errors.
    pub(crate) fn new(config: &Config) -> Result<Self, ClientError> {
        let client = match &config.http_client {
            Some(client) => client.clone(),
            None => reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .map_err(|err| {
                    ClientError::InvalidConfig(format!("failed to build http client: {err}"))
                })?,
        };

        let mut user_headers = Vec::with_capacity(config.headers.len());
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                ClientError::InvalidConfig(format!("invalid header name {name:?}: {err}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|err| {
                ClientError::InvalidConfig(format!("invalid header value for {name}: {err}"))
            })?;
            user_headers.push((name, value));
        }

        let tenant = if config.tenant_id.is_empty() {
            None
        } else {
            Some(HeaderValue::from_str(&config.tenant_id).map_err(|err| {
                ClientError::InvalidConfig(format!("invalid tenant id: {err}"))
            })?)
        };

        Ok(LokiTransport {
            client,
            endpoint: config.endpoint.clone(),
            user_headers,
            tenant,
        })
    }

    /// Executes one POST of the payload. 2xx maps to `Ok`; a non-2xx
    /// response yields [`PushError::Http`] with a bounded body prefix;
    /// transport failures yield [`PushError::Network`]; anything failing
    /// before the request leaves is [`PushError::Build`].
    ///
    /// `cancel` aborts the request in flight; like any other torn-down
    /// connection it surfaces as [`PushError::Network`].
    pub(crate) async fn push(
        &self,
        payload: &EncodedPayload,
        cancel: &CancellationToken,
    ) -> Result<(), PushError> {
        let mut headers = HeaderMap::with_capacity(self.user_headers.len() + 3);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(payload.content_type));
        if !payload.content_encoding.is_empty() {
            headers.insert(
                CONTENT_ENCODING,
                HeaderValue::from_static(payload.content_encoding),
            );
        }
        for (name, value) in &self.user_headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(tenant) = &self.tenant {
            headers.insert(TENANT_HEADER, tenant.clone());
        }

        let request = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .body(payload.body.clone());

        let sent = tokio::select! {
            result = request.send() => result,
            () = cancel.cancelled() => {
                return Err(PushError::Network {
                    source: "push cancelled while request was in flight".into(),
                });
            }
        };
        let response = sent.map_err(|err| {
            if err.is_builder() {
                PushError::Build(err.to_string())
            } else {
                PushError::Network {
                    source: Box::new(err),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_body_prefix(response).await;
            debug!("push rejected with status {}", status);
            return Err(PushError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Reads at most [`MAX_ERROR_BODY_BYTES`] of the response body. Read
/// failures just truncate what was captured so far.
async fn read_body_prefix(mut response: reqwest::Response) -> String {
    let mut buf: Vec<u8> = Vec::new();
    while buf.len() < MAX_ERROR_BODY_BYTES {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = MAX_ERROR_BODY_BYTES - buf.len();
                let take = room.min(chunk.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_invalid_header_name_is_a_config_error() {
        let mut headers = HashMap::new();
        headers.insert("bad header\n".to_string(), "value".to_string());
        let config = Config {
            endpoint: "http://localhost:3100/loki/api/v1/push".to_string(),
            headers,
            ..Default::default()
        };
        assert!(matches!(
            LokiTransport::new(&config),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_tenant_value_is_a_config_error() {
        let config = Config {
            endpoint: "http://localhost:3100/loki/api/v1/push".to_string(),
            tenant_id: "bad\nvalue".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            LokiTransport::new(&config),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_transport_builds_with_defaults() {
        let config = Config {
            endpoint: "http://localhost:3100/loki/api/v1/push".to_string(),
            ..Default::default()
        };
        assert!(LokiTransport::new(&config).is_ok());
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Minimal vendored Loki push wire schema.
//!
//! Only the three messages required for `/loki/api/v1/push` protobuf
//! payloads are defined here (`PushRequest`, `StreamAdapter`,
//! `EntryAdapter`), mirroring the field numbers of Grafana Loki's
//! `logproto` definitions. The structs are written in the form
//! `prost-build` would generate so no protoc toolchain is needed at
//! build time.
//!
//! Schema attribution: compatible with the Grafana Loki logproto push
//! schema. Unknown fields are skipped on decode, so payloads produced
//! by newer logproto revisions still parse.

/// A push request: the top-level message POSTed to the ingestion endpoint.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PushRequest {
    #[prost(message, repeated, tag = "1")]
    pub streams: ::prost::alloc::vec::Vec<StreamAdapter>,
}

/// One stream: a canonical label-set string plus its entries in order.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamAdapter {
    /// Canonical label set, e.g. `{env="prod",service="api"}`.
    #[prost(string, tag = "1")]
    pub labels: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub entries: ::prost::alloc::vec::Vec<EntryAdapter>,
}

/// One log entry: a nested seconds/nanos timestamp and the raw line.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntryAdapter {
    #[prost(message, optional, tag = "1")]
    pub timestamp: ::core::option::Option<::prost_types::Timestamp>,
    #[prost(string, tag = "2")]
    pub line: ::prost::alloc::string::String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    fn entry(seconds: i64, nanos: i32, line: &str) -> EntryAdapter {
        EntryAdapter {
            timestamp: Some(prost_types::Timestamp { seconds, nanos }),
            line: line.to_string(),
        }
    }

    #[test]
    fn test_round_trip_preserves_streams_and_entry_order() {
        let request = PushRequest {
            streams: vec![
                StreamAdapter {
                    labels: r#"{service="api"}"#.to_string(),
                    entries: vec![entry(1, 0, "first"), entry(2, 500, "second")],
                },
                StreamAdapter {
                    labels: r#"{service="worker"}"#.to_string(),
                    entries: vec![entry(3, 0, "third")],
                },
            ],
        };

        let encoded = request.encode_to_vec();
        let decoded = PushRequest::decode(encoded.as_slice()).expect("decode failed");

        assert_eq!(decoded, request);
        assert_eq!(decoded.streams[0].entries[0].line, "first");
        assert_eq!(decoded.streams[0].entries[1].line, "second");
    }

    #[test]
    fn test_empty_request_encodes_to_no_bytes() {
        let request = PushRequest::default();
        assert!(request.encode_to_vec().is_empty());
    }

    #[test]
    fn test_timestamp_seconds_and_nanos_survive() {
        let request = PushRequest {
            streams: vec![StreamAdapter {
                labels: "{}".to_string(),
                entries: vec![entry(1_700_000_000, 123_456_789, "ts check")],
            }],
        };

        let decoded =
            PushRequest::decode(request.encode_to_vec().as_slice()).expect("decode failed");
        let ts = decoded.streams[0].entries[0]
            .timestamp
            .as_ref()
            .expect("timestamp missing");
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanos, 123_456_789);
    }

    #[test]
    fn test_snappy_block_round_trip() {
        let request = PushRequest {
            streams: vec![StreamAdapter {
                labels: r#"{env="prod"}"#.to_string(),
                entries: vec![entry(10, 20, "compressed line")],
            }],
        };

        let raw = request.encode_to_vec();
        let compressed = snap::raw::Encoder::new()
            .compress_vec(&raw)
            .expect("compress failed");
        let decompressed = snap::raw::Decoder::new()
            .decompress_vec(&compressed)
            .expect("decompress failed");
        let decoded = PushRequest::decode(decompressed.as_slice()).expect("decode failed");

        assert_eq!(decoded, request);
    }
}

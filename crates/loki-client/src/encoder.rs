// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch-to-payload assembly.
//!
//! Entries are partitioned into streams keyed by their merged label set
//! (client static labels overlaid by entry labels, entry wins), then
//! serialized as either the textual JSON push payload or the compact
//! logproto + snappy payload. Within a stream, entry order follows
//! insertion order; stream iteration order is unspecified as both
//! encodings are order-insensitive at the stream level.

use crate::config::Encoding;
use crate::entry::Entry;
use crate::error::PushError;
use bytes::Bytes;
use prost::Message;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// An assembled push payload with its content metadata.
pub struct EncodedPayload {
    pub body: Bytes,
    pub content_type: &'static str,
    /// Empty when the encoding carries no content-encoding token.
    pub content_encoding: &'static str,
}

/// Serializes `entries` into one push payload.
pub fn encode_batch(
    encoding: Encoding,
    static_labels: &HashMap<String, String>,
    entries: &[Entry],
) -> Result<EncodedPayload, PushError> {
    match encoding {
        Encoding::Json => Ok(EncodedPayload {
            body: encode_json(static_labels, entries)?,
            content_type: "application/json",
            content_encoding: "",
        }),
        Encoding::ProtobufSnappy => Ok(EncodedPayload {
            body: encode_protobuf_snappy(static_labels, entries)?,
            content_type: "application/x-protobuf",
            content_encoding: "snappy",
        }),
    }
}

/// Overlays `entry` labels on the client's static labels; the entry wins
/// on key collision. The result is ordered so the canonical string and the
/// JSON object render deterministically for a given label set.
fn merge_labels<'a>(
    static_labels: &'a HashMap<String, String>,
    entry_labels: &'a HashMap<String, String>,
) -> BTreeMap<&'a str, &'a str> {
    let mut merged: BTreeMap<&str, &str> = BTreeMap::new();
    for (name, value) in static_labels {
        merged.insert(name, value);
    }
    for (name, value) in entry_labels {
        merged.insert(name, value);
    }
    merged
}

/// Renders a label set in Loki's canonical form: keys sorted, values
/// quoted, `{}` for the empty set.
fn canonical_labels(labels: &BTreeMap<&str, &str>) -> String {
    if labels.is_empty() {
        return "{}".to_string();
    }
    let mut out = String::from("{");
    for (index, (name, value)) in labels.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(name);
        out.push('=');
        out.push_str(&format!("{value:?}"));
    }
    out.push('}');
    out
}

fn unix_nanos(entry: &Entry) -> i64 {
    entry
        .timestamp
        .and_then(|ts| ts.timestamp_nanos_opt())
        .unwrap_or(0)
}

#[derive(Serialize)]
struct JsonPush<'a> {
    streams: Vec<JsonStream<'a>>,
}

#[derive(Serialize)]
struct JsonStream<'a> {
    stream: &'a BTreeMap<&'a str, &'a str>,
    values: &'a [(String, &'a str)],
}

struct JsonGroup<'a> {
    labels: BTreeMap<&'a str, &'a str>,
    values: Vec<(String, &'a str)>,
}

fn encode_json(
    static_labels: &HashMap<String, String>,
    entries: &[Entry],
) -> Result<Bytes, PushError> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, JsonGroup> = HashMap::new();

    for entry in entries {
        let labels = merge_labels(static_labels, &entry.labels);
        let key = canonical_labels(&labels);
        let value = (unix_nanos(entry).to_string(), entry.line.as_str());
        if let Some(group) = groups.get_mut(&key) {
            group.values.push(value);
        } else {
            order.push(key.clone());
            groups.insert(
                key,
                JsonGroup {
                    labels,
                    values: vec![value],
                },
            );
        }
    }

    let streams: Vec<JsonStream<'_>> = order
        .iter()
        .filter_map(|key| groups.get(key))
        .map(|group| JsonStream {
            stream: &group.labels,
            values: &group.values,
        })
        .collect();

    let body = serde_json::to_vec(&JsonPush { streams })
        .map_err(|err| PushError::Build(format!("failed to serialize json payload: {err}")))?;
    Ok(Bytes::from(body))
}

fn encode_protobuf_snappy(
    static_labels: &HashMap<String, String>,
    entries: &[Entry],
) -> Result<Bytes, PushError> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<loki_logproto::EntryAdapter>> = HashMap::new();

    for entry in entries {
        let labels = merge_labels(static_labels, &entry.labels);
        let key = canonical_labels(&labels);
        let adapter = loki_logproto::EntryAdapter {
            timestamp: Some(prost_types::Timestamp {
                seconds: entry.timestamp.map(|ts| ts.timestamp()).unwrap_or(0),
                nanos: entry
                    .timestamp
                    .map(|ts| ts.timestamp_subsec_nanos() as i32)
                    .unwrap_or(0),
            }),
            line: entry.line.clone(),
        };
        if let Some(group) = groups.get_mut(&key) {
            group.push(adapter);
        } else {
            order.push(key.clone());
            groups.insert(key, vec![adapter]);
        }
    }

    let request = loki_logproto::PushRequest {
        streams: order
            .into_iter()
            .filter_map(|labels| {
                groups
                    .remove(&labels)
                    .map(|entries| loki_logproto::StreamAdapter { labels, entries })
            })
            .collect(),
    };

    let raw = request.encode_to_vec();
    let body = snap::raw::Encoder::new()
        .compress_vec(&raw)
        .map_err(|err| PushError::Build(format!("failed to compress payload: {err}")))?;
    Ok(Bytes::from(body))
}

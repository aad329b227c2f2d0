//! Object-created events from the source bucket
//!
//! Every newly created source object is submitted for extraction.

use serde::Deserialize;

use crate::error::Result;
use crate::orchestrator::ExtractionOrchestrator;
use crate::types::{Method, Request, Response};

#[derive(Debug, Clone, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageEventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEventRecord {
    #[serde(default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntity {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl StorageEvent {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Event keys are URL-encoded with `+` for spaces
fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Submit requests for records in `source_bucket`; other buckets and
/// non-creation events are skipped.
pub fn submit_requests(event: &StorageEvent, source_bucket: &str) -> Vec<Result<Request>> {
    event
        .records
        .iter()
        .filter(|r| {
            let created = r
                .event_name
                .as_deref()
                .map_or(true, |name| name.starts_with("ObjectCreated"));
            if r.s3.bucket.name != source_bucket {
                tracing::debug!(
                    "Skipping event for bucket {} (expected {})",
                    r.s3.bucket.name,
                    source_bucket
                );
            }
            created && r.s3.bucket.name == source_bucket
        })
        .map(|r| Request::by_identifier(Method::Submit, decode_key(&r.s3.object.key)))
        .collect()
}

/// Parse an event and submit every created source object
pub async fn dispatch(
    orchestrator: &ExtractionOrchestrator,
    payload: &[u8],
) -> Result<Vec<Response>> {
    let event = StorageEvent::parse(payload)?;
    let source = orchestrator.config().source_bucket.clone();

    let mut responses = Vec::new();
    for request in submit_requests(&event, &source) {
        let response = match request {
            Ok(request) => orchestrator.handle(request).await,
            Err(err) => Response::failure(err),
        };
        if let Some(err) = &response.error {
            tracing::warn!("Storage event submission failed: {}", err);
        }
        responses.push(response);
    }
    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Request;

    const EVENT: &str = r#"{
        "Records": [
            {
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "source" },
                    "object": { "key": "scan+2024%2F01.pdf", "size": 1024 }
                }
            },
            {
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "destination" },
                    "object": { "key": "scan.txt" }
                }
            },
            {
                "eventName": "ObjectRemoved:Delete",
                "s3": {
                    "bucket": { "name": "source" },
                    "object": { "key": "old" }
                }
            }
        ]
    }"#;

    #[test]
    fn test_only_source_creations_submitted() {
        let event = StorageEvent::parse(EVENT.as_bytes()).unwrap();
        let requests = submit_requests(&event, "source");
        assert_eq!(requests.len(), 1);
        match requests.into_iter().next().unwrap().unwrap() {
            Request::Submit(id) => assert_eq!(id, "scan 2024/01.pdf"),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let event = StorageEvent::parse(
            br#"{"Records":[{"s3":{"bucket":{"name":"source"},"object":{"key":""}}}]}"#,
        )
        .unwrap();
        let requests = submit_requests(&event, "source");
        assert!(requests[0].is_err());
    }

    #[test]
    fn test_malformed_payload() {
        assert!(StorageEvent::parse(b"not json").is_err());
    }
}

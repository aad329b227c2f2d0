//! OCR job completion notifications
//!
//! Accepts the completion message directly, wrapped in a topic envelope
//! (`Message` holds the JSON as a string), or as a batch of topic records.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::orchestrator::ExtractionOrchestrator;
use crate::types::{ExtractStatus, Request, Response};

/// Job completion message published by the OCR service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobCompletion {
    #[serde(default)]
    pub job_id: Option<String>,
    pub status: String,
    /// The document identifier the job was started for
    #[serde(default)]
    pub job_tag: Option<String>,
    #[serde(default, rename = "API")]
    pub api: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct EnvelopeRecord {
    #[serde(rename = "Sns")]
    sns: Envelope,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Inbound {
    Records {
        #[serde(rename = "Records")]
        records: Vec<EnvelopeRecord>,
    },
    Envelope(Envelope),
    Direct(JobCompletion),
}

/// Every completion message carried by `payload`
pub fn parse(payload: &[u8]) -> Result<Vec<JobCompletion>> {
    let inbound: Inbound = serde_json::from_slice(payload)?;
    let messages = match inbound {
        Inbound::Direct(completion) => return Ok(vec![completion]),
        Inbound::Envelope(envelope) => vec![envelope.message],
        Inbound::Records { records } => records.into_iter().map(|r| r.sns.message).collect(),
    };
    messages
        .iter()
        .map(|m| serde_json::from_str(m).map_err(Error::from))
        .collect()
}

impl JobCompletion {
    /// Reported status; service spellings (`SUCCEEDED`) are accepted
    pub fn reported_status(&self) -> Option<ExtractStatus> {
        ExtractStatus::parse(&self.status)
    }

    pub fn into_request(self) -> Result<Request> {
        // unknown statuses pass through as New, which completion ignores
        let status = self.reported_status().unwrap_or_default();
        Request::complete(self.job_tag.unwrap_or_default(), status, self.job_id)
    }
}

/// Parse a notification and complete each referenced document
pub async fn dispatch(
    orchestrator: &ExtractionOrchestrator,
    payload: &[u8],
) -> Result<Vec<Response>> {
    let mut responses = Vec::new();
    for completion in parse(payload)? {
        tracing::debug!(
            "Job {:?} for {:?} reported {}",
            completion.job_id,
            completion.job_tag,
            completion.status
        );
        let response = match completion.into_request() {
            Ok(request) => orchestrator.handle(request).await,
            Err(err) => Response::failure(err),
        };
        if let Some(err) = &response.error {
            tracing::warn!("Completion notification not applied: {}", err);
        }
        responses.push(response);
    }
    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &str =
        r#"{"JobId":"8f2c","Status":"SUCCEEDED","API":"StartDocumentTextDetection","JobTag":"doc-1","Timestamp":1700000000000}"#;

    #[test]
    fn test_direct_message() {
        let parsed = parse(MESSAGE.as_bytes()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].job_tag.as_deref(), Some("doc-1"));
        assert_eq!(parsed[0].reported_status(), Some(ExtractStatus::Succeeded));
    }

    #[test]
    fn test_envelope_and_records() {
        let envelope = serde_json::json!({ "Type": "Notification", "Message": MESSAGE });
        let parsed = parse(envelope.to_string().as_bytes()).unwrap();
        assert_eq!(parsed[0].job_id.as_deref(), Some("8f2c"));

        let records = serde_json::json!({
            "Records": [
                { "Sns": { "Message": MESSAGE } },
                { "Sns": { "Message": MESSAGE.replace("SUCCEEDED", "FAILED") } }
            ]
        });
        let parsed = parse(records.to_string().as_bytes()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].reported_status(), Some(ExtractStatus::Failed));
    }

    #[test]
    fn test_into_request() {
        let completion = parse(MESSAGE.as_bytes()).unwrap().remove(0);
        match completion.into_request().unwrap() {
            Request::Complete {
                identifier,
                status,
                job_id,
            } => {
                assert_eq!(identifier, "doc-1");
                assert_eq!(status, ExtractStatus::Succeeded);
                assert_eq!(job_id.as_deref(), Some("8f2c"));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn test_missing_tag_is_invalid() {
        let completion = parse(br#"{"JobId":"1","Status":"FAILED"}"#).unwrap().remove(0);
        assert!(matches!(completion.into_request(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_intermediate_status() {
        let completion = parse(br#"{"JobId":"1","Status":"IN_PROGRESS","JobTag":"d"}"#)
            .unwrap()
            .remove(0);
        assert!(completion.reported_status().is_none());
    }
}

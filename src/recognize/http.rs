use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use url::Url;

use crate::detect::Detection;
use crate::error::RecognitionError;
use crate::frame::EncodedFrame;
use crate::recognize::Recognizer;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3006/api/recognize";

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    objects: Vec<Detection>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// JSON-over-HTTP recognition client.
pub struct HttpRecognizer {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpRecognizer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| anyhow!("invalid recognition endpoint '{}': {}", endpoint, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "recognition endpoint must be http(s), got '{}'",
                url.scheme()
            ));
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        })
    }

}

impl Recognizer for HttpRecognizer {
    fn recognize(&self, frame: &EncodedFrame) -> Result<Vec<Detection>, RecognitionError> {
        let body = serde_json::json!({ "image": frame.data_url() }).to_string();
        log::debug!(
            "posting frame {} ({} bytes) to {}",
            frame.digest(),
            frame.len(),
            self.endpoint
        );
        let response = match self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                return Err(rejection(status, response));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(RecognitionError::ServiceUnreachable(transport.to_string()));
            }
        };
        let text = response
            .into_string()
            .map_err(|e| RecognitionError::ServiceUnreachable(format!("read response: {}", e)))?;
        parse_objects(&text)
    }
}

/// Parse a recognition response body.
///
/// Anything other than an object with an `objects` list of
/// `{name, confidence}` entries is a `MalformedResponse`.
pub fn parse_objects(body: &str) -> Result<Vec<Detection>, RecognitionError> {
    serde_json::from_str::<RecognizeResponse>(body)
        .map(|parsed| parsed.objects)
        .map_err(|e| RecognitionError::MalformedResponse(e.to_string()))
}

/// A non-2xx reply is a rejection only when it carries `{"error": "..."}`.
/// Anything else (an HTML error page, an empty body) is a malformed response.
fn rejection(status: u16, response: ureq::Response) -> RecognitionError {
    let status_text = response.status_text().to_string();
    match response
        .into_string()
        .ok()
        .and_then(|body| serde_json::from_str::<ErrorResponse>(&body).ok())
    {
        Some(parsed) => RecognitionError::ServiceRejected {
            status,
            message: parsed.error,
        },
        None => RecognitionError::MalformedResponse(format!(
            "{} {} without an error body",
            status, status_text
        )),
    }
}

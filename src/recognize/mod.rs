//! Recognition client.
//!
//! One frame in, one outbound call, the service's detections out. The client
//! never filters, sorts or thresholds: presentation decisions belong to
//! `crate::present`. No retries, no caching.

mod http;

use crate::detect::Detection;
use crate::error::RecognitionError;
use crate::frame::EncodedFrame;

pub use http::{parse_objects, HttpRecognizer, DEFAULT_ENDPOINT};

/// Anything that can turn a frame into detections.
///
/// Implementations are shared across in-flight calls, so they take `&self`.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, frame: &EncodedFrame) -> Result<Vec<Detection>, RecognitionError>;
}

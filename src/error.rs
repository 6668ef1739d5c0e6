use thiserror::Error;

/// The one message shown to users for any camera problem.
///
/// The specific [`CameraFault`] is only logged; recovery is the same for all of them.
pub const CAMERA_UNAVAILABLE_MESSAGE: &str =
    "Camera unavailable. Check that a camera is connected and not in use.";

/// Classified camera initialization failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CameraFault {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera not found")]
    NotFound,
    #[error("camera in use by another process")]
    InUse,
    #[error("camera failure: {0}")]
    Other(String),
}

/// Failure of one capture/recognize attempt. Never retried.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RecognitionError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(CameraFault),
    #[error("recognition service unreachable: {0}")]
    ServiceUnreachable(String),
    #[error("recognition service returned {status}: {message}")]
    ServiceRejected { status: u16, message: String },
    #[error("malformed recognition response: {0}")]
    MalformedResponse(String),
}

impl RecognitionError {
    /// Human-readable text for the coordinator to display.
    pub fn user_message(&self) -> String {
        match self {
            RecognitionError::CameraUnavailable(_) => CAMERA_UNAVAILABLE_MESSAGE.to_string(),
            RecognitionError::ServiceUnreachable(_) => {
                "Recognition service is unreachable. Is the server running?".to_string()
            }
            RecognitionError::ServiceRejected { message, .. } => {
                format!("Recognition failed: {}", message)
            }
            RecognitionError::MalformedResponse(_) => {
                "Recognition service sent an unexpected response.".to_string()
            }
        }
    }
}

impl From<CameraFault> for RecognitionError {
    fn from(fault: CameraFault) -> Self {
        RecognitionError::CameraUnavailable(fault)
    }
}

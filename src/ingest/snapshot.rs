//! HTTP snapshot camera.
//!
//! Fetches one JPEG per capture from a snapshot endpoint, the way ESP32-S3
//! camera firmware serves `/capture`. `open()` probes the endpoint once and
//! classifies the answer; failed captures afterwards are "not ready".

use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::error::CameraFault;
use crate::frame::{EncodedFrame, DEFAULT_JPEG_QUALITY};
use crate::ingest::Camera;

const MAX_JPEG_BYTES: u64 = 5 * 1024 * 1024;
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SnapshotCamera {
    url: String,
    agent: ureq::Agent,
    opened: bool,
}

impl SnapshotCamera {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            agent: ureq::AgentBuilder::new().timeout(SNAPSHOT_TIMEOUT).build(),
            opened: false,
        }
    }

    fn fetch(&self) -> std::result::Result<Vec<u8>, ureq::Error> {
        let response = self.agent.get(&self.url).call()?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_JPEG_BYTES)
            .read_to_end(&mut bytes)
            .map_err(ureq::Error::from)?;
        Ok(bytes)
    }

    fn fetch_frame(&self) -> Result<EncodedFrame> {
        let bytes = self
            .fetch()
            .with_context(|| format!("fetch snapshot from {}", self.url))?;
        if bytes.is_empty() {
            return Err(anyhow!("empty snapshot"));
        }
        EncodedFrame::from_image_bytes(&bytes, DEFAULT_JPEG_QUALITY)
    }
}

impl Camera for SnapshotCamera {
    fn name(&self) -> &str {
        &self.url
    }

    fn open(&mut self) -> Result<(), CameraFault> {
        match self.fetch() {
            Ok(_) => {
                self.opened = true;
                log::info!("SnapshotCamera: connected to {}", self.url);
                Ok(())
            }
            Err(err) => Err(classify_http_error(&err)),
        }
    }

    fn capture_still(&mut self) -> Option<EncodedFrame> {
        if !self.opened {
            return None;
        }
        match self.fetch_frame() {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::debug!("SnapshotCamera: {:#}", err);
                None
            }
        }
    }
}

fn classify_http_error(err: &ureq::Error) -> CameraFault {
    match err {
        ureq::Error::Status(status, _) => classify_status(*status),
        ureq::Error::Transport(transport) => match transport.kind() {
            ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Dns => CameraFault::NotFound,
            _ => CameraFault::Other(transport.to_string()),
        },
    }
}

fn classify_status(status: u16) -> CameraFault {
    match status {
        401 | 403 => CameraFault::PermissionDenied,
        404 => CameraFault::NotFound,
        409 | 423 | 503 => CameraFault::InUse,
        other => CameraFault::Other(format!("snapshot endpoint returned {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_faults() {
        assert_eq!(classify_status(401), CameraFault::PermissionDenied);
        assert_eq!(classify_status(403), CameraFault::PermissionDenied);
        assert_eq!(classify_status(404), CameraFault::NotFound);
        assert_eq!(classify_status(503), CameraFault::InUse);
        assert!(matches!(classify_status(500), CameraFault::Other(_)));
    }

    #[test]
    fn refused_connection_is_not_found() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut cam = SnapshotCamera::new(&format!("http://{}/capture", addr));
        assert_eq!(cam.open(), Err(CameraFault::NotFound));
        assert!(cam.capture_still().is_none());
    }
}

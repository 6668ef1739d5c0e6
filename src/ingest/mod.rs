//! Camera sources.
//!
//! This module provides the still-frame cameras the capture loop can own:
//! - Synthetic frames (`stub://`), for demos and tests
//! - Local still images or a directory of stills (`file://` or a plain path)
//! - HTTP JPEG snapshot endpoints (`http://`, `https://`), e.g. ESP32 cameras
//!
//! Every source follows the same lifecycle:
//! - `open()` initializes the device and classifies failures as a `CameraFault`
//! - `capture_still()` returns `None` while the device has no frame to give
//!
//! Sources MUST NOT:
//! - Store captured frames to disk
//! - Log frame content (use `EncodedFrame::digest()`)

pub mod file;
pub mod snapshot;
pub mod stub;

use anyhow::{anyhow, Result};
use url::Url;

use crate::error::CameraFault;
use crate::frame::EncodedFrame;

pub use file::FileCamera;
pub use snapshot::SnapshotCamera;
pub use stub::StubCamera;

/// A device that can hand out still frames.
///
/// Acquisition is synchronous. The capture loop holds the only handle.
pub trait Camera: Send {
    /// Human-readable source identifier.
    fn name(&self) -> &str;

    /// Initialize the device.
    fn open(&mut self) -> Result<(), CameraFault>;

    /// Capture one still, or `None` when the device is not ready.
    fn capture_still(&mut self) -> Option<EncodedFrame>;
}

/// Build a camera for a source URL. The camera is not opened.
pub fn camera_from_url(source: &str, jpeg_quality: u8) -> Result<Box<dyn Camera>> {
    let source = source.trim();
    if source.is_empty() {
        return Err(anyhow!("camera source must not be empty"));
    }
    if !source.contains("://") {
        return Ok(Box::new(FileCamera::new(source, jpeg_quality)));
    }
    let url = Url::parse(source).map_err(|e| anyhow!("invalid camera url '{}': {}", source, e))?;
    match url.scheme() {
        "stub" => Ok(Box::new(StubCamera::from_url(&url, jpeg_quality)?)),
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| anyhow!("file camera url '{}' has no local path", source))?;
            Ok(Box::new(FileCamera::new(path, jpeg_quality)))
        }
        "http" | "https" => Ok(Box::new(SnapshotCamera::new(source))),
        other => Err(anyhow!(
            "unsupported camera scheme '{}'; expected stub, file, http or https",
            other
        )),
    }
}

pub(crate) fn classify_io_error(err: &std::io::Error) -> CameraFault {
    match err.kind() {
        std::io::ErrorKind::NotFound => CameraFault::NotFound,
        std::io::ErrorKind::PermissionDenied => CameraFault::PermissionDenied,
        _ => CameraFault::Other(err.to_string()),
    }
}

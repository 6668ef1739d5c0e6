//! Local still-image camera.
//!
//! Points at a single image file or a directory of stills. Directories are
//! read in file-name order and cycled, one still per capture. A directory
//! with no stills is "not ready" rather than a fault, so stills can be
//! dropped in while the loop is running.

use std::path::{Path, PathBuf};

use crate::error::CameraFault;
use crate::frame::EncodedFrame;
use crate::ingest::{classify_io_error, Camera};

const STILL_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct FileCamera {
    name: String,
    path: PathBuf,
    quality: u8,
    opened: bool,
    cursor: usize,
}

impl FileCamera {
    pub fn new(path: impl Into<PathBuf>, jpeg_quality: u8) -> Self {
        let path = path.into();
        Self {
            name: format!("file://{}", path.display()),
            path,
            quality: jpeg_quality,
            opened: false,
            cursor: 0,
        }
    }

    fn stills(&self) -> std::io::Result<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        let mut stills: Vec<PathBuf> = std::fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_still(path))
            .collect();
        stills.sort();
        Ok(stills)
    }
}

impl Camera for FileCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), CameraFault> {
        let meta = std::fs::metadata(&self.path).map_err(|e| classify_io_error(&e))?;
        if meta.is_dir() {
            std::fs::read_dir(&self.path).map_err(|e| classify_io_error(&e))?;
        } else if !is_still(&self.path) {
            return Err(CameraFault::Other(format!(
                "{} is not a jpeg or png still",
                self.path.display()
            )));
        }
        self.opened = true;
        log::info!("FileCamera: opened {}", self.path.display());
        Ok(())
    }

    fn capture_still(&mut self) -> Option<EncodedFrame> {
        if !self.opened {
            return None;
        }
        let stills = match self.stills() {
            Ok(stills) => stills,
            Err(err) => {
                log::debug!("FileCamera: listing {} failed: {}", self.path.display(), err);
                return None;
            }
        };
        if stills.is_empty() {
            return None;
        }
        let path = &stills[self.cursor % stills.len()];
        self.cursor = self.cursor.wrapping_add(1);
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::debug!("FileCamera: read {} failed: {}", path.display(), err);
                return None;
            }
        };
        match EncodedFrame::from_image_bytes(&bytes, self.quality) {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::debug!("FileCamera: {} is not a usable still: {}", path.display(), err);
                None
            }
        }
    }
}

fn is_still(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| STILL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_jpeg(path: &Path, shade: u8) {
        let pixels = vec![shade; 4 * 4 * 3];
        let frame = EncodedFrame::encode_rgb(&pixels, 4, 4, 80).unwrap();
        std::fs::write(path, frame.as_bytes()).unwrap();
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut cam = FileCamera::new(dir.path().join("nope"), 80);
        assert_eq!(cam.open(), Err(CameraFault::NotFound));
    }

    #[test]
    fn empty_directory_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut cam = FileCamera::new(dir.path(), 80);
        cam.open().unwrap();
        assert!(cam.capture_still().is_none());

        write_jpeg(&dir.path().join("a.jpg"), 10);
        assert!(cam.capture_still().is_some());
    }

    #[test]
    fn cycles_stills_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_jpeg(&dir.path().join("b.jpg"), 200);
        write_jpeg(&dir.path().join("a.jpg"), 10);
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut cam = FileCamera::new(dir.path(), 80);
        cam.open().unwrap();
        let first = cam.capture_still().unwrap();
        let second = cam.capture_still().unwrap();
        let third = cam.capture_still().unwrap();
        assert_ne!(first, second);
        assert_eq!(first, third);
        assert_eq!(first.as_bytes(), std::fs::read(dir.path().join("a.jpg")).unwrap());
    }

    #[test]
    fn png_stills_are_reencoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([1, 2, 3]));
        img.save(&path).unwrap();

        let mut cam = FileCamera::new(&path, 80);
        cam.open().unwrap();
        let frame = cam.capture_still().unwrap();
        assert_eq!(&frame.as_bytes()[..2], &[0xFF, 0xD8]);
    }
}

//! Synthetic camera (`stub://<name>`).
//!
//! Query parameters simulate device behaviour:
//! - `fault=denied|missing|busy|other` makes `open()` fail with that fault
//! - `warmup=N` returns "not ready" for the first N captures
//! - `size=WxH` sets the frame size (default 320x240, at most 4096 per side)

use anyhow::{anyhow, Result};
use rand::Rng;
use url::Url;

use crate::error::CameraFault;
use crate::frame::EncodedFrame;
use crate::ingest::Camera;

const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;
const MAX_DIMENSION: u32 = 4096;

pub struct StubCamera {
    name: String,
    width: u32,
    height: u32,
    quality: u8,
    fault: Option<CameraFault>,
    warmup: u32,
    opened: bool,
    frame_count: u64,
}

impl StubCamera {
    pub fn new(name: &str, jpeg_quality: u8) -> Self {
        Self {
            name: name.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            quality: jpeg_quality,
            fault: None,
            warmup: 0,
            opened: false,
            frame_count: 0,
        }
    }

    pub fn from_url(url: &Url, jpeg_quality: u8) -> Result<Self> {
        let base = format!("stub://{}{}", url.host_str().unwrap_or(""), url.path());
        let mut camera = Self::new(&base, jpeg_quality);
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "fault" => {
                    camera.fault = Some(match value.as_ref() {
                        "denied" => CameraFault::PermissionDenied,
                        "missing" => CameraFault::NotFound,
                        "busy" => CameraFault::InUse,
                        other => CameraFault::Other(format!("simulated fault '{}'", other)),
                    })
                }
                "warmup" => {
                    camera.warmup = value
                        .parse()
                        .map_err(|_| anyhow!("stub warmup must be a frame count"))?
                }
                "size" => {
                    let (w, h) = value
                        .split_once('x')
                        .ok_or_else(|| anyhow!("stub size must be WxH"))?;
                    camera.width = w.parse().map_err(|_| anyhow!("invalid stub width"))?;
                    camera.height = h.parse().map_err(|_| anyhow!("invalid stub height"))?;
                    let valid = 1..=MAX_DIMENSION;
                    if !valid.contains(&camera.width) || !valid.contains(&camera.height) {
                        return Err(anyhow!(
                            "stub size must be within 1..={} per side, got {}",
                            MAX_DIMENSION,
                            value
                        ));
                    }
                }
                other => return Err(anyhow!("unknown stub camera option '{}'", other)),
            }
        }
        Ok(camera)
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn synthetic_pixels(&self) -> Option<Vec<u8>> {
        let len = (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(3)?;
        let shift = (self.frame_count * 7) as usize + rand::thread_rng().gen_range(0..4);
        let mut pixels = Vec::with_capacity(len);
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                pixels.push(((x + shift) % 256) as u8);
                pixels.push(((y + shift) % 256) as u8);
                pixels.push(((x + y) % 256) as u8);
            }
        }
        Some(pixels)
    }
}

impl Camera for StubCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), CameraFault> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        self.opened = true;
        log::info!("StubCamera: opened {} ({}x{})", self.name, self.width, self.height);
        Ok(())
    }

    fn capture_still(&mut self) -> Option<EncodedFrame> {
        if !self.opened {
            return None;
        }
        if self.warmup > 0 {
            self.warmup -= 1;
            return None;
        }
        let pixels = self.synthetic_pixels()?;
        match EncodedFrame::encode_rgb(&pixels, self.width, self.height, self.quality) {
            Ok(frame) => {
                self.frame_count += 1;
                Some(frame)
            }
            Err(err) => {
                log::debug!("StubCamera: encode failed: {}", err);
                None
            }
        }
    }
}

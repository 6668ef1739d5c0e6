//! Encoded still frames.
//!
//! - `EncodedFrame`: owned JPEG bytes handed from a camera to the recognizer.
//! - Data URL helpers for the `{"image": "data:image/jpeg;base64,..."}` wire field.
//!
//! Frame content is never logged. Log lines refer to a frame by `digest()`.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};
use sha2::{Digest, Sha256};

const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Default JPEG quality for re-encoded frames.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// A JPEG-encoded still frame.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    jpeg: Vec<u8>,
}

impl EncodedFrame {
    /// Wrap bytes that are already JPEG. Rejects anything without an SOI marker.
    pub fn from_jpeg(bytes: Vec<u8>) -> Result<Self> {
        if !is_jpeg(&bytes) {
            return Err(anyhow!("frame is not a jpeg (missing SOI marker)"));
        }
        Ok(Self { jpeg: bytes })
    }

    /// Encode packed RGB8 pixels as JPEG.
    pub fn encode_rgb(pixels: &[u8], width: u32, height: u32, quality: u8) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected {
            return Err(anyhow!(
                "rgb buffer is {} bytes, expected {} for {}x{}",
                pixels.len(),
                expected,
                width,
                height
            ));
        }
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
            .encode(pixels, width, height, ExtendedColorType::Rgb8)
            .context("encode jpeg")?;
        Ok(Self { jpeg })
    }

    /// Accept any still the `image` crate can decode; non-JPEG input is re-encoded.
    pub fn from_image_bytes(bytes: &[u8], quality: u8) -> Result<Self> {
        let format = image::guess_format(bytes).context("detect image format")?;
        if format == ImageFormat::Jpeg {
            return Self::from_jpeg(bytes.to_vec());
        }
        let rgb = image::load_from_memory(bytes)
            .context("decode still image")?
            .into_rgb8();
        let (width, height) = rgb.dimensions();
        Self::encode_rgb(rgb.as_raw(), width, height, quality)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    /// `data:image/jpeg;base64,<payload>`
    pub fn data_url(&self) -> String {
        let mut out = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + self.jpeg.len() * 4 / 3 + 4);
        out.push_str(JPEG_DATA_URL_PREFIX);
        BASE64_STANDARD.encode_string(&self.jpeg, &mut out);
        out
    }

    /// Short content digest for log correlation.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(&self.jpeg);
        hex::encode(&hash[..6])
    }
}

impl std::fmt::Debug for EncodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedFrame")
            .field("bytes", &self.jpeg.len())
            .field("digest", &self.digest())
            .finish()
    }
}

/// Decode the `image` field of a recognition request.
///
/// Accepts a `data:image/...;base64,` URL or a bare base64 payload.
pub fn decode_image_field(value: &str) -> Result<Vec<u8>> {
    let payload = if value.starts_with("data:image") {
        value
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| anyhow!("data url has no payload"))?
    } else {
        value
    };
    BASE64_STANDARD
        .decode(payload.trim())
        .context("decode base64 image")
}

fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xD8
}

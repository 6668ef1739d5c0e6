use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::capture::DEFAULT_PERIOD;
use crate::detect::{DEFAULT_MAX_OBJECTS, DEFAULT_THRESHOLD};
use crate::frame::DEFAULT_JPEG_QUALITY;
use crate::recognize::DEFAULT_ENDPOINT;

const DEFAULT_CAMERA: &str = "stub://webcam";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:3006";
const MIN_PERIOD_MS: u64 = 100;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ClientConfigFile {
    endpoint: Option<String>,
    period_ms: Option<u64>,
    camera: Option<String>,
    jpeg_quality: Option<u8>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ServerConfigFile {
    addr: Option<String>,
    threshold: Option<f32>,
    max_objects: Option<usize>,
}

/// Settings for the capture client (`scanloop`).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub period: Duration,
    pub camera: String,
    pub jpeg_quality: u8,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// File named by `SCANLOOP_CONFIG` (if set), then env overrides.
    pub fn load() -> Result<Self> {
        let file_cfg = match std::env::var("SCANLOOP_CONFIG").ok().as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ClientConfigFile) -> Self {
        Self {
            endpoint: file
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            period: file
                .period_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_PERIOD),
            camera: file.camera.unwrap_or_else(|| DEFAULT_CAMERA.to_string()),
            jpeg_quality: file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            request_timeout: Duration::from_millis(
                file.request_timeout_ms
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            ),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("SCANLOOP_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        if let Ok(camera) = std::env::var("SCANLOOP_CAMERA") {
            if !camera.trim().is_empty() {
                self.camera = camera;
            }
        }
        if let Ok(period) = std::env::var("SCANLOOP_PERIOD_MS") {
            let ms: u64 = period
                .parse()
                .map_err(|_| anyhow!("SCANLOOP_PERIOD_MS must be an integer number of milliseconds"))?;
            self.period = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Check ranges; call again after applying command-line overrides.
    pub fn validate(&self) -> Result<()> {
        if self.period < Duration::from_millis(MIN_PERIOD_MS) {
            return Err(anyhow!("period must be at least {} ms", MIN_PERIOD_MS));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow!("jpeg_quality must be within 1..=100"));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        if self.camera.trim().is_empty() {
            return Err(anyhow!("camera source must not be empty"));
        }
        url::Url::parse(&self.endpoint)
            .map_err(|e| anyhow!("invalid endpoint '{}': {}", self.endpoint, e))?;
        Ok(())
    }
}

/// Settings for the recognition service (`scanloop_server`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub threshold: f32,
    pub max_objects: usize,
}

impl ServerConfig {
    /// File named by `SCANLOOP_SERVER_CONFIG` (if set), then env overrides.
    pub fn load() -> Result<Self> {
        let file_cfg = match std::env::var("SCANLOOP_SERVER_CONFIG").ok().as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ServerConfigFile) -> Self {
        Self {
            addr: file.addr.unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string()),
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            max_objects: file.max_objects.unwrap_or(DEFAULT_MAX_OBJECTS),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("SCANLOOP_ADDR") {
            if !addr.trim().is_empty() {
                self.addr = addr;
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| anyhow!("PORT must be a TCP port number"))?;
            let addr: SocketAddr = self
                .addr
                .parse()
                .map_err(|e| anyhow!("invalid server addr '{}': {}", self.addr, e))?;
            self.addr = SocketAddr::new(addr.ip(), port).to_string();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("invalid server addr '{}': {}", self.addr, e))?;
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(anyhow!("threshold must be within 0..=1"));
        }
        if self.max_objects == 0 {
            return Err(anyhow!("max_objects must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

//! Local recognition service.
//!
//! Routes:
//! - `POST /api/recognize` with `{"image": <data URL or base64>}` → `{"objects": [...]}`
//! - `GET /api/health`, `GET /api/test` → liveness JSON
//!
//! Requests are served one at a time on a single thread, against one detector.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};

use crate::config::ServerConfig;
use crate::detect::{select_objects, Detector, DEFAULT_MAX_OBJECTS, DEFAULT_THRESHOLD};
use crate::frame::decode_image_field;

const MAX_HEADER_BYTES: usize = 8192;
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub threshold: f32,
    pub max_objects: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:3006".to_string(),
            threshold: DEFAULT_THRESHOLD,
            max_objects: DEFAULT_MAX_OBJECTS,
        }
    }
}

impl From<&ServerConfig> for ApiConfig {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            addr: cfg.addr.clone(),
            threshold: cfg.threshold,
            max_objects: cfg.max_objects,
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }

    /// Block until the server thread exits.
    pub fn wait(mut self) -> Result<()> {
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }

    /// Flag that stops the server when set; shareable with signal handlers.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    detector: Box<dyn Detector>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, detector: Box<dyn Detector>) -> Self {
        Self { cfg, detector }
    }

    pub fn spawn(mut self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self
            .cfg
            .addr
            .parse()
            .with_context(|| format!("parse api addr '{}'", self.cfg.addr))?;
        let listener = TcpListener::bind(configured_addr)
            .with_context(|| format!("bind recognition api on {}", configured_addr))?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        self.detector
            .warm_up()
            .with_context(|| format!("warm up detector '{}'", self.detector.name()))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, &self.cfg, self.detector.as_mut(), shutdown_thread)
            {
                log::error!("recognition api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: &ApiConfig,
    detector: &mut dyn Detector,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = handle_connection(stream, cfg, detector) {
                    log::warn!("request from {} failed: {}", peer, err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(20));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    cfg: &ApiConfig,
    detector: &mut dyn Detector,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            write_json(&mut stream, 400, &json!({ "error": err.to_string() }))?;
            return Err(err);
        }
    };
    log::info!("{} {}", request.method, request.path);
    let (status, body) = route(&request, cfg, detector);
    write_json(&mut stream, status, &body)
}

/// Dispatch one parsed request. Returns status and JSON body.
fn route(request: &HttpRequest, cfg: &ApiConfig, detector: &mut dyn Detector) -> (u16, Value) {
    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => (204, Value::Null),
        ("POST", "/api/recognize") => recognize(&request.body, cfg, detector),
        ("GET", "/api/health") => (
            200,
            json!({
                "status": "healthy",
                "message": "Object recognition API is running"
            }),
        ),
        ("GET", "/api/test") => (
            200,
            json!({
                "message": "Backend connection successful",
                "status": "ok"
            }),
        ),
        (_, "/api/recognize") | (_, "/api/health") | (_, "/api/test") => {
            (405, json!({ "error": "method_not_allowed" }))
        }
        _ => (404, json!({ "error": "not_found" })),
    }
}

fn recognize(body: &[u8], cfg: &ApiConfig, detector: &mut dyn Detector) -> (u16, Value) {
    let image_field = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|payload| payload.get("image").and_then(Value::as_str).map(str::to_string));
    let Some(image_field) = image_field else {
        log::error!("no image data provided in request");
        return (400, json!({ "error": "No image data provided" }));
    };

    let decoded = decode_image_field(&image_field)
        .and_then(|bytes| image::load_from_memory(&bytes).context("open image"));
    let rgb = match decoded {
        Ok(image) => image.into_rgb8(),
        Err(err) => {
            log::error!("error decoding image: {:#}", err);
            return (
                400,
                json!({ "error": format!("Error decoding image: {:#}", err) }),
            );
        }
    };
    let (width, height) = rgb.dimensions();
    log::debug!("image decoded: {}x{}", width, height);

    match detector.detect(rgb.as_raw(), width, height) {
        Ok(candidates) => {
            let objects = select_objects(&candidates, cfg.threshold, cfg.max_objects);
            log::info!(
                "recognition complete: {} candidates, {} objects",
                candidates.len(),
                objects.len()
            );
            (200, json!({ "objects": objects }))
        }
        Err(err) => {
            log::error!("error during object recognition: {:#}", err);
            (500, json!({ "error": err.to_string() }))
        }
    }
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("request headers too large"));
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before headers completed"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = match headers.get("content-length") {
        Some(value) => value
            .parse()
            .map_err(|_| anyhow!("invalid content-length"))?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(anyhow!("request body too large"));
    }

    let mut body = data[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before body completed"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        body,
    })
}

fn write_json(stream: &mut TcpStream, status: u16, body: &Value) -> Result<()> {
    let payload = if body.is_null() {
        Vec::new()
    } else {
        serde_json::to_vec(body)?
    };
    write_response(stream, status, "application/json", &payload)
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        204 => "HTTP/1.1 204 No Content",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nAccess-Control-Allow-Origin: *\r\nAccess-Control-Allow-Methods: GET, POST, OPTIONS\r\nAccess-Control-Allow-Headers: Content-Type\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Candidate, StubDetector};
    use crate::frame::EncodedFrame;

    fn request(method: &str, path: &str, body: &str) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn cat_detector() -> StubDetector {
        StubDetector::new(vec![Candidate::new(17, 0.92), Candidate::new(1, 0.2)])
    }

    #[test]
    fn recognize_returns_labelled_objects() {
        let pixels = vec![128u8; 8 * 8 * 3];
        let frame = EncodedFrame::encode_rgb(&pixels, 8, 8, 80).unwrap();
        let body = json!({ "image": frame.data_url() }).to_string();

        let (status, value) = route(
            &request("POST", "/api/recognize", &body),
            &ApiConfig::default(),
            &mut cat_detector(),
        );
        assert_eq!(status, 200);
        let objects = value["objects"].as_array().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["name"], "cat");
    }

    #[test]
    fn missing_image_is_bad_request() {
        let (status, value) = route(
            &request("POST", "/api/recognize", r#"{"picture":"x"}"#),
            &ApiConfig::default(),
            &mut cat_detector(),
        );
        assert_eq!(status, 400);
        assert_eq!(value["error"], "No image data provided");
    }

    #[test]
    fn undecodable_image_is_bad_request() {
        let (status, value) = route(
            &request("POST", "/api/recognize", r#"{"image":"data:image/jpeg;base64,aGVsbG8="}"#),
            &ApiConfig::default(),
            &mut cat_detector(),
        );
        assert_eq!(status, 400);
        assert!(value["error"]
            .as_str()
            .unwrap()
            .starts_with("Error decoding image"));
    }

    #[test]
    fn health_and_test_routes() {
        let cfg = ApiConfig::default();
        let mut det = cat_detector();
        let (status, value) = route(&request("GET", "/api/health", ""), &cfg, &mut det);
        assert_eq!(status, 200);
        assert_eq!(value["status"], "healthy");

        let (status, value) = route(&request("GET", "/api/test", ""), &cfg, &mut det);
        assert_eq!(status, 200);
        assert_eq!(value["status"], "ok");

        let (status, _) = route(&request("GET", "/api/recognize", ""), &cfg, &mut det);
        assert_eq!(status, 405);
        let (status, _) = route(&request("GET", "/nope", ""), &cfg, &mut det);
        assert_eq!(status, 404);
        let (status, _) = route(&request("OPTIONS", "/api/recognize", ""), &cfg, &mut det);
        assert_eq!(status, 204);
    }
}

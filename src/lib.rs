//! scanloop
//!
//! Periodic camera capture with remote object recognition.
//!
//! # Architecture
//!
//! Three pieces, leaf first:
//!
//! 1. **Recognition client** (`recognize`): one frame in, one HTTP call, the
//!    service's detections out. No filtering, no retries.
//! 2. **Capture loop** (`capture`): owns the camera and a recurring timer. On
//!    every tick it reads the caller's `ActiveFlag`, grabs a still and hands
//!    it to the recognizer on a background job.
//! 3. **Presenter** (`present`): pure rendering of the latest detections into
//!    confidence tiers.
//!
//! The `Coordinator` owns the active flag, receives the loop's callbacks and
//! keeps the view state the presenter draws. A `CaptureLoop` can be dropped
//! and rebuilt at any time; the flag, not the timer, decides whether capture
//! resumes.
//!
//! # Module Structure
//!
//! - `ingest`: camera sources (synthetic, local stills, HTTP snapshots)
//! - `frame`: JPEG frames and data URLs
//! - `schedule`: timers and background jobs (threaded and manual)
//! - `api` / `detect`: the local recognition service and its detector seam

pub mod api;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod present;
pub mod recognize;
pub mod schedule;
pub mod ui;

pub use capture::{ActiveFlag, CaptureEvents, CaptureLoop, DEFAULT_PERIOD};
pub use coordinator::{Coordinator, ViewState};
pub use detect::{Candidate, Detection, Detector, StubDetector};
pub use error::{CameraFault, RecognitionError, CAMERA_UNAVAILABLE_MESSAGE};
pub use frame::EncodedFrame;
pub use ingest::{camera_from_url, Camera, FileCamera, SnapshotCamera, StubCamera};
pub use present::{present, render, render_view, Presentation, RenderStyle, Tier};
pub use recognize::{HttpRecognizer, Recognizer};
pub use schedule::{ManualScheduler, Scheduler, ThreadScheduler, TimerHandle};

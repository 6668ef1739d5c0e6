//! Coordinator: owner of the active flag and the state the presenter renders.

use std::sync::{Mutex, MutexGuard};

use crate::capture::{ActiveFlag, CaptureEvents};
use crate::detect::Detection;
use crate::error::RecognitionError;

/// What the display shows right now.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewState {
    pub capturing: bool,
    pub recognizing: bool,
    pub detections: Vec<Detection>,
    pub error: Option<String>,
}

type ChangeListener = Box<dyn Fn(&ViewState) + Send + Sync>;

/// Receives loop callbacks and keeps the latest view state.
///
/// Results are applied in completion order, so the last recognition to finish
/// wins even if it was issued earlier or arrives after capture stopped.
pub struct Coordinator {
    active: ActiveFlag,
    state: Mutex<ViewState>,
    listener: Option<ChangeListener>,
}

impl Coordinator {
    pub fn new(active: ActiveFlag) -> Self {
        Self {
            active,
            state: Mutex::new(ViewState::default()),
            listener: None,
        }
    }

    /// Call `listener` with a snapshot after every state change.
    pub fn with_listener(mut self, listener: impl Fn(&ViewState) + Send + Sync + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// The flag to hand to every `CaptureLoop` this coordinator drives.
    pub fn active_flag(&self) -> ActiveFlag {
        self.active.clone()
    }

    pub fn snapshot(&self) -> ViewState {
        let mut view = self.lock().clone();
        view.capturing = self.active.is_active();
        view
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, apply: impl FnOnce(&mut ViewState)) {
        apply(&mut *self.lock());
        if let Some(listener) = &self.listener {
            listener(&self.snapshot());
        }
    }
}

impl CaptureEvents for Coordinator {
    fn on_start_capture(&self) {
        self.update(|view| view.error = None);
    }

    fn on_stop_capture(&self) {
        self.update(|_| {});
    }

    fn on_recognition_start(&self) {
        self.update(|view| view.recognizing = true);
    }

    fn on_objects_recognized(&self, objects: Vec<Detection>) {
        log::info!("recognized {} objects", objects.len());
        self.update(|view| {
            view.recognizing = false;
            view.error = None;
            view.detections = objects;
        });
    }

    fn on_error(&self, error: RecognitionError) {
        log::error!("{}", error);
        let message = error.user_message();
        self.update(|view| {
            view.recognizing = false;
            view.detections.clear();
            view.error = Some(message);
        });
    }
}

//! Capture/recognize loop.
//!
//! The loop owns the camera handle and the recurring timer. Whether the loop
//! is *logically* running is not its own state: it lives in an `ActiveFlag`
//! owned by the caller and shared into every loop the caller creates. The
//! timer is disposable; dropping a `CaptureLoop` cancels it and leaves the
//! flag alone, and a new loop over the same flag resumes once its camera is
//! ready.
//!
//! Timer callbacks read the flag through the shared handle on every tick, never
//! from a value captured when the timer was scheduled.
//!
//! In-flight recognitions are not cancelled by `stop()` and are not
//! serialized: overlapping calls may complete out of order and every
//! completion is delivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::detect::Detection;
use crate::error::{CameraFault, RecognitionError};
use crate::ingest::Camera;
use crate::recognize::Recognizer;
use crate::schedule::{Scheduler, TimerHandle};

/// Default polling period between captures.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(3000);

/// Caller-owned "is capture running" flag.
///
/// Clones share the same underlying value.
#[derive(Clone, Debug, Default)]
pub struct ActiveFlag(Arc<AtomicBool>);

impl ActiveFlag {
    pub fn new(active: bool) -> Self {
        Self(Arc::new(AtomicBool::new(active)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Set the flag, returning the previous value.
    pub fn set(&self, active: bool) -> bool {
        self.0.swap(active, Ordering::SeqCst)
    }
}

/// Callbacks from the loop to whoever owns the `ActiveFlag`.
///
/// `on_objects_recognized` and `on_error` may arrive from worker threads, after
/// `stop()`, and in any order relative to each other.
pub trait CaptureEvents: Send + Sync {
    fn on_start_capture(&self);
    fn on_stop_capture(&self);
    fn on_recognition_start(&self);
    fn on_objects_recognized(&self, objects: Vec<Detection>);
    fn on_error(&self, error: RecognitionError);
}

struct LoopShared {
    active: ActiveFlag,
    camera_ready: AtomicBool,
    camera: Mutex<Option<Box<dyn Camera>>>,
    recognizer: Arc<dyn Recognizer>,
    events: Arc<dyn CaptureEvents>,
    scheduler: Arc<dyn Scheduler>,
}

impl LoopShared {
    fn acquire_and_recognize(&self) {
        if !self.active.is_active() {
            return;
        }
        if !self.camera_ready.load(Ordering::SeqCst) {
            log::debug!("capture skipped: camera not ready");
            return;
        }
        let Some(frame) = self.capture_still() else {
            log::debug!("capture skipped: no frame available");
            return;
        };

        log::debug!("captured frame {} ({} bytes)", frame.digest(), frame.len());
        self.events.on_recognition_start();

        let recognizer = self.recognizer.clone();
        let events = self.events.clone();
        self.scheduler.spawn(Box::new(move || {
            match recognizer.recognize(&frame) {
                Ok(objects) => {
                    log::debug!("frame {}: {} objects", frame.digest(), objects.len());
                    events.on_objects_recognized(objects);
                }
                Err(err) => {
                    log::warn!("recognition failed for frame {}: {}", frame.digest(), err);
                    events.on_error(err);
                }
            }
        }));
    }

    fn capture_still(&self) -> Option<crate::frame::EncodedFrame> {
        let mut guard = match self.camera.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("camera lock poisoned; treating camera as not ready");
                return None;
            }
        };
        let frame = guard.as_mut().and_then(|camera| camera.capture_still());
        frame
    }
}

/// One capture session: camera handle, timer and the link to the caller's flag.
pub struct CaptureLoop {
    shared: Arc<LoopShared>,
    period: Duration,
    timer: Option<TimerHandle>,
}

impl CaptureLoop {
    /// Create a session. Nothing is scheduled here: the camera is not ready
    /// until `open_camera()` or `camera_ready()` runs, and an active flag
    /// resumes capture at that point.
    pub fn new(
        active: ActiveFlag,
        camera: Box<dyn Camera>,
        recognizer: Arc<dyn Recognizer>,
        events: Arc<dyn CaptureEvents>,
        scheduler: Arc<dyn Scheduler>,
        period: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(LoopShared {
                active,
                camera_ready: AtomicBool::new(false),
                camera: Mutex::new(Some(camera)),
                recognizer,
                events,
                scheduler,
            }),
            period,
            timer: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.is_active()
    }

    pub fn is_camera_ready(&self) -> bool {
        self.shared.camera_ready.load(Ordering::SeqCst)
    }

    /// True while a recurring action is registered.
    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Begin polling. No-op when already active.
    pub fn start(&mut self) {
        if self.shared.active.set(true) {
            return;
        }
        log::info!("capture started (every {} ms)", self.period.as_millis());
        self.shared.events.on_start_capture();
        self.schedule();
        self.shared.acquire_and_recognize();
    }

    /// Stop polling. No-op when not active. In-flight recognitions still report.
    pub fn stop(&mut self) {
        if !self.shared.active.set(false) {
            return;
        }
        log::info!("capture stopped");
        self.shared.events.on_stop_capture();
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    /// User toggle. Ignored entirely while the camera is not ready.
    pub fn toggle(&mut self) {
        if !self.is_camera_ready() {
            log::debug!("toggle ignored: camera not ready");
            return;
        }
        if self.shared.active.is_active() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Initialize the camera and report the outcome through the lifecycle callbacks.
    pub fn open_camera(&mut self) -> Result<(), CameraFault> {
        let outcome = match self.shared.camera.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(camera) => camera.open(),
                None => Err(CameraFault::Other("camera handle released".to_string())),
            },
            Err(_) => Err(CameraFault::Other("camera lock poisoned".to_string())),
        };
        match &outcome {
            Ok(()) => self.camera_ready(),
            Err(fault) => self.camera_failed(fault.clone()),
        }
        outcome
    }

    /// Device initialization succeeded.
    pub fn camera_ready(&mut self) {
        self.shared.camera_ready.store(true, Ordering::SeqCst);
        log::info!("camera ready");
        self.resume_if_needed();
    }

    /// Device initialization failed. The fault is logged; the caller gets the generic error.
    pub fn camera_failed(&mut self, fault: CameraFault) {
        self.shared.camera_ready.store(false, Ordering::SeqCst);
        match &fault {
            CameraFault::PermissionDenied => log::warn!("camera access denied by the system"),
            CameraFault::NotFound => log::warn!("no camera device found"),
            CameraFault::InUse => log::warn!("camera is in use by another process"),
            CameraFault::Other(detail) => log::warn!("camera failed to start: {}", detail),
        }
        self.shared
            .events
            .on_error(RecognitionError::CameraUnavailable(fault));
    }

    /// Dispose of the session and hand back the camera. The active flag is untouched.
    pub fn teardown(mut self) -> Option<Box<dyn Camera>> {
        self.cancel_timer();
        let camera = match self.shared.camera.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        camera
    }

    fn resume_if_needed(&mut self) {
        if self.shared.active.is_active() && self.is_camera_ready() && self.timer.is_none() {
            log::info!("resuming capture for active session");
            self.schedule();
            self.shared.acquire_and_recognize();
        }
    }

    fn schedule(&mut self) {
        if self.timer.is_some() {
            return;
        }
        let shared = self.shared.clone();
        self.timer = Some(
            self.shared
                .scheduler
                .every(self.period, Arc::new(move || shared.acquire_and_recognize())),
        );
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            log::debug!("capture session disposed; timer cancelled");
            timer.cancel();
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::EncodedFrame;
    use crate::schedule::ManualScheduler;
    use std::sync::atomic::AtomicUsize;

    struct CountingCamera {
        captures: Arc<AtomicUsize>,
        ready: Arc<AtomicBool>,
    }

    impl Camera for CountingCamera {
        fn name(&self) -> &str {
            "counting"
        }

        fn open(&mut self) -> Result<(), CameraFault> {
            Ok(())
        }

        fn capture_still(&mut self) -> Option<EncodedFrame> {
            if !self.ready.load(Ordering::SeqCst) {
                return None;
            }
            self.captures.fetch_add(1, Ordering::SeqCst);
            EncodedFrame::from_jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]).ok()
        }
    }

    struct FixedRecognizer;

    impl Recognizer for FixedRecognizer {
        fn recognize(&self, _frame: &EncodedFrame) -> Result<Vec<Detection>, RecognitionError> {
            Ok(vec![Detection::new("cat", 0.9)])
        }
    }

    #[derive(Default)]
    struct Counts {
        starts: AtomicUsize,
        stops: AtomicUsize,
        recognitions: AtomicUsize,
        results: AtomicUsize,
        errors: AtomicUsize,
    }

    impl CaptureEvents for Counts {
        fn on_start_capture(&self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_stop_capture(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        fn on_recognition_start(&self) {
            self.recognitions.fetch_add(1, Ordering::SeqCst);
        }
        fn on_objects_recognized(&self, _objects: Vec<Detection>) {
            self.results.fetch_add(1, Ordering::SeqCst);
        }
        fn on_error(&self, _error: RecognitionError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        flag: ActiveFlag,
        sched: ManualScheduler,
        counts: Arc<Counts>,
        captures: Arc<AtomicUsize>,
        device_ready: Arc<AtomicBool>,
    }

    impl Fixture {
        fn new(active: bool) -> Self {
            Self {
                flag: ActiveFlag::new(active),
                sched: ManualScheduler::new(),
                counts: Arc::new(Counts::default()),
                captures: Arc::new(AtomicUsize::new(0)),
                device_ready: Arc::new(AtomicBool::new(true)),
            }
        }

        fn session(&self) -> CaptureLoop {
            CaptureLoop::new(
                self.flag.clone(),
                Box::new(CountingCamera {
                    captures: self.captures.clone(),
                    ready: self.device_ready.clone(),
                }),
                Arc::new(FixedRecognizer),
                self.counts.clone(),
                Arc::new(self.sched.clone()),
                DEFAULT_PERIOD,
            )
        }

        fn captures(&self) -> usize {
            self.captures.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn start_twice_is_start_once() {
        let fx = Fixture::new(false);
        let mut session = fx.session();
        session.camera_ready();

        session.start();
        session.start();

        assert!(fx.flag.is_active());
        assert_eq!(fx.sched.timer_count(), 1);
        assert_eq!(fx.sched.timers_created(), 1);
        assert_eq!(fx.captures(), 1);
        assert_eq!(fx.counts.starts.load(Ordering::SeqCst), 1);
        assert_eq!(fx.sched.timer_periods(), vec![Duration::from_millis(3000)]);
    }

    #[test]
    fn stop_twice_is_stop_once() {
        let fx = Fixture::new(false);
        let mut session = fx.session();
        session.camera_ready();
        session.start();

        session.stop();
        session.stop();

        assert!(!fx.flag.is_active());
        assert_eq!(fx.sched.timer_count(), 0);
        assert_eq!(fx.sched.timers_cancelled(), 1);
        assert_eq!(fx.counts.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn racing_starts_on_a_shared_flag_start_once() {
        for _ in 0..50 {
            let fx = Fixture::new(false);
            let mut first = fx.session();
            let mut second = fx.session();
            first.camera_ready();
            second.camera_ready();

            std::thread::scope(|scope| {
                scope.spawn(|| first.start());
                scope.spawn(|| second.start());
            });

            assert!(fx.flag.is_active());
            assert_eq!(fx.counts.starts.load(Ordering::SeqCst), 1);
            assert_eq!(fx.sched.timer_count(), 1);
        }
    }

    #[test]
    fn construction_schedules_nothing_even_when_active() {
        let fx = Fixture::new(true);
        let session = fx.session();
        assert!(!session.has_timer());
        assert_eq!(fx.sched.timers_created(), 0);
        assert_eq!(fx.captures(), 0);
    }

    #[test]
    fn stop_while_inactive_does_nothing() {
        let fx = Fixture::new(false);
        let mut session = fx.session();
        session.stop();
        assert_eq!(fx.counts.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn ticks_read_the_current_flag() {
        let fx = Fixture::new(false);
        let mut session = fx.session();
        session.camera_ready();
        session.start();
        assert_eq!(fx.captures(), 1);

        fx.flag.set(false);
        assert_eq!(fx.sched.tick(), 1);
        assert_eq!(fx.captures(), 1);

        fx.flag.set(true);
        fx.sched.tick();
        assert_eq!(fx.captures(), 2);
    }

    #[test]
    fn not_ready_device_aborts_silently() {
        let fx = Fixture::new(false);
        fx.device_ready.store(false, Ordering::SeqCst);
        let mut session = fx.session();
        session.camera_ready();
        session.start();
        fx.sched.tick();

        assert_eq!(fx.counts.recognitions.load(Ordering::SeqCst), 0);
        assert_eq!(fx.counts.errors.load(Ordering::SeqCst), 0);
        assert_eq!(fx.sched.pending_jobs(), 0);
        assert!(session.has_timer());
    }

    #[test]
    fn toggle_ignored_until_camera_ready() {
        let fx = Fixture::new(false);
        let mut session = fx.session();
        session.toggle();
        assert!(!fx.flag.is_active());
        assert_eq!(fx.counts.starts.load(Ordering::SeqCst), 0);

        session.camera_ready();
        session.toggle();
        assert!(fx.flag.is_active());
        session.toggle();
        assert!(!fx.flag.is_active());
    }

    #[test]
    fn camera_failure_disables_toggle_and_reports_once() {
        let fx = Fixture::new(false);
        let mut session = fx.session();
        session.camera_ready();
        session.camera_failed(CameraFault::InUse);

        assert!(!session.is_camera_ready());
        assert_eq!(fx.counts.errors.load(Ordering::SeqCst), 1);
        session.toggle();
        assert!(!fx.flag.is_active());
    }

    #[test]
    fn drop_cancels_timer_but_keeps_flag() {
        let fx = Fixture::new(false);
        {
            let mut session = fx.session();
            session.camera_ready();
            session.start();
            assert_eq!(fx.sched.timer_count(), 1);
        }
        assert_eq!(fx.sched.timer_count(), 0);
        assert!(fx.flag.is_active());
    }

    #[test]
    fn new_session_resumes_active_flag_once_camera_is_ready() {
        let fx = Fixture::new(true);
        let mut session = fx.session();
        assert!(!session.has_timer());
        assert_eq!(fx.captures(), 0);

        session.camera_ready();
        assert!(session.has_timer());
        assert_eq!(fx.captures(), 1);

        // A second ready signal must not stack a second timer.
        session.camera_ready();
        assert_eq!(fx.sched.timer_count(), 1);
        assert_eq!(fx.captures(), 1);
        assert_eq!(fx.counts.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn recognition_failure_keeps_polling() {
        struct Failing;
        impl Recognizer for Failing {
            fn recognize(&self, _: &EncodedFrame) -> Result<Vec<Detection>, RecognitionError> {
                Err(RecognitionError::ServiceUnreachable("refused".into()))
            }
        }

        let fx = Fixture::new(false);
        let mut session = CaptureLoop::new(
            fx.flag.clone(),
            Box::new(CountingCamera {
                captures: fx.captures.clone(),
                ready: fx.device_ready.clone(),
            }),
            Arc::new(Failing),
            fx.counts.clone(),
            Arc::new(fx.sched.clone()),
            DEFAULT_PERIOD,
        );
        session.camera_ready();
        session.start();
        fx.sched.run_jobs();
        fx.sched.tick();
        fx.sched.run_jobs();

        assert_eq!(fx.counts.errors.load(Ordering::SeqCst), 2);
        assert_eq!(fx.captures(), 2);
        assert!(fx.flag.is_active());
        assert!(session.has_timer());
    }

    #[test]
    fn teardown_returns_camera() {
        let fx = Fixture::new(false);
        let mut session = fx.session();
        session.camera_ready();
        session.start();
        let camera = session.teardown();
        assert_eq!(camera.map(|c| c.name().to_string()), Some("counting".into()));
        assert_eq!(fx.sched.timer_count(), 0);
        assert!(fx.flag.is_active());
    }
}

//! Recurring timers and background jobs for the capture loop.
//!
//! - `ThreadScheduler`: a timer thread per recurring action, a thread per job.
//! - `ManualScheduler`: nothing runs until the caller says so. Used to drive
//!   the loop step by step and to complete jobs in any order.
//!
//! Dropping a `TimerHandle` cancels its timer.

use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Action fired on every tick.
pub type Task = Arc<dyn Fn() + Send + Sync>;
/// One-shot background work.
pub type Job = Box<dyn FnOnce() + Send>;

pub trait Scheduler: Send + Sync {
    /// Fire `task` every `period`, first firing one period from now.
    fn every(&self, period: Duration, task: Task) -> TimerHandle;

    /// Run `job` off the caller's stack.
    fn spawn(&self, job: Job);
}

/// Registration of a recurring action.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop future firings. A firing already in progress completes.
    pub fn cancel(mut self) {
        self.fire_cancel();
    }

    fn fire_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.fire_cancel();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("live", &self.cancel.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Thread-backed scheduler
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ThreadScheduler {
    fn every(&self, period: Duration, task: Task) -> TimerHandle {
        // Dropping the sender disconnects the channel, which wakes the timer
        // thread immediately instead of after the rest of the period.
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => task(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        TimerHandle::new(move || drop(stop_tx))
    }

    fn spawn(&self, job: Job) {
        std::thread::spawn(job);
    }
}

// ----------------------------------------------------------------------------
// Manual scheduler
// ----------------------------------------------------------------------------

#[derive(Default)]
struct ManualState {
    next_id: u64,
    timers: BTreeMap<u64, (Duration, Task)>,
    jobs: VecDeque<Job>,
    timers_created: u64,
    timers_cancelled: u64,
}

/// Scheduler that only runs work when told to.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        // A panicking task must not wedge every later assertion.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fire every live timer once. Returns how many fired.
    pub fn tick(&self) -> usize {
        let tasks: Vec<Task> = self
            .lock()
            .timers
            .values()
            .map(|(_, task)| task.clone())
            .collect();
        for task in &tasks {
            task();
        }
        tasks.len()
    }

    /// Run queued jobs oldest first, including jobs they enqueue. Returns how many ran.
    pub fn run_jobs(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(job) = self.lock().jobs.pop_front() else {
                return ran;
            };
            job();
            ran += 1;
        }
    }

    /// Hand queued jobs to the caller, oldest first, to run in any order.
    pub fn take_jobs(&self) -> Vec<Job> {
        self.lock().jobs.drain(..).collect()
    }

    pub fn pending_jobs(&self) -> usize {
        self.lock().jobs.len()
    }

    /// Number of live (not cancelled) timers.
    pub fn timer_count(&self) -> usize {
        self.lock().timers.len()
    }

    /// Periods of the live timers.
    pub fn timer_periods(&self) -> Vec<Duration> {
        self.lock().timers.values().map(|(period, _)| *period).collect()
    }

    pub fn timers_created(&self) -> u64 {
        self.lock().timers_created
    }

    pub fn timers_cancelled(&self) -> u64 {
        self.lock().timers_cancelled
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, task: Task) -> TimerHandle {
        let id = {
            let mut state = self.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.timers_created += 1;
            state.timers.insert(id, (period, task));
            id
        };
        let state = self.state.clone();
        TimerHandle::new(move || {
            let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if state.timers.remove(&id).is_some() {
                state.timers_cancelled += 1;
            }
        })
    }

    fn spawn(&self, job: Job) {
        self.lock().jobs.push_back(job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn counter_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = counter.clone();
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn manual_timers_fire_only_on_tick() {
        let sched = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = sched.every(Duration::from_millis(3000), counter_task(&fired));

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(sched.tick(), 1);
        assert_eq!(sched.tick(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(sched.timer_periods(), vec![Duration::from_millis(3000)]);

        handle.cancel();
        assert_eq!(sched.tick(), 0);
        assert_eq!(sched.timer_count(), 0);
        assert_eq!(sched.timers_cancelled(), 1);
    }

    #[test]
    fn dropping_handle_cancels() {
        let sched = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let _handle = sched.every(Duration::from_secs(1), counter_task(&fired));
            assert_eq!(sched.timer_count(), 1);
        }
        assert_eq!(sched.timer_count(), 0);
    }

    #[test]
    fn manual_jobs_wait_until_run() {
        let sched = ManualScheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let ran = ran.clone();
            sched.spawn(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(sched.pending_jobs(), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(sched.run_jobs(), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert!(sched.take_jobs().is_empty());
    }

    #[test]
    fn thread_timer_fires_and_cancels_promptly() {
        let sched = ThreadScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = sched.every(Duration::from_millis(20), counter_task(&fired));

        let deadline = Instant::now() + Duration::from_secs(5);
        while fired.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(fired.load(Ordering::SeqCst) >= 2);

        handle.cancel();
        std::thread::sleep(Duration::from_millis(50));
        let after_cancel = fired.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn long_period_timer_cancels_without_waiting() {
        let sched = ThreadScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = sched.every(Duration::from_secs(3600), counter_task(&fired));
        let started = Instant::now();
        handle.cancel();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}

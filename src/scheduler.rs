//! Repeated backup passes on a fixed cadence.
//!
//! The scheduler owns a single background thread that runs a pass, counts
//! down the rest of the interval one second at a time and then runs the
//! next pass. Callers interact only through `start`, `stop`, `wait` and the
//! registered callbacks.

use crate::config::BackupConfig;
use crate::error::IncbakError;
use crate::signal::StopSignal;
use crate::sync::{synchronize, RunResult, SyncEvent};
use crate::Result;
use crossbeam_channel::{after, select};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Idle,
    Running,
    Stopping,
}

/// Seconds left until the next pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    pub seconds_remaining: u64,
}

type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;
type TickCallback = Arc<dyn Fn(CountdownTick) + Send + Sync>;
type SummaryCallback = Arc<dyn Fn(&RunResult) + Send + Sync>;

#[derive(Default, Clone)]
struct Callbacks {
    log: Option<LogCallback>,
    tick: Option<TickCallback>,
    summary: Option<SummaryCallback>,
}

struct Shared {
    state: Mutex<ScheduleState>,
    stop: Mutex<Option<StopSignal>>,
    callbacks: Mutex<Callbacks>,
}

impl Shared {
    fn log(&self, message: &str) {
        info!("{message}");
        let callback = lock(&self.callbacks).log.clone();
        if let Some(callback) = callback {
            callback(message);
        }
    }

    fn tick(&self, seconds_remaining: u64) {
        let callback = lock(&self.callbacks).tick.clone();
        if let Some(callback) = callback {
            callback(CountdownTick { seconds_remaining });
        }
    }

    fn summary(&self, result: &RunResult) {
        let callback = lock(&self.callbacks).summary.clone();
        if let Some(callback) = callback {
            callback(result);
        }
    }
}

/// Returns the scheduler to `Idle` when the loop thread exits, even on panic
struct IdleOnDrop<'a>(&'a Shared);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        *lock(&self.0.state) = ScheduleState::Idle;
    }
}

pub struct RunScheduler {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RunScheduler {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ScheduleState::Idle),
                stop: Mutex::new(None),
                callbacks: Mutex::new(Callbacks::default()),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Receive human-readable lines for notable events
    pub fn on_log(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        lock(&self.shared.callbacks).log = Some(Arc::new(callback));
    }

    /// Receive the countdown once per second while running
    pub fn on_tick(&self, callback: impl Fn(CountdownTick) + Send + Sync + 'static) {
        lock(&self.shared.callbacks).tick = Some(Arc::new(callback));
    }

    /// Receive the result of every pass
    pub fn on_run_summary(&self, callback: impl Fn(&RunResult) + Send + Sync + 'static) {
        lock(&self.shared.callbacks).summary = Some(Arc::new(callback));
    }

    pub fn state(&self) -> ScheduleState {
        *lock(&self.shared.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() != ScheduleState::Idle
    }

    /// Start the schedule on a background thread and return immediately.
    ///
    /// The first pass runs right away. Fails with `AlreadyRunning` unless
    /// the scheduler is idle, and with `ConfigInvalid` if the snapshot no
    /// longer validates.
    pub fn start(&self, config: BackupConfig) -> Result<()> {
        let mut state = lock(&self.shared.state);
        if *state != ScheduleState::Idle {
            return Err(IncbakError::AlreadyRunning);
        }
        config.validate()?;

        let stop = StopSignal::new();
        *lock(&self.shared.stop) = Some(stop.clone());
        *state = ScheduleState::Running;
        drop(state);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("incbak-scheduler".to_string())
            .spawn(move || run_loop(&shared, &config, &stop));

        match spawned {
            Ok(handle) => {
                let previous = lock(&self.handle).replace(handle);
                if let Some(previous) = previous {
                    // Already idle, so this only reaps the finished thread
                    let _ = previous.join();
                }
                Ok(())
            }
            Err(e) => {
                *lock(&self.shared.state) = ScheduleState::Idle;
                Err(e.into())
            }
        }
    }

    /// Request a cooperative stop. No-op unless running.
    pub fn stop(&self) {
        let mut state = lock(&self.shared.state);
        if *state != ScheduleState::Running {
            return;
        }
        *state = ScheduleState::Stopping;
        if let Some(stop) = lock(&self.shared.stop).as_ref() {
            stop.request();
        }
        drop(state);
        info!("Stop requested");
    }

    /// Block until the background thread has exited
    pub fn wait(&self) {
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Backup scheduler thread panicked");
            }
        }
    }
}

impl Default for RunScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RunScheduler {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}

fn run_loop(shared: &Shared, config: &BackupConfig, stop: &StopSignal) {
    let _idle = IdleOnDrop(shared);
    let interval = Duration::from_secs(config.interval_secs);
    shared.log("Backup started.");
    shared.tick(config.interval_secs);

    let mut run_number: u64 = 0;
    loop {
        if stop.is_requested() {
            break;
        }

        // The next pass is due one interval after this one starts
        let deadline = Instant::now() + interval;
        run_number += 1;
        shared.log(&format!("Backup run #{run_number} started"));

        let result = synchronize(config, stop, &mut |event| {
            if let SyncEvent::Failed(failure) = event {
                shared.log(&format!("Error: {}", failure.message));
            }
        });

        let outcome = if result.completed {
            "completed"
        } else {
            "cancelled"
        };
        shared.log(&format!(
            "Backup run #{run_number} {outcome} in {:.1}s: {}",
            result.duration().as_secs_f64(),
            result.summary()
        ));
        shared.summary(&result);

        if stop.is_requested() {
            break;
        }

        if !count_down(shared, stop, deadline) {
            break;
        }
    }

    shared.log("Backup stopped.");
}

/// Whole seconds left until `deadline`, rounded up
fn seconds_until(deadline: Instant) -> u64 {
    let left = deadline.saturating_duration_since(Instant::now());
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

/// Tick once per whole second until `deadline`. Returns false if a stop interrupted it.
///
/// Each wait ends on a whole-second mark before the deadline, so time spent
/// in the pass is never added to the cadence.
fn count_down(shared: &Shared, stop: &StopSignal, deadline: Instant) -> bool {
    loop {
        let remaining = seconds_until(deadline);
        shared.tick(remaining);
        if remaining == 0 {
            return !stop.is_requested();
        }

        let next_mark = deadline - Duration::from_secs(remaining - 1);
        let step = next_mark.saturating_duration_since(Instant::now());
        select! {
            recv(after(step)) -> _ => {
                if stop.is_requested() {
                    return false;
                }
            }
            recv(stop.wake_receiver()) -> _ => return false,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

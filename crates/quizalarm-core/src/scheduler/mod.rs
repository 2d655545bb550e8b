//! Background poll loop that turns due alarms into trigger callbacks.
//!
//! Each tick reloads every alarm from the store, so edits take effect
//! within one poll interval. A hit is recorded in the deduplicator before
//! anything else happens, which makes the callback fire at most once per
//! (alarm, calendar day) even if persisting `last_triggered` fails.
//!
//! ```text
//! tick: load_all -> prune(today) -> for each alarm:
//!         should_trigger && !fired(id, today)
//!           -> mark fired -> save(last_triggered = now) -> on_trigger(alarm)
//! ```
//!
//! `stop()` blocks until the worker thread has exited. Alarms still
//! pending in the tick that observes a stop are dropped and unmarked, so
//! they can fire after a restart.

mod clock;
mod dedup;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dedup::TriggerDeduplicator;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alarm::{should_trigger, Alarm, DEFAULT_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS};

/// Floor for [`AlarmScheduler::with_interval`]. Configured intervals are
/// whole seconds; the floor only keeps a zero interval from spinning.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
use crate::storage::AlarmStore;

/// Receives each triggered alarm, with `last_triggered` already set.
pub type TriggerCallback = Arc<dyn Fn(&Alarm) + Send + Sync>;

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub evaluated: usize,
    pub triggered: Vec<String>,
    /// Store reads, `last_triggered` writes or callbacks that failed.
    pub failures: usize,
    /// Due alarms dropped because a stop was requested mid-tick.
    pub cancelled: usize,
}

struct SchedulerCore {
    store: Arc<dyn AlarmStore>,
    clock: Arc<dyn Clock>,
    on_trigger: TriggerCallback,
    dedup: Mutex<TriggerDeduplicator>,
}

impl SchedulerCore {
    /// `stopping` is the worker's stop flag; manual ticks pass `None`.
    fn tick(&self, stopping: Option<&AtomicBool>) -> TickReport {
        let now = self.clock.now();
        let today = now.date();
        let mut report = TickReport::default();

        let alarms = match self.store.load_all() {
            Ok(alarms) => alarms,
            Err(e) => {
                warn!(error = %e, "failed to load alarms, retrying next tick");
                report.failures += 1;
                return report;
            }
        };
        report.evaluated = alarms.len();

        let due: Vec<Alarm> = {
            let mut dedup = self.dedup.lock().unwrap_or_else(|e| e.into_inner());
            dedup.prune(today);
            alarms
                .into_iter()
                .filter(|alarm| should_trigger(alarm, now) && dedup.insert(&alarm.id, today))
                .collect()
        };

        for mut alarm in due {
            if stopping.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                self.dedup
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&alarm.id, today);
                report.cancelled += 1;
                continue;
            }
            alarm.last_triggered = Some(now);
            info!(alarm_id = %alarm.id, label = %alarm.label, at = %now, "alarm triggered");

            if let Err(e) = self.store.save(&alarm) {
                warn!(alarm_id = %alarm.id, error = %e, "failed to persist last_triggered");
                report.failures += 1;
            }

            let callback = AssertUnwindSafe(|| (self.on_trigger)(&alarm));
            if panic::catch_unwind(callback).is_err() {
                error!(alarm_id = %alarm.id, "trigger callback panicked");
                report.failures += 1;
            }
            report.triggered.push(alarm.id);
        }

        if report.cancelled > 0 {
            info!(cancelled = report.cancelled, "scheduler stopping, pending triggers dropped");
        }
        debug!(
            evaluated = report.evaluated,
            triggered = report.triggered.len(),
            "scheduler tick"
        );
        report
    }
}

struct Worker {
    stopping: Arc<AtomicBool>,
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Polls an [`AlarmStore`] on a background thread.
pub struct AlarmScheduler {
    core: Arc<SchedulerCore>,
    interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl AlarmScheduler {
    pub fn new<F>(store: Arc<dyn AlarmStore>, on_trigger: F) -> Self
    where
        F: Fn(&Alarm) + Send + Sync + 'static,
    {
        Self {
            core: Arc::new(SchedulerCore {
                store,
                clock: Arc::new(SystemClock),
                on_trigger: Arc::new(on_trigger),
                dedup: Mutex::new(TriggerDeduplicator::new()),
            }),
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            worker: Mutex::new(None),
        }
    }

    /// Replace the clock. Call before `start()`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        if let Some(core) = Arc::get_mut(&mut self.core) {
            core.clock = clock;
        } else {
            warn!("clock not replaced: scheduler already started");
        }
        self
    }

    /// Poll interval, clamped to at most `MAX_POLL_INTERVAL_SECS` so every
    /// fire window sees several polls, and never zero.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        let max = Duration::from_secs(MAX_POLL_INTERVAL_SECS);
        if interval > max || interval < MIN_POLL_INTERVAL {
            warn!(?interval, min = ?MIN_POLL_INTERVAL, ?max, "poll interval out of range, clamping");
        }
        self.interval = interval.clamp(MIN_POLL_INTERVAL, max);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling. No-op if already running.
    ///
    /// # Errors
    /// Returns an error if the worker thread cannot be spawned.
    pub fn start(&self) -> crate::error::Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            debug!("scheduler already running");
            return Ok(());
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let stopping = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopping);
        let core = Arc::clone(&self.core);
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("quizalarm-scheduler".into())
            .spawn(move || loop {
                core.tick(Some(&flag));
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        info!(interval_secs = interval.as_secs_f64(), "scheduler started");
        *worker = Some(Worker {
            stopping,
            stop_tx,
            handle,
        });
        Ok(())
    }

    /// Stop polling and wait for the worker to exit.
    ///
    /// Once this returns no further callback fires. Calling it from inside
    /// the trigger callback only signals the worker, since joining there
    /// would wait on itself; the rest of that tick is cancelled.
    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            return;
        };

        worker.stopping.store(true, Ordering::SeqCst);
        let _ = worker.stop_tx.send(());
        if worker.handle.thread().id() == thread::current().id() {
            warn!("scheduler stopped from its own callback; not joining");
            return;
        }
        if worker.handle.join().is_err() {
            error!("scheduler thread panicked");
        }
        info!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Run one tick on the calling thread. Shares the deduplicator with
    /// the background loop.
    pub fn tick_now(&self) -> TickReport {
        self.core.tick(None)
    }
}

impl Drop for AlarmScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

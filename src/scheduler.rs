//! The push scheduler driving periodic collection passes.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::error::{Error, SourceError};
use crate::exporter::Exporter;
use crate::protocol::Batch;
use crate::registry::ObserverRegistry;

/// Lifecycle of a [`PushScheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created but not started.
    Idle,
    /// Ticking on the worker thread.
    Running,
    /// Stopped for good.
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        })
    }
}

/// Outcome of a single collection pass.
#[derive(Debug)]
pub struct TickSummary {
    /// Number of points handed to the exporter.
    pub observations: usize,
    /// Sources that failed during the pass.
    pub failures: Vec<Error>,
}

struct Shared {
    registry: Arc<ObserverRegistry>,
    exporter: Arc<dyn Exporter>,
    state: Mutex<SchedulerState>,
    wakeup: Condvar,
    // held for the duration of a pass so that passes never overlap
    tick: Mutex<()>,
    // thread running the current pass, if any
    pass_owner: Mutex<Option<ThreadId>>,
}

/// A running collection pass. Holds the tick lock until dropped.
struct Pass<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
    _tick: MutexGuard<'a, ()>,
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        // cleared before the tick lock is released
        *lock(self.owner) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> SchedulerState {
        *lock(&self.state)
    }

    fn begin_pass(&self) -> Pass<'_> {
        let tick = lock(&self.tick);
        *lock(&self.pass_owner) = Some(thread::current().id());
        Pass {
            owner: &self.pass_owner,
            _tick: tick,
        }
    }

    /// Returns true if the calling thread is inside a collection pass.
    fn in_pass(&self) -> bool {
        *lock(&self.pass_owner) == Some(thread::current().id())
    }

    /// Runs one collection pass unless the scheduler has been stopped.
    fn tick(&self) -> Option<TickSummary> {
        let _pass = self.begin_pass();
        if self.state() == SchedulerState::Stopped {
            return None;
        }

        let mut batch = Batch::new();
        let mut failures = Vec::new();
        for binding in self.registry.bindings() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| binding.sample()))
                .unwrap_or(Err(SourceError::Panicked));
            match result {
                Ok(points) => batch.points.extend(points),
                Err(source) => {
                    if let SourceError::Panicked = source {
                        log::error!("metric source {} panicked", binding.name());
                    } else {
                        log::warn!("skipping metric {}: {}", binding.name(), source);
                    }
                    failures.push(Error::SourceReadFailure {
                        name: binding.name().to_owned(),
                        source,
                    });
                }
            }
        }

        let observations = batch.len();
        log::debug!(
            "exporting {} points ({} sources failed)",
            observations,
            failures.len()
        );
        if let Err(err) = self.exporter.export(batch) {
            log::warn!("metrics export failed: {}", err);
        }

        Some(TickSummary {
            observations,
            failures,
        })
    }

    /// Waits until `deadline`, returning false if the scheduler stopped meanwhile.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = lock(&self.state);
        loop {
            if *state != SchedulerState::Running {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            state = self
                .wakeup
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// Drives collection passes over an [`ObserverRegistry`] at a fixed interval.
///
/// Each pass samples every binding in registration order and hands the
/// resulting [`Batch`] to the exporter exactly once, even if it is empty.
/// A failing source is logged and left out of the batch. Passes never
/// overlap: the next deadline is only computed once the previous export
/// returned.
///
/// [`stop`](Self::stop) waits for a pass that is already running to finish.
/// Once it returns no callback and no export runs again.
pub struct PushScheduler {
    shared: Arc<Shared>,
    interval: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PushScheduler {
    /// Creates an idle scheduler.
    pub fn new(
        registry: Arc<ObserverRegistry>,
        exporter: Arc<dyn Exporter>,
        interval: Duration,
    ) -> Result<Self, Error> {
        if interval.is_zero() {
            return Err(Error::InvalidInterval);
        }
        Ok(Self {
            shared: Arc::new(Shared {
                registry,
                exporter,
                state: Mutex::new(SchedulerState::Idle),
                wakeup: Condvar::new(),
                tick: Mutex::new(()),
                pass_owner: Mutex::new(None),
            }),
            interval,
            worker: Mutex::new(None),
        })
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// The collection interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The registry this scheduler collects from.
    pub fn registry(&self) -> &Arc<ObserverRegistry> {
        &self.shared.registry
    }

    /// Starts ticking. The first pass runs one interval from now.
    pub fn start(&self) -> Result<(), Error> {
        let mut state = lock(&self.shared.state);
        if *state != SchedulerState::Idle {
            return Err(Error::InvalidStateTransition {
                state: *state,
                operation: "start",
            });
        }

        let shared = self.shared.clone();
        let interval = self.interval;
        let worker = thread::Builder::new()
            .name("system-metrics-push".into())
            .spawn(move || {
                let mut deadline = Instant::now() + interval;
                while shared.wait_until(deadline) {
                    shared.tick();
                    deadline = Instant::now() + interval;
                }
                log::debug!("push scheduler worker exiting");
            })
            .map_err(Error::WorkerSpawn)?;

        *state = SchedulerState::Running;
        *lock(&self.worker) = Some(worker);
        log::debug!("push scheduler started with interval {:?}", interval);
        Ok(())
    }

    /// Stops ticking.
    ///
    /// Blocks until a pass in progress has finished, whether it runs on the
    /// worker or in [`collect_once`](Self::collect_once) on another thread.
    /// When called from a source callback or the exporter it returns
    /// immediately instead, and the pass in progress is the last one.
    pub fn stop(&self) -> Result<(), Error> {
        {
            let mut state = lock(&self.shared.state);
            if *state != SchedulerState::Running {
                return Err(Error::InvalidStateTransition {
                    state: *state,
                    operation: "stop",
                });
            }
            *state = SchedulerState::Stopped;
            self.shared.wakeup.notify_all();
        }

        let in_pass = self.shared.in_pass();
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if !in_pass && worker.thread().id() != thread::current().id() {
                worker.join().ok();
            }
        }
        if !in_pass {
            // wait out a manual pass still running elsewhere
            drop(lock(&self.shared.tick));
        }
        log::debug!("push scheduler stopped");
        Ok(())
    }

    /// Runs one collection pass on the calling thread.
    ///
    /// Serialized with the timer-driven passes. Fails once the scheduler
    /// has been stopped, without calling any source or the exporter.
    pub fn collect_once(&self) -> Result<TickSummary, Error> {
        self.shared
            .tick()
            .ok_or(Error::InvalidStateTransition {
                state: SchedulerState::Stopped,
                operation: "collect on",
            })
    }
}

impl Drop for PushScheduler {
    fn drop(&mut self) {
        if self.state() == SchedulerState::Running {
            self.stop().ok();
        }
    }
}

impl fmt::Debug for PushScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushScheduler")
            .field("state", &self.state())
            .field("interval", &self.interval)
            .field("registry", &self.shared.registry)
            .finish()
    }
}

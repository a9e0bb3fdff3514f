//! Refresh scheduler
//!
//! Owns at most one periodic job and guarantees that at most one refresh run
//! is in flight at a time, whether it was started by the job's timer or by
//! [`RefreshScheduler::trigger_now`]. A fire that arrives while a run is in
//! flight is dropped, never queued.
//!
//! One lock guards the job slot and the in-flight run. It is only held for
//! bookkeeping, never across an await.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sales_ingest::RunControl;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::interval::RefreshInterval;
use super::refresh::RefreshTask;
use super::SchedulerError;

/// Extra time granted past a run's own deadline before the scheduler stops
/// waiting for it
const BACKSTOP_GRACE: Duration = Duration::from_secs(5);

/// Where a fire came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Timer tick of the job with this id
    Schedule { job_id: u64 },
    /// Caller-initiated run with its own deadline
    Manual { timeout: Duration },
}

/// What a fire did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireOutcome {
    /// A run was started
    Started,
    /// A run was already in flight; nothing was started
    Skipped,
    /// The scheduler is shut down or the firing job no longer exists
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Running,
}

/// Snapshot of the scheduler returned by `create` and `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub active: bool,
    /// 0 when no job exists
    pub job_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_run: Option<DateTime<Utc>>,
    pub running: bool,
}

struct ActiveJob {
    id: u64,
    interval: RefreshInterval,
    next_run: DateTime<Utc>,
    previous_run: Option<DateTime<Utc>>,
    timer: JoinHandle<()>,
}

struct InFlight {
    run_id: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct State {
    job: Option<ActiveJob>,
    next_job_id: u64,
    running: Option<InFlight>,
    next_run_id: u64,
    shut_down: bool,
}

struct Shared {
    task: Arc<dyn RefreshTask>,
    run_timeout: Duration,
    state: Mutex<State>,
    /// `true` while no run is in flight; written under the state lock
    idle: watch::Sender<bool>,
    fires_started: AtomicU64,
    fires_skipped: AtomicU64,
}

/// Single-job, single-flight refresh scheduler
///
/// Cloning is cheap; clones share the same job and run state.
#[derive(Clone)]
pub struct RefreshScheduler {
    shared: Arc<Shared>,
}

impl RefreshScheduler {
    /// `run_timeout` is the deadline applied to runs started by the timer.
    pub fn new(task: Arc<dyn RefreshTask>, run_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                task,
                run_timeout,
                state: Mutex::new(State::default()),
                idle: watch::Sender::new(true),
                fires_started: AtomicU64::new(0),
                fires_skipped: AtomicU64::new(0),
            }),
        }
    }

    /// Create the periodic job, replacing any existing one.
    ///
    /// The old timer is stopped and the new one armed under the same lock.
    /// A run already in flight is left alone.
    pub fn create(&self, interval: &str) -> Result<JobStatus, SchedulerError> {
        let interval = RefreshInterval::parse(interval)?;
        let period = interval.period();

        let mut state = self.shared.lock();
        if state.shut_down {
            return Err(SchedulerError::ShutDown);
        }

        let replaced = state.job.take().map(|old| {
            old.timer.abort();
            old.id
        });

        state.next_job_id += 1;
        let job_id = state.next_job_id;
        let timer = tokio::spawn(run_timer(Arc::downgrade(&self.shared), job_id, period));
        state.job = Some(ActiveJob {
            id: job_id,
            interval: interval.clone(),
            next_run: Utc::now() + period,
            previous_run: None,
            timer,
        });

        match replaced {
            Some(old_id) => info!(
                job_id,
                replaced_job_id = old_id,
                interval = %interval,
                "Replaced refresh job"
            ),
            None => info!(job_id, interval = %interval, "Created refresh job"),
        }

        Ok(snapshot(&state))
    }

    /// Remove the periodic job. A run already in flight is left alone.
    pub fn delete(&self) -> Result<(), SchedulerError> {
        let mut state = self.shared.lock();
        let job = state.job.take().ok_or(SchedulerError::NoActiveJob)?;
        job.timer.abort();
        info!(job_id = job.id, interval = %job.interval, "Deleted refresh job");
        Ok(())
    }

    pub fn status(&self) -> JobStatus {
        snapshot(&self.shared.lock())
    }

    pub fn state(&self) -> SchedulerState {
        let state = self.shared.lock();
        if state.running.is_some() {
            SchedulerState::Running
        } else if state.job.is_some() {
            SchedulerState::Scheduled
        } else {
            SchedulerState::Idle
        }
    }

    /// Attempt to start a run. Never blocks on a run in progress.
    pub fn fire(&self, trigger: Trigger) -> FireOutcome {
        self.shared.fire(trigger)
    }

    /// Start a run now with the given deadline, subject to the same
    /// single-flight guard as timer fires.
    pub fn trigger_now(&self, timeout: Duration) -> FireOutcome {
        self.fire(Trigger::Manual { timeout })
    }

    /// Signal the in-flight run, if any, to stop. Returns whether there was one.
    pub fn cancel_running(&self) -> bool {
        let state = self.shared.lock();
        match &state.running {
            Some(run) => {
                warn!(run_id = run.run_id, "Cancelling in-flight refresh run");
                run.cancel.cancel();
                true
            },
            None => false,
        }
    }

    /// Stop the timer and wait for an in-flight run to finish.
    ///
    /// Afterwards `create` fails with [`SchedulerError::ShutDown`] and every
    /// fire is rejected. Safe to call more than once or concurrently; every
    /// caller waits for the run. Dropping the returned future stops the wait,
    /// not the run.
    pub async fn shutdown(&self) {
        let running = {
            let mut state = self.shared.lock();
            state.shut_down = true;
            if let Some(job) = state.job.take() {
                job.timer.abort();
                info!(job_id = job.id, "Stopped refresh job");
            }
            state.running.is_some()
        };

        if running {
            info!("Waiting for in-flight refresh run to finish");
        }
        self.wait_idle().await;

        info!("Refresh scheduler shut down");
    }

    /// Wait until no run is in flight.
    pub async fn wait_idle(&self) {
        let mut idle = self.shared.idle.subscribe();
        // The sender lives in `Shared`, which `self` keeps alive
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Fires that started a run
    pub fn fires_started(&self) -> u64 {
        self.shared.fires_started.load(Ordering::Relaxed)
    }

    /// Fires dropped because a run was already in flight
    pub fn fires_skipped(&self) -> u64 {
        self.shared.fires_skipped.load(Ordering::Relaxed)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(self: &Arc<Self>, trigger: Trigger) -> FireOutcome {
        let mut state = self.lock();
        if state.shut_down {
            return FireOutcome::Rejected;
        }

        let timeout = match trigger {
            Trigger::Schedule { job_id } => {
                let Some(job) = state.job.as_mut().filter(|job| job.id == job_id) else {
                    return FireOutcome::Rejected;
                };
                let now = Utc::now();
                job.previous_run = Some(now);
                job.next_run = now + job.interval.period();
                self.run_timeout
            },
            Trigger::Manual { timeout } => timeout,
        };

        if let Some(run) = &state.running {
            self.fires_skipped.fetch_add(1, Ordering::Relaxed);
            info!(
                run_id = run.run_id,
                ?trigger,
                "Refresh already running, skipping fire"
            );
            return FireOutcome::Skipped;
        }

        state.next_run_id += 1;
        let run_id = state.next_run_id;
        let cancel = CancellationToken::new();
        let control = RunControl::new()
            .with_timeout(timeout)
            .with_cancel(cancel.clone());

        // Spawned under the lock so the run is visible before any other fire
        // can look.
        tokio::spawn(Arc::clone(self).execute(run_id, trigger, control));
        state.running = Some(InFlight { run_id, cancel });
        self.idle.send_replace(false);
        self.fires_started.fetch_add(1, Ordering::Relaxed);

        FireOutcome::Started
    }

    async fn execute(self: Arc<Self>, run_id: u64, trigger: Trigger, control: RunControl) {
        let _clear = RunningGuard {
            shared: Arc::clone(&self),
            run_id,
        };

        let cancel = control.cancel.clone();
        let backstop = control.timeout.unwrap_or(self.run_timeout) + BACKSTOP_GRACE;
        info!(run_id, ?trigger, "Refresh run started");

        match tokio::time::timeout(backstop, self.task.refresh(control)).await {
            Ok(Ok(record)) if record.is_success() => {
                info!(
                    run_id,
                    rows_loaded = record.rows_loaded,
                    "Refresh run finished"
                );
            },
            Ok(Ok(record)) => {
                warn!(
                    run_id,
                    rows_loaded = record.rows_loaded,
                    error = record.error_msg.as_deref().unwrap_or_default(),
                    "Refresh run failed"
                );
            },
            Ok(Err(e)) => {
                error!(run_id, error = %e, "Refresh run could not complete");
            },
            Err(_) => {
                cancel.cancel();
                warn!(
                    run_id,
                    timeout = ?backstop,
                    "Refresh run exceeded its deadline, abandoning it"
                );
            },
        }
    }
}

/// Clears the running slot when a run ends, including by panic
struct RunningGuard {
    shared: Arc<Shared>,
    run_id: u64,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if state
            .running
            .as_ref()
            .is_some_and(|run| run.run_id == self.run_id)
        {
            state.running = None;
            self.shared.idle.send_replace(true);
        }
    }
}

fn snapshot(state: &State) -> JobStatus {
    let running = state.running.is_some();
    match &state.job {
        Some(job) => JobStatus {
            active: true,
            job_id: job.id,
            interval: Some(job.interval.to_string()),
            next_run: Some(job.next_run),
            previous_run: job.previous_run,
            running,
        },
        None => JobStatus {
            active: false,
            job_id: 0,
            interval: None,
            next_run: None,
            previous_run: None,
            running,
        },
    }
}

/// Ticks every `period`, first one `period` from now. Exits when the
/// scheduler is dropped or the job is no longer current.
async fn run_timer(shared: Weak<Shared>, job_id: u64, period: Duration) {
    let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticks.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if shared.fire(Trigger::Schedule { job_id }) == FireOutcome::Rejected {
            return;
        }
    }
}

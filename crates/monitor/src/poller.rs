//! Polling of a single execution
//!
//! A [`JobPoller`] owns at most one registration at a time. Each registration
//! runs on its own driver task: an immediate fetch, then one fetch per
//! interval tick, never more than one in flight. Stopping cancels the driver's
//! timer and bumps a generation counter; a fetch that resolves after that is
//! discarded without touching state or firing hooks.

use crate::fetcher::StatusFetcher;
use crate::options::PollOptions;
use parking_lot::Mutex;
use runwatch_common::{FetchError, StatusSnapshot};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Poller-level state, distinct from the job's lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    /// Never started
    Idle,
    /// Timer active, a fetch may be in flight
    Polling,
    /// Timer released; a new `start` creates a fresh registration
    Stopped,
}

impl std::fmt::Display for PollerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollerPhase::Idle => write!(f, "idle"),
            PollerPhase::Polling => write!(f, "polling"),
            PollerPhase::Stopped => write!(f, "stopped"),
        }
    }
}

struct PollerState {
    generation: u64,
    phase: PollerPhase,
    job_id: Option<String>,
    snapshot: Option<Arc<StatusSnapshot>>,
    error: Option<FetchError>,
    terminal_notified: bool,
    ticker: Option<CancellationToken>,
}

impl PollerState {
    fn new() -> Self {
        Self {
            generation: 0,
            phase: PollerPhase::Idle,
            job_id: None,
            snapshot: None,
            error: None,
            terminal_notified: false,
            ticker: None,
        }
    }

    fn release_timer(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    /// Stop sequence: release the timer and invalidate in-flight fetches
    fn stop(&mut self) {
        self.release_timer();
        self.generation += 1;
        self.job_id = None;
        self.phase = PollerPhase::Stopped;
    }
}

/// Polls the status of one execution until it finishes or is stopped.
///
/// Must be started from within a Tokio runtime. Dropping the poller performs
/// the stop sequence.
pub struct JobPoller {
    fetcher: Arc<dyn StatusFetcher>,
    options: PollOptions,
    state: Arc<Mutex<PollerState>>,
}

impl JobPoller {
    pub fn new<F>(fetcher: F, options: PollOptions) -> Self
    where
        F: StatusFetcher + 'static,
    {
        Self {
            fetcher: Arc::new(fetcher),
            options,
            state: Arc::new(Mutex::new(PollerState::new())),
        }
    }

    /// Begin polling `job_id`, replacing any active registration.
    ///
    /// Clears the stored snapshot and error, fetches immediately, then once
    /// per interval. An empty id is ignored.
    pub fn start(&self, job_id: impl Into<String>) {
        let job_id = job_id.into();
        if job_id.is_empty() {
            warn!("Ignoring start request without a job id");
            return;
        }

        let ticker = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock();
            if let Some(previous) = state.job_id.as_deref() {
                if state.phase == PollerPhase::Polling {
                    debug!(previous = %previous, "Replacing active registration");
                }
            }
            state.stop();
            state.phase = PollerPhase::Polling;
            state.job_id = Some(job_id.clone());
            state.snapshot = None;
            state.error = None;
            state.terminal_notified = false;
            state.ticker = Some(ticker.clone());
            state.generation
        };

        info!(
            job_id = %job_id,
            interval_ms = self.options.interval.as_millis() as u64,
            "Polling started"
        );

        let registration = Registration {
            state: self.state.clone(),
            fetcher: self.fetcher.clone(),
            options: self.options.clone(),
            job_id,
            generation,
        };
        tokio::spawn(registration.run(ticker));
    }

    /// Release the timer and forget the job. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if state.phase == PollerPhase::Polling {
            info!(job_id = state.job_id.as_deref().unwrap_or(""), "Polling stopped");
        }
        state.stop();
    }

    /// Stop, then clear the stored snapshot and error
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.stop();
        state.snapshot = None;
        state.error = None;
        state.terminal_notified = false;
    }

    /// Latest snapshot of the current (or last auto-stopped) registration
    pub fn snapshot(&self) -> Option<Arc<StatusSnapshot>> {
        self.state.lock().snapshot.clone()
    }

    /// Error from the most recent fetch, cleared by the next success
    pub fn error(&self) -> Option<FetchError> {
        self.state.lock().error.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.state.lock().phase == PollerPhase::Polling
    }

    pub fn phase(&self) -> PollerPhase {
        self.state.lock().phase
    }

    pub fn job_id(&self) -> Option<String> {
        self.state.lock().job_id.clone()
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.state.lock().stop();
    }
}

/// One `start` call's driver
struct Registration {
    state: Arc<Mutex<PollerState>>,
    fetcher: Arc<dyn StatusFetcher>,
    options: PollOptions,
    job_id: String,
    generation: u64,
}

impl Registration {
    async fn run(self, ticker: CancellationToken) {
        let mut interval = tokio::time::interval(self.options.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = ticker.cancelled() => break,
                _ = interval.tick() => {}
            }

            debug!(job_id = %self.job_id, "Fetching status");
            let result = self.fetcher.fetch_status(&self.job_id).await;
            if !self.apply(result) {
                break;
            }
        }

        debug!(job_id = %self.job_id, generation = self.generation, "Poll driver exited");
    }

    /// Still the active registration; an auto-stop keeps it current
    fn is_current(&self) -> bool {
        self.state.lock().generation == self.generation
    }

    /// Record one fetch result. Returns whether polling should continue.
    fn apply(&self, result: Result<StatusSnapshot, FetchError>) -> bool {
        let mut state = self.state.lock();
        if state.generation != self.generation || state.phase != PollerPhase::Polling {
            debug!(job_id = %self.job_id, "Discarding result for a stopped registration");
            return false;
        }

        match result {
            Ok(mut snapshot) => {
                if snapshot.id != self.job_id {
                    debug!(job_id = %self.job_id, reported = %snapshot.id, "Keying snapshot by the polled id");
                    snapshot.id = self.job_id.clone();
                }
                let snapshot = Arc::new(snapshot);
                state.snapshot = Some(snapshot.clone());
                state.error = None;

                let terminal = snapshot.is_terminal();
                let notify = snapshot.lifecycle_state.is_completion() && !state.terminal_notified;
                if notify {
                    state.terminal_notified = true;
                }

                let halt = terminal && self.options.auto_stop_on_terminal;
                if halt {
                    state.release_timer();
                    state.phase = PollerPhase::Stopped;
                }
                drop(state);

                if terminal {
                    info!(
                        job_id = %self.job_id,
                        state = %snapshot.lifecycle_state,
                        auto_stop = halt,
                        "Execution reached a terminal state"
                    );
                }

                if self.is_current() {
                    (self.options.hooks.on_update)(&snapshot);
                }
                if notify && self.is_current() {
                    (self.options.hooks.on_terminal)(&snapshot);
                }
                !halt
            }
            Err(err) => {
                state.error = Some(err.clone());
                drop(state);

                warn!(job_id = %self.job_id, error = %err, "Status fetch failed");
                if self.is_current() {
                    (self.options.hooks.on_transport_error)(&self.job_id, &err);
                }
                true
            }
        }
    }
}

//! Polling of a changing set of executions on one shared timer
//!
//! Each tick fans out one fetch per tracked job concurrently (a wave) and
//! merges every result into its own entry as it resolves. The next wave only
//! starts once the previous one has fully settled.

use crate::fetcher::StatusFetcher;
use crate::options::PollOptions;
use futures::future::join_all;
use parking_lot::Mutex;
use runwatch_common::{FetchError, StatusSnapshot};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct MultiState {
    generation: u64,
    polling: bool,
    job_ids: BTreeSet<String>,
    snapshots: HashMap<String, Arc<StatusSnapshot>>,
    errors: HashMap<String, FetchError>,
    notified: HashSet<String>,
    ticker: Option<CancellationToken>,
}

impl MultiState {
    fn new() -> Self {
        Self {
            generation: 0,
            polling: false,
            job_ids: BTreeSet::new(),
            snapshots: HashMap::new(),
            errors: HashMap::new(),
            notified: HashSet::new(),
            ticker: None,
        }
    }

    fn release_timer(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.polling = false;
    }

    /// Release the timer and invalidate any wave still in flight
    fn halt(&mut self) {
        self.release_timer();
        self.generation += 1;
    }

    fn is_terminal(&self, job_id: &str) -> bool {
        self.snapshots
            .get(job_id)
            .map_or(false, |snapshot| snapshot.is_terminal())
    }

    fn all_terminal(&self) -> bool {
        !self.job_ids.is_empty() && self.job_ids.iter().all(|id| self.is_terminal(id))
    }
}

/// Tracks a set of executions and exposes a merged, per-job view.
///
/// A transport error for one job is recorded against that job only; it never
/// stops polling or disturbs another job's snapshot. Dropping the poller stops
/// it.
pub struct MultiJobPoller {
    fetcher: Arc<dyn StatusFetcher>,
    options: PollOptions,
    state: Arc<Mutex<MultiState>>,
}

impl MultiJobPoller {
    pub fn new<F>(fetcher: F, options: PollOptions) -> Self
    where
        F: StatusFetcher + 'static,
    {
        Self {
            fetcher: Arc::new(fetcher),
            options,
            state: Arc::new(Mutex::new(MultiState::new())),
        }
    }

    /// Replace the tracked set.
    ///
    /// The set is compared by content, so passing the same members again is a
    /// no-op. An empty set stops the timer. New members are fetched from the
    /// next wave; removed members stop being fetched but keep their last
    /// snapshot until [`clear`](Self::clear).
    pub fn set_job_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| !id.is_empty())
            .collect();

        let mut state = self.state.lock();
        if state.job_ids == ids {
            return;
        }
        state.job_ids = ids;

        if state.job_ids.is_empty() {
            if state.polling {
                info!("No executions left to track, polling stopped");
            }
            state.halt();
            return;
        }

        if state.polling {
            debug!(jobs = state.job_ids.len(), "Tracked set changed");
            return;
        }

        let ticker = CancellationToken::new();
        state.generation += 1;
        state.polling = true;
        state.ticker = Some(ticker.clone());

        let driver = WaveDriver {
            state: self.state.clone(),
            fetcher: self.fetcher.clone(),
            options: self.options.clone(),
            generation: state.generation,
        };
        info!(
            jobs = state.job_ids.len(),
            interval_ms = self.options.interval.as_millis() as u64,
            "Polling started"
        );
        drop(state);

        tokio::spawn(driver.run(ticker));
    }

    /// Stop the timer and stop tracking every job. Snapshots and errors stay
    /// readable.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if state.polling {
            info!("Polling stopped");
        }
        state.halt();
        state.job_ids.clear();
    }

    /// Stop and forget every snapshot, error, and terminal notification
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.halt();
        state.job_ids.clear();
        state.snapshots.clear();
        state.errors.clear();
        state.notified.clear();
    }

    /// Merged view, one entry per job that has been fetched successfully
    pub fn snapshots(&self) -> HashMap<String, Arc<StatusSnapshot>> {
        self.state.lock().snapshots.clone()
    }

    pub fn snapshot(&self, job_id: &str) -> Option<Arc<StatusSnapshot>> {
        self.state.lock().snapshots.get(job_id).cloned()
    }

    /// Last transport error per job, cleared by that job's next success
    pub fn errors(&self) -> HashMap<String, FetchError> {
        self.state.lock().errors.clone()
    }

    pub fn error(&self, job_id: &str) -> Option<FetchError> {
        self.state.lock().errors.get(job_id).cloned()
    }

    pub fn job_ids(&self) -> BTreeSet<String> {
        self.state.lock().job_ids.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.state.lock().polling
    }

    /// Every tracked job has a terminal snapshot
    pub fn all_terminal(&self) -> bool {
        self.state.lock().all_terminal()
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }
}

impl Drop for MultiJobPoller {
    fn drop(&mut self) {
        self.state.lock().halt();
    }
}

struct WaveDriver {
    state: Arc<Mutex<MultiState>>,
    fetcher: Arc<dyn StatusFetcher>,
    options: PollOptions,
    generation: u64,
}

impl WaveDriver {
    async fn run(self, ticker: CancellationToken) {
        let mut interval = tokio::time::interval(self.options.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = ticker.cancelled() => break,
                _ = interval.tick() => {}
            }

            let Some(job_ids) = self.wave_members() else {
                break;
            };

            debug!(jobs = job_ids.len(), "Starting poll wave");
            let driver = &self;
            let wave = job_ids.into_iter().map(|job_id| async move {
                let result = driver.fetcher.fetch_status(&job_id).await;
                driver.apply(&job_id, result);
            });
            join_all(wave).await;

            if !self.settle() {
                break;
            }
        }

        debug!(generation = self.generation, "Wave driver exited");
    }

    /// No stop or clear has happened since this driver started
    fn is_current(&self) -> bool {
        self.state.lock().generation == self.generation
    }

    fn is_live(&self, state: &MultiState) -> bool {
        state.generation == self.generation && state.polling
    }

    /// Jobs to fetch this tick, or `None` when polling should end
    fn wave_members(&self) -> Option<Vec<String>> {
        let mut state = self.state.lock();
        if !self.is_live(&state) {
            return None;
        }
        if state.job_ids.is_empty() {
            state.release_timer();
            return None;
        }

        let skip_terminal = self.options.auto_stop_on_terminal;
        Some(
            state
                .job_ids
                .iter()
                .filter(|id| !(skip_terminal && state.is_terminal(id)))
                .cloned()
                .collect(),
        )
    }

    fn apply(&self, job_id: &str, result: Result<StatusSnapshot, FetchError>) {
        let mut state = self.state.lock();
        if state.generation != self.generation {
            debug!(job_id = %job_id, "Discarding result from a stopped wave");
            return;
        }

        match result {
            Ok(mut snapshot) => {
                if snapshot.id != job_id {
                    debug!(job_id = %job_id, reported = %snapshot.id, "Keying snapshot by the polled id");
                    snapshot.id = job_id.to_string();
                }
                let snapshot = Arc::new(snapshot);
                state.snapshots.insert(job_id.to_string(), snapshot.clone());
                state.errors.remove(job_id);

                let notify = snapshot.lifecycle_state.is_completion()
                    && state.notified.insert(job_id.to_string());
                drop(state);

                if snapshot.is_terminal() {
                    info!(
                        job_id = %job_id,
                        state = %snapshot.lifecycle_state,
                        "Execution reached a terminal state"
                    );
                }

                if self.is_current() {
                    (self.options.hooks.on_update)(&snapshot);
                }
                if notify && self.is_current() {
                    (self.options.hooks.on_terminal)(&snapshot);
                }
            }
            Err(err) => {
                state.errors.insert(job_id.to_string(), err.clone());
                drop(state);

                warn!(job_id = %job_id, error = %err, "Status fetch failed");
                if self.is_current() {
                    (self.options.hooks.on_transport_error)(job_id, &err);
                }
            }
        }
    }

    /// Called once a wave has fully resolved. Returns whether to keep polling.
    fn settle(&self) -> bool {
        let mut state = self.state.lock();
        if !self.is_live(&state) {
            return false;
        }

        if self.options.auto_stop_on_terminal && state.all_terminal() {
            info!(
                jobs = state.job_ids.len(),
                "All tracked executions reached a terminal state, polling stopped"
            );
            state.release_timer();
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use runwatch_common::LifecycleState;

    struct Always(LifecycleState);

    #[async_trait]
    impl StatusFetcher for Always {
        async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, FetchError> {
            Ok(StatusSnapshot::new(job_id, self.0))
        }
    }

    #[test]
    fn test_all_terminal_requires_members() {
        let state = MultiState::new();
        assert!(!state.all_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_ids_never_poll() {
        let poller = MultiJobPoller::new(Always(LifecycleState::Running), PollOptions::default());
        poller.set_job_ids(Vec::<String>::new());
        assert!(!poller.is_polling());

        poller.set_job_ids(["", ""]);
        assert!(!poller.is_polling());
        assert!(poller.job_ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_clear() {
        let poller = MultiJobPoller::new(Always(LifecycleState::Running), PollOptions::default());
        poller.set_job_ids(["a", "b"]);
        assert!(poller.is_polling());
        assert_eq!(poller.job_ids().len(), 2);

        poller.stop();
        assert!(!poller.is_polling());
        assert!(poller.job_ids().is_empty());

        poller.clear();
        assert!(poller.snapshots().is_empty());
        assert!(poller.errors().is_empty());
    }
}

//! Scripted fetchers and event recording shared by the poller tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use runwatch_common::{FetchError, LifecycleState, StatusSnapshot, Summary};
use runwatch_monitor::{PollOptions, StatusFetcher};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

pub type Step = Result<StatusSnapshot, FetchError>;

/// Replays a per-job script of results. The last step repeats forever.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every fetch takes `delay` of (virtual) time to resolve
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn script(&self, job_id: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .insert(job_id.to_string(), steps.into_iter().collect());
    }

    pub fn calls(&self, job_id: &str) -> usize {
        self.calls.lock().get(job_id).copied().unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, job_id: &str) -> Step {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(job_id) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
            Some(steps) => steps
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::NotFound(job_id.to_string()))),
            None => Err(FetchError::NotFound(job_id.to_string())),
        }
    }
}

#[async_trait]
impl StatusFetcher for ScriptedFetcher {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, FetchError> {
        *self.calls.lock().entry(job_id.to_string()).or_default() += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let step = self.next_step(job_id);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        step
    }
}

/// Blocks every fetch until the test releases it
pub struct GatedFetcher {
    pub entered: Notify,
    pub release: Notify,
    calls: AtomicUsize,
    state: LifecycleState,
}

impl GatedFetcher {
    pub fn new(state: LifecycleState) -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
            state,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusFetcher for GatedFetcher {
    async fn fetch_status(&self, job_id: &str) -> Result<StatusSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(StatusSnapshot::new(job_id, self.state))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Update(String, LifecycleState),
    Terminal(String, LifecycleState),
    TransportError(String),
}

/// Options whose hooks forward every callback into a channel
pub fn recording_options(interval_ms: u64) -> (PollOptions, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let update_tx = tx.clone();
    let terminal_tx = tx.clone();
    let error_tx = tx;

    let options = PollOptions::default()
        .interval(Duration::from_millis(interval_ms))
        .on_update(move |s| {
            let _ = update_tx.send(Event::Update(s.id.clone(), s.lifecycle_state));
        })
        .on_terminal(move |s| {
            let _ = terminal_tx.send(Event::Terminal(s.id.clone(), s.lifecycle_state));
        })
        .on_transport_error(move |id, _| {
            let _ = error_tx.send(Event::TransportError(id.to_string()));
        });

    (options, rx)
}

/// Next recorded event, failing the test if none arrives within a minute of
/// virtual time
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for a poller event")
        .expect("event channel closed")
}

/// Drain whatever has been recorded so far
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn running(job_id: &str) -> Step {
    Ok(StatusSnapshot::new(job_id, LifecycleState::Running))
}

pub fn passed(job_id: &str) -> Step {
    Ok(StatusSnapshot::new(job_id, LifecycleState::Passed).with_summary(Summary {
        total: 1,
        passed: 1,
        failed: 0,
        skipped: 0,
        duration_ms: 10,
    }))
}

pub fn failed(job_id: &str) -> Step {
    Ok(StatusSnapshot::new(job_id, LifecycleState::Failed).with_failure("assertion failed"))
}

pub fn cancelled(job_id: &str) -> Step {
    Ok(StatusSnapshot::new(job_id, LifecycleState::Cancelled))
}

pub fn transport_error() -> Step {
    Err(FetchError::transport("connection reset"))
}

//! Poll options and caller hooks

use runwatch_common::{FetchError, StatusSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default delay between polls
pub const DEFAULT_INTERVAL_MS: u64 = 3000;

/// `tokio::time::interval` rejects a zero period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub type SnapshotHook = Arc<dyn Fn(&StatusSnapshot) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&str, &FetchError) + Send + Sync>;

/// Callbacks fired by the pollers.
///
/// Every hook defaults to a no-op. Hooks run on the poller's driver task after
/// its state lock is released, so they may call back into the poller (for
/// example `stop()` from `on_update`). They should not block.
///
/// Each hook is skipped if a stop, reset, or restart has happened since the
/// result was recorded, so a hook that stops the poller suppresses the hooks
/// that would follow it. On a multi-threaded runtime a `stop()` racing with
/// dispatch from another thread can still land after that check, in which
/// case one already-dispatched callback completes after `stop()` returns.
#[derive(Clone)]
pub struct PollHooks {
    /// Every successfully fetched snapshot, in completion order
    pub on_update: SnapshotHook,
    /// At most once per job, only for `passed` and `failed`
    pub on_terminal: SnapshotHook,
    /// A fetch failed; polling continues
    pub on_transport_error: ErrorHook,
}

impl Default for PollHooks {
    fn default() -> Self {
        Self {
            on_update: Arc::new(|_| {}),
            on_terminal: Arc::new(|_| {}),
            on_transport_error: Arc::new(|_, _| {}),
        }
    }
}

impl fmt::Debug for PollHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollHooks").finish_non_exhaustive()
    }
}

/// Poll settings as they appear in a config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub auto_stop_on_terminal: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            auto_stop_on_terminal: true,
        }
    }
}

/// Options shared by [`JobPoller`](crate::JobPoller) and
/// [`MultiJobPoller`](crate::MultiJobPoller)
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub auto_stop_on_terminal: bool,
    pub hooks: PollHooks,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}

impl PollOptions {
    pub fn from_config(config: &PollConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.interval_ms),
            auto_stop_on_terminal: config.auto_stop_on_terminal,
            hooks: PollHooks::default(),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn auto_stop_on_terminal(mut self, enabled: bool) -> Self {
        self.auto_stop_on_terminal = enabled;
        self
    }

    pub fn on_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StatusSnapshot) + Send + Sync + 'static,
    {
        self.hooks.on_update = Arc::new(hook);
        self
    }

    pub fn on_terminal<F>(mut self, hook: F) -> Self
    where
        F: Fn(&StatusSnapshot) + Send + Sync + 'static,
    {
        self.hooks.on_terminal = Arc::new(hook);
        self
    }

    pub fn on_transport_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &FetchError) + Send + Sync + 'static,
    {
        self.hooks.on_transport_error = Arc::new(hook);
        self
    }

    pub(crate) fn tick_interval(&self) -> Duration {
        self.interval.max(MIN_INTERVAL)
    }
}

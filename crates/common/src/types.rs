//! Core types for runwatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle state reported for an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Pending,
    Running,
    Passed,
    Failed,
    Cancelled,
}

impl LifecycleState {
    /// No further progress is expected once a job reaches a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Passed | LifecycleState::Failed | LifecycleState::Cancelled
        )
    }

    /// Terminal states that carry an outcome. `Cancelled` is terminal but is a
    /// user-driven signal, not a completion.
    pub fn is_completion(&self) -> bool {
        matches!(self, LifecycleState::Passed | LifecycleState::Failed)
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Pending => write!(f, "pending"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Passed => write!(f, "passed"),
            LifecycleState::Failed => write!(f, "failed"),
            LifecycleState::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LifecycleState::Pending),
            "running" => Ok(LifecycleState::Running),
            "passed" => Ok(LifecycleState::Passed),
            "failed" => Ok(LifecycleState::Failed),
            "cancelled" => Ok(LifecycleState::Cancelled),
            other => Err(format!("unknown lifecycle state: {}", other)),
        }
    }
}

/// Aggregate counters, present once results exist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Summary {
    /// Share of executed (non-skipped) tests that passed, in `0.0..=1.0`.
    pub fn pass_rate(&self) -> f64 {
        let executed = u64::from(self.passed) + u64::from(self.failed);
        if executed == 0 {
            return 0.0;
        }
        self.passed as f64 / executed as f64
    }
}

/// Progress of a running execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current: u32,
    pub total: u32,
    #[serde(default)]
    pub current_label: Option<String>,
}

impl Progress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.current.min(self.total)) as f64 / self.total as f64
    }
}

/// Named reference to something captured during the run (screenshot, trace, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name: String,
    pub reference: String,
}

/// Known state of one execution at a point in time.
///
/// Snapshots are immutable once built; pollers replace them wholesale and
/// share them behind `Arc` so readers can keep the previous one for diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Status bodies may omit it; pollers fill in the id they asked for
    #[serde(default)]
    pub id: String,

    pub lifecycle_state: LifecycleState,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// Only set at or after a terminal state
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub summary: Option<Summary>,

    /// Only meaningful while running
    #[serde(default)]
    pub progress: Option<Progress>,

    /// Raw console lines, append-only across snapshots
    #[serde(default)]
    pub output_lines: Vec<String>,

    #[serde(default)]
    pub auxiliary_artifacts: Vec<Artifact>,

    /// Only set on failure
    #[serde(default)]
    pub failure_detail: Option<String>,
}

impl StatusSnapshot {
    pub fn new(id: impl Into<String>, lifecycle_state: LifecycleState) -> Self {
        Self {
            id: id.into(),
            lifecycle_state,
            started_at: None,
            completed_at: None,
            summary: None,
            progress: None,
            output_lines: Vec::new(),
            auxiliary_artifacts: Vec::new(),
            failure_detail: None,
        }
    }

    pub fn with_progress(mut self, current: u32, total: u32) -> Self {
        self.progress = Some(Progress {
            current,
            total,
            current_label: None,
        });
        self
    }

    pub fn with_summary(mut self, summary: Summary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_output<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_failure(mut self, detail: impl Into<String>) -> Self {
        self.failure_detail = Some(detail.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.lifecycle_state.is_terminal()
    }

    /// Output lines appended since `previous`.
    ///
    /// Relies on output being append-only; a previous snapshot of another job,
    /// or one that holds more lines than this one, yields the full sequence.
    pub fn output_since<'a>(&'a self, previous: Option<&StatusSnapshot>) -> &'a [String] {
        &self.output_lines[appended_from(
            previous.filter(|p| p.id == self.id).map(|p| p.output_lines.len()),
            self.output_lines.len(),
        )..]
    }

    /// Artifacts appended since `previous`, see [`StatusSnapshot::output_since`].
    pub fn artifacts_since<'a>(&'a self, previous: Option<&StatusSnapshot>) -> &'a [Artifact] {
        &self.auxiliary_artifacts[appended_from(
            previous
                .filter(|p| p.id == self.id)
                .map(|p| p.auxiliary_artifacts.len()),
            self.auxiliary_artifacts.len(),
        )..]
    }

    /// Parse a snapshot from its JSON wire form
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn appended_from(previous_len: Option<usize>, len: usize) -> usize {
    match previous_len {
        Some(prev) if prev <= len => prev,
        _ => 0,
    }
}

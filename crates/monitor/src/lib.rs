//! runwatch Monitor
//!
//! Client-side engine that follows remote executions by repeated polling.
//!
//! ```text
//! caller ──start(id)──▶ JobPoller ──fetch_status(id)──▶ StatusFetcher
//!    ▲                      │
//!    └── on_update / on_terminal / on_transport_error
//!
//! caller ──set_job_ids──▶ MultiJobPoller ──one wave per tick──▶ StatusFetcher × N
//! ```
//!
//! The engine knows nothing about HTTP or rendering: the fetch capability is
//! injected through [`StatusFetcher`] and results flow back through
//! [`PollHooks`] and the pollers' read accessors. Both pollers spawn their
//! driver on the current Tokio runtime.

pub mod fetcher;
pub mod multi;
pub mod options;
pub mod poller;

pub use fetcher::StatusFetcher;
pub use multi::MultiJobPoller;
pub use options::{PollConfig, PollHooks, PollOptions, DEFAULT_INTERVAL_MS};
pub use poller::{JobPoller, PollerPhase};

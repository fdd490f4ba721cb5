//! runwatch CLI
//!
//! Command-line front end that follows remote test-suite executions over
//! HTTP and renders their captured console output.

pub mod client;
pub mod commands;
pub mod config;
pub mod output;

pub use client::HttpStatusFetcher;
pub use config::WatchConfig;

//! runwatch Common Library
//!
//! Status model, error types, and console-output decoding shared by the
//! runwatch monitor and CLI.

pub mod ansi;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use ansi::{Segment, Style};
pub use error::{Error, FetchError, Result};
pub use types::*;

/// runwatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

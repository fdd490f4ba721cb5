//! CLI Commands

pub mod decode;
pub mod watch;

//! Library side of the `track-veil` command line tool.

pub mod config;
pub mod logging;
pub mod lookup;
pub mod pipeline;
pub mod prompt;
pub mod types;

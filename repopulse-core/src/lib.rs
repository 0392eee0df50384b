//! RepoPulse Core - shared data structures and infrastructure
//!
//! Errors, configuration, logging, retry/back-off and the snapshot data model used by
//! every other crate in the workspace

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-exported for the logging macros
pub use tracing;

//! Repository analysis
//!
//! The orchestrator turns one repository reference into a snapshot; the service
//! wraps it with input parsing, persistence and counters.

pub mod errors;
pub mod metrics;
pub mod orchestrator;
pub mod service;

pub use errors::*;
pub use metrics::*;
pub use orchestrator::*;
pub use service::*;

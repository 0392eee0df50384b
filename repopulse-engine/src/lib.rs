//! RepoPulse Engine
//!
//! Concurrent repository analysis on top of an [`repopulse_repo::UpstreamClient`],
//! plus the history store that persists every completed snapshot.

pub mod analysis;
pub mod history;

pub use analysis::*;
pub use history::*;

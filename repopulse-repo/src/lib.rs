//! RepoPulse Repository - upstream access and metric aggregation
//!
//! Talks to the code-hosting API and reduces its paginated records into the metrics
//! of an analysis snapshot

pub mod api;
pub mod metrics;

pub use api::*;
pub use metrics::*;

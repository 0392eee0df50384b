//! HTTP request handlers for the RepoPulse web server

pub mod analysis;
pub mod health;
pub mod types;

pub use analysis::*;
pub use health::*;

pub use types::*;

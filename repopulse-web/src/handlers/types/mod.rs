//! Request and response types used by the handlers

pub mod analysis;
pub mod common;

pub use analysis::*;
pub use common::*;

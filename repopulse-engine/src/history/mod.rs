//! Persisted analysis history

pub mod storage;

pub use storage::*;

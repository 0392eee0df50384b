//! Metric aggregators
//!
//! Pure reductions from upstream records to snapshot metrics. Output ordering is
//! deterministic regardless of the order records arrived in.

pub mod activity;
pub mod contributors;
pub mod files;
pub mod health;
pub mod languages;

pub use activity::{build_activity_series, last_commit_at, YearMonth};
pub use contributors::{rank_contributors, ContributorRanking};
pub use files::{file_extension, file_type_distribution, rank_file_changes, NO_EXTENSION};
pub use health::{derive_health, HealthSignals};
pub use languages::{aggregate_languages, percentage_shares};

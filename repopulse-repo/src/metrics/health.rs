//! Health score derivation

use chrono::{DateTime, Duration, Utc};
use repopulse_core::{CommitActivityBucket, HealthScore};

const POINTS_PER_CHECK: u8 = 25;

/// Inputs the score is computed from
#[derive(Debug, Clone, Copy)]
pub struct HealthSignals<'a> {
    pub total_commits: u64,
    pub total_contributors: u64,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub activity: &'a [CommitActivityBucket],
    pub analyzed_at: DateTime<Utc>,
    pub recent_window_days: i64,
}

/// 25 points each for commits, more than one contributor, a commit inside the
/// recent window, and at least one active month
pub fn derive_health(signals: HealthSignals<'_>) -> HealthScore {
    let has_commits = signals.total_commits > 0;
    let has_multiple_contributors = signals.total_contributors > 1;
    let window_start = signals.analyzed_at - Duration::days(signals.recent_window_days);
    let recently_active = signals
        .last_commit_at
        .map(|last| last >= window_start)
        .unwrap_or(false);
    let has_active_period = signals
        .activity
        .iter()
        .any(|bucket| bucket.commits + bucket.issues + bucket.pull_requests > 0);

    let score = [
        has_commits,
        has_multiple_contributors,
        recently_active,
        has_active_period,
    ]
    .iter()
    .filter(|passed| **passed)
    .count() as u8
        * POINTS_PER_CHECK;

    HealthScore {
        score,
        has_commits,
        has_multiple_contributors,
        recently_active,
        has_active_period,
    }
}

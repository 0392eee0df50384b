//! Monthly activity series

use crate::api::{CommitRecord, IssueRecord};
use chrono::{DateTime, Datelike, Utc};
use repopulse_core::CommitActivityBucket;
use std::collections::BTreeMap;
use std::fmt;

/// Calendar month in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(timestamp: &DateTime<Utc>) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MonthCounts {
    commits: u32,
    issues: u32,
    pull_requests: u32,
}

/// Contiguous month buckets between the first and last dated commit.
///
/// Issues and pull requests are counted into the same months; those outside the
/// commit range are ignored. No dated commits gives an empty series.
pub fn build_activity_series(
    commits: &[CommitRecord],
    issues: &[IssueRecord],
) -> Vec<CommitActivityBucket> {
    let mut months: BTreeMap<YearMonth, MonthCounts> = BTreeMap::new();
    for timestamp in commits.iter().filter_map(|c| c.committed_at.as_ref()) {
        months.entry(YearMonth::of(timestamp)).or_default().commits += 1;
    }

    let (first, last) = match (months.keys().next(), months.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Vec::new(),
    };

    for issue in issues {
        let month = YearMonth::of(&issue.created_at);
        if month < first || month > last {
            continue;
        }
        let counts = months.entry(month).or_default();
        if issue.is_pull_request {
            counts.pull_requests += 1;
        } else {
            counts.issues += 1;
        }
    }

    let mut series = Vec::new();
    let mut cursor = first;
    loop {
        let counts = months.get(&cursor).copied().unwrap_or_default();
        series.push(CommitActivityBucket {
            period: cursor.to_string(),
            commits: counts.commits,
            issues: counts.issues,
            pull_requests: counts.pull_requests,
        });
        if cursor == last {
            break;
        }
        cursor = cursor.succ();
    }

    series
}

/// Most recent dated commit
pub fn last_commit_at(commits: &[CommitRecord]) -> Option<DateTime<Utc>> {
    commits.iter().filter_map(|c| c.committed_at).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn commit_at(year: i32, month: u32, day: u32) -> CommitRecord {
        CommitRecord {
            sha: format!("{year}{month:02}{day:02}"),
            author_login: None,
            committed_at: Some(Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()),
        }
    }

    fn issue_at(year: i32, month: u32, is_pull_request: bool) -> IssueRecord {
        IssueRecord {
            number: 1,
            created_at: Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap(),
            is_pull_request,
        }
    }

    #[test]
    fn test_gaps_are_filled_across_year_boundary() {
        let commits = vec![commit_at(2024, 2, 3), commit_at(2023, 11, 30), commit_at(2024, 2, 20)];
        let series = build_activity_series(&commits, &[]);

        let periods: Vec<&str> = series.iter().map(|b| b.period.as_str()).collect();
        assert_eq!(periods, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(series[0].commits, 1);
        assert_eq!(series[1].commits, 0);
        assert_eq!(series[3].commits, 2);
    }

    #[test]
    fn test_issues_and_pull_requests_share_buckets() {
        let commits = vec![commit_at(2024, 1, 5), commit_at(2024, 3, 5)];
        let issues = vec![
            issue_at(2024, 1, false),
            issue_at(2024, 2, true),
            issue_at(2024, 2, true),
            issue_at(2023, 6, false),
        ];
        let series = build_activity_series(&commits, &issues);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].issues, 1);
        assert_eq!(series[1].pull_requests, 2);
        assert_eq!(series[1].commits, 0);
        assert_eq!(series.iter().map(|b| b.issues).sum::<u32>(), 1);
    }

    #[test]
    fn test_no_commits_is_empty() {
        assert!(build_activity_series(&[], &[issue_at(2024, 1, false)]).is_empty());

        let undated = CommitRecord {
            sha: "x".to_string(),
            author_login: None,
            committed_at: None,
        };
        assert!(build_activity_series(&[undated], &[]).is_empty());
        assert!(last_commit_at(&[]).is_none());
    }

    #[test]
    fn test_last_commit_at_picks_latest() {
        let commits = vec![commit_at(2024, 1, 5), commit_at(2024, 3, 5), commit_at(2023, 3, 5)];
        assert_eq!(
            last_commit_at(&commits),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap())
        );
    }

    proptest! {
        #[test]
        fn prop_series_is_contiguous(
            dates in prop::collection::vec((2015i32..2026, 1u32..=12, 1u32..=28), 1..60)
        ) {
            let commits: Vec<CommitRecord> =
                dates.iter().map(|(y, m, d)| commit_at(*y, *m, *d)).collect();
            let series = build_activity_series(&commits, &[]);

            let first = dates.iter().map(|(y, m, _)| (*y, *m)).min().unwrap();
            let last = dates.iter().map(|(y, m, _)| (*y, *m)).max().unwrap();
            let expected_len = ((last.0 - first.0) * 12 + last.1 as i32 - first.1 as i32 + 1) as usize;

            prop_assert_eq!(series.len(), expected_len);
            prop_assert_eq!(series.iter().map(|b| b.commits as usize).sum::<usize>(), commits.len());
            for pair in series.windows(2) {
                prop_assert!(pair[0].period < pair[1].period);
            }
        }
    }
}

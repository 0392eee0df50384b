//! Contributor ranking

use crate::api::ContributorRecord;
use repopulse_core::ContributorStat;

/// Top contributors plus the count of everyone observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorRanking {
    pub top: Vec<ContributorStat>,
    pub total: u64,
}

/// Order by contributions descending, then login ascending, and keep `top_n`
pub fn rank_contributors(records: Vec<ContributorRecord>, top_n: usize) -> ContributorRanking {
    let total = records.len() as u64;

    let mut ranked: Vec<ContributorStat> = records
        .into_iter()
        .map(|record| ContributorStat {
            login: record.login,
            contributions: record.contributions,
            avatar_url: record.avatar_url,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.contributions
            .cmp(&a.contributions)
            .then_with(|| a.login.cmp(&b.login))
    });
    ranked.truncate(top_n);

    ContributorRanking { top: ranked, total }
}

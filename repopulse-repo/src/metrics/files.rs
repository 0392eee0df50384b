//! File churn ranking and file-type distribution

use super::languages::percentage_shares;
use crate::api::{CommitDetail, TreeEntry};
use repopulse_core::{FileChangeStat, FileTypeShare};
use std::collections::{BTreeMap, HashMap};

pub const NO_EXTENSION: &str = "No extension";

/// Accumulate per-path churn over the sampled commits and keep the `top_k` busiest
pub fn rank_file_changes(details: &[CommitDetail], top_k: usize) -> Vec<FileChangeStat> {
    let mut totals: HashMap<&str, (u64, u64)> = HashMap::new();
    for delta in details.iter().flat_map(|detail| detail.files.iter()) {
        let entry = totals.entry(delta.path.as_str()).or_default();
        entry.0 += delta.additions;
        entry.1 += delta.deletions;
    }

    let mut ranked: Vec<FileChangeStat> = totals
        .into_iter()
        .map(|(path, (additions, deletions))| FileChangeStat {
            path: path.to_string(),
            additions,
            deletions,
            changes: additions + deletions,
        })
        .collect();

    ranked.sort_by(|a, b| b.changes.cmp(&a.changes).then_with(|| a.path.cmp(&b.path)));
    ranked.truncate(top_k);
    ranked
}

/// Extension of the final path component, with its leading dot.
///
/// Leading dots of the file name do not start an extension, so `.gitignore`
/// has none.
pub fn file_extension(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let stem_start = file_name.len() - file_name.trim_start_matches('.').len();
    let dot = file_name.rfind('.')?;
    if dot <= stem_start {
        return None;
    }
    Some(&file_name[dot..])
}

/// Count files per extension with percentages of all files
pub fn file_type_distribution(
    entries: &[TreeEntry],
    precision: u32,
) -> BTreeMap<String, FileTypeShare> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for entry in entries.iter().filter(|entry| entry.is_file()) {
        let key = file_extension(&entry.path).unwrap_or(NO_EXTENSION);
        *counts.entry(key.to_string()).or_default() += 1;
    }

    let shares = percentage_shares(&counts, precision);
    counts
        .into_iter()
        .map(|(extension, count)| {
            let percentage = shares.get(&extension).copied().unwrap_or_default();
            (extension, FileTypeShare { count, percentage })
        })
        .collect()
}

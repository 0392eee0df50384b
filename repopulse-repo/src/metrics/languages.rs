//! Language composition and shared percentage rounding

use repopulse_core::{LanguageBreakdown, LanguageShare};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Share of each key in `counts`, in percent with `precision` decimals.
///
/// Uses largest-remainder rounding so the rounded shares of a non-empty total sum
/// to exactly 100. Remainder ties go to the smaller key. A zero total yields an
/// empty map.
pub fn percentage_shares<K: Ord + Clone>(
    counts: &BTreeMap<K, u64>,
    precision: u32,
) -> BTreeMap<K, f64> {
    let total: u128 = counts.values().map(|&count| count as u128).sum();
    if total == 0 {
        return BTreeMap::new();
    }

    let scale = 10u128.pow(precision);
    let units_total = 100 * scale;

    let mut floors: Vec<(&K, u128, u128)> = counts
        .iter()
        .map(|(key, &count)| {
            let scaled = count as u128 * units_total;
            (key, scaled / total, scaled % total)
        })
        .collect();

    let assigned: u128 = floors.iter().map(|(_, units, _)| units).sum();
    let mut leftover = units_total - assigned;

    let mut by_remainder: Vec<usize> = (0..floors.len()).collect();
    by_remainder.sort_by(|&a, &b| match floors[b].2.cmp(&floors[a].2) {
        Ordering::Equal => floors[a].0.cmp(floors[b].0),
        other => other,
    });
    for index in by_remainder {
        if leftover == 0 {
            break;
        }
        floors[index].1 += 1;
        leftover -= 1;
    }

    floors
        .into_iter()
        .map(|(key, units, _)| (key.clone(), units as f64 / scale as f64))
        .collect()
}

/// Language byte counts into a breakdown with derived percentages
pub fn aggregate_languages(bytes: &BTreeMap<String, u64>, precision: u32) -> LanguageBreakdown {
    let shares = percentage_shares(bytes, precision);
    LanguageBreakdown::from_shares(
        shares
            .into_iter()
            .map(|(language, percentage)| {
                let bytes = bytes.get(&language).copied().unwrap_or_default();
                (language, LanguageShare { bytes, percentage })
            })
            .collect(),
    )
}

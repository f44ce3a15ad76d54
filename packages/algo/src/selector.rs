//! Weak-skill selection for remediation.

use std::cmp::Ordering;

/// Returns up to `k` skill keys with the lowest mastery.
///
/// Entries are ordered ascending by mastery, ties broken by key. With a
/// `threshold`, only entries strictly below it qualify. NaN masteries sort
/// first (treated as least known) and never pass a threshold filter.
pub fn select_weakest<'a, I, K>(mastery: I, k: usize, threshold: Option<f64>) -> Vec<String>
where
    I: IntoIterator<Item = (K, &'a f64)>,
    K: AsRef<str>,
{
    let mut entries: Vec<(String, f64)> = mastery
        .into_iter()
        .map(|(key, value)| (key.as_ref().to_string(), *value))
        .filter(|(_, value)| threshold.map_or(true, |t| *value < t))
        .collect();

    entries.sort_by(|a, b| compare_mastery(a.1, b.1).then_with(|| a.0.cmp(&b.0)));

    entries.into_iter().take(k).map(|(key, _)| key).collect()
}

fn compare_mastery(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.total_cmp(&b),
    }
}

//! Daily nutrition aggregation.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::models::{CalorieLogEntry, DailySummary};

/// Fold one day's entries into totals and per-meal buckets in a single pass.
///
/// Entries belonging to another owner or date are not counted; their ids are
/// reported in [`DailySummary::skipped`].
#[must_use]
pub fn summarize_day(owner: &str, date: NaiveDate, entries: &[CalorieLogEntry]) -> DailySummary {
    let mut summary = DailySummary::empty(owner, date);

    for entry in entries {
        if entry.owner != owner || entry.date != date {
            warn!(
                entry_id = entry.id,
                entry_date = %entry.date,
                %date,
                "entry does not belong to the summarized day, skipping"
            );
            summary.skipped.push(entry.id);
            continue;
        }
        summary.totals.add(entry);
        summary.meals.get_mut(entry.meal).add(entry);
    }

    summary
}

/// One summary per day in `[start, end]`, newest first. Days without entries
/// are included as zeroed summaries.
///
/// Each day goes through [`summarize_day`], so foreign-owner rows end up in
/// that day's `skipped`. Rows dated outside the range are dropped with a
/// warning.
#[must_use]
pub fn summarize_range(
    owner: &str,
    start: NaiveDate,
    end: NaiveDate,
    entries: &[CalorieLogEntry],
) -> Vec<DailySummary> {
    let mut by_day: BTreeMap<NaiveDate, Vec<CalorieLogEntry>> = BTreeMap::new();
    for entry in entries {
        if entry.date < start || entry.date > end {
            warn!(
                entry_id = entry.id,
                entry_date = %entry.date,
                %start,
                %end,
                "entry outside the summarized range, skipping"
            );
            continue;
        }
        by_day.entry(entry.date).or_default().push(entry.clone());
    }

    let mut summaries = Vec::new();
    let mut day = Some(end);
    while let Some(d) = day.filter(|d| *d >= start) {
        let day_entries = by_day.remove(&d).unwrap_or_default();
        summaries.push(summarize_day(owner, d, &day_entries));
        day = d.pred_opt();
    }
    summaries
}

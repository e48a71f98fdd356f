//! Summary statistics for the published dataset.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use kouhyou_core::record::{ChangeLogEntry, Status, TimelineEntry};
use serde::Serialize;

/// Change-log rows carried into the summary.
pub const RECENT_CHANGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub generated_at: NaiveDateTime,
    pub total_records: usize,
    pub active_count: usize,
    pub removed_count: usize,
    pub gap_crossing_count: usize,
    pub by_bureau: BTreeMap<String, usize>,
    /// Entries per first-appeared year.
    pub by_year: BTreeMap<String, usize>,
    /// Mean of the numeric durations, to one decimal place.
    pub avg_duration_days: Option<f64>,
    pub recent_changes: Vec<ChangeLogEntry>,
}

impl Statistics {
    pub fn compute(
        timeline: &[TimelineEntry],
        changes: &[ChangeLogEntry],
        now: NaiveDateTime,
    ) -> Self {
        let mut by_bureau: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_year: BTreeMap<String, usize> = BTreeMap::new();
        let (mut active_count, mut removed_count, mut gap_crossing_count) = (0, 0, 0);
        let mut durations = Vec::new();

        for entry in timeline {
            match entry.status() {
                Some(Status::Active) => active_count += 1,
                Some(Status::Removed) => removed_count += 1,
                None => {}
            }
            if entry.crossed_data_gap() {
                gap_crossing_count += 1;
            }
            if !entry.labor_bureau.is_empty() {
                *by_bureau.entry(entry.labor_bureau.clone()).or_default() += 1;
            }
            if let Some(year) = year_of(&entry.first_appeared) {
                *by_year.entry(year.to_string()).or_default() += 1;
            }
            if let Some(d) = entry.duration() {
                durations.push(d as f64);
            }
        }

        let avg_duration_days = (!durations.is_empty()).then(|| {
            let mean = durations.iter().sum::<f64>() / durations.len() as f64;
            (mean * 10.0).round() / 10.0
        });

        let skip = changes.len().saturating_sub(RECENT_CHANGES);
        Self {
            generated_at: now,
            total_records: timeline.len(),
            active_count,
            removed_count,
            gap_crossing_count,
            by_bureau,
            by_year,
            avg_duration_days,
            recent_changes: changes[skip..].to_vec(),
        }
    }
}

fn year_of(date: &str) -> Option<&str> {
    let year = date.get(..4)?;
    year.bytes().all(|b| b.is_ascii_digit()).then_some(year)
}

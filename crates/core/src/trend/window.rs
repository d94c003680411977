use crate::stats;
use crate::trend::{AnalysisWindow, MoodEntry};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// What window selection gets to look at.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    pub entry_count: usize,
    pub days_covered: u32,
    pub entries_per_day: f64,
    pub volatility: f64,
    pub most_recent: Option<DateTime<Utc>>,
}

impl WindowStats {
    /// Entries with unreadable timestamps still count and contribute their
    /// score; they just cannot stretch the covered span.
    pub fn from_entries(entries: &[MoodEntry], now: DateTime<Utc>) -> Self {
        let timestamps: Vec<DateTime<Utc>> =
            entries.iter().filter_map(MoodEntry::parsed_timestamp).collect();

        let days_covered = match timestamps.iter().min() {
            Some(earliest) => {
                let span_days = (now - *earliest).num_seconds() as f64 / SECONDS_PER_DAY;
                span_days.max(0.0).ceil() as u32 + 1
            }
            None => 1,
        };

        let scores: Vec<f64> = entries.iter().map(|e| e.mood_score.value()).collect();

        Self {
            entry_count: entries.len(),
            days_covered,
            entries_per_day: entries.len() as f64 / f64::from(days_covered),
            volatility: stats::volatility(&scores),
            most_recent: timestamps.iter().max().copied(),
        }
    }

    /// Deterministic window choice: narrow for volatile moods, a little
    /// narrower for dense logging, a week otherwise.
    pub fn fallback_window(&self) -> AnalysisWindow {
        if self.volatility > 0.3 {
            AnalysisWindow::new(3, "high volatility detected")
        } else if self.entries_per_day > 2.0 {
            AnalysisWindow::new(5, "frequent entries")
        } else {
            AnalysisWindow::new(7, "default window")
        }
    }
}

/// Keeps entries no older than the window, preserving input order.
pub fn filter_by_window(
    entries: &[MoodEntry],
    window: &AnalysisWindow,
    now: DateTime<Utc>,
) -> Vec<MoodEntry> {
    let cutoff = now - Duration::days(i64::from(window.size_in_days));
    entries
        .iter()
        .filter(|e| e.parsed_timestamp().is_some_and(|ts| ts >= cutoff))
        .cloned()
        .collect()
}

/// Stable sort, newest first. Unreadable timestamps sink to the end.
pub fn sort_most_recent_first(entries: &mut [MoodEntry]) {
    entries.sort_by_cached_key(|e| Reverse(e.parsed_timestamp()));
}

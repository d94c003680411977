//! Adaptive trend analysis over a person's mood history.
//!
//! A call runs in three stages: pick an analysis window sized to how dense and
//! how volatile the history is, keep the entries inside that window, then
//! classify the trend over what is left. Window choice and pattern reading go
//! through a [`TrendReasoner`], which is either the deterministic
//! [`StatisticalReasoner`] or a [`DelegatingReasoner`] that consults a
//! reasoning backend and falls back to the statistical rules on any failure.

mod analyzer;
mod delegating;
mod reasoner;
mod window;

use crate::mood::Score;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use analyzer::AdaptiveTrendAnalyzer;
pub use delegating::{DelegatingReasoner, ValidationError};
pub use reasoner::{StatisticalReasoner, TrendReasoner};
pub use window::{filter_by_window, sort_most_recent_first, WindowStats};

pub const MIN_WINDOW_DAYS: u32 = 1;
pub const MAX_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

fn neutral_score() -> Score {
    Score::new(crate::mood::NEUTRAL_SCORE)
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EmotionalTone {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

/// A historical mood record as handed over by the history store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    /// ISO 8601 text; entries whose timestamp cannot be read are skipped.
    pub timestamp: String,
    #[serde(default = "neutral_score")]
    pub mood_score: Score,
    #[serde(default)]
    pub emotional_tone: Option<EmotionalTone>,
    #[serde(default, alias = "transcription")]
    pub content: Option<String>,
}

impl MoodEntry {
    pub fn new(timestamp: DateTime<Utc>, mood_score: Score) -> Self {
        Self {
            timestamp: timestamp.to_rfc3339(),
            mood_score,
            emotional_tone: None,
            content: None,
        }
    }

    pub fn with_tone(mut self, primary: &str) -> Self {
        self.emotional_tone = Some(EmotionalTone {
            primary: Some(primary.to_owned()),
            secondary: None,
        });
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = Some(content.to_owned());
        self
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    pub fn primary_emotion(&self) -> Option<&str> {
        self.emotional_tone
            .as_ref()
            .and_then(|t| t.primary.as_deref())
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// RFC 3339, or a naive ISO timestamp read as UTC. A bare date is midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisWindow {
    pub size_in_days: u32,
    pub rationale: String,
}

impl AnalysisWindow {
    pub fn new(size_in_days: u32, rationale: impl Into<String>) -> Self {
        Self {
            size_in_days: size_in_days.clamp(MIN_WINDOW_DAYS, MAX_WINDOW_DAYS),
            rationale: rationale.into(),
        }
    }

    pub fn describe(&self) -> String {
        format!("past {} days", self.size_in_days)
    }
}

impl Default for AnalysisWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_DAYS, "default")
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    Volatile,
    Unknown,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
            TrendDirection::Volatile => "volatile",
            TrendDirection::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    None,
    Gentle,
    Moderate,
    Urgent,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    pub window_description: String,
    pub direction: TrendDirection,
    pub pattern: String,
    pub needs_attention: bool,
    pub attention_reason: String,
    pub support_level: SupportLevel,
    pub insight: String,
    pub recommendations: Vec<String>,
}

impl TrendResult {
    /// What a caller sees before any mood has been recorded.
    pub fn empty() -> Self {
        Self {
            window_description: "no data".to_owned(),
            direction: TrendDirection::Unknown,
            pattern: "No mood entries yet".to_owned(),
            needs_attention: false,
            attention_reason: "Insufficient data".to_owned(),
            support_level: SupportLevel::None,
            insight: "Start recording your moods to receive personalized insights.".to_owned(),
            recommendations: vec![
                "Record your first mood entry".to_owned(),
                "Try a voice recording for richer insights".to_owned(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_and_naive_timestamps() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2026-03-01T08:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2026-03-01T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-03-01T08:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-03-01T08:30:00.250").map(|t| t.timestamp()), Some(expected.timestamp()));
        assert_eq!(parse_timestamp("2026-03-01 08:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2026-03-01 08:30:00.123456").map(|t| t.timestamp()),
            Some(expected.timestamp())
        );
        assert_eq!(parse_timestamp("2026-03-01T08:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2026-03-01"),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2026-13-01"), None);
    }

    #[test]
    fn entry_deserializes_with_defaults_and_transcription_alias() {
        let entry: MoodEntry = serde_json::from_str(
            r#"{"timestamp":"2026-03-01T08:30:00Z","transcription":"long day","emotionalTone":{"primary":"tired"}}"#,
        )
        .unwrap();
        assert_eq!(entry.mood_score.value(), 5.0);
        assert_eq!(entry.content.as_deref(), Some("long day"));
        assert_eq!(entry.primary_emotion(), Some("tired"));
    }

    #[test]
    fn window_is_clamped_and_described() {
        assert_eq!(AnalysisWindow::new(0, "x").size_in_days, 1);
        assert_eq!(AnalysisWindow::new(90, "x").size_in_days, 30);
        assert_eq!(AnalysisWindow::new(5, "x").describe(), "past 5 days");
        assert_eq!(AnalysisWindow::default().rationale, "default");
    }

    #[test]
    fn empty_result_is_the_onboarding_state() {
        let r = TrendResult::empty();
        assert_eq!(r.direction, TrendDirection::Unknown);
        assert!(!r.needs_attention);
        assert_eq!(r.support_level, SupportLevel::None);
        assert_eq!(r.recommendations.len(), 2);
    }
}

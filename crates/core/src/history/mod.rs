//! Persisted interaction history.
//!
//! Every store hands records back oldest first (most recent last), and every
//! consumer that needs another order sorts for itself.

mod file;
mod memory;

use crate::mood::{AggregatedMood, Category, Score, NEUTRAL_SCORE};
use crate::stats::{self, Shift};
use crate::trend::{EmotionalTone, MoodEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use file::JsonFileHistoryStore;
pub use memory::InMemoryHistoryStore;

pub const MAX_USER_TEXT_CHARS: usize = 200;
const TREND_SLICE: usize = 3;

#[derive(thiserror::Error, Debug)]
pub enum HistoryError {
    #[error("history io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("history file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One recorded check-in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub timestamp: String,
    pub mood: f64,
    pub category: Category,
    #[serde(default)]
    pub voice_mood: Option<f64>,
    #[serde(default)]
    pub text_mood: Option<f64>,
    #[serde(default)]
    pub user_text: String,
    #[serde(default, alias = "llmQuestions")]
    pub follow_up: Option<String>,
    #[serde(default)]
    pub audio_path: Option<String>,
    #[serde(default, alias = "llmDecision", skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
}

impl InteractionRecord {
    pub fn from_mood(mood: &AggregatedMood, user_text: &str, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at.to_rfc3339(),
            mood: mood.overall_score,
            category: mood.category,
            voice_mood: mood.voice_component,
            text_mood: mood.text_component,
            user_text: user_text.chars().take(MAX_USER_TEXT_CHARS).collect(),
            follow_up: None,
            audio_path: None,
            decision: None,
        }
    }

    pub fn with_follow_up(mut self, follow_up: impl Into<String>) -> Self {
        self.follow_up = Some(follow_up.into());
        self
    }

    pub fn with_audio_path(mut self, path: impl Into<String>) -> Self {
        self.audio_path = Some(path.into());
        self
    }

    /// The record as the trend analyzer sees it; the category stands in for the tone.
    pub fn to_mood_entry(&self) -> MoodEntry {
        MoodEntry {
            timestamp: self.timestamp.clone(),
            mood_score: Score::new(self.mood),
            emotional_tone: Some(EmotionalTone {
                primary: Some(self.category.as_str().to_owned()),
                secondary: None,
            }),
            content: Some(self.user_text.clone()).filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionTrend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

/// Score-only trend over stored check-ins.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub trend: SessionTrend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_mood: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_mood: Option<f64>,
    pub count: usize,
}

impl TrendSummary {
    /// `moods` oldest first. Compares the last three against the first three.
    pub fn from_moods(moods: &[f64]) -> Self {
        if moods.len() < 2 {
            return Self {
                trend: SessionTrend::InsufficientData,
                average_mood: None,
                recent_mood: None,
                count: moods.len(),
            };
        }

        let take = TREND_SLICE.min(moods.len());
        let early = &moods[..take];
        let recent = &moods[moods.len() - take..];

        let early_avg = stats::mean(early).unwrap_or(NEUTRAL_SCORE);
        let recent_avg = stats::mean(recent).unwrap_or(NEUTRAL_SCORE);
        let average = stats::mean(moods).unwrap_or(NEUTRAL_SCORE);

        let trend = match stats::classify_shift(recent_avg, early_avg) {
            Shift::Improving => SessionTrend::Improving,
            Shift::Declining => SessionTrend::Declining,
            Shift::Stable => SessionTrend::Stable,
        };

        Self {
            trend,
            average_mood: Some(stats::round2(average)),
            recent_mood: Some(stats::round2(recent_avg)),
            count: moods.len(),
        }
    }
}

/// Ordered storage of interaction records.
pub trait HistoryStore: Send + Sync {
    fn append(&self, record: InteractionRecord) -> Result<(), HistoryError>;

    /// Up to `n` newest records, oldest first.
    fn recent(&self, n: usize) -> Result<Vec<InteractionRecord>, HistoryError>;

    /// Attaches a final recommendation to the newest record. No-op when empty.
    fn set_final_decision(&self, decision: &str) -> Result<(), HistoryError>;

    fn clear(&self) -> Result<(), HistoryError>;

    fn trend(&self, n: usize) -> Result<TrendSummary, HistoryError> {
        let moods: Vec<f64> = self.recent(n)?.iter().map(|r| r.mood).collect();
        Ok(TrendSummary::from_moods(&moods))
    }

    fn recent_entries(&self, n: usize) -> Result<Vec<MoodEntry>, HistoryError> {
        Ok(self
            .recent(n)?
            .iter()
            .map(InteractionRecord::to_mood_entry)
            .collect())
    }
}

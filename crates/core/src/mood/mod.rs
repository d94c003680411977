mod aggregator;

use crate::stats::round2;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use aggregator::{SignalAggregator, VoiceReading, DISCREPANCY_THRESHOLD, VOICE_BASE_WEIGHT};

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;
pub const NEUTRAL_SCORE: f64 = 5.0;

/// Mood intensity on the 1-10 scale, low = distress, high = elevated affect.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, PartialOrd)]
#[serde(from = "f64", into = "f64")]
pub struct Score(f64);

impl Score {
    /// Clamps into [1, 10]. Non-finite input reads as neutral.
    pub fn new(value: f64) -> Self {
        if !value.is_finite() {
            return Self(NEUTRAL_SCORE);
        }
        Self(value.clamp(MIN_SCORE, MAX_SCORE))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// Reliability of a voice measurement in [0, 1].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, PartialOrd)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const FULL: Confidence = Confidence(1.0);

    /// Clamps into [0, 1]. Non-finite input carries no trust.
    pub fn new(value: f64) -> Self {
        if !value.is_finite() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::FULL
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    VeryLow,
    Low,
    Neutral,
    Positive,
    VeryPositive,
}

impl Category {
    /// Partition of [1, 10] with boundaries at 3, 5, 7 and 9, lower bound inclusive.
    pub fn from_score(score: f64) -> Self {
        if score < 3.0 {
            Category::VeryLow
        } else if score < 5.0 {
            Category::Low
        } else if score < 7.0 {
            Category::Neutral
        } else if score < 9.0 {
            Category::Positive
        } else {
            Category::VeryPositive
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::VeryLow => "very_low",
            Category::Low => "low",
            Category::Neutral => "neutral",
            Category::Positive => "positive",
            Category::VeryPositive => "very_positive",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::VeryLow => "very low",
            Category::Low => "low",
            Category::Neutral => "steady",
            Category::Positive => "positive",
            Category::VeryPositive => "very positive",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgently a follow-up should be worded. A communication aid only.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Discrepancy {
    pub magnitude: f64,
    pub interpretation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMood {
    pub overall_score: f64,
    pub category: Category,
    pub voice_component: Option<f64>,
    pub text_component: Option<f64>,
    pub discrepancy: Option<Discrepancy>,
}

impl AggregatedMood {
    /// A mood built from a single modality. No discrepancy can exist without both.
    pub fn single(voice: Option<Score>, text: Option<Score>) -> Option<Self> {
        let (present, voice_component, text_component) = match (voice, text) {
            (Some(v), None) => (v, Some(round2(v.value())), None),
            (None, Some(t)) => (t, None, Some(round2(t.value()))),
            _ => return None,
        };
        Some(Self {
            overall_score: present.value(),
            category: Category::from_score(present.value()),
            voice_component,
            text_component,
            discrepancy: None,
        })
    }

    pub fn urgency(&self) -> Urgency {
        if self.overall_score < 3.0 {
            Urgency::High
        } else if self.overall_score < 5.0 {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_boundaries_are_lower_inclusive() {
        assert_eq!(Category::from_score(1.0), Category::VeryLow);
        assert_eq!(Category::from_score(2.999), Category::VeryLow);
        assert_eq!(Category::from_score(3.0), Category::Low);
        assert_eq!(Category::from_score(5.0), Category::Neutral);
        assert_eq!(Category::from_score(6.999), Category::Neutral);
        assert_eq!(Category::from_score(7.0), Category::Positive);
        assert_eq!(Category::from_score(9.0), Category::VeryPositive);
        assert_eq!(Category::from_score(10.0), Category::VeryPositive);
    }

    #[test]
    fn score_and_confidence_clamp() {
        assert_eq!(Score::new(12.0).value(), 10.0);
        assert_eq!(Score::new(0.2).value(), 1.0);
        assert_eq!(Score::new(f64::NAN).value(), NEUTRAL_SCORE);
        assert_eq!(Confidence::new(1.7).value(), 1.0);
        assert_eq!(Confidence::new(-0.1).value(), 0.0);
        assert_eq!(Confidence::new(f64::INFINITY).value(), 0.0);
    }

    #[test]
    fn single_modality_keeps_value_and_nulls_the_other() {
        let text_only = AggregatedMood::single(None, Some(Score::new(3.5))).expect("one present");
        assert_eq!(text_only.overall_score, 3.5);
        assert_eq!(text_only.category, Category::Low);
        assert_eq!(text_only.voice_component, None);
        assert_eq!(text_only.text_component, Some(3.5));
        assert!(text_only.discrepancy.is_none());

        let voice_only = AggregatedMood::single(Some(Score::new(9.2)), None).expect("one present");
        assert_eq!(voice_only.category, Category::VeryPositive);
        assert_eq!(voice_only.text_component, None);

        assert!(AggregatedMood::single(None, None).is_none());
        assert!(AggregatedMood::single(Some(Score::new(5.0)), Some(Score::new(5.0))).is_none());
    }

    #[test]
    fn urgency_tiers_follow_overall_score() {
        let mood = |overall_score| AggregatedMood {
            overall_score,
            category: Category::from_score(overall_score),
            voice_component: None,
            text_component: None,
            discrepancy: None,
        };
        assert_eq!(mood(2.5).urgency(), Urgency::High);
        assert_eq!(mood(4.0).urgency(), Urgency::Medium);
        assert_eq!(mood(5.0).urgency(), Urgency::Low);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let mood = AggregatedMood::single(None, Some(Score::new(6.0))).expect("one present");
        let json = serde_json::to_value(&mood).expect("serializable");
        assert_eq!(json["overallScore"], 6.0);
        assert_eq!(json["category"], "neutral");
        assert!(json["voiceComponent"].is_null());
    }
}

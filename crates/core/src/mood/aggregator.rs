use crate::mood::{AggregatedMood, Category, Confidence, Discrepancy, Score};
use crate::stats::round2;
use serde::{Deserialize, Serialize};

/// Share of the blend carried by voice at full confidence.
pub const VOICE_BASE_WEIGHT: f64 = 0.6;

/// Modality scores further apart than this are reported as a discrepancy.
pub const DISCREPANCY_THRESHOLD: f64 = 3.0;

const LOG_TARGET: &str = "mood::aggregator";

const TEXT_ABOVE_VOICE: &str =
    "Text more positive than voice: possible emotional masking";
const VOICE_ABOVE_TEXT: &str =
    "Voice more positive than text: possible venting without underlying distress";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct VoiceReading {
    pub score: Score,
    #[serde(default)]
    pub confidence: Confidence,
}

impl VoiceReading {
    pub fn new(score: Score, confidence: Confidence) -> Self {
        Self { score, confidence }
    }
}

/// Fuses a voice score and a text score into one assessment.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignalAggregator;

impl SignalAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(&self, voice: Score, text: Score, voice_confidence: Confidence) -> AggregatedMood {
        let voice_weight = VOICE_BASE_WEIGHT * voice_confidence.value();
        let text_weight = 1.0 - voice_weight;

        let overall = round2(voice.value() * voice_weight + text.value() * text_weight);
        let category = Category::from_score(overall);
        let discrepancy = detect_discrepancy(voice.value(), text.value());

        tracing::debug!(
            target: LOG_TARGET,
            voice = voice.value(),
            text = text.value(),
            voice_weight,
            overall,
            %category,
            discrepancy = discrepancy.is_some(),
            "aggregated mood"
        );

        AggregatedMood {
            overall_score: overall,
            category,
            voice_component: Some(round2(voice.value())),
            text_component: Some(round2(text.value())),
            discrepancy,
        }
    }

    /// Aggregates whatever modalities the caller has. `None` when neither is present.
    pub fn aggregate_available(
        &self,
        voice: Option<VoiceReading>,
        text: Option<Score>,
    ) -> Option<AggregatedMood> {
        match (voice, text) {
            (Some(v), Some(t)) => Some(self.aggregate(v.score, t, v.confidence)),
            (voice, text) => AggregatedMood::single(voice.map(|v| v.score), text),
        }
    }
}

fn detect_discrepancy(voice: f64, text: f64) -> Option<Discrepancy> {
    let diff = (voice - text).abs();
    if diff <= DISCREPANCY_THRESHOLD {
        return None;
    }
    let interpretation = if text > voice + DISCREPANCY_THRESHOLD {
        TEXT_ABOVE_VOICE
    } else {
        VOICE_ABOVE_TEXT
    };
    Some(Discrepancy {
        magnitude: round2(diff),
        interpretation: interpretation.to_owned(),
    })
}

use crate::stats::{self, Shift};
use crate::trend::{
    AnalysisWindow, MoodEntry, SupportLevel, TrendDirection, TrendResult, WindowStats,
};
use futures::future::{self, BoxFuture};
use futures::FutureExt;

/// Decides the analysis window and reads the pattern inside it.
///
/// Implementations never fail: whatever goes wrong internally, the caller
/// gets a usable window and a usable result.
pub trait TrendReasoner: Send + Sync {
    fn select_window<'a>(&'a self, stats: &'a WindowStats) -> BoxFuture<'a, AnalysisWindow>;

    /// `entries` are non-empty, inside `window`, newest first.
    fn analyze_patterns<'a>(
        &'a self,
        entries: &'a [MoodEntry],
        window: &'a AnalysisWindow,
    ) -> BoxFuture<'a, TrendResult>;
}

/// Fixed statistical rules. No I/O.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatisticalReasoner;

impl StatisticalReasoner {
    pub fn new() -> Self {
        Self
    }

    pub fn window_for(&self, stats: &WindowStats) -> AnalysisWindow {
        stats.fallback_window()
    }

    pub fn patterns_for(&self, entries: &[MoodEntry], window: &AnalysisWindow) -> TrendResult {
        let scores: Vec<f64> = entries.iter().map(|e| e.mood_score.value()).collect();
        let Some(avg) = stats::mean(&scores) else {
            return TrendResult::empty();
        };

        let recent_avg = if scores.len() >= 3 {
            stats::mean(&scores[..3]).unwrap_or(avg)
        } else {
            avg
        };
        let older_avg = if scores.len() >= 6 {
            stats::mean(&scores[3..6]).unwrap_or(avg)
        } else {
            avg
        };

        let direction = match stats::classify_shift(recent_avg, older_avg) {
            Shift::Improving => TrendDirection::Improving,
            Shift::Declining => TrendDirection::Declining,
            Shift::Stable => TrendDirection::Stable,
        };

        let needs_attention =
            avg < 4.0 || (direction == TrendDirection::Declining && avg < 5.5);

        TrendResult {
            window_description: window.describe(),
            direction,
            pattern: format!("Average mood: {avg:.1}/10"),
            needs_attention,
            attention_reason: if needs_attention {
                "Mood appears low".to_owned()
            } else {
                "Mood seems acceptable".to_owned()
            },
            support_level: if needs_attention {
                SupportLevel::Moderate
            } else {
                SupportLevel::None
            },
            insight: format!(
                "Your mood has been {direction} recently with an average of {avg:.1}/10."
            ),
            recommendations: vec![
                "Continue tracking your mood".to_owned(),
                "Consider talking to someone you trust".to_owned(),
            ],
        }
    }
}

impl TrendReasoner for StatisticalReasoner {
    fn select_window<'a>(&'a self, stats: &'a WindowStats) -> BoxFuture<'a, AnalysisWindow> {
        future::ready(self.window_for(stats)).boxed()
    }

    fn analyze_patterns<'a>(
        &'a self,
        entries: &'a [MoodEntry],
        window: &'a AnalysisWindow,
    ) -> BoxFuture<'a, TrendResult> {
        future::ready(self.patterns_for(entries, window)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Score;
    use chrono::{Duration, TimeZone, Utc};

    fn newest_first(scores: &[f64]) -> Vec<MoodEntry> {
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| MoodEntry::new(now - Duration::hours(i as i64), Score::new(*s)))
            .collect()
    }

    fn window() -> AnalysisWindow {
        AnalysisWindow::new(7, "test")
    }

    #[test]
    fn recent_rise_reads_as_improving() {
        let r = StatisticalReasoner::new()
            .patterns_for(&newest_first(&[8.0, 8.0, 8.0, 2.0, 2.0, 2.0]), &window());
        assert_eq!(r.direction, TrendDirection::Improving);
        assert!(!r.needs_attention);
        assert_eq!(r.support_level, SupportLevel::None);
        assert_eq!(r.window_description, "past 7 days");
        assert_eq!(r.pattern, "Average mood: 5.0/10");
    }

    #[test]
    fn moderate_decline_needs_attention() {
        let r = StatisticalReasoner::new()
            .patterns_for(&newest_first(&[4.0, 4.0, 4.0, 6.5, 6.5, 6.5]), &window());
        assert_eq!(r.direction, TrendDirection::Declining);
        // average 5.25 is under 5.5 while declining
        assert!(r.needs_attention);
        assert_eq!(r.support_level, SupportLevel::Moderate);
        assert_eq!(r.attention_reason, "Mood appears low");
    }

    #[test]
    fn persistently_low_mood_needs_attention_even_when_stable() {
        let r = StatisticalReasoner::new().patterns_for(&newest_first(&[3.0, 3.5, 3.0]), &window());
        assert_eq!(r.direction, TrendDirection::Stable);
        assert!(r.needs_attention);
    }

    #[test]
    fn short_history_compares_average_with_itself() {
        // fewer than six entries: the older slice falls back to the average
        let r = StatisticalReasoner::new()
            .patterns_for(&newest_first(&[9.0, 9.0, 9.0, 1.0, 1.0]), &window());
        assert_eq!(r.direction, TrendDirection::Improving);

        let r = StatisticalReasoner::new().patterns_for(&newest_first(&[9.0, 1.0]), &window());
        assert_eq!(r.direction, TrendDirection::Stable);
    }

    #[test]
    fn no_entries_gives_empty_state() {
        let r = StatisticalReasoner::new().patterns_for(&[], &window());
        assert_eq!(r, TrendResult::empty());
    }

    #[tokio::test]
    async fn trait_methods_match_the_plain_rules() {
        let reasoner = StatisticalReasoner::new();
        let entries = newest_first(&[5.0, 5.0]);
        let stats = WindowStats::from_entries(&entries, Utc::now());
        assert_eq!(reasoner.select_window(&stats).await, reasoner.window_for(&stats));
        assert_eq!(
            reasoner.analyze_patterns(&entries, &window()).await,
            reasoner.patterns_for(&entries, &window())
        );
    }
}

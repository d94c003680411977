use crate::reasoning::{extract_json, ReasoningBackend, ReasoningError};
use crate::trend::{
    AnalysisWindow, MoodEntry, StatisticalReasoner, SupportLevel, TrendDirection, TrendReasoner,
    TrendResult, WindowStats, MAX_WINDOW_DAYS, MIN_WINDOW_DAYS,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration;

const LOG_TARGET: &str = "trend::delegating";
const WINDOW_MAX_TOKENS: u32 = 150;
const PATTERN_MAX_TOKENS: u32 = 500;
const MAX_SUMMARIZED_ENTRIES: usize = 20;
const MAX_CONTENT_CHARS: usize = 100;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Backend(#[from] ReasoningError),
    #[error("reply does not match schema: {0}")]
    Schema(#[from] serde_json::Error),
    #[error("window of {0} days is outside 1..=30")]
    WindowOutOfRange(i64),
    #[error("field `{0}` is empty")]
    EmptyField(&'static str),
}

#[derive(Deserialize)]
struct WindowReply {
    days: i64,
    reason: String,
}

/// Directions a backend may classify. `unknown` is reserved for the empty state.
#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReplyDirection {
    Improving,
    Declining,
    Stable,
    Volatile,
}

impl From<ReplyDirection> for TrendDirection {
    fn from(d: ReplyDirection) -> Self {
        match d {
            ReplyDirection::Improving => TrendDirection::Improving,
            ReplyDirection::Declining => TrendDirection::Declining,
            ReplyDirection::Stable => TrendDirection::Stable,
            ReplyDirection::Volatile => TrendDirection::Volatile,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatternReply {
    trend_direction: ReplyDirection,
    emotional_pattern: String,
    needs_attention: bool,
    intervention_reason: String,
    support_level: SupportLevel,
    insights: String,
    recommendations: Vec<String>,
}

pub(crate) fn parse_window_reply(raw: &str) -> Result<AnalysisWindow, ValidationError> {
    let reply: WindowReply = serde_json::from_str(extract_json(raw)?)?;
    let in_range = i64::from(MIN_WINDOW_DAYS)..=i64::from(MAX_WINDOW_DAYS);
    if !in_range.contains(&reply.days) {
        return Err(ValidationError::WindowOutOfRange(reply.days));
    }
    if reply.reason.trim().is_empty() {
        return Err(ValidationError::EmptyField("reason"));
    }
    // in range, so the cast is lossless
    Ok(AnalysisWindow::new(reply.days as u32, reply.reason.trim()))
}

pub(crate) fn parse_pattern_reply(
    raw: &str,
    window: &AnalysisWindow,
) -> Result<TrendResult, ValidationError> {
    let reply: PatternReply = serde_json::from_str(extract_json(raw)?)?;
    if reply.insights.trim().is_empty() {
        return Err(ValidationError::EmptyField("insights"));
    }
    if reply.emotional_pattern.trim().is_empty() {
        return Err(ValidationError::EmptyField("emotionalPattern"));
    }
    Ok(TrendResult {
        window_description: window.describe(),
        direction: reply.trend_direction.into(),
        pattern: reply.emotional_pattern,
        needs_attention: reply.needs_attention,
        attention_reason: reply.intervention_reason,
        support_level: reply.support_level,
        insight: reply.insights,
        recommendations: reply
            .recommendations
            .into_iter()
            .filter(|r| !r.trim().is_empty())
            .collect(),
    })
}

fn window_prompt(stats: &WindowStats) -> String {
    let most_recent = stats
        .most_recent
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "none".to_owned());
    format!(
        "Choose how many trailing days of mood history to analyze.\n\
         \n\
         History:\n\
         - entries: {count}\n\
         - days covered: {days}\n\
         - entries per day: {per_day:.1}\n\
         - volatility: {volatility:.2} (0 = flat, 1 = highly volatile)\n\
         - most recent entry: {most_recent}\n\
         \n\
         Guidance: volatile moods call for a short recent window (2-5 days); \
         sparse, stable history supports a longer one (7-14 days); frequent \
         entries make 3-7 days enough; concerning signs favour the last 1-3 days.\n\
         \n\
         Reply with JSON only: {{\"days\": <integer {min}-{max}>, \"reason\": \"<one sentence>\"}}",
        count = stats.entry_count,
        days = stats.days_covered,
        per_day = stats.entries_per_day,
        volatility = stats.volatility,
        min = MIN_WINDOW_DAYS,
        max = MAX_WINDOW_DAYS,
    )
}

fn summarize_entries(entries: &[MoodEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().take(MAX_SUMMARIZED_ENTRIES).enumerate() {
        let _ = writeln!(
            out,
            "{}. [{}] mood {:.1}/10, emotion: {}",
            i + 1,
            entry.timestamp,
            entry.mood_score.value(),
            entry.primary_emotion().unwrap_or("neutral"),
        );
        if let Some(content) = entry.content.as_deref().filter(|c| !c.trim().is_empty()) {
            let clipped: String = content.chars().take(MAX_CONTENT_CHARS).collect();
            let _ = writeln!(out, "   said: \"{clipped}\"");
        }
    }
    out
}

fn pattern_prompt(entries: &[MoodEntry], window: &AnalysisWindow) -> String {
    format!(
        "Read this person's recent mood entries (newest first) and describe how they are doing.\n\
         \n\
         Window: past {days} days, {count} entries\n\
         \n\
         {summary}\n\
         Decide:\n\
         1. trend direction: improving, declining, stable or volatile\n\
         2. the recurring emotional pattern\n\
         3. whether they need attention (persistent low mood, saying they are fine \
         while sounding distressed, isolation or fatigue, sudden shifts)\n\
         4. support level: none, gentle, moderate or urgent\n\
         5. a two or three sentence insight written warmly, not clinically\n\
         6. concrete recommendations, most useful first\n\
         \n\
         Reply with JSON only:\n\
         {{\"trendDirection\": \"...\", \"emotionalPattern\": \"...\", \"needsAttention\": true, \
         \"interventionReason\": \"...\", \"supportLevel\": \"...\", \"insights\": \"...\", \
         \"recommendations\": [\"...\"]}}",
        days = window.size_in_days,
        count = entries.len(),
        summary = summarize_entries(entries),
    )
}

/// Consults a reasoning backend, falling back to [`StatisticalReasoner`]
/// when it errors, times out or answers off-schema. One attempt per call.
pub struct DelegatingReasoner<B> {
    backend: B,
    fallback: StatisticalReasoner,
    timeout: Duration,
}

impl<B: ReasoningBackend> DelegatingReasoner<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self {
            backend,
            fallback: StatisticalReasoner::new(),
            timeout,
        }
    }

    async fn ask(&self, prompt: String, max_output_tokens: u32) -> Result<String, ReasoningError> {
        tokio::time::timeout(self.timeout, self.backend.complete(prompt, max_output_tokens))
            .await
            .map_err(|_| ReasoningError::Timeout(self.timeout))?
    }

    pub async fn try_select_window(
        &self,
        stats: &WindowStats,
    ) -> Result<AnalysisWindow, ValidationError> {
        // Prepare the prompt and ask once
        let raw = self.ask(window_prompt(stats), WINDOW_MAX_TOKENS).await?;

        // Reject anything off-schema or out of range
        parse_window_reply(&raw)
    }

    pub async fn try_analyze_patterns(
        &self,
        entries: &[MoodEntry],
        window: &AnalysisWindow,
    ) -> Result<TrendResult, ValidationError> {
        // Prepare the prompt and ask once
        let raw = self
            .ask(pattern_prompt(entries, window), PATTERN_MAX_TOKENS)
            .await?;

        // Parse the reply
        parse_pattern_reply(&raw, window)
    }
}

impl<B: ReasoningBackend> TrendReasoner for DelegatingReasoner<B> {
    fn select_window<'a>(&'a self, stats: &'a WindowStats) -> BoxFuture<'a, AnalysisWindow> {
        async move {
            match self.try_select_window(stats).await {
                Ok(window) => window,
                Err(e) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        backend = self.backend.name(),
                        error = %e,
                        "window selection failed, using statistical rules"
                    );
                    self.fallback.window_for(stats)
                }
            }
        }
        .boxed()
    }

    fn analyze_patterns<'a>(
        &'a self,
        entries: &'a [MoodEntry],
        window: &'a AnalysisWindow,
    ) -> BoxFuture<'a, TrendResult> {
        async move {
            match self.try_analyze_patterns(entries, window).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(
                        target: LOG_TARGET,
                        backend = self.backend.name(),
                        error = %e,
                        "pattern analysis failed, using statistical rules"
                    );
                    self.fallback.patterns_for(entries, window)
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Score;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Answers every prompt with the same canned text and counts calls.
    #[derive(Clone)]
    struct CannedBackend {
        reply: String,
        calls: Arc<AtomicUsize>,
    }

    impl CannedBackend {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_owned(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl ReasoningBackend for CannedBackend {
        fn complete(&self, _prompt: String, _max: u32) -> BoxFuture<'_, Result<String, ReasoningError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.reply.clone();
            async move { Ok(reply) }.boxed()
        }

        fn name(&self) -> &'static str {
            "canned"
        }
    }

    struct FailingBackend;

    impl ReasoningBackend for FailingBackend {
        fn complete(&self, _prompt: String, _max: u32) -> BoxFuture<'_, Result<String, ReasoningError>> {
            async {
                Err(ReasoningError::Api {
                    status: 503,
                    body: "overloaded".into(),
                })
            }
            .boxed()
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct SlowBackend;

    impl ReasoningBackend for SlowBackend {
        fn complete(&self, _prompt: String, _max: u32) -> BoxFuture<'_, Result<String, ReasoningError>> {
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(r#"{"days": 2, "reason": "too late"}"#.to_owned())
            }
            .boxed()
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn stats_for_dense_flat_history() -> WindowStats {
        WindowStats {
            entry_count: 9,
            days_covered: 3,
            entries_per_day: 3.0,
            volatility: 0.0,
            most_recent: None,
        }
    }

    fn entries() -> Vec<MoodEntry> {
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        [8.0, 8.0, 8.0, 2.0, 2.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, s)| {
                MoodEntry::new(now - chrono::Duration::hours(i as i64), Score::new(*s))
                    .with_tone("calm")
                    .with_content("walked the dog")
            })
            .collect()
    }

    const GOOD_PATTERN: &str = r#"```json
{
  "trendDirection": "volatile",
  "emotionalPattern": "Good mornings, rough evenings",
  "needsAttention": true,
  "interventionReason": "Evening lows keep recurring",
  "supportLevel": "gentle",
  "insights": "Mornings look bright but evenings keep dipping.",
  "recommendations": ["Wind down earlier", "", "Check in with a friend"]
}
```"#;

    #[test]
    fn window_reply_must_be_an_integer_in_range() {
        assert_eq!(
            parse_window_reply(r#"{"days": 4, "reason": "dense logging"}"#).unwrap(),
            AnalysisWindow::new(4, "dense logging")
        );
        assert!(matches!(
            parse_window_reply(r#"{"days": 45, "reason": "long"}"#),
            Err(ValidationError::WindowOutOfRange(45))
        ));
        assert!(matches!(
            parse_window_reply(r#"{"days": 0, "reason": "none"}"#),
            Err(ValidationError::WindowOutOfRange(0))
        ));
        assert!(matches!(
            parse_window_reply(r#"{"days": 3.5, "reason": "half"}"#),
            Err(ValidationError::Schema(_))
        ));
        assert!(matches!(
            parse_window_reply(r#"{"days": 3}"#),
            Err(ValidationError::Schema(_))
        ));
        assert!(matches!(
            parse_window_reply("seven days feels right"),
            Err(ValidationError::Backend(ReasoningError::InvalidResponse(_)))
        ));
    }

    #[test]
    fn pattern_reply_rejects_unknown_direction_and_tier() {
        let window = AnalysisWindow::new(5, "t");
        let unknown_direction = GOOD_PATTERN.replace("volatile", "unknown");
        assert!(matches!(
            parse_pattern_reply(&unknown_direction, &window),
            Err(ValidationError::Schema(_))
        ));
        let bad_tier = GOOD_PATTERN.replace("gentle", "severe");
        assert!(matches!(
            parse_pattern_reply(&bad_tier, &window),
            Err(ValidationError::Schema(_))
        ));
        let no_insight = GOOD_PATTERN.replace(
            "Mornings look bright but evenings keep dipping.",
            " ",
        );
        assert!(matches!(
            parse_pattern_reply(&no_insight, &window),
            Err(ValidationError::EmptyField("insights"))
        ));
    }

    #[test]
    fn summary_is_capped_and_clipped() {
        let now = Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap();
        let long = "x".repeat(300);
        let many: Vec<MoodEntry> = (0..25)
            .map(|i| MoodEntry::new(now - chrono::Duration::hours(i), Score::new(5.0)).with_content(&long))
            .collect();
        let summary = summarize_entries(&many);
        assert!(summary.contains("\n20. ["));
        assert!(!summary.contains("21. ["));
        assert!(summary.contains(&format!("\"{}\"", "x".repeat(100))));
        assert!(!summary.contains(&"x".repeat(101)));
        assert!(summary.contains("emotion: neutral"));
    }

    #[tokio::test]
    async fn backend_window_is_used_when_valid() {
        let reasoner = DelegatingReasoner::new(
            CannedBackend::new("```json\n{\"days\": 12, \"reason\": \"sparse but steady\"}\n```"),
            Duration::from_secs(5),
        );
        let window = reasoner.select_window(&stats_for_dense_flat_history()).await;
        assert_eq!(window, AnalysisWindow::new(12, "sparse but steady"));
    }

    #[tokio::test]
    async fn malformed_and_failing_backends_fall_back_identically() {
        let stats = stats_for_dense_flat_history();
        let expected = StatisticalReasoner::new().window_for(&stats);
        assert_eq!(expected.size_in_days, 5);

        let malformed = DelegatingReasoner::new(CannedBackend::new("no idea"), Duration::from_secs(5));
        let failing = DelegatingReasoner::new(FailingBackend, Duration::from_secs(5));
        assert_eq!(malformed.select_window(&stats).await, expected);
        assert_eq!(failing.select_window(&stats).await, expected);

        let window = AnalysisWindow::new(5, "frequent entries");
        let expected = StatisticalReasoner::new().patterns_for(&entries(), &window);
        assert_eq!(malformed.analyze_patterns(&entries(), &window).await, expected);
        assert_eq!(failing.analyze_patterns(&entries(), &window).await, expected);
        assert_eq!(expected.direction, TrendDirection::Improving);
    }

    #[tokio::test]
    async fn slow_backend_times_out_into_fallback() {
        let reasoner = DelegatingReasoner::new(SlowBackend, Duration::from_millis(50));
        let stats = stats_for_dense_flat_history();
        assert!(matches!(
            reasoner.try_select_window(&stats).await,
            Err(ValidationError::Backend(ReasoningError::Timeout(_)))
        ));
        assert_eq!(reasoner.select_window(&stats).await.size_in_days, 5);
    }

    #[tokio::test]
    async fn backend_patterns_are_mapped_and_windowed() {
        let backend = CannedBackend::new(GOOD_PATTERN);
        let calls = backend.calls.clone();
        let reasoner = DelegatingReasoner::new(backend, Duration::from_secs(5));
        let window = AnalysisWindow::new(4, "t");

        let result = reasoner.analyze_patterns(&entries(), &window).await;
        assert_eq!(result.window_description, "past 4 days");
        assert_eq!(result.direction, TrendDirection::Volatile);
        assert!(result.needs_attention);
        assert_eq!(result.support_level, SupportLevel::Gentle);
        assert_eq!(
            result.recommendations,
            vec!["Wind down earlier".to_owned(), "Check in with a friend".to_owned()]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

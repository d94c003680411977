use crate::config::{ConfigError, ReasoningConfig, ReasoningProvider};
use crate::reasoning::{AnthropicBackend, GeminiBackend};
use crate::trend::{
    filter_by_window, sort_most_recent_first, AnalysisWindow, DelegatingReasoner, MoodEntry,
    StatisticalReasoner, TrendReasoner, TrendResult, WindowStats,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const LOG_TARGET: &str = "trend::analyzer";

/// Runs window selection, filtering and pattern reading for one history snapshot.
///
/// Holds no history of its own; every call is independent of the last.
#[derive(Clone)]
pub struct AdaptiveTrendAnalyzer {
    reasoner: Arc<dyn TrendReasoner>,
}

impl AdaptiveTrendAnalyzer {
    pub fn new(reasoner: Arc<dyn TrendReasoner>) -> Self {
        Self { reasoner }
    }

    pub fn statistical() -> Self {
        Self::new(Arc::new(StatisticalReasoner::new()))
    }

    /// Builds the reasoner named by `config.provider`.
    pub fn from_config(config: &ReasoningConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let timeout = config.timeout();
        let reasoner: Arc<dyn TrendReasoner> = match config.provider {
            ReasoningProvider::Statistical => Arc::new(StatisticalReasoner::new()),
            ReasoningProvider::Anthropic => {
                let key = config.api_keys.anthropic.clone().ok_or(ConfigError::MissingApiKey {
                    provider: "anthropic",
                    env_key: crate::config::ENV_ANTHROPIC_API_KEY,
                })?;
                let mut backend = AnthropicBackend::new(key, config.anthropic_model.clone());
                if let Some(url) = &config.anthropic_base_url {
                    backend = backend.with_base_url(url.as_str());
                }
                Arc::new(DelegatingReasoner::new(backend, timeout))
            }
            ReasoningProvider::Gemini => {
                let key = config.api_keys.gemini.clone().ok_or(ConfigError::MissingApiKey {
                    provider: "gemini",
                    env_key: crate::config::ENV_GEMINI_API_KEY,
                })?;
                let mut backend = GeminiBackend::new(key, config.gemini_model.clone());
                if let Some(url) = &config.gemini_base_url {
                    backend = backend.with_base_url(url.as_str());
                }
                Arc::new(DelegatingReasoner::new(backend, timeout))
            }
        };
        tracing::debug!(target: LOG_TARGET, provider = config.provider.as_str(), "trend reasoner ready");
        Ok(Self::new(reasoner))
    }

    pub async fn select_window(&self, entries: &[MoodEntry], now: DateTime<Utc>) -> AnalysisWindow {
        if entries.is_empty() {
            return AnalysisWindow::default();
        }
        let stats = WindowStats::from_entries(entries, now);
        let window = self.reasoner.select_window(&stats).await;
        tracing::debug!(
            target: LOG_TARGET,
            entries = stats.entry_count,
            days_covered = stats.days_covered,
            volatility = stats.volatility,
            window_days = window.size_in_days,
            rationale = %window.rationale,
            "analysis window selected"
        );
        window
    }

    pub async fn analyze_mood_history(&self, entries: &[MoodEntry]) -> TrendResult {
        self.analyze_mood_history_at(entries, Utc::now()).await
    }

    /// Same as [`Self::analyze_mood_history`] with an explicit reference instant.
    pub async fn analyze_mood_history_at(
        &self,
        entries: &[MoodEntry],
        now: DateTime<Utc>,
    ) -> TrendResult {
        if entries.is_empty() {
            return TrendResult::empty();
        }

        // Size the window from the whole history
        let window = self.select_window(entries, now).await;

        // Keep what falls inside it
        let mut in_window = filter_by_window(entries, &window, now);
        if in_window.is_empty() {
            tracing::debug!(target: LOG_TARGET, window_days = window.size_in_days, "no entries inside window");
            return TrendResult::empty();
        }
        sort_most_recent_first(&mut in_window);

        // Read the pattern, newest first
        self.reasoner.analyze_patterns(&in_window, &window).await
    }
}

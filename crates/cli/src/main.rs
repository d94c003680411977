#![deny(warnings)]

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use mood_fusion_core::config::{
    resolve_api_key, resolve_optional_string, resolve_provider, resolve_string_with_default,
    resolve_u64_with_default, ApiKeys, AppConfig, Env, ReasoningConfig, StdEnv,
    DEFAULT_ANTHROPIC_MODEL, DEFAULT_GEMINI_MODEL, DEFAULT_HISTORY_CAPACITY, DEFAULT_HISTORY_PATH,
    DEFAULT_REASONING_TIMEOUT_MS, ENV_ANTHROPIC_API_KEY, ENV_ANTHROPIC_BASE_URL,
    ENV_ANTHROPIC_MODEL, ENV_GEMINI_API_KEY, ENV_GEMINI_BASE_URL, ENV_GEMINI_MODEL,
    ENV_HISTORY_PATH, ENV_REASONING_TIMEOUT_MS,
};
use mood_fusion_core::history::{HistoryStore, InteractionRecord, JsonFileHistoryStore};
use mood_fusion_core::mood::{
    AggregatedMood, Confidence, Score, SignalAggregator, Urgency, VoiceReading,
};
use mood_fusion_core::trend::{AdaptiveTrendAnalyzer, MoodEntry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mood-fusion")]
#[command(about = "Fuse voice and text mood scores and track how mood trends over time")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// statistical, anthropic or gemini
    #[arg(long, global = true)]
    provider: Option<String>,

    #[arg(long, global = true)]
    anthropic_api_key: Option<String>,

    #[arg(long, global = true)]
    gemini_api_key: Option<String>,

    #[arg(long, global = true)]
    anthropic_base_url: Option<String>,

    #[arg(long, global = true)]
    gemini_base_url: Option<String>,

    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[arg(long, global = true)]
    history_path: Option<String>,

    #[arg(long, global = true, default_value_t = DEFAULT_HISTORY_CAPACITY)]
    history_capacity: usize,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Combine a voice score and/or a text score into one assessment
    Aggregate {
        #[arg(long)]
        voice: Option<f64>,

        #[arg(long, default_value_t = 1.0)]
        voice_confidence: f64,

        #[arg(long)]
        text: Option<f64>,

        /// Append the result to the history file
        #[arg(long)]
        record: bool,

        /// What the person said, stored with the record
        #[arg(long, default_value = "")]
        said: String,

        /// Follow-up questions that were asked, stored with the record
        #[arg(long)]
        follow_up: Option<String>,

        /// Recording the voice score came from, stored with the record
        #[arg(long)]
        audio_path: Option<String>,
    },
    /// Adaptive trend analysis over mood entries
    Analyze {
        /// JSON array of mood entries; the stored history is used when omitted
        #[arg(long)]
        entries: Option<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_HISTORY_CAPACITY)]
        last: usize,
    },
    /// Score-only trend over stored history
    Trend {
        #[arg(long, default_value_t = DEFAULT_HISTORY_CAPACITY)]
        last: usize,
    },
    /// Print stored history, oldest first
    History {
        #[arg(long, default_value_t = 5)]
        last: usize,
    },
    /// Attach a final recommendation to the newest record
    Decide { text: String },
    /// Remove all stored history
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let command = args.command;
    let cfg = build_config(
        ConfigArgs {
            provider: args.provider,
            anthropic_api_key: args.anthropic_api_key,
            gemini_api_key: args.gemini_api_key,
            anthropic_base_url: args.anthropic_base_url,
            gemini_base_url: args.gemini_base_url,
            timeout_ms: args.timeout_ms,
            history_path: args.history_path,
            history_capacity: args.history_capacity,
        },
        &env,
    )?;

    tracing::debug!(
        provider = cfg.reasoning.provider.as_str(),
        history = %cfg.history_path.display(),
        "config loaded"
    );

    run(command, cfg).await
}

async fn run(command: Command, cfg: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Aggregate {
            voice,
            voice_confidence,
            text,
            record,
            said,
            follow_up,
            audio_path,
        } => {
            let voice =
                voice.map(|v| VoiceReading::new(Score::new(v), Confidence::new(voice_confidence)));
            let mood = SignalAggregator::new()
                .aggregate_available(voice, text.map(Score::new))
                .context("at least one of --voice or --text is required")?;

            if record {
                let entry = build_record(&mood, &said, follow_up, audio_path, Utc::now());
                open_history(&cfg)?
                    .append(entry)
                    .context("failed to record interaction")?;
            }
            print_json(&AggregateOutput::new(&mood))
        }
        Command::Analyze { entries, last } => {
            let entries: Vec<MoodEntry> = match entries {
                Some(path) => read_entries(&path)?,
                None => open_history(&cfg)?.recent_entries(last)?,
            };
            let analyzer = AdaptiveTrendAnalyzer::from_config(&cfg.reasoning)?;
            let result = analyzer.analyze_mood_history(&entries).await;
            print_json(&result)
        }
        Command::Trend { last } => print_json(&open_history(&cfg)?.trend(last)?),
        Command::History { last } => print_json(&open_history(&cfg)?.recent(last)?),
        Command::Decide { text } => {
            open_history(&cfg)?.set_final_decision(&text)?;
            Ok(())
        }
        Command::Clear => {
            open_history(&cfg)?.clear()?;
            Ok(())
        }
    }
}

/// The aggregated mood plus its wording aids.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateOutput<'a> {
    #[serde(flatten)]
    mood: &'a AggregatedMood,
    label: &'static str,
    urgency: Urgency,
}

impl<'a> AggregateOutput<'a> {
    fn new(mood: &'a AggregatedMood) -> Self {
        Self {
            mood,
            label: mood.category.label(),
            urgency: mood.urgency(),
        }
    }
}

fn build_record(
    mood: &AggregatedMood,
    said: &str,
    follow_up: Option<String>,
    audio_path: Option<String>,
    at: DateTime<Utc>,
) -> InteractionRecord {
    let mut record = InteractionRecord::from_mood(mood, said, at);
    if let Some(q) = follow_up {
        record = record.with_follow_up(q);
    }
    if let Some(path) = audio_path {
        record = record.with_audio_path(path);
    }
    record
}

fn read_entries(path: &Path) -> anyhow::Result<Vec<MoodEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_entries(&raw).with_context(|| format!("{} is not a JSON array", path.display()))
}

/// Entries that do not fit the mood entry shape are skipped, not fatal.
fn parse_entries(raw: &str) -> anyhow::Result<Vec<MoodEntry>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    let entries = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<MoodEntry>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping unreadable mood entry");
                None
            }
        })
        .collect();
    Ok(entries)
}

fn open_history(cfg: &AppConfig) -> anyhow::Result<JsonFileHistoryStore> {
    JsonFileHistoryStore::open(&cfg.history_path, cfg.history_capacity)
        .with_context(|| format!("failed to open history at {}", cfg.history_path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

struct ConfigArgs {
    provider: Option<String>,
    anthropic_api_key: Option<String>,
    gemini_api_key: Option<String>,
    anthropic_base_url: Option<String>,
    gemini_base_url: Option<String>,
    timeout_ms: Option<u64>,
    history_path: Option<String>,
    history_capacity: usize,
}

fn build_config(args: ConfigArgs, env: &impl Env) -> anyhow::Result<AppConfig> {
    let provider = resolve_provider(args.provider, env)?;

    let anthropic = resolve_api_key(args.anthropic_api_key, ENV_ANTHROPIC_API_KEY, env)?;
    let gemini = resolve_api_key(args.gemini_api_key, ENV_GEMINI_API_KEY, env)?;

    let reasoning = ReasoningConfig {
        provider,
        api_keys: ApiKeys { anthropic, gemini },
        anthropic_model: resolve_string_with_default(
            None,
            ENV_ANTHROPIC_MODEL,
            env,
            DEFAULT_ANTHROPIC_MODEL,
        ),
        gemini_model: resolve_string_with_default(None, ENV_GEMINI_MODEL, env, DEFAULT_GEMINI_MODEL),
        anthropic_base_url: resolve_optional_string(
            args.anthropic_base_url,
            ENV_ANTHROPIC_BASE_URL,
            env,
        ),
        gemini_base_url: resolve_optional_string(args.gemini_base_url, ENV_GEMINI_BASE_URL, env),
        timeout_ms: resolve_u64_with_default(
            args.timeout_ms,
            ENV_REASONING_TIMEOUT_MS,
            env,
            DEFAULT_REASONING_TIMEOUT_MS,
        )?,
    };
    reasoning.validate()?;

    Ok(AppConfig {
        reasoning,
        history_path: PathBuf::from(resolve_string_with_default(
            args.history_path,
            ENV_HISTORY_PATH,
            env,
            DEFAULT_HISTORY_PATH,
        )),
        history_capacity: args.history_capacity,
    })
}

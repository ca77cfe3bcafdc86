use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing, before any session exists.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Timeout applied by stage callers around every model call.
    pub model_timeout_secs: u64,
    /// Idle minutes after which a session is evicted from the store.
    pub session_ttl_minutes: i64,
    pub limits: InterviewLimits,
    pub policy: ControllerPolicy,
}

/// Global interview quotas stamped into every plan.
#[derive(Debug, Clone, Copy)]
pub struct InterviewLimits {
    pub max_total_questions: u32,
    pub max_questions_per_topic: u32,
}

impl Default for InterviewLimits {
    fn default() -> Self {
        Self {
            max_total_questions: 10,
            max_questions_per_topic: 2,
        }
    }
}

/// Adaptive controller thresholds.
///
/// `unknown_markers` is the replaceable policy table for classifying an
/// "I don't know" style answer from evaluator analysis text; override it when
/// deploying against a different interview language.
#[derive(Debug, Clone)]
pub struct ControllerPolicy {
    pub max_poor_answers: u32,
    pub max_good_answers: u32,
    pub max_medium_answers: u32,
    pub max_deepening_questions: u32,
    pub max_hints: u32,
    pub unknown_markers: Vec<String>,
}

impl Default for ControllerPolicy {
    fn default() -> Self {
        Self {
            max_poor_answers: 2,
            max_good_answers: 2,
            max_medium_answers: 3,
            max_deepening_questions: 1,
            max_hints: 1,
            unknown_markers: [
                "does not know",
                "doesn't know",
                "don't know",
                "not sure",
                "unsure",
                "no answer",
                "did not answer",
                "cannot answer",
                "unable to answer",
                "declined to answer",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            model_timeout_secs: parse_env("MODEL_TIMEOUT_SECS", 8)?,
            session_ttl_minutes: parse_env("SESSION_TTL_MINUTES", 120)?,
            limits: InterviewLimits {
                max_total_questions: parse_env("MAX_TOTAL_QUESTIONS", 10)?,
                max_questions_per_topic: parse_env("MAX_QUESTIONS_PER_TOPIC", 2)?,
            },
            policy: ControllerPolicy {
                max_poor_answers: parse_env("MAX_POOR_ANSWERS", 2)?,
                max_good_answers: parse_env("MAX_GOOD_ANSWERS", 2)?,
                max_medium_answers: parse_env("MAX_MEDIUM_ANSWERS", 3)?,
                max_deepening_questions: parse_env("MAX_DEEPENING_QUESTIONS", 1)?,
                max_hints: parse_env("MAX_HINTS", 1)?,
                ..ControllerPolicy::default()
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::sections::models::SectionId;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub generation: GenerationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            generation: GenerationConfig::from_env()?,
        })
    }
}

/// How claimed sections reach a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Spawned onto this process's worker pool.
    #[default]
    Direct,
    /// Pushed onto the Redis queue and picked up by queue consumers.
    Queue,
}

impl FromStr for DispatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(DispatchMode::Direct),
            "queue" => Ok(DispatchMode::Queue),
            other => Err(anyhow!("unknown dispatch mode '{other}' (expected direct or queue)")),
        }
    }
}

/// Generation pipeline knobs. Passed by value into the orchestrator and fallback controller.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub modular_enabled: bool,
    pub fallback_enabled: bool,
    pub worker_budget: usize,
    pub section_timeout: Duration,
    pub section_timeouts: BTreeMap<SectionId, Duration>,
    pub run_deadline: Duration,
    pub dispatch: DispatchMode,
    pub queue_consumers: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            modular_enabled: true,
            fallback_enabled: true,
            worker_budget: 4,
            section_timeout: Duration::from_secs(90),
            section_timeouts: BTreeMap::new(),
            run_deadline: Duration::from_secs(240),
            dispatch: DispatchMode::Direct,
            queue_consumers: 4,
        }
    }
}

impl GenerationConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let section_timeouts = match std::env::var("GENERATION_SECTION_TIMEOUTS") {
            Ok(raw) => parse_section_timeouts(&raw)?,
            Err(_) => defaults.section_timeouts,
        };

        Ok(Self {
            modular_enabled: env_or("GENERATION_MODULAR_ENABLED", defaults.modular_enabled)?,
            fallback_enabled: env_or("GENERATION_FALLBACK_ENABLED", defaults.fallback_enabled)?,
            worker_budget: env_or("GENERATION_WORKER_BUDGET", defaults.worker_budget)?.max(1),
            section_timeout: Duration::from_secs(env_or(
                "GENERATION_SECTION_TIMEOUT_SECS",
                defaults.section_timeout.as_secs(),
            )?),
            section_timeouts,
            run_deadline: Duration::from_secs(env_or(
                "GENERATION_RUN_DEADLINE_SECS",
                defaults.run_deadline.as_secs(),
            )?),
            dispatch: env_or("GENERATION_DISPATCH", defaults.dispatch)?,
            queue_consumers: env_or("GENERATION_QUEUE_CONSUMERS", defaults.queue_consumers)?
                .max(1),
        })
    }
}

/// Parses `cover_letter=120,experience=90` into per-section timeouts (seconds).
fn parse_section_timeouts(raw: &str) -> Result<BTreeMap<SectionId, Duration>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<(SectionId, Duration)> {
            let (section, secs) = pair
                .split_once('=')
                .with_context(|| format!("expected section=seconds, got '{pair}'"))?;
            let section = section.trim().parse::<SectionId>()?;
            let secs = secs
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid timeout for {section}"))?;
            Ok((section, Duration::from_secs(secs)))
        })
        .collect()
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use chrono::NaiveDate;
use devboard_engine::{BatchRequest, EngineConfig, TimeWindow};
use serde::Deserialize;
use shared::{IntoEnumIterator, TimePeriod};

pub const DEFAULT_LLM_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-4o-mini";

fn default_periods() -> Vec<TimePeriod> {
    TimePeriod::iter().collect()
}

fn default_llm_endpoint() -> String {
    DEFAULT_LLM_ENDPOINT.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

const fn default_llm_timeout_secs() -> u64 {
    30
}

const fn default_llm_concurrency() -> usize {
    4
}

/// Runtime settings, read from the process environment (and `.env`).
#[derive(Deserialize, Debug, Clone)]
pub struct Env {
    pub history_dir: PathBuf,
    pub output_dir: PathBuf,
    pub engine_config: Option<PathBuf>,
    #[serde(default = "default_periods")]
    pub periods: Vec<TimePeriod>,
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
    pub logins: Option<Vec<String>>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub summarize_history: bool,
    pub llm_api_key: Option<String>,
    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_llm_concurrency")]
    pub llm_concurrency: usize,
    pub webhook_url: Option<String>,
    pub metrics_file: Option<PathBuf>,
}

impl Env {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let env = envy::from_env::<Env>().context("failed to read environment")?;
        env.validate()?;
        Ok(env)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let (Some(after), Some(before)) = (self.after, self.before) {
            anyhow::ensure!(after <= before, "AFTER {after} is later than BEFORE {before}");
        }
        anyhow::ensure!(!self.periods.is_empty(), "PERIODS must name at least one granularity");
        anyhow::ensure!(self.llm_concurrency > 0, "LLM_CONCURRENCY must be at least 1");
        Ok(())
    }

    /// Open-ended bounds fall back to the widest representable dates.
    pub fn window(&self) -> Option<TimeWindow> {
        match (self.after, self.before) {
            (None, None) => None,
            (after, before) => Some(TimeWindow::from_dates(
                after.unwrap_or(NaiveDate::MIN),
                before.unwrap_or(NaiveDate::MAX),
            )),
        }
    }

    pub fn load_engine_config(&self) -> anyhow::Result<EngineConfig> {
        match &self.engine_config {
            Some(path) => Ok(EngineConfig::load_from_file(path)?),
            None => Ok(EngineConfig::default()),
        }
    }

    pub fn batch_request(&self) -> BatchRequest {
        BatchRequest {
            logins: self.logins.clone().filter(|logins| !logins.is_empty()),
            window: self.window(),
            granularities: self.periods.clone(),
            summarize_history: self.summarize_history,
            generator_timeout: Duration::from_secs(self.llm_timeout_secs),
            generator_concurrency: self.llm_concurrency,
        }
    }
}

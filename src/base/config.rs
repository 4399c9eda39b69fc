//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::base::prompts;

use super::types::Res;

/// Default OpenAI model to use (both agents); it must support structured outputs.
fn default_openai_model() -> String {
    "gpt-4.1".to_string()
}

/// Default sampling temperature; zero keeps classification deterministic.
fn default_openai_temperature() -> f32 {
    0.0
}

/// Default max output tokens for OpenAI model
fn default_openai_max_tokens() -> u32 {
    2048
}

/// Default reasoning effort for `o` models.
fn default_openai_reasoning_effort() -> String {
    "medium".to_string()
}

fn default_openai_timeout_secs() -> u64 {
    60
}

fn default_openai_max_retries() -> u32 {
    1
}

/// Default directive for the ticket intent classifier.
fn default_intent_system_directive() -> String {
    prompts::INTENT_SYSTEM_DIRECTIVE.to_string()
}

/// Default directive for the support conversation fallback.
fn default_support_system_directive() -> String {
    prompts::SUPPORT_SYSTEM_DIRECTIVE.to_string()
}

/// Default directive for the weather analyst.
fn default_sentinel_system_directive() -> String {
    prompts::SENTINEL_SYSTEM_DIRECTIVE.to_string()
}

fn default_support_bind_address() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_documents_path() -> String {
    "documents".to_string()
}

fn default_retrieval_top_k() -> usize {
    4
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_session_max_clients() -> usize {
    10_000
}

fn default_session_max_turns() -> usize {
    20
}

fn default_db_endpoint() -> String {
    "surrealkv://data/support_sentinel".to_string()
}

fn default_db_namespace() -> String {
    "support_sentinel".to_string()
}

fn default_db_database() -> String {
    "agents".to_string()
}

fn default_weather_source_url() -> String {
    "http://127.0.0.1:5001/weather".to_string()
}

fn default_weather_bind_address() -> String {
    "127.0.0.1:5001".to_string()
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_sentinel_history_len() -> usize {
    10
}

fn default_sentinel_step_timeout_secs() -> u64 {
    30
}

fn default_email_smtp_port() -> u16 {
    587
}

fn default_email_subject() -> String {
    prompts::ALERT_EMAIL_SUBJECT.to_string()
}

/// Configuration for both agents.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// OpenAI API key (`OPENAI_API_KEY`); needed by the support agent and the sentinel only.
    #[serde(default)]
    pub openai_api_key: String,
    /// OpenAI model to use (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Alternative OpenAI-compatible endpoint (`OPENAI_BASE_URL`).
    #[serde(default)]
    pub openai_base_url: Option<String>,
    /// Sampling temperature (`OPENAI_TEMPERATURE`), between 0 and 2.
    /// Only applied to `gpt` models.
    #[serde(default = "default_openai_temperature")]
    pub openai_temperature: f32,
    /// Max output tokens for OpenAI model (`OPENAI_MAX_TOKENS`).
    #[serde(default = "default_openai_max_tokens")]
    pub openai_max_tokens: u32,
    /// Reasoning effort for `o` models (`OPENAI_REASONING_EFFORT`): low, medium or high.
    #[serde(default = "default_openai_reasoning_effort")]
    pub openai_reasoning_effort: String,
    /// Timeout for a single OpenAI call, in seconds (`OPENAI_TIMEOUT_SECS`).
    #[serde(default = "default_openai_timeout_secs")]
    pub openai_timeout_secs: u64,
    /// Retries after a failed or timed out OpenAI call (`OPENAI_MAX_RETRIES`).
    #[serde(default = "default_openai_max_retries")]
    pub openai_max_retries: u32,
    /// Optional override of the intent classifier directive (`INTENT_SYSTEM_DIRECTIVE`).
    #[serde(default = "default_intent_system_directive")]
    pub intent_system_directive: String,
    /// Optional override of the support fallback directive (`SUPPORT_SYSTEM_DIRECTIVE`).
    #[serde(default = "default_support_system_directive")]
    pub support_system_directive: String,
    /// Optional override of the weather analyst directive (`SENTINEL_SYSTEM_DIRECTIVE`).
    #[serde(default = "default_sentinel_system_directive")]
    pub sentinel_system_directive: String,
    /// Address the support agent listens on (`SUPPORT_BIND_ADDRESS`).
    #[serde(default = "default_support_bind_address")]
    pub support_bind_address: String,
    /// Folder with the `*.txt` reference documents (`DOCUMENTS_PATH`).
    #[serde(default = "default_documents_path")]
    pub documents_path: String,
    /// Documents handed to the fallback per question (`RETRIEVAL_TOP_K`).
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    /// Idle time after which a client session is forgotten (`SESSION_TTL_SECS`).
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Maximum number of client sessions kept in memory (`SESSION_MAX_CLIENTS`).
    #[serde(default = "default_session_max_clients")]
    pub session_max_clients: usize,
    /// Maximum conversation messages kept per client (`SESSION_MAX_TURNS`); whole exchanges are dropped.
    #[serde(default = "default_session_max_turns")]
    pub session_max_turns: usize,
    /// Database endpoint URL (`DB_ENDPOINT`): a local `surrealkv://` path, `mem://`, or a remote `ws://` server.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database namespace (`DB_NAMESPACE`).
    #[serde(default = "default_db_namespace")]
    pub db_namespace: String,
    /// Database name (`DB_DATABASE`).
    #[serde(default = "default_db_database")]
    pub db_database: String,
    /// Database username (`DB_USERNAME`); sign-in is skipped when unset.
    #[serde(default)]
    pub db_username: Option<String>,
    /// Database password (`DB_PASSWORD`).
    #[serde(default)]
    pub db_password: Option<String>,
    /// Weather feed polled by the sentinel (`WEATHER_SOURCE_URL`).
    #[serde(default = "default_weather_source_url")]
    pub weather_source_url: String,
    /// Address the simulated weather feed listens on (`WEATHER_BIND_ADDRESS`).
    #[serde(default = "default_weather_bind_address")]
    pub weather_bind_address: String,
    /// Seconds between sentinel cycles (`CHECK_INTERVAL_SECS`).
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Readings analyzed per cycle (`SENTINEL_HISTORY_LEN`).
    #[serde(default = "default_sentinel_history_len")]
    pub sentinel_history_len: usize,
    /// Timeout for each step of a sentinel cycle (`SENTINEL_STEP_TIMEOUT_SECS`).
    #[serde(default = "default_sentinel_step_timeout_secs")]
    pub sentinel_step_timeout_secs: u64,
    /// Also alert when the readings break the numeric thresholds (`SENTINEL_ENFORCE_THRESHOLDS`).
    #[serde(default)]
    pub sentinel_enforce_thresholds: bool,
    /// Alert e-mail sender, also the SMTP login (`EMAIL_SENDER`).
    #[serde(default)]
    pub email_sender: String,
    /// SMTP password (`EMAIL_PASSWORD`).
    #[serde(default)]
    pub email_password: String,
    /// Alert e-mail recipient (`EMAIL_RECEIVER`).
    #[serde(default)]
    pub email_receiver: String,
    /// SMTP relay host (`EMAIL_SMTP_SERVER`).
    #[serde(default)]
    pub email_smtp_server: String,
    /// SMTP relay port (`EMAIL_SMTP_PORT`).
    #[serde(default = "default_email_smtp_port")]
    pub email_smtp_port: u16,
    /// Alert e-mail subject (`EMAIL_SUBJECT`).
    #[serde(default = "default_email_subject")]
    pub email_subject: String,
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder();

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        // Environment last, so it overrides the file.
        cfg = cfg.add_source(config::Environment::default().prefix("SUPPORT_SENTINEL").prefix_separator("_"));

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Res<()> {
        if self.openai_temperature < 0.0 || self.openai_temperature > 2.0 {
            return Err(anyhow::anyhow!("OpenAI temperature must be between 0 and 2."));
        }

        if self.openai_max_tokens < 1 || self.openai_max_tokens > 128000 {
            return Err(anyhow::anyhow!("OpenAI max tokens must be between 1 and 128000."));
        }

        if self.openai_max_retries > 10 {
            return Err(anyhow::anyhow!("OpenAI max retries must be at most 10."));
        }

        if self.openai_timeout_secs == 0 {
            return Err(anyhow::anyhow!("OpenAI timeout must be at least one second."));
        }

        if self.check_interval_secs == 0 {
            return Err(anyhow::anyhow!("Check interval must be at least one second."));
        }

        if self.sentinel_history_len == 0 {
            return Err(anyhow::anyhow!("Sentinel history length must be at least 1."));
        }

        if self.sentinel_step_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Sentinel step timeout must be at least one second."));
        }

        if self.session_max_clients == 0 || self.session_max_turns == 0 {
            return Err(anyhow::anyhow!("Session limits must be at least 1."));
        }

        Ok(())
    }

    /// Fail unless an OpenAI API key is configured.
    pub fn require_openai_api_key(&self) -> Res<()> {
        if self.openai_api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("An OpenAI API key (`openai_api_key`) is required for this command."));
        }

        Ok(())
    }

    pub fn openai_timeout(&self) -> Duration {
        Duration::from_secs(self.openai_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn sentinel_step_timeout(&self) -> Duration {
        Duration::from_secs(self.sentinel_step_timeout_secs)
    }

    /// Worst case for one model call: every attempt times out, plus the backoff between them.
    pub fn openai_call_budget(&self) -> Duration {
        let attempts = u64::from(self.openai_max_retries) + 1;
        let backoff_secs = (1_u64 << self.openai_max_retries) - 1;

        Duration::from_secs(self.openai_timeout_secs * attempts + backoff_secs)
    }

    /// Time allowed for the sentinel's analysis step; never shorter than a full model call.
    pub fn sentinel_analysis_timeout(&self) -> Duration {
        self.sentinel_step_timeout().max(self.openai_call_budget())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

// Tests.

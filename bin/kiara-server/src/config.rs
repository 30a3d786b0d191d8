//! Server configuration, loaded from environment variables at startup.
//!
//! Built once in `main` and shared read-only through
//! [`crate::state::AppState`]; nothing reads the environment afterwards.

use std::time::Duration;

use kiara_core::{GenerationOptions, TemplateVariant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration for kiara-server.
///
/// Everything except the shared-secret token has a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// `true` when `KIARA_ENV=production`: quieter logs, no validation
    /// details in error bodies, Swagger UI off by default.
    pub production: bool,

    /// TCP address to bind (default: `"0.0.0.0:5123"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://kiara.db?mode=rwc"`).
    pub database_url: String,

    /// Upper bound of pooled database connections.
    pub db_max_connections: u32,

    /// Shared secret every request must present in `X-Internal-Token`.
    pub internal_token: String,

    /// Root URL of the llama.cpp-compatible inference server.
    pub inference_url: String,

    /// Model label, for logs only.
    pub model: String,

    /// Chat-template family of the served model.
    pub template: TemplateVariant,

    /// Optional Jinja file replacing the built-in chat template.
    pub chat_template_file: Option<String>,

    pub system_prompt: Option<String>,

    pub generation: GenerationOptions,

    pub inference_timeout: Duration,

    /// Generations allowed in flight against the inference server.
    pub max_concurrent_generations: usize,

    /// Largest accepted `message`, in bytes.
    pub max_message_bytes: usize,

    /// Comma-separated CORS origins; wildcard when unset.
    pub cors_allowed_origins: Option<String>,

    pub enable_swagger: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for daily-rolling log files; stdout only when unset.
    pub log_dir: Option<String>,
}

impl Config {
    /// Build [`Config`] from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup: &lookup };

        let production = env
            .get("KIARA_ENV")
            .is_some_and(|v| v.eq_ignore_ascii_case("production"));

        let internal_token = env
            .get("KIARA_INTERNAL_TOKEN")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("KIARA_INTERNAL_TOKEN"))?;

        let defaults = GenerationOptions::default();
        let generation = GenerationOptions {
            max_new_tokens: env.parse("KIARA_MAX_NEW_TOKENS", defaults.max_new_tokens)?,
            temperature: env.parse("KIARA_TEMPERATURE", defaults.temperature)?,
            top_p: env.parse("KIARA_TOP_P", defaults.top_p)?,
            repetition_penalty: env
                .parse("KIARA_REPETITION_PENALTY", defaults.repetition_penalty)?,
        };

        Ok(Self {
            production,
            bind_address: env.get_or("KIARA_BIND", "0.0.0.0:5123"),
            database_url: env.get_or("KIARA_DATABASE_URL", "sqlite://kiara.db?mode=rwc"),
            db_max_connections: env.parse("KIARA_DB_MAX_CONNECTIONS", 10)?,
            internal_token,
            inference_url: env.get_or("KIARA_INFERENCE_URL", "http://127.0.0.1:8080"),
            model: env.get_or("KIARA_MODEL", "kiara"),
            template: env.parse("KIARA_TEMPLATE", TemplateVariant::default())?,
            chat_template_file: env.get("KIARA_CHAT_TEMPLATE_FILE"),
            system_prompt: env.get("KIARA_SYSTEM_PROMPT"),
            generation,
            inference_timeout: Duration::from_secs(
                env.parse("KIARA_INFERENCE_TIMEOUT_SECS", 120)?,
            ),
            max_concurrent_generations: env.parse("KIARA_MAX_CONCURRENT_GENERATIONS", 1)?,
            max_message_bytes: env.parse("KIARA_MAX_MESSAGE_BYTES", 16 * 1024)?,
            cors_allowed_origins: env.get("KIARA_CORS_ORIGINS"),
            enable_swagger: env.flag("KIARA_ENABLE_SWAGGER", !production)?,
            log_level: env.get_or("KIARA_LOG", if production { "warn" } else { "info" }),
            log_json: env.flag("KIARA_LOG_JSON", false)?,
            log_dir: env.get("KIARA_LOG_DIR"),
        })
    }

    /// Human-readable environment name for logs.
    pub fn environment(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "development"
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    /// Set, non-blank value of `key`.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    /// A set but unparsable value is an error; a typo in `KIARA_TEMPLATE`
    /// must not start the server with the wrong cleaning profile.
    fn parse<T: std::str::FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v == "0" || v.eq_ignore_ascii_case("false") => Ok(false),
            Some(value) => Err(ConfigError::Invalid { key, value }),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

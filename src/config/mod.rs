//! Bot configuration.
//!
//! The trigger rules and schedule come from a JSON file (by default
//! `config.json`, overridable via `REPOST_BOT_CONFIG`); credentials come from
//! the environment. Every optional field has a default resolved here, once,
//! and the result is validated before any cycle runs.
//!
//! ```json
//! {
//!   "search":     { "tags": ["#rustlang"], "keywords": ["ferris"], "check_interval_minutes": 10 },
//!   "repost":     { "max_reposts_per_run": 5, "preset_comment": "Great post!" },
//!   "auto_reply": { "keyword_responses": { "thanks": "You're welcome!" }, "default_response": null },
//!   "logging":    { "level": "INFO", "file": "bot.log" },
//!   "database":   { "path": "posts.db" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::triggers::{EmptyKeyword, TriggerConfig};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "REPOST_BOT_CONFIG";

/// Configuration file used when `REPOST_BOT_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 10;
const DEFAULT_SEARCH_LIMIT: u32 = 25;
const DEFAULT_MAX_REPOSTS_PER_RUN: usize = 5;
const DEFAULT_RECENT_REPOSTS_CHECKED: usize = 20;
const DEFAULT_NOTIFICATION_LIMIT: u32 = 50;
const DEFAULT_LOG_LEVEL: &str = "INFO";
const DEFAULT_LOG_FILE: &str = "bot.log";
const DEFAULT_DATABASE_PATH: &str = "posts.db";
const DEFAULT_SERVICE_URL: &str = "https://bsky.social";

/// Errors that make the bot refuse to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON of the expected shape.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A tag, keyword or response keyword was empty.
    #[error(transparent)]
    EmptyKeyword(#[from] EmptyKeyword),

    /// The check interval must be at least one minute.
    #[error("search.check_interval_minutes must be greater than zero")]
    ZeroInterval,

    /// The search limit must be between 1 and 100.
    #[error("search.search_limit must be between 1 and 100, got {0}")]
    SearchLimit(u32),

    /// A required environment variable is missing or empty.
    #[error("missing credential: set {0}")]
    MissingCredential(&'static str),
}

/// The full configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub search: SearchSection,
    pub repost: RepostSection,
    pub auto_reply: AutoReplySection,
    pub logging: LoggingSection,
    pub database: DatabaseSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub check_interval_minutes: u64,
    /// Results requested per search query.
    pub search_limit: u32,
}

impl Default for SearchSection {
    fn default() -> Self {
        SearchSection {
            tags: Vec::new(),
            keywords: Vec::new(),
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepostSection {
    pub max_reposts_per_run: usize,
    pub preset_comment: Option<String>,
}

impl Default for RepostSection {
    fn default() -> Self {
        RepostSection {
            max_reposts_per_run: DEFAULT_MAX_REPOSTS_PER_RUN,
            preset_comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AutoReplySection {
    /// Keyword to response bindings, checked in file order.
    pub keyword_responses: IndexMap<String, String>,
    pub default_response: Option<String>,
    /// How many of the most recent reposts are checked for replies.
    pub recent_reposts_checked: usize,
    pub notification_limit: u32,
}

impl Default for AutoReplySection {
    fn default() -> Self {
        AutoReplySection {
            keyword_responses: IndexMap::new(),
            default_response: None,
            recent_reposts_checked: DEFAULT_RECENT_REPOSTS_CHECKED,
            notification_limit: DEFAULT_NOTIFICATION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Level name such as `DEBUG`, `INFO`, `WARNING` or `ERROR`, in any case.
    pub level: String,
    /// Log file appended to in addition to stderr; `null` disables it.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

impl BotConfig {
    /// Loads the file named by `REPOST_BOT_CONFIG`, or `config.json`.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BotConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.check_interval_minutes == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if !(1..=100).contains(&self.search.search_limit) {
            return Err(ConfigError::SearchLimit(self.search.search_limit));
        }
        self.trigger_config()?;
        Ok(())
    }

    /// Builds the trigger snapshot used by each cycle.
    pub fn trigger_config(&self) -> Result<TriggerConfig, EmptyKeyword> {
        TriggerConfig::from_parts(
            &self.search.tags,
            &self.search.keywords,
            &self.auto_reply.keyword_responses,
            self.auto_reply.default_response.clone(),
            self.repost.max_reposts_per_run,
            self.repost.preset_comment.clone(),
        )
    }

    /// Time between the end of one cycle and the start of the next.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.search.check_interval_minutes.saturating_mul(60))
    }
}

/// Account credentials read from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
    /// Base URL of the account's service, e.g. `https://bsky.social`.
    pub service: String,
}

impl Credentials {
    /// Reads `BLUESKY_HANDLE`, `BLUESKY_PASSWORD` and optionally `BLUESKY_SERVICE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Ok(Credentials {
            identifier: get("BLUESKY_HANDLE").ok_or(ConfigError::MissingCredential("BLUESKY_HANDLE"))?,
            password: get("BLUESKY_PASSWORD")
                .ok_or(ConfigError::MissingCredential("BLUESKY_PASSWORD"))?,
            service: get("BLUESKY_SERVICE").unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string()),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub summarize: SummarizeConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            fetch: FetchConfig::default(),
            reader: ReaderConfig::default(),
            summarize: SummarizeConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum articles taken from a feed per fetch
    #[serde(default = "default_max_articles")]
    pub max_articles_per_feed: usize,
    /// Retry attempts for transient HTTP failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial retry backoff in milliseconds (doubles per attempt)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Whether to fetch each entry's page for full content extraction
    #[serde(default = "default_true")]
    pub extract_entry_pages: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            max_articles_per_feed: default_max_articles(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            extract_entry_pages: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Reader API base URL; the target URL is appended to it
    #[serde(default = "default_reader_base_url")]
    pub base_url: String,
    /// Bearer token for the reader API
    #[serde(default)]
    pub token: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_reader_timeout")]
    pub timeout_secs: u64,
    /// Retry attempts before giving up on an article
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            base_url: default_reader_base_url(),
            token: None,
            timeout_secs: default_reader_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeConfig {
    /// Enable LLM summarization of crawled content
    #[serde(default)]
    pub enabled: bool,
    /// OpenAI-compatible API base URL
    #[serde(default = "default_summarize_api_base")]
    pub api_base: String,
    /// API key for the summarization endpoint
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model identifier
    #[serde(default = "default_summarize_model")]
    pub model: String,
    /// Path to the prompt template file ({{content}} placeholder)
    #[serde(default = "default_prompt_path")]
    pub prompt_path: PathBuf,
    /// Retry attempts per summarization call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed wait between retries in seconds
    #[serde(default = "default_retry_wait")]
    pub retry_wait_secs: u64,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_summarize_api_base(),
            api_key: None,
            model: default_summarize_model(),
            prompt_path: default_prompt_path(),
            max_retries: default_max_retries(),
            retry_wait_secs: default_retry_wait(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Grace window for late triggers in seconds; later than this is skipped
    #[serde(default = "default_misfire_grace")]
    pub misfire_grace_secs: u64,
    /// Spacing between successive enrichment launches in seconds
    #[serde(default = "default_enrich_spacing")]
    pub enrich_spacing_secs: u64,
    /// Capacity of the enrichment queue; overflow is dropped
    #[serde(default = "default_enrich_queue_capacity")]
    pub enrich_queue_capacity: usize,
    /// How many uncrawled articles a manual enrich pass picks up
    #[serde(default = "default_uncrawled_batch")]
    pub uncrawled_batch_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            misfire_grace_secs: default_misfire_grace(),
            enrich_spacing_secs: default_enrich_spacing(),
            enrich_queue_capacity: default_enrich_queue_capacity(),
            uncrawled_batch_limit: default_uncrawled_batch(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedrunner")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_max_articles() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_reader_base_url() -> String {
    "https://r.jina.ai/".to_string()
}

fn default_reader_timeout() -> u64 {
    10
}

fn default_summarize_api_base() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_summarize_model() -> String {
    "google/gemma-3-27b-it:free".to_string()
}

fn default_prompt_path() -> PathBuf {
    PathBuf::from("prompts/summarize.md")
}

fn default_retry_wait() -> u64 {
    20
}

fn default_misfire_grace() -> u64 {
    300
}

fn default_enrich_spacing() -> u64 {
    5
}

fn default_enrich_queue_capacity() -> usize {
    64
}

fn default_uncrawled_batch() -> u32 {
    10
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path
    pub fn load_from(config_path: &std::path::Path) -> crate::Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("feedrunner")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("feedrunner.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}

//! Runtime configuration
//!
//! Configuration is assembled from three layers: a TOML config file, a small
//! set of command-line overrides, and environment-variable fallbacks for
//! secrets that should not live in a file on disk.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments (overrides for the config file)
#[derive(Debug, Parser)]
#[command(name = "keysweep", about = "Continuous secret-key scanner and sync daemon")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "keysweep.toml")]
    pub config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<String>,

    /// Health probe port override
    #[arg(long)]
    pub port: Option<u16>,

    /// Data directory override
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

impl crate::core::error_handling::ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// Merge-based sink (read-modify-write key list)
#[derive(Debug, Clone, Deserialize)]
pub struct MergeSinkConfig {
    pub url: String,
    #[serde(default)]
    pub auth_token: String,
    /// Whether the PUT response echoes the resulting key list. When false a
    /// follow-up GET is used to verify the write.
    #[serde(default = "default_true")]
    pub echoes_keys: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Grouped-append sink (bulk add under named groups)
#[derive(Debug, Clone, Deserialize)]
pub struct GroupedSinkConfig {
    pub url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub group_names: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Summary notification channel (Telegram-style)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifierConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search API tokens, rotated round-robin
    pub github_tokens: Vec<String>,
    /// Log level applied after the config file loads; the CLI flag wins
    pub log_level: Option<String>,
    /// File containing one search query per line (# for comments)
    pub queries_file: PathBuf,
    /// Directory for checkpoint and report files
    pub data_dir: PathBuf,
    /// Skip repositories not pushed to within this many days
    pub date_range_days: i64,
    /// Case-insensitive path substrings to skip (docs, samples, ...)
    pub file_path_blacklist: Vec<String>,
    /// Secret pattern matched against file contents
    pub key_pattern: String,
    /// Model name sent in the validation probe request
    pub check_model: String,
    /// Validation endpoint (chat-completions style)
    pub validation_endpoint: String,
    /// Health probe port
    pub health_port: u16,
    /// Persist the checkpoint every N processed items within a query
    pub checkpoint_interval_items: usize,
    /// Sleep between scan passes, seconds
    pub loop_delay_secs: u64,
    /// Sync dispatcher flush interval, seconds
    pub flush_interval_secs: u64,
    /// Interval between summary notifications, seconds
    pub summary_interval_secs: u64,
    /// Disable the jittered pacing delays (used by tests)
    pub no_jitter: bool,

    pub merge_sink: Option<MergeSinkConfig>,
    pub grouped_sink: Option<GroupedSinkConfig>,
    pub notifier: Option<NotifierConfig>,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_tokens: Vec::new(),
            log_level: None,
            queries_file: PathBuf::from("queries.txt"),
            data_dir: PathBuf::from("data"),
            date_range_days: 730,
            file_path_blacklist: [
                "readme", "docs/", "doc/", ".md", "example", "sample", "tutorial", "test", "spec",
                "demo", "mock",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            key_pattern: r"xai-[a-zA-Z0-9\-_]{30,}".to_string(),
            check_model: "grok-3-mini".to_string(),
            validation_endpoint: "https://api.x.ai/v1/chat/completions".to_string(),
            health_port: 8000,
            checkpoint_interval_items: 20,
            loop_delay_secs: 10,
            flush_interval_secs: 60,
            summary_interval_secs: 3600,
            no_jitter: false,
            merge_sink: None,
            grouped_sink: None,
            notifier: None,
        }
    }
}

impl Config {
    /// Load the config file, then apply CLI and environment overrides.
    ///
    /// A missing config file is not an error; defaults plus environment
    /// variables are enough for a minimal deployment.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = if cli.config.exists() {
            let raw = std::fs::read_to_string(&cli.config).map_err(|source| ConfigError::Read {
                path: cli.config.display().to_string(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: cli.config.display().to_string(),
                source,
            })?
        } else {
            Self::default()
        };

        config.apply_env();

        // Blacklist tokens are matched against lowercased paths
        config.file_path_blacklist = config
            .file_path_blacklist
            .iter()
            .map(|token| token.to_lowercase())
            .collect();

        if let Some(port) = cli.port {
            config.health_port = port;
        }
        if let Some(dir) = &cli.data_dir {
            config.data_dir = dir.clone();
        }

        Ok(config)
    }

    /// Environment fallbacks for secrets and platform-injected settings
    fn apply_env(&mut self) {
        if self.github_tokens.is_empty() {
            if let Ok(tokens) = std::env::var("GITHUB_TOKENS") {
                self.github_tokens = tokens
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        // Hosting platforms commonly inject PORT
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.health_port = port;
            }
        }
        if let Some(sink) = &mut self.merge_sink {
            if sink.auth_token.is_empty() {
                if let Ok(auth) = std::env::var("MERGE_SINK_AUTH") {
                    sink.auth_token = auth;
                }
            }
        }
        if let Some(sink) = &mut self.grouped_sink {
            if sink.auth_token.is_empty() {
                if let Ok(auth) = std::env::var("GROUPED_SINK_AUTH") {
                    sink.auth_token = auth;
                }
            }
        }
        if let Some(notifier) = &mut self.notifier {
            if notifier.bot_token.is_empty() {
                if let Ok(token) = std::env::var("TG_BOT_TOKEN") {
                    notifier.bot_token = token;
                }
            }
            if notifier.chat_id.is_empty() {
                if let Ok(chat_id) = std::env::var("TG_CHAT_ID") {
                    notifier.chat_id = chat_id;
                }
            }
        }
    }

    /// Preconditions checked before the scan loop starts. Any failure here
    /// is fatal: the process exits with a non-zero status.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github_tokens.is_empty() {
            return Err(ConfigError::Invalid(
                "no search API tokens configured (github_tokens or GITHUB_TOKENS)".to_string(),
            ));
        }
        if !self.queries_file.exists() {
            return Err(ConfigError::Invalid(format!(
                "queries file not found: {}",
                self.queries_file.display()
            )));
        }
        if self.date_range_days <= 0 {
            return Err(ConfigError::Invalid(
                "date_range_days must be greater than 0".to_string(),
            ));
        }
        if self.checkpoint_interval_items == 0 {
            return Err(ConfigError::Invalid(
                "checkpoint_interval_items must be greater than 0".to_string(),
            ));
        }
        regex::Regex::new(&self.key_pattern).map_err(|e| {
            ConfigError::Invalid(format!("invalid key_pattern '{}': {}", self.key_pattern, e))
        })?;
        Ok(())
    }

    /// Read and filter the query list. Blank lines and `#` comments are
    /// skipped; an empty result is a fatal startup error.
    pub fn load_queries(&self) -> Result<Vec<String>, ConfigError> {
        let raw =
            std::fs::read_to_string(&self.queries_file).map_err(|source| ConfigError::Read {
                path: self.queries_file.display().to_string(),
                source,
            })?;
        let queries: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();
        if queries.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "queries file {} contains no queries",
                self.queries_file.display()
            )));
        }
        Ok(queries)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_dir.join("checkpoint.json")
    }

    pub fn merge_sink_enabled(&self) -> bool {
        self.merge_sink
            .as_ref()
            .is_some_and(|s| s.enabled && !s.url.is_empty() && !s.auth_token.is_empty())
    }

    pub fn grouped_sink_enabled(&self) -> bool {
        self.grouped_sink.as_ref().is_some_and(|s| {
            s.enabled && !s.url.is_empty() && !s.auth_token.is_empty() && !s.group_names.is_empty()
        })
    }

    pub fn notifier_enabled(&self) -> bool {
        self.notifier
            .as_ref()
            .is_some_and(|n| !n.bot_token.is_empty() && !n.chat_id.is_empty())
    }
}

/// Trim a trailing slash so URL joining stays predictable
pub fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn write_queries(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("queries.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_validate_requires_tokens() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tokens"));
    }

    #[test]
    #[serial]
    fn test_validate_requires_queries_file() {
        let config = Config {
            github_tokens: vec!["ghp_test".to_string()],
            queries_file: PathBuf::from("/nonexistent/queries.txt"),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queries file"));
    }

    #[test]
    #[serial]
    fn test_validate_rejects_bad_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            github_tokens: vec!["ghp_test".to_string()],
            queries_file: write_queries(&dir, "xai- in:file\n"),
            key_pattern: "[unclosed".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_queries_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            queries_file: write_queries(&dir, "# comment\n\nxai- in:file\n  language:python xai-  \n"),
            ..Config::default()
        };
        let queries = config.load_queries().unwrap();
        assert_eq!(
            queries,
            vec!["xai- in:file".to_string(), "language:python xai-".to_string()]
        );
    }

    #[test]
    #[serial]
    fn test_load_queries_empty_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            queries_file: write_queries(&dir, "# only comments\n"),
            ..Config::default()
        };
        assert!(config.load_queries().is_err());
    }

    #[test]
    #[serial]
    fn test_env_fallback_for_tokens() {
        std::env::set_var("GITHUB_TOKENS", "tok1, tok2 ,,tok3");
        let mut config = Config::default();
        config.apply_env();
        std::env::remove_var("GITHUB_TOKENS");
        assert_eq!(config.github_tokens, vec!["tok1", "tok2", "tok3"]);
    }

    #[test]
    #[serial]
    fn test_blacklist_tokens_lowercased_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("keysweep.toml");
        std::fs::write(&config_path, "file_path_blacklist = [\"README\", \"Docs/\"]\n").unwrap();

        let cli = Cli {
            config: config_path,
            log_level: None,
            log_file: None,
            port: None,
            data_dir: None,
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(
            config.file_path_blacklist,
            vec!["readme".to_string(), "docs/".to_string()]
        );
    }

    #[test]
    #[serial]
    fn test_sink_enablement_requires_complete_config() {
        let mut config = Config::default();
        assert!(!config.merge_sink_enabled());

        config.merge_sink = Some(MergeSinkConfig {
            url: "http://balancer.local".to_string(),
            auth_token: String::new(),
            echoes_keys: true,
            enabled: true,
        });
        assert!(!config.merge_sink_enabled());

        config.merge_sink.as_mut().unwrap().auth_token = "secret".to_string();
        assert!(config.merge_sink_enabled());
    }

    #[test]
    #[serial]
    fn test_toml_round_trip() {
        let raw = r#"
            github_tokens = ["ghp_a"]
            log_level = "debug"
            date_range_days = 30

            [grouped_sink]
            url = "http://pool.local"
            auth_token = "bearer"
            group_names = ["main", "backup"]
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.date_range_days, 30);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.grouped_sink_enabled());
        assert_eq!(
            config.grouped_sink.unwrap().group_names,
            vec!["main", "backup"]
        );
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://x.local/"), "http://x.local");
        assert_eq!(normalize_base_url("http://x.local"), "http://x.local");
    }
}

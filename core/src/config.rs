use crate::errors::{ChatError, ChatResult};
use crate::filters::FilterState;
use crate::types::RetrievalMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "tipchat";
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:50505";
const DEFAULT_DELTA_DELAY_MS: u64 = 33;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the chat front-end
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ChatConfig {
    pub backend_url: Option<String>,
    pub bearer_token: Option<String>,
    pub stream: Option<bool>,
    /// Pause after each streamed text fragment, in milliseconds
    pub delta_delay_ms: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub top: Option<u32>,
    pub retrieval_mode: Option<RetrievalMode>,
    pub semantic_ranker: Option<bool>,
    pub semantic_captions: Option<bool>,
    pub suggest_followup_questions: Option<bool>,
}

impl ChatConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> ChatResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ChatError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> ChatResult<()> {
        let content = toml::to_string(self)
            .map_err(|e| ChatError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ChatError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content)
            .map_err(|e| ChatError::Config(format!("Failed to write config file: {}", e)))
    }

    /// Merges this config with another config, preferring values from the other config if present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            backend_url: other.backend_url.clone().or_else(|| self.backend_url.clone()),
            bearer_token: other
                .bearer_token
                .clone()
                .or_else(|| self.bearer_token.clone()),
            stream: other.stream.or(self.stream),
            delta_delay_ms: other.delta_delay_ms.or(self.delta_delay_ms),
            connect_timeout_secs: other.connect_timeout_secs.or(self.connect_timeout_secs),
            log_level: other.log_level.clone().or_else(|| self.log_level.clone()),
            top: other.top.or(self.top),
            retrieval_mode: other.retrieval_mode.or(self.retrieval_mode),
            semantic_ranker: other.semantic_ranker.or(self.semantic_ranker),
            semantic_captions: other.semantic_captions.or(self.semantic_captions),
            suggest_followup_questions: other
                .suggest_followup_questions
                .or(self.suggest_followup_questions),
        }
    }

    /// Overlay `TIPCHAT_*` environment variables
    pub fn apply_env(&self) -> Self {
        let from_env = Self {
            backend_url: env::var("TIPCHAT_BACKEND_URL").ok(),
            bearer_token: env::var("TIPCHAT_TOKEN").ok(),
            log_level: env::var("TIPCHAT_LOG_LEVEL").ok(),
            ..Self::default()
        };
        self.merge(&from_env)
    }

    pub fn backend_url(&self) -> &str {
        self.backend_url.as_deref().unwrap_or(DEFAULT_BACKEND_URL)
    }

    pub fn stream(&self) -> bool {
        self.stream.unwrap_or(true)
    }

    pub fn delta_delay(&self) -> Duration {
        Duration::from_millis(self.delta_delay_ms.unwrap_or(DEFAULT_DELTA_DELAY_MS))
    }

    pub fn connect_timeout_secs(&self) -> u64 {
        self.connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("warn")
    }

    /// Initial settings-panel state derived from this config
    pub fn initial_filters(&self) -> FilterState {
        let mut filters = FilterState::new();
        if let Some(top) = self.top {
            filters.top = top;
        }
        if let Some(mode) = self.retrieval_mode {
            filters.retrieval_mode = mode;
        }
        if let Some(ranker) = self.semantic_ranker {
            filters.semantic_ranker = ranker;
        }
        if let Some(captions) = self.semantic_captions {
            filters.semantic_captions = captions;
        }
        if let Some(followups) = self.suggest_followup_questions {
            filters.suggest_followup_questions = followups;
        }
        filters
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir(app_name: &str) -> ChatResult<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| ChatError::Config("Could not determine home directory".to_string()))?;

    Ok(home_dir.join(".config").join(app_name))
}

/// Helper function to get default config file path
pub fn get_default_config_file(app_name: &str) -> ChatResult<PathBuf> {
    let config_dir = get_default_config_dir(app_name)?;
    Ok(config_dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = ChatConfig::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ChatConfig::default());
        assert_eq!(config.backend_url(), DEFAULT_BACKEND_URL);
        assert!(config.stream());
        assert_eq!(config.delta_delay(), Duration::from_millis(33));
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = ChatConfig {
            backend_url: Some("https://chat.example.org".to_string()),
            stream: Some(false),
            delta_delay_ms: Some(0),
            retrieval_mode: Some(RetrievalMode::Text),
            top: Some(5),
            ..ChatConfig::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = ChatConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.delta_delay(), Duration::ZERO);
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "stream = \"sometimes\"").unwrap();
        assert!(matches!(
            ChatConfig::load_from_file(&path),
            Err(ChatError::Config(_))
        ));
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = ChatConfig {
            backend_url: Some("http://a".to_string()),
            top: Some(3),
            stream: Some(true),
            ..ChatConfig::default()
        };
        let other = ChatConfig {
            backend_url: Some("http://b".to_string()),
            stream: Some(false),
            ..ChatConfig::default()
        };
        let merged = base.merge(&other);
        assert_eq!(merged.backend_url(), "http://b");
        assert_eq!(merged.top, Some(3));
        assert!(!merged.stream());
    }

    #[test]
    fn test_initial_filters() {
        let config = ChatConfig {
            top: Some(8),
            retrieval_mode: Some(RetrievalMode::Vectors),
            semantic_ranker: Some(false),
            ..ChatConfig::default()
        };
        let filters = config.initial_filters();
        assert_eq!(filters.top, 8);
        assert_eq!(filters.retrieval_mode, RetrievalMode::Vectors);
        assert!(!filters.semantic_ranker);
        assert!(!filters.semantic_captions);
    }
}

//! Configuration for diarist.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (DIARIST_DATA_DIR, TELEGRAM_BOT_TOKEN,
//!    OPENAI_API_KEY, OPENAI_BASE_URL)
//! 2. Config file (.diarist/config.yaml)
//! 3. Defaults (~/.diarist)
//!
//! Config file discovery:
//! - Searches current directory and parents for .diarist/config.yaml
//! - Paths in config file are relative to the project root (the parent of
//!   the .diarist/ directory)
//!
//! The resolved value is loaded once at startup and handed to each
//! component's constructor.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::ingest::DEFAULT_AUDIO_SUFFIX;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
    #[serde(default)]
    pub services: Option<ServicesConfig>,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Directory holding per-user logs (relative to project root)
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub poll_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub completion_model: Option<String>,
    pub transcription_model: Option<String>,
    pub max_tokens: Option<u32>,
    pub audio_suffix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub max_cached_users: Option<usize>,
}

/// Values taken from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub data_dir: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            data_dir: var("DIARIST_DATA_DIR"),
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN"),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL"),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Directory holding one subdirectory per user
    pub data_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub telegram: TelegramSettings,
    pub openai: OpenAiSettings,
    pub services: ServiceSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    pub poll_timeout_seconds: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            poll_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub completion_model: String,
    pub transcription_model: String,
    pub max_tokens: u32,
    /// File extension of staged voice clips, used to detect the audio format
    pub audio_suffix: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            max_tokens: 100,
            audio_suffix: DEFAULT_AUDIO_SUFFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Upper bound on any single external model call
    pub timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { timeout_seconds: 60 }
    }
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub max_cached_users: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            max_cached_users: 1024,
        }
    }
}

impl ResolvedConfig {
    /// Defaults rooted at `home`, with no credentials
    pub fn with_home(home: &Path) -> Self {
        Self {
            data_dir: home.join("data"),
            config_file: None,
            telegram: TelegramSettings::default(),
            openai: OpenAiSettings::default(),
            services: ServiceSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".diarist").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge defaults, an optional config file and environment overrides
pub fn resolve(
    default_home: &Path,
    file: Option<(&Path, ConfigFile)>,
    env: EnvOverrides,
) -> ResolvedConfig {
    let mut config = ResolvedConfig::with_home(default_home);

    if let Some((config_path, file)) = file {
        // Project root is the parent of .diarist/
        let base_dir = config_path
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));

        if let Some(ref data) = file.paths.data {
            config.data_dir = resolve_path(base_dir, data);
        }

        if let Some(telegram) = file.telegram {
            config.telegram.bot_token = telegram.bot_token;
            if let Some(timeout) = telegram.poll_timeout_seconds {
                config.telegram.poll_timeout_seconds = timeout;
            }
        }

        if let Some(openai) = file.openai {
            config.openai.api_key = openai.api_key;
            if let Some(base_url) = openai.base_url {
                config.openai.base_url = base_url;
            }
            if let Some(model) = openai.completion_model {
                config.openai.completion_model = model;
            }
            if let Some(model) = openai.transcription_model {
                config.openai.transcription_model = model;
            }
            if let Some(max_tokens) = openai.max_tokens {
                config.openai.max_tokens = max_tokens;
            }
            if let Some(suffix) = openai.audio_suffix {
                config.openai.audio_suffix = suffix;
            }
        }

        if let Some(timeout) = file.services.and_then(|s| s.timeout_seconds) {
            config.services.timeout_seconds = timeout;
        }

        if let Some(max) = file.storage.and_then(|s| s.max_cached_users) {
            config.storage.max_cached_users = max;
        }

        config.config_file = Some(config_path.to_path_buf());
    }

    if let Some(data_dir) = env.data_dir {
        config.data_dir = PathBuf::from(data_dir);
    }
    if let Some(token) = env.telegram_bot_token {
        config.telegram.bot_token = Some(token);
    }
    if let Some(key) = env.openai_api_key {
        config.openai.api_key = Some(key);
    }
    if let Some(base_url) = env.openai_base_url {
        config.openai.base_url = base_url;
    }

    config
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".diarist");

    let config = match find_config_file() {
        Some(path) => {
            let file = load_config_file(&path)?;
            resolve(&default_home, Some((&path, file)), EnvOverrides::from_env())
        }
        None => resolve(&default_home, None, EnvOverrides::from_env()),
    };

    Ok(config)
}

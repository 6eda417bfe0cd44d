use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub groq: GroqConfig,
    pub storage: StorageConfig,
    pub calendar: CalendarConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GroqConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub text_model: String,
    pub whisper_model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Redis connection URL; the in-memory backend is used when absent.
    pub redis_url: Option<String>,
    /// Invoice ids kept per conversation history list.
    pub history_limit: usize,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    /// IANA timezone identifier used for calendar-event links.
    pub timezone: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
            },
            groq: GroqConfig {
                api_key: None,
                base_url: "https://api.groq.com/openai/v1".to_string(),
                text_model: "llama-3.3-70b-versatile".to_string(),
                whisper_model: "whisper-large-v3".to_string(),
                timeout_secs: 60,
            },
            storage: StorageConfig { redis_url: None, history_limit: 500 },
            calendar: CalendarConfig { timezone: "Asia/Almaty".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("facturo.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(token) = telegram.bot_token {
                self.telegram.bot_token = token.into();
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(groq) = patch.groq {
            if let Some(api_key) = groq.api_key {
                self.groq.api_key = Some(api_key.into());
            }
            if let Some(base_url) = groq.base_url {
                self.groq.base_url = base_url;
            }
            if let Some(text_model) = groq.text_model {
                self.groq.text_model = text_model;
            }
            if let Some(whisper_model) = groq.whisper_model {
                self.groq.whisper_model = whisper_model;
            }
            if let Some(timeout_secs) = groq.timeout_secs {
                self.groq.timeout_secs = timeout_secs;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(redis_url) = storage.redis_url {
                self.storage.redis_url = Some(redis_url);
            }
            if let Some(history_limit) = storage.history_limit {
                self.storage.history_limit = history_limit;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(timezone) = calendar.timezone {
                self.calendar.timezone = timezone;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(token) = env::var("FACTURO_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token.into();
        }
        if let Ok(api_key) = env::var("FACTURO_GROQ_API_KEY") {
            self.groq.api_key = Some(api_key.into());
        }
        if let Ok(redis_url) = env::var("FACTURO_REDIS_URL") {
            self.storage.redis_url = Some(redis_url);
        }
        if let Ok(timezone) = env::var("FACTURO_CALENDAR_TZ") {
            self.calendar.timezone = timezone;
        }
        if let Ok(level) = env::var("FACTURO_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("FACTURO_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.history_limit == 0 {
            return Err(ConfigError::Validation(
                "storage.history_limit must be at least 1".to_string(),
            ));
        }
        if self.telegram.poll_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "telegram.poll_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_config_path(requested: Option<&Path>) -> Option<PathBuf> {
    match requested {
        Some(path) if path.exists() => Some(path.to_path_buf()),
        Some(_) => None,
        None => {
            let default = PathBuf::from("facturo.toml");
            default.exists().then_some(default)
        }
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    groq: Option<GroqPatch>,
    storage: Option<StoragePatch>,
    calendar: Option<CalendarPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GroqPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    text_model: Option<String>,
    whisper_model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StoragePatch {
    redis_url: Option<String>,
    history_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CalendarPatch {
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigPatch, LogFormat};

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.history_limit, 500);
        assert_eq!(config.calendar.timezone, "Asia/Almaty");
    }

    #[test]
    fn patch_overrides_only_named_fields() {
        let mut config = AppConfig::default();
        let patch: ConfigPatch = toml::from_str(
            r#"
            [storage]
            history_limit = 100

            [logging]
            format = "json"
            "#,
        )
        .expect("parse patch");
        config.apply_patch(patch);

        assert_eq!(config.storage.history_limit, 100);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.groq.whisper_model, "whisper-large-v3");
    }

    #[test]
    fn zero_history_limit_fails_validation() {
        let mut config = AppConfig::default();
        config.storage.history_limit = 0;
        assert!(config.validate().is_err());
    }
}

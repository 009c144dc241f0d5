//! Configuration types.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Slack Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Default maximum accepted file size (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Bot configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot token (`xoxb-...`) used for Web API calls and file downloads.
    pub bot_token: SecretString,
    /// Signing secret used to verify Events API requests.
    pub signing_secret: SecretString,
    /// The bot's own user id. Resolved via `auth.test` when not set.
    pub bot_user_id: Option<String>,
    /// Slack Web API base URL.
    pub api_base: String,
    /// Port for the Events API HTTP server.
    pub port: u16,
    /// Files larger than this are skipped.
    pub max_file_size: u64,
    /// MIME type prefixes that are never processed (e.g. `video/`).
    pub skip_mime_prefixes: Vec<String>,
    /// Processor tuning.
    pub processors: ProcessorConfig,
}

/// Tunables for the built-in processors.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Images wider than this are downscaled.
    pub image_max_width: u32,
    /// Maximum characters of extracted text posted back.
    pub text_preview_chars: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            image_max_width: 800,
            text_preview_chars: 1000,
        }
    }
}

impl BotConfig {
    /// Build configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = required("SLACK_BOT_TOKEN")?;
        let signing_secret = required("SLACK_SIGNING_SECRET")?;

        let bot_user_id = std::env::var("SLACK_BOT_USER_ID")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let api_base = std::env::var("SLACK_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let port = parsed("PORT", 3000)?;
        let max_file_size = parsed("MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?;

        let skip_mime_prefixes =
            parse_list(&std::env::var("SKIP_MIME_PREFIXES").unwrap_or_default());

        let defaults = ProcessorConfig::default();
        let processors = ProcessorConfig {
            image_max_width: parsed("IMAGE_MAX_WIDTH", defaults.image_max_width)?,
            text_preview_chars: parsed("TEXT_PREVIEW_CHARS", defaults.text_preview_chars)?,
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            signing_secret: SecretString::from(signing_secret),
            bot_user_id,
            api_base,
            port,
            max_file_size,
            skip_mime_prefixes,
            processors,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn parsed<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

/// Split a comma-separated list, dropping empty entries.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

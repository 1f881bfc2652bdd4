use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::ConfigError;
use crate::types::ChatId;

pub const DEFAULT_FETCH_LIMIT: u32 = 100;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_EXPORT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_DB_PATH: &str = "/data/sqlite.db";
pub const DEFAULT_ENV_PATH: &str = "/data/.env";

/// Placeholder that resolves a path against the working directory.
const WORKING_DIR_MARKER: &str = "$WD";

/// Periodic database export to a single chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub recipient: ChatId,
    pub interval: Duration,
}

/// Runtime configuration, assembled by the binary from flags and environment.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub request_timeout: Duration,
    pub fetch_limit: u32,

    // Logging
    pub log_level: String,
    pub log_json: bool,

    // Storage
    pub db_path: PathBuf,

    // Export
    pub export: Option<ExportConfig>,
}

impl Config {
    /// Fill in defaults for zero values and check required settings.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        self.bot_token = self.bot_token.trim().to_string();

        if self.fetch_limit == 0 {
            self.fetch_limit = DEFAULT_FETCH_LIMIT;
        }
        if self.request_timeout.is_zero() {
            self.request_timeout = DEFAULT_REQUEST_TIMEOUT;
        }

        if let Some(export) = &self.export {
            if export.recipient.0 == 0 {
                return Err(ConfigError::MissingExportRecipient);
            }
            if export.interval.is_zero() {
                return Err(ConfigError::Invalid(
                    "backup interval must be greater than zero".to_string(),
                ));
            }
        }

        Ok(self)
    }

    /// Log the effective configuration with the bot token masked.
    pub fn log_redacted(&self) {
        info!(
            bot_token = %redact(&self.bot_token),
            request_timeout_secs = self.request_timeout.as_secs(),
            fetch_limit = self.fetch_limit,
            log_level = self.log_level.as_str(),
            log_json = self.log_json,
            db_path = %self.db_path.display(),
            export_recipient = self.export.as_ref().map(|e| e.recipient.0),
            export_interval_secs = self.export.as_ref().map(|e| e.interval.as_secs()),
            "Loaded config"
        );
    }
}

/// Resolve `$WD` paths to `<working dir>/<file_name>`.
pub fn resolve_working_dir(path: &str, working_dir: &Path, file_name: &str) -> PathBuf {
    if path.trim().is_empty() || path.contains(WORKING_DIR_MARKER) {
        working_dir.join(file_name)
    } else {
        PathBuf::from(path)
    }
}

fn redact(secret: &str) -> String {
    match secret.split_once(':') {
        // Bot tokens look like `<bot id>:<secret>`; the id is not sensitive.
        Some((id, _)) => format!("{id}:***"),
        None if secret.is_empty() => String::new(),
        None => "***".to_string(),
    }
}

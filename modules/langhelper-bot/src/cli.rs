use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use langhelper_common::config::{resolve_working_dir, DEFAULT_DB_PATH, DEFAULT_ENV_PATH};
use langhelper_common::{ChatId, Config, ConfigError, ExportConfig};

/// Telegram vocabulary bot.
#[derive(Debug, Parser)]
#[command(name = "langhelper", version)]
pub struct Cli {
    /// Bot API token. Falls back to BOT_TOKEN.
    #[arg(long)]
    pub token: Option<String>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,

    /// Long-poll timeout in seconds.
    #[arg(long, default_value_t = 5)]
    pub timeout_secs: u64,

    /// Maximum updates fetched per poll.
    #[arg(long, default_value_t = 100)]
    pub fetch_limit: u32,

    /// `.env` file to load. `$WD` means the working directory.
    #[arg(long, default_value = DEFAULT_ENV_PATH)]
    pub env_path: String,

    /// SQLite database file. `$WD` means the working directory.
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    pub db_path: String,

    /// Periodically send the database to --backup-receiver.
    #[arg(long)]
    pub backup: bool,

    /// Chat that receives database exports.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub backup_receiver: i64,

    #[arg(long, default_value_t = 86_400)]
    pub backup_interval_secs: u64,
}

impl Cli {
    pub fn env_file(&self, working_dir: &Path) -> PathBuf {
        resolve_working_dir(&self.env_path, working_dir, ".env")
    }

    /// Build the runtime config. The flag token wins over `env_token`.
    pub fn into_config(
        self,
        working_dir: &Path,
        env_token: Option<String>,
    ) -> Result<Config, ConfigError> {
        let db_path = resolve_working_dir(&self.db_path, working_dir, "sqlite.db");
        let export = self.backup.then(|| ExportConfig {
            recipient: ChatId(self.backup_receiver),
            interval: Duration::from_secs(self.backup_interval_secs),
        });

        Config {
            bot_token: self.token.or(env_token).unwrap_or_default(),
            request_timeout: Duration::from_secs(self.timeout_secs),
            fetch_limit: self.fetch_limit,
            log_level: self.log_level,
            log_json: self.log_json,
            db_path,
            export,
        }
        .validate()
    }
}

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("bot token must be specified with [BOT_TOKEN] env or passed as an argument [--token]")]
    MissingToken,

    #[error("backup-receiver must be set with --backup")]
    MissingExportRecipient,

    #[error("Configuration error: {0}")]
    Invalid(String),
}

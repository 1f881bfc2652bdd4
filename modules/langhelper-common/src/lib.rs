pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ExportConfig};
pub use error::ConfigError;
pub use types::*;

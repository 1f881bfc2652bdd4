use async_trait::async_trait;

use crate::error::FeedError;
use crate::feed::event::InboundEvent;

/// Who the feed connected as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedIdentity {
    pub id: i64,
    pub username: Option<String>,
}

/// An event together with the upstream sequence number it arrived under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUpdate {
    pub update_id: i64,
    pub event: InboundEvent,
}

/// A command advertised to chat clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Trigger including the leading slash, e.g. `/random`.
    pub trigger: &'static str,
    pub description: &'static str,
}

/// Upstream the feed connector pulls from.
///
/// Implemented for `TelegramClient` in production and by scripted sources in tests.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Authenticate and identify the bot.
    async fn connect(&self) -> Result<FeedIdentity, FeedError>;

    /// Long-poll for updates with `update_id >= offset`.
    async fn fetch(&self, offset: i64, limit: u32) -> Result<Vec<FeedUpdate>, FeedError>;

    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<(), FeedError>;
}

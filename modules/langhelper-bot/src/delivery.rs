use async_trait::async_trait;

use langhelper_common::ChatId;

use crate::error::DeliveryError;

/// An inline action offered under a reply. Pressing it sends `trigger`
/// back as if the user had typed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyAction {
    pub label: String,
    pub trigger: String,
}

impl ReplyAction {
    pub fn new(label: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            trigger: trigger.into(),
        }
    }
}

/// Outbound side of the bot.
#[async_trait]
pub trait Deliver: Send + Sync {
    /// Send a text reply, with optional inline actions listed one per row.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        actions: &[ReplyAction],
    ) -> Result<(), DeliveryError>;

    /// Resend a stored attachment with a caption.
    async fn send_attachment_with_caption(
        &self,
        chat_id: ChatId,
        attachment_ref: &str,
        caption: &str,
    ) -> Result<(), DeliveryError>;

    /// Upload raw bytes as a named document.
    async fn send_document(
        &self,
        chat_id: ChatId,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), DeliveryError>;
}

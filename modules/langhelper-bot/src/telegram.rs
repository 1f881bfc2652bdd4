//! Bot API bindings for the feed and delivery seams.

use async_trait::async_trait;

use langhelper_common::ChatId;
use telegram_client::{
    BotCommand, InlineKeyboardButton, InlineKeyboardMarkup, Message, TelegramClient, Update,
};

use crate::delivery::{Deliver, ReplyAction};
use crate::error::{DeliveryError, FeedError};
use crate::feed::{CommandSpec, FeedIdentity, FeedSource, FeedUpdate, InboundEvent, InboundMessage};

#[async_trait]
impl FeedSource for TelegramClient {
    async fn connect(&self) -> Result<FeedIdentity, FeedError> {
        let me = self
            .get_me()
            .await
            .map_err(|e| FeedError::Connection(e.to_string()))?;
        Ok(FeedIdentity {
            id: me.id,
            username: me.username,
        })
    }

    async fn fetch(&self, offset: i64, limit: u32) -> Result<Vec<FeedUpdate>, FeedError> {
        let updates = self
            .get_updates(offset, limit)
            .await
            .map_err(|e| FeedError::Fetch(e.to_string()))?;
        Ok(updates.into_iter().map(feed_update).collect())
    }

    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<(), FeedError> {
        let commands: Vec<BotCommand> = commands
            .iter()
            .map(|c| BotCommand {
                command: c.trigger.trim_start_matches('/').to_string(),
                description: c.description.to_string(),
            })
            .collect();
        self.set_my_commands(&commands)
            .await
            .map_err(|e| FeedError::Registration(e.to_string()))
    }
}

#[async_trait]
impl Deliver for TelegramClient {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        actions: &[ReplyAction],
    ) -> Result<(), DeliveryError> {
        let markup = (!actions.is_empty()).then(|| {
            InlineKeyboardMarkup::single_column(actions.iter().map(|a| InlineKeyboardButton {
                text: a.label.clone(),
                callback_data: a.trigger.clone(),
            }))
        });
        self.send_message(chat_id.0, text, markup.as_ref())
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError(e.to_string()))
    }

    async fn send_attachment_with_caption(
        &self,
        chat_id: ChatId,
        attachment_ref: &str,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        self.send_photo(chat_id.0, attachment_ref, caption)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError(e.to_string()))
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), DeliveryError> {
        TelegramClient::send_document(self, chat_id.0, name, bytes.to_vec())
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError(e.to_string()))
    }
}

fn inbound_message(message: Message) -> InboundMessage {
    let attachment_ref = message.attachment_file_id().map(str::to_string);
    InboundMessage {
        chat_id: ChatId(message.chat.id),
        text: message.text,
        caption: message.caption,
        attachment_ref,
    }
}

/// Map a raw update to a feed event. Message wins over channel post, which
/// wins over callback query.
pub fn feed_update(update: Update) -> FeedUpdate {
    let update_id = update.update_id;
    let event = if let Some(message) = update.message {
        InboundEvent::TextMessage(inbound_message(message))
    } else if let Some(post) = update.channel_post {
        InboundEvent::ChannelPost(inbound_message(post))
    } else if let Some(query) = update.callback_query {
        InboundEvent::CallbackQuery {
            data: query.data,
            message: query.message.map(inbound_message),
        }
    } else {
        InboundEvent::Unrecognized { update_id }
    };
    FeedUpdate { update_id, event }
}

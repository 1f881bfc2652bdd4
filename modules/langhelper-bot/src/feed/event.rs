use langhelper_common::ChatId;

/// Normalized view of an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub text: Option<String>,
    pub caption: Option<String>,
    /// Reference to an attached image or document, if any.
    pub attachment_ref: Option<String>,
}

impl InboundMessage {
    pub fn text(chat_id: ChatId, text: &str) -> Self {
        Self {
            chat_id,
            text: Some(text.to_string()),
            caption: None,
            attachment_ref: None,
        }
    }

    pub fn attachment(chat_id: ChatId, caption: &str, attachment_ref: &str) -> Self {
        Self {
            chat_id,
            text: None,
            caption: Some(caption.to_string()),
            attachment_ref: Some(attachment_ref.to_string()),
        }
    }
}

/// One update from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    TextMessage(InboundMessage),
    ChannelPost(InboundMessage),
    /// Inline button press. `message` is the message the button was attached to.
    CallbackQuery {
        data: Option<String>,
        message: Option<InboundMessage>,
    },
    Unrecognized { update_id: i64 },
}

impl InboundEvent {
    /// The message to dispatch on. For button presses the callback data
    /// stands in as the message text. Gives the event back when there is
    /// nothing to dispatch.
    pub fn into_message(self) -> Result<InboundMessage, Self> {
        match self {
            Self::TextMessage(message) | Self::ChannelPost(message) => Ok(message),
            Self::CallbackQuery {
                data,
                message: Some(mut message),
            } => {
                message.text = Some(data.unwrap_or_default());
                Ok(message)
            }
            other => Err(other),
        }
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::TextMessage(m) | Self::ChannelPost(m) => Some(m.chat_id),
            Self::CallbackQuery { message, .. } => message.as_ref().map(|m| m.chat_id),
            Self::Unrecognized { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextMessage(_) => "message",
            Self::ChannelPost(_) => "channel_post",
            Self::CallbackQuery { .. } => "callback_query",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

pub mod error;
pub mod types;

pub use error::{Result, TelegramError};
pub use types::{
    ApiResponse, BotCommand, CallbackQuery, Chat, Document, InlineKeyboardButton,
    InlineKeyboardMarkup, Message, PhotoSize, Update, User,
};

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::{GetUpdatesRequest, SendMessageRequest, SendPhotoRequest, SetMyCommandsRequest};

const BASE_URL: &str = "https://api.telegram.org";

/// HTTP request timeout is the long-poll timeout plus this.
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(poll_timeout + HTTP_TIMEOUT_MARGIN)
            .build()?;

        Ok(Self {
            client,
            token: token.to_string(),
            poll_timeout,
        })
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", BASE_URL, self.token, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        decode_response(status, &body)
    }

    /// Identify the bot. Fails if the token is not accepted.
    pub async fn get_me(&self) -> Result<User> {
        let resp = self.client.get(self.endpoint("getMe")).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        decode_response(status, &body)
    }

    /// Long-poll for updates with `update_id >= offset`.
    pub async fn get_updates(&self, offset: i64, limit: u32) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            offset,
            limit,
            timeout: self.poll_timeout.as_secs(),
        };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;
        tracing::debug!(offset, count = updates.len(), "Fetched updates");
        Ok(updates)
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let request = SendMessageRequest {
            chat_id,
            text,
            reply_markup,
        };
        self.call("sendMessage", &request).await
    }

    /// Re-send a previously uploaded photo by its file id.
    pub async fn send_photo(&self, chat_id: i64, file_id: &str, caption: &str) -> Result<Message> {
        let request = SendPhotoRequest {
            chat_id,
            photo: file_id,
            caption,
        };
        self.call("sendPhoto", &request).await
    }

    /// Upload raw bytes as a document.
    pub async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Message> {
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let resp = self
            .client
            .post(self.endpoint("sendDocument"))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        let message = decode_response(status, &body)?;
        tracing::debug!(chat_id, file_name, size, "Document uploaded");
        Ok(message)
    }

    /// Replace the bot's command menu.
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let request = SetMyCommandsRequest { commands };
        let accepted: bool = self.call("setMyCommands", &request).await?;
        if !accepted {
            return Err(TelegramError::Rejected(
                "setMyCommands returned false".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unwrap the Bot API envelope. Telegram answers errors with a JSON body too,
/// so the description is preferred over the raw body when it parses.
pub fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    let success = (200..300).contains(&status);
    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if success => return Err(e.into()),
        Err(_) => {
            return Err(TelegramError::Api {
                status,
                message: body.to_string(),
            })
        }
    };

    if !success {
        return Err(TelegramError::Api {
            status,
            message: envelope.description.unwrap_or_else(|| body.to_string()),
        });
    }

    if !envelope.ok {
        return Err(TelegramError::Rejected(
            envelope
                .description
                .unwrap_or_else(|| "request not ok".to_string()),
        ));
    }

    envelope
        .result
        .ok_or_else(|| TelegramError::Parse("response has no result".to_string()))
}

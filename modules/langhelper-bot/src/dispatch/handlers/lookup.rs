use langhelper_common::{normalize_word, ChatId};

use super::{title_case, Handlers};
use crate::dispatch::command::MEANING_WITH_EXAMPLE;
use crate::error::HandlerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub word: String,
    pub with_example: bool,
}

/// Parse `<trigger> <word>`. Only the second token is looked up.
pub fn parse_lookup(text: &str) -> Result<LookupRequest, HandlerError> {
    let mut tokens = text.split_whitespace();
    let (Some(trigger), Some(word)) = (tokens.next(), tokens.next()) else {
        return Err(HandlerError::MalformedCommand(text.to_string()));
    };
    Ok(LookupRequest {
        word: normalize_word(word),
        with_example: trigger == MEANING_WITH_EXAMPLE,
    })
}

impl Handlers {
    /// Reply with a word's meaning, and its example image when asked for.
    pub async fn handle_lookup(&self, text: &str, chat_id: ChatId) -> Result<(), HandlerError> {
        let request = parse_lookup(text)?;
        let record = self
            .store
            .get_word_by_text(&request.word)
            .await?
            .ok_or_else(|| HandlerError::NotFound(request.word.clone()))?;

        let reply = format!("{}\n{}", title_case(&record.word), record.meaning);
        if request.with_example {
            self.delivery
                .send_attachment_with_caption(chat_id, &record.attachment_ref, &reply)
                .await?;
        } else {
            self.delivery.send_text(chat_id, &reply, &[]).await?;
        }
        Ok(())
    }
}

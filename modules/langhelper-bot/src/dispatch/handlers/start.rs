use chrono::Utc;
use tracing::{debug, info};

use langhelper_common::UserId;

use super::Handlers;
use crate::error::HandlerError;

pub const WELCOME_REPLY: &str = "Welcome! Send /random to practice a word, \
/meaning <word> to look one up, or /meaning_with_example <word> to see it in use.";

impl Handlers {
    /// Register the user and start tracking every known word for them.
    pub async fn handle_start(&self, user: UserId) -> Result<(), HandlerError> {
        self.store.insert_user(user, Utc::now()).await?;

        let words = self.store.get_all_words().await?;
        if words.is_empty() {
            debug!(user_id = user.0, "No words to seed yet");
        } else {
            self.store.seed_words_for_user(user, &words).await?;
            info!(user_id = user.0, words = words.len(), "Seeded words for user");
        }

        self.delivery.send_text(user, WELCOME_REPLY, &[]).await?;
        Ok(())
    }
}

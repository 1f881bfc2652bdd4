use tracing::debug;

use langhelper_common::UserId;

use super::{title_case, Handlers};
use crate::delivery::ReplyAction;
use crate::dispatch::command::{MEANING, MEANING_WITH_EXAMPLE, RANDOM};
use crate::error::HandlerError;

pub const GUIDANCE_REPLY: &str = "You need to start the bot first to use this feature.";

impl Handlers {
    /// Quiz the user on the word they have gone longest without seeing.
    pub async fn handle_random(&self, user: UserId) -> Result<(), HandlerError> {
        let Some(next) = self.store.least_recently_asked_word(user).await? else {
            debug!(user_id = user.0, "No tracked words, sending guidance");
            self.delivery.send_text(user, GUIDANCE_REPLY, &[]).await?;
            return Ok(());
        };

        self.store.mark_word_asked_now(user, &next.word).await?;

        let actions = [
            ReplyAction::new("Show Meaning", format!("{MEANING} {}", next.word)),
            ReplyAction::new(
                "Show Meaning (With Example)",
                format!("{MEANING_WITH_EXAMPLE} {}", next.word),
            ),
            ReplyAction::new("Next Word", RANDOM),
        ];
        self.delivery
            .send_text(user, &title_case(&next.word), &actions)
            .await?;

        debug!(user_id = user.0, word = next.word.as_str(), "Asked word");
        Ok(())
    }
}

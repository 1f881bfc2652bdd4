use chrono::Utc;
use tracing::info;

use langhelper_common::normalize_word;
use langhelper_store::StoreError;

use super::Handlers;
use crate::error::HandlerError;

/// Split `word\nmeaning`. Lines past the second are ignored.
fn parse_caption(caption: &str) -> Result<(String, String), HandlerError> {
    let mut lines = caption.lines();
    let (Some(word), Some(meaning)) = (lines.next(), lines.next()) else {
        return Err(HandlerError::MalformedCaption);
    };
    let word = normalize_word(word);
    if word.is_empty() {
        return Err(HandlerError::MalformedCaption);
    }
    Ok((word, meaning.trim().to_string()))
}

impl Handlers {
    /// Store a new word and start tracking it for every known user.
    ///
    /// A duplicate still seeds the existing word for every user before the
    /// error is returned.
    pub async fn handle_insert(&self, caption: &str, attachment_ref: &str) -> Result<(), HandlerError> {
        let (word, meaning) = parse_caption(caption)?;
        let inserted = match self
            .store
            .insert_word(&word, &meaning, attachment_ref, Utc::now())
            .await
        {
            Ok(()) => Ok(()),
            Err(e @ StoreError::DuplicateWord(_)) => Err(e),
            Err(e) => return Err(e.into()),
        };

        let users = self.store.list_user_ids().await?;
        if !users.is_empty() {
            self.store.seed_word_for_users(&word, &users).await?;
        }

        inserted?;
        info!(word = word.as_str(), users = users.len(), "Inserted word");
        Ok(())
    }
}

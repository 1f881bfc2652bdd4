use async_trait::async_trait;
use chrono::{DateTime, Utc};

use langhelper_common::{UserId, UserWordRecord, WordRecord};

use crate::error::Result;

/// Data access used by the command handlers.
///
/// Implemented by `SqliteStore` (production) and `MemoryStore` (tests).
#[async_trait]
pub trait WordStore: Send + Sync {
    /// Record a user. Already-known users are left untouched.
    async fn insert_user(&self, id: UserId, at: DateTime<Utc>) -> Result<()>;

    async fn list_user_ids(&self) -> Result<Vec<UserId>>;

    /// Insert a vocabulary entry. Fails with `DuplicateWord` if it exists.
    async fn insert_word(
        &self,
        word: &str,
        meaning: &str,
        attachment_ref: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn get_all_words(&self) -> Result<Vec<WordRecord>>;

    /// Exact lookup on the stored (lowercased) text. `None` means not found.
    async fn get_word_by_text(&self, word: &str) -> Result<Option<WordRecord>>;

    /// Start tracking one word for each of `users`. Existing progress is kept.
    async fn seed_word_for_users(&self, word: &str, users: &[UserId]) -> Result<()>;

    /// Start tracking each of `words` for one user. Existing progress is kept.
    async fn seed_words_for_user(&self, user: UserId, words: &[WordRecord]) -> Result<()>;

    /// The tracked word asked longest ago; never-asked words come first and
    /// ties break by word text. `None` when the user tracks no words.
    async fn least_recently_asked_word(&self, user: UserId) -> Result<Option<UserWordRecord>>;

    async fn mark_word_asked_now(&self, user: UserId, word: &str) -> Result<()>;
}

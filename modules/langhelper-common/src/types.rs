use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Telegram chat identifier. In private chats it is also the user's id,
/// which is how users are keyed in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

pub type UserId = ChatId;

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A vocabulary entry. Stores keep `word` exactly as given; callers pass
/// it through [`normalize_word`] first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    pub word: String,
    pub meaning: String,
    /// Opaque file id of the example image, resendable without re-uploading.
    pub attachment_ref: String,
    pub created_at: DateTime<Utc>,
}

impl WordRecord {
    pub fn new(word: &str, meaning: &str, attachment_ref: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            word: word.to_string(),
            meaning: meaning.to_string(),
            attachment_ref: attachment_ref.to_string(),
            created_at,
        }
    }
}

/// Per-user progress on one word. `last_asked` is `None` until first asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWordRecord {
    pub user_id: UserId,
    pub word: String,
    pub last_asked: Option<DateTime<Utc>>,
}

/// Canonical lookup form of a word.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

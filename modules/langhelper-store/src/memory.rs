//! In-memory [`WordStore`] for tests. Same ordering and conflict rules as
//! the SQLite backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use langhelper_common::{UserId, UserWordRecord, WordRecord};

use crate::error::{Result, StoreError};
use crate::store::WordStore;

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, DateTime<Utc>>,
    words: HashMap<String, WordRecord>,
    // (user, word) -> last_asked
    user_words: BTreeMap<(UserId, String), Option<DateTime<Utc>>>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress rows for one user (for test assertions).
    pub fn progress_for(&self, user: UserId) -> Vec<UserWordRecord> {
        let tables = self.tables.lock().unwrap();
        tables
            .user_words
            .iter()
            .filter(|((u, _), _)| *u == user)
            .map(|((u, w), last)| UserWordRecord {
                user_id: *u,
                word: w.clone(),
                last_asked: *last,
            })
            .collect()
    }
}

#[async_trait]
impl WordStore for MemoryStore {
    async fn insert_user(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        self.tables.lock().unwrap().users.entry(id).or_insert(at);
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>> {
        Ok(self.tables.lock().unwrap().users.keys().copied().collect())
    }

    async fn insert_word(
        &self,
        word: &str,
        meaning: &str,
        attachment_ref: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let record = WordRecord::new(word, meaning, attachment_ref, at);
        let mut tables = self.tables.lock().unwrap();
        if tables.words.contains_key(&record.word) {
            return Err(StoreError::DuplicateWord(record.word));
        }
        tables.words.insert(record.word.clone(), record);
        Ok(())
    }

    async fn get_all_words(&self) -> Result<Vec<WordRecord>> {
        let mut words: Vec<WordRecord> =
            self.tables.lock().unwrap().words.values().cloned().collect();
        words.sort_by(|a, b| (a.created_at, &a.word).cmp(&(b.created_at, &b.word)));
        Ok(words)
    }

    async fn get_word_by_text(&self, word: &str) -> Result<Option<WordRecord>> {
        Ok(self.tables.lock().unwrap().words.get(word).cloned())
    }

    async fn seed_word_for_users(&self, word: &str, users: &[UserId]) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        for user in users {
            tables
                .user_words
                .entry((*user, word.to_string()))
                .or_insert(None);
        }
        Ok(())
    }

    async fn seed_words_for_user(&self, user: UserId, words: &[WordRecord]) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        for word in words {
            tables
                .user_words
                .entry((user, word.word.clone()))
                .or_insert(None);
        }
        Ok(())
    }

    async fn least_recently_asked_word(&self, user: UserId) -> Result<Option<UserWordRecord>> {
        let tables = self.tables.lock().unwrap();
        // BTreeMap iterates words in text order, so min_by_key keeps the first on ties.
        let least = tables
            .user_words
            .iter()
            .filter(|((u, _), _)| *u == user)
            .min_by_key(|(_, last)| (last.is_some(), **last));

        Ok(least.map(|((u, w), last)| UserWordRecord {
            user_id: *u,
            word: w.clone(),
            last_asked: *last,
        }))
    }

    async fn mark_word_asked_now(&self, user: UserId, word: &str) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(last) = tables.user_words.get_mut(&(user, word.to_string())) {
            *last = Some(Utc::now());
        }
        Ok(())
    }
}

//! SQLite-backed [`WordStore`].

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use langhelper_common::{ChatId, UserId, UserWordRecord, WordRecord};

use crate::error::{Result, StoreError};
use crate::store::WordStore;

/// Rows per multi-value INSERT, well under SQLite's bind parameter limit.
const SEED_CHUNK: usize = 500;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file at `path`.
    pub async fn connect(path: &Path) -> Result<Self> {
        // Rollback journal rather than WAL: the exporter ships the main file
        // alone, so committed data must not linger in a -wal sidecar.
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Private in-memory database. Single connection, kept alive for the
    /// lifetime of the pool, since each connection would see its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Create tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id    INTEGER PRIMARY KEY,
                created_at TEXT    NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS words (
                word       TEXT PRIMARY KEY,
                meaning    TEXT NOT NULL,
                file_id    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_words (
                user_id    INTEGER NOT NULL REFERENCES users (user_id),
                word       TEXT    NOT NULL REFERENCES words (word),
                last_asked TEXT,
                PRIMARY KEY (user_id, word)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("SQLite schema ready");
        Ok(())
    }
}

type WordRow = (String, String, String, DateTime<Utc>);

fn word_from_row((word, meaning, file_id, created_at): WordRow) -> WordRecord {
    WordRecord {
        word,
        meaning,
        attachment_ref: file_id,
        created_at,
    }
}

#[async_trait]
impl WordStore for SqliteStore {
    async fn insert_user(&self, id: UserId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (user_id, created_at) VALUES (?, ?) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(id.0)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>> {
        let rows = sqlx::query_as::<_, (i64,)>("SELECT user_id FROM users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| ChatId(id)).collect())
    }

    async fn insert_word(
        &self,
        word: &str,
        meaning: &str,
        attachment_ref: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO words (word, meaning, file_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(word)
        .bind(meaning)
        .bind(attachment_ref)
        .bind(at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateWord(word.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all_words(&self) -> Result<Vec<WordRecord>> {
        let rows = sqlx::query_as::<_, WordRow>(
            "SELECT word, meaning, file_id, created_at FROM words ORDER BY created_at, word",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(word_from_row).collect())
    }

    async fn get_word_by_text(&self, word: &str) -> Result<Option<WordRecord>> {
        let row = sqlx::query_as::<_, WordRow>(
            "SELECT word, meaning, file_id, created_at FROM words WHERE word = ?",
        )
        .bind(word)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(word_from_row))
    }

    async fn seed_word_for_users(&self, word: &str, users: &[UserId]) -> Result<()> {
        if users.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in users.chunks(SEED_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO user_words (user_id, word, last_asked) ");
            qb.push_values(chunk, |mut row, user| {
                row.push_bind(user.0).push_bind(word).push("NULL");
            });
            qb.push(" ON CONFLICT (user_id, word) DO NOTHING");
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(word, users = users.len(), "Seeded word for users");
        Ok(())
    }

    async fn seed_words_for_user(&self, user: UserId, words: &[WordRecord]) -> Result<()> {
        if words.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in words.chunks(SEED_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO user_words (user_id, word, last_asked) ");
            qb.push_values(chunk, |mut row, word| {
                row.push_bind(user.0)
                    .push_bind(word.word.as_str())
                    .push("NULL");
            });
            qb.push(" ON CONFLICT (user_id, word) DO NOTHING");
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(user_id = user.0, words = words.len(), "Seeded words for user");
        Ok(())
    }

    async fn least_recently_asked_word(&self, user: UserId) -> Result<Option<UserWordRecord>> {
        let row = sqlx::query_as::<_, (i64, String, Option<DateTime<Utc>>)>(
            r#"
            SELECT user_id, word, last_asked
            FROM user_words
            WHERE user_id = ?
            ORDER BY last_asked IS NOT NULL, last_asked ASC, word ASC
            LIMIT 1
            "#,
        )
        .bind(user.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user_id, word, last_asked)| UserWordRecord {
            user_id: ChatId(user_id),
            word,
            last_asked,
        }))
    }

    async fn mark_word_asked_now(&self, user: UserId, word: &str) -> Result<()> {
        sqlx::query("UPDATE user_words SET last_asked = ? WHERE user_id = ? AND word = ?")
            .bind(Utc::now())
            .bind(user.0)
            .bind(word)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

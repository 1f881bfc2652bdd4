//! Persistence for users, vocabulary entries and per-user progress.
//!
//! The bot only talks to the [`WordStore`] trait. [`SqliteStore`] is the
//! production backend; [`MemoryStore`] (feature `test-utils`) mirrors its
//! semantics for tests that should not touch a database.

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::WordStore;

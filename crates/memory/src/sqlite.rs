//! SQLite conversation store.
//!
//! One database file with two tables:
//! - `actors` — persona records
//! - `chats`  — chat records with JSON-serialized history and a version
//!   column for compare-and-swap writes
//!
//! The version check turns the lost-update race between concurrent turns on
//! the same chat into a detectable `WriteConflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use switchboard_core::error::StoreError;
use switchboard_core::message::{Actor, ChatId, ChatState, Message};
use switchboard_core::store::ConversationStore;
use tracing::{debug, info};

/// A production SQLite conversation store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite conversation store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations — creates tables and indexes.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS actors (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                persona    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("actors table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id         TEXT PRIMARY KEY,
                actor_id   TEXT NOT NULL,
                title      TEXT NOT NULL,
                summary    TEXT NOT NULL DEFAULT '',
                history    TEXT NOT NULL DEFAULT '[]',
                version    INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chats table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chats_actor ON chats(actor_id, updated_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("actor index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Parse a `ChatState` from a SQLite row.
    fn row_to_chat(row: &sqlx::sqlite::SqliteRow) -> Result<ChatState, StoreError> {
        let history_json: String = row.get("history");
        let history: Vec<Message> = serde_json::from_str(&history_json)
            .map_err(|e| StoreError::Serialization(format!("history column: {e}")))?;

        Ok(ChatState {
            id: ChatId(row.get("id")),
            actor_id: row.get("actor_id"),
            title: row.get("title"),
            summary: row.get("summary"),
            history,
            version: row.get::<i64, _>("version") as u64,
            created_at: parse_timestamp(row.get("created_at"))?,
            updated_at: parse_timestamp(row.get("updated_at"))?,
        })
    }

    /// The stored version of a chat, 0 when the record is absent.
    async fn stored_version(&self, chat_id: &str) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT version FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(row.map(|r| r.get::<i64, _>("version") as u64).unwrap_or(0))
    }
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("timestamp '{raw}': {e}")))
}

#[async_trait]
impl ConversationStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_actor(&self, actor_id: &str) -> Result<Option<Actor>, StoreError> {
        let row = sqlx::query("SELECT id, name, persona, created_at FROM actors WHERE id = ?")
            .bind(actor_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(Actor {
                id: row.get("id"),
                name: row.get("name"),
                persona: row.get("persona"),
                created_at: parse_timestamp(row.get("created_at"))?,
            })),
            None => Ok(None),
        }
    }

    async fn put_actor(&self, actor: Actor) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO actors (id, name, persona, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, persona = excluded.persona
            "#,
        )
        .bind(&actor.id)
        .bind(&actor.name)
        .bind(&actor.persona)
        .bind(actor.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Option<ChatState>, StoreError> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(&chat_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        row.map(|r| Self::row_to_chat(&r)).transpose()
    }

    async fn put_chat(&self, chat: ChatState) -> Result<u64, StoreError> {
        let history_json = serde_json::to_string(&chat.history)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let new_version = chat.version + 1;

        let result = if chat.version == 0 {
            // First write: insert, bailing out if someone got there first.
            sqlx::query(
                r#"
                INSERT INTO chats (id, actor_id, title, summary, history, version, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&chat.id.0)
            .bind(&chat.actor_id)
            .bind(&chat.title)
            .bind(&chat.summary)
            .bind(&history_json)
            .bind(new_version as i64)
            .bind(chat.created_at.to_rfc3339())
            .bind(chat.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await
        } else {
            // Compare-and-swap: the WHERE clause enforces the version check.
            sqlx::query(
                r#"
                UPDATE chats
                SET title = ?, summary = ?, history = ?, version = ?, updated_at = ?
                WHERE id = ? AND version = ?
                "#,
            )
            .bind(&chat.title)
            .bind(&chat.summary)
            .bind(&history_json)
            .bind(new_version as i64)
            .bind(chat.updated_at.to_rfc3339())
            .bind(&chat.id.0)
            .bind(chat.version as i64)
            .execute(&self.pool)
            .await
        }
        .map_err(|e| StoreError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            let found = self.stored_version(&chat.id.0).await?;
            return Err(StoreError::WriteConflict {
                key: format!("chats/{}", chat.id),
                expected: chat.version,
                found,
            });
        }

        Ok(new_version)
    }

    async fn list_chats(&self, actor_id: &str) -> Result<Vec<ChatState>, StoreError> {
        let rows = sqlx::query("SELECT * FROM chats WHERE actor_id = ? ORDER BY updated_at DESC")
            .bind(actor_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        rows.iter().map(Self::row_to_chat).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::message::{Asset, AssetKind};

    async fn test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::new(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn actor_roundtrip() {
        let (store, _dir) = test_store().await;
        let actor = Actor::new("Katie", "You are concise.");
        let id = actor.id.clone();

        store.put_actor(actor).await.unwrap();
        let loaded = store.get_actor(&id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Katie");
        assert_eq!(loaded.persona, "You are concise.");

        assert!(store.get_actor("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chat_roundtrip_preserves_message_order_and_fields() {
        let (store, _dir) = test_store().await;

        let mut chat = ChatState::new("a1", "First chat");
        chat.push(Message::user(chat.id.clone(), "Hello"));
        chat.push(
            Message::assistant(chat.id.clone(), "Hi!", "gpt-4o").with_assets(vec![Asset {
                kind: AssetKind::Image,
                url: "https://example.com/a.png".into(),
            }]),
        );
        let id = chat.id.clone();

        store.put_chat(chat).await.unwrap();
        let loaded = store.get_chat(&id).await.unwrap().unwrap();

        assert_eq!(loaded.history.len(), 2);
        assert_eq!(loaded.history[0].content, "Hello");
        assert_eq!(loaded.history[1].content, "Hi!");
        assert_eq!(loaded.history[1].model.as_deref(), Some("gpt-4o"));
        assert_eq!(loaded.history[1].assets[0].kind, AssetKind::Image);
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.summary, "");
    }

    #[tokio::test]
    async fn stale_version_write_conflicts() {
        let (store, _dir) = test_store().await;
        let chat = ChatState::new("a1", "t");
        let id = chat.id.clone();

        store.put_chat(chat).await.unwrap();

        let mut first = store.get_chat(&id).await.unwrap().unwrap();
        let mut second = store.get_chat(&id).await.unwrap().unwrap();

        first.push(Message::user(id.clone(), "winner"));
        store.put_chat(first).await.unwrap();

        second.push(Message::user(id.clone(), "loser"));
        let err = store.put_chat(second).await.unwrap_err();
        match err {
            StoreError::WriteConflict {
                expected, found, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("Expected WriteConflict, got: {other:?}"),
        }

        let stored = store.get_chat(&id).await.unwrap().unwrap();
        assert_eq!(stored.history.len(), 1);
        assert_eq!(stored.history[0].content, "winner");
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let (store, _dir) = test_store().await;
        let chat = ChatState::new("a1", "t");
        let duplicate = chat.clone();

        store.put_chat(chat).await.unwrap();
        let err = store.put_chat(duplicate).await.unwrap_err();
        assert!(matches!(err, StoreError::WriteConflict { .. }));
    }

    #[tokio::test]
    async fn list_chats_filters_and_orders() {
        let (store, _dir) = test_store().await;

        let mut older = ChatState::new("a1", "older");
        older.updated_at = Utc::now() - chrono::Duration::seconds(60);
        store.put_chat(older).await.unwrap();

        let newer = ChatState::new("a1", "newer");
        store.put_chat(newer).await.unwrap();

        let other = ChatState::new("a2", "other");
        store.put_chat(other).await.unwrap();

        let chats = store.list_chats("a1").await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].title, "newer");
        assert_eq!(chats[1].title, "older");
    }

    #[tokio::test]
    async fn summary_overwrite_survives_roundtrip() {
        let (store, _dir) = test_store().await;
        let chat = ChatState::new("a1", "t");
        let id = chat.id.clone();
        store.put_chat(chat).await.unwrap();

        let mut chat = store.get_chat(&id).await.unwrap().unwrap();
        chat.summary = "The user is planning a trip.".into();
        store.put_chat(chat).await.unwrap();

        let loaded = store.get_chat(&id).await.unwrap().unwrap();
        assert_eq!(loaded.summary, "The user is planning a trip.");
        assert_eq!(loaded.version, 2);
    }
}

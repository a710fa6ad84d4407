//! SQLite-backed chat store.

use std::path::Path;
use std::str::FromStr;

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use crate::core::category::Category;
use crate::core::clock::{MonotonicClock, from_micros};
use crate::core::errors::{ChatError, ChatResult};
use crate::core::ids::{ConversationId, MessageId, ProfileId};
use crate::core::models::{
    Conversation, ConversationPatch, Message, NewConversation, NewMessage, Profile, Role,
};

use super::chat_store::{ChatStore, SortOrder, StoreFuture};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        full_name TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES profiles (id) ON DELETE CASCADE,
        title TEXT NOT NULL DEFAULT 'New Conversation',
        category TEXT NOT NULL DEFAULT 'general',
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        CHECK (updated_at >= created_at)
    );
    CREATE INDEX IF NOT EXISTS idx_conversations_user_updated
        ON conversations (user_id, updated_at DESC);
    CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        conversation_id TEXT NOT NULL REFERENCES conversations (id) ON DELETE CASCADE,
        role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
        content TEXT NOT NULL CHECK (length(content) > 0),
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
        ON messages (conversation_id, created_at);
";

const CONVERSATION_COLUMNS: &str = "id, user_id, title, category, created_at, updated_at";

type ProfileRow = (String, String, String, i64, i64);
type ConversationRow = (String, String, String, String, i64, i64);
type MessageRow = (String, String, String, String, i64);

/// `SQLite` implementation of [`ChatStore`].
///
/// Timestamps are stored as microseconds since the Unix epoch and issued by a
/// [`MonotonicClock`], so rows written through one store never tie.
pub struct SqliteChatStore {
    conn: Connection,
    clock: MonotonicClock,
}

impl SqliteChatStore {
    /// Open (or create) a database file and initialize the schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> ChatResult<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::init(conn).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn open_in_memory() -> ChatResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> ChatResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            clock: MonotonicClock::new(),
        })
    }

    /// Create or refresh a profile.
    ///
    /// Profiles belong to the auth system; this exists so a local sign-in
    /// stand-in can seed the owner row.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn upsert_profile(
        &self,
        id: ProfileId,
        email: &str,
        full_name: &str,
    ) -> ChatResult<Profile> {
        let now = self.clock.now().timestamp_micros();
        let id_str = id.to_string();
        let email = email.to_string();
        let full_name = full_name.to_string();

        let row = self
            .conn
            .call(move |conn| {
                let row = conn.query_row(
                    "INSERT INTO profiles (id, email, full_name, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     ON CONFLICT (id) DO UPDATE SET
                        email = excluded.email,
                        full_name = excluded.full_name,
                        updated_at = excluded.updated_at
                     RETURNING id, email, full_name, created_at, updated_at",
                    rusqlite::params![id_str, email, full_name, now],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )?;
                Ok(row)
            })
            .await?;

        decode_profile(row)
    }

    /// Oldest profile registered with `email`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    pub async fn find_profile_by_email(&self, email: &str) -> ChatResult<Option<Profile>> {
        let email = email.to_string();
        let row: Option<ProfileRow> = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, email, full_name, created_at, updated_at
                         FROM profiles WHERE email = ?1
                         ORDER BY created_at ASC LIMIT 1",
                        [&email],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.map(decode_profile).transpose()
    }
}

impl ChatStore for SqliteChatStore {
    fn get_profile(&self, id: ProfileId) -> StoreFuture<'_, ChatResult<Option<Profile>>> {
        Box::pin(async move {
            let id_str = id.to_string();
            let row: Option<ProfileRow> = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT id, email, full_name, created_at, updated_at
                             FROM profiles WHERE id = ?1",
                            [&id_str],
                            |row| {
                                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;
            row.map(decode_profile).transpose()
        })
    }

    fn list_conversations(
        &self,
        owner: ProfileId,
        order: SortOrder,
    ) -> StoreFuture<'_, ChatResult<Vec<Conversation>>> {
        Box::pin(async move {
            let owner_str = owner.to_string();
            let direction = order.as_sql();
            let rows: Vec<ConversationRow> = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {CONVERSATION_COLUMNS}
                         FROM conversations
                         WHERE user_id = ?1
                         ORDER BY updated_at {direction}, created_at {direction}"
                    ))?;
                    let rows = stmt
                        .query_map([&owner_str], conversation_row)?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            debug!("Listed {} conversations for {}", rows.len(), owner);
            rows.into_iter().map(decode_conversation).collect()
        })
    }

    fn get_conversation(
        &self,
        id: ConversationId,
    ) -> StoreFuture<'_, ChatResult<Option<Conversation>>> {
        Box::pin(async move {
            let id_str = id.to_string();
            let row: Option<ConversationRow> = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!(
                                "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
                            ),
                            [&id_str],
                            conversation_row,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;
            row.map(decode_conversation).transpose()
        })
    }

    fn insert_conversation(
        &self,
        conversation: NewConversation,
    ) -> StoreFuture<'_, ChatResult<Conversation>> {
        Box::pin(async move {
            let now = self.clock.now();
            let stored = Conversation {
                id: ConversationId::new(),
                owner_id: conversation.owner_id,
                title: conversation.title,
                category: conversation.category,
                created_at: now,
                updated_at: now,
            };

            let params = (
                stored.id.to_string(),
                stored.owner_id.to_string(),
                stored.title.clone(),
                stored.category.as_str(),
                now.timestamp_micros(),
            );
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO conversations (id, user_id, title, category, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                        rusqlite::params![params.0, params.1, params.2, params.3, params.4],
                    )?;
                    Ok(())
                })
                .await?;

            debug!("Conversation created: {}", stored.id);
            Ok(stored)
        })
    }

    fn update_conversation(
        &self,
        id: ConversationId,
        patch: ConversationPatch,
    ) -> StoreFuture<'_, ChatResult<Conversation>> {
        Box::pin(async move {
            let now = self.clock.now().timestamp_micros();
            let id_str = id.to_string();
            let title = patch.title;
            let category = patch.category.map(Category::as_str);
            let row: Option<ConversationRow> = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!(
                                "UPDATE conversations
                                 SET title = COALESCE(?1, title),
                                     category = COALESCE(?2, category),
                                     updated_at = MAX(?3, created_at)
                                 WHERE id = ?4
                                 RETURNING {CONVERSATION_COLUMNS}"
                            ),
                            rusqlite::params![title, category, now, id_str],
                            conversation_row,
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            let row = row
                .ok_or_else(|| ChatError::Persistence(format!("conversation {id} not found")))?;
            debug!("Conversation updated: {}", id);
            decode_conversation(row)
        })
    }

    fn delete_conversation(&self, id: ConversationId) -> StoreFuture<'_, ChatResult<()>> {
        Box::pin(async move {
            let id_str = id.to_string();
            let removed = self
                .conn
                .call(move |conn| {
                    let removed =
                        conn.execute("DELETE FROM conversations WHERE id = ?1", [&id_str])?;
                    Ok(removed)
                })
                .await?;
            debug!("Conversation deleted: {} ({} row)", id, removed);
            Ok(())
        })
    }

    fn list_messages(
        &self,
        conversation: ConversationId,
        order: SortOrder,
    ) -> StoreFuture<'_, ChatResult<Vec<Message>>> {
        Box::pin(async move {
            let conversation_str = conversation.to_string();
            let direction = order.as_sql();
            let rows: Vec<MessageRow> = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, conversation_id, role, content, created_at
                         FROM messages
                         WHERE conversation_id = ?1
                         ORDER BY created_at {direction}, seq {direction}"
                    ))?;
                    let rows = stmt
                        .query_map([&conversation_str], |row| {
                            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;
            rows.into_iter().map(decode_message).collect()
        })
    }

    fn insert_message(&self, message: NewMessage) -> StoreFuture<'_, ChatResult<Message>> {
        Box::pin(async move {
            let stored = Message {
                id: MessageId::new(),
                conversation_id: message.conversation_id,
                role: message.role,
                content: message.content,
                created_at: self.clock.now(),
            };

            let params = (
                stored.id.to_string(),
                stored.conversation_id.to_string(),
                stored.role.as_str(),
                stored.content.clone(),
                stored.created_at.timestamp_micros(),
            );
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO messages (id, conversation_id, role, content, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![params.0, params.1, params.2, params.3, params.4],
                    )?;
                    Ok(())
                })
                .await?;

            debug!("Message {} stored in {}", stored.id, stored.conversation_id);
            Ok(stored)
        })
    }
}

fn conversation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn parse_id<T>(raw: &str, what: &str) -> ChatResult<T>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse()
        .map_err(|err| ChatError::InvalidRecord(format!("invalid {what} {raw}: {err}")))
}

fn timestamp(micros: i64) -> ChatResult<chrono::DateTime<chrono::Utc>> {
    from_micros(micros).ok_or_else(|| ChatError::InvalidRecord("invalid timestamp".to_string()))
}

fn decode_profile(row: ProfileRow) -> ChatResult<Profile> {
    let (id, email, full_name, created_at, updated_at) = row;
    Ok(Profile {
        id: parse_id(&id, "profile id")?,
        email,
        full_name,
        created_at: timestamp(created_at)?,
        updated_at: timestamp(updated_at)?,
    })
}

fn decode_conversation(row: ConversationRow) -> ChatResult<Conversation> {
    let (id, user_id, title, category, created_at, updated_at) = row;
    let category = Category::from_str(&category).unwrap_or_else(|err| {
        warn!("Conversation {id}: {err}, falling back to general");
        Category::General
    });
    Ok(Conversation {
        id: parse_id(&id, "conversation id")?,
        owner_id: parse_id(&user_id, "user id")?,
        title,
        category,
        created_at: timestamp(created_at)?,
        updated_at: timestamp(updated_at)?,
    })
}

fn decode_message(row: MessageRow) -> ChatResult<Message> {
    let (id, conversation_id, role, content, created_at) = row;
    let role = Role::from_str(&role)
        .map_err(|err| ChatError::InvalidRecord(format!("invalid role: {err}")))?;
    Ok(Message {
        id: parse_id(&id, "message id")?,
        conversation_id: parse_id(&conversation_id, "conversation id")?,
        role,
        content,
        created_at: timestamp(created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_owner() -> (SqliteChatStore, ProfileId) {
        let store = SqliteChatStore::open_in_memory().await.unwrap();
        let owner = ProfileId::new();
        store
            .upsert_profile(owner, "ada@example.com", "Ada")
            .await
            .unwrap();
        (store, owner)
    }

    #[tokio::test]
    async fn test_profile_upsert_and_get() {
        let (store, owner) = store_with_owner().await;
        let profile = store.get_profile(owner).await.unwrap().unwrap();
        assert_eq!(profile.email, "ada@example.com");
        assert!(profile.updated_at >= profile.created_at);

        let renamed = store
            .upsert_profile(owner, "ada@example.com", "Ada L.")
            .await
            .unwrap();
        assert_eq!(renamed.full_name, "Ada L.");
        assert_eq!(renamed.created_at, profile.created_at);
        assert!(store.get_profile(ProfileId::new()).await.unwrap().is_none());

        let found = store.find_profile_by_email("ada@example.com").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(owner));
        assert!(store.find_profile_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conversations_ordered_by_update() {
        let (store, owner) = store_with_owner().await;
        let first = store
            .insert_conversation(NewConversation::new(owner, Category::General))
            .await
            .unwrap();
        let second = store
            .insert_conversation(NewConversation::new(owner, Category::ExamPrep))
            .await
            .unwrap();

        let listed = store
            .list_conversations(owner, SortOrder::Descending)
            .await
            .unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);

        let touched = store
            .update_conversation(first.id, ConversationPatch::touch())
            .await
            .unwrap();
        assert!(touched.updated_at > first.updated_at);
        assert_eq!(touched.title, first.title);

        let listed = store
            .list_conversations(owner, SortOrder::Descending)
            .await
            .unwrap();
        assert_eq!(listed[0].id, first.id);
    }

    #[tokio::test]
    async fn test_conversations_are_owner_scoped() {
        let (store, owner) = store_with_owner().await;
        let other = ProfileId::new();
        store.upsert_profile(other, "bob@example.com", "").await.unwrap();
        store
            .insert_conversation(NewConversation::new(other, Category::General))
            .await
            .unwrap();

        let listed = store
            .list_conversations(owner, SortOrder::Descending)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_update_title_and_missing_conversation() {
        let (store, owner) = store_with_owner().await;
        let conversation = store
            .insert_conversation(NewConversation::new(owner, Category::CodingHelp))
            .await
            .unwrap();
        let renamed = store
            .update_conversation(conversation.id, ConversationPatch::title("Loops"))
            .await
            .unwrap();
        assert_eq!(renamed.title, "Loops");
        assert_eq!(renamed.category, Category::CodingHelp);

        let missing = store
            .update_conversation(ConversationId::new(), ConversationPatch::touch())
            .await;
        assert!(matches!(missing, Err(ChatError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_messages_ordered_and_cascade_deleted() {
        let (store, owner) = store_with_owner().await;
        let conversation = store
            .insert_conversation(NewConversation::new(owner, Category::General))
            .await
            .unwrap();
        for content in ["one", "two", "three"] {
            store
                .insert_message(NewMessage::user(conversation.id, content))
                .await
                .unwrap();
        }

        let messages = store
            .list_messages(conversation.id, SortOrder::Ascending)
            .await
            .unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert!(messages.windows(2).all(|w| w[0].created_at < w[1].created_at));

        store.delete_conversation(conversation.id).await.unwrap();
        assert!(store.get_conversation(conversation.id).await.unwrap().is_none());
        let messages = store
            .list_messages(conversation.id, SortOrder::Ascending)
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_message_requires_existing_conversation() {
        let (store, _owner) = store_with_owner().await;
        let orphan = store
            .insert_message(NewMessage::user(ConversationId::new(), "hello"))
            .await;
        assert!(orphan.unwrap_err().is_persistence());
    }

    #[tokio::test]
    async fn test_unknown_category_reads_as_general() {
        let (store, owner) = store_with_owner().await;
        let conversation = store
            .insert_conversation(NewConversation::new(owner, Category::ExamPrep))
            .await
            .unwrap();
        let id_str = conversation.id.to_string();
        store
            .conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE conversations SET category = 'cooking' WHERE id = ?1",
                    [&id_str],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let loaded = store.get_conversation(conversation.id).await.unwrap().unwrap();
        assert_eq!(loaded.category, Category::General);
    }
}

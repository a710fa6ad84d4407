//! Chat store backed by a managed PostgREST-style row service.
//!
//! Tables are reached under `{backend}/rest/v1/{table}`. Filters use the
//! `column=eq.value` syntax and ordering `order=column.asc|desc`; writes ask
//! for the stored row back with `Prefer: return=representation`.

use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::core::category::Category;
use crate::core::clock::MonotonicClock;
use crate::core::config::BackendConfig;
use crate::core::errors::{ChatError, ChatResult};
use crate::core::ids::{ConversationId, ProfileId};
use crate::core::models::{
    Conversation, ConversationPatch, Message, NewConversation, NewMessage, Profile,
};

use super::chat_store::{ChatStore, SortOrder, StoreFuture};

const PROFILES: &str = "profiles";
const CONVERSATIONS: &str = "conversations";
const MESSAGES: &str = "messages";

/// Conversation row as returned by the backend; the category is kept raw so
/// unknown values degrade to `general` instead of failing the whole list.
#[derive(Debug, Deserialize)]
struct ConversationRecord {
    id: ConversationId,
    user_id: ProfileId,
    title: String,
    category: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        let category = record.category.parse().unwrap_or_else(|err| {
            warn!("Conversation {}: {err}, falling back to general", record.id);
            Category::General
        });
        Self {
            id: record.id,
            owner_id: record.user_id,
            title: record.title,
            category,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// HTTP implementation of [`ChatStore`].
pub struct RestChatStore {
    client: Client,
    base_url: Url,
    anon_key: String,
    access_token: Option<String>,
    clock: MonotonicClock,
}

impl RestChatStore {
    /// Build a store from explicit backend settings.
    ///
    /// # Errors
    /// Returns an error if the backend URL is missing or invalid.
    pub fn new(config: &BackendConfig) -> ChatResult<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: config.base_url()?,
            anon_key: config.anon_key.clone(),
            access_token: None,
            clock: MonotonicClock::new(),
        })
    }

    /// Act on behalf of a signed-in user instead of the anon role.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Endpoint of a table.
    ///
    /// # Errors
    /// Returns an error if the resulting URL is invalid.
    pub fn table_url(&self, table: &str) -> ChatResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/rest/v1/{table}"))?)
    }

    fn headers(&self) -> ChatResult<HeaderMap> {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {bearer}"))?);
        Ok(headers)
    }

    fn request(&self, method: Method, table: &str) -> ChatResult<RequestBuilder> {
        Ok(self
            .client
            .request(method, self.table_url(table)?)
            .headers(self.headers()?))
    }

    fn returning(&self, method: Method, table: &str) -> ChatResult<RequestBuilder> {
        Ok(self
            .request(method, table)?
            .header("Prefer", "return=representation"))
    }

    async fn fetch_rows<T: DeserializeOwned>(builder: RequestBuilder) -> ChatResult<Vec<T>> {
        let response = builder.send().await.map_err(transport)?;
        let response = check_status(response).await?;
        response.json::<Vec<T>>().await.map_err(transport)
    }

    async fn fetch_one<T: DeserializeOwned>(builder: RequestBuilder, what: &str) -> ChatResult<T> {
        Self::fetch_rows(builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::Persistence(format!("{what} not returned by backend")))
    }
}

impl ChatStore for RestChatStore {
    fn get_profile(&self, id: ProfileId) -> StoreFuture<'_, ChatResult<Option<Profile>>> {
        Box::pin(async move {
            let builder = self
                .request(Method::GET, PROFILES)?
                .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())]);
            let rows: Vec<Profile> = Self::fetch_rows(builder).await?;
            Ok(rows.into_iter().next())
        })
    }

    fn list_conversations(
        &self,
        owner: ProfileId,
        order: SortOrder,
    ) -> StoreFuture<'_, ChatResult<Vec<Conversation>>> {
        Box::pin(async move {
            let builder = self.request(Method::GET, CONVERSATIONS)?.query(&[
                ("user_id", format!("eq.{owner}")),
                ("order", format!("updated_at.{}", order.as_rest())),
                ("select", "*".to_string()),
            ]);
            let rows: Vec<ConversationRecord> = Self::fetch_rows(builder).await?;
            debug!("Listed {} conversations for {}", rows.len(), owner);
            Ok(rows.into_iter().map(Conversation::from).collect())
        })
    }

    fn get_conversation(
        &self,
        id: ConversationId,
    ) -> StoreFuture<'_, ChatResult<Option<Conversation>>> {
        Box::pin(async move {
            let builder = self
                .request(Method::GET, CONVERSATIONS)?
                .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())]);
            let rows: Vec<ConversationRecord> = Self::fetch_rows(builder).await?;
            Ok(rows.into_iter().next().map(Conversation::from))
        })
    }

    fn insert_conversation(
        &self,
        conversation: NewConversation,
    ) -> StoreFuture<'_, ChatResult<Conversation>> {
        Box::pin(async move {
            let builder = self
                .returning(Method::POST, CONVERSATIONS)?
                .json(&conversation);
            let record: ConversationRecord = Self::fetch_one(builder, "conversation").await?;
            debug!("Conversation created: {}", record.id);
            Ok(record.into())
        })
    }

    fn update_conversation(
        &self,
        id: ConversationId,
        patch: ConversationPatch,
    ) -> StoreFuture<'_, ChatResult<Conversation>> {
        Box::pin(async move {
            let current = self
                .get_conversation(id)
                .await?
                .ok_or_else(|| ChatError::Persistence(format!("conversation {id} not found")))?;
            // The backend stamps created_at with its own clock.
            let updated_at = self.clock.now().max(current.created_at);

            let mut body = serde_json::Map::new();
            if let Some(title) = patch.title {
                body.insert("title".to_string(), title.into());
            }
            if let Some(category) = patch.category {
                body.insert("category".to_string(), category.as_str().into());
            }
            body.insert("updated_at".to_string(), serde_json::to_value(updated_at)?);

            let builder = self
                .returning(Method::PATCH, CONVERSATIONS)?
                .query(&[("id", format!("eq.{id}"))])
                .json(&body);
            let record: ConversationRecord =
                Self::fetch_one(builder, &format!("conversation {id}")).await?;
            debug!("Conversation updated: {}", id);
            Ok(record.into())
        })
    }

    fn delete_conversation(&self, id: ConversationId) -> StoreFuture<'_, ChatResult<()>> {
        Box::pin(async move {
            let builder = self
                .request(Method::DELETE, CONVERSATIONS)?
                .query(&[("id", format!("eq.{id}"))]);
            let response = builder.send().await.map_err(transport)?;
            check_status(response).await?;
            debug!("Conversation deleted: {}", id);
            Ok(())
        })
    }

    fn list_messages(
        &self,
        conversation: ConversationId,
        order: SortOrder,
    ) -> StoreFuture<'_, ChatResult<Vec<Message>>> {
        Box::pin(async move {
            let builder = self.request(Method::GET, MESSAGES)?.query(&[
                ("conversation_id", format!("eq.{conversation}")),
                ("order", format!("created_at.{}", order.as_rest())),
                ("select", "*".to_string()),
            ]);
            Self::fetch_rows(builder).await
        })
    }

    fn insert_message(&self, message: NewMessage) -> StoreFuture<'_, ChatResult<Message>> {
        Box::pin(async move {
            let builder = self.returning(Method::POST, MESSAGES)?.json(&message);
            let stored: Message = Self::fetch_one(builder, "message").await?;
            debug!("Message {} stored in {}", stored.id, stored.conversation_id);
            Ok(stored)
        })
    }
}

fn header_value(raw: &str) -> ChatResult<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|err| ChatError::InvalidConfig(format!("invalid header value: {err}")))
}

fn transport(err: reqwest::Error) -> ChatError {
    ChatError::Persistence(err.to_string())
}

async fn check_status(response: Response) -> ChatResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read response body".to_string());
    Err(ChatError::Persistence(format!(
        "backend returned {status}: {body}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(url: &str) -> RestChatStore {
        RestChatStore::new(&BackendConfig {
            url: Some(url.to_string()),
            anon_key: "anon".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_table_url_tolerates_trailing_slash() {
        assert_eq!(
            store("https://demo.example.co/").table_url(MESSAGES).unwrap().as_str(),
            "https://demo.example.co/rest/v1/messages"
        );
        assert_eq!(
            store("https://demo.example.co").table_url(CONVERSATIONS).unwrap().as_str(),
            "https://demo.example.co/rest/v1/conversations"
        );
    }

    #[test]
    fn test_headers_prefer_access_token() {
        let anon = store("https://demo.example.co").headers().unwrap();
        assert_eq!(anon["apikey"], "anon");
        assert_eq!(anon[AUTHORIZATION], "Bearer anon");

        let signed_in = store("https://demo.example.co")
            .with_access_token("jwt")
            .headers()
            .unwrap();
        assert_eq!(signed_in["apikey"], "anon");
        assert_eq!(signed_in[AUTHORIZATION], "Bearer jwt");
    }

    #[test]
    fn test_missing_backend_url_is_rejected() {
        let err = RestChatStore::new(&BackendConfig::default()).err().unwrap();
        assert!(matches!(err, ChatError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_category_record_degrades() {
        let json = serde_json::json!({
            "id": ConversationId::new(),
            "user_id": ProfileId::new(),
            "title": "New Conversation",
            "category": "cooking",
            "created_at": "2024-05-01T10:00:00+00:00",
            "updated_at": "2024-05-01T10:00:00+00:00"
        });
        let record: ConversationRecord = serde_json::from_value(json).unwrap();
        let conversation = Conversation::from(record);
        assert_eq!(conversation.category, Category::General);
    }
}

//! Gmail REST v1 client.
//!
//! Thin wrapper over the `users.messages`, `users.history` and `users.watch`
//! endpoints, bound to one account's access token. The `Mailbox` trait is
//! the seam the sync engine is written against, so tests can substitute an
//! in-memory mailbox.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{GmailError, Result};

/// Gmail API base for the authenticated user's resources.
pub const GMAIL_USERS_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users";

/// Default connect timeout for Gmail API requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for Gmail API requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A message header as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Body of a message part; `data` is URL-safe base64.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// One node of the (possibly nested) MIME part tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Option<Vec<Header>>,
    #[serde(default)]
    pub body: Option<MessagePartBody>,
    #[serde(default)]
    pub parts: Option<Vec<MessagePart>>,
}

/// A full message as returned by `messages.get` with `format=full`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

impl Message {
    /// Returns a top-level header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .as_ref()?
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// A message reference from list/history responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Option<Vec<MessageRef>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    #[serde(default)]
    history: Option<Vec<HistoryRecord>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRecord {
    #[serde(default)]
    messages_added: Option<Vec<MessageAdded>>,
}

#[derive(Debug, Deserialize)]
struct MessageAdded {
    message: MessageRef,
}

/// Response from a watch registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub history_id: String,
    #[serde(default)]
    pub expiration: Option<String>,
}

/// Capability the sync engine consumes from the mailbox provider.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Fetches a full message by provider ID.
    async fn get_message(&self, message_id: &str) -> Result<Message>;

    /// Lists the IDs of the most recent messages matching a search query.
    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>>;

    /// Lists the IDs of messages added since the given history cursor, in
    /// provider-delivery order, draining all result pages.
    async fn list_added_message_ids(&self, start_cursor: &str) -> Result<Vec<String>>;

    /// Registers a change-notification subscription for the inbox.
    async fn watch(&self, topic: &str) -> Result<WatchResponse>;
}

/// Gmail REST client bound to one account's access token.
pub struct GmailClient {
    http: Client,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    /// Creates a client for the given access token.
    pub fn new(access_token: String) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GmailError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            access_token,
            base_url: GMAIL_USERS_ENDPOINT.to_string(),
        })
    }

    /// Overrides the API base URL. Intended for tests against a local stub.
    #[doc(hidden)]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn get_json<T, Q>(&self, url: &str, query: &Q) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| GmailError::Network(e.to_string()))?;

        Self::decode_response(response).await
    }

    async fn decode_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(GmailError::RateLimited(retry_after));
        }

        if status.as_u16() == 401 {
            return Err(GmailError::Authentication(
                "Invalid or expired access token".to_string(),
            ));
        }

        if status.as_u16() == 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(GmailError::NotFound(body));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GmailError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GmailError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Mailbox for GmailClient {
    async fn get_message(&self, message_id: &str) -> Result<Message> {
        let url = format!("{}/me/messages/{}", self.base_url, message_id);
        self.get_json(&url, &[("format", "full")]).await
    }

    async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        let url = format!("{}/me/messages", self.base_url);
        let max_results = max_results.to_string();
        let response: MessageListResponse = self
            .get_json(&url, &[("q", query), ("maxResults", &max_results)])
            .await?;
        Ok(response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect())
    }

    async fn list_added_message_ids(&self, start_cursor: &str) -> Result<Vec<String>> {
        let url = format!("{}/me/history", self.base_url);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("startHistoryId", start_cursor.to_string()),
                ("historyTypes", "messageAdded".to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let response: HistoryResponse = self.get_json(&url, &params).await?;

            for record in response.history.unwrap_or_default() {
                for added in record.messages_added.unwrap_or_default() {
                    ids.push(added.message.id);
                }
            }

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn watch(&self, topic: &str) -> Result<WatchResponse> {
        let url = format!("{}/me/watch", self.base_url);
        debug!("POST {}", url);

        let body = serde_json::json!({
            "topicName": topic,
            "labelIds": ["INBOX"],
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| GmailError::Network(e.to_string()))?;

        Self::decode_response(response).await
    }
}

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::ChatClientBuilder;
use crate::error::GENERIC_FAILURE;
use crate::graph::resolve_graph_url;
use crate::types::SendMessageRequest;
use crate::{
    ChatResponse, ClientError, Conversation, ConversationSummary, GraphResponse, Message,
    Session, User,
};

/// Authenticated backend operations, so composing code can run against a fake.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn current_user(&self) -> Result<User, ClientError>;

    async fn send_message(
        &self,
        content: &str,
        conversation_id: Option<i64>,
    ) -> Result<ChatResponse, ClientError>;

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError>;

    async fn get_conversation(&self, id: i64) -> Result<Conversation, ClientError>;

    async fn delete_conversation(&self, id: i64) -> Result<(), ClientError>;

    async fn generate_graph(&self, conversation_id: i64) -> Result<GraphResponse, ClientError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// HTTP client for the tutoring backend.
///
/// Every authenticated call reads the token from the shared [`Session`]. A 401
/// clears that session before the error is returned, and nothing is retried.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    base_url: Url,
    session: Session,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url.as_str())
            .field("session", &self.session)
            .finish()
    }
}

impl ChatClient {
    pub fn builder() -> ChatClientBuilder {
        ChatClientBuilder::new()
    }

    pub(crate) fn new(http: Client, base_url: Url, session: Session) -> Self {
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Where to send the browser to start Google sign-in. No request is made.
    pub fn google_auth_url(&self) -> String {
        self.endpoint("/auth/google")
    }

    pub fn graph_url(&self, message: &Message) -> Option<String> {
        if !message.has_graph {
            return None;
        }
        message
            .graph_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(|path| resolve_graph_url(&self.base_url, path))
    }

    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let token = self.session.token();
        let body = self
            .send_request::<()>(Method::GET, "/health", None, token)
            .await?;
        decode(&body)
    }

    pub async fn current_user(&self) -> Result<User, ClientError> {
        self.authed::<(), _>(Method::GET, "/auth/me", None).await
    }

    pub async fn send_message(
        &self,
        content: &str,
        conversation_id: Option<i64>,
    ) -> Result<ChatResponse, ClientError> {
        let request = SendMessageRequest {
            content,
            conversation_id,
        };
        self.authed(Method::POST, "/chat", Some(&request)).await
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        self.authed::<(), _>(Method::GET, "/chat/history", None)
            .await
    }

    pub async fn get_conversation(&self, id: i64) -> Result<Conversation, ClientError> {
        self.authed::<(), _>(Method::GET, &format!("/chat/{id}"), None)
            .await
    }

    pub async fn delete_conversation(&self, id: i64) -> Result<(), ClientError> {
        let token = self.session.token().ok_or(ClientError::Unauthorized)?;
        self.send_request::<()>(Method::DELETE, &format!("/chat/{id}"), None, Some(token))
            .await?;
        Ok(())
    }

    pub async fn generate_graph(&self, conversation_id: i64) -> Result<GraphResponse, ClientError> {
        self.authed::<(), _>(
            Method::POST,
            &format!("/chat/{conversation_id}/graph"),
            None,
        )
        .await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn authed<Req, Resp>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Req>,
    ) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        // No token means no session; skip the round trip.
        let token = self.session.token().ok_or(ClientError::Unauthorized)?;
        let body = self
            .send_request(method, path, payload, Some(token))
            .await?;
        decode(&body)
    }

    async fn send_request<Req>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Req>,
        token: Option<SecretString>,
    ) -> Result<Vec<u8>, ClientError>
    where
        Req: Serialize + ?Sized,
    {
        tracing::debug!(method = %method, path, "sending request");

        let mut request = self
            .http
            .request(method.clone(), self.endpoint(path))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");
        if let Some(token) = &token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(method = %method, path, "backend rejected session; clearing token");
            if let Err(err) = self.session.clear() {
                tracing::warn!(error = %err, "failed to remove stored token");
            }
            return Err(ClientError::Unauthorized);
        }

        let body = response.bytes().await?;

        if !status.is_success() {
            let message = error_message(&body);
            tracing::warn!(
                method = %method,
                path,
                status = status.as_u16(),
                message = %message,
                "request failed"
            );
            return Err(ClientError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body.to_vec())
    }
}

#[async_trait]
impl ChatApi for ChatClient {
    async fn current_user(&self) -> Result<User, ClientError> {
        ChatClient::current_user(self).await
    }

    async fn send_message(
        &self,
        content: &str,
        conversation_id: Option<i64>,
    ) -> Result<ChatResponse, ClientError> {
        ChatClient::send_message(self, content, conversation_id).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        ChatClient::list_conversations(self).await
    }

    async fn get_conversation(&self, id: i64) -> Result<Conversation, ClientError> {
        ChatClient::get_conversation(self, id).await
    }

    async fn delete_conversation(&self, id: i64) -> Result<(), ClientError> {
        ChatClient::delete_conversation(self, id).await
    }

    async fn generate_graph(&self, conversation_id: i64) -> Result<GraphResponse, ClientError> {
        ChatClient::generate_graph(self, conversation_id).await
    }
}

fn decode<Resp: DeserializeOwned>(body: &[u8]) -> Result<Resp, ClientError> {
    serde_json::from_slice(body).map_err(|err| ClientError::Malformed(err.to_string()))
}

/// Pulls a readable message out of an error body. FastAPI puts it in
/// `detail`, either as a string or as a list of validation entries.
fn error_message(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return GENERIC_FAILURE.to_string();
    };

    match value.get("detail") {
        Some(Value::String(detail)) if !detail.trim().is_empty() => return detail.clone(),
        Some(Value::Array(entries)) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return messages.join("; ");
            }
        }
        _ => {}
    }

    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.trim().is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

use std::time::Duration;

use url::Url;

use crate::client::ChatClient;
use crate::{ClientError, Session};

pub const DEFAULT_BASE_URL: &str = "http://localhost:7860";

#[derive(Debug, Default, Clone)]
pub struct ChatClientBuilder {
    base_url: Option<String>,
    session: Option<Session>,
    timeout: Option<Duration>,
}

impl ChatClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, value: impl Into<String>) -> Self {
        self.base_url = Some(value.into());
        self
    }

    /// Leaves the base URL untouched when the variable is unset.
    pub fn base_url_from_env(mut self, var_name: &str) -> Self {
        if let Ok(value) = std::env::var(var_name) {
            if !value.trim().is_empty() {
                self.base_url = Some(value);
            }
        }
        self
    }

    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn timeout(mut self, value: Duration) -> Self {
        self.timeout = Some(value);
        self
    }

    pub fn build(self) -> Result<ChatClient, ClientError> {
        let raw = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ClientError::Config("base_url cannot be empty".to_string()));
        }

        let base_url = Url::parse(raw)
            .map_err(|err| ClientError::Config(format!("invalid base_url: {err}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "base_url must use http or https, got '{}'",
                base_url.scheme()
            )));
        }

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build http client: {err}")))?;

        Ok(ChatClient::new(
            http,
            base_url,
            self.session.unwrap_or_default(),
        ))
    }
}

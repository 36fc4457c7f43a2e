use thiserror::Error;

/// Generic message used when the backend gives no readable error body.
pub const GENERIC_FAILURE: &str = "Request failed";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The session ended. The token has already been cleared.
    #[error("unauthorized")]
    Unauthorized,
    #[error("request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("token storage failure: {0}")]
    TokenStore(String),
    #[error("authentication callback failed: {0}")]
    AuthCallback(String),
    #[error("i/o failure: {0}")]
    Io(String),
}

impl ClientError {
    /// True for failures the user can retry by hand: server rejections and
    /// unreachable backends alike.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            ClientError::RequestFailed { .. } | ClientError::Transport(_)
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::RequestFailed { status: 404, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::RequestFailed { status, .. } => Some(*status),
            ClientError::Unauthorized => Some(401),
            _ => None,
        }
    }

    /// Message suitable for showing to the user as-is.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::RequestFailed { message, .. } => message.clone(),
            ClientError::Transport(_) => GENERIC_FAILURE.to_string(),
            ClientError::Unauthorized => "Unauthorized".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Malformed(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

//! Session and chat client for the Math Agent tutoring backend.
//!
//! This crate provides:
//! - a [`Session`] that owns the bearer token (in memory, mirrored to a
//!   [`TokenStore`]),
//! - a typed [`ChatClient`] for the `/auth` and `/chat` endpoints,
//! - a [`ConversationView`] that shows sent messages optimistically and rolls
//!   them back when a send fails.
//!
//! ```rust,no_run
//! use mathagent_client::{ChatClient, FileTokenStore, Session};
//!
//! # async fn run() -> Result<(), mathagent_client::ClientError> {
//! let session = Session::new(FileTokenStore::default_location()?);
//! let client = ChatClient::builder()
//!     .base_url_from_env("MATHAGENT_API_URL")
//!     .session(session)
//!     .build()?;
//!
//! let reply = client.send_message("2+2", None).await?;
//! println!("{} (conversation {})", reply.message.content, reply.conversation_id);
//! # Ok(())
//! # }
//! ```
//!
//! Environment variables commonly used:
//! - `MATHAGENT_API_URL`
//! - `MATHAGENT_TOKEN_FILE`

pub mod callback;
pub mod client;
mod config;
pub mod conversation;
mod error;
pub mod graph;
mod session;
pub mod token;
mod types;

pub use callback::AuthCallback;
pub use client::{ChatApi, ChatClient, HealthStatus};
pub use config::{ChatClientBuilder, DEFAULT_BASE_URL};
pub use conversation::{
    ConversationError, ConversationIndex, ConversationView, DeletePolicy, MessageEntry,
    PendingMessage, PendingToken,
};
pub use error::ClientError;
pub use graph::{resolve_graph_url, GraphImage};
pub use session::Session;
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use types::{
    ChatResponse, Conversation, ConversationSummary, GraphResponse, Message, Role, User,
};

//! Client-side conversation state.
//!
//! A message the user sends is shown immediately as [`MessageEntry::Pending`]
//! and becomes [`MessageEntry::Confirmed`] once the backend answers. If the
//! send fails the pending entry is removed, so nothing stays pending forever.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::client::ChatApi;
use crate::{ChatResponse, ClientError, Conversation, ConversationSummary, Message, Role};

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a message is already being sent")]
    SendInProgress,
    /// The pending entry is gone, e.g. the view was reset while sending.
    #[error("no pending message with local id {0}")]
    UnknownPending(i64),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PendingMessage {
    /// Temporary id, always negative so it never collides with server ids.
    pub local_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MessageEntry {
    Pending(PendingMessage),
    Confirmed(Message),
}

impl MessageEntry {
    pub fn id(&self) -> i64 {
        match self {
            MessageEntry::Pending(pending) => pending.local_id,
            MessageEntry::Confirmed(message) => message.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            MessageEntry::Pending(_) => Role::User,
            MessageEntry::Confirmed(message) => message.role,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            MessageEntry::Pending(pending) => &pending.content,
            MessageEntry::Confirmed(message) => &message.content,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MessageEntry::Pending(_))
    }
}

/// Handle for one outstanding send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingToken(i64);

impl PendingToken {
    pub fn local_id(&self) -> i64 {
        self.0
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConversationView {
    conversation_id: Option<i64>,
    title: Option<String>,
    entries: Vec<MessageEntry>,
    outstanding: Option<i64>,
    last_local_id: i64,
}

impl ConversationView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn entries(&self) -> &[MessageEntry] {
        &self.entries
    }

    pub fn is_sending(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Starts a new chat. A response still in flight will no longer find its
    /// pending entry and is dropped by [`ConversationView::confirm`].
    pub fn reset(&mut self) {
        self.conversation_id = None;
        self.title = None;
        self.entries.clear();
        self.outstanding = None;
    }

    /// Replaces local state with the server's copy of the conversation.
    pub fn load(&mut self, conversation: Conversation) {
        self.conversation_id = Some(conversation.id);
        self.title = Some(conversation.title);
        self.entries = conversation
            .messages
            .into_iter()
            .map(MessageEntry::Confirmed)
            .collect();
        self.outstanding = None;
    }

    pub async fn open<A>(&mut self, api: &A, id: i64) -> Result<(), ConversationError>
    where
        A: ChatApi + ?Sized,
    {
        let conversation = api.get_conversation(id).await?;
        self.load(conversation);
        Ok(())
    }

    pub fn begin_send(&mut self, text: &str) -> Result<PendingToken, ConversationError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        if self.outstanding.is_some() {
            return Err(ConversationError::SendInProgress);
        }

        self.last_local_id -= 1;
        let local_id = self.last_local_id;
        self.entries.push(MessageEntry::Pending(PendingMessage {
            local_id,
            content: content.to_string(),
            created_at: Utc::now(),
        }));
        self.outstanding = Some(local_id);
        Ok(PendingToken(local_id))
    }

    /// Settles a pending send with the backend's answer. Returns `true` when
    /// the response started a new conversation.
    pub fn confirm(
        &mut self,
        token: PendingToken,
        response: ChatResponse,
    ) -> Result<bool, ConversationError> {
        let index = self
            .pending_index(token)
            .ok_or(ConversationError::UnknownPending(token.0))?;

        if let MessageEntry::Pending(pending) = &self.entries[index] {
            let confirmed = Message {
                id: pending.local_id,
                role: Role::User,
                content: pending.content.clone(),
                has_graph: false,
                graph_path: None,
                created_at: pending.created_at,
            };
            self.entries[index] = MessageEntry::Confirmed(confirmed);
        }
        self.entries.push(MessageEntry::Confirmed(response.message));
        self.clear_outstanding(token);

        let started = self.conversation_id.is_none();
        if started {
            self.conversation_id = Some(response.conversation_id);
        }
        Ok(started)
    }

    /// Drops a pending send. Returns whether an entry was removed.
    pub fn rollback(&mut self, token: PendingToken) -> bool {
        self.clear_outstanding(token);
        match self.pending_index(token) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub async fn send<A>(&mut self, api: &A, text: &str) -> Result<ChatResponse, ConversationError>
    where
        A: ChatApi + ?Sized,
    {
        let token = self.begin_send(text)?;
        let content = text.trim();

        match api.send_message(content, self.conversation_id).await {
            Ok(response) => {
                self.confirm(token, response.clone())?;
                Ok(response)
            }
            Err(err) => {
                tracing::debug!(error = %err, local_id = token.0, "rolling back pending message");
                self.rollback(token);
                Err(err.into())
            }
        }
    }

    fn pending_index(&self, token: PendingToken) -> Option<usize> {
        self.entries.iter().position(
            |entry| matches!(entry, MessageEntry::Pending(pending) if pending.local_id == token.0),
        )
    }

    fn clear_outstanding(&mut self, token: PendingToken) {
        if self.outstanding == Some(token.0) {
            self.outstanding = None;
        }
    }
}

/// The list of conversations shown beside the chat.
#[derive(Clone, Debug, Default)]
pub struct ConversationIndex {
    items: Vec<ConversationSummary>,
}

impl ConversationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ConversationSummary] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&ConversationSummary> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn replace(&mut self, items: Vec<ConversationSummary>) {
        self.items = items;
    }

    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub async fn refresh<A>(&mut self, api: &A) -> Result<(), ConversationError>
    where
        A: ChatApi + ?Sized,
    {
        self.items = api.list_conversations().await?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Deleting an unknown conversation is an error.
    #[default]
    Strict,
    /// A 404 counts as already deleted.
    TreatMissingAsDeleted,
}

/// Deletes on the server, then drops the conversation from the index and
/// resets the view if it was showing it.
pub async fn delete_conversation<A>(
    api: &A,
    index: &mut ConversationIndex,
    view: &mut ConversationView,
    id: i64,
    policy: DeletePolicy,
) -> Result<(), ConversationError>
where
    A: ChatApi + ?Sized,
{
    match api.delete_conversation(id).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() && policy == DeletePolicy::TreatMissingAsDeleted => {
            tracing::debug!(conversation_id = id, "conversation already deleted");
        }
        Err(err) => return Err(err.into()),
    }

    index.remove(id);
    if view.conversation_id() == Some(id) {
        view.reset();
    }
    Ok(())
}

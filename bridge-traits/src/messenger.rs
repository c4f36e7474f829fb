//! Front-end status messages
//!
//! The chat front end owns message rendering and delivery. The core only
//! posts a status line or rewrites one it was handed earlier.

use async_trait::async_trait;
use std::fmt;
use tracing::debug;

use crate::error::Result;

/// Reference to a message previously posted in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i64) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.message_id)
    }
}

/// Status message sink implemented by the chat front end.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Post a new status message and return a reference to it.
    async fn post(&self, chat_id: i64, text: &str) -> Result<MessageRef>;

    /// Replace the text of an existing message.
    ///
    /// Fails when the message was deleted or the text is unchanged.
    async fn edit(&self, message: &MessageRef, text: &str) -> Result<()>;
}

/// Edit a status message, swallowing any failure.
///
/// A status edit never decides the outcome of the operation it reports on.
pub async fn edit_quietly(sink: &dyn StatusSink, message: &MessageRef, text: &str) {
    if let Err(e) = sink.edit(message, text).await {
        debug!(message = %message, error = %e, "Status edit ignored");
    }
}

/// Post a status message, returning `None` if the sink refused it.
pub async fn post_quietly(sink: &dyn StatusSink, chat_id: i64, text: &str) -> Option<MessageRef> {
    match sink.post(chat_id, text).await {
        Ok(message) => Some(message),
        Err(e) => {
            debug!(chat_id, error = %e, "Status post ignored");
            None
        }
    }
}

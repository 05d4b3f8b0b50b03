//! Outbound side of the chat transport.

use async_trait::async_trait;

use crate::assistant::message::Keyboard;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The chat cannot receive messages (never started the bot, blocked it, deleted).
    #[error("chat {chat_id} is unreachable: {reason}")]
    Unreachable { chat_id: i64, reason: String },
    #[error("request failed: {0}")]
    Request(String),
}

/// Sends messages and documents to chats.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an HTML message, optionally replacing the reply keyboard.
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) -> Result<(), TransportError>;

    /// Send a file as a document attachment.
    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        data: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError>;
}

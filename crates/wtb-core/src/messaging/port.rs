use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::ChatAction,
    Result,
};

/// Outbound side of a chat platform.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Shown while a command waits on upstream services.
    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;
}

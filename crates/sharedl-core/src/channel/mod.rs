//! The front end jobs report to and deliver into.

mod outbox;

pub use outbox::OutboxChannel;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::job::{ChatId, Destination};

#[derive(Debug, Error)]
pub enum EditError {
    /// The status message no longer exists (deleted by the requester).
    #[error("status message not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EditError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EditError::NotFound)
    }
}

#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Post a new status message in `chat_id` replying to `reply_to`; returns its id.
    async fn create_status_message(
        &self,
        chat_id: ChatId,
        reply_to: i64,
        text: &str,
    ) -> anyhow::Result<i64>;

    async fn edit_status_message(&self, dest: &Destination, text: &str) -> Result<(), EditError>;

    /// Upload `path` to the destination chat under `display_name`.
    async fn send_file(
        &self,
        dest: &Destination,
        path: &Path,
        display_name: &str,
    ) -> anyhow::Result<()>;

    async fn delete_status_message(&self, dest: &Destination) -> anyhow::Result<()>;

    /// Plain notice to a chat, not tied to a status message.
    async fn notify(&self, chat_id: ChatId, text: &str) -> anyhow::Result<()>;
}

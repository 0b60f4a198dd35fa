use async_trait::async_trait;

use crate::interaction::{ChannelId, MessageId};
use crate::render::RenderRequest;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to publish render: {0}")]
    Publish(String),
    #[error("Failed to encode render: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Render I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where render requests go: the chat platform, a console, a test recorder.
#[async_trait]
pub trait RenderSink: Send + Sync {
    /// Show `request` in `channel`, editing `target` when given.
    ///
    /// Returns the message that now shows the game.
    async fn render(
        &self,
        channel: ChannelId,
        target: Option<MessageId>,
        request: RenderRequest,
    ) -> Result<MessageId, RenderError>;
}

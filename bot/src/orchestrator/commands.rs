use tokio::sync::oneshot;

use super::Handled;
use crate::interaction::InteractionEvent;

/// Messages sent to a channel actor. Each embeds a oneshot for the reply.
pub(crate) enum ChannelCommand {
    Interaction {
        event: InteractionEvent,
        reply: oneshot::Sender<Handled>,
    },
    /// Stop the game without a final render and exit.
    Shutdown { done: oneshot::Sender<()> },
}

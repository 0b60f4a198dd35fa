//! Structured events arriving from the chat platform.

use chess::{PieceColor, PieceKind, StrengthLevel};
use cozy_chess::Square;
use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// Channel or thread hosting at most one game.
    ChannelId
);
snowflake!(
    /// User who triggered an interaction.
    UserId
);
snowflake!(
    /// Platform message currently showing a game.
    MessageId
);

/// One user interaction, already decoded by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionEvent {
    pub channel_id: ChannelId,
    pub actor_id: UserId,
    pub command: Command,
}

impl InteractionEvent {
    pub fn new(channel_id: ChannelId, actor_id: UserId, command: Command) -> Self {
        Self {
            channel_id,
            actor_id,
            command,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// The `/chess` slash command.
    Start,
    SelectStrength(StrengthLevel),
    SelectColor(PieceColor),
    SelectPiece(Square),
    Move {
        from: Square,
        to: Square,
        promotion: Option<PieceKind>,
    },
    Cancel,
    Resign,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::SelectStrength(_) => "select_strength",
            Self::SelectColor(_) => "select_color",
            Self::SelectPiece(_) => "select_piece",
            Self::Move { .. } => "move",
            Self::Cancel => "cancel",
            Self::Resign => "resign",
        }
    }

    /// True for events that can open a new setup in an idle channel.
    pub fn opens_setup(&self) -> bool {
        matches!(
            self,
            Self::Start | Self::SelectStrength(_) | Self::SelectColor(_)
        )
    }
}

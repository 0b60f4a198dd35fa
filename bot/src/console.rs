//! Line-delimited JSON stand-in for the chat platform.
//!
//! Interaction events arrive one per line on the input. Render requests and
//! rejection replies leave one per line on the output. Action identifiers
//! follow the bot's button conventions: `piece-<sq>`, `move-<from>-<to>`
//! with an optional `-<promotion>` suffix, `cancel-move`, `resign`, and the
//! `rating-select` / `color-select` menus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chess::{format_square, parse_square, PieceColor, PieceKind, StrengthLevel};
use cozy_chess::Square;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::interaction::{ChannelId, Command, InteractionEvent, MessageId, UserId};
use crate::orchestrator::{Handled, Orchestrator};
use crate::render::{Action, ButtonAction, ButtonStyle, MenuKind, RenderRequest};
use crate::sink::{RenderError, RenderSink};

const RATING_SELECT: &str = "rating-select";
const COLOR_SELECT: &str = "color-select";
const CANCEL_MOVE: &str = "cancel-move";
const RESIGN: &str = "resign";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed event: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown command: /{0}")]
    UnknownCommand(String),
    #[error("Unknown menu: {0}")]
    UnknownMenu(String),
    #[error("Invalid value {value:?} for {menu}")]
    InvalidValue { menu: String, value: String },
    #[error("Unknown button: {0}")]
    UnknownButton(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Command {
        channel_id: ChannelId,
        user_id: UserId,
        name: String,
    },
    Select {
        channel_id: ChannelId,
        user_id: UserId,
        custom_id: String,
        value: String,
    },
    Button {
        channel_id: ChannelId,
        user_id: UserId,
        custom_id: String,
    },
}

/// Decode one input line into an interaction event.
pub fn decode_event(line: &str) -> Result<InteractionEvent, DecodeError> {
    let event = match serde_json::from_str::<WireEvent>(line)? {
        WireEvent::Command {
            channel_id,
            user_id,
            name,
        } => {
            if name.trim_start_matches('/') != "chess" {
                return Err(DecodeError::UnknownCommand(name));
            }
            InteractionEvent::new(channel_id, user_id, Command::Start)
        }
        WireEvent::Select {
            channel_id,
            user_id,
            custom_id,
            value,
        } => InteractionEvent::new(channel_id, user_id, decode_select(custom_id, value)?),
        WireEvent::Button {
            channel_id,
            user_id,
            custom_id,
        } => {
            let command = decode_button(&custom_id)
                .ok_or(DecodeError::UnknownButton(custom_id))?;
            InteractionEvent::new(channel_id, user_id, command)
        }
    };
    Ok(event)
}

fn decode_select(menu: String, value: String) -> Result<Command, DecodeError> {
    let command = match menu.as_str() {
        RATING_SELECT => StrengthLevel::from_id(&value).map(Command::SelectStrength),
        COLOR_SELECT => PieceColor::from_str_loose(&value).map(Command::SelectColor),
        _ => return Err(DecodeError::UnknownMenu(menu)),
    };
    command.ok_or(DecodeError::InvalidValue { menu, value })
}

fn decode_button(custom_id: &str) -> Option<Command> {
    match custom_id {
        CANCEL_MOVE => return Some(Command::Cancel),
        RESIGN => return Some(Command::Resign),
        _ => {}
    }

    let mut parts = custom_id.split('-');
    match parts.next()? {
        "piece" => {
            let square = parse_square(parts.next()?)?;
            parts.next().is_none().then_some(Command::SelectPiece(square))
        }
        "move" => {
            let from = parse_square(parts.next()?)?;
            let to = parse_square(parts.next()?)?;
            let promotion = match parts.next() {
                Some(p) => {
                    let mut chars = p.chars();
                    let kind = PieceKind::from_char(chars.next()?)?;
                    if chars.next().is_some() {
                        return None;
                    }
                    Some(kind)
                }
                None => None,
            };
            parts.next().is_none().then_some(Command::Move {
                from,
                to,
                promotion,
            })
        }
        _ => None,
    }
}

/// Identifier a button press carries back to [`decode_event`].
pub fn button_id(action: ButtonAction) -> String {
    match action {
        ButtonAction::SelectPiece(square) => format!("piece-{}", format_square(square)),
        ButtonAction::Move {
            from,
            to,
            promotion,
        } => move_id(from, to, promotion),
        ButtonAction::Cancel => CANCEL_MOVE.to_string(),
        ButtonAction::Resign => RESIGN.to_string(),
    }
}

fn move_id(from: Square, to: Square, promotion: Option<PieceKind>) -> String {
    match promotion {
        Some(kind) => format!(
            "move-{}-{}-{}",
            format_square(from),
            format_square(to),
            kind.to_char_lower()
        ),
        None => format!("move-{}-{}", format_square(from), format_square(to)),
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireOutput<'a> {
    Render {
        channel_id: ChannelId,
        message_id: MessageId,
        edit: bool,
        status: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        board: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fen: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        commentary: Option<&'a str>,
        components: Vec<Vec<WireComponent<'a>>>,
    },
    /// Message only the acting user sees.
    Reply {
        channel_id: ChannelId,
        user_id: UserId,
        content: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireComponent<'a> {
    Select {
        custom_id: &'static str,
        placeholder: &'a str,
        options: Vec<WireOption<'a>>,
    },
    Button {
        custom_id: String,
        label: &'a str,
        style: &'static str,
    },
}

#[derive(Debug, Serialize)]
struct WireOption<'a> {
    value: &'a str,
    label: &'a str,
    default: bool,
}

fn components(request: &RenderRequest) -> Vec<Vec<WireComponent<'_>>> {
    request
        .actions
        .iter()
        .map(|row| {
            row.actions
                .iter()
                .map(|action| match action {
                    Action::Menu(menu) => WireComponent::Select {
                        custom_id: match menu.kind {
                            MenuKind::Strength => RATING_SELECT,
                            MenuKind::Color => COLOR_SELECT,
                        },
                        placeholder: &menu.placeholder,
                        options: menu
                            .options
                            .iter()
                            .map(|o| WireOption {
                                value: &o.value,
                                label: &o.label,
                                default: o.selected,
                            })
                            .collect(),
                    },
                    Action::Button(button) => WireComponent::Button {
                        custom_id: button_id(button.action),
                        label: &button.label,
                        style: match button.style {
                            ButtonStyle::Primary => "primary",
                            ButtonStyle::Secondary => "secondary",
                            ButtonStyle::Success => "success",
                            ButtonStyle::Danger => "danger",
                        },
                    },
                })
                .collect()
        })
        .collect()
}

/// Writes render requests as JSON lines.
pub struct ConsoleSink<W> {
    writer: Mutex<W>,
    next_id: AtomicU64,
}

impl<W: AsyncWrite + Unpin + Send> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            next_id: AtomicU64::new(1),
        }
    }

    /// Tell one user why their interaction was refused.
    pub async fn reply(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
        content: &str,
    ) -> Result<(), RenderError> {
        self.write(&WireOutput::Reply {
            channel_id,
            user_id,
            content,
        })
        .await
    }

    async fn write(&self, output: &WireOutput<'_>) -> Result<(), RenderError> {
        let mut line = serde_json::to_vec(output)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RenderSink for ConsoleSink<W> {
    async fn render(
        &self,
        channel: ChannelId,
        target: Option<MessageId>,
        request: RenderRequest,
    ) -> Result<MessageId, RenderError> {
        let message_id =
            target.unwrap_or_else(|| MessageId(self.next_id.fetch_add(1, Ordering::Relaxed)));
        self.write(&WireOutput::Render {
            channel_id: channel,
            message_id,
            edit: target.is_some(),
            status: &request.status_text,
            board: request.board.as_ref().map(|b| b.text.as_str()),
            fen: request.board.as_ref().map(|b| b.fen.as_str()),
            notice: request.notice.as_deref(),
            commentary: request.commentary.as_deref(),
            components: components(&request),
        })
        .await?;
        Ok(message_id)
    }
}

/// Feed every input line to the orchestrator until the input closes.
pub async fn run<R, W>(
    orchestrator: Orchestrator,
    reader: R,
    sink: Arc<ConsoleSink<W>>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match decode_event(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Dropping input line: {}", e);
                continue;
            }
        };

        let (channel_id, actor_id) = (event.channel_id, event.actor_id);
        if let Handled::Rejected(reason) = orchestrator.handle(event).await {
            if let Err(e) = sink.reply(channel_id, actor_id, &reason).await {
                tracing::warn!("Failed to send reply: {}", e);
            }
        }
    }
    tracing::info!("Input closed");
    Ok(())
}

//! Per-channel chess games against an external UCI engine.
//!
//! The chat platform is kept at arm's length: it feeds parsed
//! [`InteractionEvent`]s into the [`Orchestrator`] and receives
//! [`RenderRequest`]s through a [`RenderSink`].

pub mod config;
pub mod console;
pub mod interaction;
pub mod orchestrator;
pub mod registry;
pub mod render;
pub mod sink;

#[cfg(any(test, feature = "mock"))]
pub mod testing;

pub use config::Settings;
pub use interaction::{ChannelId, Command, InteractionEvent, MessageId, UserId};
pub use orchestrator::{EndReason, Handled, Orchestrator};
pub use registry::{ActiveSession, EngineFactory, RegistryError, SessionRegistry};
pub use render::RenderRequest;
pub use sink::{RenderError, RenderSink};

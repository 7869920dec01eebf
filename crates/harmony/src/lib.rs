//! Text-level codec for the harmony chat transcript format.
//!
//! A transcript is a run of messages, each rendered as
//! `<|start|>{header}<|message|>{content}{terminator}`. The header carries the
//! author, an optional channel and an optional recipient; tool calls are
//! assistant messages addressed to `functions.<name>`.

mod decode;
mod encode;
mod message;
pub mod routing;
pub mod tokens;

use thiserror::Error;

pub use decode::{parse_completion, parse_transcript};
pub use encode::{render_developer, render_message, render_prompt, render_system};
pub use message::{HarmonyMessage, Role};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarmonyError {
    #[error("expected <|start|> but found {0:?}")]
    UnexpectedText(String),

    #[error("message header {0:?} has no <|message|> marker")]
    MissingMessageMarker(String),

    #[error("message from {0:?} has no terminator")]
    MissingTerminator(String),

    #[error("unknown author {0:?}")]
    UnknownRole(String),
}

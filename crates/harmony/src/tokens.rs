//! Special tokens, written out as the literal text the model produces.

pub const START: &str = "<|start|>";
pub const END: &str = "<|end|>";
pub const MESSAGE: &str = "<|message|>";
pub const CHANNEL: &str = "<|channel|>";
pub const CONSTRAIN: &str = "<|constrain|>";
/// Ends an assistant message addressed to a tool.
pub const CALL: &str = "<|call|>";
/// Ends the final assistant message of a completion.
pub const RETURN: &str = "<|return|>";

pub const TERMINATORS: [&str; 3] = [END, CALL, RETURN];

/// Stop sequences for a raw completion request.
pub const STOP_SEQUENCES: [&str; 2] = [RETURN, CALL];

pub const ANALYSIS_CHANNEL: &str = "analysis";
pub const COMMENTARY_CHANNEL: &str = "commentary";
pub const FINAL_CHANNEL: &str = "final";

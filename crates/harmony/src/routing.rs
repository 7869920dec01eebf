//! Parsing of the header routing field.
//!
//! Models place the recipient in several shapes: `to=functions.shell`,
//! `to=functions.shell<|channel|>commentary`, `to=functions.shell <|constrain|>json`
//! and occasionally `to=<|constrain|>shell`. Everything from an embedded
//! channel marker onward is ignored.

use crate::tokens::{CHANNEL, CONSTRAIN};

const FUNCTIONS_PREFIX: &str = "functions.";

/// Extracts the raw routing target that follows `to=` in a header.
pub fn routing_target(header: &str) -> Option<String> {
    let (_, field) = header.split_once("to=")?;
    let field = cut_at_channel(field).trim_start();
    let target: String = field
        .chars()
        .take_while(|character| !character.is_whitespace())
        .collect();
    (!target.is_empty()).then_some(target)
}

/// Resolves a routing target to a tool name.
///
/// Only `functions.<name>` and `<|constrain|><name>` prefixes name a tool.
pub fn tool_recipient(target: &str) -> Option<String> {
    let target = cut_at_channel(target).trim();
    let rest = target
        .strip_prefix(FUNCTIONS_PREFIX)
        .or_else(|| target.strip_prefix(CONSTRAIN))?;
    let name: String = rest
        .chars()
        .take_while(|character| !character.is_whitespace() && *character != '<')
        .collect();
    (!name.is_empty()).then_some(name)
}

fn cut_at_channel(field: &str) -> &str {
    match field.find(CHANNEL) {
        Some(position) => &field[..position],
        None => field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_target_is_cut_at_channel_marker() {
        assert_eq!(
            routing_target("assistant to=functions.shell<|channel|>commentary json"),
            Some("functions.shell".to_string())
        );
        assert_eq!(
            routing_target("assistant<|channel|>commentary to=functions.shell <|constrain|>json"),
            Some("functions.shell".to_string())
        );
        assert_eq!(routing_target("assistant<|channel|>final"), None);
        assert_eq!(routing_target("assistant to="), None);
    }

    #[test]
    fn functions_prefix_names_a_tool() {
        assert_eq!(tool_recipient("functions.shell"), Some("shell".to_string()));
        assert_eq!(
            tool_recipient("functions.file_editor<|constrain|>json"),
            Some("file_editor".to_string())
        );
    }

    #[test]
    fn constrain_prefix_names_a_tool() {
        assert_eq!(tool_recipient("<|constrain|>write_plan"), Some("write_plan".to_string()));
    }

    #[test]
    fn embedded_channel_marker_is_stripped_before_matching() {
        assert_eq!(
            tool_recipient("functions.web_fetch<|channel|>commentary"),
            Some("web_fetch".to_string())
        );
        assert_eq!(tool_recipient("<|channel|>functions.shell"), None);
    }

    #[test]
    fn other_targets_are_not_tools() {
        assert_eq!(tool_recipient("assistant"), None);
        assert_eq!(tool_recipient("browser.search"), None);
        assert_eq!(tool_recipient("functions."), None);
    }
}

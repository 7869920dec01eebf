use crate::message::{HarmonyMessage, Role};
use crate::routing::routing_target;
use crate::tokens::{CHANNEL, CONSTRAIN, END, MESSAGE, START, TERMINATORS};
use crate::HarmonyError;

/// Decodes the text a completion produced after a prompt from
/// [`render_prompt`](crate::render_prompt).
///
/// The prompt already opened `<|start|>assistant`, so that prefix is restored
/// first. Stop sequences are not echoed by completion endpoints, so a missing
/// final terminator is appended before parsing.
pub fn parse_completion(completion: &str) -> Result<Vec<HarmonyMessage>, HarmonyError> {
    let mut transcript = format!("{START}assistant{completion}");
    let trimmed_len = transcript.trim_end().len();
    transcript.truncate(trimmed_len);
    if !TERMINATORS
        .iter()
        .any(|terminator| transcript.ends_with(terminator))
    {
        transcript.push_str(END);
    }
    parse_transcript(&transcript)
}

/// Parses a run of complete messages.
pub fn parse_transcript(text: &str) -> Result<Vec<HarmonyMessage>, HarmonyError> {
    let mut messages = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let Some(after_start) = rest.strip_prefix(START) else {
            return Err(HarmonyError::UnexpectedText(snippet(rest)));
        };
        let Some((header, body)) = after_start.split_once(MESSAGE) else {
            return Err(HarmonyError::MissingMessageMarker(snippet(after_start)));
        };
        let mut message = parse_header(header)?;

        let Some((position, terminator)) = TERMINATORS
            .iter()
            .filter_map(|terminator| body.find(terminator).map(|position| (position, *terminator)))
            .min_by_key(|(position, _)| *position)
        else {
            return Err(HarmonyError::MissingTerminator(message.role.as_str().to_string()));
        };
        if body[..position].contains(START) {
            return Err(HarmonyError::MissingTerminator(message.role.as_str().to_string()));
        }

        message.content = body[..position].to_string();
        messages.push(message);
        rest = body[position + terminator.len()..].trim_start();
    }

    Ok(messages)
}

fn parse_header(header: &str) -> Result<HarmonyMessage, HarmonyError> {
    let header = header.trim();
    let author_end = header
        .find(|character: char| character.is_whitespace() || character == '<')
        .unwrap_or(header.len());
    let role = Role::parse(&header[..author_end])?;

    let channel = header.split_once(CHANNEL).and_then(|(_, after)| {
        let channel: String = after
            .chars()
            .take_while(|character| !character.is_whitespace() && *character != '<')
            .collect();
        (!channel.is_empty()).then_some(channel)
    });

    let recipient = routing_target(header);

    // A constrain marker that is not itself the routing target names the content type.
    let content_type = header
        .match_indices(CONSTRAIN)
        .map(|(position, _)| &header[position + CONSTRAIN.len()..])
        .find(|after| !header.contains(&format!("to={CONSTRAIN}{after}")))
        .map(|after| {
            after
                .chars()
                .take_while(|character| !character.is_whitespace() && *character != '<')
                .collect::<String>()
        })
        .filter(|content_type| !content_type.is_empty());

    let mut message = HarmonyMessage::new(role, "");
    message.channel = channel;
    message.recipient = recipient;
    message.content_type = content_type;
    Ok(message)
}

fn snippet(text: &str) -> String {
    text.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_terminator_is_appended() {
        let messages =
            parse_completion("<|channel|>final<|message|>All done.").expect("decode completion");

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert!(messages[0].is_final());
        assert_eq!(messages[0].content, "All done.");
    }

    #[test]
    fn analysis_then_tool_call() {
        let completion = concat!(
            "<|channel|>analysis<|message|>Need to list files.<|end|>",
            "<|start|>assistant<|channel|>commentary to=functions.shell <|constrain|>json",
            "<|message|>{\"command\":\"ls\"}"
        );

        let messages = parse_completion(completion).expect("decode completion");

        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_analysis());
        assert_eq!(messages[0].tool_name(), None);
        assert_eq!(messages[1].tool_name(), Some("shell".to_string()));
        assert_eq!(messages[1].content_type.as_deref(), Some("json"));
        assert_eq!(messages[1].content, "{\"command\":\"ls\"}");
    }

    #[test]
    fn recipient_in_author_section_with_embedded_channel() {
        let messages = parse_completion(
            " to=functions.file_editor<|channel|>commentary json<|message|>{}<|call|>",
        )
        .expect("decode completion");

        assert_eq!(messages[0].tool_name(), Some("file_editor".to_string()));
        assert_eq!(messages[0].channel.as_deref(), Some("commentary"));
    }

    #[test]
    fn constrain_routing_target_is_not_a_content_type() {
        let messages = parse_completion("<|channel|>commentary to=<|constrain|>write_plan<|message|>{}")
            .expect("decode completion");

        assert_eq!(messages[0].tool_name(), Some("write_plan".to_string()));
        assert_eq!(messages[0].content_type, None);
    }

    #[test]
    fn text_outside_messages_is_rejected() {
        let error = parse_transcript("<|start|>user<|message|>hi<|end|>stray").expect_err("stray text");
        assert_eq!(error, HarmonyError::UnexpectedText("stray".to_string()));
    }

    #[test]
    fn unknown_author_is_rejected() {
        let error = parse_transcript("<|start|>robot<|message|>x<|end|>").expect_err("unknown author");
        assert_eq!(error, HarmonyError::UnknownRole("robot".to_string()));
    }

    #[test]
    fn nested_start_without_terminator_is_rejected() {
        let error = parse_transcript("<|start|>assistant<|message|>x<|start|>assistant<|message|>y<|end|>")
            .expect_err("unterminated message");
        assert_eq!(error, HarmonyError::MissingTerminator("assistant".to_string()));
    }
}

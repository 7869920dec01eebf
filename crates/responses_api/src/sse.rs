use serde_json::Value;

use crate::events::{OutputItem, ResponseStatus, ResponseSummary, ResponseUsage, ResponsesStreamEvent};

/// Incremental parser for SSE text streams.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ResponsesStreamEvent> {
        self.buffer
            .push_str(&String::from_utf8_lossy(bytes).replace("\r\n", "\n"));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find("\n\n") {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 2);

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" {
                continue;
            }
            if let Ok(value) = serde_json::from_str::<Value>(&payload) {
                if let Some(event) = map_event(&value) {
                    events.push(event);
                }
            }
        }

        events
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<ResponsesStreamEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(ToString::to_string)
}

fn map_event(value: &Value) -> Option<ResponsesStreamEvent> {
    let event_type = value.get("type")?.as_str()?;

    match event_type {
        "response.output_text.delta" => Some(ResponsesStreamEvent::OutputTextDelta {
            delta: str_field(value, "delta").unwrap_or_default(),
        }),
        "response.reasoning_summary_text.delta" => {
            Some(ResponsesStreamEvent::ReasoningSummaryTextDelta {
                delta: str_field(value, "delta").unwrap_or_default(),
            })
        }
        "response.output_item.done" => value
            .get("item")
            .map(|item| ResponsesStreamEvent::OutputItemDone {
                item: map_output_item(item),
            }),
        "response.completed" | "response.incomplete" => {
            let response = value.get("response")?;
            Some(ResponsesStreamEvent::Completed {
                response: map_summary(response),
            })
        }
        "response.failed" => Some(ResponsesStreamEvent::Failed {
            message: value
                .get("response")
                .and_then(|response| response.get("error"))
                .and_then(|error| str_field(error, "message")),
        }),
        "error" => Some(ResponsesStreamEvent::Error {
            code: str_field(value, "code"),
            message: str_field(value, "message"),
        }),
        _ => None,
    }
}

fn map_summary(response: &Value) -> ResponseSummary {
    let usage = response.get("usage");
    let tokens = |key: &str| {
        usage
            .and_then(|usage| usage.get(key))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };

    ResponseSummary {
        id: str_field(response, "id").unwrap_or_default(),
        status: response
            .get("status")
            .and_then(Value::as_str)
            .and_then(ResponseStatus::parse),
        usage: ResponseUsage {
            input_tokens: tokens("input_tokens"),
            output_tokens: tokens("output_tokens"),
        },
    }
}

fn map_output_item(item: &Value) -> OutputItem {
    let item_type = item.get("type").and_then(Value::as_str).unwrap_or("");

    match item_type {
        "message" => OutputItem::Message {
            text: collect_texts(item.get("content"), "output_text").join(""),
        },
        "reasoning" => OutputItem::Reasoning {
            summary: collect_texts(item.get("summary"), "summary_text"),
        },
        "function_call" => OutputItem::FunctionCall {
            call_id: str_field(item, "call_id").unwrap_or_default(),
            name: str_field(item, "name").unwrap_or_default(),
            arguments: str_field(item, "arguments").unwrap_or_default(),
        },
        other => OutputItem::Other {
            item_type: other.to_string(),
        },
    }
}

fn collect_texts(parts: Option<&Value>, part_type: &str) -> Vec<String> {
    parts
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|part| part.get("type").and_then(Value::as_str) == Some(part_type))
                .filter_map(|part| str_field(part, "text"))
                .collect()
        })
        .unwrap_or_default()
}

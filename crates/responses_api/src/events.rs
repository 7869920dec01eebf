/// Terminal state reported by a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Completed,
    Incomplete,
    Failed,
    Cancelled,
    Queued,
    InProgress,
}

impl ResponseStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "completed" => Self::Completed,
            "incomplete" => Self::Incomplete,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Summary carried by the terminal `response.completed` event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSummary {
    /// Continuation token for the next request's `previous_response_id`.
    pub id: String,
    pub status: Option<ResponseStatus>,
    pub usage: ResponseUsage,
}

/// Completed output item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputItem {
    Message {
        text: String,
    },
    Reasoning {
        summary: Vec<String>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        /// Raw JSON argument text as sent by the model.
        arguments: String,
    },
    Other {
        item_type: String,
    },
}

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsesStreamEvent {
    OutputTextDelta { delta: String },
    ReasoningSummaryTextDelta { delta: String },
    OutputItemDone { item: OutputItem },
    Completed { response: ResponseSummary },
    Failed { message: Option<String> },
    Error {
        code: Option<String>,
        message: Option<String>,
    },
}

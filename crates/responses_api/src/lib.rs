//! Transport primitives for a stateful "responses" style endpoint.
//!
//! The endpoint keeps conversation state server-side: every response carries an
//! id that later requests pass as `previous_response_id`, so follow-up rounds
//! only send new input items (typically function call outputs).
//!
//! SSE normalization keeps completed output items whole (messages, reasoning
//! summaries, function calls) so callers never have to stitch deltas together.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::{ResponsesApiClient, StreamResult};
pub use config::ResponsesApiConfig;
pub use error::ResponsesApiError;
pub use events::{OutputItem, ResponseStatus, ResponseSummary, ResponseUsage, ResponsesStreamEvent};
pub use payload::{InputItem, ResponsesRequest};
pub use sse::SseStreamParser;
pub use url::normalize_responses_url;

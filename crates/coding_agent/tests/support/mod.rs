#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use agent_provider::ModelProvider;
use agent_provider_mock::{MockProvider, MockRound, MOCK_PROVIDER_ID};
use coding_agent::{
    Environment, PhaseEndpoint, PromptedModels, ProviderRegistry, Session, SessionError,
    SessionEvent,
};
use futures_util::StreamExt;

pub const TEST_SESSION_ID: &str = "session-under-test";

/// One scripted provider serving every phase of a session.
pub fn scripted(rounds: Vec<MockRound>) -> Arc<MockProvider> {
    Arc::new(MockProvider::new(rounds))
}

pub fn registry(provider: &Arc<MockProvider>) -> ProviderRegistry {
    let shared: Arc<dyn ModelProvider> = provider.clone();
    ProviderRegistry::new().with_provider(MOCK_PROVIDER_ID, shared)
}

pub fn mock_models() -> Arc<PromptedModels> {
    Arc::new(PromptedModels::uniform(PhaseEndpoint::new(
        MOCK_PROVIDER_ID,
        "scripted-model",
    )))
}

pub fn session(request: &str, workspace: &Path, provider: &Arc<MockProvider>) -> Session {
    Session::new(request, Environment::new(workspace), mock_models())
        .with_id(TEST_SESSION_ID)
        .with_providers(registry(provider))
}

pub async fn collect(session: Session) -> Vec<Result<SessionEvent, SessionError>> {
    session.run().collect().await
}

/// Splits a finished stream into its events and the optional fatal error.
pub fn split(items: Vec<Result<SessionEvent, SessionError>>) -> (Vec<SessionEvent>, Option<SessionError>) {
    let mut events = Vec::new();
    let mut failure = None;
    let total = items.len();
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Ok(event) => events.push(event),
            Err(error) => {
                assert_eq!(index + 1, total, "a fatal error must be the last item");
                failure = Some(error);
            }
        }
    }
    (events, failure)
}

pub fn completion(events: &[SessionEvent]) -> &coding_agent::CompletionReport {
    match events.last() {
        Some(SessionEvent::Completed(report)) => report,
        other => panic!("expected a completed event last, got {other:?}"),
    }
}

pub fn snapshots(events: &[SessionEvent]) -> Vec<&[coding_agent::Todo]> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Todos { todos, .. } => Some(todos.as_slice()),
            _ => None,
        })
        .collect()
}

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use coding_agent::{AgentConfig, Environment, ProviderRegistry, Session};
use futures_util::StreamExt;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let request = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if request.trim().is_empty() {
        eprintln!("usage: coding_agent <request>");
        return ExitCode::from(2);
    }

    match run(request).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!(%message, "session failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(request: String) -> Result<(), String> {
    let config = AgentConfig::from_env().map_err(|error| error.to_string())?;
    let models = config.models().map_err(|error| error.to_string())?;
    let web_search = config.web_search_settings().map_err(|error| error.to_string())?;

    let mut providers = ProviderRegistry::new();
    if let Some(timeout) = config.timeout() {
        providers = providers.with_timeout(timeout);
    }
    if let Some(max_tokens) = config.max_tokens {
        providers = providers.with_max_tokens(max_tokens);
    }
    if let Some(price) = config.price {
        providers = providers.with_price(price);
    }

    let cwd = std::env::current_dir().map_err(|error| format!("failed to read working directory: {error}"))?;
    let mut environment = Environment::new(cwd).with_web_search(web_search);
    if let Some(max_steps) = config.max_steps {
        environment = environment.with_max_steps(max_steps);
    }

    let session = Session::new(request, environment, Arc::new(models)).with_providers(providers);
    let mut events = Box::pin(session.run());
    let mut stdout = io::stdout().lock();
    while let Some(item) = events.next().await {
        let event = item.map_err(|error| error.to_string())?;
        let line = serde_json::to_string(&event).map_err(|error| format!("failed to encode event: {error}"))?;
        writeln!(stdout, "{line}").map_err(|error| format!("failed to write event: {error}"))?;
    }
    Ok(())
}

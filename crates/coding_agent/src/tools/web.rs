use std::time::Duration;

use agent_provider::{Tool, ToolError};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{parse_arguments, truncate_to_byte_limit, WEB_FETCH_TOOL, WEB_SEARCH_TOOL};

const FETCH_MAX_BYTES: usize = 64 * 1024;
const DEFAULT_SEARCH_RESULTS: usize = 5;
const MAX_SEARCH_RESULTS: usize = 10;

const SKIPPED_TAGS: [&str; 6] = ["head", "script", "style", "noscript", "template", "iframe"];
const BLOCK_TAGS: [&str; 14] = [
    "p", "div", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "section", "article",
];

/// Reduces an HTML page to its visible text, one block per line.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    collect_text(document.root_element(), &mut text);

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, text: &mut String) {
    for node in element.children() {
        if let Some(child) = ElementRef::wrap(node) {
            let tag = child.value().name();
            if SKIPPED_TAGS.contains(&tag) {
                continue;
            }
            collect_text(child, text);
            if BLOCK_TAGS.contains(&tag) {
                text.push('\n');
            }
        } else if let Some(fragment) = node.value().as_text() {
            text.push_str(fragment);
        }
    }
}

fn build_client(timeout: Duration) -> Result<Client, ToolError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| ToolError::execution(format!("Failed to build HTTP client: {error}")))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FetchArgs {
    url: String,
}

/// HTTP GET returning the readable text of a page.
#[derive(Debug)]
pub struct WebFetchTool {
    timeout: Duration,
}

impl WebFetchTool {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        WEB_FETCH_TOOL
    }

    fn description(&self) -> &str {
        "Fetch a web page over HTTP(S) and return its text content."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "url": { "type": "string", "description": "http:// or https:// URL" } },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let args: FetchArgs = parse_arguments(WEB_FETCH_TOOL, arguments)?;
        let url = args.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ToolError::execution(format!(
                "web_fetch only supports http:// and https:// URLs, got '{url}'"
            )));
        }

        let response = build_client(self.timeout)?
            .get(url)
            .send()
            .await
            .map_err(|error| ToolError::execution(format!("Failed to fetch {url}: {error}")))?;
        let status = response.status();
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("html"));
        let body = response
            .text()
            .await
            .map_err(|error| ToolError::execution(format!("Failed to read {url}: {error}")))?;
        debug!(url, status = status.as_u16(), bytes = body.len(), "web page fetched");

        if !status.is_success() {
            return Err(ToolError::execution(format!(
                "Fetching {url} returned HTTP {}",
                status.as_u16()
            )));
        }

        let text = if is_html { html_to_text(&body) } else { body };
        Ok(truncate_to_byte_limit(text, FETCH_MAX_BYTES))
    }
}

/// Search backend reached by [`WebSearchTool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSearchSettings {
    /// JSON endpoint accepting `q` and `count` query parameters.
    pub endpoint: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default, alias = "description")]
    snippet: String,
}

#[derive(Debug)]
pub struct WebSearchTool {
    settings: Option<WebSearchSettings>,
    timeout: Duration,
}

impl WebSearchTool {
    #[must_use]
    pub fn new(settings: Option<WebSearchSettings>, timeout: Duration) -> Self {
        Self { settings, timeout }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Search the web and return the top results with title, URL, and snippet."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "max_results": { "type": "integer", "minimum": 1, "maximum": MAX_SEARCH_RESULTS }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let args: SearchArgs = parse_arguments(WEB_SEARCH_TOOL, arguments)?;
        let Some(settings) = &self.settings else {
            return Err(ToolError::execution("web search is not configured"));
        };
        let query = args.query.trim();
        if query.is_empty() {
            return Err(ToolError::execution("query must not be empty"));
        }
        let count = args
            .max_results
            .unwrap_or(DEFAULT_SEARCH_RESULTS)
            .clamp(1, MAX_SEARCH_RESULTS);

        let mut request = build_client(self.timeout)?
            .get(&settings.endpoint)
            .query(&[("q", query.to_string()), ("count", count.to_string())]);
        if let Some(api_key) = &settings.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| ToolError::execution(format!("Search request failed: {error}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::execution(format!(
                "Search endpoint returned HTTP {}",
                status.as_u16()
            )));
        }
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|error| ToolError::execution(format!("Search response was not valid JSON: {error}")))?;

        if parsed.results.is_empty() {
            return Ok(format!("No results for '{query}'"));
        }
        Ok(parsed
            .results
            .iter()
            .take(count)
            .enumerate()
            .map(|(index, hit)| format!("{}. {}\n   {}\n   {}", index + 1, hit.title, hit.url, hit.snippet))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn html_is_reduced_to_visible_text() {
        let html = "<html><head><title>t</title></head><body>\n<script>var x = 1;</script>\
                    <h1>Release&nbsp;notes</h1>\n<p>Fixes &amp; <b>features</b></p></body></html>";

        assert_eq!(html_to_text(html), "Release notes\nFixes & features");
    }

    #[test]
    fn attributes_and_entities_do_not_leak_into_text() {
        let html = r#"<p title="a>b">caf&eacute; costs &#8364;5 &mdash; ok</p>"#;

        assert_eq!(html_to_text(html), "caf\u{e9} costs \u{20ac}5 \u{2014} ok");
    }

    #[test]
    fn block_elements_break_lines_and_inline_ones_do_not() {
        let html = "<ul><li>one <em>two</em></li><li>three</li></ul><noscript>enable js</noscript>";

        assert_eq!(html_to_text(html), "one two\nthree");
    }

    #[tokio::test]
    async fn unconfigured_search_is_a_tool_error() {
        let tool = WebSearchTool::new(None, Duration::from_secs(1));

        let error = tool
            .execute(json!({ "query": "rust async streams" }))
            .await
            .expect_err("no backend");

        assert_eq!(error.to_string(), "web search is not configured");
    }

    #[tokio::test]
    async fn fetch_rejects_non_http_urls() {
        let tool = WebFetchTool::new(Duration::from_secs(1));

        let error = tool
            .execute(json!({ "url": "file:///etc/passwd" }))
            .await
            .expect_err("scheme");

        assert!(error.to_string().contains("only supports http:// and https://"));
    }
}

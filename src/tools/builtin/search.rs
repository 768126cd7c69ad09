//! `web_search`: Tavily-backed web search that prefers full page text.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RelayError;
use crate::provider::http::{bearer_headers, shared_client, status_to_error};
use crate::tools::tool::{AgentTool, Tool};
use crate::tools::types::AgentToolParameters;
use crate::util::text::truncate_chars;

pub const SEARCH_TOOL_NAME: &str = "web_search";
pub const DEFAULT_TAVILY_URL: &str = "https://api.tavily.com";
const MAX_RESULTS: u32 = 5;
/// Raw page text shorter than this is usually an extraction failure.
const MIN_RAW_CONTENT_CHARS: usize = 500;
const MAX_CONTENT_CHARS: usize = 4000;
const TRUNCATION_MARKER: &str = "...(truncated)";

/// One search hit as returned by Tavily.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub content: String,
    pub raw_content: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Minimal Tavily search client.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    api_key: String,
    base_url: String,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_TAVILY_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, RelayError> {
        let body = serde_json::json!({
            "query": query,
            "max_results": MAX_RESULTS,
            "topic": "general",
            "search_depth": "advanced",
            "include_raw_content": true,
        });
        let resp = shared_client()
            .post(format!("{}/search", self.base_url))
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &text));
        }
        let data: SearchResponse = resp.json().await?;
        Ok(data.results)
    }
}

#[derive(Serialize)]
struct SearchDocument<'a> {
    title: Option<&'a str>,
    url: Option<&'a str>,
    content: String,
    source_type: &'static str,
}

/// Render hits as one JSON document per hit, separated by blank lines.
pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            let (content, source_type) = match hit.raw_content.as_deref() {
                Some(raw) if raw.chars().count() > MIN_RAW_CONTENT_CHARS => (raw, "raw_full_text"),
                _ => (hit.content.as_str(), "snippet_fallback"),
            };
            let doc = SearchDocument {
                title: hit.title.as_deref(),
                url: hit.url.as_deref(),
                content: truncate_chars(content, MAX_CONTENT_CHARS, TRUNCATION_MARKER),
                source_type,
            };
            serde_json::to_string(&doc).unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Create the `web_search` tool.
pub fn web_search_tool(client: TavilyClient) -> Arc<dyn Tool> {
    let client = Arc::new(client);
    Arc::new(AgentTool::new(
        SEARCH_TOOL_NAME,
        "Search the web for current information. Returns the full page text when \
         available so answers can go into depth.",
        AgentToolParameters::object()
            .string("query", "The search query", true)
            .build(),
        move |args, _ctx| {
            let client = client.clone();
            async move {
                let query = args.get_str("query")?;
                info!(query, "web search");
                Ok(match client.search(query).await {
                    Ok(hits) if hits.is_empty() => "No search results.".to_string(),
                    Ok(hits) => format_hits(&hits),
                    Err(e) => format!("Search failed: {e}"),
                })
            }
        },
    ))
}

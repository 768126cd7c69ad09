//! `browse_web`: drive the shared browser session.
//!
//! The browser itself runs in a sidecar process that exposes `POST /run`
//! with `{task, max_steps}` and answers with the run history. One
//! [`BrowserSession`] exists per process; its mutex serializes tasks so
//! page state (current URL, logins) carries over between tool calls.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::RelayError;
use crate::provider::http::{shared_client, status_to_error};
use crate::tools::tool::{AgentTool, Tool};
use crate::tools::types::AgentToolParameters;

pub const BROWSER_TOOL_NAME: &str = "browse_web";
pub const DEFAULT_MAX_STEPS: u32 = 10;

#[derive(Serialize)]
struct RunRequest<'a> {
    task: &'a str,
    max_steps: u32,
}

/// History returned by the sidecar for one task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserRun {
    #[serde(default)]
    pub final_result: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    /// Free-form text the browser agent extracted or remembered, oldest first.
    #[serde(default)]
    pub extracted: Vec<String>,
}

impl BrowserRun {
    /// The page the session ended on, if it can be determined.
    pub fn last_url(&self) -> Option<String> {
        if let Some(url) = self.urls.iter().rev().find(|u| !u.is_empty()) {
            return Some(url.clone());
        }
        self.extracted
            .iter()
            .rev()
            .find_map(|text| url_pattern().find(text).map(|m| m.as_str().to_string()))
    }
}

fn url_pattern() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| Regex::new(r"https?://[^\s,'\)\]]+").expect("URL regex must compile"))
}

/// Handle to the process-wide browser.
#[derive(Debug)]
pub struct BrowserSession {
    endpoint: String,
    max_steps: u32,
    lock: Mutex<()>,
}

impl BrowserSession {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            lock: Mutex::new(()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one task. Concurrent callers queue on the session lock.
    pub async fn run(&self, instruction: &str) -> Result<BrowserRun, RelayError> {
        let _guard = self.lock.lock().await;
        info!(instruction, "browser task");

        let resp = shared_client()
            .post(format!("{}/run", self.endpoint))
            .json(&RunRequest {
                task: instruction,
                max_steps: self.max_steps,
            })
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &text));
        }
        Ok(resp.json().await?)
    }
}

/// Turn a finished run into the text handed back to the model.
pub fn describe_run(run: &BrowserRun) -> String {
    let Some(result) = run.final_result.as_deref().filter(|r| !r.trim().is_empty()) else {
        return "The browser attempted the task but got no clear result. \
                Try again with a different instruction."
            .to_string();
    };
    let location = run
        .last_url()
        .unwrap_or_else(|| "unknown".to_string());
    format!("Current location: {location}\nResult: {result}")
}

/// Create the `browse_web` tool bound to `session`.
pub fn browser_tool(session: Arc<BrowserSession>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        BROWSER_TOOL_NAME,
        "Browse the web with a shared browser session and return the result. The \
         session keeps its state (current page, logins) across calls.",
        AgentToolParameters::object()
            .string(
                "instruction",
                "A concrete action for the browser, e.g. 'click the second link on the current page'",
                true,
            )
            .build(),
        move |args, _ctx| {
            let session = session.clone();
            async move {
                let instruction = args.get_str("instruction")?;
                Ok(match session.run(instruction).await {
                    Ok(run) => describe_run(&run),
                    Err(e) => format!("Error: browser session failed. {e}"),
                })
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::arguments::ToolArguments;
    use crate::tools::tool::ToolExecutionContext;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn last_url_prefers_history_then_scans_text() {
        let run = BrowserRun {
            final_result: Some("done".into()),
            urls: vec!["https://a.test".into(), "https://b.test/page".into()],
            extracted: vec![],
        };
        assert_eq!(run.last_url().as_deref(), Some("https://b.test/page"));

        let run = BrowserRun {
            final_result: Some("done".into()),
            urls: vec![],
            extracted: vec![
                "visited https://old.test".into(),
                "now at (https://new.test/x), clicked".into(),
            ],
        };
        assert_eq!(run.last_url().as_deref(), Some("https://new.test/x"));
    }

    #[test]
    fn empty_result_asks_for_retry() {
        let text = describe_run(&BrowserRun::default());
        assert!(text.contains("Try again"));

        let run = BrowserRun {
            final_result: Some("found it".into()),
            ..Default::default()
        };
        assert_eq!(describe_run(&run), "Current location: unknown\nResult: found it");
    }

    #[tokio::test]
    async fn tool_posts_task_to_sidecar() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/run"))
            .and(body_json(json!({"task": "open rust-lang.org", "max_steps": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "final_result": "opened",
                "urls": ["https://www.rust-lang.org/"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tool = browser_tool(Arc::new(BrowserSession::new(server.uri())));
        let out = tool
            .execute(
                &ToolArguments::new(json!({"instruction": "open rust-lang.org"})),
                &ToolExecutionContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(out, "Current location: https://www.rust-lang.org/\nResult: opened");
    }

    #[tokio::test]
    async fn sidecar_failure_is_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("no browser"))
            .mount(&server)
            .await;

        let tool = browser_tool(Arc::new(BrowserSession::new(server.uri())));
        let out = tool
            .execute(&ToolArguments::new(json!({"instruction": "x"})), &ToolExecutionContext::default())
            .await
            .unwrap();
        assert!(out.starts_with("Error: browser session failed."));
    }
}

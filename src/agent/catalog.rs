//! The built-in agents.
//!
//! A static table of definitions, each turned into a [`ToolLoopAgent`] at
//! startup. Building fails (and the router skips the agent) when a model
//! credential or a required collaborator is missing.

use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};

use super::checkpoint::MemoryCheckpointer;
use super::executor::AgentExecutor;
use super::runtime::ToolLoopAgent;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::models::LanguageModel;
use crate::provider::create_provider;
use crate::tools::builtin::{
    browser_tool, glob_search_tool, grep_search_tool, image_analysis_tool, python_tool,
    web_search_tool, BrowserSession, FileSearch, PythonRunner, TavilyClient,
};
use crate::tools::Tool;
use crate::types::GenerationSettings;

/// Model used by the image analysis tool.
pub const VISION_MODEL: &str = "openai:gpt-4o";

/// Which tools an agent gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolset {
    None,
    Multimodal,
    Navigator,
    Coder,
}

/// One entry of the catalog.
#[derive(Clone)]
pub struct AgentDefinition {
    /// Route segment, e.g. `chatbot` in `/chatbot/invoke`.
    pub name: &'static str,
    /// Human-readable label.
    pub tag: &'static str,
    pub model: &'static str,
    pub temperature: Option<f64>,
    pub toolset: Toolset,
    prompt: fn(&str) -> String,
}

impl std::fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("model", &self.model)
            .field("toolset", &self.toolset)
            .finish_non_exhaustive()
    }
}

impl AgentDefinition {
    /// The system prompt for a given date (`YYYY-MM-DD`).
    pub fn system_prompt(&self, today: &str) -> String {
        (self.prompt)(today)
    }
}

/// The four built-in agents, in registration order.
pub fn definitions() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition {
            name: "chatbot",
            tag: "Chatbot",
            model: "openai:gpt-4o",
            temperature: None,
            toolset: Toolset::None,
            prompt: chatbot_prompt,
        },
        AgentDefinition {
            name: "multimodal_agent",
            tag: "Multimodal",
            model: "openai:gpt-4o",
            temperature: None,
            toolset: Toolset::Multimodal,
            prompt: multimodal_prompt,
        },
        AgentDefinition {
            name: "navigator_agent",
            tag: "Web Navigator",
            model: "openai:gpt-4o",
            temperature: None,
            toolset: Toolset::Navigator,
            prompt: navigator_prompt,
        },
        AgentDefinition {
            name: "coder_agent",
            tag: "Coder",
            model: "google:gemini-flash-latest",
            temperature: Some(0.2),
            toolset: Toolset::Coder,
            prompt: coder_prompt,
        },
    ]
}

/// Shared collaborators handed to every definition while building.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub config: RelayConfig,
    /// The process-wide browser, present when a sidecar is configured.
    pub browser: Option<Arc<BrowserSession>>,
}

impl BuildContext {
    pub fn new(config: RelayConfig) -> Self {
        let browser = config
            .browser_url
            .as_deref()
            .map(|url| Arc::new(BrowserSession::new(url)));
        Self { config, browser }
    }
}

impl AgentDefinition {
    /// Build the executor, applying any config override for this agent.
    pub fn build(&self, ctx: &BuildContext) -> Result<Arc<dyn AgentExecutor>, RelayError> {
        let overrides = ctx.config.agent(self.name).cloned().unwrap_or_default();
        if overrides.enabled == Some(false) {
            return Err(RelayError::Configuration(format!(
                "agent '{}' is disabled in the config file",
                self.name
            )));
        }

        let model: LanguageModel = overrides.model.as_deref().unwrap_or(self.model).parse()?;
        let provider = create_provider(&model, &ctx.config)?;
        let tools = self.tools(ctx)?;
        let settings = GenerationSettings {
            temperature: overrides.temperature.or(self.temperature),
            ..Default::default()
        };

        let today = Local::now().format("%Y-%m-%d").to_string();
        let agent = ToolLoopAgent::builder()
            .name(self.name)
            .provider(provider)
            .system_prompt(self.system_prompt(&today))
            .tools(tools)
            .settings(settings)
            .checkpointer(Arc::new(MemoryCheckpointer::new()))
            .tool_timeout(ctx.config.tool_timeout)
            .build();
        info!(agent = self.name, model = %model, tools = ?agent.tool_names(), "agent built");
        Ok(Arc::new(agent))
    }

    fn tools(&self, ctx: &BuildContext) -> Result<Vec<Arc<dyn Tool>>, RelayError> {
        let config = &ctx.config;
        let mut tools = Vec::new();
        match self.toolset {
            Toolset::None => {}
            Toolset::Multimodal => {
                tools.push(vision_tool(config)?);
                tools.extend(search_tool(config, self.name));
            }
            Toolset::Navigator => {
                let session = ctx.browser.clone().ok_or_else(|| {
                    RelayError::Configuration(
                        "BROWSER_AGENT_URL is not set; the navigator needs a browser session".into(),
                    )
                })?;
                tools.push(vision_tool(config)?);
                tools.push(browser_tool(session));
                tools.extend(search_tool(config, self.name));
            }
            Toolset::Coder => {
                std::fs::create_dir_all(&config.artifact_dir)?;
                let search = FileSearch::new(&config.artifact_dir);
                tools.push(python_tool(PythonRunner::new(&config.artifact_dir)));
                tools.push(glob_search_tool(search.clone()));
                tools.push(grep_search_tool(search));
            }
        }
        Ok(tools)
    }
}

fn vision_tool(config: &RelayConfig) -> Result<Arc<dyn Tool>, RelayError> {
    let model: LanguageModel = VISION_MODEL.parse()?;
    Ok(image_analysis_tool(create_provider(&model, config)?))
}

fn search_tool(config: &RelayConfig, agent: &str) -> Option<Arc<dyn Tool>> {
    match config.tavily_api_key.as_deref() {
        Some(key) => Some(web_search_tool(TavilyClient::new(key))),
        None => {
            warn!(agent, "TAVILY_API_KEY is not set; web_search disabled");
            None
        }
    }
}

fn chatbot_prompt(today: &str) -> String {
    format!(
        "You are a friendly AI assistant.\n\
         Give clear, helpful answers to the user's questions.\n\n\
         Today's date: {today}\n"
    )
}

fn multimodal_prompt(today: &str) -> String {
    format!(
        "You are a multimodal agent that understands and works with both text and images.\n\
         Give clear, helpful answers to the user's questions.\n\n\
         ### Available tools\n\
         1. `read_image_and_analyze`: read an image file and analyze its contents.\n\
         2. `web_search`: look up recent information or general knowledge.\n\n\
         ### Image analysis\n\
         - When asked about images during the conversation, you may describe them to the user.\n\
         - Make the analysis detailed or brief depending on what the user asks for.\n\n\
         ### Guidelines\n\
         - Analyze the question and pick the most suitable tool.\n\
         - For requests like \"show me the image\" or \"describe this image\", use the image tool.\n\
         - You can display an image with \"<Render_Image>path/to/image.png</Render_Image>\".\n\
         - Split compound requests into steps and handle them one at a time.\n\n\
         Today's date: {today}\n"
    )
}

fn navigator_prompt(today: &str) -> String {
    format!(
        "You are a Navigator agent. You browse the web on the user's behalf, remember the \
         context of the current page, and carry out multi-step navigation.\n\n\
         [Role and guidelines]\n\
         1. Analyze the request and use read_image_and_analyze, browse_web or web_search as appropriate.\n\
         2. Keep the browser state (current URL, logins) and navigate step by step to find the answer.\n\
         3. When calling the browser, write concrete instructions the browser agent can follow exactly.\n\
         4. Summarize what you found concisely and clearly for the user.\n\n\
         Today's date: {today}\n"
    )
}

fn coder_prompt(today: &str) -> String {
    format!(
        "You are a senior Python developer who can write, analyze and run Python code.\n\n\
         [Role and guidelines]\n\
         1. Use each tool for its purpose:\n   \
            - To read or search files, do not write Python; use the built-in `glob_search` and `grep_search` tools first.\n   \
            - To test new logic or a script, write the code and run it with `execute_python_code`.\n\
         2. Whenever you write code, run it with `execute_python_code` to verify the result.\n\
         3. If the output shows an error, find the cause, fix the code and run it again. Repeat until it succeeds.\n\
         4. When everything is done, give the user a short, clear summary of the solution and the result.\n\n\
         Today's date: {today}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::AgentOverride;
    use crate::models::ProviderKey;

    fn config_with_keys(dir: &std::path::Path) -> RelayConfig {
        let mut config = RelayConfig::new();
        config.set_api_key(ProviderKey::OpenAi, "sk-test".into());
        config.set_api_key(ProviderKey::Google, "g-test".into());
        config.artifact_dir = dir.to_path_buf();
        config
    }

    fn definition(name: &str) -> AgentDefinition {
        definitions().into_iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn catalog_names_are_unique_and_ordered() {
        let names: Vec<&str> = definitions().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["chatbot", "multimodal_agent", "navigator_agent", "coder_agent"]);
    }

    #[test]
    fn prompts_carry_the_date() {
        for def in definitions() {
            assert!(def.system_prompt("2026-01-31").contains("2026-01-31"), "{}", def.name);
        }
    }

    #[test]
    fn navigator_requires_browser() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = BuildContext::new(config_with_keys(dir.path()));
        let err = definition("navigator_agent").build(&ctx).err().unwrap();
        assert!(err.to_string().contains("BROWSER_AGENT_URL"));

        let mut config = config_with_keys(dir.path());
        config.browser_url = Some("http://127.0.0.1:9".into());
        assert!(definition("navigator_agent").build(&BuildContext::new(config)).is_ok());
    }

    #[test]
    fn coder_requires_google_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RelayConfig::new();
        config.artifact_dir = dir.path().to_path_buf();
        let err = definition("coder_agent").build(&BuildContext::new(config)).err().unwrap();
        assert!(matches!(err, RelayError::Authentication(_)));
    }

    #[test]
    fn coder_creates_artifact_dir() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = dir.path().join("code_artifacts");
        let ctx = BuildContext::new(config_with_keys(&artifacts));
        definition("coder_agent").build(&ctx).unwrap();
        assert!(artifacts.is_dir());
    }

    #[test]
    fn disabled_override_skips_agent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_keys(dir.path());
        config.agents.insert(
            "chatbot".into(),
            AgentOverride {
                enabled: Some(false),
                ..Default::default()
            },
        );
        let err = definition("chatbot").build(&BuildContext::new(config)).err().unwrap();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn model_override_must_parse() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_with_keys(dir.path());
        config.agents.insert(
            "chatbot".into(),
            AgentOverride {
                model: Some("gpt-4o".into()),
                ..Default::default()
            },
        );
        let err = definition("chatbot").build(&BuildContext::new(config)).err().unwrap();
        assert!(matches!(err, RelayError::InvalidArgument(_)));
    }
}

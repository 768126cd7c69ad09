//! `execute_python_code`: save a script into the artifact directory and run it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext};
use crate::tools::types::AgentToolParameters;

pub const PYTHON_TOOL_NAME: &str = "execute_python_code";
pub const DEFAULT_SCRIPT_NAME: &str = "generated_script.py";
pub const PYTHON_TIMEOUT: Duration = Duration::from_secs(30);

/// How scripts are launched.
#[derive(Debug, Clone)]
pub struct PythonRunner {
    pub artifact_dir: PathBuf,
    pub interpreter: String,
    pub timeout: Duration,
}

impl PythonRunner {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            interpreter: "python3".to_string(),
            timeout: PYTHON_TIMEOUT,
        }
    }

    /// Write `code` to `filename` (basename only) inside the artifact
    /// directory and run it there. Every outcome is reported as text.
    pub async fn run(&self, code: &str, filename: Option<&str>) -> String {
        let script = safe_file_name(filename);
        let path = self.artifact_dir.join(&script);
        info!(path = %path.display(), "running generated script");

        if let Err(e) = write_script(&self.artifact_dir, &path, code).await {
            return format!("[System Error] Failed to run the code: {e}");
        }

        // kill_on_drop reaps the child when the timeout drops the future.
        let child = tokio::process::Command::new(&self.interpreter)
            .arg(&script)
            .current_dir(&self.artifact_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return format!("[System Error] Failed to run the code: {e}"),
            Err(_) => {
                warn!(path = %path.display(), "generated script timed out");
                return format!(
                    "[Error] Execution exceeded the {} second limit. Fix any infinite loop and try again.",
                    self.timeout.as_secs()
                );
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            text.push_str("\n[Error Output]\n");
            text.push_str(&stderr);
        }
        if text.trim().is_empty() {
            text = "[System] The code ran without errors but printed nothing.".to_string();
        }
        text
    }
}

fn safe_file_name(filename: Option<&str>) -> String {
    filename
        .and_then(|f| Path::new(f).file_name())
        .and_then(|f| f.to_str())
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_SCRIPT_NAME)
        .to_string()
}

async fn write_script(dir: &Path, path: &Path, code: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, code).await
}

/// Create the `execute_python_code` tool.
pub fn python_tool(runner: PythonRunner) -> Arc<dyn Tool> {
    let runner = Arc::new(runner);
    Arc::new(AgentTool::new(
        PYTHON_TOOL_NAME,
        "Save the given Python code to a file, run it, and return stdout and stderr. \
         Use it to test and debug code.",
        AgentToolParameters::object()
            .string("code", "A complete Python script, including all imports", true)
            .string_with_default("filename", "File name to save the script as", DEFAULT_SCRIPT_NAME)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let runner = runner.clone();
            async move {
                let code = args.get_str("code")?;
                Ok(runner.run(code, args.get_str_opt("filename")).await)
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::arguments::ToolArguments;
    use serde_json::json;

    // `sh` stands in for the interpreter so the tests run anywhere.
    fn runner(dir: &Path) -> PythonRunner {
        PythonRunner {
            artifact_dir: dir.to_path_buf(),
            interpreter: "sh".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn file_names_are_reduced_to_their_basename() {
        assert_eq!(safe_file_name(Some("../../etc/evil.py")), "evil.py");
        assert_eq!(safe_file_name(None), DEFAULT_SCRIPT_NAME);
        assert_eq!(safe_file_name(Some("/")), DEFAULT_SCRIPT_NAME);
    }

    #[tokio::test]
    async fn stdout_and_stderr_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let out = runner(dir.path()).run("echo out; echo bad >&2", Some("t.py")).await;
        assert_eq!(out, "out\n\n[Error Output]\nbad\n");
        assert!(dir.path().join("t.py").exists());
    }

    #[tokio::test]
    async fn silent_script_gets_a_notice() {
        let dir = tempfile::tempdir().unwrap();
        let out = runner(dir.path()).run("true", None).await;
        assert!(out.starts_with("[System]"));
        assert!(dir.path().join(DEFAULT_SCRIPT_NAME).exists());
    }

    #[tokio::test]
    async fn runaway_script_is_killed_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner(dir.path());
        runner.timeout = Duration::from_millis(200);
        let out = runner.run("sleep 10", None).await;
        assert!(out.starts_with("[Error] Execution exceeded"));
    }

    #[tokio::test]
    async fn missing_interpreter_is_data_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner(dir.path());
        runner.interpreter = "definitely-not-a-python-binary".into();
        let out = runner.run("print(1)", None).await;
        assert!(out.starts_with("[System Error]"));
    }

    #[tokio::test]
    async fn tool_requires_code_argument() {
        let dir = tempfile::tempdir().unwrap();
        let tool = python_tool(runner(dir.path()));
        let err = tool
            .execute(&ToolArguments::new(json!({})), &ToolExecutionContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("code"));
    }
}

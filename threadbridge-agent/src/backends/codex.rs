// ABOUTME: Codex CLI backend - spawns `codex exec` with --output-last-message.
// ABOUTME: Enforces a wall-clock timeout and reads the final answer from a scratch artifact.

use crate::error::RunError;
use crate::scratch::ScratchFile;
use crate::traits::AssistantBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as ProcessCommand;

const ARTIFACT_PREFIX: &str = "slack-codex-last-";
const ARTIFACT_SUFFIX: &str = ".txt";

/// Configuration for the Codex CLI runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodexConfig {
    /// Command to execute (e.g., "codex" or an absolute path)
    pub command: String,
    /// Passed to the CLI as `-C <dir>`
    pub working_dir: PathBuf,
    /// Optional `-m <model>` hint
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory for output artifacts; defaults to the system temp dir
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    300
}

pub struct CodexRunner {
    config: CodexConfig,
}

impl CodexRunner {
    pub fn new(config: CodexConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodexConfig {
        &self.config
    }

    fn artifact(&self) -> ScratchFile {
        match &self.config.scratch_dir {
            Some(dir) => ScratchFile::in_dir(dir, ARTIFACT_PREFIX, ARTIFACT_SUFFIX),
            None => ScratchFile::new(ARTIFACT_PREFIX, ARTIFACT_SUFFIX),
        }
    }

    fn command(&self, artifact: &ScratchFile, prompt: &str) -> ProcessCommand {
        let mut cmd = ProcessCommand::new(&self.config.command);
        cmd.arg("exec")
            .arg("--skip-git-repo-check")
            .arg("-C")
            .arg(&self.config.working_dir)
            .arg("--output-last-message")
            .arg(artifact.path());
        if let Some(model) = self.config.model.as_deref().filter(|m| !m.is_empty()) {
            cmd.arg("-m").arg(model);
        }
        cmd.arg(prompt);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AssistantBackend for CodexRunner {
    fn name(&self) -> &'static str {
        "codex"
    }

    async fn run(&self, prompt: &str) -> Result<String, RunError> {
        let artifact = self.artifact();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        tracing::debug!(
            command = %self.config.command,
            artifact = %artifact.path().display(),
            prompt_len = prompt.len(),
            "Spawning Codex CLI"
        );

        let child = self.command(&artifact, prompt).spawn().map_err(|e| {
            tracing::warn!(command = %self.config.command, error = %e, "Failed to spawn Codex CLI");
            RunError::Launch(e)
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(RunError::Launch(e)),
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "Codex CLI timed out");
                return Err(RunError::Timeout(timeout));
            }
        };

        let reply = artifact.read_text().await;
        drop(artifact);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let code = output.status.code();
            let message = failure_message(&stderr, &stdout, code);
            tracing::warn!(code = ?code, message = %message, "Codex CLI exited with failure");
            return Err(RunError::Exit { code, message });
        }

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(RunError::EmptyResponse);
        }
        Ok(reply.to_string())
    }
}

/// Pick the diagnostic line for a failed run: the last non-empty line of
/// stderr, then of stdout, then a generic exit-code description.
pub fn failure_message(stderr: &str, stdout: &str, code: Option<i32>) -> String {
    last_non_empty_line(stderr)
        .or_else(|| last_non_empty_line(stdout))
        .map(str::to_string)
        .unwrap_or_else(|| match code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        })
}

fn last_non_empty_line(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

//! Agent abstraction for iteration invocation.
//!
//! The [`AgentRunner`] trait decouples the iteration loop from the actual
//! agent backend (currently the `claude` CLI). Tests use scripted runners
//! that return predetermined invocations without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::io::process::{CommandOutput, run_command_with_timeout};
use crate::session::UsageInfo;

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Prompt text fed to the agent over stdin.
    pub prompt: String,
    /// Provider session to resume, carried across iterations.
    pub resume_session_id: Option<String>,
    /// Maximum time to wait for the agent to complete.
    pub timeout: Duration,
    /// Truncate captured agent output beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Path to write the raw stdout/stderr log.
    pub log_path: PathBuf,
}

/// What one agent invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInvocation {
    /// The agent's final response text.
    pub output: String,
    /// Provider-reported outcome label, e.g. `success`.
    pub status: Option<String>,
    pub success: bool,
    pub usage: Option<UsageInfo>,
    /// Provider session id, used to resume the conversation next iteration.
    pub sdk_session_id: Option<String>,
}

/// Abstraction over agent execution backends.
pub trait AgentRunner {
    fn invoke(&self, request: &AgentRequest) -> Result<AgentInvocation>;
}

/// Agent that spawns the `claude` CLI in print mode.
pub struct ClaudeAgent {
    binary: String,
}

impl ClaudeAgent {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl AgentRunner for ClaudeAgent {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs(), resuming = request.resume_session_id.is_some()))]
    fn invoke(&self, request: &AgentRequest) -> Result<AgentInvocation> {
        info!(workdir = %request.workdir.display(), "starting agent");

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p")
            .args(["--output-format", "json"])
            .args(["--allowedTools", "Edit", "Bash"]);
        if let Some(session_id) = &request.resume_session_id {
            cmd.args(["--resume", session_id]);
        }
        cmd.current_dir(&request.workdir);

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .with_context(|| format!("run agent {}", self.binary))?;

        write_agent_log(&request.log_path, &output)?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "agent timed out"
            );
            return Err(anyhow!("agent timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent exited non-zero");
        }

        Ok(parse_cli_output(
            &output.stdout_lossy(),
            output.status.success(),
        ))
    }
}

/// Result envelope the CLI prints with `--output-format json`.
#[derive(Debug, Deserialize)]
struct CliResult {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    total_cost_usd: Option<f64>,
    #[serde(default)]
    usage: Option<CliUsage>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CliUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
}

/// Map the CLI's result JSON into an invocation. Output that is not the
/// expected envelope is kept verbatim rather than rejected, so a
/// misconfigured agent still leaves a usable record.
fn parse_cli_output(stdout: &str, exit_success: bool) -> AgentInvocation {
    match serde_json::from_str::<CliResult>(stdout) {
        Ok(cli) => {
            let usage = build_usage(&cli);
            debug!(cost = ?cli.total_cost_usd, status = ?cli.subtype, "parsed agent result");
            AgentInvocation {
                output: cli.result.unwrap_or_default(),
                status: cli.subtype,
                success: exit_success && !cli.is_error,
                usage,
                sdk_session_id: cli.session_id,
            }
        }
        Err(err) => {
            warn!(error = %err, "agent output is not result JSON, keeping raw text");
            AgentInvocation {
                output: stdout.to_string(),
                status: None,
                success: exit_success,
                usage: None,
                sdk_session_id: None,
            }
        }
    }
}

fn build_usage(cli: &CliResult) -> Option<UsageInfo> {
    if cli.usage.is_none() && cli.total_cost_usd.is_none() {
        return None;
    }
    let tokens = cli.usage.as_ref();
    Some(UsageInfo {
        input_tokens: tokens.map_or(0, |u| u.input_tokens),
        output_tokens: tokens.map_or(0, |u| u.output_tokens),
        total_cost_usd: cli.total_cost_usd.unwrap_or(0.0),
        cache_read_input_tokens: tokens.and_then(|u| u.cache_read_input_tokens),
        cache_creation_input_tokens: tokens.and_then(|u| u.cache_creation_input_tokens),
    })
}

fn write_agent_log(path: &Path, output: &CommandOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create agent log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&output.stdout_lossy());
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&output.stderr_lossy());
    buf.push_str(&output.truncation_notice());
    if output.timed_out {
        buf.push_str("\n[agent timed out]\n");
    }
    fs::write(path, buf).with_context(|| format!("write agent log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_result_envelope() {
        let json = r#"{
            "result": "implemented the parser",
            "is_error": false,
            "total_cost_usd": 0.42,
            "usage": {"input_tokens": 100, "output_tokens": 50, "cache_read_input_tokens": 10},
            "session_id": "sess-1",
            "subtype": "success"
        }"#;
        let invocation = parse_cli_output(json, true);
        assert!(invocation.success);
        assert_eq!(invocation.output, "implemented the parser");
        assert_eq!(invocation.status.as_deref(), Some("success"));
        assert_eq!(invocation.sdk_session_id.as_deref(), Some("sess-1"));
        let usage = invocation.usage.expect("usage");
        assert_eq!(usage.input_tokens, 100);
        assert_eq!(usage.cache_read_input_tokens, Some(10));
        assert_eq!(usage.total_cost_usd, 0.42);
    }

    #[test]
    fn is_error_overrides_a_clean_exit() {
        let json = r#"{"result": "refused", "is_error": true}"#;
        let invocation = parse_cli_output(json, true);
        assert!(!invocation.success);
        assert_eq!(invocation.output, "refused");
    }

    #[test]
    fn cost_without_token_counts_still_yields_usage() {
        let json = r#"{"result": "ok", "total_cost_usd": 1.5}"#;
        let invocation = parse_cli_output(json, true);
        let usage = invocation.usage.expect("usage");
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.total_cost_usd, 1.5);
    }

    #[test]
    fn non_json_output_is_kept_verbatim() {
        let invocation = parse_cli_output("plain text, no envelope", true);
        assert!(invocation.success);
        assert_eq!(invocation.output, "plain text, no envelope");
        assert!(invocation.usage.is_none());
        assert!(invocation.sdk_session_id.is_none());
    }

    #[test]
    fn missing_binary_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let agent = ClaudeAgent::new("looper-no-such-binary");
        let request = AgentRequest {
            workdir: temp.path().to_path_buf(),
            prompt: "hi".to_string(),
            resume_session_id: None,
            timeout: Duration::from_secs(5),
            output_limit_bytes: 1000,
            log_path: temp.path().join("agent.log"),
        };
        assert!(agent.invoke(&request).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn invokes_a_script_and_writes_the_log() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("fake-agent.sh");
        fs::write(
            &script,
            concat!(
                "#!/bin/sh\n",
                "cat >/dev/null\n",
                "printf '%s' '{\"result\":\"done\",\"total_cost_usd\":0.25,",
                "\"session_id\":\"s1\",\"subtype\":\"success\",",
                "\"usage\":{\"input_tokens\":5,\"output_tokens\":7}}'\n",
            ),
        )
        .expect("write script");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

        let agent = ClaudeAgent::new(script.display().to_string());
        let request = AgentRequest {
            workdir: temp.path().to_path_buf(),
            prompt: "work".to_string(),
            resume_session_id: None,
            timeout: Duration::from_secs(10),
            output_limit_bytes: 100_000,
            log_path: temp.path().join("agent.log"),
        };
        let invocation = agent.invoke(&request).expect("invoke");
        assert!(invocation.success);
        assert_eq!(invocation.output, "done");
        assert_eq!(invocation.sdk_session_id.as_deref(), Some("s1"));
        assert_eq!(invocation.usage.expect("usage").total_cost_usd, 0.25);

        let log = fs::read_to_string(temp.path().join("agent.log")).expect("read log");
        assert!(log.contains("=== stdout ==="));
        assert!(log.contains("\"result\":\"done\""));
    }
}

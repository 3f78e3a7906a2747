//! Test-only helpers: scripted agent backends and disposable projects.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::io::agent::{AgentInvocation, AgentRequest, AgentRunner};
use crate::io::init::LooperPaths;
use crate::session::UsageInfo;

/// Agent that replays a fixed sequence of invocations without spawning
/// processes, recording every request it sees.
pub struct ScriptedAgent {
    script: RefCell<VecDeque<AgentInvocation>>,
    requests: RefCell<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    pub fn new(invocations: Vec<AgentInvocation>) -> Self {
        Self {
            script: RefCell::new(invocations.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Requests seen so far, for asserting prompts and resume ids.
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.borrow().clone()
    }
}

impl AgentRunner for ScriptedAgent {
    fn invoke(&self, request: &AgentRequest) -> Result<AgentInvocation> {
        self.requests.borrow_mut().push(request.clone());
        self.script
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted agent ran out of invocations"))
    }
}

/// Successful invocation with the given output and optional cost.
pub fn invocation(output: &str, cost: Option<f64>) -> AgentInvocation {
    AgentInvocation {
        output: output.to_string(),
        status: Some("success".to_string()),
        success: true,
        usage: cost.map(usage),
        sdk_session_id: None,
    }
}

/// Usage with the given cost and small fixed token counts.
pub fn usage(cost: f64) -> UsageInfo {
    UsageInfo {
        input_tokens: 100,
        output_tokens: 50,
        total_cost_usd: cost,
        cache_read_input_tokens: None,
        cache_creation_input_tokens: None,
    }
}

/// Disposable project directory with an initialized git repository and one
/// seed commit.
pub struct TestProject {
    temp: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        let root = temp.path();
        git(root, &["init"])?;
        git(root, &["config", "user.email", "test@example.com"])?;
        git(root, &["config", "user.name", "test"])?;
        git(root, &["config", "commit.gpgsign", "false"])?;
        fs::write(root.join("README.md"), "# test project\n").context("write README")?;
        git(root, &["add", "."])?;
        git(root, &["commit", "-m", "initial commit"])?;
        git(root, &["branch", "-M", "main"])?;
        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> LooperPaths {
        LooperPaths::new(self.root())
    }

    pub fn write_prd(&self, contents: &str) -> Result<()> {
        fs::write(self.root().join("PRD.md"), contents)
            .context("write task document")
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        git(self.root(), &["add", "."])?;
        git(self.root(), &["commit", "-m", message])
    }
}

fn git(dir: &Path, args: &[&str]) -> Result<()> {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !status.success() {
        return Err(anyhow!("git {} failed in test setup", args.join(" ")));
    }
    Ok(())
}

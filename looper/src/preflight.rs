//! Environment preflight before a session starts.
//!
//! Each check walks Pending -> Checking -> terminal (Passed, Failed, or
//! Warning). Warnings never block a run. A missing credential is the one
//! remediable failure: the caller can supply it and flip that check with
//! [`Preflight::mark_passed`] instead of re-running everything.
//!
//! The [`PreflightProbe`] trait separates the check sequencing from how the
//! environment is actually inspected, so tests drive the engine with
//! scripted probes.

use std::path::PathBuf;
use std::process::Command;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::tasks;
use crate::io::config::LooperConfig;
use crate::io::git::GitInfo;
use crate::io::prd::read_task_document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pending,
    Checking,
    Passed,
    Failed,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    AgentBinary,
    Credential,
    GitRepository,
    TaskDocument,
    Instructions,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::AgentBinary,
        CheckKind::Credential,
        CheckKind::GitRepository,
        CheckKind::TaskDocument,
        CheckKind::Instructions,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CheckKind::AgentBinary => "agent binary",
            CheckKind::Credential => "credential",
            CheckKind::GitRepository => "git repository",
            CheckKind::TaskDocument => "task document",
            CheckKind::Instructions => "instructions file",
        }
    }

    fn index(self) -> usize {
        match self {
            CheckKind::AgentBinary => 0,
            CheckKind::Credential => 1,
            CheckKind::GitRepository => 2,
            CheckKind::TaskDocument => 3,
            CheckKind::Instructions => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreflightCheck {
    pub kind: CheckKind,
    pub status: CheckStatus,
    pub message: Option<String>,
}

/// How the caller should proceed after a preflight run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightOutcome {
    Ready,
    /// Only the credential check failed; supplying one unblocks the run.
    CredentialRequired,
    Fatal,
}

/// How the environment is inspected, one method per check.
pub trait PreflightProbe {
    /// Agent version string when the binary responds, `None` otherwise.
    fn agent_version(&self) -> Option<String>;
    fn credential_present(&self) -> bool;
    fn git_branch(&self) -> Option<String>;
    /// Task document contents, `None` when the file is missing.
    fn task_document(&self) -> Result<Option<String>>;
    fn instructions_present(&self) -> bool;
}

pub struct Preflight {
    checks: Vec<PreflightCheck>,
    has_actionable_tasks: Option<bool>,
}

impl Preflight {
    pub fn new() -> Self {
        Self {
            checks: CheckKind::ALL
                .into_iter()
                .map(|kind| PreflightCheck {
                    kind,
                    status: CheckStatus::Pending,
                    message: None,
                })
                .collect(),
            has_actionable_tasks: None,
        }
    }

    /// Run every check in order. Probe errors abort the sequence.
    #[instrument(skip_all)]
    pub fn run(&mut self, probe: &impl PreflightProbe) -> Result<()> {
        for kind in CheckKind::ALL {
            self.set(kind, CheckStatus::Checking, None);
            let (status, message) = self.evaluate(kind, probe)?;
            debug!(check = kind.label(), ?status, "preflight check finished");
            self.set(kind, status, message);
        }
        Ok(())
    }

    fn evaluate(
        &mut self,
        kind: CheckKind,
        probe: &impl PreflightProbe,
    ) -> Result<(CheckStatus, Option<String>)> {
        Ok(match kind {
            CheckKind::AgentBinary => match probe.agent_version() {
                Some(version) => (CheckStatus::Passed, Some(version)),
                None => (
                    CheckStatus::Failed,
                    Some("not found on PATH".to_string()),
                ),
            },
            CheckKind::Credential => {
                if probe.credential_present() {
                    (CheckStatus::Passed, None)
                } else {
                    (CheckStatus::Failed, Some("credential missing".to_string()))
                }
            }
            CheckKind::GitRepository => match probe.git_branch() {
                Some(branch) => (CheckStatus::Passed, Some(format!("on branch {branch}"))),
                None => (
                    CheckStatus::Warning,
                    Some("not a git repository, history will be limited".to_string()),
                ),
            },
            CheckKind::TaskDocument => match probe.task_document()? {
                None => {
                    self.has_actionable_tasks = Some(false);
                    (
                        CheckStatus::Failed,
                        Some("missing (run `looper init`)".to_string()),
                    )
                }
                Some(document) => {
                    let open = tasks::extract_tasks(&document)
                        .iter()
                        .filter(|task| !task.completed)
                        .count();
                    let actionable = tasks::has_tasks(&document);
                    self.has_actionable_tasks = Some(actionable);
                    if actionable {
                        (CheckStatus::Passed, Some(format!("{open} open tasks")))
                    } else {
                        (
                            CheckStatus::Warning,
                            Some("no actionable tasks".to_string()),
                        )
                    }
                }
            },
            CheckKind::Instructions => {
                if probe.instructions_present() {
                    (CheckStatus::Passed, None)
                } else {
                    (
                        CheckStatus::Warning,
                        Some("instructions file missing".to_string()),
                    )
                }
            }
        })
    }

    /// Flip one check to passed without re-running the others. Used when
    /// the caller remediates a failure in place, e.g. by supplying a
    /// credential.
    pub fn mark_passed(&mut self, kind: CheckKind) {
        self.set(kind, CheckStatus::Passed, None);
    }

    /// True once no check is failed or still running.
    pub fn all_passed(&self) -> bool {
        self.checks
            .iter()
            .all(|check| matches!(check.status, CheckStatus::Passed | CheckStatus::Warning))
    }

    pub fn outcome(&self) -> PreflightOutcome {
        let mut credential_failed = false;
        for check in &self.checks {
            if check.status != CheckStatus::Failed {
                continue;
            }
            if check.kind == CheckKind::Credential {
                credential_failed = true;
            } else {
                return PreflightOutcome::Fatal;
            }
        }
        if credential_failed {
            PreflightOutcome::CredentialRequired
        } else {
            PreflightOutcome::Ready
        }
    }

    /// Whether the task document held actionable work, once checked.
    pub fn has_actionable_tasks(&self) -> Option<bool> {
        self.has_actionable_tasks
    }

    pub fn checks(&self) -> &[PreflightCheck] {
        &self.checks
    }

    fn set(&mut self, kind: CheckKind, status: CheckStatus, message: Option<String>) {
        let check = &mut self.checks[kind.index()];
        check.status = status;
        check.message = message;
    }
}

impl Default for Preflight {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe backed by the real environment: subprocesses, env vars, files.
pub struct EnvProbe {
    root: PathBuf,
    config: LooperConfig,
}

impl EnvProbe {
    pub fn new(root: impl Into<PathBuf>, config: LooperConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }
}

impl PreflightProbe for EnvProbe {
    fn agent_version(&self) -> Option<String> {
        let output = Command::new(&self.config.agent_binary)
            .arg("--version")
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let line = text.lines().next()?.trim();
        if line.is_empty() { None } else { Some(line.to_string()) }
    }

    fn credential_present(&self) -> bool {
        std::env::var(&self.config.credential_env).is_ok_and(|value| !value.trim().is_empty())
    }

    fn git_branch(&self) -> Option<String> {
        GitInfo::new(&self.root).current_branch()
    }

    fn task_document(&self) -> Result<Option<String>> {
        read_task_document(&self.root.join(&self.config.prd_path))
    }

    fn instructions_present(&self) -> bool {
        self.root.join(&self.config.instructions_path).exists()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct ScriptedProbe {
        version: Option<String>,
        credential: bool,
        branch: Option<String>,
        document: Option<String>,
        instructions: bool,
        document_reads: Cell<u32>,
    }

    impl ScriptedProbe {
        fn healthy() -> Self {
            Self {
                version: Some("2.1.0".to_string()),
                credential: true,
                branch: Some("main".to_string()),
                document: Some("### Phase 1\n[ ] build the thing\n".to_string()),
                instructions: true,
                document_reads: Cell::new(0),
            }
        }
    }

    impl PreflightProbe for ScriptedProbe {
        fn agent_version(&self) -> Option<String> {
            self.version.clone()
        }

        fn credential_present(&self) -> bool {
            self.credential
        }

        fn git_branch(&self) -> Option<String> {
            self.branch.clone()
        }

        fn task_document(&self) -> Result<Option<String>> {
            self.document_reads.set(self.document_reads.get() + 1);
            Ok(self.document.clone())
        }

        fn instructions_present(&self) -> bool {
            self.instructions
        }
    }

    #[test]
    fn healthy_project_is_ready() {
        let mut preflight = Preflight::new();
        preflight.run(&ScriptedProbe::healthy()).expect("run");

        assert!(preflight.all_passed());
        assert_eq!(preflight.outcome(), PreflightOutcome::Ready);
        assert_eq!(preflight.has_actionable_tasks(), Some(true));

        let checks = preflight.checks();
        let kinds: Vec<CheckKind> = checks.iter().map(|check| check.kind).collect();
        assert_eq!(kinds, CheckKind::ALL);
        let doc_check = &checks[CheckKind::TaskDocument.index()];
        assert_eq!(doc_check.message.as_deref(), Some("1 open tasks"));
    }

    #[test]
    fn missing_agent_binary_is_fatal() {
        let mut probe = ScriptedProbe::healthy();
        probe.version = None;
        let mut preflight = Preflight::new();
        preflight.run(&probe).expect("run");

        assert!(!preflight.all_passed());
        assert_eq!(preflight.outcome(), PreflightOutcome::Fatal);
    }

    /// A supplied credential flips its check without re-probing anything.
    #[test]
    fn credential_failure_is_remediable_in_place() {
        let mut probe = ScriptedProbe::healthy();
        probe.credential = false;
        let mut preflight = Preflight::new();
        preflight.run(&probe).expect("run");

        assert_eq!(preflight.outcome(), PreflightOutcome::CredentialRequired);
        assert!(!preflight.all_passed());
        assert_eq!(probe.document_reads.get(), 1);

        preflight.mark_passed(CheckKind::Credential);

        assert!(preflight.all_passed());
        assert_eq!(preflight.outcome(), PreflightOutcome::Ready);
        assert_eq!(probe.document_reads.get(), 1);
    }

    #[test]
    fn missing_repository_only_warns() {
        let mut probe = ScriptedProbe::healthy();
        probe.branch = None;
        let mut preflight = Preflight::new();
        preflight.run(&probe).expect("run");

        assert!(preflight.all_passed());
        assert_eq!(preflight.outcome(), PreflightOutcome::Ready);
        let status = preflight.checks()[CheckKind::GitRepository.index()].status;
        assert_eq!(status, CheckStatus::Warning);
    }

    #[test]
    fn document_without_open_work_warns() {
        let mut probe = ScriptedProbe::healthy();
        probe.document = Some("# Tasks\n\nnothing actionable yet\n".to_string());
        let mut preflight = Preflight::new();
        preflight.run(&probe).expect("run");

        assert_eq!(preflight.outcome(), PreflightOutcome::Ready);
        assert_eq!(preflight.has_actionable_tasks(), Some(false));
        let status = preflight.checks()[CheckKind::TaskDocument.index()].status;
        assert_eq!(status, CheckStatus::Warning);
    }

    #[test]
    fn missing_document_is_fatal() {
        let mut probe = ScriptedProbe::healthy();
        probe.document = None;
        let mut preflight = Preflight::new();
        preflight.run(&probe).expect("run");

        assert_eq!(preflight.outcome(), PreflightOutcome::Fatal);
        assert_eq!(preflight.has_actionable_tasks(), Some(false));
    }
}

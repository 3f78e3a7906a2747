//! Session status reporting for `looper status`.

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::io::git::{CommitInfo, DiffStat, GitInfo};
use crate::io::init::LooperPaths;
use crate::io::session_store::load_session;

/// Everything `looper status` shows about the current session.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub session_id: String,
    pub branch: String,
    pub started_at: DateTime<Utc>,
    pub start_commit: String,
    pub iterations_recorded: usize,
    pub last_checkpoint: Option<u32>,
    pub total_cost_usd: Option<f64>,
    pub diff: Vec<DiffStat>,
    pub commits: Vec<CommitInfo>,
}

/// Build the status report, or `None` when no session exists.
///
/// Git details degrade to empty lists when the start commit is unknown or
/// no longer resolvable; the session summary is still reported.
pub fn build_status(root: &Path) -> Result<Option<StatusReport>> {
    let paths = LooperPaths::new(root);
    let Some(session) = load_session(&paths.state_dir)? else {
        return Ok(None);
    };

    let git = GitInfo::new(root);
    let (diff, commits) = if session.start_commit.is_empty() || session.start_commit == "unknown" {
        (Vec::new(), Vec::new())
    } else {
        let diff = git.diff_stats(&session.start_commit).unwrap_or_else(|err| {
            warn!(error = %err, "diff unavailable");
            Vec::new()
        });
        let commits = git
            .commits_since(&session.start_commit)
            .unwrap_or_else(|err| {
                warn!(error = %err, "commit list unavailable");
                Vec::new()
            });
        (diff, commits)
    };

    Ok(Some(StatusReport {
        session_id: session.id,
        branch: session.branch,
        started_at: session.started_at,
        start_commit: session.start_commit,
        iterations_recorded: session.iterations.len(),
        last_checkpoint: session.checkpoint.map(|checkpoint| checkpoint.iteration),
        total_cost_usd: session.total_cost_usd,
        diff,
        commits,
    }))
}

impl StatusReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("session {} on {}\n", self.session_id, self.branch));
        out.push_str(&format!(
            "started {}\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        match self.last_checkpoint {
            Some(iteration) => out.push_str(&format!(
                "iterations recorded: {} (checkpoint at {iteration})\n",
                self.iterations_recorded
            )),
            None => out.push_str(&format!(
                "iterations recorded: {} (no checkpoint)\n",
                self.iterations_recorded
            )),
        }
        if let Some(cost) = self.total_cost_usd {
            out.push_str(&format!("total cost: ${cost:.2}\n"));
        }
        if !self.diff.is_empty() {
            out.push_str(&format!("changes since {}:\n", self.start_commit));
            for stat in &self.diff {
                out.push_str(&format!(
                    "  {} {} (+{} -{})\n",
                    stat.status, stat.file, stat.additions, stat.deletions
                ));
            }
        }
        if !self.commits.is_empty() {
            out.push_str("commits:\n");
            for commit in &self.commits {
                out.push_str(&format!("  {} {}\n", commit.short_sha, commit.message));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::io::session_store::{create_session, save_session};
    use crate::test_support::TestProject;

    #[test]
    fn no_session_means_no_report() {
        let project = TestProject::new().expect("project");
        assert!(build_status(project.root()).expect("status").is_none());
    }

    #[test]
    fn reports_session_summary_with_git_details() {
        let project = TestProject::new().expect("project");
        let git = GitInfo::new(project.root());
        let session = create_session(&git, None);
        save_session(&project.paths().state_dir, &session).expect("save");

        fs::write(project.root().join("README.md"), "# test project\n\nmore\n")
            .expect("edit file");
        project.commit_all("docs: expand readme").expect("commit");

        let report = build_status(project.root())
            .expect("status")
            .expect("some");
        assert_eq!(report.branch, "main");
        assert_eq!(report.iterations_recorded, 0);
        assert_eq!(report.commits.len(), 1);
        assert_eq!(report.commits[0].message, "docs: expand readme");
        assert_eq!(report.diff.len(), 1);
        assert_eq!(report.diff[0].file, "README.md");

        let rendered = report.render();
        assert!(rendered.contains("on main"));
        assert!(rendered.contains("README.md"));
        assert!(rendered.contains("docs: expand readme"));
    }

    #[test]
    fn unknown_start_commit_skips_git_details() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = GitInfo::new(temp.path());
        let session = create_session(&git, None);
        let paths = LooperPaths::new(temp.path());
        save_session(&paths.state_dir, &session).expect("save");

        let report = build_status(temp.path()).expect("status").expect("some");
        assert_eq!(report.start_commit, "unknown");
        assert!(report.diff.is_empty());
        assert!(report.commits.is_empty());
        assert_eq!(report.branch, "unknown");
    }
}

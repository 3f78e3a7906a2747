//! Git information provider.
//!
//! The engine never mutates the repository; it only reads branch, commit,
//! and change information, so we keep a small explicit wrapper around `git`
//! subprocess calls. Branch and commit lookups swallow failures (missing
//! binary, not a repository, unborn HEAD) into `None` because callers treat
//! those states as "unknown" rather than as errors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// One changed file since a given commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffStat {
    pub file: String,
    /// Single-letter change status: M, A, D, R, C, or U.
    pub status: String,
    pub additions: u32,
    pub deletions: u32,
}

/// One commit reachable from HEAD but not from the given commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub short_sha: String,
    pub message: String,
    pub author: String,
    /// Author date in strict ISO 8601.
    pub timestamp: String,
}

/// Wrapper for reading git state from a working directory.
#[derive(Debug, Clone)]
pub struct GitInfo {
    workdir: PathBuf,
}

impl GitInfo {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Current branch name, or `None` outside a repository, on an unborn
    /// HEAD, or in detached-HEAD state.
    pub fn current_branch(&self) -> Option<String> {
        let name = self.capture_ok(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if name == "HEAD" {
            debug!("detached HEAD, no branch name");
            return None;
        }
        Some(name)
    }

    /// Full HEAD commit hash, or `None` when there is no commit to name.
    pub fn current_commit(&self) -> Option<String> {
        self.capture_ok(&["rev-parse", "HEAD"])
    }

    /// Per-file change statistics between `since` and the working tree.
    #[instrument(skip_all, fields(since))]
    pub fn diff_stats(&self, since: &str) -> Result<Vec<DiffStat>> {
        let numstat = self.run_capture(&["diff", "--numstat", since])?;
        let name_status = self.run_capture(&["diff", "--name-status", since])?;

        let mut status_by_file = HashMap::new();
        for line in name_status.lines().filter(|line| !line.trim().is_empty()) {
            let (file, status) = parse_name_status_line(line)?;
            status_by_file.insert(file, status);
        }

        let mut stats = Vec::new();
        for line in numstat.lines().filter(|line| !line.trim().is_empty()) {
            let (additions, deletions, file) = parse_numstat_line(line)?;
            let status = status_by_file
                .get(&file)
                .cloned()
                .unwrap_or_else(|| "M".to_string());
            stats.push(DiffStat {
                file,
                status,
                additions,
                deletions,
            });
        }
        debug!(files = stats.len(), "collected diff stats");
        Ok(stats)
    }

    /// Commits on HEAD that are not reachable from `since`, newest first.
    #[instrument(skip_all, fields(since))]
    pub fn commits_since(&self, since: &str) -> Result<Vec<CommitInfo>> {
        let range = format!("{since}..HEAD");
        // Subject goes last so embedded tabs cannot break the field split.
        let out = self.run_capture(&["log", "--format=%H%x09%h%x09%an%x09%aI%x09%s", &range])?;
        let mut commits = Vec::new();
        for line in out.lines().filter(|line| !line.trim().is_empty()) {
            commits.push(parse_log_line(line)?);
        }
        debug!(commits = commits.len(), "collected commits");
        Ok(commits)
    }

    /// Capture trimmed stdout, mapping any failure to `None`.
    fn capture_ok(&self, args: &[&str]) -> Option<String> {
        let output = self.run(args).ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn parse_numstat_line(line: &str) -> Result<(u32, u32, String)> {
    let mut fields = line.splitn(3, '\t');
    let additions = fields
        .next()
        .ok_or_else(|| anyhow!("unexpected numstat line: '{line}'"))?;
    let deletions = fields
        .next()
        .ok_or_else(|| anyhow!("unexpected numstat line: '{line}'"))?;
    let raw_path = fields
        .next()
        .ok_or_else(|| anyhow!("unexpected numstat line: '{line}'"))?;
    Ok((
        parse_count(additions)?,
        parse_count(deletions)?,
        rename_target(raw_path.trim()),
    ))
}

/// Binary files report `-` instead of a number.
fn parse_count(field: &str) -> Result<u32> {
    if field == "-" {
        return Ok(0);
    }
    field
        .parse()
        .with_context(|| format!("parse numstat count '{field}'"))
}

fn parse_name_status_line(line: &str) -> Result<(String, String)> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 2 {
        return Err(anyhow!("unexpected name-status line: '{line}'"));
    }
    let status = fields[0]
        .chars()
        .next()
        .ok_or_else(|| anyhow!("empty status in line: '{line}'"))?;
    // Renames and copies list old then new; the new path is authoritative.
    let file = fields[fields.len() - 1].trim().to_string();
    Ok((file, status.to_string()))
}

fn parse_log_line(line: &str) -> Result<CommitInfo> {
    let fields: Vec<&str> = line.splitn(5, '\t').collect();
    if fields.len() != 5 {
        return Err(anyhow!("unexpected log line: '{line}'"));
    }
    Ok(CommitInfo {
        sha: fields[0].to_string(),
        short_sha: fields[1].to_string(),
        author: fields[2].to_string(),
        timestamp: fields[3].to_string(),
        message: fields[4].to_string(),
    })
}

/// Resolve a numstat rename path (`src/{old.rs => new.rs}` or `old => new`)
/// to the new path.
fn rename_target(raw: &str) -> String {
    if let (Some(open), Some(close)) = (raw.find('{'), raw.rfind('}'))
        && open < close
        && let Some((_, target)) = raw[open + 1..close].split_once(" => ")
    {
        let mut path = String::new();
        path.push_str(&raw[..open]);
        path.push_str(target);
        path.push_str(&raw[close + 1..]);
        return path.replace("//", "/");
    }
    if let Some((_, target)) = raw.split_once(" => ") {
        return target.to_string();
    }
    raw.to_string()
}

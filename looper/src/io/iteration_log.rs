//! Per-iteration artifacts.
//!
//! Every completed iteration leaves a directory of files under
//! `.looper/iterations/<session-id>/<n>/` so a run can be inspected after
//! the fact without raising the log level: the exact prompt sent, the
//! agent's output, the structured result, and the raw agent log.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::session::IterationResult;

/// Canonical file locations for one iteration's artifacts.
#[derive(Debug, Clone)]
pub struct IterationPaths {
    pub dir: PathBuf,
}

impl IterationPaths {
    pub fn new(iterations_dir: &Path, session_id: &str, iteration: u32) -> Self {
        Self {
            dir: iterations_dir.join(session_id).join(iteration.to_string()),
        }
    }

    pub fn prompt_path(&self) -> PathBuf {
        self.dir.join("prompt.md")
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.join("output.txt")
    }

    pub fn result_path(&self) -> PathBuf {
        self.dir.join("result.json")
    }

    pub fn agent_log_path(&self) -> PathBuf {
        self.dir.join("agent.log")
    }
}

pub struct IterationWriteRequest<'a> {
    pub iterations_dir: &'a Path,
    pub session_id: &'a str,
    pub iteration: u32,
    pub prompt: &'a str,
    pub output: &'a str,
    pub result: &'a IterationResult,
}

pub fn write_iteration(request: &IterationWriteRequest<'_>) -> Result<IterationPaths> {
    let paths = IterationPaths::new(request.iterations_dir, request.session_id, request.iteration);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create iteration directory {}", paths.dir.display()))?;
    write_text(&paths.prompt_path(), request.prompt)?;
    write_text(&paths.output_path(), request.output)?;
    write_json(&paths.result_path(), request.result)?;
    Ok(paths)
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("write {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    write_text(path, &format!("{json}\n"))
}

//! Session persistence.
//!
//! A session lives in a single `session.json` under the state directory.
//! Reads are lenient: a missing or unreadable-as-JSON file means "no
//! session" so a corrupted file never wedges the engine. Writes always go
//! through a temp file and an atomic rename so a crash mid-write leaves
//! either the old file or the new one, never a torn mix.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::io::git::GitInfo;
use crate::session::{Checkpoint, IterationResult, Session};

const SESSION_FILE: &str = "session.json";
const UNKNOWN: &str = "unknown";

pub fn session_path(state_dir: &Path) -> PathBuf {
    state_dir.join(SESSION_FILE)
}

/// Load the persisted session, if a valid one exists.
///
/// Returns `Ok(None)` when the file is missing, is not valid JSON, or lacks
/// the identity fields a session needs to be resumed. I/O failures other
/// than absence still propagate.
#[instrument(skip_all)]
pub fn load_session(state_dir: &Path) -> Result<Option<Session>> {
    let path = session_path(state_dir);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no session file");
            return Ok(None);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read session {}", path.display()));
        }
    };

    // `reset_session` leaves an empty object behind; that is the normal
    // cleared state, not corruption.
    let trimmed = content.trim();
    if trimmed.is_empty() || trimmed == "{}" {
        debug!(path = %path.display(), "session file is empty");
        return Ok(None);
    }

    match serde_json::from_str::<Session>(&content) {
        Ok(session) if session.id.is_empty() || session.branch.is_empty() => {
            warn!(path = %path.display(), "session file lacks identity fields, starting fresh");
            Ok(None)
        }
        Ok(session) => Ok(Some(session)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "session file unreadable, starting fresh");
            Ok(None)
        }
    }
}

/// Build a new session from the current repository state.
///
/// Branch and commit fall back to `"unknown"` when git cannot answer, so a
/// session can start outside a repository.
pub fn create_session(git: &GitInfo, branch: Option<String>) -> Session {
    Session {
        id: Uuid::new_v4().to_string(),
        started_at: Utc::now(),
        start_commit: git.current_commit().unwrap_or_else(|| UNKNOWN.to_string()),
        branch: branch
            .or_else(|| git.current_branch())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        iterations: Vec::new(),
        checkpoint: None,
        sdk_session_id: None,
        total_cost_usd: None,
    }
}

pub fn save_session(state_dir: &Path, session: &Session) -> Result<()> {
    let json = serde_json::to_string_pretty(session).context("serialize session")?;
    write_atomic(&session_path(state_dir), &format!("{json}\n"))
}

/// Record that `iteration` finished, so a later run can pick up after it.
pub fn checkpoint_session(
    state_dir: &Path,
    session: &mut Session,
    iteration: u32,
    git: &GitInfo,
) -> Result<()> {
    session.checkpoint = Some(Checkpoint {
        iteration,
        timestamp: Utc::now(),
        commit: git.current_commit().unwrap_or_else(|| UNKNOWN.to_string()),
    });
    save_session(state_dir, session)
}

/// Append a completed iteration and persist immediately.
pub fn append_iteration(
    state_dir: &Path,
    mut session: Session,
    result: IterationResult,
) -> Result<Session> {
    session.iterations.push(result);
    save_session(state_dir, &session)?;
    Ok(session)
}

/// Load the session and the iteration number to continue from.
///
/// Returns `Ok(None)` when there is no session or it has no checkpoint.
pub fn resume_from(state_dir: &Path) -> Result<Option<(Session, u32)>> {
    let Some(session) = load_session(state_dir)? else {
        return Ok(None);
    };
    let Some(checkpoint) = &session.checkpoint else {
        debug!("session has no checkpoint, nothing to resume");
        return Ok(None);
    };
    let next = checkpoint.iteration + 1;
    Ok(Some((session, next)))
}

pub fn can_resume(state_dir: &Path) -> Result<bool> {
    Ok(load_session(state_dir)?.is_some_and(|session| session.can_resume()))
}

/// Clear the persisted session by writing an empty JSON object.
pub fn reset_session(state_dir: &Path) -> Result<()> {
    write_atomic(&session_path(state_dir), "{}\n")
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} into place", tmp.display()))?;
    Ok(())
}

//! Task document access.
//!
//! A missing document is a valid state ("no tasks"), distinct from read
//! failures such as permission problems, which are real errors.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::tasks::{self, Task};

/// Read the raw task document. `Ok(None)` when the file does not exist.
pub fn read_task_document(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "task document not found");
            Ok(None)
        }
        Err(err) => {
            Err(err).with_context(|| format!("read task document {}", path.display()))
        }
    }
}

/// True iff the document exists and contains actionable list items.
pub fn has_tasks(path: &Path) -> Result<bool> {
    Ok(read_task_document(path)?
        .is_some_and(|document| tasks::has_tasks(&document)))
}

/// Extract the ordered task list. A missing document yields an empty list.
pub fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    Ok(read_task_document(path)?
        .map(|document| tasks::extract_tasks(&document))
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_document_reads_as_no_tasks() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("PRD.md");
        assert_eq!(read_task_document(&path).expect("read"), None);
        assert!(!has_tasks(&path).expect("has_tasks"));
        assert!(load_tasks(&path).expect("load").is_empty());
    }

    #[test]
    fn existing_document_is_parsed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("PRD.md");
        fs::write(&path, "### Phase 1\n[ ] write the parser\n").expect("write");

        assert!(has_tasks(&path).expect("has_tasks"));
        let tasks = load_tasks(&path).expect("load");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].phase.as_deref(), Some("Phase 1"));
        assert!(!tasks[0].completed);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_document_surfaces_an_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("PRD.md");
        fs::write(&path, "[ ] task\n").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).expect("chmod");

        // Running as root bypasses permission bits, so only assert when the
        // read actually fails.
        if fs::read_to_string(&path).is_err() {
            assert!(read_task_document(&path).is_err());
        }

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod back");
    }
}

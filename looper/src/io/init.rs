//! Initialization helpers for `.looper/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{LooperConfig, write_config};

/// All canonical paths within `.looper/` for a project root.
#[derive(Debug, Clone)]
pub struct LooperPaths {
    pub root: PathBuf,
    pub looper_dir: PathBuf,
    pub state_dir: PathBuf,
    pub iterations_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub config_path: PathBuf,
    pub session_path: PathBuf,
}

impl LooperPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let looper_dir = root.join(".looper");
        let state_dir = looper_dir.join("state");
        Self {
            root: root.clone(),
            looper_dir: looper_dir.clone(),
            state_dir: state_dir.clone(),
            iterations_dir: looper_dir.join("iterations"),
            gitignore_path: looper_dir.join(".gitignore"),
            config_path: looper_dir.join("config.toml"),
            session_path: state_dir.join("session.json"),
        }
    }
}

/// Options for `init_looper`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing looper-owned files.
    pub force: bool,
}

/// Create `.looper/` scaffolding in `root`.
///
/// Fails if `.looper/` already exists unless `options.force` is set. The
/// task document is seeded only when missing: it belongs to the user, so
/// even `--force` never rewrites an edited one.
pub fn init_looper(root: &Path, options: &InitOptions) -> Result<LooperPaths> {
    let paths = LooperPaths::new(root);
    if paths.looper_dir.exists() && !options.force {
        return Err(anyhow!(
            "looper init: .looper already exists (use --force to overwrite)"
        ));
    }
    if paths.looper_dir.exists() && !paths.looper_dir.is_dir() {
        return Err(anyhow!(
            "looper init: .looper exists but is not a directory"
        ));
    }

    create_dir(&paths.looper_dir)?;
    create_dir(&paths.state_dir)?;
    create_dir(&paths.iterations_dir)?;

    write_file(&paths.gitignore_path, LOOPER_GITIGNORE)?;
    let config = LooperConfig::default();
    write_config(&paths.config_path, &config)?;

    let prd_path = root.join(&config.prd_path);
    if !prd_path.exists() {
        write_file(&prd_path, PRD_TEMPLATE)?;
    }

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const LOOPER_GITIGNORE: &str = "state/\niterations/\n";

// Placeholder tasks use the literal `...` body so the document does not
// count as actionable until the user edits it.
const PRD_TEMPLATE: &str = "\
# Project Tasks

Describe the work as checkbox tasks. The loop hands the agent one
unchecked task per iteration and stops when every box is checked.

### Phase 1

[ ] ...
[ ] ...
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tasks;

    fn read_to_string(path: &Path) -> String {
        fs::read_to_string(path).expect("read file")
    }

    /// Verifies init_looper creates the complete directory structure and files.
    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();

        let paths = init_looper(root, &InitOptions { force: false }).expect("init");

        assert!(paths.looper_dir.is_dir());
        assert!(paths.state_dir.is_dir());
        assert!(paths.iterations_dir.is_dir());
        assert!(paths.gitignore_path.is_file());
        assert!(paths.config_path.is_file());
        assert!(root.join("PRD.md").is_file());

        let gitignore = read_to_string(&paths.gitignore_path);
        assert_eq!(gitignore, LOOPER_GITIGNORE);
    }

    /// The seeded task document must not count as actionable work.
    #[test]
    fn seeded_task_document_has_no_actionable_tasks() {
        assert!(!tasks::has_tasks(PRD_TEMPLATE));
    }

    #[test]
    fn init_without_force_refuses_existing_looper_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();

        init_looper(root, &InitOptions { force: false }).expect("init");
        let err = init_looper(root, &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    /// Force re-init rewrites looper-owned files but never the task document.
    #[test]
    fn init_with_force_preserves_an_edited_task_document() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let paths = init_looper(root, &InitOptions { force: false }).expect("init");

        let prd = root.join("PRD.md");
        fs::write(&prd, "### Phase 1\n[ ] real task\n").expect("write prd");
        fs::write(&paths.gitignore_path, "custom").expect("write custom");

        init_looper(root, &InitOptions { force: true }).expect("re-init");

        assert_eq!(read_to_string(&prd), "### Phase 1\n[ ] real task\n");
        assert_eq!(read_to_string(&paths.gitignore_path), LOOPER_GITIGNORE);
    }
}

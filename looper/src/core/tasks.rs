//! Task extraction from the markdown task document.
//!
//! The document is the source of truth for remaining work: the extractor
//! produces an ephemeral list that callers consume immediately and never
//! persist. Scanning is a single forward pass over lines and is idempotent
//! for identical input.

use std::sync::LazyLock;

use regex::Regex;

/// One actionable item parsed from the task document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub text: String,
    pub completed: bool,
    /// Most recent level-3 heading above the task, if any.
    pub phase: Option<String>,
}

static PHASE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^###\s+(.+?)\s*$").unwrap());

// Checkbox lines may carry an optional bullet before the brackets.
static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*]\s+)?\[([ xX])\]\s+(.+?)\s*$").unwrap());

// Checkmark-glyph lines always denote completed work.
static CHECKMARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[✓✔]\s*(.+?)\s*$").unwrap());

// List items that count as actionable content: bullet, numbered, or open checkbox.
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*]|\d+[.)]|\[ \])\s+(.*?)\s*$").unwrap());

/// True iff at least one line is a list item with real content.
///
/// Bullets, numbered items, and open checkboxes qualify. Content that is
/// empty or a bare ellipsis placeholder (`...`) does not count, so a freshly
/// scaffolded template reads as "no tasks".
pub fn has_tasks(document: &str) -> bool {
    document.lines().any(|line| {
        LIST_ITEM_RE.captures(line).is_some_and(|caps| {
            let content = caps.get(1).map_or("", |m| m.as_str());
            !content.is_empty() && content != "..."
        })
    })
}

/// Parse the document into an ordered task list.
///
/// Recognizes bracket checkboxes (`[ ]`, `[x]`, `[X]`) and checkmark-glyph
/// lines; everything else is ignored. Each task carries the most recent
/// level-3 heading as its phase until a new heading appears.
pub fn extract_tasks(document: &str) -> Vec<Task> {
    let mut tasks = Vec::new();
    let mut phase: Option<String> = None;

    for line in document.lines() {
        if let Some(caps) = PHASE_RE.captures(line) {
            phase = Some(caps[1].to_string());
            continue;
        }
        if let Some(caps) = CHECKBOX_RE.captures(line) {
            tasks.push(Task {
                text: caps[2].to_string(),
                completed: !caps[1].trim().is_empty(),
                phase: phase.clone(),
            });
            continue;
        }
        if let Some(caps) = CHECKMARK_RE.captures(line) {
            tasks.push(Task {
                text: caps[1].to_string(),
                completed: true,
                phase: phase.clone(),
            });
        }
    }

    tasks
}

/// True iff the document explicitly reports all work done: at least one
/// task was extracted and none of them is pending.
pub fn all_tasks_complete(document: &str) -> bool {
    let tasks = extract_tasks(document);
    !tasks.is_empty() && tasks.iter().all(|task| task.completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_tasks_rejects_placeholders_and_blank_items() {
        assert!(!has_tasks("- ...\n- \n"));
        assert!(!has_tasks(""));
        assert!(!has_tasks("plain prose, no list items\n"));
    }

    #[test]
    fn has_tasks_accepts_real_list_items() {
        assert!(has_tasks("- implement login\n"));
        assert!(has_tasks("* fix the parser\n"));
        assert!(has_tasks("1. write docs\n"));
        assert!(has_tasks("2) write more docs\n"));
        assert!(has_tasks("[ ] unchecked item\n"));
    }

    #[test]
    fn has_tasks_ignores_bare_markers() {
        assert!(!has_tasks("[ ]\n-\n1.\n"));
    }

    #[test]
    fn extract_attaches_current_phase() {
        let doc = "### Phase 1\n[x] done task\n[ ] pending task\n";
        let tasks = extract_tasks(doc);
        assert_eq!(
            tasks,
            vec![
                Task {
                    text: "done task".to_string(),
                    completed: true,
                    phase: Some("Phase 1".to_string()),
                },
                Task {
                    text: "pending task".to_string(),
                    completed: false,
                    phase: Some("Phase 1".to_string()),
                },
            ]
        );
    }

    #[test]
    fn extract_switches_phase_on_new_heading() {
        let doc = "[ ] before any phase\n### Setup\n[ ] a\n### Cleanup\n[X] b\n";
        let tasks = extract_tasks(doc);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].phase, None);
        assert_eq!(tasks[1].phase, Some("Setup".to_string()));
        assert_eq!(tasks[2].phase, Some("Cleanup".to_string()));
        assert!(tasks[2].completed);
    }

    #[test]
    fn extract_accepts_bulleted_checkboxes_and_checkmarks() {
        let doc = "- [ ] bulleted pending\n* [x] bulleted done\n✓ shipped earlier\n";
        let tasks = extract_tasks(doc);
        assert_eq!(tasks.len(), 3);
        assert!(!tasks[0].completed);
        assert!(tasks[1].completed);
        assert!(tasks[2].completed);
        assert_eq!(tasks[2].text, "shipped earlier");
    }

    #[test]
    fn extract_ignores_non_task_lines() {
        let doc = "# Title\n\nprose\n## Section\n- plain bullet\n";
        assert!(extract_tasks(doc).is_empty());
    }

    #[test]
    fn extract_is_idempotent() {
        let doc = "### P\n[ ] a\n✓ b\n";
        assert_eq!(extract_tasks(doc), extract_tasks(doc));
    }

    #[test]
    fn all_complete_requires_at_least_one_task() {
        assert!(!all_tasks_complete(""));
        assert!(!all_tasks_complete("prose only\n"));
        assert!(!all_tasks_complete("[x] done\n[ ] not yet\n"));
        assert!(all_tasks_complete("[x] done\n✓ also done\n"));
    }
}

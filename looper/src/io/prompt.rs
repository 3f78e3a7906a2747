//! Iteration prompt builder.

use anyhow::Result;
use minijinja::{Environment, context};

const ITERATION_TEMPLATE: &str = include_str!("prompts/iteration.md");

/// Listing every open task verbatim would bloat the prompt on large
/// documents, so the rendered list is capped and the rest summarized.
const MAX_TASK_LINES: usize = 20;

/// All inputs needed to render one iteration's prompt.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    /// Task document path, relative to the project root.
    pub prd_path: String,
    /// 1-based iteration ordinal within the whole session.
    pub iteration: u32,
    /// Last iteration ordinal this run plans to reach.
    pub total_iterations: u32,
    /// Texts of tasks still unchecked, document order.
    pub pending_tasks: Vec<String>,
    /// One-line outcome of the previous iteration, if any.
    pub previous_status: Option<String>,
}

pub fn build_iteration_prompt(input: &PromptInputs) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("iteration", ITERATION_TEMPLATE)
        .expect("iteration template should be valid");
    let template = env.get_template("iteration")?;

    let visible: Vec<&str> = input
        .pending_tasks
        .iter()
        .take(MAX_TASK_LINES)
        .map(String::as_str)
        .collect();
    let hidden = input.pending_tasks.len().saturating_sub(MAX_TASK_LINES);

    let rendered = template.render(context! {
        prd_path => input.prd_path,
        iteration => input.iteration,
        total_iterations => input.total_iterations,
        pending_tasks => visible,
        hidden_tasks => (hidden > 0).then_some(hidden),
        previous_status => input.previous_status.as_deref().map(str::trim).filter(|s| !s.is_empty()),
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> PromptInputs {
        PromptInputs {
            prd_path: "PRD.md".to_string(),
            iteration: 2,
            total_iterations: 10,
            pending_tasks: vec!["add parser".to_string(), "wire CLI".to_string()],
            previous_status: None,
        }
    }

    #[test]
    fn renders_iteration_position_and_tasks() {
        let prompt = build_iteration_prompt(&base_inputs()).expect("render");
        assert!(prompt.contains("This is iteration 2 of 10."));
        assert!(prompt.contains("- add parser"));
        assert!(prompt.contains("- wire CLI"));
        assert!(prompt.contains("`PRD.md`"));
    }

    #[test]
    fn previous_status_section_is_conditional() {
        let mut input = base_inputs();
        let without = build_iteration_prompt(&input).expect("render");
        assert!(!without.contains("### Previous iteration"));

        input.previous_status = Some("iteration 1 succeeded".to_string());
        let with = build_iteration_prompt(&input).expect("render");
        assert!(with.contains("### Previous iteration"));
        assert!(with.contains("iteration 1 succeeded"));
    }

    #[test]
    fn blank_previous_status_is_treated_as_absent() {
        let mut input = base_inputs();
        input.previous_status = Some("   ".to_string());
        let prompt = build_iteration_prompt(&input).expect("render");
        assert!(!prompt.contains("### Previous iteration"));
    }

    #[test]
    fn long_task_lists_are_capped() {
        let mut input = base_inputs();
        input.pending_tasks = (1..=25).map(|n| format!("task {n}")).collect();
        let prompt = build_iteration_prompt(&input).expect("render");
        assert!(prompt.contains("- task 20"));
        assert!(!prompt.contains("- task 21"));
        assert!(prompt.contains("...and 5 more."));
    }

    #[test]
    fn empty_task_list_omits_the_section() {
        let mut input = base_inputs();
        input.pending_tasks.clear();
        let prompt = build_iteration_prompt(&input).expect("render");
        assert!(!prompt.contains("### Remaining tasks"));
    }
}

//! The iteration loop: repeatedly hand the agent one slice of work until
//! the task document reports done, a limit trips, or someone asks to stop.
//!
//! The loop owns sequencing and persistence only. Task parsing and cost
//! arithmetic live in `core`, process and file concerns in `io`. An
//! iteration is recorded only after the agent invocation finished; a crash
//! or error mid-iteration leaves the session exactly as the previous
//! checkpoint wrote it.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::core::cost::{CostInputs, project_cost};
use crate::core::tasks;
use crate::hooks::{HookContext, HookSlot, Hooks};
use crate::io::agent::{AgentRequest, AgentRunner};
use crate::io::config::LooperConfig;
use crate::io::git::GitInfo;
use crate::io::init::LooperPaths;
use crate::io::iteration_log::{IterationPaths, IterationWriteRequest, write_iteration};
use crate::io::prd::read_task_document;
use crate::io::prompt::{PromptInputs, build_iteration_prompt};
use crate::io::session_store::{
    append_iteration, can_resume, checkpoint_session, create_session, resume_from, save_session,
};
use crate::session::{IterationResult, LimitScope, Session};

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// The task document reports no remaining work.
    Complete,
    /// The run reached its planned iteration count.
    MaxIterations { planned: u32 },
    /// A cost ceiling was exceeded.
    CostLimit { scope: LimitScope },
    /// An interrupt was requested; the session can be resumed.
    Interrupted { next_iteration: u32 },
}

impl fmt::Display for LoopStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopStop::Complete => write!(f, "all tasks complete"),
            LoopStop::MaxIterations { planned } => {
                write!(f, "planned iterations finished (through {planned})")
            }
            LoopStop::CostLimit {
                scope: LimitScope::Iteration,
            } => write!(f, "iteration cost limit exceeded"),
            LoopStop::CostLimit {
                scope: LimitScope::Session,
            } => write!(f, "session cost limit exceeded"),
            LoopStop::Interrupted { next_iteration } => {
                write!(f, "interrupted, resume continues at iteration {next_iteration}")
            }
        }
    }
}

/// Summary of a loop invocation.
#[derive(Debug)]
pub struct LoopOutcome {
    pub session: Session,
    pub iterations_run: u32,
    pub stop: LoopStop,
}

/// Caller-facing knobs for one `looper run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Iterations to run this invocation; defaults to the configured count.
    pub iterations: Option<u32>,
    /// Continue the checkpointed session instead of starting fresh.
    pub resume: bool,
}

/// Run the iteration loop to one of its stop conditions.
///
/// The interrupt flag is checked between iterations only; an in-flight
/// agent invocation always runs to completion so it is either fully
/// recorded or not recorded at all.
#[instrument(skip_all, fields(resume = options.resume))]
pub fn run_loop<A: AgentRunner>(
    root: &Path,
    agent: &A,
    config: &LooperConfig,
    options: &RunOptions,
    hooks: &Hooks,
    interrupt: &AtomicBool,
) -> Result<LoopOutcome> {
    let paths = LooperPaths::new(root);
    let git = GitInfo::new(root);
    let prd_path = root.join(&config.prd_path);

    let (mut session, start_iteration) = if options.resume {
        match resume_from(&paths.state_dir)? {
            Some((session, next)) => {
                info!(session_id = %session.id, next_iteration = next, "resuming session");
                (session, next)
            }
            None => {
                info!("nothing to resume, starting a fresh session");
                start_fresh(&paths, &git)?
            }
        }
    } else {
        if can_resume(&paths.state_dir)? {
            warn!("replacing a resumable session (run with --resume to continue it)");
        }
        start_fresh(&paths, &git)?
    };

    let count = options.iterations.unwrap_or(config.max_iterations);
    let planned_total = start_iteration.saturating_add(count).saturating_sub(1);

    hooks.fire(
        HookSlot::BeforeRun,
        &context_for(&session, 0, planned_total),
    )?;

    let mut iterations_run = 0u32;
    let mut stop = LoopStop::MaxIterations {
        planned: planned_total,
    };

    for iteration in start_iteration..=planned_total {
        if interrupt.load(Ordering::SeqCst) {
            info!(next_iteration = iteration, "interrupt requested, stopping");
            stop = LoopStop::Interrupted {
                next_iteration: iteration,
            };
            break;
        }

        // Pre-check: nothing left to hand the agent means we are done
        // before spending anything on an invocation.
        let document = read_task_document(&prd_path)?.unwrap_or_default();
        if !tasks::has_tasks(&document) || tasks::all_tasks_complete(&document) {
            info!(iteration, "task document reports no remaining work");
            stop = LoopStop::Complete;
            break;
        }

        hooks.fire(
            HookSlot::BeforeIteration,
            &context_for(&session, iteration, planned_total),
        )?;

        let pending: Vec<String> = tasks::extract_tasks(&document)
            .into_iter()
            .filter(|task| !task.completed)
            .map(|task| task.text)
            .collect();
        let previous_status = session.iterations.last().map(|prev| {
            let outcome = if prev.success { "succeeded" } else { "failed" };
            format!("iteration {} {outcome}", prev.iteration)
        });
        let prompt = build_iteration_prompt(&PromptInputs {
            prd_path: config.prd_path.clone(),
            iteration,
            total_iterations: planned_total,
            pending_tasks: pending,
            previous_status,
        })?;

        let iteration_paths = IterationPaths::new(&paths.iterations_dir, &session.id, iteration);
        let request = AgentRequest {
            workdir: root.to_path_buf(),
            prompt: prompt.clone(),
            resume_session_id: session.sdk_session_id.clone(),
            timeout: Duration::from_secs(config.iteration_timeout_secs),
            output_limit_bytes: config.agent_output_limit_bytes,
            log_path: iteration_paths.agent_log_path(),
        };

        let started_at = Utc::now();
        let timer = Instant::now();
        let invocation = match agent.invoke(&request) {
            Ok(invocation) => invocation,
            Err(err) => {
                // The iteration never completed, so nothing is recorded.
                let mut ctx = context_for(&session, iteration, planned_total);
                ctx.error = Some(format!("{err:#}"));
                if let Err(hook_err) = hooks.fire(HookSlot::OnError, &ctx) {
                    warn!(error = %hook_err, "on-error hook failed while aborting");
                }
                return Err(err.context(format!("iteration {iteration} failed")));
            }
        };
        let completed_at = Utc::now();
        let duration_seconds = timer.elapsed().as_secs_f64();

        // The agent edits the document in place; re-read to see what it did.
        let document_after = read_task_document(&prd_path)?.unwrap_or_default();
        let tasks_complete = tasks::all_tasks_complete(&document_after);

        let projection = project_cost(&CostInputs {
            usage: invocation.usage.as_ref(),
            session_cost_so_far: session.cost_so_far(),
            max_cost_per_session: config.max_cost_per_session,
            current_iteration: iteration,
            total_iterations: planned_total,
            prior_iterations: &session.iterations,
        });

        let iteration_limit_hit = invocation.usage.as_ref().is_some_and(|usage| {
            config
                .max_cost_per_iteration
                .is_some_and(|ceiling| usage.total_cost_usd > ceiling)
        });
        let session_limit_hit = projection
            .as_ref()
            .is_some_and(|projection| projection.has_exceeded_limit);
        let (cost_limit_exceeded, cost_limit_reason) = if iteration_limit_hit {
            (Some(true), Some(LimitScope::Iteration))
        } else if session_limit_hit {
            (Some(true), Some(LimitScope::Session))
        } else {
            (None, None)
        };

        let result = IterationResult {
            iteration,
            started_at,
            completed_at,
            duration_seconds,
            success: invocation.success,
            output: invocation.output.clone(),
            status: invocation.status.clone(),
            usage: invocation.usage.clone(),
            tasks_complete,
            cost_limit_exceeded,
            cost_limit_reason,
        };

        write_iteration(&IterationWriteRequest {
            iterations_dir: &paths.iterations_dir,
            session_id: &session.id,
            iteration,
            prompt: &prompt,
            output: &invocation.output,
            result: &result,
        })?;

        if invocation.sdk_session_id.is_some() {
            session.sdk_session_id = invocation.sdk_session_id.clone();
        }
        if let Some(projection) = &projection {
            session.total_cost_usd = Some(projection.session_total);
            if projection.is_approaching_limit && !projection.has_exceeded_limit {
                warn!(
                    session_total = projection.session_total,
                    "session cost approaching its ceiling"
                );
            }
        }

        session = append_iteration(&paths.state_dir, session, result)?;
        checkpoint_session(&paths.state_dir, &mut session, iteration, &git)?;
        iterations_run += 1;

        hooks.fire(
            HookSlot::AfterIteration,
            &context_for(&session, iteration, planned_total),
        )?;

        if tasks_complete {
            info!(iteration, "agent reports all tasks complete");
            stop = LoopStop::Complete;
            break;
        }
        if let Some(scope) = cost_limit_reason {
            warn!(iteration, ?scope, "cost limit exceeded, stopping");
            stop = LoopStop::CostLimit { scope };
            break;
        }
    }

    let mut done_ctx = context_for(&session, iterations_run, planned_total);
    done_ctx.stop = Some(stop.to_string());
    hooks.fire(HookSlot::Done, &done_ctx)?;

    info!(%stop, iterations_run, "loop finished");
    Ok(LoopOutcome {
        session,
        iterations_run,
        stop,
    })
}

fn start_fresh(paths: &LooperPaths, git: &GitInfo) -> Result<(Session, u32)> {
    let session = create_session(git, None);
    save_session(&paths.state_dir, &session)?;
    info!(session_id = %session.id, branch = %session.branch, "started session");
    Ok((session, 1))
}

fn context_for(session: &Session, iteration: u32, total_iterations: u32) -> HookContext {
    HookContext {
        session_id: session.id.clone(),
        iteration,
        total_iterations,
        session_cost_usd: session.cost_so_far(),
        stop: None,
        error: None,
    }
}

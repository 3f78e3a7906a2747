//! Agent iteration session CLI.
//!
//! Drives an external coding agent through a markdown task document, one
//! task per iteration, with session persistence under `.looper/` so an
//! interrupted run can resume from its last checkpoint.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use looper::exit_codes;
use looper::hooks::{HookSlot, Hooks};
use looper::io::agent::ClaudeAgent;
use looper::io::config::{LooperConfig, load_config};
use looper::io::init::{InitOptions, LooperPaths, init_looper};
use looper::io::prd::load_tasks;
use looper::io::session_store::reset_session;
use looper::io::sleep::SleepGuard;
use looper::looping::{LoopStop, RunOptions, run_loop};
use looper::preflight::{CheckStatus, EnvProbe, Preflight, PreflightOutcome};
use looper::status::build_status;

#[derive(Parser)]
#[command(name = "looper", version, about = "Agent iteration session engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.looper/` scaffolding and a task document template.
    Init {
        /// Overwrite existing looper-owned files.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the environment checks without starting a session.
    Preflight,
    /// List tasks parsed from the task document.
    Tasks,
    /// Run the iteration loop until done, a limit, or an interrupt.
    Run {
        /// Iterations for this invocation (defaults to the configured count).
        #[arg(long)]
        iterations: Option<u32>,
        /// Continue from the last checkpoint instead of starting fresh.
        #[arg(long)]
        resume: bool,
        /// Override the configured task document path.
        #[arg(long)]
        prd: Option<PathBuf>,
    },
    /// Show the current session, diff, and commits.
    Status,
    /// Clear the persisted session.
    Reset,
}

fn main() {
    looper::logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve working directory")?;
    match cli.command {
        Command::Init { force } => cmd_init(&root, force),
        Command::Preflight => cmd_preflight(&root),
        Command::Tasks => cmd_tasks(&root),
        Command::Run {
            iterations,
            resume,
            prd,
        } => cmd_run(&root, iterations, resume, prd),
        Command::Status => cmd_status(&root),
        Command::Reset => cmd_reset(&root),
    }
}

fn load_config_for(root: &Path) -> Result<LooperConfig> {
    load_config(&LooperPaths::new(root).config_path)
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_looper(root, &InitOptions { force })?;
    println!("initialized {}", paths.looper_dir.display());
    println!("edit PRD.md, then run `looper run`");
    Ok(exit_codes::OK)
}

fn cmd_preflight(root: &Path) -> Result<i32> {
    let config = load_config_for(root)?;
    let preflight = run_preflight(root, config)?;
    Ok(match preflight.outcome() {
        PreflightOutcome::Ready => exit_codes::OK,
        PreflightOutcome::CredentialRequired | PreflightOutcome::Fatal => exit_codes::INVALID,
    })
}

/// Run the checks and print one line per check.
fn run_preflight(root: &Path, config: LooperConfig) -> Result<Preflight> {
    let probe = EnvProbe::new(root, config);
    let mut preflight = Preflight::new();
    preflight.run(&probe)?;
    for check in preflight.checks() {
        let mark = match check.status {
            CheckStatus::Passed => "ok",
            CheckStatus::Warning => "warn",
            CheckStatus::Failed => "fail",
            CheckStatus::Pending | CheckStatus::Checking => "-",
        };
        match &check.message {
            Some(message) => println!("{mark:>4}  {}: {message}", check.kind.label()),
            None => println!("{mark:>4}  {}", check.kind.label()),
        }
    }
    Ok(preflight)
}

fn cmd_tasks(root: &Path) -> Result<i32> {
    let config = load_config_for(root)?;
    let tasks = load_tasks(&root.join(&config.prd_path))?;
    if tasks.is_empty() {
        println!("no tasks found in {}", config.prd_path);
        return Ok(exit_codes::OK);
    }
    let mut phase: Option<&str> = None;
    for task in &tasks {
        if task.phase.as_deref() != phase {
            phase = task.phase.as_deref();
            if let Some(name) = phase {
                println!("{name}:");
            }
        }
        let mark = if task.completed { "x" } else { " " };
        println!("  [{mark}] {}", task.text);
    }
    let open = tasks.iter().filter(|task| !task.completed).count();
    println!("{open} open / {} total", tasks.len());
    Ok(exit_codes::OK)
}

fn cmd_run(
    root: &Path,
    iterations: Option<u32>,
    resume: bool,
    prd: Option<PathBuf>,
) -> Result<i32> {
    let mut config = load_config_for(root)?;
    if let Some(prd) = prd {
        config.prd_path = prd.display().to_string();
    }

    let preflight = run_preflight(root, config.clone())?;
    match preflight.outcome() {
        PreflightOutcome::Fatal => {
            eprintln!("preflight failed; fix the checks above and retry");
            return Ok(exit_codes::INVALID);
        }
        PreflightOutcome::CredentialRequired => {
            eprintln!("set {} and retry", config.credential_env);
            return Ok(exit_codes::INVALID);
        }
        PreflightOutcome::Ready => {}
    }
    if preflight.has_actionable_tasks() == Some(false) {
        println!("nothing to do: {} has no open tasks", config.prd_path);
        return Ok(exit_codes::COMPLETE);
    }

    // Held for the whole run so the machine cannot sleep mid-iteration.
    let _sleep = SleepGuard::acquire();
    let agent = ClaudeAgent::new(config.agent_binary.clone());
    let hooks = progress_hooks();
    let interrupt = AtomicBool::new(false);
    let options = RunOptions { iterations, resume };

    let outcome = run_loop(root, &agent, &config, &options, &hooks, &interrupt)?;
    Ok(match outcome.stop {
        LoopStop::Complete => exit_codes::COMPLETE,
        LoopStop::MaxIterations { .. } => exit_codes::OK,
        LoopStop::CostLimit { .. } => exit_codes::LIMIT,
        LoopStop::Interrupted { .. } => exit_codes::INTERRUPTED,
    })
}

fn progress_hooks() -> Hooks {
    let mut hooks = Hooks::new();
    hooks.register(HookSlot::BeforeIteration, |ctx| {
        println!("iteration {} of {}", ctx.iteration, ctx.total_iterations);
        Ok(())
    });
    hooks.register(HookSlot::AfterIteration, |ctx| {
        println!("  session cost so far: ${:.2}", ctx.session_cost_usd);
        Ok(())
    });
    hooks.register(HookSlot::Done, |ctx| {
        if let Some(stop) = &ctx.stop {
            println!("done after {} iterations: {stop}", ctx.iteration);
        }
        Ok(())
    });
    hooks
}

fn cmd_status(root: &Path) -> Result<i32> {
    match build_status(root)? {
        Some(report) => print!("{}", report.render()),
        None => println!("no session (run `looper run` to start one)"),
    }
    Ok(exit_codes::OK)
}

fn cmd_reset(root: &Path) -> Result<i32> {
    reset_session(&LooperPaths::new(root).state_dir)?;
    println!("session cleared");
    Ok(exit_codes::OK)
}

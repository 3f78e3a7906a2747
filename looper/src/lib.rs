//! Iteration session engine for agent-driven task loops.
//!
//! This crate drives repeated invocations of an external coding agent
//! against a markdown task document until the work is done, a cost ceiling
//! trips, or the run is interrupted. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (task extraction, cost
//!   projection). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, git, process and
//!   agent execution). Isolated to enable scripted doubles in tests.
//!
//! Orchestration modules ([`looping`], [`preflight`], [`status`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod core;
pub mod exit_codes;
pub mod hooks;
pub mod io;
pub mod logging;
pub mod looping;
pub mod preflight;
pub mod session;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

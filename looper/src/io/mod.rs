//! I/O helpers: filesystem layout, configuration, session persistence,
//! subprocess handling, and the agent backend.

pub mod agent;
pub mod config;
pub mod git;
pub mod init;
pub mod iteration_log;
pub mod prd;
pub mod process;
pub mod prompt;
pub mod session_store;
pub mod sleep;

//! System sleep prevention for long runs.
//!
//! A session can spend hours invoking the agent, and a laptop going to
//! sleep mid-iteration kills the child process. [`SleepGuard`] holds a
//! platform inhibitor for its lifetime and releases it on drop, so the
//! machine can sleep again no matter how the run ends. Inhibition is best
//! effort: failure to acquire never fails the run.

use std::process::Child;

use tracing::{debug, warn};

pub struct SleepGuard {
    child: Option<Child>,
}

impl SleepGuard {
    pub fn acquire() -> Self {
        Self {
            child: spawn_inhibitor(),
        }
    }

    /// Whether an inhibitor process is currently held.
    pub fn is_active(&self) -> bool {
        self.child.is_some()
    }

    /// Stop the inhibitor. Safe to call more than once; drop calls it too.
    pub fn release(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Err(err) = child.kill() {
            warn!(error = %err, "failed to stop sleep inhibitor");
            return;
        }
        match child.wait() {
            Ok(status) => debug!(?status, "sleep inhibitor stopped"),
            Err(err) => warn!(error = %err, "failed to reap sleep inhibitor"),
        };
    }
}

impl Drop for SleepGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(target_os = "macos")]
fn spawn_inhibitor() -> Option<Child> {
    use std::process::{Command, Stdio};

    // -d display, -i idle, -m disk, -s AC sleep.
    match Command::new("caffeinate")
        .arg("-dims")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => {
            debug!(pid = child.id(), "sleep inhibitor started");
            Some(child)
        }
        Err(err) => {
            debug!(error = %err, "caffeinate unavailable, continuing without sleep inhibition");
            None
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn spawn_inhibitor() -> Option<Child> {
    debug!("no sleep inhibitor on this platform");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_idempotent() {
        let mut guard = SleepGuard::acquire();
        guard.release();
        guard.release();
        assert!(!guard.is_active());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn inactive_off_macos() {
        let guard = SleepGuard::acquire();
        assert!(!guard.is_active());
    }
}

//! Lifecycle hooks around the iteration loop.
//!
//! Callers attach closures to fixed slots and the loop fires them at the
//! matching moments. Hooks observe, they do not steer: each one receives an
//! immutable [`HookContext`] snapshot. A failing hook is logged and its
//! siblings still run, except in the on-error slot, where a failure has no
//! sensible fallback and aborts.

use anyhow::Result;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSlot {
    /// Once, after the session is created or resumed, before iteration 1.
    BeforeRun,
    BeforeIteration,
    /// After an iteration is recorded and checkpointed.
    AfterIteration,
    /// Once, when the loop stops for any non-error reason.
    Done,
    /// When the loop is about to abort with an error.
    OnError,
}

impl HookSlot {
    fn index(self) -> usize {
        match self {
            HookSlot::BeforeRun => 0,
            HookSlot::BeforeIteration => 1,
            HookSlot::AfterIteration => 2,
            HookSlot::Done => 3,
            HookSlot::OnError => 4,
        }
    }

    fn label(self) -> &'static str {
        match self {
            HookSlot::BeforeRun => "before-run",
            HookSlot::BeforeIteration => "before-iteration",
            HookSlot::AfterIteration => "after-iteration",
            HookSlot::Done => "done",
            HookSlot::OnError => "on-error",
        }
    }
}

/// Snapshot handed to every hook.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub session_id: String,
    /// Iteration the event concerns; 0 for run-level events.
    pub iteration: u32,
    pub total_iterations: u32,
    pub session_cost_usd: f64,
    /// Why the loop stopped, set only for the done slot.
    pub stop: Option<String>,
    /// What went wrong, set only for the on-error slot.
    pub error: Option<String>,
}

type Hook = Box<dyn Fn(&HookContext) -> Result<()>>;

#[derive(Default)]
pub struct Hooks {
    slots: [Vec<Hook>; 5],
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        slot: HookSlot,
        hook: impl Fn(&HookContext) -> Result<()> + 'static,
    ) {
        self.slots[slot.index()].push(Box::new(hook));
    }

    /// Fire every hook in `slot` in registration order.
    pub fn fire(&self, slot: HookSlot, ctx: &HookContext) -> Result<()> {
        for (position, hook) in self.slots[slot.index()].iter().enumerate() {
            if let Err(err) = hook(ctx) {
                if slot == HookSlot::OnError {
                    return Err(err.context(format!("on-error hook {position} failed")));
                }
                warn!(slot = slot.label(), position, error = %err, "hook failed, continuing");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::anyhow;

    use super::*;

    fn ctx() -> HookContext {
        HookContext {
            session_id: "s1".to_string(),
            iteration: 3,
            total_iterations: 10,
            session_cost_usd: 1.25,
            stop: None,
            error: None,
        }
    }

    #[test]
    fn hooks_fire_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::new();
        for n in [1, 2, 3] {
            let seen = Rc::clone(&seen);
            hooks.register(HookSlot::BeforeIteration, move |_| {
                seen.borrow_mut().push(n);
                Ok(())
            });
        }

        hooks.fire(HookSlot::BeforeIteration, &ctx()).expect("fire");
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn a_failing_hook_does_not_stop_its_siblings() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::new();
        hooks.register(HookSlot::AfterIteration, |_| Err(anyhow!("boom")));
        {
            let seen = Rc::clone(&seen);
            hooks.register(HookSlot::AfterIteration, move |_| {
                seen.borrow_mut().push("ran");
                Ok(())
            });
        }

        hooks.fire(HookSlot::AfterIteration, &ctx()).expect("fire");
        assert_eq!(*seen.borrow(), vec!["ran"]);
    }

    #[test]
    fn on_error_hook_failure_is_fatal() {
        let mut hooks = Hooks::new();
        hooks.register(HookSlot::OnError, |_| Err(anyhow!("handler broke")));

        let err = hooks.fire(HookSlot::OnError, &ctx()).unwrap_err();
        assert!(err.to_string().contains("on-error hook 0 failed"));
    }

    #[test]
    fn hooks_see_the_context_snapshot() {
        let mut hooks = Hooks::new();
        hooks.register(HookSlot::BeforeIteration, |ctx| {
            assert_eq!(ctx.iteration, 3);
            assert_eq!(ctx.session_id, "s1");
            Ok(())
        });
        hooks.fire(HookSlot::BeforeIteration, &ctx()).expect("fire");
    }

    #[test]
    fn empty_slots_fire_cleanly() {
        let hooks = Hooks::new();
        hooks.fire(HookSlot::Done, &ctx()).expect("fire");
    }
}

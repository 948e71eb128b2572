//! Execution hooks (spec §4.7.8).
//!
//! A hook is never a stored Rust closure over `&Engine` — that would make
//! `Engine` self-referential. Instead each hook is a boxed callback over a
//! [`HookEvent`] (trigger + address + step, no engine access) returning
//! whether execution should *continue*: a single `false` suppresses the
//! default behavior for the current event (skip the instruction, skip the
//! memory access, refuse the pause/transition) the way [`super::Engine`]
//! drives it from `step`/`start`/`execute`.

use crate::tac::TacAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookTrigger {
    /// Fires once, when `start()` transitions the engine to `RUNNING`.
    CodeStart,
    /// Fires once, when execution reaches `FINISHED`.
    CodeEnd,
    /// Fires before every instruction, right after the breakpoint check.
    Instruction,
    /// Fires before a `LOAD` touches memory.
    MemoryRead,
    /// Fires before a `STORE` touches memory.
    MemoryWrite,
    /// Fires when `pc` lands on a registered breakpoint, before the engine
    /// pauses.
    Breakpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookId(pub u32);

#[derive(Debug, Clone, Copy)]
pub struct HookEvent {
    pub trigger: HookTrigger,
    pub address: TacAddress,
    pub step: u64,
}

struct Hook {
    id: HookId,
    trigger: HookTrigger,
    callback: Box<dyn FnMut(HookEvent) -> bool>,
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
    next_id: u32,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, trigger: HookTrigger, callback: F) -> HookId
    where
        F: FnMut(HookEvent) -> bool + 'static,
    {
        let id = HookId(self.next_id);
        self.next_id += 1;
        self.hooks.push(Hook { id, trigger, callback: Box::new(callback) });
        id
    }

    pub fn remove(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| h.id != id);
        self.hooks.len() != before
    }

    /// Invokes every hook registered for `trigger`, in registration order.
    /// All matching hooks run regardless of earlier results (so each still
    /// observes the event), but the aggregate is `false` — "stop" — as soon
    /// as any one of them returns `false`.
    pub fn fire(&mut self, trigger: HookTrigger, address: TacAddress, step: u64) -> bool {
        let mut keep_going = true;
        let event = HookEvent { trigger, address, step };
        for hook in &mut self.hooks {
            if hook.trigger == trigger && !(hook.callback)(event) {
                keep_going = false;
            }
        }
        keep_going
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_fire_only_for_their_own_trigger() {
        let mut registry = HookRegistry::new();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        registry.add(HookTrigger::Instruction, move |event| {
            seen_clone.borrow_mut().push(event.step);
            true
        });
        registry.add(HookTrigger::MemoryRead, |_| true);

        assert!(registry.fire(HookTrigger::Instruction, TacAddress(0), 1));
        assert!(registry.fire(HookTrigger::Breakpoint, TacAddress(0), 2));
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn a_false_result_suppresses_the_event() {
        let mut registry = HookRegistry::new();
        registry.add(HookTrigger::Instruction, |_| false);
        assert!(!registry.fire(HookTrigger::Instruction, TacAddress(0), 0));
    }

    #[test]
    fn removing_an_unknown_id_reports_failure() {
        let mut registry = HookRegistry::new();
        let id = registry.add(HookTrigger::CodeStart, |_| true);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(!registry.remove(HookId(999)));
    }
}

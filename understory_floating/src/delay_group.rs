// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Delay groups: tooltips that share a delay and hand over instantly.
//!
//! A [`DelayGroup`] is shared (`Rc`) between the [`Hover`](crate::hover::Hover)
//! controllers of several floating elements, which read their delay from it,
//! and one [`DelayGroupMember`] per element:
//!
//! - A member that opens becomes the group's current member and switches the
//!   group to a 1 ms open delay.
//! - A member that is open but not current closes.
//! - When the current member closes, the group resets to its initial delay
//!   after `timeout_ms` (immediately when 0), unless another member became
//!   current in the meantime.
//!
//! Members only observe the group in [`Interaction::sync`]. After any member
//! changes the group, the host syncs the other members' [`Interactions`].
//!
//! [`Interactions`]: crate::interactions::Interactions

use alloc::rc::Rc;
use alloc::string::String;
use core::cell::RefCell;

use crate::context::FloatingContext;
use crate::host::{Scheduler, TimerId, TimerSlot};
use crate::hover::{Delay, DelayProp, get_delay};
use crate::interactions::Interaction;

#[derive(Clone, Debug)]
struct GroupState {
    delay: Delay,
    initial_delay: Delay,
    current_id: Option<String>,
    timeout_ms: u32,
    is_instant_phase: bool,
    initial_current_id: Option<String>,
}

/// Shared state of a delay group.
#[derive(Debug)]
pub struct DelayGroup {
    state: RefCell<GroupState>,
}

impl DelayGroup {
    /// A group whose members start with `delay`.
    pub fn new(delay: Delay) -> Self {
        Self {
            state: RefCell::new(GroupState {
                delay,
                initial_delay: delay,
                current_id: None,
                timeout_ms: 0,
                is_instant_phase: false,
                initial_current_id: None,
            }),
        }
    }

    /// Builder: how long after the current member closes the group resets.
    pub fn with_timeout_ms(self, timeout_ms: u32) -> Self {
        self.state.borrow_mut().timeout_ms = timeout_ms;
        self
    }

    /// Delay members use now.
    pub fn delay(&self) -> Delay {
        self.state.borrow().delay
    }

    /// Delay the group was created with.
    pub fn initial_delay(&self) -> Delay {
        self.state.borrow().initial_delay
    }

    /// Reset timeout in milliseconds.
    pub fn timeout_ms(&self) -> u32 {
        self.state.borrow().timeout_ms
    }

    /// Id of the current member.
    pub fn current_id(&self) -> Option<String> {
        self.state.borrow().current_id.clone()
    }

    /// Whether `id` is the current member.
    pub fn is_current(&self, id: &str) -> bool {
        self.state.borrow().current_id.as_deref() == Some(id)
    }

    /// Whether a second member took over while one was current.
    pub fn is_instant_phase(&self) -> bool {
        self.state.borrow().is_instant_phase
    }

    /// Replace the current delay.
    pub fn set_delay(&self, delay: Delay) {
        self.state.borrow_mut().delay = delay;
    }

    /// Change the current member.
    pub fn set_current_id(&self, id: Option<&str>) {
        let mut state = self.state.borrow_mut();
        if state.current_id.as_deref() == id {
            return;
        }
        state.current_id = id.map(String::from);
        match id {
            Some(id) => {
                if state.initial_current_id.is_none() {
                    state.initial_current_id = Some(String::from(id));
                } else {
                    state.is_instant_phase = true;
                }
            }
            None => {
                state.is_instant_phase = false;
                state.initial_current_id = None;
            }
        }
        tracing::debug!(
            current = ?state.current_id,
            instant = state.is_instant_phase,
            "delay group current member changed"
        );
    }

    /// Back to the initial delay with no current member.
    pub fn reset(&self) {
        let initial = self.initial_delay();
        self.set_delay(initial);
        self.set_current_id(None);
    }
}

/// Joins one floating element to a [`DelayGroup`].
#[derive(Debug)]
pub struct DelayGroupMember {
    group: Rc<DelayGroup>,
    id: String,
    was_open: bool,
    reset_timer: TimerSlot,
}

impl DelayGroupMember {
    /// Member `id` of `group`. Ids must be unique within the group.
    pub fn new(group: Rc<DelayGroup>, id: impl Into<String>) -> Self {
        Self {
            group,
            id: id.into(),
            was_open: false,
            reset_timer: TimerSlot::new(),
        }
    }

    /// This member's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The shared group.
    pub fn group(&self) -> &Rc<DelayGroup> {
        &self.group
    }

    fn reset_if_current(&self) {
        if self.group.is_current(&self.id) {
            self.group.reset();
        }
    }
}

impl<K: Copy, H: Scheduler> Interaction<K, H> for DelayGroupMember {
    fn sync(&mut self, ctx: &mut FloatingContext<K>, host: &mut H) {
        let open = ctx.open();
        if open && !self.was_open {
            let close = get_delay(&self.group.initial_delay(), DelayProp::Close, None);
            self.group.set_delay(Delay::Split {
                open: Some(1),
                close,
            });
            self.group.set_current_id(Some(&self.id));
        }
        self.was_open = open;

        if open && self.group.current_id().is_some() && !self.group.is_current(&self.id) {
            tracing::debug!(id = %self.id, "closing non-current delay group member");
            ctx.on_open_change(false, None, None);
            self.was_open = false;
        }

        let awaiting_reset = !ctx.open() && self.group.is_current(&self.id);
        if awaiting_reset {
            if !self.reset_timer.is_armed() {
                match self.group.timeout_ms() {
                    0 => self.reset_if_current(),
                    ms => {
                        self.reset_timer.arm(host, ms);
                    }
                }
            }
        } else {
            self.reset_timer.cancel(host);
        }
    }

    fn on_timer(&mut self, _ctx: &mut FloatingContext<K>, _host: &mut H, id: TimerId) -> bool {
        if !self.reset_timer.fire(id) {
            return false;
        }
        self.reset_if_current();
        true
    }

    fn teardown(&mut self, _ctx: &mut FloatingContext<K>, host: &mut H) {
        self.reset_timer.cancel(host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryDom, NodeId};
    use crate::hover::{Hover, HoverOptions};
    use crate::interactions::{HandlerKey, Interactions, Slot};
    use crate::types::{DomEvent, EventKind};

    const INITIAL: Delay = Delay::Split {
        open: Some(500),
        close: Some(200),
    };

    const FAST: Delay = Delay::Split {
        open: Some(1),
        close: Some(200),
    };

    struct Member {
        ctx: FloatingContext<NodeId>,
        interactions: Interactions<NodeId, MemoryDom>,
    }

    impl Member {
        fn new(group: &Rc<DelayGroup>, id: &str, dom: &mut MemoryDom) -> Self {
            let mut ctx = FloatingContext::new().with_open(false);
            let mut interactions =
                Interactions::new().with(DelayGroupMember::new(group.clone(), id));
            interactions.sync(&mut ctx, dom);
            Self { ctx, interactions }
        }

        fn set_open(&mut self, dom: &mut MemoryDom, open: bool) {
            self.ctx.on_open_change(open, None, None);
            self.interactions.sync(&mut self.ctx, dom);
        }

        fn sync(&mut self, dom: &mut MemoryDom) {
            self.interactions.sync(&mut self.ctx, dom);
        }
    }

    fn advance(dom: &mut MemoryDom, members: &mut [&mut Member], ms: u64) {
        for id in dom.advance(ms) {
            for m in members.iter_mut() {
                m.interactions.on_timer(&mut m.ctx, dom, id);
            }
        }
    }

    fn group(timeout_ms: u32) -> Rc<DelayGroup> {
        Rc::new(DelayGroup::new(INITIAL).with_timeout_ms(timeout_ms))
    }

    #[test]
    fn instant_phase_follows_current_id() {
        let group = DelayGroup::new(Delay::Fixed(0));
        group.set_current_id(Some("a"));
        assert!(!group.is_instant_phase());
        group.set_current_id(Some("a"));
        assert!(!group.is_instant_phase());
        group.set_current_id(Some("b"));
        assert!(group.is_instant_phase());
        group.set_current_id(None);
        assert!(!group.is_instant_phase());
        group.set_current_id(Some("c"));
        assert!(!group.is_instant_phase());
    }

    #[test]
    fn second_member_takes_over_and_group_resets_after_timeout() {
        let group = group(300);
        let mut dom = MemoryDom::new();
        let mut a = Member::new(&group, "a", &mut dom);
        let mut b = Member::new(&group, "b", &mut dom);

        a.set_open(&mut dom, true);
        assert_eq!(group.current_id().as_deref(), Some("a"));
        assert_eq!(group.delay(), FAST);
        assert!(!group.is_instant_phase());

        b.set_open(&mut dom, true);
        a.sync(&mut dom);
        assert!(!a.ctx.open());
        assert!(b.ctx.open());
        assert_eq!(group.current_id().as_deref(), Some("b"));
        assert!(group.is_instant_phase());

        b.set_open(&mut dom, false);
        a.sync(&mut dom);
        assert_eq!(dom.pending_timers(), 1);
        advance(&mut dom, &mut [&mut a, &mut b], 299);
        assert_eq!(group.delay(), FAST);

        advance(&mut dom, &mut [&mut a, &mut b], 1);
        assert_eq!(group.delay(), INITIAL);
        assert_eq!(group.current_id(), None);
        assert!(!group.is_instant_phase());
        assert_eq!(dom.pending_timers(), 0);
    }

    #[test]
    fn reopening_during_timeout_cancels_reset() {
        let group = group(300);
        let mut dom = MemoryDom::new();
        let mut a = Member::new(&group, "a", &mut dom);

        a.set_open(&mut dom, true);
        a.set_open(&mut dom, false);
        assert_eq!(dom.pending_timers(), 1);
        a.set_open(&mut dom, true);
        assert_eq!(dom.pending_timers(), 0);
        advance(&mut dom, &mut [&mut a], 500);
        assert_eq!(group.delay(), FAST);
        assert!(group.is_current("a"));
    }

    #[test]
    fn new_current_member_cancels_previous_reset() {
        let group = group(300);
        let mut dom = MemoryDom::new();
        let mut a = Member::new(&group, "a", &mut dom);
        let mut b = Member::new(&group, "b", &mut dom);

        a.set_open(&mut dom, true);
        a.set_open(&mut dom, false);
        b.set_open(&mut dom, true);
        a.sync(&mut dom);
        assert_eq!(dom.pending_timers(), 0);
        advance(&mut dom, &mut [&mut a, &mut b], 500);
        assert!(group.is_current("b"));
        assert_eq!(group.delay(), FAST);
    }

    #[test]
    fn zero_timeout_resets_immediately() {
        let group = group(0);
        let mut dom = MemoryDom::new();
        let mut a = Member::new(&group, "a", &mut dom);
        a.set_open(&mut dom, true);
        a.set_open(&mut dom, false);
        assert_eq!(dom.pending_timers(), 0);
        assert_eq!(group.current_id(), None);
        assert_eq!(group.delay(), INITIAL);
    }

    #[test]
    fn teardown_cancels_pending_reset() {
        let group = group(300);
        let mut dom = MemoryDom::new();
        let mut a = Member::new(&group, "a", &mut dom);
        a.set_open(&mut dom, true);
        a.set_open(&mut dom, false);
        a.interactions.teardown(&mut a.ctx, &mut dom);
        assert_eq!(dom.pending_timers(), 0);
        assert!(group.is_current("a"));
    }

    #[test]
    fn hover_reads_the_group_delay() {
        let group = group(300);
        let mut dom = MemoryDom::new();
        let body = dom.body();
        let reference = dom.create_element(body, "button");
        let floating = dom.create_element(body, "div");

        let mut other = Member::new(&group, "other", &mut dom);
        other.set_open(&mut dom, true);
        assert_eq!(group.delay(), FAST);

        let mut a = Member::new(&group, "a", &mut dom);
        a.ctx.set_reference(Some(reference));
        a.ctx.set_floating(Some(floating));
        a.interactions.push(Hover::new(HoverOptions::default()).with_delay_group(group.clone()));
        a.sync(&mut dom);

        let enter = DomEvent::new(EventKind::MouseEnter).with_target(reference);
        a.interactions.dispatch(
            &mut a.ctx,
            &mut dom,
            Slot::Reference,
            HandlerKey::bubble(EventKind::MouseEnter),
            &enter,
            None,
        );
        assert!(!a.ctx.open());
        advance(&mut dom, &mut [&mut a, &mut other], 1);
        assert!(a.ctx.open());
        assert!(group.is_current("a"));
        assert!(group.is_instant_phase());

        other.sync(&mut dom);
        assert!(!other.ctx.open());
    }
}

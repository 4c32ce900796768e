// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Focus: open while the reference has (keyboard) focus.
//!
//! With `visible_only`, a focus only opens when the host reports the
//! reference as `:focus-visible`. Hosts that cannot answer that (and Safari on
//! macOS, which answers unreliably) fall back to tracking input modality: the
//! last input was a key press, or the reference accepts typed text.
//!
//! Focus that follows a reference press or an escape-key dismissal does not
//! reopen the element, and neither does returning to a window that was left
//! while the reference was focused and the element closed.

use alloc::rc::Rc;
use core::cell::Cell;

use crate::bus::{OPEN_CHANGE, Subscription};
use crate::context::{FloatingContext, OpenChange};
use crate::dom::{Dom, contains, create_attribute, is_typeable_element, is_virtual_pointer_event};
use crate::error::{Capability, Error};
use crate::host::{
    Host, ListenerId, ListenerOptions, ListenerSet, ListenerTarget, NodeKey, TimerId, TimerSlot,
};
use crate::interactions::{ElementProps, HandlerKey, Interaction, ItemState, Slot};
use crate::types::{DomEvent, EventKind, OpenChangeReason, Outcome};

/// Options for [`Focus`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FocusOptions {
    /// Master switch.
    pub enabled: bool,
    /// Only open for `:focus-visible` (keyboard) focus.
    pub visible_only: bool,
}

impl Default for FocusOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            visible_only: true,
        }
    }
}

#[derive(Clone, Debug)]
struct PendingBlur<K> {
    event: DomEvent<K>,
    related: Option<K>,
    moved_to_guard: bool,
}

/// Focus controller.
#[derive(Debug)]
pub struct Focus<K> {
    options: FocusOptions,
    block_focus: Rc<Cell<bool>>,
    keyboard_modality: bool,
    subscription: Option<Subscription>,
    listeners: ListenerSet<K>,
    window_blur: Option<ListenerId>,
    window_key_down: Option<ListenerId>,
    blur_timer: TimerSlot,
    pending_blur: Option<PendingBlur<K>>,
}

impl<K: NodeKey> Focus<K> {
    /// A controller with the given options.
    pub fn new(options: FocusOptions) -> Self {
        Self {
            options,
            block_focus: Rc::new(Cell::new(false)),
            keyboard_modality: true,
            subscription: None,
            listeners: ListenerSet::new(),
            window_blur: None,
            window_key_down: None,
            blur_timer: TimerSlot::new(),
            pending_blur: None,
        }
    }

    /// Options in effect.
    pub fn options(&self) -> &FocusOptions {
        &self.options
    }

    /// Whether the next focus is ignored.
    pub fn is_focus_blocked(&self) -> bool {
        self.block_focus.get()
    }

    /// Whether the last input was a key press.
    pub fn keyboard_modality(&self) -> bool {
        self.keyboard_modality
    }

    fn focus_is_visible(&self, dom: &(impl Dom<K> + ?Sized), target: &K) -> Result<bool, Error> {
        let env = dom.environment();
        if env.safari && env.mac {
            return Err(Error::Unsupported(Capability::FocusVisible));
        }
        dom.matches_focus_visible(target)
    }

    fn on_focus(
        &mut self,
        ctx: &mut FloatingContext<K>,
        dom: &(impl Dom<K> + ?Sized),
        event: &DomEvent<K>,
    ) {
        if self.block_focus.get() {
            return;
        }
        let target = event.target().filter(|t| dom.is_element(t));
        if let (true, Some(target)) = (self.options.visible_only, target) {
            let visible = match self.focus_is_visible(dom, &target) {
                Ok(visible) => visible,
                Err(err) => {
                    tracing::trace!(%err, "using keyboard modality");
                    self.keyboard_modality || is_typeable_element(dom, Some(&target))
                }
            };
            if !visible {
                return;
            }
        }
        ctx.on_open_change(true, Some(event), Some(OpenChangeReason::Focus));
    }

    fn on_blur(&mut self, host: &mut (impl Host<K> + ?Sized), event: &DomEvent<K>) {
        self.block_focus.set(false);
        let related = event.related_target;
        let moved_to_guard = related.is_some_and(|r| {
            host.is_element(&r)
                && host.has_attribute(&r, &create_attribute("focus-guard"))
                && host.attribute(&r, "data-type") == Some("outside")
        });
        self.pending_blur = Some(PendingBlur {
            event: event.clone(),
            related,
            moved_to_guard,
        });
        // Runs after the window blur listener.
        self.blur_timer.arm(host, 0);
    }

    fn on_blur_timeout(&mut self, ctx: &mut FloatingContext<K>, dom: &(impl Dom<K> + ?Sized)) {
        let Some(pending) = self.pending_blur.take() else {
            return;
        };
        let active = dom.active_element();
        let elements = ctx.elements();
        // Focus left the page.
        if pending.related.is_none() && active.is_some() && active == elements.reference {
            return;
        }
        if contains(dom, elements.floating, active)
            || contains(dom, elements.reference, active)
            || pending.moved_to_guard
        {
            return;
        }
        ctx.on_open_change(false, Some(&pending.event), Some(OpenChangeReason::Focus));
    }

    fn attach(&mut self, ctx: &mut FloatingContext<K>, host: &mut (impl Host<K> + ?Sized)) {
        if self.subscription.is_none() {
            let block = Rc::clone(&self.block_focus);
            self.subscription = Some(ctx.events.on(OPEN_CHANGE, move |change: &OpenChange<K>| {
                if matches!(
                    change.reason,
                    Some(OpenChangeReason::ReferencePress | OpenChangeReason::EscapeKey)
                ) {
                    block.set(true);
                }
            }));
        }
        if self.window_blur.is_none() {
            self.window_blur = self.listeners.attach(
                host,
                ListenerTarget::Window,
                EventKind::Blur,
                ListenerOptions::empty(),
            );
        }
        if self.window_key_down.is_none() {
            self.window_key_down = self.listeners.attach(
                host,
                ListenerTarget::Window,
                EventKind::KeyDown,
                ListenerOptions::CAPTURE,
            );
        }
    }

    fn detach(&mut self, ctx: &mut FloatingContext<K>, host: &mut (impl Host<K> + ?Sized)) {
        if let Some(sub) = self.subscription.take() {
            ctx.events.off(sub);
        }
        self.listeners.detach_all(host);
        self.window_blur = None;
        self.window_key_down = None;
    }
}

impl<K: NodeKey, H: Host<K>> Interaction<K, H> for Focus<K> {
    fn props(&self, _ctx: &FloatingContext<K>, slot: Slot, _item: ItemState) -> ElementProps {
        if !self.options.enabled || slot != Slot::Reference {
            return ElementProps::new();
        }
        ElementProps::new()
            .with_handler(HandlerKey::bubble(EventKind::PointerDown))
            .with_handler(HandlerKey::bubble(EventKind::MouseLeave))
            .with_handler(HandlerKey::bubble(EventKind::Focus))
            .with_handler(HandlerKey::bubble(EventKind::Blur))
    }

    fn handle(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        slot: Slot,
        key: HandlerKey,
        event: &DomEvent<K>,
    ) -> Option<Outcome> {
        if !self.options.enabled || slot != Slot::Reference || key.capture {
            return None;
        }
        match key.kind {
            EventKind::PointerDown => {
                if !is_virtual_pointer_event(host.environment(), event) {
                    self.keyboard_modality = false;
                }
            }
            EventKind::MouseLeave => self.block_focus.set(false),
            EventKind::Focus => self.on_focus(ctx, &*host, event),
            EventKind::Blur => self.on_blur(host, event),
            _ => {}
        }
        None
    }

    fn sync(&mut self, ctx: &mut FloatingContext<K>, host: &mut H) {
        self.blur_timer.flush(host);
        if self.options.enabled {
            self.attach(ctx, host);
        } else {
            self.detach(ctx, host);
        }
    }

    fn on_listener(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        id: ListenerId,
        _event: &DomEvent<K>,
    ) -> bool {
        if self.window_blur == Some(id) {
            let reference = ctx.elements().reference;
            if !ctx.open()
                && reference.is_some_and(|r| host.is_element(&r))
                && reference == host.active_element()
            {
                self.block_focus.set(true);
            }
            return true;
        }
        if self.window_key_down == Some(id) {
            self.keyboard_modality = true;
            return true;
        }
        false
    }

    fn on_timer(&mut self, ctx: &mut FloatingContext<K>, host: &mut H, id: TimerId) -> bool {
        if !self.blur_timer.fire(id) {
            return false;
        }
        self.on_blur_timeout(ctx, &*host);
        true
    }

    fn teardown(&mut self, ctx: &mut FloatingContext<K>, host: &mut H) {
        self.blur_timer.cancel(host);
        self.pending_blur = None;
        self.detach(ctx, host);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryDom, NodeId};
    use crate::dom::Environment;
    use crate::interactions::Interactions;
    use crate::types::PointerInfo;
    use crate::types::PointerType;

    struct Fixture {
        dom: MemoryDom,
        ctx: FloatingContext<NodeId>,
        interactions: Interactions<NodeId, MemoryDom>,
        reference: NodeId,
        floating: NodeId,
    }

    impl Fixture {
        fn new(tag: &str, options: FocusOptions) -> Self {
            let mut dom = MemoryDom::new();
            let reference = dom.create_element(dom.body(), tag);
            let floating = dom.create_element(dom.body(), "div");
            let mut ctx = FloatingContext::new().with_open(false);
            ctx.set_reference(Some(reference));
            ctx.set_floating(Some(floating));
            let mut interactions = Interactions::new().with(Focus::new(options));
            interactions.sync(&mut ctx, &mut dom);
            Self {
                dom,
                ctx,
                interactions,
                reference,
                floating,
            }
        }

        fn send(&mut self, event: &DomEvent<NodeId>) {
            self.interactions.dispatch(
                &mut self.ctx,
                &mut self.dom,
                Slot::Reference,
                HandlerKey::bubble(event.kind),
                event,
                None,
            );
        }

        fn focus(&mut self) {
            self.dom.focus(Some(self.reference));
            let ev = DomEvent::new(EventKind::Focus).with_target(self.reference);
            self.send(&ev);
        }

        fn blur(&mut self, related: Option<NodeId>) {
            self.dom.focus(related);
            let ev = DomEvent::new(EventKind::Blur)
                .with_target(self.reference)
                .with_related_target(related);
            self.send(&ev);
        }

        fn window(&mut self, kind: EventKind) {
            let ev = DomEvent::new(kind);
            for id in self.dom.listeners_for(ListenerTarget::Window, kind) {
                self.interactions
                    .on_listener(&mut self.ctx, &mut self.dom, id, &ev);
            }
        }

        fn run_timers(&mut self) {
            for id in self.dom.advance(0) {
                self.interactions.on_timer(&mut self.ctx, &mut self.dom, id);
            }
        }
    }

    fn mouse_down() -> DomEvent<NodeId> {
        DomEvent::new(EventKind::PointerDown).with_pointer(PointerInfo::new(PointerType::Mouse))
    }

    #[test]
    fn keyboard_focus_opens_when_focus_visible() {
        let mut f = Fixture::new("button", FocusOptions::default());
        f.dom.set_focus_visible(f.reference, true);
        f.focus();
        assert!(f.ctx.open());
    }

    #[test]
    fn pointer_focus_without_focus_visible_does_not_open() {
        let mut f = Fixture::new("button", FocusOptions::default());
        f.focus();
        assert!(!f.ctx.open());

        let mut any = Fixture::new(
            "button",
            FocusOptions {
                visible_only: false,
                ..FocusOptions::default()
            },
        );
        any.focus();
        assert!(any.ctx.open());
    }

    #[test]
    fn unsupported_focus_visible_falls_back_to_modality() {
        let mut f = Fixture::new("button", FocusOptions::default());
        f.dom.set_focus_visible_supported(false);
        // Keyboard modality is the initial assumption.
        f.focus();
        assert!(f.ctx.open());

        let mut g = Fixture::new("button", FocusOptions::default());
        g.dom.set_focus_visible_supported(false);
        g.send(&mouse_down());
        g.focus();
        assert!(!g.ctx.open());
        g.window(EventKind::KeyDown);
        g.focus();
        assert!(g.ctx.open());
    }

    #[test]
    fn safari_on_mac_uses_modality_for_typeable_references() {
        let mut f = Fixture::new("input", FocusOptions::default());
        f.dom.set_environment(Environment {
            safari: true,
            mac: true,
            ..Environment::default()
        });
        f.send(&mouse_down());
        // Not focus-visible according to the host, but typeable.
        f.focus();
        assert!(f.ctx.open());
    }

    #[test]
    fn virtual_pointer_keeps_keyboard_modality() {
        let mut f = Fixture::new("button", FocusOptions::default());
        f.dom.set_focus_visible_supported(false);
        let mut info = PointerInfo::new(PointerType::Mouse);
        info.width = 0.0;
        info.height = 0.0;
        f.send(&DomEvent::new(EventKind::PointerDown).with_pointer(info));
        f.focus();
        assert!(f.ctx.open());
    }

    #[test]
    fn blur_closes_after_zero_delay_unless_focus_moved_inside() {
        let mut f = Fixture::new("button", FocusOptions::default());
        f.dom.set_focus_visible(f.reference, true);
        f.focus();
        let inner = f.dom.create_element(f.floating, "a");
        f.blur(Some(inner));
        assert!(f.ctx.open());
        f.run_timers();
        assert!(f.ctx.open());

        let outside = f.dom.create_element(f.dom.body(), "input");
        f.blur(Some(outside));
        f.run_timers();
        assert!(!f.ctx.open());
    }

    #[test]
    fn blur_to_focus_guard_keeps_open() {
        let mut f = Fixture::new("button", FocusOptions::default());
        f.dom.set_focus_visible(f.reference, true);
        f.focus();
        let guard = f.dom.create_element(f.dom.body(), "span");
        f.dom
            .set_attribute(&guard, "data-floating-ui-focus-guard", Some(""));
        f.dom.set_attribute(&guard, "data-type", Some("outside"));
        f.blur(Some(guard));
        f.run_timers();
        assert!(f.ctx.open());
    }

    #[test]
    fn leaving_the_page_keeps_open() {
        let mut f = Fixture::new("button", FocusOptions::default());
        f.dom.set_focus_visible(f.reference, true);
        f.focus();
        // The reference stays the active element of the hidden document.
        let ev = DomEvent::new(EventKind::Blur).with_target(f.reference);
        f.send(&ev);
        f.run_timers();
        assert!(f.ctx.open());
    }

    #[test]
    fn escape_dismissal_blocks_refocus_until_mouse_leave() {
        let mut f = Fixture::new("button", FocusOptions::default());
        f.dom.set_focus_visible(f.reference, true);
        f.focus();
        f.ctx
            .on_open_change(false, None, Some(OpenChangeReason::EscapeKey));
        f.focus();
        assert!(!f.ctx.open());
        f.send(&DomEvent::new(EventKind::MouseLeave));
        f.focus();
        assert!(f.ctx.open());
    }

    #[test]
    fn returning_to_window_does_not_reopen() {
        let mut f = Fixture::new("button", FocusOptions::default());
        f.dom.set_focus_visible(f.reference, true);
        f.dom.focus(Some(f.reference));
        f.window(EventKind::Blur);
        f.focus();
        assert!(!f.ctx.open());
    }

    #[test]
    fn window_listeners_follow_enabled() {
        let mut f = Fixture::new("button", FocusOptions::default());
        assert_eq!(f.dom.listener_count(), 2);
        f.interactions.teardown(&mut f.ctx, &mut f.dom);
        assert_eq!(f.dom.listener_count(), 0);
        assert_eq!(f.ctx.events.subscriber_count(OPEN_CHANGE), 0);

        let g = Fixture::new(
            "button",
            FocusOptions {
                enabled: false,
                ..FocusOptions::default()
            },
        );
        assert_eq!(g.dom.listener_count(), 0);
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Click: toggle the floating element from the reference.
//!
//! Mouse input uses `click` or `mousedown`; keyboard input mirrors native
//! buttons for non-button references (Enter on key down, Space on key up).

use crate::context::FloatingContext;
use crate::dom::{Dom, is_typeable_element};
use crate::host::{Host, NodeKey};
use crate::interactions::{ElementProps, HandlerKey, Interaction, ItemState, Slot};
use crate::types::{DomEvent, EventKind, Key, OpenChangeReason, Outcome, PointerType, is_mouse_like};

/// Mouse event that counts as a click.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ClickEvent {
    /// `click`
    #[default]
    Click,
    /// `mousedown`; the default action is prevented when opening, so focus
    /// stays where it is.
    MouseDown,
}

/// Options for [`Click`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ClickOptions {
    /// Master switch.
    pub enabled: bool,
    /// Mouse event that toggles.
    pub event: ClickEvent,
    /// Repeated clicks close again.
    pub toggle: bool,
    /// Ignore mouse input, e.g. when hover already handles it.
    pub ignore_mouse: bool,
    /// Enter/Space handling for non-button references.
    pub keyboard_handlers: bool,
}

impl Default for ClickOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            event: ClickEvent::default(),
            toggle: true,
            ignore_mouse: false,
            keyboard_handlers: true,
        }
    }
}

/// Click controller.
#[derive(Clone, Debug)]
pub struct Click {
    options: ClickOptions,
    pointer_type: Option<PointerType>,
    did_key_down: bool,
}

impl Click {
    /// A controller with the given options.
    pub fn new(options: ClickOptions) -> Self {
        Self {
            options,
            pointer_type: None,
            did_key_down: false,
        }
    }

    /// Options in effect.
    pub fn options(&self) -> &ClickOptions {
        &self.options
    }

    fn ignores_mouse(&self) -> bool {
        self.options.ignore_mouse && is_mouse_like(self.pointer_type, true)
    }

    fn toggle<K: Copy>(
        &self,
        ctx: &mut FloatingContext<K>,
        event: &DomEvent<K>,
        same_kind: impl FnOnce(EventKind) -> bool,
    ) {
        let close = ctx.open()
            && self.options.toggle
            && ctx.open_event().is_none_or(|e| same_kind(e.kind));
        ctx.on_open_change(!close, Some(event), Some(OpenChangeReason::Click));
    }
}

fn is_button_target<K: Copy>(dom: &(impl Dom<K> + ?Sized), event: &DomEvent<K>) -> bool {
    event
        .target()
        .is_some_and(|t| dom.tag_name(&t) == Some("BUTTON"))
}

impl<K: NodeKey, H: Host<K>> Interaction<K, H> for Click {
    fn props(&self, _ctx: &FloatingContext<K>, slot: Slot, _item: ItemState) -> ElementProps {
        if !self.options.enabled || slot != Slot::Reference {
            return ElementProps::new();
        }
        ElementProps::new()
            .with_handler(HandlerKey::bubble(EventKind::PointerDown))
            .with_handler(HandlerKey::bubble(EventKind::MouseDown))
            .with_handler(HandlerKey::bubble(EventKind::Click))
            .with_handler(HandlerKey::bubble(EventKind::KeyDown))
            .with_handler(HandlerKey::bubble(EventKind::KeyUp))
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
            EventKind::PointerDown => self.pointer_type = event.pointer_type(),
            EventKind::MouseDown => {
                if event.button != 0 || self.ignores_mouse() {
                    return None;
                }
                if self.options.event == ClickEvent::Click {
                    return None;
                }
                let opening = !(ctx.open()
                    && self.options.toggle
                    && ctx
                        .open_event()
                        .is_none_or(|e| e.kind == EventKind::MouseDown));
                if opening {
                    event.prevent_default();
                }
                self.toggle(ctx, event, |kind| kind == EventKind::MouseDown);
            }
            EventKind::Click => {
                if self.options.event == ClickEvent::MouseDown && self.pointer_type.is_some() {
                    self.pointer_type = None;
                    return None;
                }
                if self.ignores_mouse() {
                    return None;
                }
                self.toggle(ctx, event, |kind| kind == EventKind::Click);
            }
            EventKind::KeyDown => {
                self.pointer_type = None;
                if event.is_default_prevented()
                    || !self.options.keyboard_handlers
                    || is_button_target(&*host, event)
                {
                    return None;
                }
                let reference = ctx.elements().reference;
                if event.key == Some(Key::Space) && !is_typeable_element(&*host, reference.as_ref())
                {
                    // Prevents scrolling.
                    event.prevent_default();
                    self.did_key_down = true;
                }
                if event.key == Some(Key::Enter) {
                    self.toggle(ctx, event, |_| true);
                }
            }
            EventKind::KeyUp => {
                let reference = ctx.elements().reference;
                if event.is_default_prevented()
                    || !self.options.keyboard_handlers
                    || is_button_target(&*host, event)
                    || is_typeable_element(&*host, reference.as_ref())
                {
                    return None;
                }
                if event.key == Some(Key::Space) && self.did_key_down {
                    self.did_key_down = false;
                    self.toggle(ctx, event, |_| true);
                }
            }
            _ => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryDom, NodeId};
    use crate::interactions::Interactions;

    struct Fixture {
        dom: MemoryDom,
        ctx: FloatingContext<NodeId>,
        interactions: Interactions<NodeId, MemoryDom>,
        reference: NodeId,
    }

    impl Fixture {
        fn new(tag: &str, options: ClickOptions) -> Self {
            let mut dom = MemoryDom::new();
            let reference = dom.create_element(dom.body(), tag);
            let floating = dom.create_element(dom.body(), "div");
            let mut ctx = FloatingContext::new().with_open(false);
            ctx.set_reference(Some(reference));
            ctx.set_floating(Some(floating));
            let interactions = Interactions::new().with(Click::new(options));
            Self {
                dom,
                ctx,
                interactions,
                reference,
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

        fn ev(&self, kind: EventKind) -> DomEvent<NodeId> {
            DomEvent::new(kind).with_target(self.reference)
        }

        fn key(&self, kind: EventKind, key: Key) -> DomEvent<NodeId> {
            self.ev(kind).with_key(key)
        }
    }

    #[test]
    fn click_toggles() {
        let mut f = Fixture::new("button", ClickOptions::default());
        f.send(&f.ev(EventKind::Click));
        assert!(f.ctx.open());
        assert_eq!(f.ctx.open_event().map(|e| e.kind), Some(EventKind::Click));
        f.send(&f.ev(EventKind::Click));
        assert!(!f.ctx.open());
    }

    #[test]
    fn without_toggle_click_keeps_open() {
        let mut f = Fixture::new(
            "button",
            ClickOptions {
                toggle: false,
                ..ClickOptions::default()
            },
        );
        f.send(&f.ev(EventKind::Click));
        f.send(&f.ev(EventKind::Click));
        assert!(f.ctx.open());
    }

    #[test]
    fn hover_opened_element_is_not_closed_by_click() {
        let mut f = Fixture::new("button", ClickOptions::default());
        let enter = f.ev(EventKind::MouseEnter);
        f.ctx
            .on_open_change(true, Some(&enter), Some(OpenChangeReason::Hover));
        f.send(&f.ev(EventKind::Click));
        assert!(f.ctx.open());
        assert_eq!(f.ctx.open_event().map(|e| e.kind), Some(EventKind::Click));
    }

    #[test]
    fn mousedown_mode_prevents_default_when_opening() {
        let mut f = Fixture::new(
            "button",
            ClickOptions {
                event: ClickEvent::MouseDown,
                ..ClickOptions::default()
            },
        );
        let pd = f.ev(EventKind::PointerDown).with_pointer_type(PointerType::Mouse);
        f.send(&pd);
        let down = f.ev(EventKind::MouseDown);
        f.send(&down);
        assert!(f.ctx.open());
        assert!(down.is_default_prevented());
        // The click that follows the mousedown is swallowed.
        f.send(&f.ev(EventKind::Click));
        assert!(f.ctx.open());

        let second = f.ev(EventKind::MouseDown);
        f.send(&second);
        assert!(!f.ctx.open());
        assert!(!second.is_default_prevented());
    }

    #[test]
    fn secondary_button_is_ignored() {
        let mut f = Fixture::new(
            "button",
            ClickOptions {
                event: ClickEvent::MouseDown,
                ..ClickOptions::default()
            },
        );
        f.send(&f.ev(EventKind::MouseDown).with_button(2));
        assert!(!f.ctx.open());
    }

    #[test]
    fn ignore_mouse_still_accepts_touch() {
        let mut f = Fixture::new(
            "button",
            ClickOptions {
                ignore_mouse: true,
                ..ClickOptions::default()
            },
        );
        f.send(&f.ev(EventKind::PointerDown).with_pointer_type(PointerType::Mouse));
        f.send(&f.ev(EventKind::Click));
        assert!(!f.ctx.open());
        f.send(&f.ev(EventKind::PointerDown).with_pointer_type(PointerType::Touch));
        f.send(&f.ev(EventKind::Click));
        assert!(f.ctx.open());
    }

    #[test]
    fn enter_toggles_on_key_down() {
        let mut f = Fixture::new("div", ClickOptions::default());
        f.send(&f.key(EventKind::KeyDown, Key::Enter));
        assert!(f.ctx.open());
        f.send(&f.key(EventKind::KeyDown, Key::Enter));
        assert!(!f.ctx.open());
    }

    #[test]
    fn space_toggles_on_key_up_after_key_down() {
        let mut f = Fixture::new("div", ClickOptions::default());
        f.send(&f.key(EventKind::KeyUp, Key::Space));
        assert!(!f.ctx.open());
        let down = f.key(EventKind::KeyDown, Key::Space);
        f.send(&down);
        assert!(down.is_default_prevented());
        assert!(!f.ctx.open());
        f.send(&f.key(EventKind::KeyUp, Key::Space));
        assert!(f.ctx.open());
    }

    #[test]
    fn button_targets_use_native_activation() {
        let mut f = Fixture::new("button", ClickOptions::default());
        f.send(&f.key(EventKind::KeyDown, Key::Enter));
        assert!(!f.ctx.open());
    }

    #[test]
    fn space_is_ignored_on_typeable_reference() {
        let mut f = Fixture::new("input", ClickOptions::default());
        let down = f.key(EventKind::KeyDown, Key::Space);
        f.send(&down);
        assert!(!down.is_default_prevented());
        f.send(&f.key(EventKind::KeyUp, Key::Space));
        assert!(!f.ctx.open());
        // Enter still works.
        f.send(&f.key(EventKind::KeyDown, Key::Enter));
        assert!(f.ctx.open());
    }

    #[test]
    fn prevented_or_disabled_keyboard_does_nothing() {
        let mut f = Fixture::new(
            "div",
            ClickOptions {
                keyboard_handlers: false,
                ..ClickOptions::default()
            },
        );
        f.send(&f.key(EventKind::KeyDown, Key::Enter));
        assert!(!f.ctx.open());

        let mut g = Fixture::new("div", ClickOptions::default());
        let prevented = g.key(EventKind::KeyDown, Key::Enter);
        prevented.prevent_default();
        g.send(&prevented);
        assert!(!g.ctx.open());
    }
}

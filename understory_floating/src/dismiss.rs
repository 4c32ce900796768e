// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dismissal: close on escape, outside press, reference press, or ancestor
//! scroll.
//!
//! ## Outside press
//!
//! A press delivered to the document closes the floating element unless one
//! of these holds, checked in order:
//!
//! 1. With [`PressEvent::Click`], the press started or ended inside the
//!    floating element (a drag out of it).
//! 2. The floating element's capture handler saw the press first, so it
//!    happened inside the floating tree. The marker is cleared on every
//!    check.
//! 3. The [`OutsidePress::Filter`] rejects the event.
//! 4. Inert markers (`data-floating-ui-inert`) exist, the target is a
//!    regular element that does not contain the floating element, and its
//!    top-level ancestor contains none of the markers: the target was
//!    injected by a third party after the markers were placed.
//! 5. The press hit the target's own scrollbar.
//! 6. The target is within the floating or reference element, including
//!    through shadow roots when the event carries a composed path.
//!
//! ## Listener lifecycle
//!
//! Document and ancestor listeners exist only while the context is open and
//! the controller is enabled. They are rebuilt when the elements change and
//! removed on [`Interaction::teardown`].

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::context::{Elements, FloatingContext};
use crate::dom::{
    contains, create_attribute, is_event_target_within, is_root_element, top_level_ancestor, Dom,
};
use crate::host::{Host, ListenerId, ListenerOptions, ListenerSet, ListenerTarget, NodeKey};
use crate::interactions::{ElementProps, HandlerKey, Interaction, ItemState, Slot};
use crate::types::{DomEvent, EventKind, Key, OpenChangeReason, Outcome};

/// Event kind that counts as a press.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum PressEvent {
    /// Eager on mouse and touch.
    #[default]
    PointerDown,
    /// Eager on mouse, lazy on touch.
    MouseDown,
    /// Lazy on mouse and touch.
    Click,
}

impl PressEvent {
    /// Host event kind.
    pub const fn kind(self) -> EventKind {
        match self {
            Self::PointerDown => EventKind::PointerDown,
            Self::MouseDown => EventKind::MouseDown,
            Self::Click => EventKind::Click,
        }
    }
}

/// A flag set for the escape and outside-press listeners.
///
/// Used for both bubbling and capture. Normalizes to
/// `(escape_key, outside_press)`, defaulting to `(false, true)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DismissFlags {
    /// Same value for both.
    All(bool),
    /// Independent values; `None` takes the default.
    Split {
        /// Escape key listener.
        escape_key: Option<bool>,
        /// Outside press listener.
        outside_press: Option<bool>,
    },
}

impl Default for DismissFlags {
    fn default() -> Self {
        Self::Split {
            escape_key: None,
            outside_press: None,
        }
    }
}

impl DismissFlags {
    /// `(escape_key, outside_press)`.
    pub fn normalize(self) -> (bool, bool) {
        match self {
            Self::All(v) => (v, v),
            Self::Split {
                escape_key,
                outside_press,
            } => (escape_key.unwrap_or(false), outside_press.unwrap_or(true)),
        }
    }
}

type PressFilter<K> = Box<dyn Fn(&DomEvent<K>) -> bool>;

/// Whether outside presses dismiss.
pub enum OutsidePress<K> {
    /// Fixed answer.
    Enabled(bool),
    /// Dismiss only when the predicate returns `true`.
    Filter(PressFilter<K>),
}

impl<K> Default for OutsidePress<K> {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

impl<K> fmt::Debug for OutsidePress<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled(v) => f.debug_tuple("Enabled").field(v).finish(),
            Self::Filter(_) => f.write_str("Filter(..)"),
        }
    }
}

impl<K> OutsidePress<K> {
    /// A predicate-gated outside press.
    pub fn filter(f: impl Fn(&DomEvent<K>) -> bool + 'static) -> Self {
        Self::Filter(Box::new(f))
    }

    fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }
}

/// Options for [`Dismiss`].
#[derive(Debug)]
pub struct DismissOptions<K> {
    /// Master switch for handlers and listeners.
    pub enabled: bool,
    /// Close on `Escape`.
    pub escape_key: bool,
    /// Close when the reference is pressed.
    pub reference_press: bool,
    /// Event kind of a reference press.
    pub reference_press_event: PressEvent,
    /// Close on presses outside both elements.
    pub outside_press: OutsidePress<K>,
    /// Event kind of an outside press.
    pub outside_press_event: PressEvent,
    /// Close when an overflow ancestor scrolls.
    pub ancestor_scroll: bool,
    /// Whether escape/outside-press propagation continues after a dismissal.
    pub bubbles: DismissFlags,
    /// Whether escape/outside-press listeners use the capture phase.
    pub capture: DismissFlags,
}

impl<K> Default for DismissOptions<K> {
    fn default() -> Self {
        Self {
            enabled: true,
            escape_key: true,
            reference_press: false,
            reference_press_event: PressEvent::default(),
            outside_press: OutsidePress::default(),
            outside_press_event: PressEvent::default(),
            ancestor_scroll: false,
            bubbles: DismissFlags::default(),
            capture: DismissFlags::default(),
        }
    }
}

/// A capture-phase delivery waiting for the target's own listener.
#[derive(Clone, Debug)]
enum Deferred<K> {
    Escape(DomEvent<K>),
    Press(DomEvent<K>),
}

/// Dismissal controller.
#[derive(Debug)]
pub struct Dismiss<K> {
    options: DismissOptions<K>,
    escape_bubbles: bool,
    outside_press_bubbles: bool,
    escape_capture: bool,
    outside_press_capture: bool,
    inside_tree: bool,
    ended_or_started_inside: bool,
    listeners: ListenerSet<K>,
    attached_for: Option<Elements<K>>,
    escape_listener: Option<ListenerId>,
    press_listener: Option<ListenerId>,
    deferred: Vec<(ListenerId, Deferred<K>)>,
}

impl<K: NodeKey> Dismiss<K> {
    /// A controller with the given options.
    pub fn new(options: DismissOptions<K>) -> Self {
        let (escape_bubbles, outside_press_bubbles) = options.bubbles.normalize();
        let (escape_capture, outside_press_capture) = options.capture.normalize();
        Self {
            options,
            escape_bubbles,
            outside_press_bubbles,
            escape_capture,
            outside_press_capture,
            inside_tree: false,
            ended_or_started_inside: false,
            listeners: ListenerSet::new(),
            attached_for: None,
            escape_listener: None,
            press_listener: None,
            deferred: Vec::new(),
        }
    }

    /// Options in effect.
    pub fn options(&self) -> &DismissOptions<K> {
        &self.options
    }

    /// Whether document listeners are currently attached.
    pub fn is_listening(&self) -> bool {
        self.attached_for.is_some()
    }

    fn close_on_escape(&self, ctx: &mut FloatingContext<K>, event: &DomEvent<K>) -> Option<Outcome> {
        if !ctx.open()
            || !self.options.enabled
            || !self.options.escape_key
            || event.key != Some(Key::Escape)
        {
            return None;
        }
        let stopped = !self.escape_bubbles;
        if stopped {
            event.stop_propagation();
        }
        ctx.on_open_change(false, Some(event), Some(OpenChangeReason::EscapeKey));
        stopped.then_some(Outcome::Stop)
    }

    fn close_on_press_outside(
        &mut self,
        ctx: &mut FloatingContext<K>,
        dom: &(impl Dom<K> + ?Sized),
        event: &DomEvent<K>,
    ) {
        let Elements {
            reference,
            floating,
        } = ctx.elements();

        let inside_tree = core::mem::take(&mut self.inside_tree);
        let ended_or_started_inside = core::mem::take(&mut self.ended_or_started_inside);

        if self.options.outside_press_event == PressEvent::Click && ended_or_started_inside {
            return;
        }
        if inside_tree {
            return;
        }
        if let OutsidePress::Filter(accept) = &self.options.outside_press {
            if !accept(event) {
                return;
            }
        }

        let target = event.target();
        let target_element = target.filter(|t| dom.is_element(t));

        if let Some(t) = target_element {
            let markers = dom.elements_with_attribute(&create_attribute("inert"));
            let root_ancestor = top_level_ancestor(dom, Some(t));
            if !markers.is_empty()
                && !is_root_element(dom, &t)
                && !contains(dom, Some(t), floating)
                && markers
                    .iter()
                    .all(|m| !contains(dom, root_ancestor, Some(*m)))
            {
                tracing::debug!(?t, "press on element injected after inert markers");
                return;
            }
        }

        if let (Some(t), Some(_)) = (target_element, floating) {
            if let Some(m) = dom.scroll_metrics(&t) {
                let can_scroll_x = m.client_width > 0.0 && m.scroll_width > m.client_width;
                let can_scroll_y = m.client_height > 0.0 && m.scroll_height > m.client_height;
                let mut x_cond = can_scroll_y && event.offset.x > m.client_width;
                if can_scroll_y && m.rtl {
                    x_cond = event.offset.x <= m.offset_width - m.client_width;
                }
                if x_cond || (can_scroll_x && event.offset.y > m.client_height) {
                    return;
                }
            }
        }

        if is_event_target_within(dom, event, floating) || is_event_target_within(dom, event, reference) {
            return;
        }

        ctx.on_open_change(false, Some(event), Some(OpenChangeReason::OutsidePress));
    }

    fn detach<H: Host<K>>(&mut self, host: &mut H) {
        self.listeners.detach_all(host);
        self.escape_listener = None;
        self.press_listener = None;
        self.deferred.clear();
        self.attached_for = None;
    }

    fn attach<H: Host<K>>(&mut self, ctx: &mut FloatingContext<K>, host: &mut H) {
        let elements = ctx.elements();
        ctx.data_mut().set("__escapeKeyBubbles", self.escape_bubbles);
        ctx.data_mut()
            .set("__outsidePressBubbles", self.outside_press_bubbles);

        let capture = |on: bool| {
            if on {
                ListenerOptions::CAPTURE
            } else {
                ListenerOptions::empty()
            }
        };
        if self.options.escape_key {
            self.escape_listener = self.listeners.attach(
                host,
                ListenerTarget::Document,
                EventKind::KeyDown,
                capture(self.escape_capture),
            );
        }
        if self.options.outside_press.is_enabled() {
            self.press_listener = self.listeners.attach(
                host,
                ListenerTarget::Document,
                self.options.outside_press_event.kind(),
                capture(self.outside_press_capture),
            );
        }
        if self.options.ancestor_scroll {
            let mut targets: Vec<ListenerTarget<K>> = Vec::new();
            let ancestors = [elements.reference, elements.floating]
                .into_iter()
                .flatten()
                .filter(|e| host.is_element(e))
                .flat_map(|e| host.overflow_ancestors(&e));
            for target in ancestors.filter_map(ListenerTarget::from_scroll) {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
            for target in targets {
                self.listeners
                    .attach(host, target, EventKind::Scroll, ListenerOptions::PASSIVE);
            }
        }
        self.attached_for = Some(elements);
    }

    fn defer<H: Host<K>>(&mut self, host: &mut H, event: &DomEvent<K>, deferred: Deferred<K>) {
        let Some(target) = event.target() else {
            return;
        };
        if let Some(id) = self.listeners.attach(
            host,
            ListenerTarget::Element(target),
            event.kind,
            ListenerOptions::ONCE,
        ) {
            self.deferred.push((id, deferred));
        }
    }
}

impl<K: NodeKey, H: Host<K>> Interaction<K, H> for Dismiss<K> {
    fn props(&self, _ctx: &FloatingContext<K>, slot: Slot, _item: ItemState) -> ElementProps {
        if !self.options.enabled {
            return ElementProps::new();
        }
        match slot {
            Slot::Reference => ElementProps::new()
                .with_handler(HandlerKey::bubble(EventKind::KeyDown))
                .with_handler(HandlerKey::bubble(self.options.reference_press_event.kind())),
            Slot::Floating => ElementProps::new()
                .with_handler(HandlerKey::bubble(EventKind::KeyDown))
                .with_handler(HandlerKey::bubble(EventKind::MouseDown))
                .with_handler(HandlerKey::bubble(EventKind::MouseUp))
                .with_handler(HandlerKey::capture(self.options.outside_press_event.kind())),
            Slot::Item => ElementProps::new(),
        }
    }

    fn handle(
        &mut self,
        ctx: &mut FloatingContext<K>,
        _host: &mut H,
        slot: Slot,
        key: HandlerKey,
        event: &DomEvent<K>,
    ) -> Option<Outcome> {
        if !self.options.enabled {
            return None;
        }
        let mut result = None;
        match slot {
            Slot::Reference => {
                if key == HandlerKey::bubble(EventKind::KeyDown) {
                    result = self.close_on_escape(ctx, event);
                }
                if key == HandlerKey::bubble(self.options.reference_press_event.kind())
                    && self.options.reference_press
                {
                    ctx.on_open_change(false, Some(event), Some(OpenChangeReason::ReferencePress));
                }
            }
            Slot::Floating => {
                if key == HandlerKey::bubble(EventKind::KeyDown) {
                    result = self.close_on_escape(ctx, event);
                }
                if key == HandlerKey::bubble(EventKind::MouseDown)
                    || key == HandlerKey::bubble(EventKind::MouseUp)
                {
                    self.ended_or_started_inside = true;
                }
                if key == HandlerKey::capture(self.options.outside_press_event.kind()) {
                    self.inside_tree = true;
                }
            }
            Slot::Item => {}
        }
        result
    }

    fn sync(&mut self, ctx: &mut FloatingContext<K>, host: &mut H) {
        let active = ctx.open() && self.options.enabled;
        if active && self.attached_for == Some(ctx.elements()) {
            return;
        }
        if self.attached_for.is_some() {
            self.detach(host);
        }
        if active {
            self.attach(ctx, host);
        }
    }

    fn on_listener(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        id: ListenerId,
        event: &DomEvent<K>,
    ) -> bool {
        if let Some(i) = self.deferred.iter().position(|(d, _)| *d == id) {
            let (_, deferred) = self.deferred.remove(i);
            self.listeners.forget(id);
            match deferred {
                Deferred::Escape(original) => {
                    self.close_on_escape(ctx, &original);
                }
                Deferred::Press(original) => self.close_on_press_outside(ctx, host, &original),
            }
            return true;
        }
        if self.escape_listener == Some(id) {
            if self.escape_capture {
                self.defer(host, event, Deferred::Escape(event.clone()));
            } else {
                self.close_on_escape(ctx, event);
            }
            return true;
        }
        if self.press_listener == Some(id) {
            if self.outside_press_capture {
                self.defer(host, event, Deferred::Press(event.clone()));
            } else {
                self.close_on_press_outside(ctx, host, event);
            }
            return true;
        }
        if self.listeners.get(id).is_some_and(|(_, kind)| kind == EventKind::Scroll) {
            ctx.on_open_change(false, Some(event), Some(OpenChangeReason::AncestorScroll));
            return true;
        }
        false
    }

    fn teardown(&mut self, _ctx: &mut FloatingContext<K>, host: &mut H) {
        self.detach(host);
    }
}

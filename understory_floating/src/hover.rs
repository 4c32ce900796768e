// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hover: open while the pointer is over the reference.
//!
//! Opening and closing can be delayed, opening can wait for the pointer to
//! rest, and a [`HandleClose`] strategy (such as
//! [`SafePolygon`](crate::safe_polygon::SafePolygon)) can keep the floating
//! element open while the pointer travels from the reference towards it.
//!
//! An open caused by a click-like event (`click`/`mousedown`) is sticky:
//! leaving the reference does not close it.
//!
//! With `move_opens`, a pointer move over the reference runs the enter logic
//! only while closed with no open pending. Moving does not restart an armed
//! open delay.
//!
//! ## Timers
//!
//! Open, close and rest delays each use a [`TimerSlot`]. Every close, from
//! any controller, disarms all three through the `openchange` bus; the host
//! timers are cancelled on the next sync.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::Cell;
use core::fmt;

use kurbo::Point;

use crate::bus::{OPEN_CHANGE, Subscription};
use crate::context::{Elements, FloatingContext, OpenChange};
use crate::delay_group::DelayGroup;
use crate::dom::{Dom, PointerEvents, contains, create_attribute};
use crate::host::{
    Host, ListenerId, ListenerOptions, ListenerSet, ListenerTarget, NodeKey, Scheduler, TimerId,
    TimerSlot,
};
use crate::interactions::{ElementProps, HandlerKey, Interaction, ItemState, Slot};
use crate::types::{
    DomEvent, EventKind, OpenChangeReason, Outcome, Placement, PointerType, is_mouse_like,
};

/// Open and close delays in milliseconds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Delay {
    /// Same delay both ways.
    Fixed(u32),
    /// Independent delays; `None` means no delay.
    Split {
        /// Delay before opening.
        open: Option<u32>,
        /// Delay before closing.
        close: Option<u32>,
    },
}

impl Default for Delay {
    fn default() -> Self {
        Self::Fixed(0)
    }
}

/// Which half of a [`Delay`] to read.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DelayProp {
    /// Opening delay.
    Open,
    /// Closing delay.
    Close,
}

/// Effective delay for `prop`.
///
/// Non-mouse pointers (touch) never wait.
///
/// ```
/// use understory_floating::hover::{Delay, DelayProp, get_delay};
/// use understory_floating::types::PointerType;
///
/// let delay = Delay::Split { open: Some(100), close: None };
/// assert_eq!(get_delay(&delay, DelayProp::Open, None), Some(100));
/// assert_eq!(get_delay(&delay, DelayProp::Close, None), None);
/// assert_eq!(get_delay(&delay, DelayProp::Open, Some(PointerType::Touch)), Some(0));
/// ```
pub fn get_delay(delay: &Delay, prop: DelayProp, pointer: Option<PointerType>) -> Option<u32> {
    if pointer.is_some() && !is_mouse_like(pointer, false) {
        return Some(0);
    }
    match (*delay, prop) {
        (Delay::Fixed(ms), _) => Some(ms),
        (Delay::Split { open, .. }, DelayProp::Open) => open,
        (Delay::Split { close, .. }, DelayProp::Close) => close,
    }
}

/// What a [`HandleClose`] strategy sees.
pub struct CloseEnv<'a, K> {
    /// Document queries (containment, bounding rects).
    pub dom: &'a dyn Dom<K>,
    /// Mounted elements.
    pub elements: Elements<K>,
    /// Resolved placement.
    pub placement: Placement,
    /// Client point where the pointer left.
    pub origin: Point,
}

impl<K: fmt::Debug> fmt::Debug for CloseEnv<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseEnv")
            .field("elements", &self.elements)
            .field("placement", &self.placement)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Decides when a hover-opened element closes after the pointer leaves.
///
/// A session starts when the pointer leaves the reference; from then on every
/// document `mousemove` is passed to [`evaluate`](Self::evaluate) until it
/// returns `true` or the element closes.
pub trait HandleClose<K> {
    /// Whether other elements should stop receiving pointer events while the
    /// hover-opened element is open.
    fn blocks_pointer_events(&self) -> bool {
        false
    }

    /// A new tracking session begins.
    fn start(&mut self) {}

    /// Whether to close, given a `mousemove` (or `mouseleave`) event.
    fn evaluate(&mut self, env: &CloseEnv<'_, K>, event: &DomEvent<K>) -> bool;
}

/// Options for [`Hover`].
pub struct HoverOptions<K> {
    /// Master switch.
    pub enabled: bool,
    /// Only mouse-like pointers trigger.
    pub mouse_only: bool,
    /// Open/close delays.
    pub delay: Delay,
    /// Time the pointer must rest on the reference before opening; 0 is off.
    pub rest_ms: u32,
    /// Moving over the reference opens without a fresh `mouseenter`.
    /// An armed open delay is not restarted by moves.
    pub move_opens: bool,
    /// Close strategy, e.g. [`SafePolygon`](crate::safe_polygon::SafePolygon).
    pub handle_close: Option<Box<dyn HandleClose<K>>>,
}

impl<K> Default for HoverOptions<K> {
    fn default() -> Self {
        Self {
            enabled: true,
            mouse_only: false,
            delay: Delay::default(),
            rest_ms: 0,
            move_opens: true,
            handle_close: None,
        }
    }
}

impl<K> fmt::Debug for HoverOptions<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HoverOptions")
            .field("enabled", &self.enabled)
            .field("mouse_only", &self.mouse_only)
            .field("delay", &self.delay)
            .field("rest_ms", &self.rest_ms)
            .field("move_opens", &self.move_opens)
            .field("handle_close", &self.handle_close.is_some())
            .finish()
    }
}

/// State also reached from the `openchange` subscriber.
#[derive(Debug)]
struct HoverShared {
    open_timer: TimerSlot,
    close_timer: TimerSlot,
    rest_timer: TimerSlot,
    block_mouse_move: Cell<bool>,
}

impl HoverShared {
    fn new() -> Self {
        Self {
            open_timer: TimerSlot::new(),
            close_timer: TimerSlot::new(),
            rest_timer: TimerSlot::new(),
            block_mouse_move: Cell::new(true),
        }
    }

    fn disarm_all(&self) {
        self.open_timer.disarm();
        self.close_timer.disarm();
        self.rest_timer.disarm();
    }

    fn flush(&self, scheduler: &mut (impl Scheduler + ?Sized)) {
        self.open_timer.flush(scheduler);
        self.close_timer.flush(scheduler);
        self.rest_timer.flush(scheduler);
    }
}

#[derive(Clone, Debug)]
struct Tracking<K> {
    listener: Option<ListenerId>,
    origin: Point,
    leave: DomEvent<K>,
}

/// Style mutations applied while pointer events are blocked.
#[derive(Copy, Clone, Debug)]
struct Muted<K> {
    body: K,
    elements: Option<(K, K)>,
}

/// Hover controller.
#[derive(Debug)]
pub struct Hover<K> {
    options: HoverOptions<K>,
    group: Option<Rc<DelayGroup>>,
    shared: Rc<HoverShared>,
    subscription: Option<Subscription>,
    was_open: bool,
    pointer_type: Option<PointerType>,
    pending_open: Option<DomEvent<K>>,
    pending_close: Option<(DomEvent<K>, OpenChangeReason)>,
    rest_event: Option<DomEvent<K>>,
    tracking: Option<Tracking<K>>,
    muted: Option<Muted<K>>,
    listeners: ListenerSet<K>,
    document_leave: Option<ListenerId>,
}

impl<K: NodeKey> Hover<K> {
    /// A controller with the given options.
    pub fn new(options: HoverOptions<K>) -> Self {
        Self {
            options,
            group: None,
            shared: Rc::new(HoverShared::new()),
            subscription: None,
            was_open: false,
            pointer_type: None,
            pending_open: None,
            pending_close: None,
            rest_event: None,
            tracking: None,
            muted: None,
            listeners: ListenerSet::new(),
            document_leave: None,
        }
    }

    /// Take delays from a [`DelayGroup`] instead of the options.
    pub fn with_delay_group(mut self, group: Rc<DelayGroup>) -> Self {
        self.group = Some(group);
        self
    }

    /// Options in effect.
    pub fn options(&self) -> &HoverOptions<K> {
        &self.options
    }

    /// Pointer type of the last pointer event on the reference.
    pub fn pointer_type(&self) -> Option<PointerType> {
        self.pointer_type
    }

    /// Whether a close-strategy session is tracking the pointer.
    pub fn is_tracking(&self) -> bool {
        self.tracking.is_some()
    }

    /// Whether an open is scheduled.
    pub fn is_open_pending(&self) -> bool {
        self.shared.open_timer.is_armed()
    }

    /// Whether a close is scheduled.
    pub fn is_close_pending(&self) -> bool {
        self.shared.close_timer.is_armed()
    }

    fn delay(&self) -> Delay {
        self.group
            .as_ref()
            .map_or(self.options.delay, |g| g.delay())
    }

    fn clear_timeout<H: Host<K>>(&self, host: &mut H) {
        self.shared.open_timer.cancel(host);
        self.shared.close_timer.cancel(host);
    }

    fn on_reference_enter<H: Host<K>>(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        event: &DomEvent<K>,
    ) {
        self.clear_timeout(host);
        self.shared.block_mouse_move.set(false);

        let delay = self.delay();
        if (self.options.mouse_only && !is_mouse_like(self.pointer_type, false))
            || (self.options.rest_ms > 0
                && get_delay(&delay, DelayProp::Open, None).unwrap_or(0) == 0)
        {
            return;
        }

        match get_delay(&delay, DelayProp::Open, self.pointer_type) {
            Some(ms) if ms > 0 => {
                self.pending_open = Some(event.clone());
                self.shared.open_timer.arm(host, ms);
            }
            _ => ctx.on_open_change(true, Some(event), Some(OpenChangeReason::Hover)),
        }
    }

    fn on_reference_move<H: Host<K>>(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        event: &DomEvent<K>,
    ) {
        if self.options.move_opens && !ctx.open() && !self.shared.open_timer.is_armed() {
            self.on_reference_enter(ctx, host, event);
        }
        if self.options.mouse_only && !is_mouse_like(self.pointer_type, false) {
            return;
        }
        if ctx.open() || self.options.rest_ms == 0 {
            return;
        }
        self.shared.rest_timer.cancel(host);
        if self.pointer_type == Some(PointerType::Touch) {
            if !self.shared.block_mouse_move.get() {
                ctx.on_open_change(true, Some(event), Some(OpenChangeReason::Hover));
            }
        } else {
            self.rest_event = Some(event.clone());
            self.shared.rest_timer.arm(host, self.options.rest_ms);
        }
    }

    fn on_reference_leave<H: Host<K>>(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        event: &DomEvent<K>,
    ) {
        if is_click_like_open(ctx) {
            return;
        }
        self.unbind_tracking(host);
        self.shared.rest_timer.cancel(host);

        if let Some(strategy) = self.options.handle_close.as_mut() {
            if !ctx.open() {
                self.shared.open_timer.cancel(host);
                self.shared.close_timer.cancel(host);
            }
            strategy.start();
            let listener = self.listeners.attach(
                host,
                ListenerTarget::Document,
                EventKind::MouseMove,
                ListenerOptions::empty(),
            );
            self.tracking = Some(Tracking {
                listener,
                origin: event.client,
                leave: event.clone(),
            });
            return;
        }

        // Touch keeps the element open when moving into it, so it stays
        // interactive without a close strategy.
        let should_close = self.pointer_type != Some(PointerType::Touch)
            || !contains(&*host, ctx.elements().floating, event.related_target);
        if should_close {
            self.close_with_delay(ctx, host, event, true, OpenChangeReason::Hover);
        }
    }

    fn on_floating_leave<H: Host<K>>(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        event: &DomEvent<K>,
    ) {
        if !is_click_like_open(ctx) {
            let tracking = self.tracking.is_some();
            let elements = ctx.elements();
            let placement = ctx.placement();
            if let Some(strategy) = self.options.handle_close.as_mut() {
                if !tracking {
                    strategy.start();
                }
                let env = CloseEnv {
                    dom: &*host,
                    elements,
                    placement,
                    origin: event.client,
                };
                if strategy.evaluate(&env, event) {
                    self.clear_pointer_events(host);
                    self.cleanup_tracking(host);
                    self.close_with_delay(ctx, host, event, true, OpenChangeReason::Hover);
                }
            }
        }
        if ctx.open() {
            self.close_with_delay(ctx, host, event, false, OpenChangeReason::Hover);
        }
    }

    fn on_tracking_move<H: Host<K>>(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        event: &DomEvent<K>,
    ) {
        let Some(tracking) = self.tracking.as_ref() else {
            return;
        };
        let Some(strategy) = self.options.handle_close.as_mut() else {
            return;
        };
        let env = CloseEnv {
            dom: &*host,
            elements: ctx.elements(),
            placement: ctx.placement(),
            origin: tracking.origin,
        };
        if strategy.evaluate(&env, event) {
            let leave = tracking.leave.clone();
            self.clear_pointer_events(host);
            self.cleanup_tracking(host);
            self.close_with_delay(ctx, host, &leave, true, OpenChangeReason::SafePolygon);
        }
    }

    fn close_with_delay<H: Host<K>>(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        event: &DomEvent<K>,
        run_else: bool,
        reason: OpenChangeReason,
    ) {
        let close = get_delay(&self.delay(), DelayProp::Close, self.pointer_type).unwrap_or(0);
        if close > 0 && self.tracking.is_none() {
            self.shared.open_timer.cancel(host);
            self.pending_close = Some((event.clone(), reason));
            self.shared.close_timer.arm(host, close);
        } else if run_else {
            self.clear_timeout(host);
            ctx.on_open_change(false, Some(event), Some(reason));
        }
    }

    fn unbind_tracking<H: Host<K>>(&mut self, host: &mut H) {
        if let Some(id) = self.tracking.as_mut().and_then(|t| t.listener.take()) {
            self.listeners.detach(host, id);
        }
    }

    fn cleanup_tracking<H: Host<K>>(&mut self, host: &mut H) {
        self.unbind_tracking(host);
        self.tracking = None;
    }

    fn clear_pointer_events<H: Host<K>>(&mut self, host: &mut H) {
        let Some(muted) = self.muted.take() else {
            return;
        };
        host.set_pointer_events(&muted.body, None);
        host.set_attribute(&muted.body, &create_attribute("safe-polygon"), None);
        if let Some((reference, floating)) = muted.elements {
            host.set_pointer_events(&reference, None);
            host.set_pointer_events(&floating, None);
        }
        tracing::debug!("pointer events restored");
    }

    fn sync_muting<H: Host<K>>(&mut self, ctx: &FloatingContext<K>, host: &mut H) {
        let blocks = self
            .options
            .handle_close
            .as_ref()
            .is_some_and(|s| s.blocks_pointer_events());
        let should_mute = ctx.open() && blocks && is_hover_open(ctx);
        if !should_mute {
            // Reference and floating are restored with the condition; the
            // body stays muted until the element closes.
            if let Some((reference, floating)) = self.muted.as_mut().and_then(|m| m.elements.take()) {
                host.set_pointer_events(&reference, None);
                host.set_pointer_events(&floating, None);
            }
            return;
        }
        if self.muted.as_ref().is_some_and(|m| m.elements.is_some()) {
            return;
        }
        let Some(body) = host.body() else {
            return;
        };
        host.set_attribute(&body, &create_attribute("safe-polygon"), Some(""));
        host.set_pointer_events(&body, Some(PointerEvents::None));
        let elements = ctx
            .elements()
            .pair()
            .filter(|(reference, _)| host.is_element(reference));
        if let Some((reference, floating)) = elements {
            host.set_pointer_events(&reference, Some(PointerEvents::Auto));
            host.set_pointer_events(&floating, Some(PointerEvents::Auto));
        }
        tracing::debug!("pointer events blocked outside the floating element");
        self.muted = Some(Muted { body, elements });
    }

    fn subscribe(&mut self, ctx: &mut FloatingContext<K>) {
        if self.subscription.is_some() {
            return;
        }
        let shared = Rc::clone(&self.shared);
        self.subscription = Some(ctx.events.on(OPEN_CHANGE, move |change: &OpenChange<K>| {
            if !change.open {
                shared.disarm_all();
                shared.block_mouse_move.set(true);
            }
        }));
    }

    fn unsubscribe(&mut self, ctx: &mut FloatingContext<K>) {
        if let Some(sub) = self.subscription.take() {
            ctx.events.off(sub);
        }
    }
}

fn is_hover_open<K: Copy>(ctx: &FloatingContext<K>) -> bool {
    ctx.open_event()
        .is_some_and(|e| e.kind.is_mouse() && e.kind != EventKind::MouseDown)
}

fn is_click_like_open<K: Copy>(ctx: &FloatingContext<K>) -> bool {
    ctx.open_event().is_some_and(|e| e.kind.is_click_like())
}

impl<K: NodeKey, H: Host<K>> Interaction<K, H> for Hover<K> {
    fn props(&self, _ctx: &FloatingContext<K>, slot: Slot, _item: ItemState) -> ElementProps {
        if !self.options.enabled {
            return ElementProps::new();
        }
        let kinds: &[EventKind] = match slot {
            Slot::Reference => &[
                EventKind::PointerDown,
                EventKind::PointerEnter,
                EventKind::MouseEnter,
                EventKind::MouseMove,
                EventKind::MouseLeave,
            ],
            Slot::Floating => &[EventKind::MouseEnter, EventKind::MouseLeave],
            Slot::Item => &[],
        };
        kinds
            .iter()
            .fold(ElementProps::new(), |props, kind| {
                props.with_handler(HandlerKey::bubble(*kind))
            })
    }

    fn handle(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        slot: Slot,
        key: HandlerKey,
        event: &DomEvent<K>,
    ) -> Option<Outcome> {
        if !self.options.enabled || key.capture {
            return None;
        }
        match (slot, key.kind) {
            (Slot::Reference, EventKind::PointerDown | EventKind::PointerEnter) => {
                self.pointer_type = event.pointer_type();
            }
            (Slot::Reference, EventKind::MouseEnter) => self.on_reference_enter(ctx, host, event),
            (Slot::Reference, EventKind::MouseMove) => self.on_reference_move(ctx, host, event),
            (Slot::Reference, EventKind::MouseLeave) => self.on_reference_leave(ctx, host, event),
            (Slot::Floating, EventKind::MouseEnter) => self.clear_timeout(host),
            (Slot::Floating, EventKind::MouseLeave) => self.on_floating_leave(ctx, host, event),
            _ => {}
        }
        None
    }

    fn sync(&mut self, ctx: &mut FloatingContext<K>, host: &mut H) {
        self.shared.flush(host);

        if self.options.enabled {
            self.subscribe(ctx);
        } else {
            self.unsubscribe(ctx);
        }

        let want_leave =
            !self.options.enabled && self.options.handle_close.is_some() && ctx.open();
        match (want_leave, self.document_leave) {
            (true, None) => {
                self.document_leave = self.listeners.attach(
                    host,
                    ListenerTarget::Document,
                    EventKind::MouseLeave,
                    ListenerOptions::empty(),
                );
            }
            (false, Some(id)) => {
                self.listeners.detach(host, id);
                self.document_leave = None;
            }
            _ => {}
        }

        if self.options.enabled {
            self.sync_muting(ctx, host);
        }

        let open = ctx.open();
        if self.was_open && !open {
            self.pointer_type = None;
            self.cleanup_tracking(host);
            self.clear_pointer_events(host);
        }
        self.was_open = open;
    }

    fn on_listener(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        id: ListenerId,
        event: &DomEvent<K>,
    ) -> bool {
        if self.document_leave == Some(id) {
            if is_hover_open(ctx) {
                ctx.on_open_change(false, Some(event), Some(OpenChangeReason::Hover));
            }
            return true;
        }
        if self.tracking.as_ref().is_some_and(|t| t.listener == Some(id)) {
            self.on_tracking_move(ctx, host, event);
            return true;
        }
        false
    }

    fn on_timer(&mut self, ctx: &mut FloatingContext<K>, _host: &mut H, id: TimerId) -> bool {
        if self.shared.open_timer.fire(id) {
            if let Some(event) = self.pending_open.take() {
                ctx.on_open_change(true, Some(&event), Some(OpenChangeReason::Hover));
            }
            return true;
        }
        if self.shared.close_timer.fire(id) {
            if let Some((event, reason)) = self.pending_close.take() {
                ctx.on_open_change(false, Some(&event), Some(reason));
            }
            return true;
        }
        if self.shared.rest_timer.fire(id) {
            let event = self.rest_event.take();
            if !self.shared.block_mouse_move.get() {
                ctx.on_open_change(true, event.as_ref(), Some(OpenChangeReason::Hover));
            }
            return true;
        }
        false
    }

    fn teardown(&mut self, ctx: &mut FloatingContext<K>, host: &mut H) {
        self.unsubscribe(ctx);
        self.shared.disarm_all();
        self.shared.flush(host);
        self.cleanup_tracking(host);
        self.clear_pointer_events(host);
        self.listeners.detach_all(host);
        self.document_leave = None;
    }
}

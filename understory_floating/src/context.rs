// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Floating context: the state every controller reads, and the single entry
//! point through which they change it.
//!
//! ## Ownership
//!
//! A [`FloatingContext`] owns the open flag, the last computed position, the
//! keyed [`ContextData`] and the [`EventBus`] that broadcasts transitions.
//! Controllers never write `open` directly; they call
//! [`FloatingContext::on_open_change`], which updates the state, emits
//! [`OPEN_CHANGE`] and finally runs the user callback, all before returning.
//!
//! Only the positioning layer writes position fields.
//!
//! ## Minimal example
//!
//! ```
//! use understory_floating::context::FloatingContext;
//! use understory_floating::types::OpenChangeReason;
//!
//! let mut ctx: FloatingContext<u32> = FloatingContext::new();
//! ctx.set_open(false);
//! ctx.on_open_change(true, None, Some(OpenChangeReason::Click));
//! assert!(ctx.open());
//! ctx.on_open_change(false, None, Some(OpenChangeReason::EscapeKey));
//! assert!(!ctx.open());
//! assert!(!ctx.is_positioned());
//! ```

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::bus::{EventBus, OPEN_CHANGE};
use crate::types::{DataValue, DomEvent, OpenChangeReason, Placement, Strategy};

/// Opaque per-middleware output produced by a positioner.
pub type MiddlewareData = BTreeMap<String, DataValue>;

/// The reference and floating elements, each absent until mounted.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Elements<K> {
    /// Anchor element.
    pub reference: Option<K>,
    /// Positioned overlay.
    pub floating: Option<K>,
}

impl<K: Copy> Elements<K> {
    /// Both elements, when mounted.
    pub fn pair(&self) -> Option<(K, K)> {
        Some((self.reference?, self.floating?))
    }
}

/// Payload of the [`OPEN_CHANGE`] topic and of the user callback.
#[derive(Clone, Debug)]
pub struct OpenChange<K> {
    /// New open state.
    pub open: bool,
    /// Triggering event, if any.
    pub event: Option<DomEvent<K>>,
    /// Why the state changed.
    pub reason: Option<OpenChangeReason>,
}

/// Position fields written by the positioning layer.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionState {
    /// Horizontal offset in CSS pixels.
    pub x: f64,
    /// Vertical offset in CSS pixels.
    pub y: f64,
    /// Resolved placement (may differ from the requested one).
    pub placement: Placement,
    /// Resolved strategy.
    pub strategy: Strategy,
    /// Middleware output.
    pub middleware_data: MiddlewareData,
    /// Whether a computation has been applied while open.
    pub is_positioned: bool,
}

impl Default for PositionState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            placement: Placement::default(),
            strategy: Strategy::default(),
            middleware_data: MiddlewareData::new(),
            is_positioned: false,
        }
    }
}

/// Keyed metadata shared between controllers.
///
/// Always carries `open_event`, the event behind the current open state.
#[derive(Clone, Debug)]
pub struct ContextData<K> {
    open_event: Option<DomEvent<K>>,
    entries: BTreeMap<String, DataValue>,
}

impl<K> Default for ContextData<K> {
    fn default() -> Self {
        Self {
            open_event: None,
            entries: BTreeMap::new(),
        }
    }
}

impl<K> ContextData<K> {
    /// Event that caused the current open state. `None` while closed.
    pub fn open_event(&self) -> Option<&DomEvent<K>> {
        self.open_event.as_ref()
    }

    /// Read an entry.
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.entries.get(key)
    }

    /// Write an entry, returning the previous value.
    pub fn set(&mut self, key: &str, value: impl Into<DataValue>) -> Option<DataValue> {
        self.entries.insert(String::from(key), value.into())
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        self.entries.remove(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

type OpenChangeCallback<K> = Box<dyn FnMut(&OpenChange<K>)>;

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

/// Process-unique `floating-ui-N` id.
pub(crate) fn unique_id() -> String {
    format!("floating-ui-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Shared state for one floating element.
pub struct FloatingContext<K> {
    open: bool,
    position: PositionState,
    data: ContextData<K>,
    elements: Elements<K>,
    floating_id: String,
    node_id: Option<String>,
    /// Broadcasts [`OPEN_CHANGE`] to the controllers.
    pub events: EventBus<OpenChange<K>>,
    on_open_change: Option<OpenChangeCallback<K>>,
}

impl<K: fmt::Debug> fmt::Debug for FloatingContext<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FloatingContext")
            .field("open", &self.open)
            .field("position", &self.position)
            .field("data", &self.data)
            .field("elements", &self.elements)
            .field("floating_id", &self.floating_id)
            .field("node_id", &self.node_id)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl<K: Copy> Default for FloatingContext<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy> FloatingContext<K> {
    /// A context that starts open, with no elements and a fresh floating id.
    pub fn new() -> Self {
        Self {
            open: true,
            position: PositionState::default(),
            data: ContextData::default(),
            elements: Elements {
                reference: None,
                floating: None,
            },
            floating_id: unique_id(),
            node_id: None,
            events: EventBus::new(),
            on_open_change: None,
        }
    }

    /// Builder: initial open state.
    pub fn with_open(mut self, open: bool) -> Self {
        self.set_open(open);
        self
    }

    /// Builder: user open-change callback.
    pub fn with_on_open_change(mut self, callback: impl FnMut(&OpenChange<K>) + 'static) -> Self {
        self.on_open_change = Some(Box::new(callback));
        self
    }

    /// Replace the user open-change callback.
    pub fn set_on_open_change(&mut self, callback: impl FnMut(&OpenChange<K>) + 'static) {
        self.on_open_change = Some(Box::new(callback));
    }

    /// Request an open-state transition.
    ///
    /// Updates `open` and `open_event`, forces `is_positioned` off when
    /// closing, broadcasts [`OPEN_CHANGE`] synchronously and then runs the
    /// user callback.
    pub fn on_open_change(
        &mut self,
        open: bool,
        event: Option<&DomEvent<K>>,
        reason: Option<OpenChangeReason>,
    ) {
        self.data.open_event = if open { event.cloned() } else { None };
        self.open = open;
        if !open {
            self.position.is_positioned = false;
        }
        tracing::debug!(
            open,
            reason = reason.map(OpenChangeReason::as_str),
            event = event.map(|e| e.kind.as_str()),
            "open change"
        );
        let change = OpenChange {
            open,
            event: event.cloned(),
            reason,
        };
        self.events.emit(OPEN_CHANGE, &change);
        if let Some(callback) = self.on_open_change.as_mut() {
            callback(&change);
        }
    }

    /// Set `open` directly (host-controlled state). Does not broadcast.
    pub fn set_open(&mut self, open: bool) {
        self.open = open;
        if !open {
            self.position.is_positioned = false;
            self.data.open_event = None;
        }
    }

    /// Current open state.
    pub fn open(&self) -> bool {
        self.open
    }

    /// Mounted elements.
    pub fn elements(&self) -> Elements<K> {
        self.elements
    }

    /// Replace both elements.
    pub fn set_elements(&mut self, elements: Elements<K>) {
        self.elements = elements;
    }

    /// Mount or unmount the reference element.
    pub fn set_reference(&mut self, reference: Option<K>) {
        self.elements.reference = reference;
    }

    /// Mount or unmount the floating element.
    pub fn set_floating(&mut self, floating: Option<K>) {
        self.elements.floating = floating;
    }

    /// Keyed metadata.
    pub fn data(&self) -> &ContextData<K> {
        &self.data
    }

    /// Keyed metadata, mutably. `open_event` stays read-only.
    pub fn data_mut(&mut self) -> &mut ContextData<K> {
        &mut self.data
    }

    /// Shorthand for `data().open_event()`.
    pub fn open_event(&self) -> Option<&DomEvent<K>> {
        self.data.open_event()
    }

    /// Last applied position.
    pub fn position(&self) -> &PositionState {
        &self.position
    }

    /// `position().x`
    pub fn x(&self) -> f64 {
        self.position.x
    }

    /// `position().y`
    pub fn y(&self) -> f64 {
        self.position.y
    }

    /// Resolved placement.
    pub fn placement(&self) -> Placement {
        self.position.placement
    }

    /// Resolved strategy.
    pub fn strategy(&self) -> Strategy {
        self.position.strategy
    }

    /// Middleware output of the last computation.
    pub fn middleware_data(&self) -> &MiddlewareData {
        &self.position.middleware_data
    }

    /// Whether a position has been applied while open.
    pub fn is_positioned(&self) -> bool {
        self.position.is_positioned
    }

    /// Id for the floating element's `id` attribute.
    pub fn floating_id(&self) -> &str {
        &self.floating_id
    }

    /// Tree node id. Carried for callers; nothing here consults it.
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    /// Set the tree node id.
    pub fn set_node_id(&mut self, node_id: Option<String>) {
        self.node_id = node_id;
    }

    pub(crate) fn apply_position(&mut self, mut position: PositionState) {
        position.is_positioned = self.open;
        self.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    #[test]
    fn closing_clears_open_event_and_positioned() {
        let mut ctx: FloatingContext<u32> = FloatingContext::new().with_open(false);
        let ev = DomEvent::new(EventKind::MouseEnter).with_target(3);
        ctx.on_open_change(true, Some(&ev), Some(OpenChangeReason::Hover));
        ctx.apply_position(PositionState {
            x: 4.0,
            ..PositionState::default()
        });
        assert!(ctx.is_positioned());
        assert_eq!(ctx.open_event().map(|e| e.kind), Some(EventKind::MouseEnter));

        ctx.on_open_change(false, Some(&ev), Some(OpenChangeReason::Hover));
        assert!(!ctx.open());
        assert!(!ctx.is_positioned());
        assert!(ctx.open_event().is_none());
        assert_eq!(ctx.x(), 4.0);
    }

    #[test]
    fn position_applied_while_closed_is_not_positioned() {
        let mut ctx: FloatingContext<u32> = FloatingContext::new().with_open(false);
        ctx.apply_position(PositionState::default());
        assert!(!ctx.is_positioned());
    }

    #[test]
    fn bus_fires_before_user_callback() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        let mut ctx: FloatingContext<u32> =
            FloatingContext::new().with_on_open_change(move |c: &OpenChange<u32>| {
                l.borrow_mut().push(("callback", c.open));
            });
        let l = log.clone();
        ctx.events
            .on(OPEN_CHANGE, move |c: &OpenChange<u32>| l.borrow_mut().push(("bus", c.open)));

        ctx.on_open_change(false, None, Some(OpenChangeReason::OutsidePress));
        assert_eq!(*log.borrow(), [("bus", false), ("callback", false)]);
    }

    #[test]
    fn floating_ids_are_unique() {
        let a: FloatingContext<u32> = FloatingContext::new();
        let b: FloatingContext<u32> = FloatingContext::new();
        assert_ne!(a.floating_id(), b.floating_id());
        assert!(a.floating_id().starts_with("floating-ui-"));
    }

    #[test]
    fn data_entries() {
        let mut ctx: FloatingContext<u32> = FloatingContext::new();
        assert_eq!(ctx.data_mut().set("__escapeKeyBubbles", false), None);
        assert_eq!(
            ctx.data().get("__escapeKeyBubbles"),
            Some(&DataValue::Bool(false))
        );
        assert_eq!(ctx.data().iter().count(), 1);
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Prop bags, prop merging, and the controller driver.
//!
//! ## Overview
//!
//! Every controller implements [`Interaction`]. For each element slot it
//! describes the attributes it wants set and the handlers it wants to see
//! ([`ElementProps`]). [`merge_props`] combines those bags with the caller's
//! own [`UserProps`]:
//!
//! - Attributes are last-write-wins. User attributes are applied first and
//!   again last, so they override controller output.
//! - Handlers sharing a [`HandlerKey`] are chained in list order, with the
//!   user handler last. The chain's result is the first `Some`.
//! - The floating slot starts with `tabIndex = -1`.
//! - The item slot strips the `active` and `selected` flags, which instead
//!   parameterize the controllers' item props.
//!
//! [`Interactions`] runs the chain for a host event and then lets every
//! controller re-evaluate its effects via [`Interaction::sync`].
//!
//! ## Minimal example
//!
//! ```
//! use understory_floating::adapters::memory::{MemoryDom, NodeId};
//! use understory_floating::click::{Click, ClickOptions};
//! use understory_floating::context::FloatingContext;
//! use understory_floating::interactions::{HandlerKey, Interactions, Slot};
//! use understory_floating::types::{DomEvent, EventKind};
//!
//! let mut dom = MemoryDom::new();
//! let button = dom.create_element(dom.body(), "button");
//! let mut ctx: FloatingContext<NodeId> = FloatingContext::new().with_open(false);
//! ctx.set_reference(Some(button));
//!
//! let mut interactions: Interactions<NodeId, MemoryDom> = Interactions::new();
//! interactions.push(Click::new(ClickOptions::default()));
//!
//! let props = interactions.props(&ctx, Slot::Reference, None);
//! assert!(props.handlers.contains_key(&HandlerKey::bubble(EventKind::Click)));
//!
//! let click = DomEvent::new(EventKind::Click).with_target(button);
//! interactions.dispatch(&mut ctx, &mut dom, Slot::Reference, HandlerKey::bubble(EventKind::Click), &click, None);
//! assert!(ctx.open());
//! ```

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::context::FloatingContext;
use crate::host::{ListenerId, TimerId};
use crate::types::{DomEvent, EventKind, Outcome};

const ACTIVE_KEY: &str = "active";
const SELECTED_KEY: &str = "selected";

/// Which element a prop bag is for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Slot {
    /// The reference element.
    Reference,
    /// The floating element.
    Floating,
    /// A list item inside the floating element.
    Item,
}

/// A handler prop: event kind plus phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HandlerKey {
    /// Event kind.
    pub kind: EventKind,
    /// Capture phase (`onXxxCapture`).
    pub capture: bool,
}

impl HandlerKey {
    /// Bubble-phase handler.
    pub const fn bubble(kind: EventKind) -> Self {
        Self {
            kind,
            capture: false,
        }
    }

    /// Capture-phase handler.
    pub const fn capture(kind: EventKind) -> Self {
        Self {
            kind,
            capture: true,
        }
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.handler_name())?;
        if self.capture {
            f.write_str("Capture")?;
        }
        Ok(())
    }
}

/// Attribute value.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum AttrValue {
    /// String value.
    Str(String),
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(String::from(value))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Attributes and handler keys a controller contributes to one slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementProps {
    /// Attributes by name.
    pub attributes: BTreeMap<String, AttrValue>,
    /// Handlers the controller wants to receive.
    pub handlers: BTreeSet<HandlerKey>,
}

impl ElementProps {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set an attribute.
    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(String::from(name), value.into());
        self
    }

    /// Builder: set an attribute when `value` is `Some`.
    pub fn with_opt_attr(self, name: &str, value: Option<impl Into<AttrValue>>) -> Self {
        match value {
            Some(v) => self.with_attr(name, v),
            None => self,
        }
    }

    /// Builder: request a handler.
    pub fn with_handler(mut self, key: HandlerKey) -> Self {
        self.handlers.insert(key);
        self
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.handlers.is_empty()
    }
}

/// `active`/`selected` flags of an item.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ItemState {
    /// Item is the active (highlighted) option.
    pub active: bool,
    /// Item is selected.
    pub selected: bool,
}

type UserHandler<K> = Box<dyn FnMut(&DomEvent<K>) -> Option<Outcome>>;

/// Caller-supplied props for one slot.
pub struct UserProps<K> {
    /// Attributes by name. For items, `active` and `selected` are read as
    /// [`ItemState`] and never emitted.
    pub attributes: BTreeMap<String, AttrValue>,
    handlers: BTreeMap<HandlerKey, UserHandler<K>>,
}

impl<K> fmt::Debug for UserProps<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserProps")
            .field("attributes", &self.attributes)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<K> Default for UserProps<K> {
    fn default() -> Self {
        Self {
            attributes: BTreeMap::new(),
            handlers: BTreeMap::new(),
        }
    }
}

impl<K> UserProps<K> {
    /// Empty props.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set an attribute.
    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(String::from(name), value.into());
        self
    }

    /// Builder: add a handler, chained after every controller handler.
    pub fn with_handler(
        mut self,
        key: HandlerKey,
        handler: impl FnMut(&DomEvent<K>) -> Option<Outcome> + 'static,
    ) -> Self {
        self.handlers.insert(key, Box::new(handler));
        self
    }

    /// Item flags carried in the attributes.
    pub fn item_state(&self) -> ItemState {
        let flag = |key| matches!(self.attributes.get(key), Some(AttrValue::Bool(true)));
        ItemState {
            active: flag(ACTIVE_KEY),
            selected: flag(SELECTED_KEY),
        }
    }

    fn call(&mut self, key: HandlerKey, event: &DomEvent<K>) -> Option<Outcome> {
        self.handlers.get_mut(&key).and_then(|h| h(event))
    }
}

/// Who contributes to a handler chain.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Contributor {
    /// Controller at this index of the props list.
    Controller(usize),
    /// The caller's own handler.
    User,
}

/// Result of [`merge_props`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedProps {
    /// Final attribute set.
    pub attributes: BTreeMap<String, AttrValue>,
    /// Handler chains in invocation order.
    pub handlers: BTreeMap<HandlerKey, Vec<Contributor>>,
}

fn keep_attribute(is_item: bool, key: &str) -> bool {
    !(is_item && (key == ACTIVE_KEY || key == SELECTED_KEY))
}

/// Merge controller prop bags with user props for `slot`.
pub fn merge_props<K>(
    user: Option<&UserProps<K>>,
    props_list: &[ElementProps],
    slot: Slot,
) -> MergedProps {
    let is_item = slot == Slot::Item;
    let user_attrs: Vec<(&String, &AttrValue)> = user
        .map(|u| {
            u.attributes
                .iter()
                .filter(|(k, _)| keep_attribute(is_item, k.as_str()))
                .collect()
        })
        .unwrap_or_default();

    let mut merged = MergedProps::default();
    if slot == Slot::Floating {
        merged
            .attributes
            .insert(String::from("tabIndex"), AttrValue::Int(-1));
    }
    for (k, v) in &user_attrs {
        merged.attributes.insert((*k).clone(), (*v).clone());
    }
    for (i, props) in props_list.iter().enumerate() {
        for (k, v) in &props.attributes {
            if keep_attribute(is_item, k) {
                merged.attributes.insert(k.clone(), v.clone());
            }
        }
        for key in &props.handlers {
            merged
                .handlers
                .entry(*key)
                .or_default()
                .push(Contributor::Controller(i));
        }
    }
    for (k, v) in &user_attrs {
        merged.attributes.insert((*k).clone(), (*v).clone());
    }
    for key in user.into_iter().flat_map(|u| u.handlers.keys()) {
        merged
            .handlers
            .entry(*key)
            .or_default()
            .push(Contributor::User);
    }
    merged
}

/// A controller driven by [`Interactions`].
///
/// `H` is the host; see [`Host`](crate::host::Host).
pub trait Interaction<K, H> {
    /// Props for `slot`. `item` is only meaningful for [`Slot::Item`].
    fn props(&self, _ctx: &FloatingContext<K>, _slot: Slot, _item: ItemState) -> ElementProps {
        ElementProps::new()
    }

    /// Run a handler this controller requested through [`Interaction::props`].
    fn handle(
        &mut self,
        _ctx: &mut FloatingContext<K>,
        _host: &mut H,
        _slot: Slot,
        _key: HandlerKey,
        _event: &DomEvent<K>,
    ) -> Option<Outcome> {
        None
    }

    /// Re-evaluate effects after state may have changed: attach or detach
    /// listeners, flush cancelled timers, apply style mutations.
    fn sync(&mut self, _ctx: &mut FloatingContext<K>, _host: &mut H) {}

    /// A host listener fired. Returns whether it belonged to this controller.
    fn on_listener(
        &mut self,
        _ctx: &mut FloatingContext<K>,
        _host: &mut H,
        _id: ListenerId,
        _event: &DomEvent<K>,
    ) -> bool {
        false
    }

    /// A host timer fired. Returns whether it belonged to this controller.
    fn on_timer(&mut self, _ctx: &mut FloatingContext<K>, _host: &mut H, _id: TimerId) -> bool {
        false
    }

    /// Release everything: listeners, timers, subscriptions, style mutations.
    fn teardown(&mut self, _ctx: &mut FloatingContext<K>, _host: &mut H) {}
}

/// Maximum effect passes per sync; a pass that changes `open` triggers another.
const MAX_SYNC_PASSES: usize = 4;

/// Ordered set of controllers for one floating element.
pub struct Interactions<K, H> {
    controllers: Vec<Box<dyn Interaction<K, H>>>,
}

impl<K, H> fmt::Debug for Interactions<K, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interactions")
            .field("controllers", &self.controllers.len())
            .finish()
    }
}

impl<K, H> Default for Interactions<K, H> {
    fn default() -> Self {
        Self {
            controllers: Vec::new(),
        }
    }
}

impl<K: Copy, H> Interactions<K, H> {
    /// No controllers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a controller; its index is its position in the props list.
    pub fn push(&mut self, controller: impl Interaction<K, H> + 'static) -> usize {
        self.controllers.push(Box::new(controller));
        self.controllers.len() - 1
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, controller: impl Interaction<K, H> + 'static) -> Self {
        self.push(controller);
        self
    }

    /// Number of controllers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// Whether there are no controllers.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    fn props_list(
        &self,
        ctx: &FloatingContext<K>,
        slot: Slot,
        user: Option<&UserProps<K>>,
    ) -> Vec<ElementProps> {
        // Without user props an item is neither active nor selected.
        let item = user.map(UserProps::item_state).unwrap_or_default();
        self.controllers
            .iter()
            .map(|c| c.props(ctx, slot, item))
            .collect()
    }

    /// Merged props for `slot`.
    pub fn props(
        &self,
        ctx: &FloatingContext<K>,
        slot: Slot,
        user: Option<&UserProps<K>>,
    ) -> MergedProps {
        merge_props(user, &self.props_list(ctx, slot, user), slot)
    }

    /// Run the handler chain for `key` on `slot`, then [`sync`](Self::sync).
    ///
    /// Every contributor runs, in order; the first `Some` is returned.
    pub fn dispatch(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        slot: Slot,
        key: HandlerKey,
        event: &DomEvent<K>,
        mut user: Option<&mut UserProps<K>>,
    ) -> Option<Outcome> {
        let chain = self
            .props(ctx, slot, user.as_deref())
            .handlers
            .remove(&key)
            .unwrap_or_default();
        tracing::trace!(?slot, %key, len = chain.len(), "dispatch");
        let mut result = None;
        for contributor in chain {
            let r = match contributor {
                Contributor::Controller(i) => self
                    .controllers
                    .get_mut(i)
                    .and_then(|c| c.handle(ctx, host, slot, key, event)),
                Contributor::User => user.as_deref_mut().and_then(|u| u.call(key, event)),
            };
            result = result.or(r);
        }
        self.sync(ctx, host);
        result
    }

    /// Let every controller re-evaluate its effects.
    pub fn sync(&mut self, ctx: &mut FloatingContext<K>, host: &mut H) {
        for _ in 0..MAX_SYNC_PASSES {
            let open = ctx.open();
            for c in &mut self.controllers {
                c.sync(ctx, host);
            }
            if ctx.open() == open {
                break;
            }
        }
    }

    /// Route a listener delivery, then [`sync`](Self::sync).
    pub fn on_listener(
        &mut self,
        ctx: &mut FloatingContext<K>,
        host: &mut H,
        id: ListenerId,
        event: &DomEvent<K>,
    ) -> bool {
        let claimed = self
            .controllers
            .iter_mut()
            .any(|c| c.on_listener(ctx, host, id, event));
        self.sync(ctx, host);
        claimed
    }

    /// Route a timer expiry, then [`sync`](Self::sync).
    pub fn on_timer(&mut self, ctx: &mut FloatingContext<K>, host: &mut H, id: TimerId) -> bool {
        let claimed = self
            .controllers
            .iter_mut()
            .any(|c| c.on_timer(ctx, host, id));
        self.sync(ctx, host);
        claimed
    }

    /// Tear down every controller. Each runs even if an earlier one misbehaves.
    pub fn teardown(&mut self, ctx: &mut FloatingContext<K>, host: &mut H) {
        for c in &mut self.controllers {
            c.teardown(ctx, host);
        }
    }
}

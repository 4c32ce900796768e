// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_floating --heading-base-level=0

//! Understory Floating: interaction controllers for tooltips, popovers and menus.
//!
//! ## Overview
//!
//! A floating element is anchored to a reference element and opens or closes
//! in response to user input. This crate decides *when* it does that. It does
//! not compute geometry and it does not own a document:
//!
//! - The host implements [`Dom`](crate::dom::Dom), [`EventSource`](crate::host::EventSource)
//!   and [`Scheduler`](crate::host::Scheduler) (together a [`Host`](crate::host::Host)).
//! - A [`FloatingContext`](crate::context::FloatingContext) holds `open`, the mounted
//!   elements, the last computed position and an open-change bus.
//! - Controllers implementing [`Interaction`](crate::interactions::Interaction) describe the
//!   attributes and handlers they need per element and react to events, listeners and timers.
//! - [`Interactions`](crate::interactions::Interactions) merges their props and drives them.
//!
//! ## Controllers
//!
//! - [`Hover`](crate::hover::Hover): open on enter, close on leave, with delays, a rest
//!   threshold and a pluggable close strategy such as
//!   [`SafePolygon`](crate::safe_polygon::SafePolygon).
//! - [`Click`](crate::click::Click): toggle on click or mousedown, plus keyboard activation.
//! - [`Focus`](crate::focus::Focus): open on keyboard focus, close when focus leaves.
//! - [`Dismiss`](crate::dismiss::Dismiss): close on Escape, outside presses and ancestor scroll.
//! - [`RoleProps`](crate::role::RoleProps): ARIA attributes linking reference, floating and items.
//! - [`DelayGroupMember`](crate::delay_group::DelayGroupMember): shared delays for tooltip groups.
//!
//! Positioning is delegated: [`Floating`](crate::position::Floating) asks an external
//! [`Positioner`](crate::position::Positioner) and writes the result into the context.
//!
//! ## Example
//!
//! ```
//! use understory_floating::adapters::memory::{MemoryDom, NodeId};
//! use understory_floating::context::FloatingContext;
//! use understory_floating::dismiss::{Dismiss, DismissOptions};
//! use understory_floating::host::ListenerTarget;
//! use understory_floating::hover::{Delay, Hover, HoverOptions};
//! use understory_floating::interactions::{AttrValue, HandlerKey, Interactions, Slot};
//! use understory_floating::role::{Role, RoleOptions, RoleProps};
//! use understory_floating::types::{DomEvent, EventKind, Key};
//!
//! let mut dom = MemoryDom::new();
//! let body = dom.body();
//! let button = dom.create_element(body, "button");
//! let tooltip = dom.create_element(body, "div");
//!
//! let mut ctx: FloatingContext<NodeId> = FloatingContext::new().with_open(false);
//! ctx.set_reference(Some(button));
//! ctx.set_floating(Some(tooltip));
//!
//! let mut interactions: Interactions<NodeId, MemoryDom> = Interactions::new()
//!     .with(Hover::new(HoverOptions {
//!         delay: Delay::Fixed(300),
//!         ..HoverOptions::default()
//!     }))
//!     .with(Dismiss::new(DismissOptions::default()))
//!     .with(RoleProps::new(RoleOptions::new(Role::Tooltip)));
//! interactions.sync(&mut ctx, &mut dom);
//!
//! // Hover the button; the tooltip opens once the delay elapses.
//! let enter = DomEvent::new(EventKind::MouseEnter).with_target(button);
//! let key = HandlerKey::bubble(EventKind::MouseEnter);
//! interactions.dispatch(&mut ctx, &mut dom, Slot::Reference, key, &enter, None);
//! for id in dom.advance(300) {
//!     interactions.on_timer(&mut ctx, &mut dom, id);
//! }
//! assert!(ctx.open());
//!
//! let props = interactions.props(&ctx, Slot::Reference, None);
//! assert_eq!(
//!     props.attributes.get("aria-describedby"),
//!     Some(&AttrValue::from(ctx.floating_id()))
//! );
//!
//! // Escape reaches the document listener installed by `Dismiss`.
//! let escape = DomEvent::new(EventKind::KeyDown).with_key(Key::Escape);
//! for id in dom.listeners_for(ListenerTarget::Document, EventKind::KeyDown) {
//!     interactions.on_listener(&mut ctx, &mut dom, id, &escape);
//! }
//! assert!(!ctx.open());
//! ```
//!
//! This crate is `no_std` and uses `alloc`. The in-memory host used above is
//! behind the `memory_host` feature.

#![no_std]

extern crate alloc;

pub mod adapters;
pub mod bus;
pub mod click;
pub mod context;
pub mod delay_group;
pub mod dismiss;
pub mod dom;
pub mod error;
pub mod focus;
pub mod host;
pub mod hover;
pub mod interactions;
pub mod position;
pub mod role;
pub mod safe_polygon;
pub mod types;

pub use error::{Capability, Error};

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A click-toggled popover that is positioned below its button and closes on
//! an outside press.
//!
//! Run:
//! - `cargo run -p understory_floating_demos --example popover_click`

use std::collections::BTreeMap;
use std::convert::Infallible;

use kurbo::Rect;
use understory_floating::adapters::memory::{MemoryDom, NodeId};
use understory_floating::click::{Click, ClickOptions};
use understory_floating::dismiss::{Dismiss, DismissOptions};
use understory_floating::dom::Dom;
use understory_floating::host::ListenerTarget;
use understory_floating::interactions::{HandlerKey, Interactions, Slot};
use understory_floating::position::{ComputedPosition, Floating, PositionConfig, Positioner};
use understory_floating::role::{Role, RoleOptions, RoleProps};
use understory_floating::types::{DomEvent, EventKind, Side};

/// Places the floating element flush against the requested side.
struct Flush {
    rects: BTreeMap<NodeId, Rect>,
}

impl Positioner<NodeId> for Flush {
    type Error = Infallible;

    async fn compute(
        &self,
        reference: NodeId,
        floating: NodeId,
        config: &PositionConfig,
    ) -> Result<ComputedPosition, Self::Error> {
        let r = self.rects.get(&reference).copied().unwrap_or_default();
        let f = self.rects.get(&floating).copied().unwrap_or_default();
        let (x, y) = match config.placement.side() {
            Side::Top => (r.x0, r.y0 - f.height()),
            Side::Bottom => (r.x0, r.y1),
            Side::Left => (r.x0 - f.width(), r.y0),
            Side::Right => (r.x1, r.y0),
        };
        Ok(ComputedPosition::new(x, y, config.placement, config.strategy))
    }
}

fn main() {
    let mut dom = MemoryDom::new();
    let body = dom.body();
    let button = dom.create_element(body, "button");
    let panel = dom.create_element(body, "div");
    let outside = dom.create_element(body, "main");
    dom.set_bounds(button, Rect::new(20.0, 20.0, 120.0, 44.0));
    dom.set_bounds(panel, Rect::new(0.0, 0.0, 200.0, 150.0));

    let rects = [button, panel]
        .into_iter()
        .filter_map(|n| dom.bounding_rect(&n).map(|r| (n, r)))
        .collect();
    let mut floating: Floating<NodeId, Flush> = Floating::new(Flush { rects });
    let ctx = floating.context_mut();
    ctx.set_open(false);
    ctx.set_reference(Some(button));
    ctx.set_floating(Some(panel));
    ctx.set_on_open_change(|change| {
        println!("open -> {} ({:?})", change.open, change.reason);
    });

    let mut interactions: Interactions<NodeId, MemoryDom> = Interactions::new()
        .with(Click::new(ClickOptions::default()))
        .with(Dismiss::new(DismissOptions::default()))
        .with(RoleProps::new(RoleOptions::new(Role::Dialog)));
    interactions.sync(floating.context_mut(), &mut dom);

    println!("== Reference props ==");
    for (name, value) in &interactions.props(floating.context(), Slot::Reference, None).attributes {
        println!("  {name} = {value}");
    }

    let click = DomEvent::new(EventKind::Click).with_target(button);
    interactions.dispatch(
        floating.context_mut(),
        &mut dom,
        Slot::Reference,
        HandlerKey::bubble(EventKind::Click),
        &click,
        None,
    );
    assert!(floating.context().open());

    pollster::block_on(floating.refresh()).unwrap();
    println!("== Floating styles ==\n  {}", floating.floating_styles(&dom));
    assert_eq!((floating.context().x(), floating.context().y()), (20.0, 44.0));

    println!("== Floating props ==");
    for (name, value) in &interactions.props(floating.context(), Slot::Floating, None).attributes {
        println!("  {name} = {value}");
    }

    // The document listener runs in the capture phase and checks the press
    // once it reaches its target.
    let press = DomEvent::new(EventKind::PointerDown).with_target(outside);
    for phase in [ListenerTarget::Document, ListenerTarget::Element(outside)] {
        for id in dom.listeners_for(phase, EventKind::PointerDown) {
            interactions.on_listener(floating.context_mut(), &mut dom, id, &press);
        }
    }
    assert!(!floating.context().open());
    assert!(!floating.context().is_positioned());
    assert_eq!(dom.listener_count(), 0);
}

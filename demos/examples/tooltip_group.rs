// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two toolbar tooltips in a delay group.
//!
//! The first tooltip waits for the full open delay. Once it is showing,
//! moving to the neighbouring button swaps tooltips almost instantly.
//!
//! Run:
//! - `cargo run -p understory_floating_demos --example tooltip_group`

use std::rc::Rc;

use kurbo::{Point, Rect};
use understory_floating::adapters::memory::{MemoryDom, NodeId};
use understory_floating::context::FloatingContext;
use understory_floating::delay_group::{DelayGroup, DelayGroupMember};
use understory_floating::host::ListenerTarget;
use understory_floating::hover::{Delay, Hover, HoverOptions};
use understory_floating::interactions::{HandlerKey, Interactions, Slot};
use understory_floating::role::{Role, RoleOptions, RoleProps};
use understory_floating::safe_polygon::SafePolygon;
use understory_floating::types::{DomEvent, EventKind};

struct Tooltip {
    name: &'static str,
    button: NodeId,
    ctx: FloatingContext<NodeId>,
    interactions: Interactions<NodeId, MemoryDom>,
}

impl Tooltip {
    fn new(
        dom: &mut MemoryDom,
        group: &Rc<DelayGroup>,
        name: &'static str,
        bounds: Rect,
    ) -> Self {
        let body = dom.body();
        let button = dom.create_element(body, "button");
        let tip = dom.create_element(body, "div");
        dom.set_bounds(button, bounds);
        dom.set_bounds(
            tip,
            Rect::new(bounds.x0, bounds.y1 + 4.0, bounds.x0 + 120.0, bounds.y1 + 34.0),
        );

        let mut ctx = FloatingContext::new().with_open(false);
        ctx.set_reference(Some(button));
        ctx.set_floating(Some(tip));
        ctx.set_on_open_change(move |change| {
            println!("  {name}: open -> {} ({:?})", change.open, change.reason);
        });

        let hover = Hover::new(HoverOptions {
            handle_close: Some(Box::new(SafePolygon::new())),
            ..HoverOptions::default()
        })
        .with_delay_group(group.clone());
        let mut interactions = Interactions::new()
            .with(DelayGroupMember::new(group.clone(), name))
            .with(hover)
            .with(RoleProps::new(RoleOptions::new(Role::Tooltip)));
        interactions.sync(&mut ctx, dom);
        Self {
            name,
            button,
            ctx,
            interactions,
        }
    }

    fn pointer(&mut self, dom: &mut MemoryDom, kind: EventKind, at: Point) {
        let event = DomEvent::new(kind)
            .with_target(self.button)
            .with_client(at);
        self.interactions.dispatch(
            &mut self.ctx,
            dom,
            Slot::Reference,
            HandlerKey::bubble(kind),
            &event,
            None,
        );
    }
}

fn advance(dom: &mut MemoryDom, tips: &mut [&mut Tooltip], ms: u64) {
    for id in dom.advance(ms) {
        for tip in tips.iter_mut() {
            tip.interactions.on_timer(&mut tip.ctx, dom, id);
        }
    }
    // Group changes are observed on sync.
    for tip in tips.iter_mut() {
        tip.interactions.sync(&mut tip.ctx, dom);
    }
}

fn main() {
    let group = Rc::new(
        DelayGroup::new(Delay::Split {
            open: Some(600),
            close: Some(100),
        })
        .with_timeout_ms(200),
    );
    let mut dom = MemoryDom::new();
    let mut bold = Tooltip::new(&mut dom, &group, "bold", Rect::new(0.0, 0.0, 32.0, 32.0));
    let mut italic = Tooltip::new(&mut dom, &group, "italic", Rect::new(36.0, 0.0, 68.0, 32.0));

    println!("== Hover bold ==");
    bold.pointer(&mut dom, EventKind::MouseEnter, Point::new(16.0, 16.0));
    advance(&mut dom, &mut [&mut bold, &mut italic], 599);
    assert!(!bold.ctx.open());
    advance(&mut dom, &mut [&mut bold, &mut italic], 1);
    assert!(bold.ctx.open());
    println!("  group delay is now {:?}", group.delay());

    println!("== Move to italic ==");
    bold.pointer(&mut dom, EventKind::MouseLeave, Point::new(34.0, 16.0));
    italic.pointer(&mut dom, EventKind::MouseEnter, Point::new(40.0, 16.0));
    advance(&mut dom, &mut [&mut bold, &mut italic], 1);
    assert!(italic.ctx.open());
    assert!(!bold.ctx.open());
    assert!(group.is_instant_phase());
    println!(
        "  current = {:?}, instant = {}",
        group.current_id(),
        group.is_instant_phase()
    );

    println!("== Leave the toolbar ==");
    italic.pointer(&mut dom, EventKind::MouseLeave, Point::new(52.0, -10.0));
    // Heading away from the tooltip leaves the safe polygon.
    let away = DomEvent::new(EventKind::MouseMove).with_client(Point::new(52.0, -30.0));
    for id in dom.listeners_for(ListenerTarget::Document, EventKind::MouseMove) {
        for tip in [&mut bold, &mut italic] {
            tip.interactions.on_listener(&mut tip.ctx, &mut dom, id, &away);
        }
    }
    advance(&mut dom, &mut [&mut bold, &mut italic], 100);
    assert!(!italic.ctx.open());
    advance(&mut dom, &mut [&mut bold, &mut italic], 200);
    assert_eq!(group.current_id(), None);
    println!("  group reset to {:?}", group.delay());

    for tip in [&mut bold, &mut italic] {
        tip.interactions.teardown(&mut tip.ctx, &mut dom);
        println!("  {} torn down", tip.name);
    }
    assert_eq!(dom.pending_timers(), 0);
    assert_eq!(dom.listener_count(), 0);
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory host: a small document, a listener registry and a manual clock.
//!
//! [`MemoryDom`] implements [`Dom`], [`EventSource`] and [`Scheduler`], so it
//! is a complete [`Host`](crate::host::Host). Nothing is delivered on its own:
//! callers look up the listeners registered for an event with
//! [`MemoryDom::listeners_for`] and advance time with [`MemoryDom::advance`],
//! then hand the returned ids to the controllers. This keeps every scenario
//! deterministic.
//!
//! ```
//! use understory_floating::adapters::memory::MemoryDom;
//! use understory_floating::host::Scheduler;
//!
//! let mut dom = MemoryDom::new();
//! let button = dom.create_element(dom.body(), "button");
//! let t = dom.set_timeout(100);
//! assert!(dom.advance(99).is_empty());
//! assert_eq!(dom.advance(1), vec![t]);
//! # let _ = button;
//! ```

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use kurbo::Rect;

use crate::dom::{Dom, Environment, PointerEvents, ScrollMetrics, ScrollTarget};
use crate::error::{Capability, Error};
use crate::host::{EventSource, ListenerId, ListenerOptions, ListenerTarget, Scheduler, TimerId};
use crate::types::EventKind;

/// Handle of a node in a [`MemoryDom`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum NodeKind {
    Document,
    Element,
    Text,
    ShadowRoot,
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    host: Option<NodeId>,
    tag: String,
    attrs: BTreeMap<String, String>,
    bounds: Option<Rect>,
    scroll: Option<ScrollMetrics>,
    scroll_container: bool,
    pointer_events: Option<PointerEvents>,
}

impl Node {
    fn new(kind: NodeKind, parent: Option<NodeId>, tag: &str) -> Self {
        Self {
            kind,
            parent,
            host: None,
            tag: tag.to_ascii_uppercase(),
            attrs: BTreeMap::new(),
            bounds: None,
            scroll: None,
            scroll_container: false,
            pointer_events: None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Listener {
    target: ListenerTarget<NodeId>,
    kind: EventKind,
    options: ListenerOptions,
}

/// Deterministic document, listener registry and timer wheel.
#[derive(Clone, Debug)]
pub struct MemoryDom {
    nodes: Vec<Node>,
    document: NodeId,
    html: NodeId,
    body: NodeId,
    focused: Option<NodeId>,
    dpr: f64,
    env: Environment,
    focus_visible_supported: bool,
    focus_visible: BTreeSet<NodeId>,
    listeners: BTreeMap<ListenerId, Listener>,
    rejected: BTreeSet<EventKind>,
    next_listener: u64,
    timers: BTreeMap<TimerId, u64>,
    next_timer: u64,
    now: u64,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// A document with `<html>` and `<body>`.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: NodeId(0),
            html: NodeId(0),
            body: NodeId(0),
            focused: None,
            dpr: 1.0,
            env: Environment::default(),
            focus_visible_supported: true,
            focus_visible: BTreeSet::new(),
            listeners: BTreeMap::new(),
            rejected: BTreeSet::new(),
            next_listener: 0,
            timers: BTreeMap::new(),
            next_timer: 0,
            now: 0,
        };
        dom.document = dom.push(Node::new(NodeKind::Document, None, "#document"));
        dom.html = dom.create_element(dom.document, "html");
        dom.body = dom.create_element(dom.html, "body");
        dom
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// The document node.
    pub fn document(&self) -> NodeId {
        self.document
    }

    /// `<html>`.
    pub fn html(&self) -> NodeId {
        self.html
    }

    /// `<body>`.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Append an element under `parent`.
    pub fn create_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push(Node::new(NodeKind::Element, Some(parent), tag))
    }

    /// Append a text node under `parent`.
    pub fn create_text(&mut self, parent: NodeId) -> NodeId {
        self.push(Node::new(NodeKind::Text, Some(parent), "#text"))
    }

    /// Attach an open shadow root to `host`.
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        let mut root = Node::new(NodeKind::ShadowRoot, None, "#shadow-root");
        root.host = Some(host);
        self.push(root)
    }

    /// Set the bounding client rect.
    pub fn set_bounds(&mut self, node: NodeId, bounds: Rect) {
        if let Some(n) = self.node_mut(&node) {
            n.bounds = Some(bounds);
        }
    }

    /// Set scroll geometry.
    pub fn set_scroll_metrics(&mut self, node: NodeId, metrics: ScrollMetrics) {
        if let Some(n) = self.node_mut(&node) {
            n.scroll = Some(metrics);
        }
    }

    /// Mark `node` as an overflow (scroll) container.
    pub fn set_scroll_container(&mut self, node: NodeId, scrolls: bool) {
        if let Some(n) = self.node_mut(&node) {
            n.scroll_container = scrolls;
        }
    }

    /// Move focus.
    pub fn focus(&mut self, node: Option<NodeId>) {
        self.focused = node;
    }

    /// Set `devicePixelRatio`.
    pub fn set_device_pixel_ratio(&mut self, dpr: f64) {
        self.dpr = dpr;
    }

    /// Set platform facts.
    pub fn set_environment(&mut self, env: Environment) {
        self.env = env;
    }

    /// Whether `:focus-visible` matching is supported.
    pub fn set_focus_visible_supported(&mut self, supported: bool) {
        self.focus_visible_supported = supported;
    }

    /// Whether `node` matches `:focus-visible`.
    pub fn set_focus_visible(&mut self, node: NodeId, visible: bool) {
        if visible {
            self.focus_visible.insert(node);
        } else {
            self.focus_visible.remove(&node);
        }
    }

    /// Inline `pointer-events` of a node.
    pub fn pointer_events(&self, node: NodeId) -> Option<PointerEvents> {
        self.node(&node).and_then(|n| n.pointer_events)
    }

    /// `event.composedPath()` for an event targeted at `node`: innermost
    /// first, crossing shadow roots, ending at the document.
    pub fn composed_path(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut next = Some(node);
        while let Some(id) = next {
            path.push(id);
            next = self.node(&id).and_then(|n| n.parent.or(n.host));
        }
        path
    }

    /// Make the host refuse listeners of `kind`.
    pub fn reject_listeners(&mut self, kind: EventKind) {
        self.rejected.insert(kind);
    }

    /// Listeners registered on `target` for `kind`, in registration order.
    ///
    /// This models one delivery: `ONCE` listeners are removed.
    pub fn listeners_for(
        &mut self,
        target: ListenerTarget<NodeId>,
        kind: EventKind,
    ) -> Vec<ListenerId> {
        let ids: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, l)| l.target == target && l.kind == kind)
            .map(|(id, _)| *id)
            .collect();
        self.listeners.retain(|id, l| {
            !(ids.contains(id) && l.options.contains(ListenerOptions::ONCE))
        });
        ids
    }

    /// Registration details of a listener.
    pub fn listener(
        &self,
        id: ListenerId,
    ) -> Option<(ListenerTarget<NodeId>, EventKind, ListenerOptions)> {
        self.listeners
            .get(&id)
            .map(|l| (l.target, l.kind, l.options))
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Current time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Number of scheduled timers.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Advance the clock and return the expired timers in deadline order.
    pub fn advance(&mut self, ms: u64) -> Vec<TimerId> {
        self.now += ms;
        let mut due: Vec<(u64, TimerId)> = self
            .timers
            .iter()
            .filter(|(_, deadline)| **deadline <= self.now)
            .map(|(id, deadline)| (*deadline, *id))
            .collect();
        due.sort();
        for (_, id) in &due {
            self.timers.remove(id);
        }
        due.into_iter().map(|(_, id)| id).collect()
    }
}

impl Dom<NodeId> for MemoryDom {
    fn parent_node(&self, node: &NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn shadow_host(&self, node: &NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.host)
    }

    fn is_element(&self, node: &NodeId) -> bool {
        self.node(node).is_some_and(|n| n.kind == NodeKind::Element)
    }

    fn is_document(&self, node: &NodeId) -> bool {
        self.node(node).is_some_and(|n| n.kind == NodeKind::Document)
    }

    fn tag_name(&self, node: &NodeId) -> Option<&str> {
        self.node(node)
            .filter(|n| n.kind == NodeKind::Element)
            .map(|n| n.tag.as_str())
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<&str> {
        self.node(node)?.attrs.get(name).map(String::as_str)
    }

    fn elements_with_attribute(&self, name: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == NodeKind::Element && n.attrs.contains_key(name))
            .filter_map(|(i, _)| u32::try_from(i).ok().map(NodeId))
            .collect()
    }

    fn scroll_metrics(&self, node: &NodeId) -> Option<ScrollMetrics> {
        self.node(node)
            .filter(|n| n.kind == NodeKind::Element)
            .map(|n| n.scroll.unwrap_or_default())
    }

    fn overflow_ancestors(&self, node: &NodeId) -> Vec<ScrollTarget<NodeId>> {
        let mut out = Vec::new();
        let mut next = self.node(node).and_then(|n| n.parent.or(n.host));
        while let Some(id) = next {
            let Some(n) = self.node(&id) else {
                break;
            };
            if n.kind == NodeKind::Element && n.scroll_container {
                out.push(ScrollTarget::Element(id));
            }
            next = n.parent.or(n.host);
        }
        out.push(ScrollTarget::Window);
        out.push(ScrollTarget::VisualViewport);
        out
    }

    fn bounding_rect(&self, node: &NodeId) -> Option<Rect> {
        self.node(node)?.bounds
    }

    fn device_pixel_ratio(&self, _node: &NodeId) -> f64 {
        self.dpr
    }

    fn active_element(&self) -> Option<NodeId> {
        self.focused
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }

    fn matches_focus_visible(&self, node: &NodeId) -> Result<bool, Error> {
        if self.focus_visible_supported {
            Ok(self.focus_visible.contains(node))
        } else {
            Err(Error::Unsupported(Capability::FocusVisible))
        }
    }

    fn environment(&self) -> Environment {
        self.env
    }

    fn set_pointer_events(&mut self, node: &NodeId, value: Option<PointerEvents>) {
        if let Some(n) = self.node_mut(node) {
            n.pointer_events = value;
        }
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: Option<&str>) {
        if let Some(n) = self.node_mut(node) {
            match value {
                Some(v) => {
                    n.attrs.insert(String::from(name), String::from(v));
                }
                None => {
                    n.attrs.remove(name);
                }
            }
        }
    }
}

impl EventSource<NodeId> for MemoryDom {
    fn add_listener(
        &mut self,
        target: ListenerTarget<NodeId>,
        kind: EventKind,
        options: ListenerOptions,
    ) -> Result<ListenerId, Error> {
        if self.rejected.contains(&kind) {
            return Err(Error::ListenerRejected { kind });
        }
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.insert(
            id,
            Listener {
                target,
                kind,
                options,
            },
        );
        Ok(id)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }
}

impl Scheduler for MemoryDom {
    fn set_timeout(&mut self, delay_ms: u32) -> TimerId {
        self.next_timer += 1;
        let id = TimerId(self.next_timer);
        self.timers.insert(id, self.now + u64::from(delay_ms));
        id
    }

    fn clear_timeout(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_basics() {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        let div = dom.create_element(body, "div");
        assert_eq!(dom.tag_name(&div), Some("DIV"));
        assert_eq!(dom.tag_name(&body), Some("BODY"));
        assert_eq!(dom.parent_node(&div), Some(body));
        assert!(dom.is_document(&dom.document()));
        assert_eq!(Dom::body(&dom), Some(body));
    }

    #[test]
    fn composed_path_crosses_shadow_roots() {
        let mut dom = MemoryDom::new();
        let host = dom.create_element(dom.body(), "x-card");
        let root = dom.attach_shadow(host);
        let inner = dom.create_element(root, "p");
        assert_eq!(
            dom.composed_path(inner),
            [inner, root, host, dom.body(), dom.html(), dom.document()]
        );
    }

    #[test]
    fn overflow_ancestors_end_with_window_and_viewport() {
        let mut dom = MemoryDom::new();
        let scroller = dom.create_element(dom.body(), "div");
        dom.set_scroll_container(scroller, true);
        let leaf = dom.create_element(scroller, "span");
        assert_eq!(
            dom.overflow_ancestors(&leaf),
            [
                ScrollTarget::Element(scroller),
                ScrollTarget::Window,
                ScrollTarget::VisualViewport
            ]
        );
    }

    #[test]
    fn once_listeners_are_dropped_after_delivery() {
        let mut dom = MemoryDom::new();
        let el = dom.create_element(dom.body(), "div");
        let id = dom
            .add_listener(
                ListenerTarget::Element(el),
                EventKind::KeyDown,
                ListenerOptions::ONCE,
            )
            .unwrap();
        assert_eq!(
            dom.listeners_for(ListenerTarget::Element(el), EventKind::KeyDown),
            [id]
        );
        assert!(
            dom.listeners_for(ListenerTarget::Element(el), EventKind::KeyDown)
                .is_empty()
        );
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let mut dom = MemoryDom::new();
        let late = dom.set_timeout(50);
        let early = dom.set_timeout(10);
        let cleared = dom.set_timeout(20);
        dom.clear_timeout(cleared);
        assert_eq!(dom.pending_timers(), 2);
        assert_eq!(dom.advance(60), [early, late]);
        assert_eq!(dom.now(), 60);
    }

    #[test]
    fn focus_visible_capability() {
        let mut dom = MemoryDom::new();
        let el = dom.create_element(dom.body(), "input");
        dom.set_focus_visible(el, true);
        assert_eq!(dom.matches_focus_visible(&el), Ok(true));
        dom.set_focus_visible_supported(false);
        assert_eq!(
            dom.matches_focus_visible(&el),
            Err(Error::Unsupported(Capability::FocusVisible))
        );
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host document queries and the traversal helpers built on them.
//!
//! ## Overview
//!
//! [`Dom`] is the read side of the host contract (plus two style mutations).
//! It mirrors the lookup traits of a responder: the host answers small
//! questions about its nodes, and this module composes them into the
//! traversals the controllers need, for example [`contains`] which crosses
//! shadow boundaries, or [`top_level_ancestor`] used by outside-press
//! filtering.
//!
//! Node keys are plain `Copy + Eq` values; the host decides what they are.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use kurbo::Rect;

use crate::error::Error;
use crate::types::DomEvent;

/// Platform facts used by heuristics.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Environment {
    /// Running on Android.
    pub android: bool,
    /// Running under jsdom (tests): pointer events are never virtual.
    pub jsdom: bool,
    /// Safari engine.
    pub safari: bool,
    /// macOS without touch points.
    pub mac: bool,
}

/// Scroll geometry of an HTML element.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ScrollMetrics {
    /// `clientWidth`
    pub client_width: f64,
    /// `clientHeight`
    pub client_height: f64,
    /// `scrollWidth`
    pub scroll_width: f64,
    /// `scrollHeight`
    pub scroll_height: f64,
    /// `offsetWidth`
    pub offset_width: f64,
    /// Computed `direction: rtl`.
    pub rtl: bool,
}

/// Something that emits `scroll` events.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ScrollTarget<K> {
    /// A scrollable element.
    Element(K),
    /// The window.
    Window,
    /// The visual viewport (pinch zoom).
    VisualViewport,
}

/// CSS `pointer-events` values written by the hover controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PointerEvents {
    /// `pointer-events: none`
    None,
    /// `pointer-events: auto`
    Auto,
}

impl PointerEvents {
    /// CSS keyword.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Auto => "auto",
        }
    }
}

/// Document queries and the few mutations the controllers perform.
///
/// `parent_node` follows the light tree only: a shadow root has no parent,
/// and its host is reported through `shadow_host`.
pub trait Dom<K> {
    /// `node.parentNode`.
    fn parent_node(&self, node: &K) -> Option<K>;

    /// The host element when `node` is a shadow root.
    fn shadow_host(&self, node: &K) -> Option<K>;

    /// Whether `node` is an element.
    fn is_element(&self, node: &K) -> bool;

    /// Whether `node` is the document node.
    fn is_document(&self, _node: &K) -> bool {
        false
    }

    /// Upper-case tag name of an element.
    fn tag_name(&self, node: &K) -> Option<&str>;

    /// Attribute value.
    fn attribute(&self, node: &K, name: &str) -> Option<&str>;

    /// Whether the attribute is present.
    fn has_attribute(&self, node: &K, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Every element in the document carrying attribute `name`.
    fn elements_with_attribute(&self, name: &str) -> Vec<K>;

    /// Scroll geometry; `None` for nodes that are not HTML elements.
    fn scroll_metrics(&self, node: &K) -> Option<ScrollMetrics>;

    /// Scrollable ancestors of `node`, nearest first, including the window and
    /// visual viewport.
    fn overflow_ancestors(&self, node: &K) -> Vec<ScrollTarget<K>>;

    /// `getBoundingClientRect()`.
    fn bounding_rect(&self, node: &K) -> Option<Rect>;

    /// `devicePixelRatio` of the node's window.
    fn device_pixel_ratio(&self, _node: &K) -> f64 {
        1.0
    }

    /// Deepest focused element, following open shadow roots.
    fn active_element(&self) -> Option<K>;

    /// `document.body`.
    fn body(&self) -> Option<K>;

    /// `node.matches(":focus-visible")`.
    fn matches_focus_visible(&self, node: &K) -> Result<bool, Error>;

    /// Platform facts.
    fn environment(&self) -> Environment {
        Environment::default()
    }

    /// Set or clear the inline `pointer-events` style.
    fn set_pointer_events(&mut self, node: &K, value: Option<PointerEvents>);

    /// Set (`Some`) or remove (`None`) an attribute.
    fn set_attribute(&mut self, node: &K, name: &str, value: Option<&str>);
}

/// Namespaced data attribute (`data-floating-ui-{name}`).
pub fn create_attribute(name: &str) -> String {
    format!("data-floating-ui-{name}")
}

/// Light-tree `parent.contains(child)`, inclusive.
pub fn contains_light<K: Copy + Eq>(dom: &(impl Dom<K> + ?Sized), parent: K, child: K) -> bool {
    let mut next = Some(child);
    while let Some(node) = next {
        if node == parent {
            return true;
        }
        next = dom.parent_node(&node);
    }
    false
}

/// `parent.contains(child)`, continuing through shadow hosts when `child`
/// lives in a shadow tree.
pub fn contains<K: Copy + Eq>(
    dom: &(impl Dom<K> + ?Sized),
    parent: Option<K>,
    child: Option<K>,
) -> bool {
    let (Some(parent), Some(child)) = (parent, child) else {
        return false;
    };
    if contains_light(dom, parent, child) {
        return true;
    }
    if dom.shadow_host(&root_node(dom, child)).is_none() {
        return false;
    }
    let mut next = Some(child);
    while let Some(node) = next {
        if node == parent {
            return true;
        }
        next = dom.parent_node(&node).or_else(|| dom.shadow_host(&node));
    }
    false
}

/// `node.getRootNode()` without crossing shadow boundaries.
pub fn root_node<K: Copy>(dom: &(impl Dom<K> + ?Sized), node: K) -> K {
    let mut root = node;
    while let Some(parent) = dom.parent_node(&root) {
        root = parent;
    }
    root
}

/// Whether the event's target is `node` or inside it.
///
/// Uses the composed path when present, so nodes inside shadow trees count.
pub fn is_event_target_within<K: Copy + Eq>(
    dom: &(impl Dom<K> + ?Sized),
    event: &DomEvent<K>,
    node: Option<K>,
) -> bool {
    let Some(node) = node else {
        return false;
    };
    match &event.composed_path {
        Some(path) => path.contains(&node),
        None => event
            .target
            .is_some_and(|target| contains_light(dom, node, target)),
    }
}

/// `<html>` or `<body>`.
pub fn is_root_element<K>(dom: &(impl Dom<K> + ?Sized), node: &K) -> bool {
    matches!(dom.tag_name(node), Some("HTML" | "BODY"))
}

/// `<html>`, `<body>`, or the document: traversal stops here.
pub fn is_last_traversable_node<K>(dom: &(impl Dom<K> + ?Sized), node: &K) -> bool {
    dom.is_document(node) || is_root_element(dom, node)
}

/// Composed parent: steps out of shadow roots to their host.
pub fn composed_parent<K: Copy>(dom: &(impl Dom<K> + ?Sized), node: &K) -> Option<K> {
    if matches!(dom.tag_name(node), Some("HTML")) {
        return Some(*node);
    }
    let parent = dom
        .parent_node(node)
        .or_else(|| dom.shadow_host(node))?;
    Some(dom.shadow_host(&parent).unwrap_or(parent))
}

/// Highest element ancestor of `target` below `<body>`/`<html>`.
///
/// Returns `None` when `target` is not an element.
pub fn top_level_ancestor<K: Copy>(dom: &(impl Dom<K> + ?Sized), target: Option<K>) -> Option<K> {
    let mut current = target.filter(|t| dom.is_element(t))?;
    while !is_last_traversable_node(dom, &current) {
        let Some(next) = composed_parent(dom, &current) else {
            break;
        };
        if is_last_traversable_node(dom, &next) || !dom.is_element(&next) {
            break;
        }
        current = next;
    }
    Some(current)
}

/// Elements that accept typed text: enabled non-hidden inputs, enabled
/// textareas, and `contenteditable` elements.
pub fn is_typeable_element<K>(dom: &(impl Dom<K> + ?Sized), node: Option<&K>) -> bool {
    let Some(node) = node else {
        return false;
    };
    if !dom.is_element(node) {
        return false;
    }
    let disabled = dom.has_attribute(node, "disabled");
    match dom.tag_name(node) {
        Some("INPUT") => !disabled && dom.attribute(node, "type") != Some("hidden"),
        Some("TEXTAREA") => !disabled,
        _ => dom
            .attribute(node, "contenteditable")
            .is_some_and(|v| v != "false"),
    }
}

/// Pointer events synthesized by assistive technology rather than a device.
pub fn is_virtual_pointer_event<K: Copy>(env: Environment, event: &DomEvent<K>) -> bool {
    use crate::types::PointerType;

    if env.jsdom {
        return false;
    }
    let Some(p) = event.pointer else {
        return false;
    };
    (!env.android && p.width == 0.0 && p.height == 0.0)
        || (env.android
            && p.width == 1.0
            && p.height == 1.0
            && p.pressure == 0.0
            && event.detail == 0
            && p.pointer_type == PointerType::Mouse)
        // Screen readers on iOS report a sub-pixel touch contact.
        || (p.width < 1.0
            && p.height < 1.0
            && p.pressure == 0.0
            && event.detail == 0
            && p.pointer_type == PointerType::Touch)
}

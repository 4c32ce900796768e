// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types: placements, pointer kinds, open-change reasons, and host events.
//!
//! ## Overview
//!
//! These types describe what the host feeds into the controllers (a [`DomEvent`])
//! and what the controllers report back (an [`OpenChangeReason`]).
//! They are shared by every module in this crate.

use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;
use core::str::FromStr;

use kurbo::Point;

use crate::error::Error;

/// Side of the reference element the floating element is placed on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    /// Above the reference.
    Top,
    /// Right of the reference.
    Right,
    /// Below the reference.
    Bottom,
    /// Left of the reference.
    Left,
}

/// Alignment along the placement side.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Alignment {
    /// Aligned to the start edge.
    Start,
    /// Aligned to the end edge.
    End,
}

/// Where the floating element sits relative to its reference.
///
/// One of four sides, optionally aligned to the start or end of that side.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Placement {
    /// `top`
    Top,
    /// `top-start`
    TopStart,
    /// `top-end`
    TopEnd,
    /// `right`
    Right,
    /// `right-start`
    RightStart,
    /// `right-end`
    RightEnd,
    /// `bottom`
    #[default]
    Bottom,
    /// `bottom-start`
    BottomStart,
    /// `bottom-end`
    BottomEnd,
    /// `left`
    Left,
    /// `left-start`
    LeftStart,
    /// `left-end`
    LeftEnd,
}

impl Placement {
    /// Every placement, side-major.
    pub const ALL: [Self; 12] = [
        Self::Top,
        Self::TopStart,
        Self::TopEnd,
        Self::Right,
        Self::RightStart,
        Self::RightEnd,
        Self::Bottom,
        Self::BottomStart,
        Self::BottomEnd,
        Self::Left,
        Self::LeftStart,
        Self::LeftEnd,
    ];

    /// Build a placement from its side and optional alignment.
    pub const fn from_parts(side: Side, alignment: Option<Alignment>) -> Self {
        match (side, alignment) {
            (Side::Top, None) => Self::Top,
            (Side::Top, Some(Alignment::Start)) => Self::TopStart,
            (Side::Top, Some(Alignment::End)) => Self::TopEnd,
            (Side::Right, None) => Self::Right,
            (Side::Right, Some(Alignment::Start)) => Self::RightStart,
            (Side::Right, Some(Alignment::End)) => Self::RightEnd,
            (Side::Bottom, None) => Self::Bottom,
            (Side::Bottom, Some(Alignment::Start)) => Self::BottomStart,
            (Side::Bottom, Some(Alignment::End)) => Self::BottomEnd,
            (Side::Left, None) => Self::Left,
            (Side::Left, Some(Alignment::Start)) => Self::LeftStart,
            (Side::Left, Some(Alignment::End)) => Self::LeftEnd,
        }
    }

    /// The side component.
    pub const fn side(self) -> Side {
        match self {
            Self::Top | Self::TopStart | Self::TopEnd => Side::Top,
            Self::Right | Self::RightStart | Self::RightEnd => Side::Right,
            Self::Bottom | Self::BottomStart | Self::BottomEnd => Side::Bottom,
            Self::Left | Self::LeftStart | Self::LeftEnd => Side::Left,
        }
    }

    /// The alignment component, if any.
    pub const fn alignment(self) -> Option<Alignment> {
        match self {
            Self::TopStart | Self::RightStart | Self::BottomStart | Self::LeftStart => {
                Some(Alignment::Start)
            }
            Self::TopEnd | Self::RightEnd | Self::BottomEnd | Self::LeftEnd => Some(Alignment::End),
            _ => None,
        }
    }

    /// The kebab-case name used by positioners (`"bottom-start"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::TopStart => "top-start",
            Self::TopEnd => "top-end",
            Self::Right => "right",
            Self::RightStart => "right-start",
            Self::RightEnd => "right-end",
            Self::Bottom => "bottom",
            Self::BottomStart => "bottom-start",
            Self::BottomEnd => "bottom-end",
            Self::Left => "left",
            Self::LeftStart => "left-start",
            Self::LeftEnd => "left-end",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Placement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::InvalidPlacement(String::from(s)))
    }
}

/// CSS positioning strategy of the floating element.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Strategy {
    /// `position: absolute`
    #[default]
    Absolute,
    /// `position: fixed`
    Fixed,
}

impl Strategy {
    /// CSS keyword.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Absolute => "absolute",
            Self::Fixed => "fixed",
        }
    }
}

/// Input device behind a pointer event.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PointerType {
    /// Mouse.
    Mouse,
    /// Pen or stylus. Some platforms report mice as pens.
    Pen,
    /// Touch screen.
    Touch,
    /// The host reported an empty pointer type.
    Unknown,
}

/// Whether a pointer behaves like a mouse for hover purposes.
///
/// `None` means no pointer event has been seen yet. Outside of `strict` mode
/// both `None` and [`PointerType::Unknown`] count as mouse-like.
pub fn is_mouse_like(pointer: Option<PointerType>, strict: bool) -> bool {
    match pointer {
        Some(PointerType::Mouse | PointerType::Pen) => true,
        Some(PointerType::Unknown) | None => !strict,
        Some(PointerType::Touch) => false,
    }
}

/// Why the open state changed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OpenChangeReason {
    /// Pressed outside the floating and reference elements.
    OutsidePress,
    /// Escape key.
    EscapeKey,
    /// An overflow ancestor scrolled.
    AncestorScroll,
    /// Pressed the reference element.
    ReferencePress,
    /// Click or keyboard activation.
    Click,
    /// Pointer hover.
    Hover,
    /// Focus moved.
    Focus,
    /// List navigation (reserved for list controllers).
    ListNavigation,
    /// A hover close strategy decided to close.
    SafePolygon,
}

impl OpenChangeReason {
    /// Kebab-case name (`"outside-press"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutsidePress => "outside-press",
            Self::EscapeKey => "escape-key",
            Self::AncestorScroll => "ancestor-scroll",
            Self::ReferencePress => "reference-press",
            Self::Click => "click",
            Self::Hover => "hover",
            Self::Focus => "focus",
            Self::ListNavigation => "list-navigation",
            Self::SafePolygon => "safe-polygon",
        }
    }
}

impl fmt::Display for OpenChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host event types the controllers understand.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum EventKind {
    /// `pointerdown`
    PointerDown,
    /// `pointerenter`
    PointerEnter,
    /// `mousedown`
    MouseDown,
    /// `mouseup`
    MouseUp,
    /// `click`
    Click,
    /// `mouseenter`
    MouseEnter,
    /// `mousemove`
    MouseMove,
    /// `mouseleave`
    MouseLeave,
    /// `keydown`
    KeyDown,
    /// `keyup`
    KeyUp,
    /// `focus`
    Focus,
    /// `blur`
    Blur,
    /// `scroll`
    Scroll,
}

impl EventKind {
    /// DOM event type string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PointerDown => "pointerdown",
            Self::PointerEnter => "pointerenter",
            Self::MouseDown => "mousedown",
            Self::MouseUp => "mouseup",
            Self::Click => "click",
            Self::MouseEnter => "mouseenter",
            Self::MouseMove => "mousemove",
            Self::MouseLeave => "mouseleave",
            Self::KeyDown => "keydown",
            Self::KeyUp => "keyup",
            Self::Focus => "focus",
            Self::Blur => "blur",
            Self::Scroll => "scroll",
        }
    }

    /// Camel-case prop name of the bubble-phase handler (`"onPointerDown"`).
    pub const fn handler_name(self) -> &'static str {
        match self {
            Self::PointerDown => "onPointerDown",
            Self::PointerEnter => "onPointerEnter",
            Self::MouseDown => "onMouseDown",
            Self::MouseUp => "onMouseUp",
            Self::Click => "onClick",
            Self::MouseEnter => "onMouseEnter",
            Self::MouseMove => "onMouseMove",
            Self::MouseLeave => "onMouseLeave",
            Self::KeyDown => "onKeyDown",
            Self::KeyUp => "onKeyUp",
            Self::Focus => "onFocus",
            Self::Blur => "onBlur",
            Self::Scroll => "onScroll",
        }
    }

    /// Mouse-family event (its type string contains `mouse`).
    pub const fn is_mouse(self) -> bool {
        matches!(
            self,
            Self::MouseDown | Self::MouseUp | Self::MouseEnter | Self::MouseMove | Self::MouseLeave
        )
    }

    /// `click` or `mousedown`: an open caused by these is sticky for hover.
    pub const fn is_click_like(self) -> bool {
        matches!(self, Self::Click | Self::MouseDown)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys the controllers react to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Key {
    /// `Escape`
    Escape,
    /// `Enter`
    Enter,
    /// `" "`
    Space,
    /// Anything else.
    Other,
}

/// Pointer-specific fields of an event.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerInfo {
    /// Device kind.
    pub pointer_type: PointerType,
    /// Contact width in CSS pixels.
    pub width: f64,
    /// Contact height in CSS pixels.
    pub height: f64,
    /// Normalized pressure.
    pub pressure: f64,
}

impl PointerInfo {
    /// A regular pointer of the given kind (1×1 contact, half pressure).
    pub const fn new(pointer_type: PointerType) -> Self {
        Self {
            pointer_type,
            width: 1.0,
            height: 1.0,
            pressure: 0.5,
        }
    }
}

/// A host event delivered to a controller.
///
/// Hosts build one per native event. Controllers only read it, except for the
/// two propagation flags, which they may set through [`DomEvent::prevent_default`]
/// and [`DomEvent::stop_propagation`]; hosts read them back after dispatch.
#[derive(Clone, Debug)]
pub struct DomEvent<K> {
    /// Event type.
    pub kind: EventKind,
    /// `event.target`.
    pub target: Option<K>,
    /// `event.composedPath()`, innermost first, when the host supports it.
    pub composed_path: Option<Vec<K>>,
    /// `event.relatedTarget` for focus and mouse enter/leave events.
    pub related_target: Option<K>,
    /// Viewport coordinates.
    pub client: Point,
    /// Coordinates relative to the target's padding edge.
    pub offset: Point,
    /// Mouse button index (`0` is primary).
    pub button: i16,
    /// Key for keyboard events.
    pub key: Option<Key>,
    /// Pointer details for pointer events.
    pub pointer: Option<PointerInfo>,
    /// `UIEvent.detail` (click count).
    pub detail: i32,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl<K: Copy> DomEvent<K> {
    /// A bare event of the given kind.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            target: None,
            composed_path: None,
            related_target: None,
            client: Point::ZERO,
            offset: Point::ZERO,
            button: 0,
            key: None,
            pointer: None,
            detail: 0,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    /// Set `target`.
    pub fn with_target(mut self, target: K) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the composed path (innermost first).
    pub fn with_composed_path(mut self, path: Vec<K>) -> Self {
        self.composed_path = Some(path);
        self
    }

    /// Set `relatedTarget`.
    pub fn with_related_target(mut self, related: Option<K>) -> Self {
        self.related_target = related;
        self
    }

    /// Set viewport coordinates.
    pub fn with_client(mut self, client: Point) -> Self {
        self.client = client;
        self
    }

    /// Set target-relative coordinates.
    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    /// Set the mouse button.
    pub fn with_button(mut self, button: i16) -> Self {
        self.button = button;
        self
    }

    /// Set the key.
    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    /// Set a regular pointer of the given kind.
    pub fn with_pointer_type(self, pointer_type: PointerType) -> Self {
        self.with_pointer(PointerInfo::new(pointer_type))
    }

    /// Set full pointer details.
    pub fn with_pointer(mut self, pointer: PointerInfo) -> Self {
        self.pointer = Some(pointer);
        self
    }

    /// Set `detail`.
    pub fn with_detail(mut self, detail: i32) -> Self {
        self.detail = detail;
        self
    }

    /// The innermost target: first entry of the composed path, else `target`.
    pub fn target(&self) -> Option<K> {
        match &self.composed_path {
            Some(path) => path.first().copied(),
            None => self.target,
        }
    }

    /// Pointer type, if this is a pointer event.
    pub fn pointer_type(&self) -> Option<PointerType> {
        self.pointer.map(|p| p.pointer_type)
    }

    /// `event.preventDefault()`.
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    /// `event.defaultPrevented`.
    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// `event.stopPropagation()`.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    /// Whether a handler stopped propagation.
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

/// Handler outcome controlling propagation.
///
/// Returned (optionally) by chained prop handlers; the merged handler yields
/// the first `Some` in chain order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// Continue within the current phase.
    Continue,
    /// Stop propagation within the current phase.
    Stop,
    /// Stop and mark consumed (for higher-level policies).
    StopAndConsume,
}

/// Loosely typed value stored in context data and middleware data.
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(f64),
    /// String.
    Text(String),
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        Self::Text(String::from(value))
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

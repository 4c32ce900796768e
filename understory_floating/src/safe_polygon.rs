// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Safe polygon: keep a hover-opened element open while the pointer heads
//! towards it.
//!
//! When the pointer leaves the reference, a triangle is spanned from the leave
//! point to the near edge of the floating element. Moving inside that triangle
//! (or inside the rectangular trough between the two elements) keeps the
//! element open; anything else closes it. Once the pointer has landed on the
//! floating element, leaving it closes unless the pointer is back over the
//! reference.

use kurbo::{BezPath, Point, Rect, Shape};

use crate::dom::contains;
use crate::hover::{CloseEnv, HandleClose};
use crate::types::{DomEvent, EventKind, Side};

/// Triangle-based [`HandleClose`] strategy.
#[derive(Clone, Debug)]
pub struct SafePolygon {
    /// Extra slack around the leave point, in CSS pixels.
    pub buffer: f64,
    /// Make everything other than the reference and floating element ignore
    /// the pointer while the element is hover-open.
    pub block_pointer_events: bool,
    has_landed: bool,
}

impl Default for SafePolygon {
    fn default() -> Self {
        Self {
            buffer: 0.5,
            block_pointer_events: false,
            has_landed: false,
        }
    }
}

impl SafePolygon {
    /// Default buffer, pointer events not blocked.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: slack around the leave point.
    pub fn with_buffer(mut self, buffer: f64) -> Self {
        self.buffer = buffer;
        self
    }

    /// Builder: block pointer events outside the two elements.
    pub fn with_block_pointer_events(mut self, block: bool) -> Self {
        self.block_pointer_events = block;
        self
    }

    /// Whether the pointer reached the floating element in this session.
    pub fn has_landed(&self) -> bool {
        self.has_landed
    }
}

/// `rect` contains `p`, edges included.
fn is_inside(p: Point, rect: Rect) -> bool {
    p.x >= rect.x0 && p.x <= rect.x1 && p.y >= rect.y0 && p.y <= rect.y1
}

fn is_point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    let mut path = BezPath::new();
    let mut points = polygon.iter();
    let Some(first) = points.next() else {
        return false;
    };
    path.move_to(*first);
    for pt in points {
        path.line_to(*pt);
    }
    path.close_path();
    path.contains(p)
}

impl<K: Copy + Eq> HandleClose<K> for SafePolygon {
    fn blocks_pointer_events(&self) -> bool {
        self.block_pointer_events
    }

    fn start(&mut self) {
        self.has_landed = false;
    }

    fn evaluate(&mut self, env: &CloseEnv<'_, K>, event: &DomEvent<K>) -> bool {
        let (Some(reference), Some(floating)) = (env.elements.reference, env.elements.floating)
        else {
            return false;
        };
        let (Some(ref_rect), Some(rect)) = (
            env.dom.bounding_rect(&reference),
            env.dom.bounding_rect(&floating),
        ) else {
            return false;
        };

        let client = event.client;
        let Point { x, y } = env.origin;
        let target = event.target();
        let is_leave = event.kind == EventKind::MouseLeave;
        let over_floating = contains(env.dom, Some(floating), target);
        let over_reference = contains(env.dom, Some(reference), target);

        if over_floating {
            self.has_landed = true;
            if !is_leave {
                return false;
            }
        }
        if over_reference {
            self.has_landed = false;
            if !is_leave {
                self.has_landed = true;
                return false;
            }
        }

        // Overlapping elements would otherwise loop open/close.
        if is_leave
            && event
                .related_target
                .is_some_and(|r| env.dom.is_element(&r) && contains(env.dom, Some(floating), Some(r)))
        {
            return false;
        }

        let side = env.placement.side();

        // Leaving through the far side of the reference; 1px absorbs rounding.
        let opposite = match side {
            Side::Top => y >= ref_rect.y1 - 1.0,
            Side::Bottom => y <= ref_rect.y0 + 1.0,
            Side::Left => x >= ref_rect.x1 - 1.0,
            Side::Right => x <= ref_rect.x0 + 1.0,
        };
        if opposite {
            return true;
        }

        let floating_wider = rect.width() > ref_rect.width();
        let floating_taller = rect.height() > ref_rect.height();
        let narrow = if floating_wider { ref_rect } else { rect };
        let short = if floating_taller { ref_rect } else { rect };
        let (left, right) = (narrow.x0, narrow.x1);
        let (top, bottom) = (short.y0, short.y1);

        let trough = match side {
            Side::Top => [
                Point::new(left, ref_rect.y0 + 1.0),
                Point::new(left, rect.y1 - 1.0),
                Point::new(right, rect.y1 - 1.0),
                Point::new(right, ref_rect.y0 + 1.0),
            ],
            Side::Bottom => [
                Point::new(left, rect.y0 + 1.0),
                Point::new(left, ref_rect.y1 - 1.0),
                Point::new(right, ref_rect.y1 - 1.0),
                Point::new(right, rect.y0 + 1.0),
            ],
            Side::Left => [
                Point::new(rect.x1 - 1.0, bottom),
                Point::new(rect.x1 - 1.0, top),
                Point::new(ref_rect.x0 + 1.0, top),
                Point::new(ref_rect.x0 + 1.0, bottom),
            ],
            Side::Right => [
                Point::new(ref_rect.x1 - 1.0, bottom),
                Point::new(ref_rect.x1 - 1.0, top),
                Point::new(rect.x0 + 1.0, top),
                Point::new(rect.x0 + 1.0, bottom),
            ],
        };
        if is_point_in_polygon(client, &trough) {
            return false;
        }

        if self.has_landed && !is_inside(client, ref_rect) {
            return true;
        }

        !is_point_in_polygon(client, &self.triangle(side, env.origin, ref_rect, rect))
    }
}

impl SafePolygon {
    /// The polygon from the leave point to the floating element's near edge.
    fn triangle(&self, side: Side, origin: Point, ref_rect: Rect, rect: Rect) -> [Point; 4] {
        let b = self.buffer;
        let Point { x, y } = origin;
        let floating_wider = rect.width() > ref_rect.width();
        let floating_taller = rect.height() > ref_rect.height();
        let from_right = x > rect.x1 - rect.width() / 2.0;
        let from_bottom = y > rect.y1 - rect.height() / 2.0;

        let spread = |c: f64, wider: bool, from_far: bool, sign: f64| {
            if wider {
                c + sign * b / 2.0
            } else if from_far {
                c + b * 4.0
            } else {
                c - b * 4.0
            }
        };

        match side {
            Side::Top => {
                let cy = y + b + 1.0;
                [
                    Point::new(spread(x, floating_wider, from_right, 1.0), cy),
                    Point::new(spread(x, floating_wider, from_right, -1.0), cy),
                    Point::new(
                        rect.x0,
                        if from_right || floating_wider {
                            rect.y1 - b
                        } else {
                            rect.y0
                        },
                    ),
                    Point::new(
                        rect.x1,
                        if from_right {
                            if floating_wider { rect.y1 - b } else { rect.y0 }
                        } else {
                            rect.y1 - b
                        },
                    ),
                ]
            }
            Side::Bottom => {
                let cy = y - b;
                [
                    Point::new(spread(x, floating_wider, from_right, 1.0), cy),
                    Point::new(spread(x, floating_wider, from_right, -1.0), cy),
                    Point::new(
                        rect.x0,
                        if from_right || floating_wider {
                            rect.y0 + b
                        } else {
                            rect.y1
                        },
                    ),
                    Point::new(
                        rect.x1,
                        if from_right {
                            if floating_wider { rect.y0 + b } else { rect.y1 }
                        } else {
                            rect.y0 + b
                        },
                    ),
                ]
            }
            Side::Left => {
                let cx = x + b + 1.0;
                [
                    Point::new(
                        if from_bottom || floating_taller {
                            rect.x1 - b
                        } else {
                            rect.x0
                        },
                        rect.y0,
                    ),
                    Point::new(
                        if from_bottom {
                            if floating_taller { rect.x1 - b } else { rect.x0 }
                        } else {
                            rect.x1 - b
                        },
                        rect.y1,
                    ),
                    Point::new(cx, spread(y, floating_taller, from_bottom, 1.0)),
                    Point::new(cx, spread(y, floating_taller, from_bottom, -1.0)),
                ]
            }
            Side::Right => {
                let cx = x - b;
                [
                    Point::new(cx, spread(y, floating_taller, from_bottom, 1.0)),
                    Point::new(cx, spread(y, floating_taller, from_bottom, -1.0)),
                    Point::new(
                        if from_bottom || floating_taller {
                            rect.x0 + b
                        } else {
                            rect.x1
                        },
                        rect.y0,
                    ),
                    Point::new(
                        if from_bottom {
                            if floating_taller { rect.x0 + b } else { rect.x1 }
                        } else {
                            rect.x0 + b
                        },
                        rect.y1,
                    ),
                ]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryDom, NodeId};
    use crate::context::Elements;
    use crate::types::Placement;

    /// Reference 100x20 at (100, 100); floating 200x100 below it, 10px gap.
    fn layout() -> (MemoryDom, NodeId, NodeId, NodeId) {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        let reference = dom.create_element(body, "button");
        let floating = dom.create_element(body, "div");
        let outside = dom.create_element(body, "main");
        dom.set_bounds(reference, Rect::new(100.0, 100.0, 200.0, 120.0));
        dom.set_bounds(floating, Rect::new(50.0, 130.0, 250.0, 230.0));
        (dom, reference, floating, outside)
    }

    fn env(dom: &MemoryDom, reference: NodeId, floating: NodeId, origin: Point) -> CloseEnv<'_, NodeId> {
        CloseEnv {
            dom,
            elements: Elements {
                reference: Some(reference),
                floating: Some(floating),
            },
            placement: Placement::Bottom,
            origin,
        }
    }

    fn mv(target: NodeId, x: f64, y: f64) -> DomEvent<NodeId> {
        DomEvent::new(EventKind::MouseMove)
            .with_target(target)
            .with_client(Point::new(x, y))
    }

    #[test]
    fn heading_towards_floating_keeps_open() {
        let (dom, reference, floating, outside) = layout();
        let env = env(&dom, reference, floating, Point::new(150.0, 120.0));
        let mut sp = SafePolygon::new();
        HandleClose::<NodeId>::start(&mut sp);
        // Inside the trough below the reference.
        assert!(!sp.evaluate(&env, &mv(outside, 150.0, 125.0)));
        // Left of the trough, inside the triangle towards the floating edge.
        assert!(!sp.evaluate(&env, &mv(outside, 90.0, 127.0)));
        // Left of the trough and too far out.
        assert!(sp.evaluate(&env, &mv(outside, 60.0, 121.0)));
    }

    #[test]
    fn moving_away_closes() {
        let (dom, reference, floating, outside) = layout();
        let env = env(&dom, reference, floating, Point::new(150.0, 120.0));
        let mut sp = SafePolygon::new();
        assert!(sp.evaluate(&env, &mv(outside, 400.0, 110.0)));
    }

    #[test]
    fn leaving_through_the_far_side_closes() {
        let (dom, reference, floating, outside) = layout();
        let env = env(&dom, reference, floating, Point::new(150.0, 100.0));
        let mut sp = SafePolygon::new();
        assert!(sp.evaluate(&env, &mv(outside, 150.0, 95.0)));
    }

    #[test]
    fn landing_then_leaving_closes() {
        let (dom, reference, floating, outside) = layout();
        let env = env(&dom, reference, floating, Point::new(150.0, 120.0));
        let mut sp = SafePolygon::new();
        assert!(!sp.evaluate(&env, &mv(floating, 150.0, 150.0)));
        assert!(sp.has_landed());
        // Back in the trough is still fine.
        assert!(!sp.evaluate(&env, &mv(outside, 150.0, 125.0)));
        // Elsewhere is not.
        assert!(sp.evaluate(&env, &mv(outside, 20.0, 160.0)));
    }

    #[test]
    fn leave_into_overlapping_floating_is_ignored() {
        let (dom, reference, floating, _) = layout();
        let env = env(&dom, reference, floating, Point::new(150.0, 120.0));
        let mut sp = SafePolygon::new();
        let leave = DomEvent::new(EventKind::MouseLeave)
            .with_target(reference)
            .with_related_target(Some(floating))
            .with_client(Point::new(400.0, 400.0));
        assert!(!sp.evaluate(&env, &leave));
    }

    #[test]
    fn missing_geometry_never_closes() {
        let mut dom = MemoryDom::new();
        let reference = dom.create_element(dom.body(), "button");
        let floating = dom.create_element(dom.body(), "div");
        let env = env(&dom, reference, floating, Point::ZERO);
        let mut sp = SafePolygon::new();
        assert!(!sp.evaluate(&env, &mv(reference, 999.0, 999.0)));
    }

    #[test]
    fn polygon_containment() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(is_point_in_polygon(Point::new(5.0, 5.0), &square));
        assert!(!is_point_in_polygon(Point::new(15.0, 5.0), &square));
        assert!(!is_point_in_polygon(Point::new(5.0, 5.0), &[]));
        assert!(is_inside(Point::new(10.0, 10.0), Rect::new(0.0, 0.0, 10.0, 10.0)));
    }
}

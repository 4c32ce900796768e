// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Positioning orchestration: when to ask the positioner, and where its
//! answer goes.
//!
//! ## Overview
//!
//! [`Floating`] owns a [`FloatingContext`] plus the options sent to an
//! external [`Positioner`]. It does no geometry. It decides when a
//! computation is needed and writes the result back into the context.
//!
//! - [`Floating::update`] computes and applies in one step.
//! - [`Floating::request`] and [`Floating::apply`] split that step so a host
//!   can run computations on its own executor. Overlapping computations are
//!   not serialized: whichever result is applied last wins.
//! - [`Floating::sync`] reacts to mounted elements and option changes,
//!   starting an [`AutoUpdate`] tracker or requesting a single update.
//!
//! ## Minimal example
//!
//! ```
//! use understory_floating::position::{
//!     ComputedPosition, Floating, PositionConfig, Positioner,
//! };
//!
//! struct Below;
//!
//! impl Positioner<u32> for Below {
//!     type Error = core::convert::Infallible;
//!
//!     async fn compute(
//!         &self,
//!         _reference: u32,
//!         _floating: u32,
//!         config: &PositionConfig,
//!     ) -> Result<ComputedPosition, Self::Error> {
//!         Ok(ComputedPosition::new(10.0, 24.0, config.placement, config.strategy))
//!     }
//! }
//!
//! let mut floating: Floating<u32, Below> = Floating::new(Below);
//! floating.context_mut().set_reference(Some(1));
//! floating.context_mut().set_floating(Some(2));
//! pollster::block_on(floating.refresh()).unwrap();
//! assert_eq!((floating.context().x(), floating.context().y()), (10.0, 24.0));
//! assert!(floating.context().is_positioned());
//! ```

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;
use core::future::Future;

use kurbo::Point;

use crate::context::{FloatingContext, MiddlewareData, PositionState};
use crate::dom::Dom;
use crate::types::{DataValue, Placement, Strategy};

/// A named positioning transform (offset, flip, shift, arrow, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct Middleware {
    /// Middleware name understood by the positioner.
    pub name: String,
    /// Opaque options.
    pub options: BTreeMap<String, DataValue>,
}

impl Middleware {
    /// A middleware with no options.
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            options: BTreeMap::new(),
        }
    }

    /// Builder: add an option.
    pub fn with_option(mut self, key: &str, value: impl Into<DataValue>) -> Self {
        self.options.insert(String::from(key), value.into());
        self
    }
}

/// What the positioner is asked to compute.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionConfig {
    /// Requested placement.
    pub placement: Placement,
    /// Requested strategy.
    pub strategy: Strategy,
    /// Enabled middleware, in order.
    pub middleware: Vec<Middleware>,
}

/// What the positioner returns.
#[derive(Clone, Debug, PartialEq)]
pub struct ComputedPosition {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
    /// Final placement.
    pub placement: Placement,
    /// Final strategy.
    pub strategy: Strategy,
    /// Per-middleware output.
    pub middleware_data: MiddlewareData,
}

impl ComputedPosition {
    /// A result without middleware data.
    pub fn new(x: f64, y: f64, placement: Placement, strategy: Strategy) -> Self {
        Self {
            x,
            y,
            placement,
            strategy,
            middleware_data: MiddlewareData::new(),
        }
    }
}

/// External geometry engine.
pub trait Positioner<K> {
    /// Failure type; surfaced unchanged by [`Floating::update`].
    type Error;

    /// Compute coordinates for `floating` relative to `reference`.
    fn compute(
        &self,
        reference: K,
        floating: K,
        config: &PositionConfig,
    ) -> impl Future<Output = Result<ComputedPosition, Self::Error>>;
}

/// Shared flag a tracker raises to ask for a recomputation.
#[derive(Clone, Debug, Default)]
pub struct UpdateHandle(Rc<Cell<bool>>);

impl UpdateHandle {
    /// A lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for an update.
    pub fn request(&self) {
        self.0.set(true);
    }

    /// Whether an update is pending.
    pub fn is_requested(&self) -> bool {
        self.0.get()
    }

    /// Lower the flag, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

/// Cleanup returned by a tracker. Runs once, when dropped.
pub struct Teardown(Option<Box<dyn FnOnce()>>);

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Teardown").field(&self.0.is_some()).finish()
    }
}

impl Teardown {
    /// Wrap a cleanup closure.
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A teardown that does nothing.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Run the cleanup now.
    pub fn run(self) {
        drop(self);
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Keeps a mounted pair positioned (resize, scroll, layout shifts).
pub trait AutoUpdate<K> {
    /// Start tracking; raise `update` whenever the position may be stale.
    fn track(&mut self, reference: K, floating: K, update: UpdateHandle) -> Teardown;
}

impl<K, F: FnMut(K, K, UpdateHandle) -> Teardown> AutoUpdate<K> for F {
    fn track(&mut self, reference: K, floating: K, update: UpdateHandle) -> Teardown {
        self(reference, floating, update)
    }
}

/// Positioning options.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatingOptions {
    /// Requested placement.
    pub placement: Placement,
    /// CSS position strategy.
    pub strategy: Strategy,
    /// Middleware; `None` entries are disabled.
    pub middleware: Vec<Option<Middleware>>,
    /// Position with `transform` instead of `left`/`top`.
    pub transform: bool,
}

impl Default for FloatingOptions {
    fn default() -> Self {
        Self {
            placement: Placement::default(),
            strategy: Strategy::default(),
            middleware: Vec::new(),
            transform: true,
        }
    }
}

impl FloatingOptions {
    /// Config sent to the positioner.
    pub fn config(&self) -> PositionConfig {
        PositionConfig {
            placement: self.placement,
            strategy: self.strategy,
            middleware: self.middleware.iter().flatten().cloned().collect(),
        }
    }
}

/// A computation to run: the mounted pair and the config snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionRequest<K> {
    /// Reference element.
    pub reference: K,
    /// Floating element.
    pub floating: K,
    /// Config at request time.
    pub config: PositionConfig,
}

struct Mounted<K> {
    reference: K,
    floating: K,
    options: FloatingOptions,
    _teardown: Teardown,
}

/// Inline styles for the floating element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FloatingStyles {
    entries: Vec<(&'static str, String)>,
}

impl FloatingStyles {
    fn push(&mut self, key: &'static str, value: String) {
        self.entries.push((key, value));
    }

    /// Value of a property.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Properties in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl fmt::Display for FloatingStyles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}: {value};")?;
        }
        Ok(())
    }
}

/// Round to the device pixel grid (`round(v * dpr) / dpr`, halves up).
pub fn round_by_dpr(point: Point, dpr: f64) -> Point {
    let snapped = Point::new(point.x * dpr + 0.5, point.y * dpr + 0.5).floor();
    Point::new(snapped.x / dpr, snapped.y / dpr)
}

/// Positioning orchestrator for one floating element.
pub struct Floating<K, P> {
    context: FloatingContext<K>,
    options: FloatingOptions,
    positioner: P,
    auto_update: Option<Box<dyn AutoUpdate<K>>>,
    mounted: Option<Mounted<K>>,
    handle: UpdateHandle,
    was_open: bool,
}

impl<K: fmt::Debug, P: fmt::Debug> fmt::Debug for Floating<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Floating")
            .field("context", &self.context)
            .field("options", &self.options)
            .field("positioner", &self.positioner)
            .field("auto_update", &self.auto_update.is_some())
            .field("mounted", &self.mounted.is_some())
            .field("handle", &self.handle)
            .field("was_open", &self.was_open)
            .finish()
    }
}

impl<K: Copy + Eq + fmt::Debug, P: Positioner<K>> Floating<K, P> {
    /// An orchestrator with default options and a fresh context.
    pub fn new(positioner: P) -> Self {
        Self {
            context: FloatingContext::new(),
            options: FloatingOptions::default(),
            positioner,
            auto_update: None,
            mounted: None,
            handle: UpdateHandle::new(),
            was_open: false,
        }
    }

    /// Builder: options.
    pub fn with_options(mut self, options: FloatingOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder: tracker run while both elements are mounted.
    pub fn with_auto_update(mut self, tracker: impl AutoUpdate<K> + 'static) -> Self {
        self.auto_update = Some(Box::new(tracker));
        self
    }

    /// Builder: replace the context.
    pub fn with_context(mut self, context: FloatingContext<K>) -> Self {
        self.context = context;
        self
    }

    /// Shared state.
    pub fn context(&self) -> &FloatingContext<K> {
        &self.context
    }

    /// Shared state, mutably (elements, open state, controllers).
    pub fn context_mut(&mut self) -> &mut FloatingContext<K> {
        &mut self.context
    }

    /// Current options.
    pub fn options(&self) -> &FloatingOptions {
        &self.options
    }

    /// Replace the options. Takes effect on the next [`sync`](Self::sync).
    pub fn set_options(&mut self, options: FloatingOptions) {
        self.options = options;
    }

    /// The positioner.
    pub fn positioner(&self) -> &P {
        &self.positioner
    }

    /// Handle trackers use to request updates.
    pub fn update_handle(&self) -> UpdateHandle {
        self.handle.clone()
    }

    /// Snapshot a computation, when both elements are mounted.
    pub fn request(&self) -> Option<PositionRequest<K>> {
        let (reference, floating) = self.context.elements().pair()?;
        Some(PositionRequest {
            reference,
            floating,
            config: self.options.config(),
        })
    }

    /// Write a computed position into the context.
    ///
    /// `is_positioned` becomes true only while open.
    pub fn apply(&mut self, position: ComputedPosition) {
        tracing::debug!(
            x = position.x,
            y = position.y,
            placement = position.placement.as_str(),
            "position applied"
        );
        self.context.apply_position(PositionState {
            x: position.x,
            y: position.y,
            placement: position.placement,
            strategy: position.strategy,
            middleware_data: position.middleware_data,
            is_positioned: true,
        });
    }

    /// Compute and apply. A no-op unless both elements are mounted.
    ///
    /// Positioner errors are returned unchanged and leave the last
    /// position in place.
    pub async fn update(&mut self) -> Result<(), P::Error> {
        let Some(req) = self.request() else {
            return Ok(());
        };
        let position = self
            .positioner
            .compute(req.reference, req.floating, &req.config)
            .await?;
        self.apply(position);
        Ok(())
    }

    /// React to element and option changes.
    ///
    /// When the mounted pair or the options differ from the last sync, the
    /// previous tracker is torn down. With both elements mounted, the
    /// tracker is started, or a single update is requested when there is
    /// none. Reopening while mounted also requests an update, since closing
    /// cleared `is_positioned`.
    pub fn sync(&mut self) {
        let open = self.context.open();
        let reopened = open && !self.was_open;
        self.was_open = open;
        let pair = self.context.elements().pair();
        let unchanged = match (&self.mounted, pair) {
            (Some(m), Some((r, f))) => {
                m.reference == r && m.floating == f && m.options == self.options
            }
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            if reopened && self.mounted.is_some() {
                self.handle.request();
            }
            return;
        }
        // Drop first so the old tracker is gone before a new one starts.
        self.mounted = None;
        let Some((reference, floating)) = pair else {
            return;
        };
        let teardown = match self.auto_update.as_mut() {
            Some(tracker) => tracker.track(reference, floating, self.handle.clone()),
            None => {
                self.handle.request();
                Teardown::noop()
            }
        };
        self.mounted = Some(Mounted {
            reference,
            floating,
            options: self.options.clone(),
            _teardown: teardown,
        });
    }

    /// Take a pending update request.
    pub fn take_update_request(&mut self) -> bool {
        self.handle.take()
    }

    /// [`sync`](Self::sync), then [`update`](Self::update) if one was requested.
    pub async fn refresh(&mut self) -> Result<(), P::Error> {
        self.sync();
        if self.handle.take() {
            self.update().await
        } else {
            Ok(())
        }
    }

    /// Stop tracking. Also happens on drop.
    pub fn teardown(&mut self) {
        self.mounted = None;
    }

    /// Inline styles for the floating element.
    pub fn floating_styles(&self, dom: &(impl Dom<K> + ?Sized)) -> FloatingStyles {
        let strategy = self.options.strategy.as_str();
        let mut styles = FloatingStyles::default();
        let Some(floating) = self.context.elements().floating else {
            styles.push("position", String::from(strategy));
            styles.push("left", String::from("0px"));
            styles.push("top", String::from("0px"));
            return styles;
        };
        let dpr = dom.device_pixel_ratio(&floating);
        let p = round_by_dpr(Point::new(self.context.x(), self.context.y()), dpr);
        styles.push("position", String::from(strategy));
        if self.options.transform {
            styles.push("left", String::from("0px"));
            styles.push("top", String::from("0px"));
            styles.push("transform", format!("translate({}px, {}px)", p.x, p.y));
            if dpr >= 1.5 {
                styles.push("will-change", String::from("transform"));
            }
        } else {
            styles.push("left", format!("{}px", p.x));
            styles.push("top", format!("{}px", p.y));
        }
        styles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryDom, NodeId};
    use crate::types::OpenChangeReason;
    use alloc::string::ToString;
    use alloc::vec;
    use core::cell::RefCell;

    /// Returns queued answers in order, then repeats the last.
    #[derive(Debug, Default)]
    struct Scripted {
        answers: RefCell<Vec<Result<(f64, f64), &'static str>>>,
        calls: Cell<u32>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<(f64, f64), &'static str>>) -> Self {
            Self {
                answers: RefCell::new(answers),
                calls: Cell::new(0),
            }
        }
    }

    impl Positioner<NodeId> for Scripted {
        type Error = &'static str;

        async fn compute(
            &self,
            _reference: NodeId,
            _floating: NodeId,
            config: &PositionConfig,
        ) -> Result<ComputedPosition, Self::Error> {
            self.calls.set(self.calls.get() + 1);
            let mut answers = self.answers.borrow_mut();
            let next = if answers.len() > 1 {
                answers.remove(0)
            } else {
                answers[0]
            };
            let (x, y) = next?;
            let mut pos = ComputedPosition::new(x, y, config.placement, config.strategy);
            pos.middleware_data
                .insert(String::from("count"), DataValue::Number(config.middleware.len() as f64));
            Ok(pos)
        }
    }

    fn mounted(answers: Vec<Result<(f64, f64), &'static str>>) -> (MemoryDom, Floating<NodeId, Scripted>) {
        let mut dom = MemoryDom::new();
        let reference = dom.create_element(dom.body(), "button");
        let floating_el = dom.create_element(dom.body(), "div");
        let mut floating = Floating::new(Scripted::new(answers));
        floating.context_mut().set_reference(Some(reference));
        floating.context_mut().set_floating(Some(floating_el));
        (dom, floating)
    }

    #[test]
    fn update_without_both_elements_is_a_noop() {
        let mut dom = MemoryDom::new();
        let reference = dom.create_element(dom.body(), "button");
        let mut floating = Floating::new(Scripted::new(vec![Ok((1.0, 1.0))]));
        floating.context_mut().set_reference(Some(reference));
        pollster::block_on(floating.update()).unwrap();
        assert_eq!(floating.positioner().calls.get(), 0);
        assert!(!floating.context().is_positioned());
    }

    #[test]
    fn update_is_idempotent_for_deterministic_positioners() {
        let (_, mut floating) = mounted(vec![Ok((3.0, 4.0))]);
        pollster::block_on(floating.update()).unwrap();
        let first = floating.context().position().clone();
        pollster::block_on(floating.update()).unwrap();
        assert_eq!(floating.context().position(), &first);
        assert_eq!(floating.positioner().calls.get(), 2);
    }

    #[test]
    fn positioner_error_keeps_last_position() {
        let (_, mut floating) = mounted(vec![Ok((5.0, 6.0)), Err("detached")]);
        pollster::block_on(floating.update()).unwrap();
        assert_eq!(pollster::block_on(floating.update()), Err("detached"));
        assert_eq!((floating.context().x(), floating.context().y()), (5.0, 6.0));
        assert!(floating.context().is_positioned());
    }

    #[test]
    fn last_applied_result_wins() {
        let (_, mut floating) = mounted(vec![Ok((0.0, 0.0))]);
        let early = floating.request().unwrap();
        let late = floating.request().unwrap();
        assert_eq!(early, late);
        floating.apply(ComputedPosition::new(20.0, 0.0, Placement::Top, Strategy::Fixed));
        floating.apply(ComputedPosition::new(10.0, 0.0, Placement::Bottom, Strategy::Absolute));
        assert_eq!(floating.context().x(), 10.0);
        assert_eq!(floating.context().placement(), Placement::Bottom);
    }

    #[test]
    fn disabled_middleware_is_dropped_from_config() {
        let (_, mut floating) = mounted(vec![Ok((0.0, 0.0))]);
        floating.set_options(FloatingOptions {
            middleware: vec![
                Some(Middleware::new("offset").with_option("mainAxis", 8.0)),
                None,
                Some(Middleware::new("flip")),
            ],
            ..FloatingOptions::default()
        });
        let req = floating.request().unwrap();
        assert_eq!(req.config.middleware.len(), 2);
        assert_eq!(req.config.middleware[1].name, "flip");
        pollster::block_on(floating.update()).unwrap();
        assert_eq!(
            floating.context().middleware_data().get("count"),
            Some(&DataValue::Number(2.0))
        );
    }

    #[test]
    fn closing_resets_positioned() {
        let (_, mut floating) = mounted(vec![Ok((1.0, 2.0))]);
        pollster::block_on(floating.refresh()).unwrap();
        assert!(floating.context().is_positioned());
        floating
            .context_mut()
            .on_open_change(false, None, Some(OpenChangeReason::EscapeKey));
        assert!(!floating.context().is_positioned());
        pollster::block_on(floating.update()).unwrap();
        assert!(!floating.context().is_positioned());
    }

    #[test]
    fn reopening_recomputes_position() {
        let (_, mut floating) = mounted(vec![Ok((1.0, 2.0)), Ok((5.0, 6.0))]);
        pollster::block_on(floating.refresh()).unwrap();
        assert_eq!(floating.positioner().calls.get(), 1);

        floating
            .context_mut()
            .on_open_change(false, None, Some(OpenChangeReason::OutsidePress));
        pollster::block_on(floating.refresh()).unwrap();
        assert_eq!(floating.positioner().calls.get(), 1);

        floating
            .context_mut()
            .on_open_change(true, None, Some(OpenChangeReason::Click));
        pollster::block_on(floating.refresh()).unwrap();
        assert_eq!(floating.positioner().calls.get(), 2);
        assert!(floating.context().is_positioned());
        assert_eq!((floating.context().x(), floating.context().y()), (5.0, 6.0));

        // Staying open does not recompute again.
        pollster::block_on(floating.refresh()).unwrap();
        assert_eq!(floating.positioner().calls.get(), 2);
    }

    #[test]
    fn sync_without_tracker_requests_one_update() {
        let (_, mut floating) = mounted(vec![Ok((1.0, 2.0))]);
        floating.sync();
        assert!(floating.take_update_request());
        floating.sync();
        assert!(!floating.take_update_request());
        floating.set_options(FloatingOptions {
            placement: Placement::Left,
            ..FloatingOptions::default()
        });
        floating.sync();
        assert!(floating.take_update_request());
    }

    #[test]
    fn tracker_is_torn_down_on_element_change_and_drop() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut dom = MemoryDom::new();
        let a = dom.create_element(dom.body(), "button");
        let b = dom.create_element(dom.body(), "button");
        let pop = dom.create_element(dom.body(), "div");

        let l = log.clone();
        let mut floating = Floating::new(Scripted::new(vec![Ok((0.0, 0.0))])).with_auto_update(
            move |reference: NodeId, _floating: NodeId, update: UpdateHandle| {
                l.borrow_mut().push(("track", reference));
                update.request();
                let l = l.clone();
                Teardown::new(move || l.borrow_mut().push(("teardown", reference)))
            },
        );
        floating.context_mut().set_reference(Some(a));
        floating.context_mut().set_floating(Some(pop));
        pollster::block_on(floating.refresh()).unwrap();
        assert!(floating.context().is_positioned());

        floating.context_mut().set_reference(Some(b));
        floating.sync();
        floating.context_mut().set_floating(None);
        floating.sync();
        assert_eq!(
            *log.borrow(),
            [("track", a), ("teardown", a), ("track", b), ("teardown", b)]
        );

        floating.context_mut().set_floating(Some(pop));
        floating.sync();
        drop(floating);
        assert_eq!(log.borrow().last(), Some(&("teardown", b)));
        assert_eq!(log.borrow().len(), 6);
    }

    #[test]
    fn styles_without_floating_element() {
        let dom = MemoryDom::new();
        let floating = Floating::new(Scripted::new(vec![Ok((0.0, 0.0))]));
        assert_eq!(
            floating.floating_styles(&dom).to_string(),
            "position: absolute; left: 0px; top: 0px;"
        );
    }

    #[test]
    fn styles_round_to_device_pixels() {
        let (mut dom, mut floating) = mounted(vec![Ok((10.3, 4.7))]);
        pollster::block_on(floating.update()).unwrap();

        let styles = floating.floating_styles(&dom);
        assert_eq!(styles.get("transform"), Some("translate(10px, 5px)"));
        assert_eq!(styles.get("will-change"), None);

        dom.set_device_pixel_ratio(2.0);
        let styles = floating.floating_styles(&dom);
        assert_eq!(styles.get("transform"), Some("translate(10.5px, 4.5px)"));
        assert_eq!(styles.get("will-change"), Some("transform"));

        floating.set_options(FloatingOptions {
            transform: false,
            strategy: Strategy::Fixed,
            ..FloatingOptions::default()
        });
        assert_eq!(
            floating.floating_styles(&dom).to_string(),
            "position: fixed; left: 10.5px; top: 4.5px;"
        );
    }
}

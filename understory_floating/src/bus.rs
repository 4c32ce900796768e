// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event bus: synchronous, topic-based pub/sub.
//!
//! ## Delivery
//!
//! [`EventBus::emit`] calls every handler subscribed to the topic, in
//! subscription order, before it returns. There is no queue and no deferred
//! delivery, so a controller reacting to [`OPEN_CHANGE`] observes the context
//! exactly as the emitter left it.
//!
//! ## Minimal example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use understory_floating::bus::EventBus;
//!
//! let seen = Rc::new(Cell::new(0));
//! let mut bus: EventBus<u32> = EventBus::new();
//! let s = seen.clone();
//! let sub = bus.on("tick", move |n: &u32| s.set(s.get() + *n));
//! assert_eq!(bus.emit("tick", &2), 1);
//! bus.off(sub);
//! assert_eq!(bus.emit("tick", &2), 0);
//! assert_eq!(seen.get(), 2);
//! ```

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// Topic emitted by [`FloatingContext::on_open_change`](crate::context::FloatingContext::on_open_change).
pub const OPEN_CHANGE: &str = "openchange";

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Subscription(u64);

type Handler<E> = Box<dyn FnMut(&E)>;

/// In-process topic bus carrying payloads of type `E`.
pub struct EventBus<E> {
    topics: BTreeMap<String, Vec<(Subscription, Handler<E>)>>,
    next: u64,
}

impl<E> core::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut m = f.debug_map();
        for (topic, handlers) in &self.topics {
            m.entry(topic, &handlers.len());
        }
        m.finish()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventBus<E> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            topics: BTreeMap::new(),
            next: 0,
        }
    }

    /// Subscribe `handler` to `topic`.
    pub fn on(&mut self, topic: &str, handler: impl FnMut(&E) + 'static) -> Subscription {
        self.next += 1;
        let sub = Subscription(self.next);
        self.topics
            .entry(String::from(topic))
            .or_default()
            .push((sub, Box::new(handler)));
        sub
    }

    /// Remove a subscription. Returns whether it was present.
    pub fn off(&mut self, sub: Subscription) -> bool {
        let mut removed = false;
        for handlers in self.topics.values_mut() {
            let before = handlers.len();
            handlers.retain(|(s, _)| *s != sub);
            removed |= handlers.len() != before;
        }
        self.topics.retain(|_, handlers| !handlers.is_empty());
        removed
    }

    /// Deliver `payload` to every handler of `topic`, returning how many ran.
    pub fn emit(&mut self, topic: &str, payload: &E) -> usize {
        let Some(handlers) = self.topics.get_mut(topic) else {
            return 0;
        };
        for (_, handler) in handlers.iter_mut() {
            handler(payload);
        }
        handlers.len()
    }

    /// Number of handlers subscribed to `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    #[test]
    fn delivers_in_subscription_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus: EventBus<u8> = EventBus::new();
        for tag in ['a', 'b', 'c'] {
            let log = log.clone();
            bus.on(OPEN_CHANGE, move |n: &u8| log.borrow_mut().push((tag, *n)));
        }
        assert_eq!(bus.emit(OPEN_CHANGE, &1), 3);
        assert_eq!(*log.borrow(), vec![('a', 1), ('b', 1), ('c', 1)]);
    }

    #[test]
    fn topics_are_isolated() {
        let hits = Rc::new(RefCell::new(0));
        let mut bus: EventBus<()> = EventBus::new();
        let h = hits.clone();
        bus.on("dismiss", move |_| *h.borrow_mut() += 1);
        assert_eq!(bus.emit(OPEN_CHANGE, &()), 0);
        assert_eq!(bus.emit("dismiss", &()), 1);
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn off_removes_only_that_handler() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus: EventBus<u8> = EventBus::new();
        let l1 = log.clone();
        let first = bus.on(OPEN_CHANGE, move |_| l1.borrow_mut().push(1));
        let l2 = log.clone();
        bus.on(OPEN_CHANGE, move |_| l2.borrow_mut().push(2));
        assert!(bus.off(first));
        assert!(!bus.off(first));
        bus.emit(OPEN_CHANGE, &0);
        assert_eq!(*log.borrow(), vec![2]);
        assert_eq!(bus.subscriber_count(OPEN_CHANGE), 1);
    }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host capabilities: listener registration and timers.
//!
//! ## Overview
//!
//! Controllers never hold closures inside the host. They register a listener
//! (or a timer) and keep the returned id; when the host later observes the
//! event (or the deadline), it hands the id back through
//! [`Interactions::on_listener`](crate::interactions::Interactions::on_listener)
//! or [`Interactions::on_timer`](crate::interactions::Interactions::on_timer),
//! and the owning controller recognizes it.
//!
//! [`ListenerSet`] and [`TimerSlot`] are the bookkeeping helpers the
//! controllers use for that.

use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt::Debug;

use crate::dom::{Dom, ScrollTarget};
use crate::error::Error;
use crate::types::EventKind;

/// Keys usable as host node handles.
pub trait NodeKey: Copy + Eq + Debug + 'static {}

impl<T: Copy + Eq + Debug + 'static> NodeKey for T {}

/// Handle for a registered listener.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ListenerId(pub u64);

/// Handle for a scheduled timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimerId(pub u64);

/// Where a listener is attached.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ListenerTarget<K> {
    /// The document owning the elements.
    Document,
    /// Its window.
    Window,
    /// A specific element.
    Element(K),
}

impl<K> ListenerTarget<K> {
    /// Listener target for a scroll source. The visual viewport has none.
    pub fn from_scroll(target: ScrollTarget<K>) -> Option<Self> {
        match target {
            ScrollTarget::Element(k) => Some(Self::Element(k)),
            ScrollTarget::Window => Some(Self::Window),
            ScrollTarget::VisualViewport => None,
        }
    }
}

bitflags::bitflags! {
    /// `addEventListener` options.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct ListenerOptions: u8 {
        /// Deliver during the capture phase.
        const CAPTURE = 1 << 0;
        /// The listener never calls `preventDefault`.
        const PASSIVE = 1 << 1;
        /// Remove after the first delivery.
        const ONCE = 1 << 2;
    }
}

/// Listener registration.
pub trait EventSource<K> {
    /// Register a listener; the host reports deliveries by id.
    fn add_listener(
        &mut self,
        target: ListenerTarget<K>,
        kind: EventKind,
        options: ListenerOptions,
    ) -> Result<ListenerId, Error>;

    /// Unregister a listener. Unknown ids are ignored.
    fn remove_listener(&mut self, id: ListenerId);
}

/// One-shot timers.
pub trait Scheduler {
    /// Schedule a timer; the host reports expiry by id.
    fn set_timeout(&mut self, delay_ms: u32) -> TimerId;

    /// Cancel a timer. Unknown or expired ids are ignored.
    fn clear_timeout(&mut self, id: TimerId);
}

/// Everything a controller needs from its environment.
pub trait Host<K>: Dom<K> + EventSource<K> + Scheduler {}

impl<K, T: Dom<K> + EventSource<K> + Scheduler + ?Sized> Host<K> for T {}

/// Registered listeners of one controller.
#[derive(Clone, Debug)]
pub struct ListenerSet<K> {
    entries: Vec<(ListenerId, ListenerTarget<K>, EventKind)>,
}

impl<K> Default for ListenerSet<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Copy + Eq + Debug> ListenerSet<K> {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. A rejection is logged and skipped.
    pub fn attach(
        &mut self,
        host: &mut (impl EventSource<K> + ?Sized),
        target: ListenerTarget<K>,
        kind: EventKind,
        options: ListenerOptions,
    ) -> Option<ListenerId> {
        match host.add_listener(target, kind, options) {
            Ok(id) => {
                tracing::debug!(?target, %kind, ?id, "listener attached");
                self.entries.push((id, target, kind));
                Some(id)
            }
            Err(err) => {
                tracing::warn!(?target, %kind, %err, "listener not attached");
                None
            }
        }
    }

    /// Unregister one listener.
    pub fn detach(&mut self, host: &mut (impl EventSource<K> + ?Sized), id: ListenerId) {
        if let Some(i) = self.entries.iter().position(|(l, ..)| *l == id) {
            self.entries.remove(i);
            host.remove_listener(id);
        }
    }

    /// Unregister everything.
    pub fn detach_all(&mut self, host: &mut (impl EventSource<K> + ?Sized)) {
        for (id, target, kind) in self.entries.drain(..) {
            tracing::debug!(?target, %kind, ?id, "listener detached");
            host.remove_listener(id);
        }
    }

    /// Forget a listener the host already dropped (`ONCE`).
    pub fn forget(&mut self, id: ListenerId) {
        self.entries.retain(|(l, ..)| *l != id);
    }

    /// Target and kind of a registered listener.
    pub fn get(&self, id: ListenerId) -> Option<(ListenerTarget<K>, EventKind)> {
        self.entries
            .iter()
            .find(|(l, ..)| *l == id)
            .map(|(_, target, kind)| (*target, *kind))
    }

    /// Whether `id` belongs to this set.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|(l, ..)| *l == id)
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single armed timer with deferred cancellation.
///
/// `disarm` works without host access (from a bus subscriber for example).
/// The id is remembered as stale and cancelled with the host on the next
/// `flush`; until then a late expiry is recognized and ignored.
#[derive(Debug, Default)]
pub struct TimerSlot {
    armed: Cell<Option<TimerId>>,
    stale: RefCell<Vec<TimerId>>,
}

impl TimerSlot {
    /// An unarmed slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer, cancelling the previous one.
    pub fn arm(&self, scheduler: &mut (impl Scheduler + ?Sized), delay_ms: u32) -> TimerId {
        self.cancel(scheduler);
        let id = scheduler.set_timeout(delay_ms);
        tracing::trace!(?id, delay_ms, "timer armed");
        self.armed.set(Some(id));
        id
    }

    /// Forget the armed timer; it is cancelled on the next flush.
    pub fn disarm(&self) {
        if let Some(id) = self.armed.take() {
            tracing::trace!(?id, "timer disarmed");
            self.stale.borrow_mut().push(id);
        }
    }

    /// Disarm and cancel with the host now.
    pub fn cancel(&self, scheduler: &mut (impl Scheduler + ?Sized)) {
        self.disarm();
        self.flush(scheduler);
    }

    /// Cancel previously disarmed timers with the host.
    pub fn flush(&self, scheduler: &mut (impl Scheduler + ?Sized)) {
        for id in self.stale.take() {
            scheduler.clear_timeout(id);
        }
    }

    /// Whether a timer is armed.
    pub fn is_armed(&self) -> bool {
        self.armed.get().is_some()
    }

    /// If `id` is the armed timer, consume it and return `true`.
    pub fn fire(&self, id: TimerId) -> bool {
        if self.armed.get() == Some(id) {
            self.armed.set(None);
            tracing::trace!(?id, "timer fired");
            true
        } else {
            false
        }
    }
}
